//! DuckDB with the spatial extension.
//!
//! Setup opens an in-memory database, loads the extension and exposes each
//! parquet table as a view, so the timed portion is exactly the SQL query.

use duckdb::Connection;
use tracing::debug;

use crate::data::DataPaths;
use crate::error::{BenchError, Result};
use crate::engines::QueryEngine;

pub struct DuckDbEngine {
    paths: DataPaths,
    conn: Option<Connection>,
}

impl DuckDbEngine {
    pub fn new(paths: DataPaths) -> Self {
        Self { paths, conn: None }
    }

    fn conn(&self) -> Result<&Connection> {
        self.conn
            .as_ref()
            .ok_or_else(|| BenchError::Other("duckdb engine used before setup".to_string()))
    }
}

impl QueryEngine for DuckDbEngine {
    fn engine_name(&self) -> &'static str {
        "duckdb"
    }

    fn setup(&mut self) -> Result<()> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("INSTALL spatial; LOAD spatial;")?;
        // Keep repeated runs comparable: no cached parquet between processes,
        // no cached parquet within one either.
        conn.execute_batch("SET enable_external_file_cache = false;")?;
        for (table, _) in self.paths.iter() {
            let parquet_path = self.paths.glob_path(table)?;
            debug!(table, path = %parquet_path, "registering duckdb view");
            conn.execute_batch(&format!(
                "CREATE VIEW {table} AS SELECT * FROM read_parquet('{parquet_path}')"
            ))?;
        }
        self.conn = Some(conn);
        Ok(())
    }

    fn execute(&mut self, query: &str, sql: Option<&str>) -> Result<u64> {
        let sql = sql
            .ok_or_else(|| BenchError::MissingSql("duckdb".to_string(), query.to_string()))?;
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query([])?;
        let mut count = 0u64;
        while rows.next()?.is_some() {
            count += 1;
        }
        Ok(count)
    }

    fn teardown(&mut self) {
        self.conn = None;
    }
}

/// Version of the bundled library, for the reports.
pub fn library_version() -> Result<String> {
    let conn = Connection::open_in_memory()?;
    let version: String = conn.query_row("SELECT version()", [], |row| row.get(0))?;
    Ok(version)
}
