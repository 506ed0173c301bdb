//! DataFusion as the spatial-native analytical engine.
//!
//! A plain `SessionContext` plus the geo-backed spatial UDFs from
//! [`super::spatial_udf`]; the tables are registered as parquet listing
//! tables so directories of fragments work the same as single files.

use datafusion::prelude::{ParquetReadOptions, SessionContext};
use tokio::runtime::Runtime;
use tracing::debug;

use crate::data::DataPaths;
use crate::engines::{spatial_udf, QueryEngine};
use crate::error::{BenchError, Result};

pub struct DataFusionEngine {
    paths: DataPaths,
    runtime: Runtime,
    ctx: Option<SessionContext>,
}

impl DataFusionEngine {
    pub fn new(paths: DataPaths) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        Ok(Self {
            paths,
            runtime,
            ctx: None,
        })
    }
}

impl QueryEngine for DataFusionEngine {
    fn engine_name(&self) -> &'static str {
        "datafusion"
    }

    fn setup(&mut self) -> Result<()> {
        let ctx = SessionContext::new();
        spatial_udf::register_all(&ctx);
        for (table, _) in self.paths.iter() {
            let path = self.paths.listing_path(table)?;
            debug!(table, path = %path, "registering datafusion table");
            self.runtime
                .block_on(ctx.register_parquet(table, &path, ParquetReadOptions::default()))?;
        }
        self.ctx = Some(ctx);
        Ok(())
    }

    fn execute(&mut self, query: &str, sql: Option<&str>) -> Result<u64> {
        let sql = sql
            .ok_or_else(|| BenchError::MissingSql("datafusion".to_string(), query.to_string()))?;
        let ctx = self
            .ctx
            .as_ref()
            .ok_or_else(|| BenchError::Other("datafusion engine used before setup".to_string()))?;
        let df = self.runtime.block_on(ctx.sql(sql))?;
        let batches = self.runtime.block_on(df.collect())?;
        Ok(batches.iter().map(|b| b.num_rows() as u64).sum())
    }

    fn teardown(&mut self) {
        self.ctx = None;
    }
}
