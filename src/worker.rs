//! Worker-side execution of a single query attempt.
//!
//! Runs inside the isolated process spawned by the harness: build the
//! engine, run untimed setup, time the query, and report. Engine panics are
//! caught and reported like any other engine error so the parent can tell a
//! raised error apart from a crashed process.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::time::Instant;

use tracing::info;

use crate::data::DataPaths;
use crate::engines::{self, EngineKind};
use crate::error::{BenchError, Result};
use crate::queries;
use crate::result::WorkerReport;

/// Execute one query and fold every failure mode into the report.
pub fn execute(kind: EngineKind, query: &str, data_dir: &Path) -> WorkerReport {
    match try_execute(kind, query, data_dir) {
        Ok(report) => report,
        Err(err) => WorkerReport::error(err.to_string()),
    }
}

fn try_execute(kind: EngineKind, query: &str, data_dir: &Path) -> Result<WorkerReport> {
    if !queries::is_query_name(query) {
        return Err(BenchError::UnknownQuery(query.to_string()));
    }
    let paths = DataPaths::discover(data_dir)?;
    if paths.is_empty() {
        return Err(BenchError::Other(format!(
            "no data files found in {}",
            data_dir.display()
        )));
    }
    let sql = match kind.dialect() {
        Some(dialect) => Some(
            queries::sql_for(dialect, query)
                .ok_or_else(|| BenchError::MissingSql(kind.name().to_string(), query.to_string()))?,
        ),
        None => None,
    };

    let mut engine = engines::build(kind, &paths)?;
    engine.setup()?;
    let started = Instant::now();
    let outcome = catch_unwind(AssertUnwindSafe(|| engine.execute(query, sql.as_deref())));
    let elapsed = started.elapsed().as_secs_f64();
    engine.teardown();

    match outcome {
        Ok(Ok(rows)) => {
            info!(engine = kind.name(), query, rows, elapsed, "query finished");
            Ok(WorkerReport::success(elapsed, rows))
        }
        Ok(Err(err)) => Ok(WorkerReport::error(err.to_string())),
        Err(panic) => Ok(WorkerReport::error(format!(
            "query panicked: {}",
            panic_message(&panic)
        ))),
    }
}

fn panic_message(panic: &Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::RunStatus;

    #[test]
    fn unknown_query_is_an_error_report() {
        let dir = tempfile::tempdir().unwrap();
        let report = execute(EngineKind::Polars, "q99", dir.path());
        assert_eq!(report.status, RunStatus::Error);
        assert!(report.error_message.unwrap().contains("q99"));
    }

    #[test]
    fn missing_data_is_an_error_report() {
        let dir = tempfile::tempdir().unwrap();
        let report = execute(EngineKind::Polars, "q1", dir.path());
        assert_eq!(report.status, RunStatus::Error);
        assert!(report.error_message.unwrap().contains("no data files"));
    }
}
