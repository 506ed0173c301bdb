//! The engines under benchmark.
//!
//! Every engine implements [`QueryEngine`]: untimed `setup`, a timed
//! `execute` returning the result row count, and `teardown`. The SQL engines
//! receive their dialect text from [`crate::queries`]; the dataframe engines
//! carry the twelve queries in their own idiom.

use std::fmt;

use clap::ValueEnum;

use crate::data::DataPaths;
use crate::error::Result;
use crate::queries::Dialect;

pub mod datafusion;
pub mod duckdb;
pub mod frames;
pub mod polars_eager;
pub mod polars_lazy;
pub mod spatial_udf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum EngineKind {
    #[value(name = "duckdb")]
    DuckDb,
    #[value(name = "datafusion")]
    DataFusion,
    #[value(name = "polars")]
    Polars,
    #[value(name = "polars_lazy", alias = "polars-lazy")]
    PolarsLazy,
}

impl EngineKind {
    pub fn all() -> [EngineKind; 4] {
        [
            EngineKind::DuckDb,
            EngineKind::DataFusion,
            EngineKind::Polars,
            EngineKind::PolarsLazy,
        ]
    }

    /// Stable name used in CLI flags, JSON records and file names.
    pub fn name(self) -> &'static str {
        match self {
            EngineKind::DuckDb => "duckdb",
            EngineKind::DataFusion => "datafusion",
            EngineKind::Polars => "polars",
            EngineKind::PolarsLazy => "polars_lazy",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            EngineKind::DuckDb => "DuckDB",
            EngineKind::DataFusion => "DataFusion",
            EngineKind::Polars => "Polars",
            EngineKind::PolarsLazy => "Polars Lazy",
        }
    }

    /// SQL dialect, if the engine is SQL-driven.
    pub fn dialect(self) -> Option<Dialect> {
        match self {
            EngineKind::DuckDb => Some(Dialect::DuckDb),
            EngineKind::DataFusion => Some(Dialect::DataFusion),
            EngineKind::Polars | EngineKind::PolarsLazy => None,
        }
    }

    /// Engine version string for the reports.
    pub fn version(self) -> String {
        match self {
            EngineKind::DuckDb => {
                duckdb::library_version().unwrap_or_else(|_| "unknown".to_string())
            }
            EngineKind::DataFusion => ::datafusion::DATAFUSION_VERSION.to_string(),
            EngineKind::Polars | EngineKind::PolarsLazy => polars::VERSION.to_string(),
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for EngineKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "duckdb" => Ok(EngineKind::DuckDb),
            "datafusion" => Ok(EngineKind::DataFusion),
            "polars" => Ok(EngineKind::Polars),
            "polars_lazy" | "polars-lazy" => Ok(EngineKind::PolarsLazy),
            other => Err(format!(
                "unknown engine '{other}', valid options: duckdb, datafusion, polars, polars_lazy"
            )),
        }
    }
}

/// A benchmarked engine. `setup` is untimed; `execute` is what the worker
/// measures.
pub trait QueryEngine {
    fn engine_name(&self) -> &'static str;

    fn setup(&mut self) -> Result<()>;

    /// Run one query and return its result row count. `sql` is present for
    /// SQL engines and `None` for the dataframe engines.
    fn execute(&mut self, query: &str, sql: Option<&str>) -> Result<u64>;

    fn teardown(&mut self) {}
}

/// Construct the engine for a kind over the discovered dataset.
pub fn build(kind: EngineKind, paths: &DataPaths) -> Result<Box<dyn QueryEngine>> {
    Ok(match kind {
        EngineKind::DuckDb => Box::new(duckdb::DuckDbEngine::new(paths.clone())),
        EngineKind::DataFusion => Box::new(datafusion::DataFusionEngine::new(paths.clone())?),
        EngineKind::Polars => Box::new(polars_eager::PolarsEagerEngine::new(paths.clone())),
        EngineKind::PolarsLazy => Box::new(polars_lazy::PolarsLazyEngine::new(paths.clone())),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_names_roundtrip() {
        for kind in EngineKind::all() {
            let parsed: EngineKind = kind.name().parse().unwrap();
            assert_eq!(parsed, kind);
        }
        assert!("postgres".parse::<EngineKind>().is_err());
    }

    #[test]
    fn sql_engines_have_dialects() {
        assert!(EngineKind::DuckDb.dialect().is_some());
        assert!(EngineKind::DataFusion.dialect().is_some());
        assert!(EngineKind::Polars.dialect().is_none());
        assert!(EngineKind::PolarsLazy.dialect().is_none());
    }
}
