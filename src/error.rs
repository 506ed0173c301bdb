//! Error type shared by the library crates and the worker.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BenchError {
    #[error("no parquet data found for table `{0}`")]
    MissingTable(String),

    #[error("unknown query `{0}` (expected q1..q12)")]
    UnknownQuery(String),

    #[error("engine `{0}` has no SQL dialect for query `{1}`")]
    MissingSql(String, String),

    #[error("duckdb: {0}")]
    DuckDb(#[from] duckdb::Error),

    #[error("datafusion: {0}")]
    DataFusion(#[from] datafusion::error::DataFusionError),

    #[error("polars: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    #[error("geometry: {0}")]
    Geometry(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("worker report: {0}")]
    Report(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl From<geozero::error::GeozeroError> for BenchError {
    fn from(err: geozero::error::GeozeroError) -> Self {
        BenchError::Geometry(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BenchError>;
