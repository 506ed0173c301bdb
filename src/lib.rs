//! SpatialBench: a benchmark of analytical spatial queries across query engines.
//!
//! The suite defines twelve queries (`q1`..`q12`) over a synthetic
//! trip/zone/building dataset stored as parquet, and runs the same logical
//! query against several engines:
//!
//! - `duckdb`: DuckDB with its spatial extension (SQL)
//! - `datafusion`: DataFusion with geo-backed spatial UDFs (SQL)
//! - `polars`: eager Polars DataFrames with geo geometry
//! - `polars_lazy`: lazy Polars scans with expression-level geometry
//!
//! Every query attempt runs in its own worker process with a hard timeout, so
//! a hung or crashing engine can never take down the rest of the suite. See
//! [`harness`] for the isolation protocol and [`runner`] for orchestration.

pub mod data;
pub mod datagen;
pub mod engines;
pub mod error;
pub mod geom;
pub mod harness;
pub mod queries;
pub mod report;
pub mod result;
pub mod runner;
pub mod worker;

/// Number of queries in the suite.
pub const QUERY_COUNT: usize = 12;

/// Tables of the benchmark dataset.
pub const TABLES: [&str; 6] = ["building", "customer", "driver", "trip", "vehicle", "zone"];
