//! Benchmark runner CLI.
//!
//! Runs the twelve-query suite against the selected engines, one isolated
//! worker process per query attempt, and writes the JSON results file.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;

use spatialbench::data::DataPaths;
use spatialbench::engines::EngineKind;
use spatialbench::queries::is_query_name;
use spatialbench::result::ResultsFile;
use spatialbench::runner::{print_summary, run_engine_suite, RunConfig};

#[derive(Parser, Debug)]
#[command(
    name = "run_benchmark",
    about = "Run the SpatialBench suite against DuckDB, DataFusion and Polars"
)]
struct Args {
    /// Path to directory containing benchmark data (parquet files)
    #[arg(long)]
    data_dir: PathBuf,

    /// Comma-separated list of engines to benchmark
    #[arg(
        long,
        value_delimiter = ',',
        default_value = "duckdb,datafusion,polars,polars_lazy"
    )]
    engines: Vec<EngineKind>,

    /// Comma-separated list of queries to run (e.g. q1,q2,q3)
    #[arg(long, value_delimiter = ',')]
    queries: Option<Vec<String>>,

    /// Query timeout in seconds
    #[arg(long, default_value_t = 10)]
    timeout: u64,

    /// Number of runs per query for averaging
    #[arg(long, default_value_t = 3)]
    runs: u32,

    /// Output file for results
    #[arg(long, default_value = "benchmark_results.json")]
    output: PathBuf,

    /// Scale factor of the data (for reporting only)
    #[arg(long, default_value_t = 1.0)]
    scale_factor: f64,

    /// Worker binary; defaults to query_worker next to this executable
    #[arg(long, env = "SPATIALBENCH_WORKER")]
    worker_bin: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();

    let query_filter = match &args.queries {
        Some(list) => {
            let normalized: Vec<String> =
                list.iter().map(|q| q.trim().to_lowercase()).collect();
            for q in &normalized {
                if !is_query_name(q) {
                    bail!("unknown query '{q}' (expected q1..q12)");
                }
            }
            Some(normalized)
        }
        None => None,
    };

    let paths = DataPaths::discover(&args.data_dir)?;
    if paths.is_empty() {
        bail!("no data files found in {}", args.data_dir.display());
    }
    println!("Data paths:");
    for (table, path) in paths.iter() {
        println!("  {table}: {}", path.display());
    }

    let worker_bin = match args.worker_bin {
        Some(path) => path,
        None => default_worker_bin()?,
    };

    let cfg = RunConfig {
        worker_bin,
        data_dir: args.data_dir,
        queries: query_filter,
        timeout: Duration::from_secs(args.timeout),
        runs: args.runs.max(1),
        scale_factor: args.scale_factor,
    };

    let suites: Vec<_> = args
        .engines
        .iter()
        .map(|&engine| run_engine_suite(engine, &cfg))
        .collect();

    print_summary(&suites);

    let file = ResultsFile::new(suites);
    std::fs::write(&args.output, serde_json::to_string_pretty(&file)?)?;
    println!("\nResults saved to {}", args.output.display());
    Ok(())
}

fn default_worker_bin() -> anyhow::Result<PathBuf> {
    let exe = std::env::current_exe().context("cannot locate own executable")?;
    let worker = exe.with_file_name(format!("query_worker{}", std::env::consts::EXE_SUFFIX));
    if !worker.is_file() {
        bail!(
            "worker binary not found at {} (build it, or set --worker-bin / SPATIALBENCH_WORKER)",
            worker.display()
        );
    }
    Ok(worker)
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
