//! Isolated query worker, spawned by `run_benchmark` for every attempt.
//!
//! Stdout is owned by the report protocol: exactly one JSON line, engine
//! errors included, exit code zero. Logging goes to stderr. A crash here
//! (OOM, segfault in native engine code) leaves no report, which the parent
//! turns into a crash-flavored error.

use std::path::PathBuf;

use clap::Parser;

use spatialbench::engines::EngineKind;
use spatialbench::worker;

// Every engine allocates through the same allocator, keeping their timings
// comparable.
#[global_allocator]
static GLOBAL: jemallocator::Jemalloc = jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(
    name = "query_worker",
    about = "Run one benchmark query in isolation (used by run_benchmark)"
)]
struct Args {
    /// Engine to run the query on
    #[arg(long)]
    engine: EngineKind,

    /// Query name (q1..q12)
    #[arg(long)]
    query: String,

    /// Path to directory containing benchmark data (parquet files)
    #[arg(long)]
    data_dir: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let report = worker::execute(args.engine, &args.query, &args.data_dir);
    println!("{}", serde_json::to_string(&report)?);
    Ok(())
}
