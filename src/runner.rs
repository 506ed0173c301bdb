//! Suite orchestration: one engine at a time, one isolated worker per query
//! attempt, queries strictly sequential so runs never contend with each
//! other.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use crate::engines::EngineKind;
use crate::harness::{run_with_repeats, WorkerSpec};
use crate::queries;
use crate::result::{BenchmarkSuite, RunStatus};

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub worker_bin: PathBuf,
    pub data_dir: PathBuf,
    /// Lowercased query names to run; `None` runs the whole suite.
    pub queries: Option<Vec<String>>,
    pub timeout: Duration,
    pub runs: u32,
    pub scale_factor: f64,
}

/// Run the suite for one engine, printing progress as it goes.
pub fn run_engine_suite(kind: EngineKind, cfg: &RunConfig) -> BenchmarkSuite {
    let version = kind.version();
    println!("\n{}", "=".repeat(60));
    println!("Running {} Benchmark", kind.display_name());
    println!("{}", "=".repeat(60));
    println!("{} version: {version}", kind.display_name());
    if cfg.runs > 1 {
        println!("Runs per query: {} (average will be reported)", cfg.runs);
    }

    let mut suite = BenchmarkSuite::new(kind.name(), version, cfg.scale_factor);
    for query in queries::query_names() {
        if let Some(filter) = &cfg.queries {
            if !filter.iter().any(|q| q == &query) {
                continue;
            }
        }
        print!("  Running {query}... ");
        let _ = std::io::stdout().flush();

        let spec = WorkerSpec::for_query(&cfg.worker_bin, kind, &query, &cfg.data_dir);
        let (result, successful_runs) = run_with_repeats(&spec, cfg.timeout, cfg.runs);
        match result.status {
            RunStatus::Success => {
                let time = result.time_seconds.unwrap_or_default();
                let rows = result.row_count.unwrap_or_default();
                if successful_runs > 1 {
                    println!("{time:.2}s avg ({successful_runs} runs, {rows} rows)");
                } else {
                    println!("{time:.2}s ({rows} rows)");
                }
            }
            status => println!(
                "{}: {}",
                status.as_str().to_uppercase(),
                result.error_message.as_deref().unwrap_or("")
            ),
        }
        suite.push(result);
    }
    suite
}

/// Console comparison table across the suites of one invocation.
pub fn print_summary(suites: &[BenchmarkSuite]) {
    println!("\n{}", "=".repeat(80));
    println!("BENCHMARK SUMMARY");
    println!("{}", "=".repeat(80));

    let mut names: Vec<String> = suites
        .iter()
        .flat_map(|s| s.results.iter().map(|r| r.query.clone()))
        .collect();
    names.sort_by_key(|q| q[1..].parse::<usize>().unwrap_or(0));
    names.dedup();

    let cells: BTreeMap<&str, BTreeMap<&str, String>> = suites
        .iter()
        .map(|suite| {
            let per_query = suite
                .results
                .iter()
                .map(|r| {
                    let cell = match r.status {
                        RunStatus::Success => format!("{:.2}s", r.time_seconds.unwrap_or_default()),
                        status => status.as_str().to_uppercase(),
                    };
                    (r.query.as_str(), cell)
                })
                .collect();
            (suite.engine.as_str(), per_query)
        })
        .collect();

    let mut header = format!("{:<10}", "Query");
    for suite in suites {
        header.push_str(&format!("{:<15}", suite.engine));
    }
    println!("{header}");
    println!("{}", "-".repeat(header.len()));

    for query in &names {
        let mut row = format!("{query:<10}");
        for suite in suites {
            let cell = cells
                .get(suite.engine.as_str())
                .and_then(|m| m.get(query.as_str()))
                .cloned()
                .unwrap_or_else(|| "N/A".to_string());
            row.push_str(&format!("{cell:<15}"));
        }
        println!("{row}");
    }

    println!("{}", "-".repeat(header.len()));
    let mut totals = format!("{:<10}", "Total");
    for suite in suites {
        totals.push_str(&format!("{:<15}", format!("{:.2}s", suite.total_time)));
    }
    println!("{totals}");
}
