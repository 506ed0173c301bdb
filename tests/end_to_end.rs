//! Full binary round trip: generate data, run the benchmark through the
//! real runner + worker pair, then summarize the results file.

use std::process::Command;

use spatialbench::datagen::{generate, GenConfig};
use spatialbench::result::{ResultsFile, RunStatus, WorkerReport};

#[test]
fn runner_produces_results_json_for_polars() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    generate(
        &data,
        &GenConfig {
            scale_factor: 0.02,
            seed: 3,
        },
    )
    .unwrap();
    let output = dir.path().join("polars_results.json");

    let status = Command::new(env!("CARGO_BIN_EXE_run_benchmark"))
        .arg("--data-dir")
        .arg(&data)
        .args([
            "--engines", "polars",
            "--queries", "q1,q2,q7",
            "--runs", "1",
            "--timeout", "300",
        ])
        .arg("--output")
        .arg(&output)
        .env("SPATIALBENCH_WORKER", env!("CARGO_BIN_EXE_query_worker"))
        .status()
        .unwrap();
    assert!(status.success());

    let file: ResultsFile =
        serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(file.benchmark, "spatialbench");
    assert_eq!(file.results.len(), 1);
    let suite = &file.results[0];
    assert_eq!(suite.engine, "polars");
    assert_eq!(suite.results.len(), 3);
    for result in &suite.results {
        assert_eq!(result.status, RunStatus::Success, "failed: {result:?}");
        assert!(result.row_count.is_some());
        assert!(result.time_seconds.is_some());
    }

    let summary = dir.path().join("summary.md");
    let status = Command::new(env!("CARGO_BIN_EXE_summarize_results"))
        .arg("--results-dir")
        .arg(dir.path())
        .arg("--output")
        .arg(&summary)
        .status()
        .unwrap();
    assert!(status.success());
    let md = std::fs::read_to_string(&summary).unwrap();
    assert!(md.contains("Results Comparison"));
    assert!(md.contains("**Q1**"));
}

#[test]
fn worker_reports_engine_errors_on_stdout_and_exits_zero() {
    let empty = tempfile::tempdir().unwrap();
    let out = Command::new(env!("CARGO_BIN_EXE_query_worker"))
        .args(["--engine", "polars", "--query", "q1"])
        .arg("--data-dir")
        .arg(empty.path())
        .output()
        .unwrap();
    assert!(out.status.success());

    let stdout = String::from_utf8_lossy(&out.stdout);
    let line = stdout.lines().last().unwrap();
    let report: WorkerReport = serde_json::from_str(line).unwrap();
    assert_eq!(report.status, RunStatus::Error);
    assert!(report.error_message.unwrap().contains("no data files"));
}
