//! The isolation contract, pinned without any engine in the loop: /bin/sh
//! stands in for the worker so these tests only exercise spawn, deadline,
//! kill escalation and report parsing.

#![cfg(unix)]

use std::path::PathBuf;
use std::time::{Duration, Instant};

use spatialbench::harness::{run_isolated, run_with_repeats, WorkerSpec};
use spatialbench::result::RunStatus;

fn sh(script: &str) -> WorkerSpec {
    WorkerSpec {
        program: PathBuf::from("/bin/sh"),
        args: vec!["-c".to_string(), script.to_string()],
        engine: "selftest".to_string(),
        query: "q1".to_string(),
    }
}

#[test]
fn sleeping_worker_is_killed_and_reported_as_timeout() {
    let started = Instant::now();
    let result = run_isolated(&sh("sleep 30"), Duration::from_secs(1));
    assert_eq!(result.status, RunStatus::Timeout);
    assert_eq!(result.time_seconds, Some(1.0));
    assert!(result.error_message.unwrap().contains("timed out"));
    // SIGTERM ends sh promptly; nowhere near the 30s sleep.
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[test]
fn error_report_is_preserved() {
    let script = r#"echo '{"status":"error","time_seconds":null,"row_count":null,"error_message":"relation trip does not exist"}'"#;
    let result = run_isolated(&sh(script), Duration::from_secs(5));
    assert_eq!(result.status, RunStatus::Error);
    assert_eq!(
        result.error_message.as_deref(),
        Some("relation trip does not exist")
    );
    assert_eq!(result.time_seconds, None);
}

#[test]
fn crashed_worker_is_an_error_distinct_from_timeout() {
    let result = run_isolated(&sh("exit 3"), Duration::from_secs(5));
    assert_eq!(result.status, RunStatus::Error);
    let message = result.error_message.unwrap();
    assert!(message.contains("crashed"), "message: {message}");
    assert!(message.contains('3'), "message: {message}");
}

#[test]
fn worker_exiting_cleanly_without_a_report_is_an_error() {
    let result = run_isolated(&sh("true"), Duration::from_secs(5));
    assert_eq!(result.status, RunStatus::Error);
    assert!(result.error_message.unwrap().contains("no result"));
}

#[test]
fn successful_report_passes_through() {
    let script = r#"echo '{"status":"success","time_seconds":0.5,"row_count":7,"error_message":null}'"#;
    let result = run_isolated(&sh(script), Duration::from_secs(5));
    assert_eq!(result.status, RunStatus::Success);
    assert_eq!(result.time_seconds, Some(0.5));
    assert_eq!(result.row_count, Some(7));
}

#[test]
fn repeats_report_the_mean_of_successful_runs() {
    let dir = tempfile::tempdir().unwrap();
    let counter = dir.path().join("attempts");
    // Reported time grows with the attempt number: 1.0, 2.0, 3.0 -> mean 2.0.
    let script = format!(
        r#"echo x >> "{0}"; n=$(wc -l < "{0}"); printf '{{"status":"success","time_seconds":%d.0,"row_count":1,"error_message":null}}\n' "$n""#,
        counter.display()
    );
    let (result, runs) = run_with_repeats(&sh(&script), Duration::from_secs(5), 3);
    assert_eq!(runs, 3);
    assert_eq!(result.status, RunStatus::Success);
    assert_eq!(result.time_seconds, Some(2.0));
    assert_eq!(result.row_count, Some(1));
}

#[test]
fn failed_followup_run_keeps_the_earlier_timings() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("ran-once");
    // First attempt succeeds at 1.5s, every later attempt crashes.
    let script = format!(
        r#"if [ -f "{0}" ]; then exit 1; fi; touch "{0}"; echo '{{"status":"success","time_seconds":1.5,"row_count":4,"error_message":null}}'"#,
        marker.display()
    );
    let (result, runs) = run_with_repeats(&sh(&script), Duration::from_secs(5), 3);
    assert_eq!(runs, 1);
    assert_eq!(result.status, RunStatus::Success);
    assert_eq!(result.time_seconds, Some(1.5));
}
