//! Process-isolated query execution with a hard timeout.
//!
//! Each query attempt runs in a separate worker process. That buys three
//! things a signal-based timeout cannot: native engine code can be forcibly
//! terminated, a memory-hungry query cannot OOM the runner, and a crashed
//! query cannot invalidate the rest of the suite.
//!
//! Protocol: the worker writes exactly one JSON [`WorkerReport`] line to
//! stdout and exits zero, even when the engine errored. The parent joins
//! with a deadline; past it the worker gets SIGTERM, a grace period, then
//! SIGKILL. A worker that exits without a parseable report is a crash,
//! reported as an error distinct from both timeouts and engine errors.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::engines::EngineKind;
use crate::result::{mean_time, BenchmarkResult, RunStatus, WorkerReport};

/// Grace after SIGTERM before escalating to SIGKILL.
pub const TERMINATE_GRACE: Duration = Duration::from_secs(5);
/// Grace after SIGKILL before giving up on reaping.
pub const KILL_GRACE: Duration = Duration::from_secs(2);
/// Errors surfacing this close to the deadline count as timeouts: a native
/// engine interrupted mid-query often raises its own error instead.
pub const TIMEOUT_SLACK: f64 = 0.95;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// How to launch one worker attempt.
#[derive(Debug, Clone)]
pub struct WorkerSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub engine: String,
    pub query: String,
}

impl WorkerSpec {
    /// Spec for the real `query_worker` binary.
    pub fn for_query(worker_bin: &Path, engine: EngineKind, query: &str, data_dir: &Path) -> Self {
        Self {
            program: worker_bin.to_path_buf(),
            args: vec![
                "--engine".to_string(),
                engine.name().to_string(),
                "--query".to_string(),
                query.to_string(),
                "--data-dir".to_string(),
                data_dir.to_string_lossy().into_owned(),
            ],
            engine: engine.name().to_string(),
            query: query.to_string(),
        }
    }
}

/// Run a single query attempt in an isolated worker with a hard timeout.
pub fn run_isolated(spec: &WorkerSpec, timeout: Duration) -> BenchmarkResult {
    match spawn_and_collect(spec, timeout) {
        Ok(result) => result,
        Err(err) => error_result(
            spec,
            format!("failed to launch worker {}: {err}", spec.program.display()),
        ),
    }
}

/// Repeat a successful query `runs` times and report the mean timing.
///
/// The first run decides: anything but success is returned as-is. A failed
/// follow-up run stops further repeats without discarding the runs already
/// collected. Returns the result and the number of successful runs averaged.
pub fn run_with_repeats(spec: &WorkerSpec, timeout: Duration, runs: u32) -> (BenchmarkResult, u32) {
    let first = run_isolated(spec, timeout);
    if first.status != RunStatus::Success || runs <= 1 {
        return (first, 1);
    }
    let mut times = vec![first.time_seconds.unwrap_or(0.0)];
    for _ in 1..runs {
        let next = run_isolated(spec, timeout);
        if next.status != RunStatus::Success {
            break;
        }
        times.push(next.time_seconds.unwrap_or(0.0));
    }
    let successful = times.len() as u32;
    let averaged = BenchmarkResult {
        time_seconds: Some(mean_time(&times)),
        ..first
    };
    (averaged, successful)
}

fn spawn_and_collect(spec: &WorkerSpec, timeout: Duration) -> std::io::Result<BenchmarkResult> {
    debug!(query = %spec.query, engine = %spec.engine, "spawning worker");
    let mut child = Command::new(&spec.program)
        .args(&spec.args)
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()?;

    // Drain stdout on a thread so a chatty worker can never block on a full
    // pipe while we are waiting on it.
    let mut stdout = child.stdout.take().expect("stdout was piped");
    let reader = thread::spawn(move || {
        let mut buf = String::new();
        let _ = stdout.read_to_string(&mut buf);
        buf
    });

    let started = Instant::now();
    let status = wait_until(&mut child, started + timeout)?;
    let Some(status) = status else {
        escalate_kill(&mut child, spec);
        let _ = reader.join();
        return Ok(BenchmarkResult {
            query: spec.query.clone(),
            engine: spec.engine.clone(),
            time_seconds: Some(timeout.as_secs_f64()),
            row_count: None,
            status: RunStatus::Timeout,
            error_message: Some(format!(
                "Query {} timed out after {} seconds (process killed)",
                spec.query,
                timeout.as_secs()
            )),
        });
    };
    let elapsed = started.elapsed();

    let output = reader.join().unwrap_or_default();
    match parse_report(&output) {
        Some(report) => Ok(classify_report(spec, report, elapsed, timeout)),
        None if !status.success() => Ok(error_result(
            spec,
            format!(
                "Query {} crashed (process exit code: {})",
                spec.query,
                describe_exit(&status)
            ),
        )),
        None => Ok(error_result(
            spec,
            format!("Query {} produced no result", spec.query),
        )),
    }
}

/// Map a worker report to a benchmark result, reclassifying errors that
/// arrive at the deadline's edge as timeouts.
fn classify_report(
    spec: &WorkerSpec,
    report: WorkerReport,
    elapsed: Duration,
    timeout: Duration,
) -> BenchmarkResult {
    if report.status == RunStatus::Error
        && elapsed.as_secs_f64() >= TIMEOUT_SLACK * timeout.as_secs_f64()
    {
        return BenchmarkResult {
            query: spec.query.clone(),
            engine: spec.engine.clone(),
            time_seconds: Some(timeout.as_secs_f64()),
            row_count: None,
            status: RunStatus::Timeout,
            error_message: Some(format!(
                "Query {} timed out after {}s (original error: {})",
                spec.query,
                timeout.as_secs(),
                report.error_message.unwrap_or_default()
            )),
        };
    }
    BenchmarkResult {
        query: spec.query.clone(),
        engine: spec.engine.clone(),
        time_seconds: report.time_seconds,
        row_count: report.row_count,
        status: report.status,
        error_message: report.error_message,
    }
}

/// Poll the child until it exits or the deadline passes.
fn wait_until(child: &mut Child, deadline: Instant) -> std::io::Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL.min(deadline - now));
    }
}

/// SIGTERM, a grace period, then SIGKILL. On non-unix targets only the hard
/// kill is available.
fn escalate_kill(child: &mut Child, spec: &WorkerSpec) {
    warn!(query = %spec.query, engine = %spec.engine, "worker over deadline, terminating");
    #[cfg(unix)]
    {
        unsafe {
            libc::kill(child.id() as libc::pid_t, libc::SIGTERM);
        }
        if matches!(wait_until(child, Instant::now() + TERMINATE_GRACE), Ok(Some(_))) {
            return;
        }
        warn!(query = %spec.query, "worker ignored SIGTERM, killing");
    }
    let _ = child.kill();
    if !matches!(wait_until(child, Instant::now() + KILL_GRACE), Ok(Some(_))) {
        warn!(query = %spec.query, "worker survived SIGKILL grace period, abandoning");
    }
}

/// The report is the last parseable JSON line on stdout.
fn parse_report(output: &str) -> Option<WorkerReport> {
    output
        .lines()
        .rev()
        .find_map(|line| serde_json::from_str::<WorkerReport>(line.trim()).ok())
}

fn error_result(spec: &WorkerSpec, message: String) -> BenchmarkResult {
    BenchmarkResult {
        query: spec.query.clone(),
        engine: spec.engine.clone(),
        time_seconds: None,
        row_count: None,
        status: RunStatus::Error,
        error_message: Some(message),
    }
}

fn describe_exit(status: &ExitStatus) -> String {
    match status.code() {
        Some(code) => code.to_string(),
        None => "killed by signal".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> WorkerSpec {
        WorkerSpec {
            program: PathBuf::from("/bin/true"),
            args: vec![],
            engine: "duckdb".to_string(),
            query: "q1".to_string(),
        }
    }

    #[test]
    fn report_parsing_takes_last_json_line() {
        let out = "noise\n{\"status\":\"success\",\"time_seconds\":1.0,\"row_count\":2,\"error_message\":null}\n";
        let report = parse_report(out).unwrap();
        assert_eq!(report.status, RunStatus::Success);
        assert_eq!(report.row_count, Some(2));
        assert!(parse_report("garbage only\n").is_none());
    }

    #[test]
    fn error_near_deadline_becomes_timeout() {
        let report = WorkerReport::error("interrupted by shutdown");
        let result = classify_report(
            &spec(),
            report,
            Duration::from_secs_f64(9.6),
            Duration::from_secs(10),
        );
        assert_eq!(result.status, RunStatus::Timeout);
        assert_eq!(result.time_seconds, Some(10.0));
        assert!(result
            .error_message
            .unwrap()
            .contains("interrupted by shutdown"));
    }

    #[test]
    fn error_well_before_deadline_stays_error() {
        let report = WorkerReport::error("table not found");
        let result = classify_report(
            &spec(),
            report,
            Duration::from_secs(1),
            Duration::from_secs(10),
        );
        assert_eq!(result.status, RunStatus::Error);
        assert_eq!(result.error_message.as_deref(), Some("table not found"));
    }

    #[test]
    fn success_report_passes_through() {
        let report = WorkerReport::success(0.42, 7);
        let result = classify_report(
            &spec(),
            report,
            Duration::from_secs(1),
            Duration::from_secs(10),
        );
        assert_eq!(result.status, RunStatus::Success);
        assert_eq!(result.time_seconds, Some(0.42));
        assert_eq!(result.row_count, Some(7));
    }
}
