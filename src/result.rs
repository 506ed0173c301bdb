//! Result records shared by the runner, the worker and the reports.
//!
//! The JSON shapes here are the on-disk contract: `ResultsFile` is what
//! `run_benchmark --output` writes and what `summarize_results` reads back.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Outcome of a single query attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Timeout,
    Error,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::Timeout => "timeout",
            RunStatus::Error => "error",
        }
    }
}

/// Result of a single query benchmark.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub query: String,
    pub engine: String,
    pub time_seconds: Option<f64>,
    pub row_count: Option<u64>,
    pub status: RunStatus,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// What the worker process prints on stdout: one JSON line per attempt.
///
/// The parent owns `query`/`engine` already, so the report carries only the
/// outcome fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerReport {
    pub status: RunStatus,
    pub time_seconds: Option<f64>,
    pub row_count: Option<u64>,
    pub error_message: Option<String>,
}

impl WorkerReport {
    pub fn success(time_seconds: f64, row_count: u64) -> Self {
        Self {
            status: RunStatus::Success,
            time_seconds: Some(round2(time_seconds)),
            row_count: Some(row_count),
            error_message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: RunStatus::Error,
            time_seconds: None,
            row_count: None,
            error_message: Some(message.into()),
        }
    }
}

/// Complete benchmark suite results for one engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkSuite {
    pub engine: String,
    pub version: String,
    pub scale_factor: f64,
    pub timestamp: String,
    pub total_time: f64,
    pub results: Vec<BenchmarkResult>,
}

impl BenchmarkSuite {
    pub fn new(engine: impl Into<String>, version: impl Into<String>, scale_factor: f64) -> Self {
        Self {
            engine: engine.into(),
            version: version.into(),
            scale_factor,
            timestamp: Utc::now().to_rfc3339(),
            total_time: 0.0,
            results: Vec::new(),
        }
    }

    /// Append a result; successful timings accumulate into `total_time`.
    pub fn push(&mut self, result: BenchmarkResult) {
        if result.status == RunStatus::Success {
            if let Some(t) = result.time_seconds {
                self.total_time += t;
            }
        }
        self.results.push(result);
    }
}

/// Top-level JSON results file.
#[derive(Debug, Serialize, Deserialize)]
pub struct ResultsFile {
    pub benchmark: String,
    pub version: String,
    pub generated_at: String,
    pub results: Vec<BenchmarkSuite>,
}

impl ResultsFile {
    pub fn new(results: Vec<BenchmarkSuite>) -> Self {
        Self {
            benchmark: "spatialbench".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            generated_at: Utc::now().to_rfc3339(),
            results,
        }
    }
}

/// Round to two decimals, the precision every timing is reported at.
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Arithmetic mean of the given timings, rounded like any other timing.
pub fn mean_time(times: &[f64]) -> f64 {
    round2(times.iter().sum::<f64>() / times.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&RunStatus::Timeout).unwrap(), "\"timeout\"");
        let back: RunStatus = serde_json::from_str("\"success\"").unwrap();
        assert_eq!(back, RunStatus::Success);
    }

    #[test]
    fn suite_accumulates_successful_time_only() {
        let mut suite = BenchmarkSuite::new("duckdb", "1.4.3", 1.0);
        suite.push(BenchmarkResult {
            query: "q1".into(),
            engine: "duckdb".into(),
            time_seconds: Some(1.5),
            row_count: Some(10),
            status: RunStatus::Success,
            error_message: None,
        });
        suite.push(BenchmarkResult {
            query: "q2".into(),
            engine: "duckdb".into(),
            time_seconds: Some(10.0),
            row_count: None,
            status: RunStatus::Timeout,
            error_message: Some("killed".into()),
        });
        assert_eq!(suite.total_time, 1.5);
        assert_eq!(suite.results.len(), 2);
    }

    #[test]
    fn mean_time_rounds_to_hundredths() {
        assert_eq!(mean_time(&[1.0, 2.0, 3.0]), 2.0);
        assert_eq!(mean_time(&[0.1, 0.2]), 0.15);
        assert_eq!(mean_time(&[1.0, 1.0, 2.0]), 1.33);
    }

    #[test]
    fn worker_report_roundtrips() {
        let report = WorkerReport::success(1.234, 42);
        let line = serde_json::to_string(&report).unwrap();
        let back: WorkerReport = serde_json::from_str(&line).unwrap();
        assert_eq!(back.status, RunStatus::Success);
        assert_eq!(back.time_seconds, Some(1.23));
        assert_eq!(back.row_count, Some(42));
    }
}
