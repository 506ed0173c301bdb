//! Markdown comparison report over saved result files.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::Utc;

use crate::result::{BenchmarkResult, BenchmarkSuite, ResultsFile, RunStatus};

/// Load every `*_results.json` in a directory, keyed by engine. Later files
/// win when an engine appears twice.
pub fn load_results(dir: &Path) -> crate::error::Result<BTreeMap<String, BenchmarkSuite>> {
    let mut out = BTreeMap::new();
    let mut paths: Vec<_> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.ends_with("_results.json"))
                .unwrap_or(false)
        })
        .collect();
    paths.sort();
    for path in paths {
        let file: ResultsFile = serde_json::from_str(&fs::read_to_string(&path)?)?;
        for suite in file.results {
            out.insert(suite.engine.clone(), suite);
        }
    }
    Ok(out)
}

pub fn format_time(seconds: Option<f64>) -> String {
    match seconds {
        None => "N/A".to_string(),
        Some(s) if s < 0.01 => "<0.01s".to_string(),
        Some(s) => format!("{s:.2}s"),
    }
}

fn engine_label(engine: &str) -> String {
    match engine {
        "duckdb" => "🦆 DuckDB".to_string(),
        "datafusion" => "🏹 DataFusion".to_string(),
        "polars" => "🐻‍❄️ Polars".to_string(),
        "polars_lazy" => "🦥 Polars Lazy".to_string(),
        other => other.to_string(),
    }
}

fn query_sort_key(name: &str) -> usize {
    name[1..].parse().unwrap_or(0)
}

type ResultLookup<'a> = BTreeMap<&'a str, BTreeMap<&'a str, &'a BenchmarkResult>>;

fn winner<'a>(query: &str, data: &ResultLookup<'a>, engines: &[&'a str]) -> Option<&'a str> {
    engines
        .iter()
        .filter_map(|&engine| {
            let result = data.get(engine)?.get(query)?;
            match (result.status, result.time_seconds) {
                (RunStatus::Success, Some(t)) => Some((engine, t)),
                _ => None,
            }
        })
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(engine, _)| engine)
}

/// Render the full markdown report.
pub fn generate_markdown(
    results: &BTreeMap<String, BenchmarkSuite>,
    query_timeout: u64,
    runs: u32,
) -> String {
    if results.is_empty() {
        return "# 📊 SpatialBench Benchmark Results\n\n⚠️ No results found.".to_string();
    }
    let engines: Vec<&str> = results.keys().map(String::as_str).collect();
    let first = &results[engines[0]];
    let scale_factor = first.scale_factor;
    let timestamp = first.timestamp.clone();

    let mut queries: Vec<&str> = results
        .values()
        .flat_map(|s| s.results.iter().map(|r| r.query.as_str()))
        .collect();
    queries.sort_by_key(|q| query_sort_key(q));
    queries.dedup();

    let data: ResultLookup = results
        .iter()
        .map(|(engine, suite)| {
            (
                engine.as_str(),
                suite
                    .results
                    .iter()
                    .map(|r| (r.query.as_str(), r))
                    .collect(),
            )
        })
        .collect();

    let mut lines: Vec<String> = vec![
        "# 📊 SpatialBench Benchmark Results".to_string(),
        String::new(),
        "| Parameter | Value |".to_string(),
        "|-----------|-------|".to_string(),
        format!("| **Scale Factor** | {scale_factor} |"),
        format!("| **Query Timeout** | {query_timeout}s |"),
        format!("| **Runs per Query** | {runs} |"),
        format!("| **Timestamp** | {timestamp} |"),
        format!("| **Queries** | {} |", queries.len()),
        String::new(),
        "## 🔧 Software Versions".to_string(),
        String::new(),
        "| Engine | Version |".to_string(),
        "|--------|---------|".to_string(),
    ];
    for &engine in &engines {
        lines.push(format!(
            "| {} | `{}` |",
            engine_label(engine),
            results[engine].version
        ));
    }

    lines.push(String::new());
    lines.push("## 🏁 Results Comparison".to_string());
    lines.push(String::new());
    lines.push(format!(
        "| Query | {} |",
        engines
            .iter()
            .map(|e| engine_label(e))
            .collect::<Vec<_>>()
            .join(" | ")
    ));
    lines.push(format!(
        "|:------|{}|",
        engines.iter().map(|_| ":---:").collect::<Vec<_>>().join("|")
    ));

    for &query in &queries {
        let best = winner(query, &data, &engines);
        let mut row = format!("| **{}** |", query.to_uppercase());
        for &engine in &engines {
            let cell = match data.get(engine).and_then(|m| m.get(query)) {
                Some(result) => match result.status {
                    RunStatus::Success => {
                        let time = format_time(result.time_seconds);
                        if best == Some(engine) {
                            format!(" **{time}** |")
                        } else {
                            format!(" {time} |")
                        }
                    }
                    RunStatus::Timeout => " ⏱️ TIMEOUT |".to_string(),
                    RunStatus::Error => " ❌ ERROR |".to_string(),
                },
                None => " — |".to_string(),
            };
            row.push_str(&cell);
        }
        lines.push(row);
    }

    let mut wins: BTreeMap<&str, usize> = engines.iter().map(|&e| (e, 0)).collect();
    for &query in &queries {
        if let Some(engine) = winner(query, &data, &engines) {
            *wins.entry(engine).or_default() += 1;
        }
    }
    lines.push(String::new());
    lines.push("## 🥇 Performance Summary".to_string());
    lines.push(String::new());
    lines.push("| Engine | Wins |".to_string());
    lines.push("|--------|:----:|".to_string());
    let mut ranked: Vec<&str> = engines.clone();
    ranked.sort_by_key(|e| std::cmp::Reverse(wins[e]));
    for engine in ranked {
        lines.push(format!("| {} | {} |", engine_label(engine), wins[engine]));
    }

    lines.push(String::new());
    lines.push("## 📋 Detailed Results".to_string());
    lines.push(String::new());
    for &engine in &engines {
        lines.push("<details>".to_string());
        lines.push(format!(
            "<summary><b>{}</b> - Click to expand</summary>",
            engine_label(engine)
        ));
        lines.push(String::new());
        lines.push("| Query | Time | Status | Rows |".to_string());
        lines.push("|:------|-----:|:------:|-----:|".to_string());
        for &query in &queries {
            let Some(result) = data.get(engine).and_then(|m| m.get(query)) else {
                lines.push(format!("| {} | N/A | ❓ | — |", query.to_uppercase()));
                continue;
            };
            let status = match result.status {
                RunStatus::Success => "✅",
                RunStatus::Error => "❌",
                RunStatus::Timeout => "⏱️",
            };
            let rows = result
                .row_count
                .map(|n| n.to_string())
                .unwrap_or_else(|| "—".to_string());
            lines.push(format!(
                "| {} | {} | {status} | {rows} |",
                query.to_uppercase(),
                format_time(result.time_seconds)
            ));
        }
        lines.push(String::new());
        lines.push("</details>".to_string());
        lines.push(String::new());
    }

    let mut error_lines: Vec<String> = vec!["## ⚠️ Errors and Timeouts".to_string(), String::new()];
    let mut has_errors = false;
    for &engine in &engines {
        let mut engine_errors = Vec::new();
        for &query in &queries {
            if let Some(result) = data.get(engine).and_then(|m| m.get(query)) {
                if result.status != RunStatus::Success {
                    let mut message = result
                        .error_message
                        .clone()
                        .unwrap_or_else(|| "No details available".to_string());
                    if message.chars().count() > 200 {
                        message = message.chars().take(200).collect::<String>() + "...";
                    }
                    engine_errors.push(format!("- **{}**: `{message}`", query.to_uppercase()));
                }
            }
        }
        if !engine_errors.is_empty() {
            has_errors = true;
            error_lines.push(format!("### {}", engine_label(engine)));
            error_lines.push(String::new());
            error_lines.extend(engine_errors);
            error_lines.push(String::new());
        }
    }
    if has_errors {
        lines.extend(error_lines);
    }

    lines.push("---".to_string());
    lines.push(String::new());
    lines.push("| Legend | Meaning |".to_string());
    lines.push("|--------|---------|".to_string());
    lines.push("| **bold** | Fastest for this query |".to_string());
    lines.push("| ⏱️ TIMEOUT | Query exceeded timeout |".to_string());
    lines.push("| ❌ ERROR | Query failed |".to_string());
    lines.push(String::new());
    lines.push(format!(
        "*Generated by spatialbench on {}*",
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    ));

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn suite(engine: &str, time: Option<f64>, status: RunStatus) -> BenchmarkSuite {
        let mut suite = BenchmarkSuite::new(engine, "1.0.0", 1.0);
        suite.push(BenchmarkResult {
            query: "q1".to_string(),
            engine: engine.to_string(),
            time_seconds: time,
            row_count: time.map(|_| 3),
            status,
            error_message: match status {
                RunStatus::Success => None,
                _ => Some("boom".to_string()),
            },
        });
        suite
    }

    #[test]
    fn winner_is_bolded_and_counted() {
        let mut results = BTreeMap::new();
        results.insert("duckdb".to_string(), suite("duckdb", Some(0.5), RunStatus::Success));
        results.insert("polars".to_string(), suite("polars", Some(1.5), RunStatus::Success));
        let md = generate_markdown(&results, 60, 3);
        assert!(md.contains("**0.50s**"));
        assert!(!md.contains("**1.50s**"));
        assert!(md.contains("| 🦆 DuckDB | 1 |"));
        assert!(md.contains("| 🐻‍❄️ Polars | 0 |"));
    }

    #[test]
    fn failures_render_as_cells_and_error_section() {
        let mut results = BTreeMap::new();
        results.insert("duckdb".to_string(), suite("duckdb", None, RunStatus::Timeout));
        let md = generate_markdown(&results, 60, 1);
        assert!(md.contains("⏱️ TIMEOUT"));
        assert!(md.contains("## ⚠️ Errors and Timeouts"));
        assert!(md.contains("`boom`"));
    }

    #[test]
    fn empty_results_have_a_placeholder() {
        let md = generate_markdown(&BTreeMap::new(), 60, 3);
        assert!(md.contains("No results found"));
    }

    #[test]
    fn sub_centisecond_times_format_specially() {
        assert_eq!(format_time(Some(0.004)), "<0.01s");
        assert_eq!(format_time(Some(1.234)), "1.23s");
        assert_eq!(format_time(None), "N/A");
    }
}
