//! Summarize saved benchmark results into a markdown report.

use std::path::PathBuf;

use clap::Parser;

use spatialbench::report;

#[derive(Parser, Debug)]
#[command(
    name = "summarize_results",
    about = "Summarize SpatialBench benchmark results into markdown"
)]
struct Args {
    /// Directory containing *_results.json files
    #[arg(long)]
    results_dir: PathBuf,

    /// Output markdown file
    #[arg(long, default_value = "benchmark_summary.md")]
    output: PathBuf,

    /// Query timeout in seconds (for reporting)
    #[arg(long, default_value_t = 60)]
    timeout: u64,

    /// Number of runs per query (for reporting)
    #[arg(long, default_value_t = 3)]
    runs: u32,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let results = report::load_results(&args.results_dir)?;
    if results.is_empty() {
        println!("No results found in {}", args.results_dir.display());
        std::fs::write(
            &args.output,
            "# SpatialBench Benchmark Results\n\nNo results found.",
        )?;
        return Ok(());
    }

    let markdown = report::generate_markdown(&results, args.timeout, args.runs);
    std::fs::write(&args.output, &markdown)?;
    println!("Summary written to {}", args.output.display());

    println!("\nPreview:");
    println!("{}", "-".repeat(60));
    let preview: String = markdown.chars().take(2000).collect();
    println!("{preview}");
    if markdown.chars().count() > 2000 {
        println!("...");
    }
    Ok(())
}
