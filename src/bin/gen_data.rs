//! Generate a synthetic benchmark dataset.

use std::path::PathBuf;

use clap::Parser;

use spatialbench::datagen::{generate, GenConfig};

#[derive(Parser, Debug)]
#[command(
    name = "gen_data",
    about = "Generate the synthetic trip/zone/building dataset as parquet"
)]
struct Args {
    /// Directory to write the parquet tables into
    #[arg(long)]
    out_dir: PathBuf,

    /// Scale factor controlling table sizes
    #[arg(long, default_value_t = 1.0)]
    scale_factor: f64,

    /// RNG seed; the same seed reproduces the same dataset
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let cfg = GenConfig {
        scale_factor: args.scale_factor,
        seed: args.seed,
    };
    let counts = generate(&args.out_dir, &cfg)?;
    println!(
        "Generated scale factor {} dataset in {}:",
        args.scale_factor,
        args.out_dir.display()
    );
    for (table, rows) in counts {
        println!("  {table}: {rows} rows");
    }
    Ok(())
}
