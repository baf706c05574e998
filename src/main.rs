use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use backflip::app::Analyzer;
use backflip::{Config, DataSource};
use clap::Parser;

/// Jump and flip analysis from a sensor CSV export.
#[derive(Debug, Parser)]
#[command(name = "backflip", version)]
struct Cli {
    /// CSV data file
    #[arg(short = 'c', long = "csv")]
    csv: PathBuf,

    /// Jump run number
    #[arg(short = 'j', long = "jump", value_parser = clap::value_parser!(u32).range(1..))]
    jump: Option<u32>,

    /// Flip run number
    #[arg(short = 'f', long = "flip", value_parser = clap::value_parser!(u32).range(1..))]
    flip: Option<u32>,

    /// JSON file overriding limits, solver settings and constants
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print reports as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    if cli.jump.is_none() && cli.flip.is_none() {
        bail!("No runs specified. Use -j for jump run or -f for flip run");
    }

    let config = match &cli.config {
        Some(path) => Config::from_path(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => Config::default(),
    };

    let source = DataSource::open(&cli.csv, config.limits.clone())
        .with_context(|| format!("opening {}", cli.csv.display()))?;
    let mut analyzer = Analyzer::new(source, config);

    let mut reports = Vec::new();
    if let Some(run) = cli.jump {
        reports.push(analyzer.jump(run).with_context(|| format!("jump run {run}"))?);
    }
    if let Some(run) = cli.flip {
        reports.push(analyzer.flip(run).with_context(|| format!("flip run {run}"))?);
    }
    analyzer.finish();

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&reports).context("serializing reports")?
        );
    } else {
        println!("=== Backflip Analyzer ===\n");
        for report in &reports {
            println!("{report}");
        }
    }

    Ok(())
}
