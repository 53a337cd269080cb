//! Entry scanner binary
//!
//! Analyze one or more candle CSV files and print the entries as JSON.

use std::{
    collections::{BTreeMap, HashMap},
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use clap::Parser;
use entryscan::{data, prelude::*};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "entryscan")]
#[command(about = "Detect limit-catch and in-price entries in OHLC candles", long_about = None)]
struct Args {
    /// CSV files with timestamp, open, high, low and close columns
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// JSON detector configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run only these strategies (limit-catch, in-price)
    #[arg(long = "only", value_name = "STRATEGY")]
    only: Vec<Strategy>,

    /// Reject malformed candles and unordered timestamps
    #[arg(long)]
    validate: bool,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout carries the JSON payload
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .init();
}

fn build_analyzer(args: &Args) -> Result<Analyzer> {
    let config = match &args.config {
        Some(path) => AnalyzerConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => AnalyzerConfig::default(),
    };

    let mut builder = AnalyzerBuilder::from_config(config);
    if args.validate {
        builder = builder.validate_data(true);
    }
    if !args.only.is_empty() {
        builder = builder.only_strategies(args.only.iter().copied());
    }
    builder.build().context("Invalid detector configuration")
}

fn symbol_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Output keys: the file stem, or the full path when stems collide.
fn symbols_for(paths: &[PathBuf]) -> Vec<String> {
    let stems: Vec<String> = paths.iter().map(|p| symbol_of(p)).collect();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for stem in &stems {
        *counts.entry(stem.as_str()).or_default() += 1;
    }

    paths
        .iter()
        .zip(&stems)
        .map(|(path, stem)| {
            if counts[stem.as_str()] > 1 {
                warn!(file = %path.display(), stem = %stem, "file stem is ambiguous, keying by path");
                path.display().to_string()
            } else {
                stem.clone()
            }
        })
        .collect()
}

fn to_json<S: serde::Serialize>(value: &S, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(json)
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let analyzer = build_analyzer(&args)?;

    if let [path] = args.files.as_slice() {
        let candles = data::load_csv(path)
            .with_context(|| format!("Failed to load {}", path.display()))?;
        let report = analyzer
            .analyze(&candles)
            .with_context(|| format!("Failed to analyze {}", path.display()))?;
        println!("{}", to_json(&report.to_response(), args.pretty)?);
        return Ok(());
    }

    let mut failed = 0usize;
    let mut loaded = Vec::with_capacity(args.files.len());
    for (path, symbol) in args.files.iter().zip(symbols_for(&args.files)) {
        match data::load_csv(path) {
            Ok(candles) => loaded.push((symbol, candles)),
            Err(e) => {
                error!(file = %path.display(), error = %e, "failed to load candles");
                failed += 1;
            }
        }
    }
    info!(instruments = loaded.len(), "analyzing");

    let instruments: Vec<(&str, &[Candle])> = loaded
        .iter()
        .map(|(symbol, candles)| (symbol.as_str(), candles.as_slice()))
        .collect();
    let (results, errors) = analyze_parallel(&analyzer, instruments);
    failed += errors.len();

    let payload: BTreeMap<_, _> = results
        .iter()
        .map(|r| (r.symbol.as_str(), r.report.to_response()))
        .collect();
    println!("{}", to_json(&payload, args.pretty)?);

    if failed > 0 {
        bail!("{failed} of {} files failed", args.files.len());
    }
    Ok(())
}
