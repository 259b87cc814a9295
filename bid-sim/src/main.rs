use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use bid_sim::io::{default_output_path, read_table, write_table};
use bid_sim::{CorrectionScope, EstimatorPolicy, SimConfig, Summary, simulate};

/// Simulate fair-price allocations from baseline costs and two bid periods.
#[derive(Debug, Parser)]
#[command(name = "bid-sim", version)]
struct Args {
    /// Input table (.xlsx, .csv or .parquet). Prompted for when omitted.
    input: Option<PathBuf>,

    /// Output table; defaults to `simulator<input stem>.<ext>`.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// TOML config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Estimator policy revision (overrides the config file).
    #[arg(long, value_enum)]
    policy: Option<EstimatorPolicy>,

    /// Scope of the zero-price1 correction gate (overrides the config file).
    #[arg(long, value_enum)]
    correction_scope: Option<CorrectionScope>,

    /// Also write the run summary as JSON.
    #[arg(long)]
    summary_json: Option<PathBuf>,

    /// Write per-row audit tables (one parquet file per stage) here.
    #[cfg(feature = "instrument")]
    #[arg(long)]
    audit_dir: Option<PathBuf>,
}

fn init_tracing(audit: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_filter(filter);
    let registry = tracing_subscriber::registry().with(fmt);

    #[cfg(feature = "instrument")]
    registry
        .with(audit.then(instrument::AuditLayer::default))
        .init();

    #[cfg(not(feature = "instrument"))]
    {
        let _ = audit;
        registry.init();
    }
}

fn prompt_for_input() -> Result<PathBuf> {
    print!("Input table path: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let path = line.trim();
    if path.is_empty() {
        bail!("no input file given");
    }
    Ok(PathBuf::from(path))
}

fn load_config(args: &Args) -> Result<SimConfig> {
    let mut config = match &args.config {
        Some(path) => SimConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => SimConfig::default(),
    };
    if let Some(policy) = args.policy {
        config.policy = policy;
    }
    if let Some(scope) = args.correction_scope {
        config.correction_scope = Some(scope);
    }
    Ok(config)
}

fn write_summary_json(summary: &Summary, path: &Path) -> Result<()> {
    let json = summary.to_json()?;
    std::fs::write(path, json).with_context(|| format!("writing summary {}", path.display()))
}

fn run(args: Args) -> Result<()> {
    let input = match &args.input {
        Some(path) => path.clone(),
        None => prompt_for_input()?,
    };
    let config = load_config(&args)?;

    let table = read_table(&input)?;
    println!("Loaded '{}': {} rows", input.display(), table.row_count());

    let output = match &args.output {
        Some(path) => path.clone(),
        None => default_output_path(&input)?,
    };

    let outcome = simulate(table, &config)?;
    let summary = Summary::new(&outcome, config.policy);
    println!("\n{summary}");

    write_table(&outcome.table, &output)?;
    println!("Wrote '{}'", output.display());

    if let Some(path) = &args.summary_json {
        write_summary_json(&summary, path)?;
    }

    #[cfg(feature = "instrument")]
    if let Some(dir) = &args.audit_dir {
        instrument::drain()
            .save_parquet(dir)
            .with_context(|| format!("writing audit tables to {}", dir.display()))?;
    }

    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    #[cfg(feature = "instrument")]
    init_tracing(args.audit_dir.is_some());
    #[cfg(not(feature = "instrument"))]
    init_tracing(false);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
