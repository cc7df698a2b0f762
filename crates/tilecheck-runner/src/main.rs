//! `tilecheck`: validate vector tiles against the dataset they were built from.
//!
//! ```text
//! tilecheck --config check.yaml
//! tilecheck --config check.yaml --dataset heat --tile 6/33/28 --strategy point-query -v
//! ```
//!
//! Exit status is 0 when no tile failed, 1 when a tile failed validation or
//! could not be validated, and 2 when the batch itself could not run.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tilecheck_geo::TileAddress;
use tilecheck_runner::{DirectoryTileProvider, RunError, Runner, TileOutcome, ValidationConfig};
use tilecheck_source::CancelFlag;
use tilecheck_validate::{Strategy, Verdict};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "tilecheck", version, about = "Validate vector tiles against their source dataset")]
struct Cli {
    /// YAML configuration file
    #[arg(short, long)]
    config: PathBuf,

    /// Only validate this dataset
    #[arg(short, long)]
    dataset: Option<String>,

    /// Validate these tiles instead of the configured ones (z/x/y, repeatable)
    #[arg(short, long = "tile", value_name = "Z/X/Y")]
    tiles: Vec<TileAddress>,

    /// Override the configured strategy
    #[arg(short, long, value_name = "aggregate|point-query")]
    strategy: Option<Strategy>,

    /// Override the tile cache directory
    #[arg(long)]
    tiles_dir: Option<PathBuf>,

    /// Number of tiles validated concurrently
    #[arg(short, long)]
    jobs: Option<usize>,

    /// List at most this many failing keys per tile in text output
    #[arg(long)]
    max_listed: Option<usize>,

    /// Print one JSON document instead of text reports
    #[arg(long)]
    json: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Apply command-line overrides on top of the loaded configuration.
fn apply_overrides(cli: &Cli, config: &mut ValidationConfig) -> Result<(), RunError> {
    if let Some(name) = &cli.dataset {
        config.retain_dataset(name)?;
    }
    if let Some(dir) = &cli.tiles_dir {
        config.tiles_dir = dir.clone();
    }
    if let Some(jobs) = cli.jobs {
        if jobs == 0 {
            return Err(RunError::Config("--jobs must be at least 1".to_string()));
        }
        config.jobs = jobs;
    }
    for dataset in &mut config.datasets {
        if let Some(strategy) = cli.strategy {
            dataset.strategy = strategy;
        }
        if !cli.tiles.is_empty() {
            dataset.tiles = cli
                .tiles
                .iter()
                .map(|t| [u32::from(t.z()), t.x(), t.y()])
                .collect();
        }
    }
    Ok(())
}

fn run(cli: Cli) -> Result<bool, RunError> {
    let mut config = ValidationConfig::from_file(&cli.config)?;
    apply_overrides(&cli, &mut config)?;

    let cancel = CancelFlag::new();
    let handler_flag = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        handler_flag.cancel();
    }) {
        warn!("Could not install Ctrl-C handler: {}", e);
    }

    let mut runner = Runner::new(DirectoryTileProvider::new(&config.tiles_dir))
        .jobs(config.jobs)
        .with_cancel(cancel);
    if !cli.json {
        let max_listed = cli.max_listed;
        runner = runner.on_tile(Box::new(move |outcome: &TileOutcome| {
            print!("{}", outcome.text(max_listed));
        }));
    }

    let report = runner.run(&config)?;
    if cli.json {
        println!("{:#}", report.json_value()?);
    } else {
        println!(
            "Summary: {} passed, {} failed, {} inconclusive, {} errored",
            report.count(Verdict::Pass),
            report.count(Verdict::Fail),
            report.count(Verdict::Inconclusive),
            report.errored()
        );
    }
    Ok(!report.any_failed())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    info!("tilecheck {}", env!("CARGO_PKG_VERSION"));

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::from(2)
        }
    }
}
