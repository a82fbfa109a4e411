//! Active State CLI Application
//!
//! Replays navigation scenarios against the active-state library and
//! reports, step by step, which markers each tracker applies:
//! - Builds a state catalog and router per scenario
//! - Mounts trackers with their links and direct targets
//! - Navigates through the scripted steps
//! - Prints a text report

use anyhow::{Context, Result};
use clap::Parser;
use rayon::prelude::*;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

mod config;
mod report;
mod scenario;

/// Active State - Replay navigation scenarios and show active markers
#[derive(Parser, Debug)]
#[command(name = "active-state-cli")]
#[command(about = "Replay navigation scenarios and show which markers apply", long_about = None)]
#[command(version)]
struct Args {
    /// Scenario file(s) (scenario.toml)
    #[arg(value_name = "FILE", required = true)]
    scenarios: Vec<PathBuf>,

    /// Output file for the report (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    log::info!("Active State CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using active-state library v{}", active_state::VERSION);

    // Each scenario owns its single-threaded engine; only reports cross threads
    let reports = args
        .scenarios
        .par_iter()
        .map(|path| {
            let scenario = config::load_scenario(path)?;
            scenario::run_scenario(&scenario, path)
        })
        .collect::<Result<Vec<_>>>()?;

    let generated_at = chrono::Local::now();
    match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {:?}", path))?;
            let mut out = BufWriter::new(file);
            report::write_txt(&mut out, &reports, generated_at)?;
            out.flush()?;
            log::info!("Report written to {:?}", path);
        }
        None => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            report::write_txt(&mut out, &reports, generated_at)?;
        }
    }

    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
