//! TerraMosaic CLI
//!
//! Builds cloud-minimal seasonal satellite mosaics and aligned road-network
//! raster masks over a shared on-disk data layout.

mod commands;
mod error;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::common::DataArgs;
use error::CliError;

#[derive(Parser)]
#[command(name = "terramosaic", version, about, long_about = None)]
struct Cli {
    /// Enable debug logging (RUST_LOG overrides)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download imagery and composite seasonal mosaics for every region
    Mosaics {
        #[command(flatten)]
        data: DataArgs,
    },
    /// Rasterize road networks into masks aligned with the mosaics
    Roads {
        #[command(flatten)]
        data: DataArgs,
    },
    /// Run the full pipeline: mosaics, then road masks
    Run {
        #[command(flatten)]
        data: DataArgs,
    },
    /// List the regions configured in the data layout
    Regions {
        /// Root of the data layout
        #[arg(long, env = "TERRAMOSAIC_DATA_ROOT")]
        data_root: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn dispatch(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Mosaics { data } => commands::mosaics::run(&data),
        Command::Roads { data } => commands::roads::run(&data),
        Command::Run { data } => commands::run::run(&data),
        Command::Regions { data_root } => commands::regions::run(&data_root),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match dispatch(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("Error: {error}");
            ExitCode::FAILURE
        }
    }
}
