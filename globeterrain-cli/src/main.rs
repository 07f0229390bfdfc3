//! globeterrain CLI - Command-line interface
//!
//! Coordinate conversion, elevation queries and dataset maintenance on top
//! of the globeterrain library.

mod commands;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::style;

use commands::build_extremes::BuildExtremesArgs;
use commands::compose::ComposeArgs;
use commands::config::ConfigCommands;
use commands::convert::ConvertCommands;
use commands::elevation::ElevationArgs;
use commands::extremes::ExtremesArgs;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "globeterrain", version, about = "Terrain data engine for virtual globes")]
struct Cli {
    /// Configuration file (defaults to the user configuration directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Convert between geodetic and Cartesian coordinates (WGS84)
    Convert {
        #[command(subcommand)]
        command: ConvertCommands,
    },

    /// Query the elevation at a location
    Elevation(ElevationArgs),

    /// Show minimum and maximum elevation over a sector or location
    Extremes(ExtremesArgs),

    /// Export an elevation grid from one composite request
    Compose(ComposeArgs),

    /// Build an extremes table from the disk cache
    BuildExtremes(BuildExtremesArgs),

    /// Inspect the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("{} {}", style("error:").red().bold(), e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let options = commands::common::GlobalOptions {
        config: cli.config,
        json: cli.json,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Convert { command } => commands::convert::run(command, &options),
        Commands::Elevation(args) => commands::elevation::run(args, &options),
        Commands::Extremes(args) => commands::extremes::run(args, &options),
        Commands::Compose(args) => commands::compose::run(args, &options),
        Commands::BuildExtremes(args) => commands::build_extremes::run(args, &options),
        Commands::Config { command } => commands::config::run(command, &options),
    }
}
