//! Build an extremes table from cached tiles.

use std::path::PathBuf;

use clap::Args;
use serde::Serialize;

use super::common::{emit, GlobalOptions};
use crate::error::CliError;

#[derive(Debug, Args)]
pub struct BuildExtremesArgs {
    /// Dataset section or name (defaults to the first configured)
    #[arg(short, long)]
    dataset: Option<String>,

    /// Level to build at (defaults to the configured extremes_level)
    #[arg(long)]
    level: Option<usize>,

    /// Output file (defaults to the configured extremes_file)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct BuildReport {
    dataset: String,
    level: usize,
    tiles: usize,
    path: PathBuf,
}

pub fn run(args: BuildExtremesArgs, options: &GlobalOptions) -> Result<(), CliError> {
    let engine = options.start_engine()?;
    let base = engine.model(args.dataset.as_deref())?;

    let path = args
        .output
        .or_else(|| base.config().extremes_file.clone())
        .ok_or_else(|| {
            CliError::Config(format!(
                "no --output given and [{}] has no extremes_file",
                base.config().section
            ))
        })?;

    let model = match args.level {
        Some(level) => {
            let mut config = base.config().clone();
            config.extremes_level = level;
            config.extremes_file = None;
            engine.context.model_for(config)?
        }
        None => base,
    };

    let table = model.build_extremes()?;
    table.save(&path)?;

    let report = BuildReport {
        dataset: model.config().section.clone(),
        level: table.level(),
        tiles: table.len(),
        path,
    };
    emit(options.json, &report, |r| {
        println!(
            "Wrote extremes for {} tiles at level {} to {}",
            r.tiles,
            r.level,
            r.path.display()
        );
    })
}
