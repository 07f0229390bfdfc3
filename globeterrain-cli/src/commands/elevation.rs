//! Point elevation query.

use std::thread;
use std::time::{Duration, Instant};

use clap::Args;
use globeterrain::coord::Sector;
use globeterrain::elevation::TileState;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use super::common::{emit, GlobalOptions};
use crate::error::CliError;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Args)]
pub struct ElevationArgs {
    /// Latitude in degrees
    #[arg(long, allow_hyphen_values = true)]
    lat: f64,

    /// Longitude in degrees
    #[arg(long, allow_hyphen_values = true)]
    lon: f64,

    /// Dataset section or name (defaults to the first configured)
    #[arg(short, long)]
    dataset: Option<String>,

    /// Seconds to wait for missing tiles before answering
    #[arg(long, value_name = "SECS")]
    wait: Option<f64>,
}

#[derive(Debug, Serialize)]
struct ElevationReport {
    dataset: String,
    lat: f64,
    lon: f64,
    elevation: f64,
    best_resolution: f64,
    finest_tile_state: String,
    missing_data_replacement: f64,
}

pub fn run(args: ElevationArgs, options: &GlobalOptions) -> Result<(), CliError> {
    let engine = options.start_engine()?;
    let model = engine.model(args.dataset.as_deref())?;

    let mut elevation = model.get_elevation(args.lat, args.lon)?;

    if let Some(wait) = args.wait {
        let wait = Duration::try_from_secs_f64(wait)
            .map_err(|e| CliError::Config(format!("invalid --wait: {}", e)))?;
        let deadline = Instant::now() + wait;
        let spinner = spinner("Fetching tiles");
        while model.retriever().in_flight_count() > 0 && Instant::now() < deadline {
            thread::sleep(POLL_INTERVAL);
            spinner.tick();
            elevation = model.get_elevation(args.lat, args.lon)?;
        }
        spinner.finish_and_clear();
    }

    let point = Sector::new(args.lat, args.lat, args.lon, args.lon)?;
    let levels = model.level_set();
    let finest = levels.last_level_at(args.lat, args.lon);
    let state = match levels.tile_for_location(finest, args.lat, args.lon) {
        Ok(key) if model.contains(args.lat, args.lon) => model.tile_state(&key),
        _ => TileState::Absent,
    };

    let report = ElevationReport {
        dataset: model.config().section.clone(),
        lat: args.lat,
        lon: args.lon,
        elevation,
        best_resolution: model.get_best_resolution(&point)?,
        finest_tile_state: format!("{:?}", state),
        missing_data_replacement: model.missing_data_policy().replacement,
    };

    emit(options.json, &report, |r| {
        println!("{:.2} m at ({}, {}) [{}]", r.elevation, r.lat, r.lon, r.dataset);
        if r.finest_tile_state != "Resident" {
            println!(
                "  finest tile {}; value may come from a coarser level",
                r.finest_tile_state.to_lowercase()
            );
        }
    })
}

pub(crate) fn spinner(message: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}
