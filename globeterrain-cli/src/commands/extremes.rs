//! Extremes query.

use clap::Args;
use serde::Serialize;

use super::common::{emit, parse_sector, GlobalOptions};
use crate::error::CliError;
use globeterrain::coord::Sector;

#[derive(Debug, Args)]
pub struct ExtremesArgs {
    /// Sector as min_lat,max_lat,min_lon,max_lon
    #[arg(long, value_parser = parse_sector, allow_hyphen_values = true, conflicts_with_all = ["lat", "lon"])]
    sector: Option<Sector>,

    /// Latitude in degrees
    #[arg(long, allow_hyphen_values = true, requires = "lon")]
    lat: Option<f64>,

    /// Longitude in degrees
    #[arg(long, allow_hyphen_values = true, requires = "lat")]
    lon: Option<f64>,

    /// Dataset section or name (defaults to the first configured)
    #[arg(short, long)]
    dataset: Option<String>,
}

#[derive(Debug, Serialize)]
struct ExtremesReport {
    dataset: String,
    min: f64,
    max: f64,
    from_table: bool,
}

pub fn run(args: ExtremesArgs, options: &GlobalOptions) -> Result<(), CliError> {
    let engine = options.start_engine()?;
    let model = engine.model(args.dataset.as_deref())?;

    let sector = match (args.sector, args.lat, args.lon) {
        (Some(sector), _, _) => sector,
        (None, Some(lat), Some(lon)) => Sector::new(lat, lat, lon, lon)?,
        _ => {
            return Err(CliError::Config(
                "give either --sector or --lat and --lon".to_string(),
            ))
        }
    };

    let (min, max) = model.get_extreme_elevations(&sector)?;
    let from_table = model
        .extremes_table()
        .and_then(|table| table.lookup(model.level_set(), &sector))
        .is_some();

    let report = ExtremesReport {
        dataset: model.config().section.clone(),
        min,
        max,
        from_table,
    };
    emit(options.json, &report, |r| {
        let source = if r.from_table { "extremes table" } else { "resident tiles or configured range" };
        println!("min {:.1} m, max {:.1} m ({})", r.min, r.max, source);
    })
}
