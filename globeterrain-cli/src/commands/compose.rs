//! Grid export through a single composite request.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use clap::Args;
use globeterrain::coord::Sector;
use serde::Serialize;

use super::common::{emit, parse_sector, GlobalOptions};
use super::elevation::spinner;
use crate::error::CliError;

#[derive(Debug, Args)]
pub struct ComposeArgs {
    /// Sector as min_lat,max_lat,min_lon,max_lon
    #[arg(long, value_parser = parse_sector, allow_hyphen_values = true)]
    sector: Sector,

    /// Samples per row of the composite request
    #[arg(long, default_value_t = 256)]
    width: u32,

    /// Rows of the exported grid
    #[arg(long, default_value_t = 16)]
    rows: usize,

    /// Columns of the exported grid
    #[arg(long, default_value_t = 16)]
    cols: usize,

    /// Write the grid as CSV to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Dataset section or name (defaults to the first configured)
    #[arg(short, long)]
    dataset: Option<String>,
}

#[derive(Debug, Serialize)]
struct GridPoint {
    lat: f64,
    lon: f64,
    elevation: f64,
}

pub fn run(args: ComposeArgs, options: &GlobalOptions) -> Result<(), CliError> {
    if args.rows == 0 || args.cols == 0 {
        return Err(CliError::Config("--rows and --cols must be positive".to_string()));
    }

    let engine = options.start_engine()?;
    let model = engine.model(args.dataset.as_deref())?;

    let points = grid(&args.sector, args.rows, args.cols);
    let mut elevations = vec![0.0; points.len()];

    let bar = spinner("Requesting composite");
    let result = model.compose_elevations(&args.sector, &points, args.width, &mut elevations);
    bar.finish_and_clear();
    result?;

    let grid: Vec<GridPoint> = points
        .iter()
        .zip(&elevations)
        .map(|(&(lat, lon), &elevation)| GridPoint { lat, lon, elevation })
        .collect();

    match &args.output {
        Some(path) => {
            let mut writer = BufWriter::new(File::create(path)?);
            write_csv(&mut writer, &grid)?;
            writer.flush()?;
            eprintln!("Wrote {} points to {}", grid.len(), path.display());
            Ok(())
        }
        None => emit(options.json, &grid, |g| {
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            // Broken pipes are not worth reporting.
            let _ = write_csv(&mut out, g);
        }),
    }
}

/// Grid points row by row from the north-west corner.
fn grid(sector: &Sector, rows: usize, cols: usize) -> Vec<(f64, f64)> {
    let step = |count: usize, extent: f64| {
        if count > 1 {
            extent / (count - 1) as f64
        } else {
            0.0
        }
    };
    let lat_step = step(rows, sector.delta_lat());
    let lon_step = step(cols, sector.delta_lon());

    (0..rows)
        .flat_map(|row| {
            (0..cols).map(move |col| {
                (
                    sector.max_lat() - row as f64 * lat_step,
                    sector.min_lon() + col as f64 * lon_step,
                )
            })
        })
        .collect()
}

fn write_csv(out: &mut impl Write, grid: &[GridPoint]) -> std::io::Result<()> {
    writeln!(out, "lat,lon,elevation")?;
    for point in grid {
        writeln!(out, "{:.6},{:.6},{:.2}", point.lat, point.lon, point.elevation)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_corners() {
        let sector = Sector::new(10.0, 20.0, 30.0, 50.0).unwrap();
        let points = grid(&sector, 3, 5);
        assert_eq!(points.len(), 15);
        assert_eq!(points[0], (20.0, 30.0));
        assert_eq!(points[4], (20.0, 50.0));
        assert_eq!(points[14], (10.0, 50.0));
    }

    #[test]
    fn test_single_row() {
        let sector = Sector::new(10.0, 20.0, 30.0, 50.0).unwrap();
        assert_eq!(grid(&sector, 1, 1), vec![(20.0, 30.0)]);
    }

    #[test]
    fn test_csv() {
        let mut out = Vec::new();
        write_csv(
            &mut out,
            &[GridPoint {
                lat: 1.0,
                lon: 2.0,
                elevation: 3.456,
            }],
        )
        .unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "lat,lon,elevation\n1.000000,2.000000,3.46\n"
        );
    }
}
