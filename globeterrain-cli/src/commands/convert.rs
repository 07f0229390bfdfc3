//! Coordinate conversion commands.

use clap::Subcommand;
use globeterrain::coord::{DVec3, Globe};
use serde::Serialize;

use super::common::{emit, GlobalOptions};
use crate::error::CliError;

#[derive(Debug, Subcommand)]
pub enum ConvertCommands {
    /// Geodetic latitude/longitude/height to Cartesian X/Y/Z
    ToCartesian {
        /// Latitude in degrees
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        /// Longitude in degrees
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        /// Height above the ellipsoid in meters
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        height: f64,
    },

    /// Cartesian X/Y/Z to geodetic latitude/longitude/height
    ToGeodetic {
        #[arg(long, allow_hyphen_values = true)]
        x: f64,
        #[arg(long, allow_hyphen_values = true)]
        y: f64,
        #[arg(long, allow_hyphen_values = true)]
        z: f64,
    },
}

#[derive(Debug, Serialize)]
struct Cartesian {
    x: f64,
    y: f64,
    z: f64,
}

#[derive(Debug, Serialize)]
struct Geodetic {
    lat: f64,
    lon: f64,
    height: f64,
}

pub fn run(command: ConvertCommands, options: &GlobalOptions) -> Result<(), CliError> {
    let globe = Globe::wgs84();
    match command {
        ConvertCommands::ToCartesian { lat, lon, height } => {
            let point = globe.geodetic_to_cartesian(lat, lon, height)?;
            let result = Cartesian {
                x: point.x,
                y: point.y,
                z: point.z,
            };
            emit(options.json, &result, |c| {
                println!("x = {:.4} m", c.x);
                println!("y = {:.4} m", c.y);
                println!("z = {:.4} m", c.z);
            })
        }
        ConvertCommands::ToGeodetic { x, y, z } => {
            let position = globe.cartesian_to_geodetic(DVec3::new(x, y, z));
            let result = Geodetic {
                lat: position.lat,
                lon: position.lon,
                height: position.elevation,
            };
            emit(options.json, &result, |g| {
                println!("lat    = {:.9}°", g.lat);
                println!("lon    = {:.9}°", g.lon);
                println!("height = {:.4} m", g.height);
            })
        }
    }
}
