//! Geographic value types shared by every layer of the engine.

use std::fmt;

use thiserror::Error;

/// Minimum valid latitude in degrees.
pub const MIN_LAT: f64 = -90.0;

/// Maximum valid latitude in degrees.
pub const MAX_LAT: f64 = 90.0;

/// Minimum valid longitude in degrees.
pub const MIN_LON: f64 = -180.0;

/// Maximum valid longitude in degrees.
pub const MAX_LON: f64 = 180.0;

/// Errors raised for malformed geographic input.
///
/// These are programming errors on the caller's side: the engine never clamps
/// or wraps an out-of-range coordinate on their behalf.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordError {
    #[error("Invalid latitude: {0} (must be within [-90, 90])")]
    InvalidLatitude(f64),

    #[error("Invalid longitude: {0} (must be within [-180, 180])")]
    InvalidLongitude(f64),

    #[error("Invalid elevation: {0}")]
    InvalidElevation(f64),

    #[error("Invalid sector: {axis} minimum {min} exceeds maximum {max}")]
    InvertedSector {
        axis: &'static str,
        min: f64,
        max: f64,
    },

    #[error("Invalid ellipsoid: {0}")]
    InvalidEllipsoid(String),
}

/// Checks a latitude/longitude pair, rejecting NaN and out-of-range values.
#[inline]
pub fn validate_location(lat: f64, lon: f64) -> Result<(), CoordError> {
    if lat.is_nan() || !(MIN_LAT..=MAX_LAT).contains(&lat) {
        return Err(CoordError::InvalidLatitude(lat));
    }
    if lon.is_nan() || !(MIN_LON..=MAX_LON).contains(&lon) {
        return Err(CoordError::InvalidLongitude(lon));
    }
    Ok(())
}

/// A geodetic position: latitude and longitude in degrees, elevation in meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPosition {
    pub lat: f64,
    pub lon: f64,
    pub elevation: f64,
}

impl GeoPosition {
    /// Creates a validated position.
    pub fn new(lat: f64, lon: f64, elevation: f64) -> Result<Self, CoordError> {
        validate_location(lat, lon)?;
        if !elevation.is_finite() {
            return Err(CoordError::InvalidElevation(elevation));
        }
        Ok(Self {
            lat,
            lon,
            elevation,
        })
    }

    /// Creates a position from values that are already known to be valid,
    /// such as the output of a Cartesian inversion.
    pub(crate) fn from_degrees_unchecked(lat: f64, lon: f64, elevation: f64) -> Self {
        Self {
            lat,
            lon,
            elevation,
        }
    }
}

impl fmt::Display for GeoPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({:.6}°, {:.6}°, {:.3} m)",
            self.lat, self.lon, self.elevation
        )
    }
}

/// An axis-aligned latitude/longitude rectangle in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sector {
    min_lat: f64,
    max_lat: f64,
    min_lon: f64,
    max_lon: f64,
}

impl Sector {
    /// The whole globe.
    pub const FULL_SPHERE: Sector = Sector {
        min_lat: MIN_LAT,
        max_lat: MAX_LAT,
        min_lon: MIN_LON,
        max_lon: MAX_LON,
    };

    /// Creates a sector, rejecting inverted bounds and out-of-range values.
    pub fn new(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Result<Self, CoordError> {
        validate_location(min_lat, min_lon)?;
        validate_location(max_lat, max_lon)?;
        if min_lat > max_lat {
            return Err(CoordError::InvertedSector {
                axis: "latitude",
                min: min_lat,
                max: max_lat,
            });
        }
        if min_lon > max_lon {
            return Err(CoordError::InvertedSector {
                axis: "longitude",
                min: min_lon,
                max: max_lon,
            });
        }
        Ok(Self {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        })
    }

    /// Builds a sector from bounds computed internally from valid inputs.
    pub(crate) fn from_bounds_unchecked(
        min_lat: f64,
        max_lat: f64,
        min_lon: f64,
        max_lon: f64,
    ) -> Self {
        Self {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        }
    }

    pub fn min_lat(&self) -> f64 {
        self.min_lat
    }

    pub fn max_lat(&self) -> f64 {
        self.max_lat
    }

    pub fn min_lon(&self) -> f64 {
        self.min_lon
    }

    pub fn max_lon(&self) -> f64 {
        self.max_lon
    }

    pub fn delta_lat(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    pub fn delta_lon(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    /// Center of the sector as (lat, lon).
    pub fn centroid(&self) -> (f64, f64) {
        (
            (self.min_lat + self.max_lat) * 0.5,
            (self.min_lon + self.max_lon) * 0.5,
        )
    }

    /// Returns true if the location lies inside or on the edge of the sector.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lon >= self.min_lon && lon <= self.max_lon
    }

    /// Returns true if `other` lies entirely within this sector.
    pub fn contains_sector(&self, other: &Sector) -> bool {
        other.min_lat >= self.min_lat
            && other.max_lat <= self.max_lat
            && other.min_lon >= self.min_lon
            && other.max_lon <= self.max_lon
    }

    /// Returns true if the two sectors share any area or edge.
    pub fn intersects(&self, other: &Sector) -> bool {
        self.min_lat <= other.max_lat
            && self.max_lat >= other.min_lat
            && self.min_lon <= other.max_lon
            && self.max_lon >= other.min_lon
    }

    /// The overlapping region, if any.
    pub fn intersection(&self, other: &Sector) -> Option<Sector> {
        if !self.intersects(other) {
            return None;
        }
        Some(Sector {
            min_lat: self.min_lat.max(other.min_lat),
            max_lat: self.max_lat.min(other.max_lat),
            min_lon: self.min_lon.max(other.min_lon),
            max_lon: self.max_lon.min(other.max_lon),
        })
    }
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}°, {}°] x [{}°, {}°]",
            self.min_lat, self.max_lat, self.min_lon, self.max_lon
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_rejects_nan() {
        assert!(matches!(
            GeoPosition::new(f64::NAN, 0.0, 0.0),
            Err(CoordError::InvalidLatitude(_))
        ));
        assert!(matches!(
            GeoPosition::new(0.0, f64::NAN, 0.0),
            Err(CoordError::InvalidLongitude(_))
        ));
        assert!(matches!(
            GeoPosition::new(0.0, 0.0, f64::INFINITY),
            Err(CoordError::InvalidElevation(_))
        ));
    }

    #[test]
    fn test_position_rejects_out_of_range() {
        assert!(GeoPosition::new(90.5, 0.0, 0.0).is_err());
        assert!(GeoPosition::new(0.0, -180.5, 0.0).is_err());
        assert!(GeoPosition::new(-90.0, 180.0, 0.0).is_ok());
    }

    #[test]
    fn test_sector_rejects_inverted_bounds() {
        let err = Sector::new(10.0, 5.0, 0.0, 1.0).unwrap_err();
        assert!(matches!(
            err,
            CoordError::InvertedSector {
                axis: "latitude",
                ..
            }
        ));
        assert!(err.to_string().contains("exceeds"));

        let err = Sector::new(0.0, 1.0, 20.0, -20.0).unwrap_err();
        assert!(matches!(
            err,
            CoordError::InvertedSector {
                axis: "longitude",
                ..
            }
        ));
    }

    #[test]
    fn test_sector_contains_edges() {
        let sector = Sector::new(0.0, 10.0, 20.0, 30.0).unwrap();
        assert!(sector.contains(0.0, 20.0));
        assert!(sector.contains(10.0, 30.0));
        assert!(!sector.contains(10.1, 25.0));
    }

    #[test]
    fn test_sector_intersection() {
        let a = Sector::new(0.0, 10.0, 0.0, 10.0).unwrap();
        let b = Sector::new(5.0, 15.0, -5.0, 5.0).unwrap();
        let overlap = a.intersection(&b).unwrap();
        assert_eq!(overlap, Sector::new(5.0, 10.0, 0.0, 5.0).unwrap());

        let far = Sector::new(50.0, 60.0, 50.0, 60.0).unwrap();
        assert!(a.intersection(&far).is_none());
    }

    #[test]
    fn test_full_sphere_contains_everything() {
        assert!(Sector::FULL_SPHERE.contains(-90.0, -180.0));
        assert!(Sector::FULL_SPHERE.contains(90.0, 180.0));
        assert_eq!(Sector::FULL_SPHERE.centroid(), (0.0, 0.0));
    }
}
