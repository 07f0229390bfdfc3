//! Reference ellipsoid parameters.

use super::types::CoordError;

/// An oblate ellipsoid of revolution.
///
/// The eccentricity is derived from the two radii on construction and the
/// value is immutable afterwards, so a globe can never hold inconsistent
/// parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipsoid {
    equatorial_radius: f64,
    polar_radius: f64,
    eccentricity_squared: f64,
}

impl Ellipsoid {
    /// WGS 84 (a = 6 378 137 m, 1/f = 298.257 223 563).
    pub const WGS84: Ellipsoid = Ellipsoid {
        equatorial_radius: 6_378_137.0,
        polar_radius: 6_356_752.314_245_179,
        eccentricity_squared: 0.006_694_379_990_141_316,
    };

    /// Creates an ellipsoid from its equatorial and polar radii in meters.
    pub fn new(equatorial_radius: f64, polar_radius: f64) -> Result<Self, CoordError> {
        if !(equatorial_radius.is_finite() && polar_radius.is_finite()) {
            return Err(CoordError::InvalidEllipsoid(
                "radii must be finite".to_string(),
            ));
        }
        if polar_radius <= 0.0 || equatorial_radius < polar_radius {
            return Err(CoordError::InvalidEllipsoid(format!(
                "expected equatorial radius >= polar radius > 0, got {} and {}",
                equatorial_radius, polar_radius
            )));
        }
        let ratio = polar_radius / equatorial_radius;
        Ok(Self {
            equatorial_radius,
            polar_radius,
            eccentricity_squared: 1.0 - ratio * ratio,
        })
    }

    /// Creates an ellipsoid from a semi-major axis and inverse flattening.
    pub fn from_inverse_flattening(
        equatorial_radius: f64,
        inverse_flattening: f64,
    ) -> Result<Self, CoordError> {
        if inverse_flattening <= 1.0 {
            return Err(CoordError::InvalidEllipsoid(format!(
                "inverse flattening must exceed 1, got {}",
                inverse_flattening
            )));
        }
        Self::new(
            equatorial_radius,
            equatorial_radius * (1.0 - 1.0 / inverse_flattening),
        )
    }

    pub fn equatorial_radius(&self) -> f64 {
        self.equatorial_radius
    }

    pub fn polar_radius(&self) -> f64 {
        self.polar_radius
    }

    /// First eccentricity squared, `1 - b²/a²`.
    pub fn eccentricity_squared(&self) -> f64 {
        self.eccentricity_squared
    }

    pub fn flattening(&self) -> f64 {
        1.0 - self.polar_radius / self.equatorial_radius
    }
}

impl Default for Ellipsoid {
    fn default() -> Self {
        Self::WGS84
    }
}
