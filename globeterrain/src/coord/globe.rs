//! Geodetic ↔ Cartesian conversion on a single reference ellipsoid.
//!
//! The Cartesian frame is centered on the ellipsoid with the y-axis pointing
//! at the north pole, the z-axis pointing at (0°, 0°) and the x-axis at
//! (0°, 90°E), which makes the frame right-handed.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_6, SQRT_2};

use glam::{DMat4, DVec3};

use super::ellipsoid::Ellipsoid;
use super::types::{validate_location, CoordError, GeoPosition};

/// Stateless coordinate engine bound to one ellipsoid.
///
/// Every method is a pure function of its arguments and the ellipsoid, so a
/// `Globe` can be shared between threads without synchronization.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Globe {
    ellipsoid: Ellipsoid,
}

impl Globe {
    pub fn new(ellipsoid: Ellipsoid) -> Self {
        Self { ellipsoid }
    }

    /// A globe on the WGS 84 ellipsoid.
    pub fn wgs84() -> Self {
        Self::new(Ellipsoid::WGS84)
    }

    pub fn ellipsoid(&self) -> &Ellipsoid {
        &self.ellipsoid
    }

    /// Converts a geodetic position (degrees, meters) to Cartesian meters.
    pub fn geodetic_to_cartesian(
        &self,
        lat: f64,
        lon: f64,
        elevation: f64,
    ) -> Result<DVec3, CoordError> {
        validate_location(lat, lon)?;
        if !elevation.is_finite() {
            return Err(CoordError::InvalidElevation(elevation));
        }
        Ok(self.point_from_radians(lat.to_radians(), lon.to_radians(), elevation))
    }

    /// Converts a validated [`GeoPosition`] to Cartesian meters.
    pub fn position_to_cartesian(&self, position: &GeoPosition) -> DVec3 {
        self.point_from_radians(
            position.lat.to_radians(),
            position.lon.to_radians(),
            position.elevation,
        )
    }

    /// The point on the ellipsoid surface (elevation zero).
    pub fn surface_point(&self, lat: f64, lon: f64) -> Result<DVec3, CoordError> {
        self.geodetic_to_cartesian(lat, lon, 0.0)
    }

    /// Distance from the ellipsoid center to the surface at a location.
    pub fn radius_at(&self, lat: f64, lon: f64) -> Result<f64, CoordError> {
        Ok(self.surface_point(lat, lon)?.length())
    }

    pub(crate) fn point_from_radians(&self, lat: f64, lon: f64, elevation: f64) -> DVec3 {
        let (sin_lat, cos_lat) = lat.sin_cos();
        let (sin_lon, cos_lon) = lon.sin_cos();
        let es = self.ellipsoid.eccentricity_squared();

        // Radius of curvature in the prime vertical.
        let rpm = self.ellipsoid.equatorial_radius() / (1.0 - es * sin_lat * sin_lat).sqrt();

        DVec3::new(
            (rpm + elevation) * cos_lat * sin_lon,
            (rpm * (1.0 - es) + elevation) * sin_lat,
            (rpm + elevation) * cos_lat * cos_lon,
        )
    }

    /// Converts a Cartesian point back to a geodetic position.
    ///
    /// Closed-form inversion after Vermeille (2011), "An analytical method to
    /// transform geocentric into geodetic coordinates". Three numeric branches
    /// are selected by the evolute discriminant `8r³ + e⁴pq`.
    pub fn cartesian_to_geodetic(&self, point: DVec3) -> GeoPosition {
        // Vermeille's axes: X toward (0°, 0°), Y toward (0°, 90°E), Z north.
        let x = point.z;
        let y = point.x;
        let z = point.y;
        let xx_p_yy = x * x + y * y;
        let sqrt_xx_p_yy = xx_p_yy.sqrt();

        let a = self.ellipsoid.equatorial_radius();
        let ra2 = 1.0 / (a * a);
        let e2 = self.ellipsoid.eccentricity_squared();
        let e4 = e2 * e2;

        let p = xx_p_yy * ra2;
        let q = z * z * (1.0 - e2) * ra2;
        let r = (p + q - e4) / 6.0;

        let evolute_border_test = 8.0 * r * r * r + e4 * p * q;

        let (phi, h) = if evolute_border_test > 0.0 || q != 0.0 {
            let u = if evolute_border_test > 0.0 {
                // General case.
                let rad1 = evolute_border_test.sqrt();
                let rad2 = (e4 * p * q).sqrt();

                // Near the cusps of the evolute the decomposed form avoids
                // cancellation between the two cube roots.
                if evolute_border_test > 10.0 * e2 {
                    let rad3 = ((rad1 + rad2) * (rad1 + rad2)).cbrt();
                    r + 0.5 * rad3 + 2.0 * r * r / rad3
                } else {
                    r + 0.5 * ((rad1 + rad2) * (rad1 + rad2)).cbrt()
                        + 0.5 * ((rad1 - rad2) * (rad1 - rad2)).cbrt()
                }
            } else {
                // Inside the evolute, away from the singular disk.
                let rad1 = (-evolute_border_test).sqrt();
                let rad2 = (-8.0 * r * r * r).sqrt();
                let rad3 = (e4 * p * q).sqrt();
                let atan = 2.0 * rad3.atan2(rad1 + rad2) / 3.0;

                -4.0 * r * atan.sin() * (FRAC_PI_6 + atan).cos()
            };

            let v = (u * u + e4 * q).sqrt();
            let w = e2 * (u + v - q) / (2.0 * v);
            let k = (u + v) / ((w * w + u + v).sqrt() + w);
            let d = k * sqrt_xx_p_yy / (k + e2);
            let sqrt_dd_p_zz = (d * d + z * z).sqrt();

            (
                2.0 * z.atan2(sqrt_dd_p_zz + d),
                (k + e2 - 1.0) * sqrt_dd_p_zz / k,
            )
        } else if e2 == 0.0 {
            // Center of a sphere.
            (0.0, -a)
        } else {
            // Singular disk in the equatorial plane.
            let rad1 = (1.0 - e2).sqrt();
            let rad2 = (e2 - p).sqrt();
            let e = e2.sqrt();

            (
                2.0 * rad2.atan2(e * rad2 + rad1 * p.sqrt()),
                -a * rad1 * rad2 / e,
            )
        };

        // Longitude, split into three overlapping ranges so the atan2
        // argument never approaches its branch cut.
        let lambda = if (SQRT_2 - 1.0) * y < sqrt_xx_p_yy + x {
            // -135° < lambda < 135°
            2.0 * y.atan2(sqrt_xx_p_yy + x)
        } else if sqrt_xx_p_yy + y < (SQRT_2 + 1.0) * x {
            // -225° < lambda < 45°
            -FRAC_PI_2 + 2.0 * x.atan2(sqrt_xx_p_yy - y)
        } else {
            // -45° < lambda < 225°
            FRAC_PI_2 - 2.0 * x.atan2(sqrt_xx_p_yy + y)
        };

        GeoPosition::from_degrees_unchecked(phi.to_degrees(), wrap_longitude(lambda.to_degrees()), h)
    }

    /// Unit vector normal to the ellipsoid surface at a location.
    pub fn surface_normal(&self, lat: f64, lon: f64) -> Result<DVec3, CoordError> {
        validate_location(lat, lon)?;
        let (sin_lat, cos_lat) = lat.to_radians().sin_cos();
        let (sin_lon, cos_lon) = lon.to_radians().sin_cos();
        Ok(DVec3::new(cos_lat * sin_lon, sin_lat, cos_lat * cos_lon).normalize())
    }

    /// Unit vector tangent to the surface and pointing north at a location.
    pub fn north_tangent(&self, lat: f64, lon: f64) -> Result<DVec3, CoordError> {
        validate_location(lat, lon)?;
        let (sin_lat, cos_lat) = lat.to_radians().sin_cos();
        let (sin_lon, cos_lon) = lon.to_radians().sin_cos();
        Ok(DVec3::new(-sin_lat * sin_lon, cos_lat, -sin_lat * cos_lon).normalize())
    }

    /// Local frame for an object placed at a position on the globe.
    ///
    /// Translates to the surface point, rotates about +Y by the longitude and
    /// then about +X by the negated latitude, so the local +Z axis is the
    /// surface normal and +Y is the north tangent.
    pub fn surface_orientation(
        &self,
        lat: f64,
        lon: f64,
        elevation: f64,
    ) -> Result<DMat4, CoordError> {
        let point = self.geodetic_to_cartesian(lat, lon, elevation)?;
        Ok(DMat4::from_translation(point)
            * DMat4::from_rotation_y(lon.to_radians())
            * DMat4::from_rotation_x(-lat.to_radians()))
    }
}

/// Folds a longitude produced by the three-range split back into [-180, 180].
fn wrap_longitude(lon: f64) -> f64 {
    if lon > 180.0 {
        lon - 360.0
    } else if lon < -180.0 {
        lon + 360.0
    } else {
        lon
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn globe() -> Globe {
        Globe::wgs84()
    }

    #[test]
    fn test_axes_orientation() {
        let g = globe();
        let a = g.ellipsoid().equatorial_radius();
        let b = g.ellipsoid().polar_radius();

        let origin = g.geodetic_to_cartesian(0.0, 0.0, 0.0).unwrap();
        assert_relative_eq!(origin.z, a, epsilon = 1e-6);
        assert_relative_eq!(origin.x, 0.0, epsilon = 1e-6);

        let east = g.geodetic_to_cartesian(0.0, 90.0, 0.0).unwrap();
        assert_relative_eq!(east.x, a, epsilon = 1e-6);

        let north = g.geodetic_to_cartesian(90.0, 0.0, 0.0).unwrap();
        assert_relative_eq!(north.y, b, epsilon = 1e-6);
    }

    #[test]
    fn test_elevation_extends_along_normal() {
        let g = globe();
        let surface = g.geodetic_to_cartesian(45.0, 10.0, 0.0).unwrap();
        let raised = g.geodetic_to_cartesian(45.0, 10.0, 1000.0).unwrap();
        let normal = g.surface_normal(45.0, 10.0).unwrap();
        let offset = raised - surface;
        assert_relative_eq!(offset.length(), 1000.0, epsilon = 1e-6);
        assert_relative_eq!(offset.normalize().dot(normal), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_rejects_invalid_input() {
        let g = globe();
        assert!(g.geodetic_to_cartesian(f64::NAN, 0.0, 0.0).is_err());
        assert!(g.geodetic_to_cartesian(91.0, 0.0, 0.0).is_err());
        assert!(g.geodetic_to_cartesian(0.0, 0.0, f64::NAN).is_err());
        assert!(g.surface_normal(0.0, 200.0).is_err());
    }

    #[test]
    fn test_inverse_at_known_points() {
        let g = globe();
        for &(lat, lon, h) in &[
            (0.0, 0.0, 0.0),
            (40.7128, -74.006, 10.0),
            (-33.8688, 151.2093, 58.0),
            (27.9881, 86.925, 8848.0),
            (-45.0, -135.0, -1000.0),
            (10.0, 179.999, 250.0),
            (-10.0, -179.999, 250.0),
        ] {
            let p = g.geodetic_to_cartesian(lat, lon, h).unwrap();
            let back = g.cartesian_to_geodetic(p);
            assert_relative_eq!(back.lat, lat, epsilon = 1e-9);
            assert_relative_eq!(back.lon, lon, epsilon = 1e-9);
            assert_relative_eq!(back.elevation, h, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_inverse_at_pole_recovers_latitude_and_height() {
        let g = globe();
        let p = g.geodetic_to_cartesian(90.0, 0.0, 500.0).unwrap();
        let back = g.cartesian_to_geodetic(p);
        assert_relative_eq!(back.lat, 90.0, epsilon = 1e-9);
        assert_relative_eq!(back.elevation, 500.0, epsilon = 1e-4);
    }

    #[test]
    fn test_inverse_near_evolute() {
        // Points far below the surface close to the equatorial plane land in
        // the near-evolute and singular-disk branches.
        let g = globe();
        let deep = DVec3::new(0.0, 1000.0, 20_000.0);
        let pos = g.cartesian_to_geodetic(deep);
        assert!(pos.lat.is_finite());
        assert!(pos.elevation < 0.0);

        let disk = DVec3::new(0.0, 0.0, 10_000.0);
        let pos = g.cartesian_to_geodetic(disk);
        assert!(pos.lat.is_finite());
        assert!(pos.elevation.is_finite());
        assert!(pos.elevation < -6_000_000.0);
    }

    #[test]
    fn test_longitude_branches_cover_all_quadrants() {
        let g = globe();
        for lon in [-179.0, -135.0, -90.0, -45.0, 0.0, 45.0, 90.0, 135.0, 179.0] {
            let p = g.geodetic_to_cartesian(12.0, lon, 0.0).unwrap();
            assert_relative_eq!(g.cartesian_to_geodetic(p).lon, lon, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_north_tangent_is_perpendicular_to_normal() {
        let g = globe();
        let normal = g.surface_normal(30.0, 60.0).unwrap();
        let north = g.north_tangent(30.0, 60.0).unwrap();
        assert_relative_eq!(normal.dot(north), 0.0, epsilon = 1e-12);
        assert_relative_eq!(north.length(), 1.0, epsilon = 1e-12);
        // North tangent at the equator points at the north pole.
        let eq_north = g.north_tangent(0.0, 0.0).unwrap();
        assert_relative_eq!(eq_north.y, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_surface_orientation_axes() {
        let g = globe();
        let (lat, lon, h) = (35.0, -120.0, 100.0);
        let m = g.surface_orientation(lat, lon, h).unwrap();
        let origin = m.transform_point3(DVec3::ZERO);
        let expected = g.geodetic_to_cartesian(lat, lon, h).unwrap();
        assert_relative_eq!(origin.distance(expected), 0.0, epsilon = 1e-6);

        let up = m.transform_vector3(DVec3::Z);
        let normal = g.surface_normal(lat, lon).unwrap();
        assert_relative_eq!(up.dot(normal), 1.0, epsilon = 1e-12);

        let north = m.transform_vector3(DVec3::Y);
        let tangent = g.north_tangent(lat, lon).unwrap();
        assert_relative_eq!(north.dot(tangent), 1.0, epsilon = 1e-12);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(10_000))]

            #[test]
            fn test_roundtrip_property(
                lat in -89.0..89.0_f64,
                lon in -180.0..180.0_f64,
                elevation in -1000.0..9000.0_f64
            ) {
                let g = Globe::wgs84();
                let p = g.geodetic_to_cartesian(lat, lon, elevation)?;
                let back = g.cartesian_to_geodetic(p);
                // -180° and 180° name the same meridian.
                let lon_diff = ((back.lon - lon + 540.0) % 360.0 - 180.0).abs();

                prop_assert!((back.lat - lat).abs() < 1e-6, "lat {} -> {}", lat, back.lat);
                prop_assert!(lon_diff < 1e-6, "lon {} -> {}", lon, back.lon);
                prop_assert!(
                    (back.elevation - elevation).abs() < 1e-3,
                    "elevation {} -> {}", elevation, back.elevation
                );
            }
        }
    }
}
