//! Coordinate engine
//!
//! Converts between geodetic coordinates (latitude, longitude, elevation) and
//! the globe-centered Cartesian frame of a single reference ellipsoid, and
//! intersects rays and triangles with ellipsoidal surfaces.
//!
//! # Example
//!
//! ```
//! use globeterrain::coord::Globe;
//!
//! let globe = Globe::wgs84();
//! let point = globe.geodetic_to_cartesian(46.5, 7.9, 4158.0).unwrap();
//! let position = globe.cartesian_to_geodetic(point);
//! assert!((position.lat - 46.5).abs() < 1e-9);
//! ```

mod ellipsoid;
mod globe;
mod intersect;
mod types;

pub use ellipsoid::Ellipsoid;
pub use globe::Globe;
pub use intersect::{Intersection, Line, Triangle};
pub use types::{
    validate_location, CoordError, GeoPosition, Sector, MAX_LAT, MAX_LON, MIN_LAT, MIN_LON,
};

pub use glam::{DMat4, DVec3};
