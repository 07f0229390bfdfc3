//! Ray/ellipsoid and triangle/elevation-surface intersection.

use glam::DVec3;

use super::globe::Globe;

/// A parametric line `origin + t * direction`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line {
    pub origin: DVec3,
    pub direction: DVec3,
}

impl Line {
    pub fn new(origin: DVec3, direction: DVec3) -> Self {
        Self { origin, direction }
    }

    /// The line through two points, directed from `from` toward `to`.
    pub fn through(from: DVec3, to: DVec3) -> Self {
        Self::new(from, to - from)
    }

    pub fn point_at(&self, t: f64) -> DVec3 {
        self.origin + self.direction * t
    }
}

/// A triangle in the globe's Cartesian frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub a: DVec3,
    pub b: DVec3,
    pub c: DVec3,
}

impl Triangle {
    pub fn new(a: DVec3, b: DVec3, c: DVec3) -> Self {
        Self { a, b, c }
    }
}

/// A point where a line meets an ellipsoidal surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intersection {
    pub point: DVec3,
    /// True when the line only grazes the surface.
    pub tangent: bool,
}

impl Globe {
    /// Intersects a line with the ellipsoid whose radii are enlarged by the
    /// given offsets.
    ///
    /// Returns no points when the line misses, a single tangent point when it
    /// grazes, the near and far points (in that order) when it passes through
    /// from outside, and only the far point when the origin is inside.
    pub fn intersect_ray(
        &self,
        line: &Line,
        equatorial_offset: f64,
        polar_offset: f64,
    ) -> Vec<Intersection> {
        let equatorial = self.ellipsoid().equatorial_radius() + equatorial_offset;
        let polar = self.ellipsoid().polar_radius() + polar_offset;

        // Scale y so the ellipsoid becomes a sphere of the equatorial radius.
        let m = equatorial / polar;
        let m2 = m * m;
        let r2 = equatorial * equatorial;

        let v = line.direction;
        let s = line.origin;

        let a = v.x * v.x + m2 * v.y * v.y + v.z * v.z;
        let b = 2.0 * (s.x * v.x + m2 * s.y * v.y + s.z * v.z);
        let c = s.x * s.x + m2 * s.y * s.y + s.z * s.z - r2;

        if a == 0.0 {
            return Vec::new();
        }

        let discriminant = b * b - 4.0 * a * c;
        if discriminant < 0.0 {
            return Vec::new();
        }

        let root = discriminant.sqrt();
        if discriminant == 0.0 {
            return vec![Intersection {
                point: line.point_at((-b - root) / (2.0 * a)),
                tangent: true,
            }];
        }

        let near = line.point_at((-b - root) / (2.0 * a));
        let far = line.point_at((-b + root) / (2.0 * a));
        if c >= 0.0 {
            vec![
                Intersection {
                    point: near,
                    tangent: false,
                },
                Intersection {
                    point: far,
                    tangent: false,
                },
            ]
        } else {
            vec![Intersection {
                point: far,
                tangent: false,
            }]
        }
    }

    /// Intersects a line with the surface at a constant elevation.
    pub fn intersect_ray_at_elevation(&self, line: &Line, elevation: f64) -> Vec<Intersection> {
        self.intersect_ray(line, elevation, elevation)
    }

    /// Returns true if the point lies outside the ellipsoid raised by `elevation`.
    pub fn is_point_above_elevation(&self, point: DVec3, elevation: f64) -> bool {
        let equatorial = self.ellipsoid().equatorial_radius() + elevation;
        let polar = self.ellipsoid().polar_radius() + elevation;
        (point.x * point.x) / (equatorial * equatorial)
            + (point.y * point.y) / (polar * polar)
            + (point.z * point.z) / (equatorial * equatorial)
            - 1.0
            > 0.0
    }

    /// Intersects a triangle with the surface at a constant elevation.
    ///
    /// Returns the two points where the triangle's edges cross the surface,
    /// or nothing when all three vertices lie on the same side.
    pub fn intersect_elevation_isosurface(&self, triangle: &Triangle, elevation: f64) -> Vec<DVec3> {
        let above_a = self.is_point_above_elevation(triangle.a, elevation);
        let above_b = self.is_point_above_elevation(triangle.b, elevation);
        let above_c = self.is_point_above_elevation(triangle.c, elevation);

        if !(above_a ^ above_b) && !(above_b ^ above_c) {
            return Vec::new();
        }

        let edges = [
            (triangle.a, above_a, triangle.b, above_b),
            (triangle.b, above_b, triangle.c, above_c),
            (triangle.c, above_c, triangle.a, above_a),
        ];

        let mut points = Vec::with_capacity(2);
        for (p, p_above, q, q_above) in edges {
            if p_above == q_above {
                continue;
            }
            // Cast from the inside vertex so only the exit point is reported.
            let (inside, outside) = if p_above { (q, p) } else { (p, q) };
            let hits = self.intersect_ray_at_elevation(&Line::through(inside, outside), elevation);
            if let Some(hit) = hits.first() {
                points.push(hit.point);
            }
        }
        points
    }
}
