//! Triangle primitive for ray tracing.
//!
//! Uses the Möller-Trumbore algorithm for ray-triangle intersection.

use crate::{Intersection, Primitive};
use quadray_math::{Aabb, Interval, Ray, Vec3};

/// Möller-Trumbore test shared by [`Triangle`] and mesh triangles.
///
/// Returns `(t, u, v)` for a hit inside `ray_t`.
pub(crate) fn intersect_triangle(
    v0: Vec3,
    v1: Vec3,
    v2: Vec3,
    ray: &Ray,
    ray_t: Interval,
) -> Option<(f32, f32, f32)> {
    let edge1 = v1 - v0;
    let edge2 = v2 - v0;

    let h = ray.direction.cross(edge2);
    let a = edge1.dot(h);

    // Ray is parallel to triangle
    if a.abs() < 1e-8 {
        return None;
    }

    let f = 1.0 / a;
    let s = ray.origin - v0;
    let u = f * s.dot(h);
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q = s.cross(edge1);
    let v = f * ray.direction.dot(q);
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = f * edge2.dot(q);
    ray_t.contains(t).then_some((t, u, v))
}

/// Bounds of three points, padded so flat triangles keep a volume.
pub(crate) fn triangle_bounds(v0: Vec3, v1: Vec3, v2: Vec3) -> Aabb {
    let delta = Vec3::splat(0.0001);
    Aabb::from_points(v0.min(v1).min(v2) - delta, v0.max(v1).max(v2) + delta)
}

/// A standalone triangle primitive.
#[derive(Debug, Clone)]
pub struct Triangle {
    /// Vertices
    v0: Vec3,
    v1: Vec3,
    v2: Vec3,
    /// Pre-computed face normal (unit length)
    normal: Vec3,
    /// Bounding box
    bbox: Aabb,
}

impl Triangle {
    /// Create a new triangle from three vertices.
    pub fn new(v0: Vec3, v1: Vec3, v2: Vec3) -> Self {
        let normal = (v1 - v0).cross(v2 - v0).normalize_or_zero();
        Self {
            v0,
            v1,
            v2,
            normal,
            bbox: triangle_bounds(v0, v1, v2),
        }
    }

    /// The three vertices.
    pub fn vertices(&self) -> [Vec3; 3] {
        [self.v0, self.v1, self.v2]
    }
}

impl Primitive for Triangle {
    fn world_bound(&self) -> Aabb {
        self.bbox
    }

    fn intersect(&self, ray: &Ray, ray_t: Interval) -> Option<Intersection> {
        let (t, u, v) = intersect_triangle(self.v0, self.v1, self.v2, ray, ray_t)?;
        Some(Intersection::new(ray, t, self.normal, u, v))
    }
}
