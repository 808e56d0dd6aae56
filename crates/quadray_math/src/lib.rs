// Re-export glam for convenience
pub use glam::*;

// Quadray math types
mod aabb;
mod interval;
mod ray;

pub use aabb::{machine_epsilon, Aabb};
pub use interval::Interval;
pub use ray::Ray;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec3_axis_indexing() {
        let v = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(v[0], 1.0);
        assert_eq!(v[1], 2.0);
        assert_eq!(v[2], 3.0);
    }

    #[test]
    fn test_centroid_of_points_box() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(4.0, 5.0, 6.0);
        let aabb = Aabb::from_corners(a, b);
        assert_eq!(aabb.centroid(), Vec3::new(2.5, 3.5, 4.5));
    }
}
