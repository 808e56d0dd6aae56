use crate::{Interval, Ray, Vec3};

/// Smallest margin applied by [`machine_epsilon`].
const EPSILON_MIN: f32 = 1e-9;

/// Relative margin applied by [`machine_epsilon`] (2^-16).
const EPSILON_RELATIVE: f32 = 1.0 / 65536.0;

/// Axis-Aligned Bounding Box for spatial acceleration structures (BVH).
///
/// An AABB is defined by three intervals (one per axis) that bound a 3D volume.
/// [`Aabb::EMPTY`] contains nothing and is the identity for
/// [`Aabb::surrounding`].
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Aabb {
    pub x: Interval,
    pub y: Interval,
    pub z: Interval,
}

impl Aabb {
    /// Create a new AABB from three intervals.
    pub const fn new(x: Interval, y: Interval, z: Interval) -> Self {
        Self { x, y, z }
    }

    /// Create an AABB from two corner points, padding zero-width axes.
    ///
    /// Meant for authoring primitive bounds; flat triangles still get a
    /// volume a ray can hit.
    pub fn from_points(a: Vec3, b: Vec3) -> Self {
        let mut aabb = Self::from_corners(a.min(b), a.max(b));
        aabb.pad_to_minimums();
        aabb
    }

    /// Create an AABB with exactly the given corners (no padding).
    pub fn from_corners(min: Vec3, max: Vec3) -> Self {
        Self {
            x: Interval::new(min.x, max.x),
            y: Interval::new(min.y, max.y),
            z: Interval::new(min.z, max.z),
        }
    }

    /// A degenerate box holding a single point.
    pub fn from_point(p: Vec3) -> Self {
        Self::from_corners(p, p)
    }

    /// Create an AABB that surrounds two other AABBs.
    pub fn surrounding(box0: &Aabb, box1: &Aabb) -> Self {
        Self {
            x: Interval::surrounding(&box0.x, &box1.x),
            y: Interval::surrounding(&box0.y, &box1.y),
            z: Interval::surrounding(&box0.z, &box1.z),
        }
    }

    /// Grow the box to include a point.
    pub fn union_point(&self, p: Vec3) -> Self {
        Self {
            x: self.x.include(p.x),
            y: self.y.include(p.y),
            z: self.z.include(p.z),
        }
    }

    /// Minimum corner.
    #[inline]
    pub fn min(&self) -> Vec3 {
        Vec3::new(self.x.min, self.y.min, self.z.min)
    }

    /// Maximum corner.
    #[inline]
    pub fn max(&self) -> Vec3 {
        Vec3::new(self.x.max, self.y.max, self.z.max)
    }

    /// Get the interval for a specific axis (0=X, 1=Y, 2=Z).
    pub fn axis_interval(&self, n: usize) -> Interval {
        match n {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }

    /// Returns a copy with the interval of axis `n` replaced.
    pub fn with_axis(&self, n: usize, interval: Interval) -> Self {
        let mut aabb = *self;
        match n {
            0 => aabb.x = interval,
            1 => aabb.y = interval,
            _ => aabb.z = interval,
        }
        aabb
    }

    /// True when at least one axis is empty.
    pub fn is_empty(&self) -> bool {
        self.x.is_empty() || self.y.is_empty() || self.z.is_empty()
    }

    /// The overlapping region of two boxes, if they overlap at all.
    ///
    /// Boxes that only touch on a face produce a flat intersection.
    pub fn intersection(&self, other: &Aabb) -> Option<Aabb> {
        let common = Aabb {
            x: self.x.intersect(&other.x),
            y: self.y.intersect(&other.y),
            z: self.z.intersect(&other.z),
        };
        (!common.is_empty()).then_some(common)
    }

    /// Returns true if the boxes share at least one point.
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.intersection(other).is_some()
    }

    /// Inclusive point-inside test.
    pub fn inside(&self, p: Vec3) -> bool {
        self.x.contains(p.x) && self.y.contains(p.y) && self.z.contains(p.z)
    }

    /// Returns true if `other` lies entirely within this box.
    ///
    /// The empty box is contained in every box.
    pub fn contains_box(&self, other: &Aabb) -> bool {
        other.is_empty() || (self.inside(other.min()) && self.inside(other.max()))
    }

    /// Size of the box along each axis.
    pub fn extent(&self) -> Vec3 {
        self.max() - self.min()
    }

    /// Surface area of the box, 0 for an empty box.
    pub fn surface_area(&self) -> f32 {
        if self.is_empty() {
            return 0.0;
        }
        let d = self.extent();
        2.0 * (d.x * d.y + d.y * d.z + d.z * d.x)
    }

    /// Returns a box grown by `delta` on every side.
    pub fn expand(&self, delta: f32) -> Aabb {
        Aabb {
            x: self.x.expand(2.0 * delta),
            y: self.y.expand(2.0 * delta),
            z: self.z.expand(2.0 * delta),
        }
    }

    /// Test if a ray intersects this AABB within the given interval.
    ///
    /// Uses the slab method. Axes where the ray runs parallel to a slab face
    /// produce NaN distances, which `f32::max`/`f32::min` discard.
    pub fn hit(&self, r: &Ray, mut ray_t: Interval) -> bool {
        let inv = r.inv_direction();
        for axis in 0..3 {
            let slab = self.axis_interval(axis);
            let mut t0 = (slab.min - r.origin[axis]) * inv[axis];
            let mut t1 = (slab.max - r.origin[axis]) * inv[axis];
            if inv[axis] < 0.0 {
                std::mem::swap(&mut t0, &mut t1);
            }
            ray_t.min = t0.max(ray_t.min);
            ray_t.max = t1.min(ray_t.max);
            if ray_t.max < ray_t.min {
                return false;
            }
        }
        true
    }

    /// Pad intervals to avoid zero-width AABBs (degenerate cases).
    fn pad_to_minimums(&mut self) {
        let delta = 0.0001;
        if self.x.size() < delta {
            self.x = self.x.expand(delta);
        }
        if self.y.size() < delta {
            self.y = self.y.expand(delta);
        }
        if self.z.size() < delta {
            self.z = self.z.expand(delta);
        }
    }

    /// Returns the index (0=X, 1=Y, 2=Z) of the axis with the longest extent.
    ///
    /// Ties resolve towards the later axis.
    pub fn longest_axis(&self) -> usize {
        let x_size = self.x.size();
        let y_size = self.y.size();
        let z_size = self.z.size();

        if x_size > y_size && x_size > z_size {
            0
        } else if y_size > z_size {
            1
        } else {
            2
        }
    }

    /// Returns the center point of the bounding box.
    pub fn centroid(&self) -> Vec3 {
        (self.min() + self.max()) * 0.5
    }

    /// Static constants
    pub const EMPTY: Aabb = Aabb {
        x: Interval::EMPTY,
        y: Interval::EMPTY,
        z: Interval::EMPTY,
    };

    pub const UNIVERSE: Aabb = Aabb {
        x: Interval::UNIVERSE,
        y: Interval::UNIVERSE,
        z: Interval::UNIVERSE,
    };
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Numerical margin for a box: relative to its largest absolute coordinate,
/// never below a small absolute floor.
///
/// Growing primitive bounds by this amount keeps rays that graze a face from
/// slipping between float-rounded slabs.
pub fn machine_epsilon(aabb: &Aabb) -> f32 {
    if aabb.is_empty() {
        return EPSILON_MIN;
    }
    let magnitude = aabb.min().abs().max(aabb.max().abs()).max_element();
    (magnitude * EPSILON_RELATIVE).max(EPSILON_MIN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aabb_from_points() {
        let aabb = Aabb::from_points(Vec3::new(10.0, 0.0, 10.0), Vec3::new(0.0, 10.0, 0.0));

        assert_eq!(aabb.min(), Vec3::ZERO);
        assert_eq!(aabb.max(), Vec3::splat(10.0));
    }

    #[test]
    fn test_aabb_from_points_pads_flat_axis() {
        let aabb = Aabb::from_points(Vec3::ZERO, Vec3::new(1.0, 1.0, 0.0));
        assert!(aabb.z.size() > 0.0);
        assert!(aabb.surface_area() > 2.0);

        let exact = Aabb::from_corners(Vec3::ZERO, Vec3::new(1.0, 1.0, 0.0));
        assert_eq!(exact.z.size(), 0.0);
        assert_eq!(exact.surface_area(), 2.0);
    }

    #[test]
    fn test_aabb_empty_is_union_identity() {
        let b = Aabb::from_corners(Vec3::new(-1.0, 2.0, 3.0), Vec3::new(4.0, 5.0, 6.0));
        assert_eq!(Aabb::surrounding(&Aabb::EMPTY, &b), b);
        assert_eq!(Aabb::surrounding(&b, &Aabb::EMPTY), b);
        assert!(Aabb::EMPTY.is_empty());
        assert_eq!(Aabb::EMPTY.surface_area(), 0.0);

        let p = Aabb::EMPTY.union_point(Vec3::ONE);
        assert_eq!(p, Aabb::from_point(Vec3::ONE));
    }

    #[test]
    fn test_aabb_surrounding() {
        let box1 = Aabb::from_corners(Vec3::ZERO, Vec3::splat(5.0));
        let box2 = Aabb::from_corners(Vec3::splat(3.0), Vec3::splat(10.0));
        let surrounding = Aabb::surrounding(&box1, &box2);

        assert_eq!(surrounding.min(), Vec3::ZERO);
        assert_eq!(surrounding.max(), Vec3::splat(10.0));
    }

    #[test]
    fn test_aabb_intersection() {
        let a = Aabb::from_corners(Vec3::ZERO, Vec3::splat(4.0));
        let b = Aabb::from_corners(Vec3::splat(2.0), Vec3::splat(6.0));
        let common = a.intersection(&b).unwrap();
        assert_eq!(common, Aabb::from_corners(Vec3::splat(2.0), Vec3::splat(4.0)));
        assert!(a.overlaps(&b));

        let far = Aabb::from_corners(Vec3::splat(5.0), Vec3::splat(6.0));
        assert!(a.intersection(&far).is_none());
        assert!(!a.overlaps(&Aabb::EMPTY));

        // Touching faces still overlap, with a flat result
        let touching = Aabb::from_corners(Vec3::new(4.0, 0.0, 0.0), Vec3::new(5.0, 4.0, 4.0));
        let face = a.intersection(&touching).unwrap();
        assert_eq!(face.x.size(), 0.0);
    }

    #[test]
    fn test_aabb_inside_and_contains() {
        let a = Aabb::from_corners(Vec3::ZERO, Vec3::ONE);
        assert!(a.inside(Vec3::ZERO));
        assert!(a.inside(Vec3::ONE));
        assert!(!a.inside(Vec3::new(1.1, 0.5, 0.5)));

        let inner = Aabb::from_corners(Vec3::splat(0.25), Vec3::splat(0.75));
        assert!(a.contains_box(&inner));
        assert!(!inner.contains_box(&a));
        assert!(inner.contains_box(&Aabb::EMPTY));
    }

    #[test]
    fn test_aabb_surface_area() {
        let a = Aabb::from_corners(Vec3::ZERO, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(a.surface_area(), 2.0 * (2.0 + 6.0 + 3.0));
    }

    #[test]
    fn test_aabb_hit() {
        let aabb = Aabb::from_corners(Vec3::splat(-1.0), Vec3::splat(1.0));

        // Ray pointing at center
        let ray = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::new(0.0, 0.0, 1.0), 0.0);
        assert!(aabb.hit(&ray, Interval::new(0.0, 100.0)));

        // Ray pointing away
        let ray = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::new(0.0, 0.0, -1.0), 0.0);
        assert!(!aabb.hit(&ray, Interval::new(0.0, 100.0)));

        // Ray missing the box
        let ray = Ray::new(Vec3::new(10.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 1.0), 0.0);
        assert!(!aabb.hit(&ray, Interval::new(0.0, 100.0)));

        // Interval ends before the box
        let ray = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::new(0.0, 0.0, 1.0), 0.0);
        assert!(!aabb.hit(&ray, Interval::new(0.0, 3.0)));
    }

    #[test]
    fn test_aabb_longest_axis() {
        let aabb_x = Aabb::from_corners(Vec3::ZERO, Vec3::new(10.0, 1.0, 1.0));
        assert_eq!(aabb_x.longest_axis(), 0);

        let aabb_y = Aabb::from_corners(Vec3::ZERO, Vec3::new(1.0, 10.0, 1.0));
        assert_eq!(aabb_y.longest_axis(), 1);

        let aabb_z = Aabb::from_corners(Vec3::ZERO, Vec3::new(1.0, 1.0, 10.0));
        assert_eq!(aabb_z.longest_axis(), 2);
    }

    #[test]
    fn test_aabb_with_axis_and_expand() {
        let a = Aabb::from_corners(Vec3::ZERO, Vec3::ONE);
        let b = a.with_axis(1, Interval::new(-2.0, 0.5));
        assert_eq!(b.y, Interval::new(-2.0, 0.5));
        assert_eq!(b.x, a.x);

        let grown = a.expand(0.5);
        assert_eq!(grown.min(), Vec3::splat(-0.5));
        assert_eq!(grown.max(), Vec3::splat(1.5));
    }

    #[test]
    fn test_machine_epsilon_scales_with_magnitude() {
        let small = Aabb::from_corners(Vec3::ZERO, Vec3::ZERO);
        assert_eq!(machine_epsilon(&small), EPSILON_MIN);

        let large = Aabb::from_corners(Vec3::splat(-65536.0), Vec3::splat(10.0));
        assert_eq!(machine_epsilon(&large), 1.0);
    }
}
