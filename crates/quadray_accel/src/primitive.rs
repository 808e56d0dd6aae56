//! Primitive trait and Intersection record for ray-object queries.
//!
//! Primitives are shared between the scene and the accelerators built over
//! them, so they travel as `Arc<dyn Primitive>`.

use quadray_math::{Aabb, Interval, Ray, Vec3};
use std::sync::Arc;

/// Record of a ray-primitive intersection.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Intersection {
    /// Point of intersection
    pub p: Vec3,
    /// Surface normal at intersection (always points against ray)
    pub normal: Vec3,
    /// Surface parameterization at the hit point
    pub u: f32,
    pub v: f32,
    /// Parameter t where the intersection occurs
    pub t: f32,
    /// Whether the ray hit the front face (outside) of the surface
    pub front_face: bool,
    /// Index of the hit primitive in the list the query ran over
    pub primitive: u32,
}

impl Intersection {
    /// Build a record for a hit at `t` with the given outward normal.
    pub fn new(ray: &Ray, t: f32, outward_normal: Vec3, u: f32, v: f32) -> Self {
        let mut hit = Self {
            p: ray.at(t),
            u,
            v,
            t,
            ..Default::default()
        };
        hit.set_face_normal(ray, outward_normal);
        hit
    }

    /// Set the face normal based on ray direction and outward normal.
    ///
    /// The normal is always stored pointing against the ray direction,
    /// so we need to track whether we hit the front or back face.
    pub fn set_face_normal(&mut self, ray: &Ray, outward_normal: Vec3) {
        self.front_face = ray.direction.dot(outward_normal) < 0.0;
        self.normal = if self.front_face {
            outward_normal
        } else {
            -outward_normal
        };
    }
}

/// A renderable object that can bound itself and answer ray queries.
///
/// Objects that cannot be intersected directly (meshes, for instance)
/// return `false` from [`Primitive::can_intersect`] and expand themselves
/// through [`Primitive::refine`].
pub trait Primitive: Send + Sync {
    /// World-space bounds of the primitive.
    fn world_bound(&self) -> Aabb;

    /// Nearest intersection within `ray_t`, if any.
    fn intersect(&self, ray: &Ray, ray_t: Interval) -> Option<Intersection>;

    /// Returns true if the ray hits anything within `ray_t`.
    fn intersect_p(&self, ray: &Ray, ray_t: Interval) -> bool {
        self.intersect(ray, ray_t).is_some()
    }

    /// Whether [`Primitive::intersect`] is meaningful for this object.
    fn can_intersect(&self) -> bool {
        true
    }

    /// Append the pieces this primitive decomposes into.
    fn refine(&self, _refined: &mut Vec<Arc<dyn Primitive>>) {}
}

/// Expand every primitive that cannot be intersected into intersectable
/// pieces, keeping input order.
pub fn refine_primitives(primitives: &[Arc<dyn Primitive>]) -> Vec<Arc<dyn Primitive>> {
    let mut refined = Vec::with_capacity(primitives.len());
    let mut pieces = Vec::new();

    for primitive in primitives {
        if primitive.can_intersect() {
            refined.push(Arc::clone(primitive));
            continue;
        }

        pieces.clear();
        primitive.refine(&mut pieces);
        // Pieces may need further refinement themselves
        refined.extend(refine_primitives(&pieces));
    }

    refined
}

/// A flat list of primitives tested one after another.
#[derive(Default)]
pub struct PrimitiveList {
    primitives: Vec<Arc<dyn Primitive>>,
    bbox: Aabb,
}

impl PrimitiveList {
    /// Create a new empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a list from existing primitives.
    pub fn from_primitives(primitives: Vec<Arc<dyn Primitive>>) -> Self {
        let bbox = primitives
            .iter()
            .fold(Aabb::EMPTY, |acc, p| Aabb::surrounding(&acc, &p.world_bound()));
        Self { primitives, bbox }
    }

    /// Add a primitive to the list.
    pub fn add(&mut self, primitive: Arc<dyn Primitive>) {
        self.bbox = Aabb::surrounding(&self.bbox, &primitive.world_bound());
        self.primitives.push(primitive);
    }

    /// Get the number of primitives.
    pub fn len(&self) -> usize {
        self.primitives.len()
    }

    /// Check if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }
}

impl Primitive for PrimitiveList {
    fn world_bound(&self) -> Aabb {
        self.bbox
    }

    fn intersect(&self, ray: &Ray, ray_t: Interval) -> Option<Intersection> {
        let mut closest: Option<Intersection> = None;
        let mut closest_so_far = ray_t.max;

        for (index, primitive) in self.primitives.iter().enumerate() {
            let interval = Interval::new(ray_t.min, closest_so_far);
            if let Some(mut hit) = primitive.intersect(ray, interval) {
                closest_so_far = hit.t;
                hit.primitive = index as u32;
                closest = Some(hit);
            }
        }

        closest
    }

    fn intersect_p(&self, ray: &Ray, ray_t: Interval) -> bool {
        self.primitives.iter().any(|p| p.intersect_p(ray, ray_t))
    }
}
