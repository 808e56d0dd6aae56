//! Ray-tracing acceleration for the quadray renderer.
//!
//! The centerpiece is [`Qbvh`], a spatial-split quad BVH built over
//! [`Primitive`]s. Meshes are refined into their triangles before building;
//! [`PrimitiveList`] answers the same queries by brute force.

mod config;
mod error;
mod mesh;
mod primitive;
pub mod qbvh;
mod sphere;
mod triangle;

pub use config::{QbvhConfig, DEFAULT_ALPHA, DEFAULT_MAX_PRIMS_PER_LEAF};
pub use error::{BuildError, BuildResult, ConfigError};
pub use mesh::{grid_mesh, Mesh, MeshTriangle};
pub use primitive::{refine_primitives, Intersection, Primitive, PrimitiveList};
pub use qbvh::{
    BuildDiagnostics, ChildSlot, LeafRange, NodeIndex, Qbvh, QbvhNode, QbvhStatistics,
    QuadPrimitive,
};
pub use sphere::Sphere;
pub use triangle::Triangle;

// Re-export the math types that appear in this crate's API
pub use quadray_math::{Aabb, Interval, Ray, Vec3};
