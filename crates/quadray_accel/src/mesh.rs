//! Indexed triangle meshes.
//!
//! A [`Mesh`] is not intersected directly: it refines into one
//! [`MeshTriangle`] per face, all sharing the same vertex data.

use crate::triangle::{intersect_triangle, triangle_bounds};
use crate::{Intersection, Primitive};
use quadray_math::{Aabb, Interval, Ray, Vec3};
use std::sync::Arc;

/// Vertex and index storage shared by a mesh and its triangles.
#[derive(Debug)]
struct MeshData {
    /// Vertex positions (one Vec3 per vertex)
    positions: Vec<Vec3>,
    /// Triangle indices (every 3 indices form a triangle)
    indices: Vec<u32>,
    /// Axis-aligned bounding box
    bounds: Aabb,
}

/// A mesh consisting of vertex positions and triangle indices.
#[derive(Clone, Debug)]
pub struct Mesh {
    data: Arc<MeshData>,
}

impl Mesh {
    /// Create a new mesh from positions and indices.
    pub fn new(positions: Vec<Vec3>, indices: Vec<u32>) -> Self {
        let bounds = positions
            .iter()
            .fold(Aabb::EMPTY, |acc, p| acc.union_point(*p));
        Self {
            data: Arc::new(MeshData {
                positions,
                indices,
                bounds,
            }),
        }
    }

    /// Get the number of triangles in the mesh.
    pub fn triangle_count(&self) -> usize {
        self.data.indices.len() / 3
    }

    /// Get the number of vertices in the mesh.
    pub fn vertex_count(&self) -> usize {
        self.data.positions.len()
    }

    /// Bounds of the vertex positions.
    pub fn bounds(&self) -> Aabb {
        self.data.bounds
    }

    fn face_is_valid(&self, face: &[u32]) -> bool {
        let vertex_count = self.data.positions.len();
        face.iter().all(|&i| (i as usize) < vertex_count)
    }
}

impl Primitive for Mesh {
    fn world_bound(&self) -> Aabb {
        self.data.bounds
    }

    fn intersect(&self, _ray: &Ray, _ray_t: Interval) -> Option<Intersection> {
        // Meshes are refined before any query reaches them
        None
    }

    fn can_intersect(&self) -> bool {
        false
    }

    fn refine(&self, refined: &mut Vec<Arc<dyn Primitive>>) {
        refined.reserve(self.triangle_count());

        for (face, chunk) in self.data.indices.chunks_exact(3).enumerate() {
            if !self.face_is_valid(chunk) {
                log::warn!(
                    "Invalid triangle indices: {:?}, vertex count: {}",
                    chunk,
                    self.data.positions.len()
                );
                continue;
            }

            refined.push(Arc::new(MeshTriangle {
                mesh: Arc::clone(&self.data),
                face: face as u32,
            }));
        }
    }
}

/// One face of a [`Mesh`].
#[derive(Debug)]
pub struct MeshTriangle {
    mesh: Arc<MeshData>,
    face: u32,
}

impl MeshTriangle {
    /// The three vertices of this face.
    pub fn vertices(&self) -> [Vec3; 3] {
        let base = self.face as usize * 3;
        let idx = &self.mesh.indices[base..base + 3];
        [
            self.mesh.positions[idx[0] as usize],
            self.mesh.positions[idx[1] as usize],
            self.mesh.positions[idx[2] as usize],
        ]
    }
}

impl Primitive for MeshTriangle {
    fn world_bound(&self) -> Aabb {
        let [v0, v1, v2] = self.vertices();
        triangle_bounds(v0, v1, v2)
    }

    fn intersect(&self, ray: &Ray, ray_t: Interval) -> Option<Intersection> {
        let [v0, v1, v2] = self.vertices();
        let (t, u, v) = intersect_triangle(v0, v1, v2, ray, ray_t)?;
        let normal = (v1 - v0).cross(v2 - v0).normalize_or_zero();
        Some(Intersection::new(ray, t, normal, u, v))
    }
}

/// A regular grid of `n x n` quads (two triangles each) in the XZ plane,
/// spanning `[0, size]` on both axes at height `y`.
pub fn grid_mesh(n: u32, size: f32, y: f32) -> Mesh {
    let step = size / n as f32;
    let positions = (0..=n)
        .flat_map(|j| (0..=n).map(move |i| Vec3::new(i as f32 * step, y, j as f32 * step)))
        .collect();

    let row = n + 1;
    let mut indices = Vec::with_capacity((n * n * 6) as usize);
    for j in 0..n {
        for i in 0..n {
            let a = j * row + i;
            let b = a + 1;
            let c = a + row;
            let d = c + 1;
            indices.extend_from_slice(&[a, c, b, b, c, d]);
        }
    }

    Mesh::new(positions, indices)
}
