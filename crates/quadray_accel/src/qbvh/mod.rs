//! Spatial-split quad BVH (SQBVH).
//!
//! The tree is a flat array of four-wide nodes. Construction makes binary
//! SAH decisions and packs two levels of them into every node; leaves end up
//! as contiguous runs of a single primitive-index array, grouped into
//! [`QuadPrimitive`]s for four-at-a-time testing.
//!
//! ```ignore
//! let qbvh = Qbvh::build(&primitives, QbvhConfig::default())?;
//! let hit = qbvh.intersect(&ray, Interval::new(0.001, f32::INFINITY));
//! ```

mod builder;
mod node;
mod object_split;
mod spatial_split;
mod stats;
mod swizzle;
mod traverse;

pub use builder::{BuildDiagnostics, MAX_DEPTH, OVERSIZED_LEAF};
pub use node::{ChildSlot, LeafRange, NodeIndex, QbvhNode};
pub use object_split::{find_object_split, ObjectSplit};
pub use spatial_split::{find_spatial_split, SpatialSplit};
pub use stats::{collect_statistics, QbvhStatistics};
pub use swizzle::QuadPrimitive;

use crate::error::{to_index, try_reserve, BuildResult};
use crate::primitive::{refine_primitives, Primitive};
use crate::QbvhConfig;
use builder::BuildContext;
use quadray_math::{machine_epsilon, Aabb};
use std::sync::Arc;

/// Number of bins used by both split evaluators.
pub const NB_BINS: usize = 8;

/// A built spatial-split quad BVH over a set of primitives.
///
/// Immutable once built; queries may run from any number of threads.
pub struct Qbvh {
    config: QbvhConfig,
    primitives: Vec<Arc<dyn Primitive>>,
    nodes: Vec<QbvhNode>,
    primitive_indices: Vec<u32>,
    quads: Vec<QuadPrimitive>,
    world_bound: Aabb,
    statistics: QbvhStatistics,
    diagnostics: BuildDiagnostics,
}

impl Qbvh {
    /// Build the tree over `primitives`, refining anything that cannot be
    /// intersected directly.
    ///
    /// Degenerate geometry never fails the build; only allocation failure
    /// and index overflow do.
    pub fn build(primitives: &[Arc<dyn Primitive>], config: QbvhConfig) -> BuildResult<Self> {
        let config = config.validated();
        let primitives = refine_primitives(primitives);
        let count = primitives.len();
        to_index(count)?;

        let mut bounds = Vec::new();
        let mut centroids = Vec::new();
        try_reserve(&mut bounds, count, "primitive bounds")?;
        try_reserve(&mut centroids, count, "primitive centroids")?;
        let mut world_bound = Aabb::EMPTY;
        for primitive in &primitives {
            let bbox = primitive.world_bound();
            let bbox = bbox.expand(machine_epsilon(&bbox));
            world_bound = Aabb::surrounding(&world_bound, &bbox);
            centroids.push(bbox.centroid());
            bounds.push(bbox);
        }

        let estimate = estimate_node_count(count, config.max_prims_per_leaf);
        log::debug!(
            "Building SQBVH over {} primitives, estimated {} nodes",
            count,
            estimate
        );

        let mut context = BuildContext::new(config, &bounds, &centroids, estimate)?;
        let root = context.root_subset()?;
        context.build(root)?;
        let (mut nodes, leaves, diagnostics) = context.finish();
        log::debug!("SQBVH used {} of {} estimated nodes", nodes.len(), estimate);

        let swizzled = swizzle::swizzle_leaves(&mut nodes, leaves)?;

        let statistics = collect_statistics(&nodes, &world_bound);
        statistics.log();
        log::info!(
            "Built SQBVH: {} primitives, {} nodes, {} leaves, depth {}",
            count,
            statistics.node_count,
            statistics.leaf_count,
            statistics.max_depth
        );

        Ok(Self {
            config,
            primitives,
            nodes,
            primitive_indices: swizzled.primitive_indices,
            quads: swizzled.quads,
            world_bound,
            statistics,
            diagnostics,
        })
    }

    pub fn nodes(&self) -> &[QbvhNode] {
        &self.nodes
    }

    /// Swizzled primitive references, padded with three trailing entries.
    pub fn primitive_indices(&self) -> &[u32] {
        &self.primitive_indices
    }

    pub fn quads(&self) -> &[QuadPrimitive] {
        &self.quads
    }

    /// The refined primitives the indices refer to.
    pub fn primitives(&self) -> &[Arc<dyn Primitive>] {
        &self.primitives
    }

    pub fn world_bound(&self) -> Aabb {
        self.world_bound
    }

    pub fn statistics(&self) -> &QbvhStatistics {
        &self.statistics
    }

    pub fn diagnostics(&self) -> &BuildDiagnostics {
        &self.diagnostics
    }

    pub fn config(&self) -> &QbvhConfig {
        &self.config
    }

    /// Every non-empty leaf as `(node, slot, range)`, in node order.
    pub fn leaves(&self) -> impl Iterator<Item = (NodeIndex, usize, LeafRange)> + '_ {
        self.nodes.iter().enumerate().flat_map(|(index, node)| {
            node.children()
                .iter()
                .enumerate()
                .filter_map(move |(slot, child)| {
                    child
                        .leaf()
                        .map(|range| (NodeIndex::new(index as u32), slot, range))
                })
        })
    }

    /// Primitive references of one leaf.
    pub fn leaf_primitives(&self, range: LeafRange) -> &[u32] {
        range.indices(&self.primitive_indices)
    }
}

/// Initial node reservation: one root plus a layer of quad nodes for every
/// factor of four above the leaf count.
fn estimate_node_count(count: usize, max_prims_per_leaf: u32) -> usize {
    let leaves = count.div_ceil(max_prims_per_leaf.max(1) as usize);
    let mut layer = leaves.div_ceil(4);
    let mut total = 1;
    while layer > 1 {
        total += layer;
        layer = layer.div_ceil(4);
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{grid_mesh, Sphere, Triangle};
    use quadray_math::Vec3;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn spheres(centers: impl IntoIterator<Item = Vec3>, radius: f32) -> Vec<Arc<dyn Primitive>> {
        centers
            .into_iter()
            .map(|c| Arc::new(Sphere::new(c, radius)) as Arc<dyn Primitive>)
            .collect()
    }

    fn random_triangles(seed: u64, count: usize) -> Vec<Arc<dyn Primitive>> {
        let mut rng = StdRng::seed_from_u64(seed);
        let point = |rng: &mut StdRng| {
            Vec3::new(
                rng.gen_range(-50.0..50.0),
                rng.gen_range(-50.0..50.0),
                rng.gen_range(-50.0..50.0),
            )
        };
        (0..count)
            .map(|_| {
                let a = point(&mut rng);
                let b = a + point(&mut rng) * 0.05;
                let c = a + point(&mut rng) * 0.05;
                Arc::new(Triangle::new(a, b, c)) as Arc<dyn Primitive>
            })
            .collect()
    }

    /// Small random triangles plus long thin ones crossing the whole scene
    /// along X, which every object split has to overlap.
    fn straddling_triangles(seed: u64) -> Vec<Arc<dyn Primitive>> {
        let mut prims = random_triangles(seed, 300);
        let mut rng = StdRng::seed_from_u64(seed + 1);
        for _ in 0..60 {
            let y = rng.gen_range(-50.0..50.0);
            let z = rng.gen_range(-50.0..50.0);
            prims.push(Arc::new(Triangle::new(
                Vec3::new(-50.0, y, z),
                Vec3::new(50.0, y + 0.5, z),
                Vec3::new(50.0, y, z + 0.5),
            )));
        }
        prims
    }

    fn all_references(qbvh: &Qbvh) -> Vec<u32> {
        let mut refs: Vec<u32> = qbvh
            .leaves()
            .flat_map(|(_, _, range)| qbvh.leaf_primitives(range).to_vec())
            .collect();
        refs.sort_unstable();
        refs
    }

    #[test]
    fn test_small_input_is_a_root_leaf() {
        init_logger();
        let prims = spheres((0..3).map(|i| Vec3::new(i as f32 * 3.0, 0.0, 0.0)), 1.0);
        let qbvh = Qbvh::build(&prims, QbvhConfig::default()).unwrap();

        assert_eq!(qbvh.nodes().len(), 1);
        let root = &qbvh.nodes()[0];
        let range = root.child(0).leaf().unwrap();
        assert_eq!(range.count, 3);
        assert_eq!(range.quads, 1);
        assert!(root.children()[1..].iter().all(ChildSlot::is_empty));
        assert_eq!(qbvh.statistics().max_depth, 0);
        assert_eq!(qbvh.primitive_indices(), &[0, 1, 2, 2, 2, 2]);
    }

    #[test]
    fn test_empty_input_is_an_empty_root_leaf() {
        init_logger();
        let qbvh = Qbvh::build(&[], QbvhConfig::default()).unwrap();

        assert_eq!(qbvh.nodes().len(), 1);
        assert!(qbvh.nodes()[0].child(0).is_empty());
        assert!(qbvh.primitive_indices().is_empty());
        assert!(qbvh.quads().is_empty());
        assert_eq!(qbvh.statistics().primitive_references, 0);
        assert!(qbvh.world_bound().is_empty());
    }

    #[test]
    fn test_identical_centroids_form_one_leaf() {
        init_logger();
        // Nested spheres: identical centroids, different sizes
        let prims: Vec<Arc<dyn Primitive>> = (1..=100)
            .map(|i| Arc::new(Sphere::new(Vec3::ZERO, i as f32 * 0.1)) as Arc<dyn Primitive>)
            .collect();
        let qbvh = Qbvh::build(&prims, QbvhConfig::default()).unwrap();

        let leaves: Vec<_> = qbvh.leaves().collect();
        assert_eq!(leaves.len(), 1);
        assert_eq!(leaves[0].2.count, 100);
        assert_eq!(qbvh.diagnostics().degenerate_leaves, 1);
        assert_eq!(qbvh.diagnostics().oversized_leaves, 1);
        assert_eq!(all_references(&qbvh), (0..100).collect::<Vec<u32>>());
    }

    #[test]
    fn test_every_primitive_lands_in_exactly_one_leaf() {
        init_logger();
        let qbvh = Qbvh::build(&random_triangles(17, 2000), QbvhConfig::default()).unwrap();

        assert_eq!(qbvh.statistics().primitive_references, 2000);
        assert_eq!(all_references(&qbvh), (0..2000).collect::<Vec<u32>>());
        assert_eq!(qbvh.primitive_indices().len(), 2000 + 3);
        assert!(qbvh.leaves().all(|(_, _, range)| range.count <= 4));
    }

    #[test]
    fn test_leaf_bounds_contain_their_primitives() {
        init_logger();
        let qbvh = Qbvh::build(&random_triangles(23, 1000), QbvhConfig::default()).unwrap();

        for (node, slot, range) in qbvh.leaves() {
            let bbox = qbvh.nodes()[node.get()].child_bbox(slot);
            for &prim in qbvh.leaf_primitives(range) {
                let bound = qbvh.primitives()[prim as usize].world_bound();
                assert!(bbox.contains_box(&bound), "leaf {:?} misses primitive {}", bbox, prim);
            }
        }

        // Inner slots contain the whole node they point at
        for node in qbvh.nodes() {
            for (slot, child) in node.children().iter().enumerate() {
                if let Some(child) = child.node() {
                    let inner = qbvh.nodes()[child.get()].bbox();
                    assert!(node.child_bbox(slot).contains_box(&inner));
                }
            }
        }
        assert!(qbvh.world_bound().contains_box(&qbvh.nodes()[0].bbox()));
    }

    #[test]
    fn test_leaf_reads_stay_in_bounds() {
        init_logger();
        for count in [1, 5, 6, 7, 33, 250] {
            let prims = spheres((0..count).map(|i| Vec3::new(i as f32, (i % 3) as f32, 0.0)), 0.25);
            let config = QbvhConfig::default().with_max_prims_per_leaf(3);
            let qbvh = Qbvh::build(&prims, config).unwrap();

            let len = qbvh.primitive_indices().len();
            for (_, _, range) in qbvh.leaves() {
                assert!(range.start as usize + 4 <= len);
                assert!(range.quad_span().end <= len);
            }
        }
    }

    #[test]
    fn test_exponential_spacing_stays_within_depth_ceiling() {
        init_logger();
        let prims = spheres((0..150).map(|i| Vec3::new(1.2f32.powi(i), 0.0, 0.0)), 0.1);
        let qbvh = Qbvh::build(&prims, QbvhConfig::default()).unwrap();

        // Two binary levels per node level
        assert!(qbvh.statistics().max_depth <= MAX_DEPTH / 2);
        assert_eq!(all_references(&qbvh), (0..150).collect::<Vec<u32>>());
    }

    #[test]
    fn test_mesh_input_is_refined() {
        init_logger();
        let prims: Vec<Arc<dyn Primitive>> = vec![Arc::new(grid_mesh(10, 10.0, 0.0))];
        let qbvh = Qbvh::build(&prims, QbvhConfig::default()).unwrap();

        assert_eq!(qbvh.primitives().len(), 200);
        assert_eq!(qbvh.statistics().primitive_references, 200);
        assert!(qbvh.nodes().len() > 1);
    }

    #[test]
    fn test_spatial_splits_keep_every_primitive() {
        init_logger();
        let config = QbvhConfig::default().with_spatial_splits(true);
        let qbvh = Qbvh::build(&straddling_triangles(31), config).unwrap();

        assert!(qbvh.diagnostics().spatial_splits > 0);
        let mut refs = all_references(&qbvh);
        assert!(refs.len() > 360);
        refs.dedup();
        assert_eq!(refs, (0..360).collect::<Vec<u32>>());
        assert_eq!(qbvh.statistics().primitive_references as usize, qbvh.primitive_indices().len() - 3);
    }

    #[test]
    fn test_spatial_split_children_nest_in_their_slots() {
        init_logger();
        let config = QbvhConfig::default().with_spatial_splits(true);
        let qbvh = Qbvh::build(&straddling_triangles(37), config).unwrap();
        assert!(qbvh.diagnostics().spatial_splits > 0);

        for node in qbvh.nodes() {
            for (slot, child) in node.children().iter().enumerate() {
                if let Some(child) = child.node() {
                    let inner = qbvh.nodes()[child.get()].bbox();
                    assert!(
                        node.child_bbox(slot).contains_box(&inner),
                        "slot {:?} does not contain node {:?}",
                        node.child_bbox(slot),
                        inner
                    );
                }
            }
        }
        assert!(qbvh.world_bound().contains_box(&qbvh.nodes()[0].bbox()));
    }

    #[test]
    fn test_zero_leaf_size_is_clamped() {
        init_logger();
        let config = QbvhConfig::default().with_max_prims_per_leaf(0);
        let qbvh = Qbvh::build(&random_triangles(5, 40), config).unwrap();

        assert_eq!(qbvh.config().max_prims_per_leaf, 1);
        assert!(qbvh.leaves().all(|(_, _, range)| range.count == 1));
    }

    #[test]
    fn test_node_estimate() {
        assert_eq!(estimate_node_count(0, 4), 1);
        assert_eq!(estimate_node_count(16, 4), 1);
        assert_eq!(estimate_node_count(100, 4), 10);
        assert_eq!(estimate_node_count(100, 0), 1 + 25 + 7 + 2);
    }
}
