//! Recursive construction of the quad tree shape.
//!
//! Each recursion step makes one binary decision. Two consecutive decisions
//! share a physical node: a step in the [`Attach::Fresh`] (or
//! [`Attach::Root`]) state allocates a node and hands slots 0 and 2 to its
//! children in the [`Attach::Pending`] state, which split into slots
//! `s` and `s + 1` of that same node without allocating.
//!
//! Leaves only record their primitive list into [`LeafScratch`]; the final
//! primitive-index layout is produced after the whole tree exists.

use super::node::{ChildSlot, LeafRange, NodeIndex, QbvhNode};
use super::object_split::{find_object_split, ObjectSplit};
use super::spatial_split::{find_spatial_split, spatial_sides};
use crate::error::{to_index, try_reserve, BuildResult};
use crate::QbvhConfig;
use quadray_math::{Aabb, Interval, Vec3};

/// Recursion depth ceiling. A step deeper than this is forced to be a
/// leaf, so splits happen at depths `0..=MAX_DEPTH`.
pub const MAX_DEPTH: u32 = 64;

/// Leaves above this size are reported as a geometry problem.
pub const OVERSIZED_LEAF: usize = 64;

/// One child slot of one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SlotRef {
    pub node: NodeIndex,
    pub slot: usize,
}

impl SlotRef {
    fn new(node: NodeIndex, slot: usize) -> Self {
        Self { node, slot }
    }

    fn next(self) -> Self {
        Self::new(self.node, self.slot + 1)
    }
}

/// Where the result of one recursion step is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Attach {
    /// Top of the tree. A split allocates the root node; a leaf becomes
    /// slot 0 of a root node holding nothing else.
    Root,
    /// A split allocates a node and links it from this slot; a leaf fills it.
    Fresh(SlotRef),
    /// The node one level up is still open. A split fills this slot and the
    /// next one; a leaf fills this slot.
    Pending(SlotRef),
}

/// What the builder had to do about degenerate input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildDiagnostics {
    /// Leaves forced by the recursion-depth ceiling
    pub depth_limited_leaves: u32,
    /// Leaves forced because no object split existed (coincident centroids)
    pub degenerate_leaves: u32,
    /// Forced leaves holding more than 64 primitives
    pub oversized_leaves: u32,
    /// Object splits replaced by spatial splits
    pub spatial_splits: u32,
}

/// Per-slot, per-node leaf primitive lists, indexed `[slot][node]`.
#[derive(Debug, Default)]
pub(crate) struct LeafScratch {
    slots: [Vec<Vec<u32>>; 4],
}

impl LeafScratch {
    /// Make room for one more node.
    pub fn push_node(&mut self) -> BuildResult<()> {
        for lists in &mut self.slots {
            try_reserve(lists, 1, "leaf scratch")?;
            lists.push(Vec::new());
        }
        Ok(())
    }

    fn record(&mut self, at: SlotRef, prims: &[u32]) {
        self.slots[at.slot][at.node.get()].extend_from_slice(prims);
    }

    /// Leaf lists of one slot, indexed by node.
    pub fn slot(&self, slot: usize) -> &[Vec<u32>] {
        &self.slots[slot]
    }

    /// Total number of recorded primitive references.
    pub fn total_references(&self) -> usize {
        self.slots.iter().flatten().map(Vec::len).sum()
    }
}

/// A set of primitive references with its bounds and centroid bounds.
///
/// `bounds[i]` and `centroids[i]` belong to the reference `prims[i]`. After
/// a spatial split a reference is bounded by its clipped piece, which can be
/// smaller than the primitive's own box.
#[derive(Debug, Clone)]
pub(crate) struct Subset {
    pub prims: Vec<u32>,
    pub bounds: Vec<Aabb>,
    pub centroids: Vec<Vec3>,
    pub bbox: Aabb,
    pub centroid_bbox: Aabb,
}

impl Subset {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            prims: Vec::with_capacity(capacity),
            bounds: Vec::with_capacity(capacity),
            centroids: Vec::with_capacity(capacity),
            bbox: Aabb::EMPTY,
            centroid_bbox: Aabb::EMPTY,
        }
    }

    pub fn push(&mut self, prim: u32, bbox: &Aabb, centroid: Vec3) {
        self.prims.push(prim);
        self.bounds.push(*bbox);
        self.centroids.push(centroid);
        self.bbox = Aabb::surrounding(&self.bbox, bbox);
        self.centroid_bbox = self.centroid_bbox.union_point(centroid);
    }

    pub fn len(&self) -> usize {
        self.prims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prims.is_empty()
    }

    /// Unnormalized SAH: `area * count`.
    pub fn sah(&self) -> f32 {
        self.bbox.surface_area() * self.len() as f32
    }
}

/// Mutable state of one build, dropped when the build finishes.
pub(crate) struct BuildContext<'a> {
    config: QbvhConfig,
    bounds: &'a [Aabb],
    centroids: &'a [Vec3],
    max_depth: u32,
    nodes: Vec<QbvhNode>,
    leaves: LeafScratch,
    diagnostics: BuildDiagnostics,
}

impl<'a> BuildContext<'a> {
    pub fn new(
        config: QbvhConfig,
        bounds: &'a [Aabb],
        centroids: &'a [Vec3],
        node_capacity: usize,
    ) -> BuildResult<Self> {
        let mut nodes = Vec::new();
        try_reserve(&mut nodes, node_capacity, "node storage")?;
        let mut leaves = LeafScratch::default();
        for lists in &mut leaves.slots {
            try_reserve(lists, node_capacity, "leaf scratch")?;
        }

        Ok(Self {
            config,
            bounds,
            centroids,
            max_depth: MAX_DEPTH,
            nodes,
            leaves,
            diagnostics: BuildDiagnostics::default(),
        })
    }

    /// Subset holding every primitive.
    pub fn root_subset(&self) -> BuildResult<Subset> {
        let count = to_index(self.bounds.len())?;
        let mut subset = Subset::new();
        try_reserve(&mut subset.prims, self.bounds.len(), "primitive list")?;
        try_reserve(&mut subset.bounds, self.bounds.len(), "primitive list")?;
        try_reserve(&mut subset.centroids, self.bounds.len(), "primitive list")?;
        for prim in 0..count {
            subset.push(prim, &self.bounds[prim as usize], self.centroids[prim as usize]);
        }
        Ok(subset)
    }

    /// Build the whole tree.
    pub fn build(&mut self, root: Subset) -> BuildResult<()> {
        self.build_tree(root, Attach::Root, 0)
    }

    /// Hand back the node array, the leaf lists and the diagnostics.
    pub fn finish(self) -> (Vec<QbvhNode>, LeafScratch, BuildDiagnostics) {
        (self.nodes, self.leaves, self.diagnostics)
    }

    fn build_tree(&mut self, subset: Subset, attach: Attach, depth: u32) -> BuildResult<()> {
        debug_assert_eq!(
            matches!(attach, Attach::Pending(_)),
            depth % 2 == 1,
            "pending slots only exist on odd levels"
        );
        let count = subset.len();

        if depth > self.max_depth || count <= self.config.max_prims_per_leaf as usize {
            if depth > self.max_depth {
                log::warn!(
                    "Maximum recursion depth reached while constructing SQBVH, forcing a leaf node"
                );
                self.diagnostics.depth_limited_leaves += 1;
                if count > OVERSIZED_LEAF {
                    log::error!(
                        "SQBVH unable to handle geometry, too many primitives in leaf ({})",
                        count
                    );
                    self.diagnostics.oversized_leaves += 1;
                }
            }
            return self.create_leaf(attach, &subset);
        }

        let Some(split) =
            find_object_split(&subset.bounds, &subset.centroids, &subset.centroid_bbox)
        else {
            self.diagnostics.degenerate_leaves += 1;
            if count > OVERSIZED_LEAF {
                log::error!(
                    "SQBVH unable to handle geometry, {} primitives share the same centroid",
                    count
                );
                self.diagnostics.oversized_leaves += 1;
            }
            return self.create_leaf(attach, &subset);
        };

        let (mut left, mut right) = self.partition_object(&subset, &split);

        if self.config.spatial_splits {
            if let Some((l, r)) = self.try_spatial_split(&subset, &left, &right) {
                left = l;
                right = r;
                self.diagnostics.spatial_splits += 1;
            }
        }

        let (left_attach, right_attach) = self.open_children(attach, &subset.bbox)?;
        self.build_tree(left, left_attach, depth + 1)?;
        self.build_tree(right, right_attach, depth + 1)
    }

    /// Split by centroid against the split position. Every reference ends up
    /// on exactly one side; if one side would be empty the subset is cut at
    /// its centroid median instead.
    pub fn partition_object(&self, subset: &Subset, split: &ObjectSplit) -> (Subset, Subset) {
        let mut left = Subset::with_capacity(split.left_count as usize);
        let mut right = Subset::with_capacity(split.right_count as usize);

        for ((&prim, bbox), &centroid) in subset.prims.iter().zip(&subset.bounds).zip(&subset.centroids) {
            let side = if split.goes_left(centroid) {
                &mut left
            } else {
                &mut right
            };
            side.push(prim, bbox, centroid);
        }

        if left.is_empty() || right.is_empty() {
            return self.partition_median(subset, split.axis);
        }
        (left, right)
    }

    /// Split at the centroid median along `axis` (ties broken by index).
    pub fn partition_median(&self, subset: &Subset, axis: usize) -> (Subset, Subset) {
        let mut order: Vec<usize> = (0..subset.len()).collect();
        order.sort_unstable_by(|&a, &b| {
            subset.centroids[a][axis]
                .total_cmp(&subset.centroids[b][axis])
                .then(subset.prims[a].cmp(&subset.prims[b]))
        });

        let mid = order.len() / 2;
        let mut left = Subset::with_capacity(mid);
        let mut right = Subset::with_capacity(order.len() - mid);
        for (rank, &i) in order.iter().enumerate() {
            let side = if rank < mid { &mut left } else { &mut right };
            side.push(subset.prims[i], &subset.bounds[i], subset.centroids[i]);
        }
        (left, right)
    }

    /// Replace an object split by a spatial split when the object split's
    /// children overlap enough and the spatial split is cheaper.
    ///
    /// References straddling the plane go to both children, each side
    /// bounded by its clipped part of the primitive.
    pub fn try_spatial_split(
        &self,
        subset: &Subset,
        left: &Subset,
        right: &Subset,
    ) -> Option<(Subset, Subset)> {
        let overlap = left.bbox.intersection(&right.bbox)?;
        let union_area = Aabb::surrounding(&left.bbox, &right.bbox).surface_area();
        if !(overlap.surface_area() / union_area > self.config.alpha) {
            return None;
        }

        let spatial = find_spatial_split(&subset.bounds, &subset.bbox, &subset.centroid_bbox)?;
        if spatial.cost >= left.sah() + right.sah() {
            return None;
        }

        let axis = spatial.axis;
        let node_range = subset.bbox.axis_interval(axis);
        let left_region = subset
            .bbox
            .with_axis(axis, Interval::new(node_range.min, spatial.position));
        let right_region = subset
            .bbox
            .with_axis(axis, Interval::new(spatial.position, node_range.max));

        let mut spatial_left = Subset::with_capacity(spatial.left_count as usize);
        let mut spatial_right = Subset::with_capacity(spatial.right_count as usize);
        for ((&prim, bbox), &centroid) in subset.prims.iter().zip(&subset.bounds).zip(&subset.centroids) {
            match spatial_sides(bbox, axis, spatial.position) {
                (true, false) => spatial_left.push(prim, bbox, centroid),
                (false, true) => spatial_right.push(prim, bbox, centroid),
                _ => {
                    let left_piece = bbox.intersection(&left_region).unwrap_or(*bbox);
                    let right_piece = bbox.intersection(&right_region).unwrap_or(*bbox);
                    spatial_left.push(prim, &left_piece, left_piece.centroid());
                    spatial_right.push(prim, &right_piece, right_piece.centroid());
                }
            }
        }

        // Both children must shrink or the recursion would not progress
        let count = subset.len();
        if spatial_left.is_empty()
            || spatial_right.is_empty()
            || spatial_left.len() >= count
            || spatial_right.len() >= count
        {
            return None;
        }
        Some((spatial_left, spatial_right))
    }

    /// Attachments for the two children of a split.
    fn open_children(&mut self, attach: Attach, bbox: &Aabb) -> BuildResult<(Attach, Attach)> {
        let node = match attach {
            Attach::Pending(at) => return Ok((Attach::Fresh(at), Attach::Fresh(at.next()))),
            Attach::Root => self.alloc_node()?,
            Attach::Fresh(at) => {
                let node = self.alloc_node()?;
                let parent = &mut self.nodes[at.node.get()];
                parent.set_child(at.slot, ChildSlot::Node(node));
                parent.set_child_bbox(at.slot, bbox);
                node
            }
        };
        Ok((
            Attach::Pending(SlotRef::new(node, 0)),
            Attach::Pending(SlotRef::new(node, 2)),
        ))
    }

    /// Store a leaf. Its slot gets a provisional descriptor (start 0) that
    /// the swizzle pass replaces.
    fn create_leaf(&mut self, attach: Attach, subset: &Subset) -> BuildResult<()> {
        let at = match attach {
            Attach::Root => SlotRef::new(self.alloc_node()?, 0),
            Attach::Fresh(at) | Attach::Pending(at) => at,
        };

        let node = &mut self.nodes[at.node.get()];
        node.set_child_bbox(at.slot, &subset.bbox);
        if !subset.is_empty() {
            let count = to_index(subset.len())?;
            node.set_child(at.slot, ChildSlot::Leaf(LeafRange::new(0, count, 0)));
            self.leaves.record(at, &subset.prims);
        }
        Ok(())
    }

    fn alloc_node(&mut self) -> BuildResult<NodeIndex> {
        let index = NodeIndex::new(to_index(self.nodes.len())?);
        try_reserve(&mut self.nodes, 1, "node storage")?;
        self.nodes.push(QbvhNode::new());
        self.leaves.push_node()?;
        Ok(index)
    }
}
