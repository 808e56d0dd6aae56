//! Leaf swizzling: turns the per-slot leaf lists into one contiguous
//! primitive-index array and groups each leaf into quads.

use super::builder::LeafScratch;
use super::node::{ChildSlot, LeafRange, NodeIndex, QbvhNode};
use crate::error::{to_index, try_reserve, BuildResult};

/// Up to four primitive references tested together.
///
/// Lanes past `len` repeat the last valid index of the group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuadPrimitive {
    indices: [u32; 4],
    len: u8,
}

impl QuadPrimitive {
    /// Pack one to four references. Returns `None` for an empty group.
    pub fn new(group: &[u32]) -> Option<Self> {
        let last = *group.last()?;
        let len = group.len().min(4);
        let mut indices = [last; 4];
        indices[..len].copy_from_slice(&group[..len]);
        Some(Self {
            indices,
            len: len as u8,
        })
    }

    /// The valid references.
    pub fn indices(&self) -> &[u32] {
        &self.indices[..self.len as usize]
    }

    /// All four lanes, padding included.
    pub fn lanes(&self) -> [u32; 4] {
        self.indices
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Output of [`swizzle_leaves`].
#[derive(Debug, Default)]
pub(crate) struct SwizzledLeaves {
    pub primitive_indices: Vec<u32>,
    pub quads: Vec<QuadPrimitive>,
}

/// Lay out every leaf list contiguously and finalize the leaf descriptors.
///
/// Lists are appended slot by slot (slot 0 of every node, then slot 1, ...).
/// The array is then padded with its last index three times so a 4-wide
/// read from any leaf start stays in bounds. Finally the quads are built in
/// depth-first leaf order.
pub(crate) fn swizzle_leaves(
    nodes: &mut [QbvhNode],
    leaves: LeafScratch,
) -> BuildResult<SwizzledLeaves> {
    let total = leaves.total_references();
    let mut primitive_indices = Vec::new();
    try_reserve(&mut primitive_indices, total + 3, "primitive indices")?;

    for slot in 0..4 {
        for (node, list) in nodes.iter_mut().zip(leaves.slot(slot)) {
            if list.is_empty() {
                continue;
            }
            let start = to_index(primitive_indices.len())?;
            primitive_indices.extend_from_slice(list);
            let count = to_index(list.len())?;
            node.set_child(slot, ChildSlot::Leaf(LeafRange::new(start, count, 0)));
        }
    }

    if let Some(&last) = primitive_indices.last() {
        primitive_indices.extend([last; 3]);
    }

    let quads = pre_swizzle(nodes, &primitive_indices)?;
    log::debug!(
        "Swizzled {} primitive references into {} quads",
        total,
        quads.len()
    );

    Ok(SwizzledLeaves {
        primitive_indices,
        quads,
    })
}

/// Build the quad array in depth-first order and record each leaf's
/// `first_quad`.
fn pre_swizzle(nodes: &mut [QbvhNode], primitive_indices: &[u32]) -> BuildResult<Vec<QuadPrimitive>> {
    let mut quads = Vec::new();
    if nodes.is_empty() {
        return Ok(quads);
    }

    let mut stack = vec![NodeIndex::ROOT];
    while let Some(index) = stack.pop() {
        // Push in reverse so slot 0 is visited first
        for slot in (0..4).rev() {
            if let ChildSlot::Node(child) = nodes[index.get()].child(slot) {
                stack.push(child);
            }
        }

        for slot in 0..4 {
            let ChildSlot::Leaf(range) = nodes[index.get()].child(slot) else {
                continue;
            };
            let first_quad = to_index(quads.len())?;
            try_reserve(&mut quads, range.quads as usize, "quad primitives")?;
            quads.extend(range.indices(primitive_indices).chunks(4).filter_map(QuadPrimitive::new));
            nodes[index.get()].set_child(
                slot,
                ChildSlot::Leaf(LeafRange::new(range.start, range.count, first_quad)),
            );
        }
    }

    Ok(quads)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qbvh::builder::BuildContext;
    use crate::QbvhConfig;
    use quadray_math::{Aabb, Vec3};

    fn build_scratch(count: usize, config: QbvhConfig) -> (Vec<QbvhNode>, LeafScratch) {
        let bounds: Vec<Aabb> = (0..count)
            .map(|i| {
                let x = (i as f32 * 0.618).fract() * 40.0;
                let y = (i as f32 * 0.331).fract() * 10.0;
                Aabb::from_corners(Vec3::new(x, y, 0.0), Vec3::new(x + 0.5, y + 0.5, 0.5))
            })
            .collect();
        let centroids: Vec<Vec3> = bounds.iter().map(Aabb::centroid).collect();

        let mut ctx = BuildContext::new(config, &bounds, &centroids, 4).unwrap();
        let root = ctx.root_subset().unwrap();
        ctx.build(root).unwrap();
        let (nodes, leaves, _) = ctx.finish();
        (nodes, leaves)
    }

    fn leaf_ranges(nodes: &[QbvhNode]) -> Vec<(usize, usize, LeafRange)> {
        let mut ranges = Vec::new();
        for (n, node) in nodes.iter().enumerate() {
            for (slot, child) in node.children().iter().enumerate() {
                if let Some(range) = child.leaf() {
                    ranges.push((n, slot, range));
                }
            }
        }
        ranges
    }

    #[test]
    fn test_quad_primitive_pads_with_last_index() {
        let quad = QuadPrimitive::new(&[7, 3]).unwrap();
        assert_eq!(quad.indices(), &[7, 3]);
        assert_eq!(quad.lanes(), [7, 3, 3, 3]);
        assert_eq!(quad.len(), 2);

        assert!(QuadPrimitive::new(&[]).is_none());
        assert_eq!(QuadPrimitive::new(&[1, 2, 3, 4]).unwrap().lanes(), [1, 2, 3, 4]);
    }

    #[test]
    fn test_swizzle_keeps_leaf_membership() {
        let (mut nodes, leaves) = build_scratch(137, QbvhConfig::default());
        let mut before = Vec::new();
        for slot in 0..4 {
            for (n, list) in leaves.slot(slot).iter().enumerate() {
                if !list.is_empty() {
                    before.push(((n, slot), list.clone()));
                }
            }
        }

        let out = swizzle_leaves(&mut nodes, leaves).unwrap();

        let mut after: Vec<_> = leaf_ranges(&nodes)
            .into_iter()
            .map(|(n, slot, range)| ((n, slot), range.indices(&out.primitive_indices).to_vec()))
            .collect();
        after.sort_by_key(|(at, _)| (at.1, at.0));
        assert_eq!(before, after);
    }

    #[test]
    fn test_runs_are_slot_major_and_padded() {
        let (mut nodes, leaves) = build_scratch(64, QbvhConfig::default());
        let out = swizzle_leaves(&mut nodes, leaves).unwrap();
        let indices = &out.primitive_indices;

        assert_eq!(indices.len(), 64 + 3);
        let last = indices[63];
        assert_eq!(&indices[64..], &[last; 3]);

        let mut ranges = leaf_ranges(&nodes);
        ranges.sort_by_key(|(n, slot, _)| (*slot, *n));
        let mut expected_start = 0;
        for (_, _, range) in &ranges {
            assert_eq!(range.start, expected_start);
            expected_start += range.count;
            // A 4-wide read from the leaf start stays in bounds
            assert!(range.quad_span().end <= indices.len());
        }
        assert_eq!(expected_start, 64);
    }

    #[test]
    fn test_quads_cover_each_leaf() {
        let (mut nodes, leaves) = build_scratch(90, QbvhConfig::default().with_max_prims_per_leaf(6));
        let out = swizzle_leaves(&mut nodes, leaves).unwrap();

        let mut total_quads = 0;
        for (_, _, range) in leaf_ranges(&nodes) {
            let quads = &out.quads[range.quad_range()];
            let from_quads: Vec<u32> = quads.iter().flat_map(|q| q.indices().to_vec()).collect();
            assert_eq!(from_quads, range.indices(&out.primitive_indices));
            assert_eq!(quads.len() as u32, range.count.div_ceil(4));
            total_quads += quads.len();
        }
        assert_eq!(total_quads, out.quads.len());
    }

    #[test]
    fn test_empty_scratch_adds_no_padding() {
        let mut nodes = vec![QbvhNode::new()];
        let mut leaves = LeafScratch::default();
        leaves.push_node().unwrap();

        let out = swizzle_leaves(&mut nodes, leaves).unwrap();
        assert!(out.primitive_indices.is_empty());
        assert!(out.quads.is_empty());
        assert!(nodes[0].child(0).is_empty());
    }
}
