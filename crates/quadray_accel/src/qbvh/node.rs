//! Four-wide node layout.
//!
//! Nodes live in one flat array and refer to each other by [`NodeIndex`].
//! Child bounds are stored lane-wise (`[min|max][axis][child]`) so a single
//! visit tests all four children with the same arithmetic.

use quadray_math::{Aabb, Interval, Vec3};
use std::ops::Range;

/// Index of a node in the node array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(u32);

impl NodeIndex {
    /// The root node, always at index 0.
    pub const ROOT: NodeIndex = NodeIndex(0);

    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    pub const fn get(self) -> usize {
        self.0 as usize
    }
}

/// Location of one leaf's primitive references.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeafRange {
    /// First entry in the primitive-index array
    pub start: u32,
    /// Number of primitive references owned by the leaf
    pub count: u32,
    /// `ceil(count / 4)`
    pub quads: u32,
    /// First entry in the quad array
    pub first_quad: u32,
}

impl LeafRange {
    pub fn new(start: u32, count: u32, first_quad: u32) -> Self {
        Self {
            start,
            count,
            quads: count.div_ceil(4),
            first_quad,
        }
    }

    /// The primitive references of this leaf.
    pub fn indices<'a>(&self, primitive_indices: &'a [u32]) -> &'a [u32] {
        let start = self.start as usize;
        &primitive_indices[start..start + self.count as usize]
    }

    /// The quad-aligned span read by 4-wide leaf tests. It may run past
    /// `count` into the next leaf or the trailing padding.
    pub fn quad_span(&self) -> Range<usize> {
        let start = self.start as usize;
        start..start + 4 * self.quads as usize
    }

    /// Range of this leaf's entries in the quad array.
    pub fn quad_range(&self) -> Range<usize> {
        let first = self.first_quad as usize;
        first..first + self.quads as usize
    }
}

/// Contents of one of a node's four child slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChildSlot {
    /// An empty leaf: nothing to intersect.
    #[default]
    Empty,
    /// Another node of the array.
    Node(NodeIndex),
    /// A run of primitive references.
    Leaf(LeafRange),
}

impl ChildSlot {
    /// Empty slots count as leaves.
    pub fn is_leaf(&self) -> bool {
        !matches!(self, ChildSlot::Node(_))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, ChildSlot::Empty)
    }

    pub fn node(&self) -> Option<NodeIndex> {
        match self {
            ChildSlot::Node(index) => Some(*index),
            _ => None,
        }
    }

    pub fn leaf(&self) -> Option<LeafRange> {
        match self {
            ChildSlot::Leaf(range) => Some(*range),
            _ => None,
        }
    }
}

/// A QBVH node: four child slots and their bounds.
#[derive(Debug, Clone, PartialEq)]
#[repr(C, align(16))]
pub struct QbvhNode {
    /// `bboxes[0]` holds minimums, `bboxes[1]` maximums, per axis, per child.
    bboxes: [[[f32; 4]; 3]; 2],
    children: [ChildSlot; 4],
}

impl Default for QbvhNode {
    fn default() -> Self {
        Self::new()
    }
}

impl QbvhNode {
    /// A node with four empty slots whose bounds no ray can hit.
    pub fn new() -> Self {
        Self {
            bboxes: [[[f32::INFINITY; 4]; 3], [[f32::NEG_INFINITY; 4]; 3]],
            children: [ChildSlot::Empty; 4],
        }
    }

    pub fn child(&self, slot: usize) -> ChildSlot {
        self.children[slot]
    }

    pub fn children(&self) -> &[ChildSlot; 4] {
        &self.children
    }

    pub(crate) fn set_child(&mut self, slot: usize, child: ChildSlot) {
        self.children[slot] = child;
    }

    /// Bounds stored for one child slot.
    pub fn child_bbox(&self, slot: usize) -> Aabb {
        let axis = |a: usize| Interval::new(self.bboxes[0][a][slot], self.bboxes[1][a][slot]);
        Aabb::new(axis(0), axis(1), axis(2))
    }

    pub(crate) fn set_child_bbox(&mut self, slot: usize, bbox: &Aabb) {
        for axis in 0..3 {
            let interval = bbox.axis_interval(axis);
            self.bboxes[0][axis][slot] = interval.min;
            self.bboxes[1][axis][slot] = interval.max;
        }
    }

    /// Union of the four child bounds.
    pub fn bbox(&self) -> Aabb {
        (0..4).fold(Aabb::EMPTY, |acc, slot| {
            Aabb::surrounding(&acc, &self.child_bbox(slot))
        })
    }

    /// Slab test of a ray against all four child boxes at once.
    ///
    /// `inv_direction` is the reciprocal ray direction. Empty slots keep
    /// inverted bounds and never report a hit.
    #[inline]
    pub fn intersect_children(
        &self,
        origin: Vec3,
        inv_direction: Vec3,
        t_min: f32,
        t_max: f32,
    ) -> [bool; 4] {
        let mut near = [t_min; 4];
        let mut far = [t_max; 4];

        for axis in 0..3 {
            let (lo, hi) = if inv_direction[axis] < 0.0 { (1, 0) } else { (0, 1) };
            for lane in 0..4 {
                let t0 = (self.bboxes[lo][axis][lane] - origin[axis]) * inv_direction[axis];
                let t1 = (self.bboxes[hi][axis][lane] - origin[axis]) * inv_direction[axis];
                near[lane] = t0.max(near[lane]);
                far[lane] = t1.min(far[lane]);
            }
        }

        [
            near[0] <= far[0],
            near[1] <= far[1],
            near[2] <= far[2],
            near[3] <= far[3],
        ]
    }
}
