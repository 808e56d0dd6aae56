//! Build-quality statistics.

use super::node::{ChildSlot, NodeIndex, QbvhNode};
use quadray_math::Aabb;
use std::fmt;

/// Summary of a finished tree. Nothing at query time reads these values.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QbvhStatistics {
    /// SAH cost relative to the root bounds: one per visited node plus
    /// `area(leaf) / area(root) * count` per leaf
    pub sah_cost: f32,
    /// Deepest node level, the root being level 0
    pub max_depth: u32,
    pub node_count: u32,
    pub empty_leaf_count: u32,
    /// Non-empty leaves
    pub leaf_count: u32,
    pub avg_leaf_references: f32,
    pub primitive_references: u32,
}

impl fmt::Display for QbvhStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SAH cost {:.3}, {} nodes, depth {}, {} leaves ({} empty), {:.2} refs/leaf, {} refs",
            self.sah_cost,
            self.node_count,
            self.max_depth,
            self.leaf_count,
            self.empty_leaf_count,
            self.avg_leaf_references,
            self.primitive_references
        )
    }
}

impl QbvhStatistics {
    pub fn log(&self) {
        log::debug!("SQBVH statistics: {}", self);
    }
}

/// Walk the tree from the root and collect its statistics.
pub fn collect_statistics(nodes: &[QbvhNode], world_bound: &Aabb) -> QbvhStatistics {
    let mut stats = QbvhStatistics::default();
    if nodes.is_empty() {
        return stats;
    }

    let root_area = world_bound.surface_area();
    let area_ratio = |bbox: &Aabb| {
        if root_area > 0.0 {
            bbox.surface_area() / root_area
        } else {
            0.0
        }
    };

    let mut stack = vec![(NodeIndex::ROOT, 0u32, 1.0f32)];
    while let Some((index, depth, node_ratio)) = stack.pop() {
        let node = &nodes[index.get()];
        stats.node_count += 1;
        stats.max_depth = stats.max_depth.max(depth);
        stats.sah_cost += node_ratio;

        for (slot, child) in node.children().iter().enumerate() {
            match child {
                ChildSlot::Node(child) => {
                    stack.push((*child, depth + 1, area_ratio(&node.child_bbox(slot))));
                }
                ChildSlot::Leaf(range) => {
                    stats.leaf_count += 1;
                    stats.primitive_references += range.count;
                    stats.sah_cost += area_ratio(&node.child_bbox(slot)) * range.count as f32;
                }
                ChildSlot::Empty => stats.empty_leaf_count += 1,
            }
        }
    }

    if stats.leaf_count > 0 {
        stats.avg_leaf_references = stats.primitive_references as f32 / stats.leaf_count as f32;
    }
    stats
}
