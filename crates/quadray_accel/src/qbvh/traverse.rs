//! Ray queries against a built [`Qbvh`].

use super::node::{ChildSlot, LeafRange, NodeIndex};
use super::Qbvh;
use crate::primitive::{Intersection, Primitive};
use quadray_math::{Aabb, Interval, Ray};
use rayon::prelude::*;
use std::ops::ControlFlow;

impl Qbvh {
    /// Visit every leaf whose bounds the ray enters within `ray_t`.
    ///
    /// The visitor may shrink `ray_t.max` to prune farther nodes, or break
    /// to stop the walk.
    fn traverse<F>(&self, ray: &Ray, ray_t: &mut Interval, mut visit_leaf: F)
    where
        F: FnMut(LeafRange, &mut Interval) -> ControlFlow<()>,
    {
        if self.nodes.is_empty() {
            return;
        }

        let inv_direction = ray.inv_direction();
        let mut stack = Vec::with_capacity(64);
        stack.push(NodeIndex::ROOT);

        while let Some(index) = stack.pop() {
            let node = &self.nodes[index.get()];
            let hits = node.intersect_children(ray.origin, inv_direction, ray_t.min, ray_t.max);

            for (slot, hit) in hits.into_iter().enumerate() {
                if !hit {
                    continue;
                }
                match node.child(slot) {
                    ChildSlot::Node(child) => stack.push(child),
                    ChildSlot::Leaf(range) => {
                        if visit_leaf(range, ray_t).is_break() {
                            return;
                        }
                    }
                    ChildSlot::Empty => {}
                }
            }
        }
    }

    /// Nearest hit in one leaf, tested quad by quad.
    fn intersect_leaf(&self, range: LeafRange, ray: &Ray, ray_t: &mut Interval) -> Option<Intersection> {
        let mut closest = None;
        for quad in &self.quads[range.quad_range()] {
            for &prim in quad.indices() {
                if let Some(mut hit) = self.primitives[prim as usize].intersect(ray, *ray_t) {
                    ray_t.max = hit.t;
                    hit.primitive = prim;
                    closest = Some(hit);
                }
            }
        }
        closest
    }

    /// Answer many closest-hit queries in parallel.
    pub fn intersect_batch(&self, rays: &[Ray], ray_t: Interval) -> Vec<Option<Intersection>> {
        rays.par_iter().map(|ray| self.intersect(ray, ray_t)).collect()
    }
}

impl Primitive for Qbvh {
    fn world_bound(&self) -> Aabb {
        self.world_bound
    }

    fn intersect(&self, ray: &Ray, ray_t: Interval) -> Option<Intersection> {
        let mut ray_t = ray_t;
        let mut closest = None;
        self.traverse(ray, &mut ray_t, |range, ray_t| {
            if let Some(hit) = self.intersect_leaf(range, ray, ray_t) {
                closest = Some(hit);
            }
            ControlFlow::Continue(())
        });
        closest
    }

    fn intersect_p(&self, ray: &Ray, ray_t: Interval) -> bool {
        let mut ray_t = ray_t;
        let mut found = false;
        self.traverse(ray, &mut ray_t, |range, ray_t| {
            let any = self.quads[range.quad_range()]
                .iter()
                .flat_map(|quad| quad.indices())
                .any(|&prim| self.primitives[prim as usize].intersect_p(ray, *ray_t));
            if any {
                found = true;
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        found
    }
}
