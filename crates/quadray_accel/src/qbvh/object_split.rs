//! Binned SAH object split.
//!
//! Centroids are binned along the widest axis of the centroid bounds (not
//! the primitive bounds, whose widest axis can be flat for the centroids).
//! Each bin boundary is scored with `area(left) * n_left + area(right) * n_right`
//! and the cheapest boundary becomes the split position.

use super::NB_BINS;
use quadray_math::{Aabb, Vec3};

/// A chosen object split: primitives whose centroid lies at or below
/// `position` on `axis` go left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectSplit {
    pub axis: usize,
    pub position: f32,
    /// Unnormalized SAH of the binned estimate
    pub cost: f32,
    pub left_count: u32,
    pub right_count: u32,
}

impl ObjectSplit {
    /// Side test used when partitioning.
    #[inline]
    pub fn goes_left(&self, centroid: Vec3) -> bool {
        centroid[self.axis] <= self.position
    }
}

/// Bin of `value` for bins starting at `k0`, `k1` bins per unit length.
#[inline]
pub(crate) fn bin_index(value: f32, k0: f32, k1: f32) -> usize {
    // Float to int casts saturate: values below k0 and NaN land in bin 0
    (((value - k0) * k1) as usize).min(NB_BINS - 1)
}

/// Choose the split axis and position for a subset of references.
///
/// `bounds` and `centroids` hold one entry per reference in the subset.
/// Returns `None` when the centroids do not spread along any axis (fewer
/// than two primitives, or all centroids coincident), in which case the
/// subset cannot be divided by an object split.
pub fn find_object_split(
    bounds: &[Aabb],
    centroids: &[Vec3],
    centroid_bbox: &Aabb,
) -> Option<ObjectSplit> {
    debug_assert_eq!(bounds.len(), centroids.len());
    if bounds.len() < 2 {
        return None;
    }

    let axis = centroid_bbox.longest_axis();
    let range = centroid_bbox.axis_interval(axis);
    let extent = range.size();
    // Also rejects NaN and empty ranges
    if !(extent > 0.0) {
        return None;
    }

    let k0 = range.min;
    let k1 = NB_BINS as f32 / extent;

    let mut counts = [0u32; NB_BINS];
    let mut boxes = [Aabb::EMPTY; NB_BINS];
    for (bbox, centroid) in bounds.iter().zip(centroids) {
        let bin = bin_index(centroid[axis], k0, k1);
        counts[bin] += 1;
        boxes[bin] = Aabb::surrounding(&boxes[bin], bbox);
    }

    // Right-to-left sweep: cost contribution of bins i.. on the right side
    let mut right_area = [0.0f32; NB_BINS];
    let mut right_count = [0u32; NB_BINS];
    let mut acc_box = Aabb::EMPTY;
    let mut acc_count = 0;
    for i in (1..NB_BINS).rev() {
        acc_box = Aabb::surrounding(&acc_box, &boxes[i]);
        acc_count += counts[i];
        right_area[i] = acc_box.surface_area();
        right_count[i] = acc_count;
    }

    // Left-to-right sweep evaluating the boundary after bin i
    let mut best: Option<ObjectSplit> = None;
    let mut acc_box = Aabb::EMPTY;
    let mut acc_count = 0;
    for i in 0..NB_BINS - 1 {
        acc_box = Aabb::surrounding(&acc_box, &boxes[i]);
        acc_count += counts[i];

        let left_count = acc_count;
        let right_count = right_count[i + 1];
        if left_count == 0 || right_count == 0 {
            continue;
        }

        let cost = acc_box.surface_area() * left_count as f32
            + right_area[i + 1] * right_count as f32;
        // Strict comparison keeps the first boundary on ties
        if best.map_or(true, |b| cost < b.cost) {
            best = Some(ObjectSplit {
                axis,
                position: k0 + (i + 1) as f32 * extent / NB_BINS as f32,
                cost,
                left_count,
                right_count,
            });
        }
    }

    best
}
