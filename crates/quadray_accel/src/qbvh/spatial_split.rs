//! Binned spatial split with entry/exit counters.
//!
//! The node box is cut into [`NB_BINS`] slabs along the widest centroid
//! axis. Every primitive box is clipped against each slab it crosses; the
//! clipped pieces grow the slab's bounds, and the slabs holding the
//! primitive's minimum and maximum get an entry and an exit count. A
//! primitive straddling a boundary is therefore counted on both sides,
//! which is what a split that references it from both children costs.

use super::object_split::bin_index;
use super::NB_BINS;
use quadray_math::{Aabb, Interval};

/// Best spatial split found for a subset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialSplit {
    pub axis: usize,
    /// Splitting plane, on a bin boundary
    pub position: f32,
    /// `area(left) * left_count + area(right) * right_count`
    pub cost: f32,
    pub left_bbox: Aabb,
    pub right_bbox: Aabb,
    pub left_count: u32,
    pub right_count: u32,
}

/// Binning state and both sweeps for one subset.
///
/// `left_*[i]` covers bins `0..=i`, `right_*[i]` covers bins `i..`.
#[derive(Debug, Clone)]
pub struct SpatialBins {
    pub axis: usize,
    /// Spatial extent of each bin
    pub bin_bounds: [Aabb; NB_BINS],
    /// Union of the clipped primitive pieces inside each bin
    pub clipped: [Aabb; NB_BINS],
    pub entry: [u32; NB_BINS],
    pub exit: [u32; NB_BINS],
    pub left_bbox: [Aabb; NB_BINS],
    pub left_count: [u32; NB_BINS],
    pub left_area: [f32; NB_BINS],
    pub right_bbox: [Aabb; NB_BINS],
    pub right_count: [u32; NB_BINS],
    pub right_area: [f32; NB_BINS],
}

impl SpatialBins {
    /// Bin a subset and run both sweeps.
    ///
    /// `bounds` holds one box per reference in the subset. A box whose
    /// maximum lies exactly on a bin boundary exits in the lower bin, so
    /// binning agrees with [`spatial_sides`] at that boundary.
    ///
    /// Returns `None` if the centroids or the node box have no extent along
    /// the chosen axis.
    pub fn bin(bounds: &[Aabb], node_bbox: &Aabb, centroid_bbox: &Aabb) -> Option<Self> {
        let axis = centroid_bbox.longest_axis();
        if !(centroid_bbox.axis_interval(axis).size() > 0.0) {
            return None;
        }

        let range = node_bbox.axis_interval(axis);
        let width = range.size() / NB_BINS as f32;
        if !(width > 0.0) {
            return None;
        }
        let k0 = range.min;
        let k1 = 1.0 / width;

        let mut bin_bounds = [*node_bbox; NB_BINS];
        for i in 0..NB_BINS {
            let min = if i == 0 { k0 } else { bin_bounds[i - 1].axis_interval(axis).max };
            let max = if i == NB_BINS - 1 { range.max } else { k0 + width * (i + 1) as f32 };
            bin_bounds[i] = node_bbox.with_axis(axis, Interval::new(min, max));
        }

        let mut clipped = [Aabb::EMPTY; NB_BINS];
        let mut entry = [0u32; NB_BINS];
        let mut exit = [0u32; NB_BINS];
        let bin_min = |bin: usize| bin_bounds[bin].axis_interval(axis).min;
        for bbox in bounds {
            let extent = bbox.axis_interval(axis);
            let mut first = bin_index(extent.min, k0, k1);
            if first + 1 < NB_BINS && extent.min >= bin_min(first + 1) {
                first += 1;
            }
            let mut last = bin_index(extent.max, k0, k1).max(first);
            if last > first && extent.max <= bin_min(last) {
                last -= 1;
            }

            entry[first] += 1;
            exit[last] += 1;
            for bin in first..=last {
                if let Some(piece) = bin_bounds[bin].intersection(bbox) {
                    clipped[bin] = Aabb::surrounding(&clipped[bin], &piece);
                }
            }
        }

        let mut bins = Self {
            axis,
            bin_bounds,
            clipped,
            entry,
            exit,
            left_bbox: [Aabb::EMPTY; NB_BINS],
            left_count: [0; NB_BINS],
            left_area: [0.0; NB_BINS],
            right_bbox: [Aabb::EMPTY; NB_BINS],
            right_count: [0; NB_BINS],
            right_area: [0.0; NB_BINS],
        };
        bins.sweep();
        Some(bins)
    }

    /// Prefix (left) and suffix (right) accumulation. The two sides are
    /// kept in separate arrays.
    fn sweep(&mut self) {
        let mut bbox = Aabb::EMPTY;
        let mut count = 0;
        for i in 0..NB_BINS {
            bbox = Aabb::surrounding(&bbox, &self.clipped[i]);
            count += self.entry[i];
            self.left_bbox[i] = bbox;
            self.left_count[i] = count;
            self.left_area[i] = bbox.surface_area();
        }

        let mut bbox = Aabb::EMPTY;
        let mut count = 0;
        for i in (0..NB_BINS).rev() {
            bbox = Aabb::surrounding(&bbox, &self.clipped[i]);
            count += self.exit[i];
            self.right_bbox[i] = bbox;
            self.right_count[i] = count;
            self.right_area[i] = bbox.surface_area();
        }
    }

    /// SAH of cutting after bin `i`, or `None` if one side would be empty.
    pub fn boundary_cost(&self, i: usize) -> Option<f32> {
        let (left, right) = (self.left_count[i], self.right_count[i + 1]);
        (left > 0 && right > 0).then(|| {
            self.left_area[i] * left as f32 + self.right_area[i + 1] * right as f32
        })
    }

    /// The cheapest of the `NB_BINS - 1` inner boundaries.
    pub fn best_split(&self) -> Option<SpatialSplit> {
        let mut best: Option<(usize, f32)> = None;
        for i in 0..NB_BINS - 1 {
            let Some(cost) = self.boundary_cost(i) else {
                continue;
            };
            if best.map_or(true, |(_, c)| cost < c) {
                best = Some((i, cost));
            }
        }

        let (i, cost) = best?;
        Some(SpatialSplit {
            axis: self.axis,
            position: self.bin_bounds[i].axis_interval(self.axis).max,
            cost,
            left_bbox: self.left_bbox[i],
            right_bbox: self.right_bbox[i + 1],
            left_count: self.left_count[i],
            right_count: self.right_count[i + 1],
        })
    }
}

/// Evaluate a spatial split for a subset of references.
pub fn find_spatial_split(
    bounds: &[Aabb],
    node_bbox: &Aabb,
    centroid_bbox: &Aabb,
) -> Option<SpatialSplit> {
    SpatialBins::bin(bounds, node_bbox, centroid_bbox)?.best_split()
}

/// Which children reference a primitive under a spatial split at
/// `position`: `(left, right)`.
#[inline]
pub(crate) fn spatial_sides(bbox: &Aabb, axis: usize, position: f32) -> (bool, bool) {
    let extent = bbox.axis_interval(axis);
    if extent.max <= position {
        (true, false)
    } else if extent.min >= position {
        (false, true)
    } else {
        (true, true)
    }
}
