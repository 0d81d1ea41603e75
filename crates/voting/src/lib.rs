// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

//! Mask voting for instance segmentation proposals.
//!
//! Proposals produced by a segmentation network (boxes, per-class
//! probabilities and low resolution foreground maps) are reduced per class
//! with non-maximum suppression. Every surviving representative gathers the
//! proposals overlapping it, and their masks are fused on an image sized
//! canvas into one tight mask per detection.
use ndarray::{Array2, ArrayView1};

pub mod aggregate;
pub mod config;
pub mod error;
pub mod iou;
pub mod nms;
pub mod proposals;
pub mod resize;
pub mod target;
pub mod voting;

pub use aggregate::{AggregatedMask, Canvas, mask_aggregation};
pub use config::{VoterBuilder, VotingConfig};
pub use error::{Error, Result};
pub use iou::{bbox_iou, iou_one_to_many, jaccard};
pub use nms::non_maximum_suppression;
pub use proposals::{Proposals, clip_rois, rescale_rois, valid_box_indices};
pub use resize::{Interpolation, resize};
pub use target::{intersect_bbox_mask, roi_mask_target};
pub use voting::{Cluster, MaskVoter, mask_voting};

/// Axis-aligned box in image pixel coordinates, stored in the
/// `(ymin, xmin, ymax, xmax)` order used by the proposal tables.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundingBox {
    /// top-most coordinate of the bounding box
    pub ymin: f32,
    /// left-most coordinate of the bounding box
    pub xmin: f32,
    /// bottom-most coordinate of the bounding box
    pub ymax: f32,
    /// right-most coordinate of the bounding box
    pub xmax: f32,
}

impl BoundingBox {
    /// Reads a box from one row of an N×4 proposal table.
    pub fn from_row(row: ArrayView1<f32>) -> Self {
        Self {
            ymin: row[0],
            xmin: row[1],
            ymax: row[2],
            xmax: row[3],
        }
    }

    pub fn height(&self) -> f32 {
        (self.ymax - self.ymin).max(0.0)
    }

    pub fn width(&self) -> f32 {
        (self.xmax - self.xmin).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.height() * self.width()
    }

    /// Rounds every coordinate to the nearest pixel, ties to even, and
    /// saturates negative coordinates at zero.
    pub fn round(&self) -> PixelBox {
        let px = |v: f32| v.round_ties_even().max(0.0) as usize;
        PixelBox {
            ymin: px(self.ymin),
            xmin: px(self.xmin),
            ymax: px(self.ymax),
            xmax: px(self.xmax),
        }
    }
}

impl From<[f32; 4]> for BoundingBox {
    fn from(arr: [f32; 4]) -> Self {
        BoundingBox {
            ymin: arr[0],
            xmin: arr[1],
            ymax: arr[2],
            xmax: arr[3],
        }
    }
}

impl From<PixelBox> for BoundingBox {
    fn from(b: PixelBox) -> Self {
        BoundingBox {
            ymin: b.ymin as f32,
            xmin: b.xmin as f32,
            ymax: b.ymax as f32,
            xmax: b.xmax as f32,
        }
    }
}

/// Integer box with half-open bounds: rows `ymin..ymax` and columns
/// `xmin..xmax`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PixelBox {
    pub ymin: usize,
    pub xmin: usize,
    pub ymax: usize,
    pub xmax: usize,
}

impl PixelBox {
    pub fn new(ymin: usize, xmin: usize, ymax: usize, xmax: usize) -> Self {
        Self {
            ymin,
            xmin,
            ymax,
            xmax,
        }
    }

    pub fn height(&self) -> usize {
        self.ymax.saturating_sub(self.ymin)
    }

    pub fn width(&self) -> usize {
        self.xmax.saturating_sub(self.xmin)
    }

    pub fn is_empty(&self) -> bool {
        self.height() == 0 || self.width() == 0
    }

    /// Restricts the box to a `height`×`width` grid.
    pub fn clamp(&self, height: usize, width: usize) -> Self {
        let ymax = self.ymax.min(height);
        let xmax = self.xmax.min(width);
        Self {
            ymin: self.ymin.min(ymax),
            xmin: self.xmin.min(xmax),
            ymax,
            xmax,
        }
    }

    /// Smallest box enclosing both boxes.
    pub fn union(&self, other: &PixelBox) -> Self {
        Self {
            ymin: self.ymin.min(other.ymin),
            xmin: self.xmin.min(other.xmin),
            ymax: self.ymax.max(other.ymax),
            xmax: self.xmax.max(other.xmax),
        }
    }
}

/// Class index as seen by the voting loop. Index 0 is the background class
/// and never produces detections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassLabel {
    Background,
    Foreground(usize),
}

impl ClassLabel {
    pub fn from_index(index: usize) -> Self {
        match index {
            0 => ClassLabel::Background,
            label => ClassLabel::Foreground(label),
        }
    }

    /// Labels that take part in voting for a model with `n_class` classes,
    /// in ascending order.
    pub fn foreground(n_class: usize) -> impl Iterator<Item = usize> {
        (0..n_class).filter_map(|index| match ClassLabel::from_index(index) {
            ClassLabel::Background => None,
            ClassLabel::Foreground(label) => Some(label),
        })
    }
}

/// One voted instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// foreground class index, never 0
    pub label: usize,
    /// tight box around the aggregated mask support, in image pixels with
    /// half-open integer bounds
    pub bbox: BoundingBox,
    /// aggregated foreground probability resampled to `mask_size`×`mask_size`
    pub mask: Array2<f32>,
    /// class probability of the representative proposal
    pub score: f32,
}

impl Detection {
    /// Check if one detection is equal to another detection, within the given
    /// delta. Masks are not compared.
    pub fn equal_within_delta(&self, rhs: &Detection, delta: f32) -> bool {
        let eq_delta = |a: f32, b: f32| (a - b).abs() <= delta;
        self.label == rhs.label
            && eq_delta(self.score, rhs.score)
            && eq_delta(self.bbox.ymin, rhs.bbox.ymin)
            && eq_delta(self.bbox.xmin, rhs.bbox.xmin)
            && eq_delta(self.bbox.ymax, rhs.bbox.ymax)
            && eq_delta(self.bbox.xmax, rhs.bbox.xmax)
    }

    /// Binarises the mask at `threshold`.
    pub fn binary_mask(&self, threshold: f32) -> Array2<bool> {
        self.mask.mapv(|p| p >= threshold)
    }
}
