// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

use ndarray::{Array2, ArrayView1, ArrayView2, ArrayView3, ArrayViewMut2, Axis};

use crate::{BoundingBox, Error, Result};

/// Borrowed, validated view over the per-proposal outputs of a segmentation
/// network.
///
/// - `rois` N×4 boxes as `(ymin, xmin, ymax, xmax)` in image pixels
/// - `class_probs` N×C class probabilities, column 0 is background
/// - `mask_probs` N×S×S foreground probability grids, one per proposal
#[derive(Debug, Clone, Copy)]
pub struct Proposals<'a> {
    rois: ArrayView2<'a, f32>,
    class_probs: ArrayView2<'a, f32>,
    mask_probs: ArrayView3<'a, f32>,
}

impl<'a> Proposals<'a> {
    pub fn new(
        rois: ArrayView2<'a, f32>,
        class_probs: ArrayView2<'a, f32>,
        mask_probs: ArrayView3<'a, f32>,
    ) -> Result<Self> {
        if rois.dim().1 != 4 {
            return Err(Error::InvalidInput(format!(
                "rois must have 4 columns, got {:?}",
                rois.shape()
            )));
        }
        let n = rois.dim().0;
        if class_probs.dim().0 != n || mask_probs.dim().0 != n {
            return Err(Error::InvalidInput(format!(
                "proposal arrays disagree on length: rois {:?}, class_probs {:?}, mask_probs {:?}",
                rois.shape(),
                class_probs.shape(),
                mask_probs.shape()
            )));
        }
        let (_, mask_h, mask_w) = mask_probs.dim();
        if mask_h != mask_w {
            return Err(Error::InvalidInput(format!(
                "mask_probs must be square, got {mask_h}x{mask_w}"
            )));
        }
        if n > 0 && mask_h == 0 {
            return Err(Error::InvalidInput(
                "mask_probs must not be empty".to_string(),
            ));
        }
        Ok(Self {
            rois,
            class_probs,
            mask_probs,
        })
    }

    pub fn len(&self) -> usize {
        self.rois.dim().0
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of classes, background included.
    pub fn n_class(&self) -> usize {
        self.class_probs.dim().1
    }

    /// Side length S of the square mask grids.
    pub fn mask_size(&self) -> usize {
        self.mask_probs.dim().1
    }

    pub fn rois(&self) -> ArrayView2<'a, f32> {
        self.rois
    }

    pub fn bbox(&self, index: usize) -> BoundingBox {
        BoundingBox::from_row(self.rois.row(index))
    }

    pub fn mask_prob(&self, index: usize) -> ArrayView2<'a, f32> {
        self.mask_probs.index_axis_move(Axis(0), index)
    }

    /// Probability of `label` for every proposal.
    pub fn scores(&self, label: usize) -> ArrayView1<'a, f32> {
        self.class_probs.index_axis_move(Axis(1), label)
    }
}

/// Maps proposals from network input coordinates back to the image by
/// dividing by the input resize `scale`.
pub fn rescale_rois(rois: ArrayView2<f32>, scale: f32) -> Result<Array2<f32>> {
    if scale.is_nan() || scale <= 0.0 {
        return Err(Error::InvalidInput(format!(
            "resize scale must be positive, got {scale}"
        )));
    }
    Ok(rois.mapv(|v| v / scale))
}

/// Clamps y coordinates to `[0, height]` and x coordinates to `[0, width]`.
pub fn clip_rois(mut rois: ArrayViewMut2<f32>, height: usize, width: usize) {
    let (height, width) = (height as f32, width as f32);
    for mut row in rois.rows_mut() {
        for (c, v) in row.iter_mut().enumerate() {
            let limit = if c % 2 == 0 { height } else { width };
            *v = v.clamp(0.0, limit);
        }
    }
}

/// Indices of the boxes whose rounded height and width are both positive.
pub fn valid_box_indices(bboxes: ArrayView2<f32>) -> Vec<usize> {
    bboxes
        .rows()
        .into_iter()
        .enumerate()
        .filter(|(_, row)| !BoundingBox::from_row(row.view()).round().is_empty())
        .map(|(i, _)| i)
        .collect()
}
