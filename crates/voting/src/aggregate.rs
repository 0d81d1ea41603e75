// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

use log::trace;
use ndarray::{Array2, ArrayView1, ArrayView2, Zip, s};

use crate::{
    BoundingBox, Error, PixelBox, Result,
    resize::{Interpolation, resize},
};

/// Result of fusing one cluster of proposal masks.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedMask {
    /// Tight half-open box around every canvas cell that reached the binary
    /// threshold. When no cell did, this is a 1×1 box at the canvas centre.
    pub bbox: PixelBox,
    /// Accumulated canvas values inside `bbox`. These are vote weights and are
    /// not binarised again.
    pub mask: Array2<f32>,
}

/// Image sized accumulation grid owned by a single aggregation worker.
///
/// The canvas remembers the region written by the previous aggregation and
/// only zeroes that region before the next one.
#[derive(Debug, Clone)]
pub struct Canvas {
    data: Array2<f32>,
    dirty: Option<PixelBox>,
}

impl Canvas {
    pub fn new(height: usize, width: usize) -> Result<Self> {
        if height == 0 || width == 0 {
            return Err(Error::InvalidInput(format!(
                "canvas must not be empty, got {height}x{width}"
            )));
        }
        Ok(Self {
            data: Array2::zeros((height, width)),
            dirty: None,
        })
    }

    /// Zeroes the cells written since the last clear.
    pub fn clear(&mut self) {
        if let Some(region) = self.dirty.take() {
            self.data
                .slice_mut(s![region.ymin..region.ymax, region.xmin..region.xmax])
                .fill(0.0);
        }
    }

    /// Fuses a weighted cluster of proposal masks.
    ///
    /// Each member mask is resized to its full rounded box, binarised at
    /// `binary_thresh` and its weight is added to the canvas cells it covers.
    /// Parts of a box outside the canvas are dropped. The canvas cells
    /// reaching `binary_thresh` form the support of the result. Members whose
    /// rounded box has no area inside the canvas are skipped.
    pub fn aggregate(
        &mut self,
        bboxes: ArrayView2<f32>,
        mask_probs: &[ArrayView2<f32>],
        weights: ArrayView1<f32>,
        binary_thresh: f32,
        interpolation: Interpolation,
    ) -> Result<AggregatedMask> {
        if bboxes.dim().1 != 4 {
            return Err(Error::InvalidInput(format!(
                "cluster boxes must have 4 columns, got {:?}",
                bboxes.shape()
            )));
        }
        if bboxes.dim().0 != mask_probs.len() || bboxes.dim().0 != weights.len() {
            return Err(Error::InvalidInput(format!(
                "cluster has {} boxes, {} masks and {} weights",
                bboxes.dim().0,
                mask_probs.len(),
                weights.len()
            )));
        }

        self.clear();
        let (height, width) = self.data.dim();

        let mut touched: Option<PixelBox> = None;
        for ((row, mask_prob), &weight) in bboxes.rows().into_iter().zip(mask_probs).zip(weights) {
            let member = SignedBox::round(&BoundingBox::from_row(row));
            let bbox = member.clamp(height, width);
            if member.is_empty() || bbox.is_empty() {
                trace!("skipping cluster member without area {member:?}");
                continue;
            }
            // the mask spans the whole box, only the part inside the canvas
            // is pasted
            let resized = resize(
                mask_prob.view(),
                member.height(),
                member.width(),
                interpolation,
            )?;
            let dy = (bbox.ymin as i64 - member.ymin) as usize;
            let dx = (bbox.xmin as i64 - member.xmin) as usize;
            let visible = resized.slice(s![dy..dy + bbox.height(), dx..dx + bbox.width()]);
            let region = self
                .data
                .slice_mut(s![bbox.ymin..bbox.ymax, bbox.xmin..bbox.xmax]);
            Zip::from(region).and(visible).for_each(|cell, &prob| {
                if prob >= binary_thresh {
                    *cell += weight;
                }
            });
            touched = Some(touched.map_or(bbox, |t| t.union(&bbox)));
        }
        self.dirty = touched;

        // untouched cells hold zero and only qualify for a non-positive
        // threshold
        let search = if binary_thresh > 0.0 {
            touched
        } else {
            Some(PixelBox::new(0, 0, height, width))
        };
        let bbox = search
            .and_then(|region| self.support(region, binary_thresh))
            .unwrap_or_else(|| {
                let fallback = centre_pixel(height, width);
                trace!("empty mask support, falling back to {fallback:?}");
                fallback
            });

        let mask = self
            .data
            .slice(s![bbox.ymin..bbox.ymax, bbox.xmin..bbox.xmax])
            .to_owned();
        Ok(AggregatedMask { bbox, mask })
    }

    /// Tight half-open box around the cells of `region` at or above
    /// `threshold`.
    fn support(&self, region: PixelBox, threshold: f32) -> Option<PixelBox> {
        let view = self
            .data
            .slice(s![region.ymin..region.ymax, region.xmin..region.xmax]);
        view.indexed_iter()
            .filter(|(_, v)| **v >= threshold)
            .map(|((y, x), _)| {
                let (y, x) = (y + region.ymin, x + region.xmin);
                PixelBox::new(y, x, y + 1, x + 1)
            })
            .reduce(|a, b| a.union(&b))
    }
}

/// Rounded member box that may extend past the canvas on any side.
#[derive(Debug, Clone, Copy)]
struct SignedBox {
    ymin: i64,
    xmin: i64,
    ymax: i64,
    xmax: i64,
}

impl SignedBox {
    fn round(bbox: &BoundingBox) -> Self {
        let px = |v: f32| v.round_ties_even() as i64;
        Self {
            ymin: px(bbox.ymin),
            xmin: px(bbox.xmin),
            ymax: px(bbox.ymax),
            xmax: px(bbox.xmax),
        }
    }

    fn height(&self) -> usize {
        (self.ymax - self.ymin).max(0) as usize
    }

    fn width(&self) -> usize {
        (self.xmax - self.xmin).max(0) as usize
    }

    fn is_empty(&self) -> bool {
        self.height() == 0 || self.width() == 0
    }

    fn clamp(&self, height: usize, width: usize) -> PixelBox {
        let (h, w) = (height as i64, width as i64);
        PixelBox::new(
            self.ymin.clamp(0, h) as usize,
            self.xmin.clamp(0, w) as usize,
            self.ymax.clamp(0, h) as usize,
            self.xmax.clamp(0, w) as usize,
        )
    }
}

/// The 1×1 box at `(ceil(H / 2), ceil(W / 2))`, kept inside the canvas.
fn centre_pixel(height: usize, width: usize) -> PixelBox {
    let y = height.div_ceil(2).min(height - 1);
    let x = width.div_ceil(2).min(width - 1);
    PixelBox::new(y, x, y + 1, x + 1)
}

/// Fuses a weighted cluster of proposal masks on a fresh `height`×`width`
/// canvas. See [`Canvas::aggregate`].
pub fn mask_aggregation(
    bboxes: ArrayView2<f32>,
    mask_probs: &[ArrayView2<f32>],
    weights: ArrayView1<f32>,
    height: usize,
    width: usize,
    binary_thresh: f32,
    interpolation: Interpolation,
) -> Result<AggregatedMask> {
    Canvas::new(height, width)?.aggregate(bboxes, mask_probs, weights, binary_thresh, interpolation)
}
