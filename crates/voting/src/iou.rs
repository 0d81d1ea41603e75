// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

use ndarray::{Array1, Array2, ArrayView2};

use crate::{BoundingBox, Error, Result};

/// Intersection over union of two boxes. Disjoint boxes have an intersection
/// of zero, and a pair whose union has no area scores 0.
pub fn jaccard(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let top = a.ymin.max(b.ymin);
    let left = a.xmin.max(b.xmin);
    let bottom = a.ymax.min(b.ymax);
    let right = a.xmax.min(b.xmax);

    let intersection = (bottom - top).max(0.0) * (right - left).max(0.0);
    let union = a.area() + b.area() - intersection;
    if union <= 0.0 {
        return 0.0;
    }

    intersection / union
}

/// IoU between every row of an N×4 box table and a single box.
pub fn iou_one_to_many(boxes: ArrayView2<f32>, bbox: &BoundingBox) -> Result<Array1<f32>> {
    if boxes.dim().1 != 4 {
        return Err(Error::InvalidShape(format!(
            "IoU expects boxes with 4 columns, got {:?}",
            boxes.shape()
        )));
    }
    Ok(boxes
        .rows()
        .into_iter()
        .map(|row| jaccard(&BoundingBox::from_row(row), bbox))
        .collect())
}

/// Pairwise IoU between an N×4 and an M×4 box table, returned as N×M.
pub fn bbox_iou(a: ArrayView2<f32>, b: ArrayView2<f32>) -> Result<Array2<f32>> {
    if a.dim().1 != 4 || b.dim().1 != 4 {
        return Err(Error::InvalidShape(format!(
            "IoU expects boxes with 4 columns, got {:?} and {:?}",
            a.shape(),
            b.shape()
        )));
    }
    let a: Vec<_> = a.rows().into_iter().map(BoundingBox::from_row).collect();
    let b: Vec<_> = b.rows().into_iter().map(BoundingBox::from_row).collect();
    Ok(Array2::from_shape_fn((a.len(), b.len()), |(i, j)| {
        jaccard(&a[i], &b[j])
    }))
}
