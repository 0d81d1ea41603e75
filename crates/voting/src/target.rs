// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

use ndarray::{Array2, ArrayView2, s};
use num_traits::{AsPrimitive, Zero};

use crate::{
    PixelBox, Result,
    resize::{Interpolation, resize},
};

/// Crops a full image ground truth mask to a proposal box.
///
/// The result has the size of `bbox`. Cells inside both `bbox` and `gt_bbox`
/// copy `gt_mask`, every other cell is zero.
pub fn intersect_bbox_mask<T>(bbox: &PixelBox, gt_bbox: &PixelBox, gt_mask: ArrayView2<T>) -> Array2<T>
where
    T: Copy + Zero,
{
    let (mask_height, mask_width) = gt_mask.dim();
    let mut local = Array2::zeros((bbox.height(), bbox.width()));

    let ymin = bbox.ymin.max(gt_bbox.ymin);
    let xmin = bbox.xmin.max(gt_bbox.xmin);
    let ymax = bbox.ymax.min(gt_bbox.ymax).min(mask_height);
    let xmax = bbox.xmax.min(gt_bbox.xmax).min(mask_width);
    if ymin >= ymax || xmin >= xmax {
        return local;
    }

    local
        .slice_mut(s![
            ymin - bbox.ymin..ymax - bbox.ymin,
            xmin - bbox.xmin..xmax - bbox.xmin
        ])
        .assign(&gt_mask.slice(s![ymin..ymax, xmin..xmax]));
    local
}

/// Builds the `mask_size`×`mask_size` training target of a proposal from a
/// full image ground truth mask.
pub fn roi_mask_target<T>(
    bbox: &PixelBox,
    gt_bbox: &PixelBox,
    gt_mask: ArrayView2<T>,
    mask_size: usize,
    interpolation: Interpolation,
) -> Result<Array2<f32>>
where
    T: Copy + Zero + AsPrimitive<f32>,
{
    let local = intersect_bbox_mask(bbox, gt_bbox, gt_mask).mapv(|v| v.as_());
    resize(local.view(), mask_size, mask_size, interpolation)
}

#[cfg(test)]
mod tests {
    use ndarray::Array2;

    use super::*;

    fn square_mask(size: usize, region: PixelBox) -> Array2<u8> {
        Array2::from_shape_fn((size, size), |(y, x)| {
            let inside =
                (region.ymin..region.ymax).contains(&y) && (region.xmin..region.xmax).contains(&x);
            inside as u8
        })
    }

    #[test]
    fn test_crop_offset() {
        let gt_bbox = PixelBox::new(4, 4, 8, 8);
        let gt_mask = square_mask(10, gt_bbox).mapv(f32::from);
        let local = intersect_bbox_mask(&PixelBox::new(2, 2, 6, 6), &gt_bbox, gt_mask.view());
        assert_eq!(local.dim(), (4, 4));
        for ((y, x), v) in local.indexed_iter() {
            let expected = if y >= 2 && x >= 2 { 1.0 } else { 0.0 };
            assert_eq!(*v, expected, "({y}, {x})");
        }
    }

    #[test]
    fn test_crop_disjoint() {
        let gt_bbox = PixelBox::new(0, 0, 3, 3);
        let gt_mask = square_mask(10, gt_bbox);
        let local = intersect_bbox_mask(&PixelBox::new(5, 5, 9, 8), &gt_bbox, gt_mask.view());
        assert_eq!(local, Array2::<u8>::zeros((4, 3)));

        // touching boxes share no cells
        let local = intersect_bbox_mask(&PixelBox::new(3, 0, 6, 3), &gt_bbox, gt_mask.view());
        assert_eq!(local, Array2::<u8>::zeros((3, 3)));
    }

    #[test]
    fn test_crop_clipped_to_mask() {
        let gt_bbox = PixelBox::new(6, 6, 12, 12);
        let gt_mask = Array2::<u8>::ones((8, 8));
        let local = intersect_bbox_mask(&PixelBox::new(5, 5, 10, 10), &gt_bbox, gt_mask.view());
        assert_eq!(local.dim(), (5, 5));
        assert_eq!(local.iter().filter(|v| **v == 1).count(), 4);
        assert_eq!(local[[1, 1]], 1);
        assert_eq!(local[[3, 3]], 0);
    }

    #[test]
    fn test_roi_mask_target() {
        let gt_bbox = PixelBox::new(0, 0, 8, 8);
        let gt_mask = square_mask(16, gt_bbox);
        let target = roi_mask_target(
            &PixelBox::new(0, 0, 16, 16),
            &gt_bbox,
            gt_mask.view(),
            4,
            Interpolation::Nearest,
        )
        .unwrap();
        let expected = ndarray::array![
            [1.0, 1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 0.0, 0.0],
            [0.0, 0.0, 0.0, 0.0]
        ];
        assert_eq!(target, expected);
    }
}
