// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

use fast_image_resize::{
    FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer,
    images::{Image, ImageRef},
};
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::Result;

/// Resampling filter for probability grids. Masks must be resampled with the
/// same filter during training and inference to produce matching numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    /// Nearest source cell.
    Nearest,
    /// Linear blend of the source cells around the half-pixel aligned sample
    /// position, without antialiasing when shrinking.
    #[default]
    Bilinear,
}

impl Interpolation {
    fn options(self) -> ResizeOptions {
        let alg = match self {
            Interpolation::Nearest => ResizeAlg::Nearest,
            Interpolation::Bilinear => ResizeAlg::Interpolation(FilterType::Bilinear),
        };
        ResizeOptions::new().resize_alg(alg)
    }
}

/// Resamples a 2D probability grid to `height`×`width`.
///
/// A zero target size gives an empty array, and an empty source gives zeros.
pub fn resize(
    src: ArrayView2<f32>,
    height: usize,
    width: usize,
    interpolation: Interpolation,
) -> Result<Array2<f32>> {
    let (src_height, src_width) = src.dim();
    if height == 0 || width == 0 || src_height == 0 || src_width == 0 {
        return Ok(Array2::zeros((height, width)));
    }
    if (src_height, src_width) == (height, width) {
        return Ok(src.to_owned());
    }

    let src = src.as_standard_layout();
    let src_data = src.as_slice().unwrap_or_default();
    let src_view = ImageRef::new(
        src_width as u32,
        src_height as u32,
        bytemuck::cast_slice(src_data),
        PixelType::F32,
    )?;

    let mut dst = vec![0.0f32; height * width];
    let mut dst_view = Image::from_slice_u8(
        width as u32,
        height as u32,
        bytemuck::cast_slice_mut(&mut dst),
        PixelType::F32,
    )?;
    Resizer::new().resize(&src_view, &mut dst_view, &interpolation.options())?;

    Ok(Array2::from_shape_vec((height, width), dst)?)
}

#[cfg(test)]
mod tests {
    use ndarray::{Array2, array};
    use ndarray_stats::DeviationExt;

    use super::*;

    fn assert_close(a: &Array2<f32>, b: &Array2<f32>) {
        assert_eq!(a.dim(), b.dim());
        for (x, y) in a.iter().zip(b) {
            assert!((x - y).abs() < 1e-5, "{a} != {b}");
        }
    }

    #[test]
    fn test_resize_same_size() {
        let src = array![[0.1, 0.2], [0.3, 0.4]];
        assert_eq!(resize(src.view(), 2, 2, Interpolation::Bilinear).unwrap(), src);
        assert_eq!(resize(src.view(), 2, 2, Interpolation::Nearest).unwrap(), src);
    }

    #[test]
    fn test_resize_bilinear_upsample() {
        let src = array![[0.0, 1.0]];
        let out = resize(src.view(), 1, 4, Interpolation::Bilinear).unwrap();
        assert_close(&out, &array![[0.0, 0.25, 0.75, 1.0]]);
    }

    #[test]
    fn test_resize_nearest_upsample() {
        let src = array![[0.0, 1.0]];
        let out = resize(src.view(), 1, 4, Interpolation::Nearest).unwrap();
        assert_eq!(out, array![[0.0, 0.0, 1.0, 1.0]]);
    }

    #[test]
    fn test_resize_downsample() {
        let src = array![[0.0, 1.0, 2.0, 3.0]];
        // sample positions 0.5 and 2.5
        let out = resize(src.view(), 1, 2, Interpolation::Bilinear).unwrap();
        assert_close(&out, &array![[0.5, 2.5]]);

        let out = resize(src.view(), 1, 2, Interpolation::Nearest).unwrap();
        assert!([0.0, 1.0].contains(&out[[0, 0]]));
        assert!([2.0, 3.0].contains(&out[[0, 1]]));
    }

    #[test]
    fn test_resize_transposed_source() {
        let src = array![[0.0, 1.0], [0.0, 1.0]];
        let out = resize(src.t(), 4, 2, Interpolation::Nearest).unwrap();
        assert_eq!(out.row(0), array![0.0, 0.0]);
        assert_eq!(out.row(3), array![1.0, 1.0]);
    }

    #[test]
    fn test_resize_constant_is_preserved() {
        let src = Array2::from_elem((21, 21), 0.625);
        for (h, w) in [(10, 10), (37, 5), (1, 1), (64, 64)] {
            for interpolation in [Interpolation::Nearest, Interpolation::Bilinear] {
                let out = resize(src.view(), h, w, interpolation).unwrap();
                assert_eq!(out.dim(), (h, w));
                let expected = Array2::from_elem((h, w), 0.625);
                assert!(out.mean_sq_err(&expected).unwrap() < 1e-10);
            }
        }
    }

    #[test]
    fn test_resize_bilinear_close_to_nearest() {
        let src = Array2::from_shape_fn((16, 16), |(y, x)| (y + x) as f32 / 30.0);
        let bilinear = resize(src.view(), 64, 64, Interpolation::Bilinear).unwrap();
        let nearest = resize(src.view(), 64, 64, Interpolation::Nearest).unwrap();
        assert!(bilinear.mean_sq_err(&nearest).unwrap() < 1e-3);
        assert!(bilinear.iter().all(|v| (-1e-6..=1.0 + 1e-6).contains(v)));
    }

    #[test]
    fn test_resize_empty() {
        let src = array![[0.5, 0.5]];
        let out = resize(src.view(), 0, 3, Interpolation::Bilinear).unwrap();
        assert_eq!(out.dim(), (0, 3));
        let empty = Array2::<f32>::zeros((0, 0));
        let out = resize(empty.view(), 3, 3, Interpolation::Bilinear).unwrap();
        assert_eq!(out, Array2::<f32>::zeros((3, 3)));
    }

    #[test]
    fn test_interpolation_serde_names() {
        let i: Interpolation = serde_json::from_str("\"nearest\"").unwrap();
        assert_eq!(i, Interpolation::Nearest);
        assert_eq!(
            serde_json::to_string(&Interpolation::Bilinear).unwrap(),
            "\"bilinear\""
        );
    }
}
