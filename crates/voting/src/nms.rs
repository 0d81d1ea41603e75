// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

use ndarray::{ArrayView1, ArrayView2};

use crate::{BoundingBox, Error, Result, iou::jaccard};

/// Greedy non-maximum suppression over an N×4 box table.
///
/// Boxes are visited by descending score, ties in score keep their original
/// index order. Each visited box that has not been suppressed is kept and
/// suppresses every later box whose IoU with it is strictly greater than
/// `iou_threshold`. At most `limit` indices are returned when a limit is
/// given.
///
/// Returns the kept indices in descending score order.
pub fn non_maximum_suppression(
    boxes: ArrayView2<f32>,
    scores: ArrayView1<f32>,
    iou_threshold: f32,
    limit: Option<usize>,
) -> Result<Vec<usize>> {
    if boxes.dim().1 != 4 {
        return Err(Error::InvalidInput(format!(
            "NMS expects boxes with 4 columns, got {:?}",
            boxes.shape()
        )));
    }
    if boxes.dim().0 != scores.len() {
        return Err(Error::InvalidInput(format!(
            "NMS got {} boxes but {} scores",
            boxes.dim().0,
            scores.len()
        )));
    }

    let bboxes: Vec<_> = boxes
        .rows()
        .into_iter()
        .map(BoundingBox::from_row)
        .collect();
    let limit = limit.unwrap_or(usize::MAX);

    // sort_by is stable so equal scores stay in index order
    let mut order: Vec<usize> = (0..bboxes.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut suppressed = vec![false; bboxes.len()];
    let mut keep = Vec::new();
    for (rank, &i) in order.iter().enumerate() {
        if keep.len() >= limit {
            break;
        }
        if suppressed[i] {
            continue;
        }
        keep.push(i);
        for &j in &order[(rank + 1)..] {
            if !suppressed[j] && jaccard(&bboxes[i], &bboxes[j]) > iou_threshold {
                suppressed[j] = true;
            }
        }
    }

    Ok(keep)
}

#[cfg(test)]
mod tests {
    use ndarray::{Array1, Array2, array};

    use super::*;

    #[test]
    fn test_nms_suppresses_overlap() {
        let boxes = array![
            [0.0, 0.0, 10.0, 10.0],
            [1.0, 1.0, 11.0, 11.0],
            [20.0, 20.0, 30.0, 30.0]
        ];
        let scores = array![0.8, 0.9, 0.7];
        let keep = non_maximum_suppression(boxes.view(), scores.view(), 0.5, None).unwrap();
        assert_eq!(keep, vec![1, 2]);
    }

    #[test]
    fn test_nms_threshold_is_strict() {
        let boxes = array![[0.0, 0.0, 10.0, 10.0], [0.0, 0.0, 5.0, 10.0]];
        let scores = array![0.9, 0.8];
        // IoU is exactly 0.5
        let keep = non_maximum_suppression(boxes.view(), scores.view(), 0.5, None).unwrap();
        assert_eq!(keep, vec![0, 1]);
        let keep = non_maximum_suppression(boxes.view(), scores.view(), 0.49, None).unwrap();
        assert_eq!(keep, vec![0]);
    }

    #[test]
    fn test_nms_limit() {
        let boxes = Array2::from_shape_fn((10, 4), |(i, c)| {
            let offset = i as f32 * 20.0;
            if c < 2 { offset } else { offset + 10.0 }
        });
        let scores = Array1::from_shape_fn(10, |i| i as f32 / 10.0);
        let keep = non_maximum_suppression(boxes.view(), scores.view(), 0.3, Some(3)).unwrap();
        assert_eq!(keep, vec![9, 8, 7]);
        let keep = non_maximum_suppression(boxes.view(), scores.view(), 0.3, None).unwrap();
        assert_eq!(keep.len(), 10);
    }

    #[test]
    fn test_nms_ties_keep_index_order() {
        let boxes = array![
            [0.0, 0.0, 10.0, 10.0],
            [0.0, 0.0, 10.0, 10.0],
            [30.0, 30.0, 40.0, 40.0],
            [50.0, 50.0, 60.0, 60.0]
        ];
        let scores = array![0.5, 0.5, 0.5, 0.6];
        for _ in 0..4 {
            let keep = non_maximum_suppression(boxes.view(), scores.view(), 0.5, None).unwrap();
            assert_eq!(keep, vec![3, 0, 2]);
        }
    }

    #[test]
    fn test_nms_kept_boxes_are_consistent() {
        let boxes = Array2::from_shape_fn((30, 4), |(i, c)| {
            let y = (i * 7 % 25) as f32;
            let x = (i * 3 % 25) as f32;
            match c {
                0 => y,
                1 => x,
                2 => y + 8.0,
                _ => x + 8.0,
            }
        });
        let scores = Array1::from_shape_fn(30, |i| ((i * 17) % 31) as f32 / 31.0);
        let threshold = 0.3;
        let keep = non_maximum_suppression(boxes.view(), scores.view(), threshold, None).unwrap();
        for (a, &i) in keep.iter().enumerate() {
            for &j in &keep[(a + 1)..] {
                assert!(scores[i] >= scores[j]);
                let iou = jaccard(
                    &BoundingBox::from_row(boxes.row(i)),
                    &BoundingBox::from_row(boxes.row(j)),
                );
                assert!(iou <= threshold, "{i} and {j} overlap with IoU {iou}");
            }
        }
    }

    #[test]
    fn test_nms_empty() {
        let boxes = Array2::<f32>::zeros((0, 4));
        let scores = Array1::<f32>::zeros(0);
        let keep = non_maximum_suppression(boxes.view(), scores.view(), 0.5, Some(100)).unwrap();
        assert!(keep.is_empty());
    }

    #[test]
    fn test_nms_length_mismatch() {
        let boxes = array![[0.0, 0.0, 10.0, 10.0]];
        let scores = array![0.5, 0.4];
        assert!(matches!(
            non_maximum_suppression(boxes.view(), scores.view(), 0.5, None),
            Err(Error::InvalidInput(_))
        ));
    }
}
