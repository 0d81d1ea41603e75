// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

use std::time::Instant;

use log::{debug, trace};
use ndarray::{
    Array1, Array2, ArrayView2, Axis,
    parallel::prelude::{IntoParallelIterator, ParallelIterator as _},
};

use crate::{
    ClassLabel, Detection, Error, Result,
    aggregate::Canvas,
    config::VotingConfig,
    iou::iou_one_to_many,
    nms::non_maximum_suppression,
    proposals::Proposals,
    resize::resize,
};

/// Proposals voting for one representative.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub representative: usize,
    /// Indices into the proposal set, ascending. Always contains the
    /// representative.
    pub members: Vec<usize>,
    /// Class scores of the members normalised to sum to 1.
    pub weights: Array1<f32>,
}

impl Cluster {
    /// Collects every proposal whose IoU with `representative` is strictly
    /// greater than `merge_thresh`. All proposals are considered, including
    /// those too weak to enter NMS for `label`.
    pub fn gather(
        proposals: &Proposals,
        representative: usize,
        label: usize,
        merge_thresh: f32,
    ) -> Result<Self> {
        if representative >= proposals.len() {
            return Err(Error::InvalidInput(format!(
                "representative {representative} is out of range for {} proposals",
                proposals.len()
            )));
        }
        if label >= proposals.n_class() {
            return Err(Error::InvalidInput(format!(
                "label {label} is out of range for {} classes",
                proposals.n_class()
            )));
        }

        let iou = iou_one_to_many(proposals.rois(), &proposals.bbox(representative))?;
        let mut members: Vec<usize> = iou
            .iter()
            .enumerate()
            .filter(|(_, v)| **v > merge_thresh)
            .map(|(i, _)| i)
            .collect();
        // a box without area has IoU 0 with itself
        if let Err(pos) = members.binary_search(&representative) {
            members.insert(pos, representative);
        }

        let scores = proposals.scores(label);
        let weights: Array1<f32> = members.iter().map(|&i| scores[i]).collect();
        let total = weights.sum();
        if total.is_nan() || total <= 0.0 {
            return Err(Error::InvalidInput(format!(
                "cluster of proposal {representative} for label {label} has total score {total}"
            )));
        }

        Ok(Self {
            representative,
            members,
            weights: weights / total,
        })
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Boxes of the members as a K×4 table.
    pub fn boxes(&self, proposals: &Proposals) -> Array2<f32> {
        proposals.rois().select(Axis(0), &self.members)
    }

    pub fn mask_probs<'a>(&self, proposals: &Proposals<'a>) -> Vec<ArrayView2<'a, f32>> {
        self.members
            .iter()
            .map(|&i| proposals.mask_prob(i))
            .collect()
    }
}

/// Runs mask voting with a fixed configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskVoter {
    config: VotingConfig,
}

impl MaskVoter {
    pub fn new(config: VotingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &VotingConfig {
        &self.config
    }

    /// Votes the proposals of a `height`×`width` image. See [`mask_voting`].
    pub fn vote(
        &self,
        proposals: &Proposals,
        height: usize,
        width: usize,
    ) -> Result<Vec<Detection>> {
        mask_voting(proposals, height, width, &self.config)
    }
}

/// Turns the proposals of one `height`×`width` image into detections.
///
/// Each foreground class is reduced independently: proposals reaching
/// `candidate_thresh` go through NMS, and every kept proposal scoring above
/// `score_thresh` becomes the representative of a cluster whose masks are
/// fused into one detection. Classes are processed in parallel.
///
/// Detections are ordered by ascending label, then by descending score. The
/// same detection may be reported under several labels.
pub fn mask_voting(
    proposals: &Proposals,
    height: usize,
    width: usize,
    config: &VotingConfig,
) -> Result<Vec<Detection>> {
    config.validate()?;
    if height == 0 || width == 0 {
        return Err(Error::InvalidInput(format!(
            "image must not be empty, got {height}x{width}"
        )));
    }

    let start = Instant::now();
    let labels: Vec<usize> = ClassLabel::foreground(proposals.n_class()).collect();
    let per_label = labels
        .into_par_iter()
        .map(|label| vote_label(proposals, label, height, width, config))
        .collect::<Result<Vec<_>>>()?;
    let detections: Vec<Detection> = per_label.into_iter().flatten().collect();

    debug!(
        "mask voting kept {} detections from {} proposals in {:?}",
        detections.len(),
        proposals.len(),
        start.elapsed()
    );
    Ok(detections)
}

fn vote_label(
    proposals: &Proposals,
    label: usize,
    height: usize,
    width: usize,
    config: &VotingConfig,
) -> Result<Vec<Detection>> {
    let scores = proposals.scores(label);
    let candidates: Vec<usize> = scores
        .iter()
        .enumerate()
        .filter(|(_, s)| **s >= config.candidate_thresh)
        .map(|(i, _)| i)
        .collect();
    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    let keep = non_maximum_suppression(
        proposals.rois().select(Axis(0), &candidates).view(),
        scores.select(Axis(0), &candidates).view(),
        config.nms_thresh,
        Some(config.nms_limit),
    )?;
    let representatives: Vec<usize> = keep
        .into_iter()
        .map(|k| candidates[k])
        .filter(|&i| scores[i] > config.score_thresh)
        .collect();
    trace!(
        "label {label}: {} candidates, {} representatives",
        candidates.len(),
        representatives.len()
    );
    if representatives.is_empty() {
        return Ok(Vec::new());
    }

    let mask_size = config.mask_size.unwrap_or(proposals.mask_size());
    let mut canvas = Canvas::new(height, width)?;
    let mut detections = Vec::with_capacity(representatives.len());
    for representative in representatives {
        let cluster = Cluster::gather(proposals, representative, label, config.mask_merge_thresh)?;
        let aggregated = canvas.aggregate(
            cluster.boxes(proposals).view(),
            &cluster.mask_probs(proposals),
            cluster.weights.view(),
            config.binary_thresh,
            config.interpolation,
        )?;
        detections.push(Detection {
            label,
            bbox: aggregated.bbox.into(),
            mask: resize(aggregated.mask.view(), mask_size, mask_size, config.interpolation)?,
            score: scores[representative],
        });
    }
    Ok(detections)
}
