// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use crate::{Error, Result, resize::Interpolation, voting::MaskVoter};

/// Scalar settings of the mask voting pass.
///
/// Missing fields take their default when deserialized, so a configuration
/// file only needs to name the values it changes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VotingConfig {
    /// Detections are kept only when the representative's class probability
    /// is strictly greater than this.
    pub score_thresh: f32,
    /// IoU above which NMS suppresses a lower scored proposal.
    pub nms_thresh: f32,
    /// IoU above which a proposal votes in a representative's cluster.
    pub mask_merge_thresh: f32,
    /// Mask probability at which a canvas cell counts as foreground.
    pub binary_thresh: f32,
    /// Maximum number of representatives per class.
    pub nms_limit: usize,
    /// Proposals below this class probability do not enter NMS.
    pub candidate_thresh: f32,
    /// Side of the square output masks. Defaults to the proposal mask size.
    pub mask_size: Option<usize>,
    pub interpolation: Interpolation,
}

impl Default for VotingConfig {
    fn default() -> Self {
        Self {
            score_thresh: 0.7,
            nms_thresh: 0.3,
            mask_merge_thresh: 0.5,
            binary_thresh: 0.4,
            nms_limit: 100,
            candidate_thresh: 0.001,
            mask_size: None,
            interpolation: Interpolation::Bilinear,
        }
    }
}

impl VotingConfig {
    pub fn validate(&self) -> Result<()> {
        let thresholds = [
            ("score_thresh", self.score_thresh),
            ("nms_thresh", self.nms_thresh),
            ("mask_merge_thresh", self.mask_merge_thresh),
            ("binary_thresh", self.binary_thresh),
            ("candidate_thresh", self.candidate_thresh),
        ];
        for (name, value) in thresholds {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::InvalidConfig(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        if self.nms_limit == 0 {
            return Err(Error::InvalidConfig(
                "nms_limit must be positive".to_string(),
            ));
        }
        if self.mask_size == Some(0) {
            return Err(Error::InvalidConfig(
                "mask_size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VoterBuilder {
    config_src: Option<ConfigSource>,
    score_threshold: Option<f32>,
    nms_threshold: Option<f32>,
    mask_merge_threshold: Option<f32>,
    binary_threshold: Option<f32>,
    nms_limit: Option<usize>,
    mask_size: Option<usize>,
    interpolation: Option<Interpolation>,
}

#[derive(Debug, Clone, PartialEq)]
enum ConfigSource {
    Yaml(String),
    Json(String),
    Config(VotingConfig),
}

impl VoterBuilder {
    /// Creates a builder with no configuration source. Building it without a
    /// source uses [`VotingConfig::default`].
    ///
    /// # Examples
    /// ```rust
    /// # use maskvote::{VoterBuilder, Result};
    /// # fn main() -> Result<()> {
    /// let voter = VoterBuilder::new().build()?;
    /// assert_eq!(voter.config().score_thresh, 0.7);
    /// assert_eq!(voter.config().nms_thresh, 0.3);
    /// # Ok(())
    /// # }
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a voting configuration in YAML format. The string is only parsed
    /// by [`VoterBuilder::build`].
    ///
    /// # Examples
    /// ```rust
    /// # use maskvote::{VoterBuilder, Result};
    /// # fn main() -> Result<()> {
    /// let config_yaml = include_str!("../../../testdata/voting.yaml").to_string();
    /// let voter = VoterBuilder::new()
    ///     .with_config_yaml_str(config_yaml)
    ///     .build()?;
    /// assert_eq!(voter.config().mask_size, Some(21));
    /// # Ok(())
    /// # }
    /// ```
    pub fn with_config_yaml_str(mut self, yaml_str: String) -> Self {
        self.config_src.replace(ConfigSource::Yaml(yaml_str));
        self
    }

    /// Loads a voting configuration in JSON format. The string is only parsed
    /// by [`VoterBuilder::build`].
    ///
    /// # Examples
    /// ```rust
    /// # use maskvote::{VoterBuilder, Result};
    /// # fn main() -> Result<()> {
    /// let config_json = include_str!("../../../testdata/voting.json").to_string();
    /// let voter = VoterBuilder::new()
    ///     .with_config_json_str(config_json)
    ///     .build()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn with_config_json_str(mut self, json_str: String) -> Self {
        self.config_src.replace(ConfigSource::Json(json_str));
        self
    }

    /// Uses an already deserialized configuration.
    ///
    /// # Examples
    /// ```rust
    /// # use maskvote::{VoterBuilder, VotingConfig, Result};
    /// # fn main() -> Result<()> {
    /// let config_json = include_str!("../../../testdata/voting.json");
    /// let config: VotingConfig = serde_json::from_str(config_json)?;
    /// let voter = VoterBuilder::new().with_config(config).build()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn with_config(mut self, config: VotingConfig) -> Self {
        self.config_src.replace(ConfigSource::Config(config));
        self
    }

    /// Sets the score threshold, overriding the configuration source.
    ///
    /// # Examples
    /// ```rust
    /// # use maskvote::{VoterBuilder, Result};
    /// # fn main() -> Result<()> {
    /// # let config_json = include_str!("../../../testdata/voting.json").to_string();
    /// let voter = VoterBuilder::new()
    ///     .with_config_json_str(config_json)
    ///     .with_score_threshold(0.654)
    ///     .build()?;
    /// assert_eq!(voter.config().score_thresh, 0.654);
    /// # Ok(())
    /// # }
    /// ```
    pub fn with_score_threshold(mut self, score_threshold: f32) -> Self {
        self.score_threshold = Some(score_threshold);
        self
    }

    /// Sets the NMS IoU threshold
    pub fn with_nms_threshold(mut self, nms_threshold: f32) -> Self {
        self.nms_threshold = Some(nms_threshold);
        self
    }

    /// Sets the IoU threshold for cluster membership
    pub fn with_mask_merge_threshold(mut self, mask_merge_threshold: f32) -> Self {
        self.mask_merge_threshold = Some(mask_merge_threshold);
        self
    }

    pub fn with_binary_threshold(mut self, binary_threshold: f32) -> Self {
        self.binary_threshold = Some(binary_threshold);
        self
    }

    pub fn with_nms_limit(mut self, nms_limit: usize) -> Self {
        self.nms_limit = Some(nms_limit);
        self
    }

    pub fn with_mask_size(mut self, mask_size: usize) -> Self {
        self.mask_size = Some(mask_size);
        self
    }

    pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = Some(interpolation);
        self
    }

    /// Builds the voter. A JSON or YAML source is deserialized here, then the
    /// explicit overrides are applied and the result is validated.
    pub fn build(self) -> Result<MaskVoter> {
        let mut config = match self.config_src {
            Some(ConfigSource::Json(s)) => serde_json::from_str(&s)?,
            Some(ConfigSource::Yaml(s)) => serde_yaml::from_str(&s)?,
            Some(ConfigSource::Config(c)) => c,
            None => VotingConfig::default(),
        };
        if let Some(v) = self.score_threshold {
            config.score_thresh = v;
        }
        if let Some(v) = self.nms_threshold {
            config.nms_thresh = v;
        }
        if let Some(v) = self.mask_merge_threshold {
            config.mask_merge_thresh = v;
        }
        if let Some(v) = self.binary_threshold {
            config.binary_thresh = v;
        }
        if let Some(v) = self.nms_limit {
            config.nms_limit = v;
        }
        if let Some(v) = self.mask_size {
            config.mask_size = Some(v);
        }
        if let Some(v) = self.interpolation {
            config.interpolation = v;
        }
        MaskVoter::new(config)
    }
}
