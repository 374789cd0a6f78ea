//! Explainer and experiment configuration
//!
//! `ExplainerConfig` is the immutable parameter set handed to a
//! [`DistanceExplainer`](crate::DistanceExplainer). `ExperimentConfig` adds the
//! bookkeeping of a reproducible run (name, seed) and is what gets stored on
//! disk as TOML.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::ExplainError;
use crate::selection::QuantileBand;

/// Keep-probability used when `p_keep` is set to auto
pub const AUTO_P_KEEP: f32 = 0.5;

/// Parameters of a distance explainer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplainerConfig {
    /// Number of masks to occlude the input with (more = more reliable, slower)
    #[serde(alias = "number_of_masks")]
    pub n_masks: usize,
    /// Features per spatial dimension; sets the super pixel size of the masks
    pub feature_res: usize,
    /// Probability of keeping a feature unmasked (`None` = auto)
    #[serde(with = "p_keep_repr")]
    pub p_keep: Option<f32>,
    /// Masked inputs handed to the model per invocation
    pub batch_size: usize,
    /// Lower end of the positive band (closest distances)
    pub mask_selection_range_min: f64,
    /// Upper end of the positive band
    pub mask_selection_range_max: f64,
    /// Lower end of the negative band (farthest distances)
    pub mask_selection_negative_range_min: f64,
    /// Upper end of the negative band
    pub mask_selection_negative_range_max: f64,
}

impl Default for ExplainerConfig {
    fn default() -> Self {
        Self {
            n_masks: 1000,
            feature_res: 8,
            p_keep: Some(0.5),
            batch_size: 10,
            mask_selection_range_min: 0.0,
            mask_selection_range_max: 0.1,
            mask_selection_negative_range_min: 0.9,
            mask_selection_negative_range_max: 1.0,
        }
    }
}

impl ExplainerConfig {
    /// Check every parameter; the first violation is reported
    pub fn validate(&self) -> crate::Result<()> {
        if self.n_masks == 0 {
            return Err(ExplainError::config("n_masks must be positive"));
        }
        if self.feature_res == 0 {
            return Err(ExplainError::config("feature_res must be positive"));
        }
        if self.batch_size == 0 {
            return Err(ExplainError::config("batch_size must be positive"));
        }
        if let Some(p) = self.p_keep {
            if !(0.0..=1.0).contains(&p) {
                return Err(ExplainError::config(format!(
                    "p_keep must lie in [0, 1], got {}",
                    p
                )));
            }
        }
        self.positive_band().validate()?;
        self.negative_band().validate()?;
        Ok(())
    }

    /// Keep-probability actually used for mask generation and calibration
    pub fn active_p_keep(&self) -> f32 {
        self.p_keep.unwrap_or(AUTO_P_KEEP)
    }

    /// Band of masks whose embedding ends up closest to the reference
    pub fn positive_band(&self) -> QuantileBand {
        QuantileBand::new(self.mask_selection_range_min, self.mask_selection_range_max)
    }

    /// Band of masks whose embedding ends up farthest from the reference
    pub fn negative_band(&self) -> QuantileBand {
        QuantileBand::new(
            self.mask_selection_negative_range_min,
            self.mask_selection_negative_range_max,
        )
    }
}

/// A named, seeded explainer run as stored on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub experiment_name: String,
    #[serde(default)]
    pub random_seed: u64,
    /// Overrides the reported neutral value when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_central_value: Option<f32>,
    #[serde(flatten)]
    pub explainer: ExplainerConfig,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            experiment_name: "default".to_string(),
            random_seed: 0,
            manual_central_value: None,
            explainer: ExplainerConfig::default(),
        }
    }
}

impl ExperimentConfig {
    /// Load and validate an experiment from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read experiment config: {:?}", path))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse experiment config TOML: {:?}", path))?;

        config
            .explainer
            .validate()
            .with_context(|| format!("Invalid experiment config: {:?}", path))?;

        Ok(config)
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize experiment config")
    }

    /// Names of the parameters whose values differ, sorted alphabetically
    pub fn differing_fields(&self, other: &Self) -> Result<Vec<String>> {
        let ours = serde_json::to_value(self).context("Failed to serialize config")?;
        let theirs = serde_json::to_value(other).context("Failed to serialize config")?;

        let (Some(ours), Some(theirs)) = (ours.as_object(), theirs.as_object()) else {
            anyhow::bail!("Experiment config did not serialize to a map");
        };

        let mut keys: Vec<&String> = ours.keys().chain(theirs.keys()).collect();
        keys.sort();
        keys.dedup();

        Ok(keys
            .into_iter()
            .filter(|key| ours.get(*key) != theirs.get(*key))
            .cloned()
            .collect())
    }
}

/// `p_keep` is either a number or the string "auto"
mod p_keep_repr {
    use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Value(f32),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &Option<f32>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(p) => Repr::Value(*p),
            None => Repr::Text("auto".to_string()),
        }
        .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f32>, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Value(p) => Ok(Some(p)),
            Repr::Text(text) if text.eq_ignore_ascii_case("auto") => Ok(None),
            Repr::Text(text) => Err(de::Error::custom(format!(
                "p_keep must be a number or \"auto\", got {:?}",
                text
            ))),
        }
    }
}
