//! Combine band selections into a saliency map and neutral value

use std::fmt;

use ndarray::{Array1, Array3, Array4, Axis};

use crate::error::{ExplainError, Result};
use crate::selection::Selection;

/// Descriptive statistics of one band's mask weights
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightStats {
    pub mean: f64,
    /// Population standard deviation
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

impl WeightStats {
    /// `None` for an empty band
    pub fn from_weights(weights: &Array1<f64>) -> Option<Self> {
        let mean = weights.mean()?;
        let std = weights.std(0.0);
        let min = weights.iter().copied().fold(f64::INFINITY, f64::min);
        let max = weights.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Some(Self {
            mean,
            std,
            min,
            max,
        })
    }

    /// Multi-line description headed by `name`
    pub fn describe(&self, name: &str) -> String {
        format!("Description of {}\n{}", name, self)
    }
}

impl fmt::Display for WeightStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "mean:{}\nstd:{}\nmin:{}\nmax:{}",
            self.mean, self.std, self.min, self.max
        )
    }
}

/// Output of [`aggregate`]
#[derive(Debug, Clone)]
pub struct Aggregation {
    /// `(1, H, W, 1)`, positive-band mean minus negative-band mean
    pub saliency: Array4<f32>,
    pub neutral_value: f32,
    /// Weight descriptions of the non-empty bands, negative band first
    pub statistics: String,
}

/// The "no effect" level of a saliency map
///
/// One-sided runs are centred on the keep-probability (the expected mask value),
/// signed by the side that was kept. Two-sided runs cancel out around zero.
pub fn neutral_value(
    positive_nonempty: bool,
    negative_nonempty: bool,
    active_p_keep: f32,
) -> Option<f32> {
    match (positive_nonempty, negative_nonempty) {
        (true, false) => Some(active_p_keep),
        (false, true) => Some(-active_p_keep),
        (true, true) => Some(0.0),
        (false, false) => None,
    }
}

/// Unweighted mean of the selected masks, or zeros for an empty selection
fn band_mean(selection: &Selection, mask_shape: (usize, usize, usize)) -> Array3<f32> {
    selection
        .masks
        .mean_axis(Axis(0))
        .unwrap_or_else(|| Array3::zeros(mask_shape))
}

/// Build the saliency map from the positive and negative selections
///
/// Weights only feed the statistics; the maps themselves are plain means over
/// the selected masks.
pub fn aggregate(
    positive: &Selection,
    negative: &Selection,
    mask_shape: (usize, usize, usize),
    active_p_keep: f32,
) -> Result<Aggregation> {
    let Some(neutral) = neutral_value(!positive.is_empty(), !negative.is_empty(), active_p_keep)
    else {
        return Err(ExplainError::EmptySelection {
            positive: positive.bounds,
            negative: negative.bounds,
        });
    };

    for selection in [positive, negative] {
        let (_, h, w, c) = selection.masks.dim();
        if !selection.is_empty() && (h, w, c) != mask_shape {
            return Err(ExplainError::invalid(format!(
                "Selected masks have shape {:?}, expected {:?}",
                (h, w, c),
                mask_shape
            )));
        }
    }

    let mut statistics = Vec::new();
    if let Some(stats) = WeightStats::from_weights(&negative.weights) {
        statistics.push(stats.describe("highest_mask_weights"));
    }
    if let Some(stats) = WeightStats::from_weights(&positive.weights) {
        statistics.push(stats.describe("lowest_mask_weights"));
    }

    let saliency = band_mean(positive, mask_shape) - band_mean(negative, mask_shape);

    Ok(Aggregation {
        saliency: saliency.insert_axis(Axis(0)),
        neutral_value: neutral,
        statistics: statistics.join("\n"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{array, Array4};

    fn selection(values: &[f32], weights: &[f64]) -> Selection {
        let masks = Array4::from_shape_fn((values.len(), 2, 3, 1), |(i, _, _, _)| values[i]);
        Selection {
            indices: (0..values.len()).collect(),
            masks,
            weights: Array1::from(weights.to_vec()),
            bounds: (0, values.len()),
        }
    }

    #[test]
    fn test_neutral_value_cases() {
        assert_eq!(neutral_value(true, false, 0.4), Some(0.4));
        assert_eq!(neutral_value(false, true, 0.4), Some(-0.4));
        assert_eq!(neutral_value(true, true, 0.4), Some(0.0));
        assert_eq!(neutral_value(false, false, 0.4), None);
    }

    #[test]
    fn test_two_sided_saliency_is_difference_of_means() {
        let positive = selection(&[1.0, 0.5], &[0.9, 0.8]);
        let negative = selection(&[0.25, 0.0, 0.5], &[0.5, 0.4, 0.3]);

        let result = aggregate(&positive, &negative, (2, 3, 1), 0.5).unwrap();

        assert_eq!(result.saliency.dim(), (1, 2, 3, 1));
        assert!(result
            .saliency
            .iter()
            .all(|&v| (v - (0.75 - 0.25)).abs() < 1e-6));
        assert_eq!(result.neutral_value, 0.0);
    }

    #[test]
    fn test_positive_only_uses_zero_negative_map() {
        let positive = selection(&[0.2, 0.4], &[0.9, 0.9]);
        let negative = selection(&[], &[]);

        let result = aggregate(&positive, &negative, (2, 3, 1), 0.3).unwrap();

        assert_relative_eq!(result.saliency[[0, 1, 2, 0]], 0.3, epsilon = 1e-6);
        assert_eq!(result.neutral_value, 0.3);
        assert!(result.statistics.starts_with("Description of lowest_mask_weights"));
        assert!(!result.statistics.contains("highest_mask_weights"));
    }

    #[test]
    fn test_negative_only_is_negated() {
        let positive = selection(&[], &[]);
        let negative = selection(&[1.0], &[0.6]);

        let result = aggregate(&positive, &negative, (2, 3, 1), 0.5).unwrap();

        assert_relative_eq!(result.saliency[[0, 0, 0, 0]], -1.0);
        assert_eq!(result.neutral_value, -0.5);
        assert_eq!(
            result.statistics,
            "Description of highest_mask_weights\nmean:0.6\nstd:0\nmin:0.6\nmax:0.6"
        );
    }

    #[test]
    fn test_both_empty_is_an_error() {
        let empty = selection(&[], &[]);
        let result = aggregate(&empty, &empty, (2, 3, 1), 0.5);
        assert!(matches!(result, Err(ExplainError::EmptySelection { .. })));
    }

    #[test]
    fn test_statistics_order_negative_first() {
        let positive = selection(&[1.0], &[0.9]);
        let negative = selection(&[0.0], &[0.4]);
        let result = aggregate(&positive, &negative, (2, 3, 1), 0.5).unwrap();

        let highest = result.statistics.find("highest_mask_weights").unwrap();
        let lowest = result.statistics.find("lowest_mask_weights").unwrap();
        assert!(highest < lowest);
    }

    #[test]
    fn test_weight_stats() {
        let stats = WeightStats::from_weights(&array![1.0, 3.0]).unwrap();
        assert_relative_eq!(stats.mean, 2.0);
        assert_relative_eq!(stats.std, 1.0);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 3.0);
        assert!(WeightStats::from_weights(&Array1::zeros(0)).is_none());
    }
}
