//! Distance explainer - why does an image embed near or far from a reference?
//!
//! The explainer occludes the image with many random masks, embeds every
//! masked variant, and ranks the masks by how close the resulting embedding
//! lands to the reference point. Masks from the closest band add to the
//! saliency map, masks from the farthest band subtract from it.

use ndarray::{concatenate, s, Array2, Array4, ArrayView2, ArrayViewD, Axis};
use serde::Serialize;

use crate::aggregate::aggregate;
use crate::config::ExplainerConfig;
use crate::distance::calculate_distances;
use crate::error::{ExplainError, Result};
use crate::layout::{AxisLabels, InputLayout, CHANNELS};
use crate::masks::{MaskGenerator, RiseMaskGenerator};
use crate::model::{EmbeddingModel, PreprocessFn, Runner};
use crate::selection::select_masks;

/// Axis labels every input image must carry
pub const REQUIRED_LABELS: &[&str] = &[CHANNELS];

/// Saliency map plus the value in it that means "no effect"
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Explanation {
    /// `(1, H, W, 1)`; positive where presence pulls toward the reference
    pub saliency: Array4<f32>,
    /// Level in `saliency` for regions that neither pull nor push
    pub neutral_value: f32,
}

/// Explains an image with respect to a reference point in an embedding space
///
/// The masks, predictions and weight statistics of the most recent call stay
/// available for inspection and are replaced by the next call.
pub struct DistanceExplainer {
    config: ExplainerConfig,
    axis_labels: AxisLabels,
    preprocess: Option<PreprocessFn>,
    mask_generator: Box<dyn MaskGenerator>,
    masks: Option<Array4<f32>>,
    predictions: Option<Array2<f32>>,
    statistics: String,
}

impl DistanceExplainer {
    /// Create an explainer; fails on an invalid configuration
    pub fn new(config: ExplainerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            axis_labels: AxisLabels::new(),
            preprocess: None,
            mask_generator: Box::new(RiseMaskGenerator::new()),
            masks: None,
            predictions: None,
            statistics: String::new(),
        })
    }

    /// Axis labels of the input images (must label the `channels` axis)
    pub fn with_axis_labels(mut self, axis_labels: AxisLabels) -> Self {
        self.axis_labels = axis_labels;
        self
    }

    /// Preprocessing applied to each masked batch before it reaches the model
    pub fn with_preprocess<F>(mut self, preprocess: F) -> Self
    where
        F: Fn(ArrayViewD<f32>) -> anyhow::Result<ndarray::ArrayD<f32>> + Send + Sync + 'static,
    {
        self.preprocess = Some(Box::new(preprocess));
        self
    }

    /// Replace the default RISE generator (e.g. with a seeded one)
    pub fn with_mask_generator(mut self, generator: impl MaskGenerator + 'static) -> Self {
        self.mask_generator = Box::new(generator);
        self
    }

    pub fn config(&self) -> &ExplainerConfig {
        &self.config
    }

    /// Masks used by the most recent call
    pub fn masks(&self) -> Option<&Array4<f32>> {
        self.masks.as_ref()
    }

    /// Model outputs of the most recent call, in mask order
    pub fn predictions(&self) -> Option<&Array2<f32>> {
        self.predictions.as_ref()
    }

    /// Weight statistics of the most recent call's non-empty bands
    pub fn statistics(&self) -> &str {
        &self.statistics
    }

    /// Explain `input_data` with respect to `embedded_reference`
    ///
    /// # Arguments
    /// * `model` - Encodes (masked) inputs into the embedding space
    /// * `input_data` - Image to explain, with a `channels` axis per the axis labels
    /// * `embedded_reference` - `(1, d)` reference point in the embedding space
    /// * `masks` - Optional `(n_masks, H, W, 1)` population instead of generated masks
    pub fn explain_image_distance(
        &mut self,
        model: &mut dyn EmbeddingModel,
        input_data: ArrayViewD<f32>,
        embedded_reference: ArrayView2<f32>,
        masks: Option<Array4<f32>>,
    ) -> Result<Explanation> {
        self.masks = None;
        self.predictions = None;
        self.statistics.clear();

        let (layout, input) =
            InputLayout::normalize(input_data, &self.axis_labels, REQUIRED_LABELS)?;
        let (_, height, width, _) = input.dim();
        let active_p_keep = self.config.active_p_keep();
        let n_masks = self.config.n_masks;

        let masks = match masks {
            Some(masks) => {
                if masks.len_of(Axis(0)) != n_masks {
                    return Err(ExplainError::config(format!(
                        "Configured n_masks ({}) is not equal to the number of masks passed ({})",
                        n_masks,
                        masks.len_of(Axis(0))
                    )));
                }
                let (_, h, w, c) = masks.dim();
                if (h, w, c) != (height, width, 1) {
                    return Err(ExplainError::invalid(format!(
                        "Masks have spatial shape {:?}, expected {:?}",
                        (h, w, c),
                        (height, width, 1)
                    )));
                }
                masks
            }
            None => self.mask_generator.generate(
                (height, width),
                n_masks,
                active_p_keep,
                self.config.feature_res,
            )?,
        };

        let batch_size = self.config.batch_size;
        let n_batches = n_masks.div_ceil(batch_size);
        tracing::info!(
            "Explaining {}x{} input with {} masks in {} batches",
            height,
            width,
            n_masks,
            n_batches
        );

        let mut runner = Runner::new(model, layout, self.preprocess.as_ref());
        let mut batch_predictions = Vec::with_capacity(n_batches);
        for (i, start) in (0..n_masks).step_by(batch_size).enumerate() {
            let end = (start + batch_size).min(n_masks);
            let masked = &input * &masks.slice(s![start..end, .., .., ..]);
            batch_predictions.push(runner.run(masked.view())?);
            tracing::debug!("Embedded batch {}/{} (masks {}..{})", i + 1, n_batches, start, end);
        }

        let views: Vec<_> = batch_predictions.iter().map(|p| p.view()).collect();
        let predictions = concatenate(Axis(0), &views).map_err(|e| {
            ExplainError::invalid(format!("Model returned inconsistent embedding sizes: {}", e))
        })?;

        let distances = calculate_distances(predictions.view(), embedded_reference)?;

        let negative = select_masks(distances.view(), masks.view(), self.config.negative_band())?;
        let positive = select_masks(distances.view(), masks.view(), self.config.positive_band())?;
        for (name, selection) in [("negative", &negative), ("positive", &positive)] {
            if selection.is_empty() {
                tracing::warn!("The {} mask selection band is empty", name);
            }
        }

        let aggregation = aggregate(&positive, &negative, (height, width, 1), active_p_keep)?;

        self.masks = Some(masks);
        self.predictions = Some(predictions);
        self.statistics = aggregation.statistics;

        tracing::info!(
            "Explanation done: {} positive / {} negative masks, neutral value {}",
            positive.len(),
            negative.len(),
            aggregation.neutral_value
        );

        Ok(Explanation {
            saliency: aggregation.saliency,
            neutral_value: aggregation.neutral_value,
        })
    }
}
