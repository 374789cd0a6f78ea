//! Input layout normalization
//!
//! Images arrive with whatever axis order the caller's model uses. Internally
//! everything runs on `(batch, height, width, channels)`; masked batches are
//! moved back into the caller's order before the model sees them.

use std::collections::BTreeMap;

use ndarray::{Array4, ArrayD, ArrayView4, ArrayViewD, Axis, Ix4, IxDyn};

use crate::error::{ExplainError, Result};

/// Label every image must carry
pub const CHANNELS: &str = "channels";

/// Axis labels keyed by axis index; negative indices count from the end
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AxisLabels {
    labels: BTreeMap<isize, String>,
}

impl AxisLabels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Label axis `index` (e.g. `AxisLabels::new().with(2, "channels")`)
    pub fn with(mut self, index: isize, label: impl Into<String>) -> Self {
        self.labels.insert(index, label.into());
        self
    }

    /// Labels for every axis, in order
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Self {
        names
            .iter()
            .enumerate()
            .fold(Self::new(), |labels, (i, name)| labels.with(i as isize, name.as_ref()))
    }

    /// Resolve labels against an array of `ndim` axes; unlabelled axes get `dim_<i>`
    pub fn resolve(&self, ndim: usize) -> Result<Vec<String>> {
        let mut resolved: Vec<String> = (0..ndim).map(|i| format!("dim_{}", i)).collect();
        for (&index, label) in &self.labels {
            let axis = if index < 0 {
                ndim as isize + index
            } else {
                index
            };
            if axis < 0 || axis >= ndim as isize {
                return Err(ExplainError::invalid(format!(
                    "Axis label '{}' at index {} is out of range for {} axes",
                    label, index, ndim
                )));
            }
            resolved[axis as usize] = label.clone();
        }
        Ok(resolved)
    }
}

/// Where the channel axis lived in the caller's batched layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputLayout {
    /// Channel axis position once a leading batch axis is added
    channels_axis: usize,
}

impl InputLayout {
    /// Bring a labelled image into canonical `(1, H, W, C)` form
    ///
    /// `input` must have exactly three axes: two spatial axes and the axis
    /// labelled `channels`. Every label in `required` must be present.
    pub fn normalize(
        input: ArrayViewD<f32>,
        labels: &AxisLabels,
        required: &[&str],
    ) -> Result<(Self, Array4<f32>)> {
        let names = labels.resolve(input.ndim())?;
        for &label in required {
            if !names.iter().any(|name| name == label) {
                return Err(ExplainError::MissingAxis(format!(
                    "Required axis label '{}' not found in {:?}",
                    label, names
                )));
            }
        }

        if input.ndim() != 3 {
            return Err(ExplainError::invalid(format!(
                "Expected an image with 3 axes (two spatial + channels), got shape {:?}",
                input.shape()
            )));
        }

        let channels = names
            .iter()
            .position(|name| name == CHANNELS)
            .ok_or_else(|| {
                ExplainError::MissingAxis(format!(
                    "Required axis label '{}' not found in {:?}",
                    CHANNELS, names
                ))
            })?;

        let batched = input.insert_axis(Axis(0));
        let layout = Self {
            channels_axis: channels + 1,
        };
        let canonical = batched
            .permuted_axes(IxDyn(&layout.to_canonical_order()))
            .into_dimensionality::<Ix4>()
            .map_err(|e| ExplainError::invalid(format!("Failed to normalize input: {}", e)))?
            .to_owned();

        Ok((layout, canonical))
    }

    /// Canonical layout for inputs already shaped `(H, W, C)`
    pub fn channels_last() -> Self {
        Self { channels_axis: 3 }
    }

    /// Axis permutation taking the caller's batched layout to canonical
    fn to_canonical_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..4).filter(|&a| a != self.channels_axis).collect();
        order.push(self.channels_axis);
        order
    }

    /// Axis permutation taking canonical back to the caller's batched layout
    fn to_model_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..3).collect();
        order.insert(self.channels_axis, 3);
        order
    }

    /// View a canonical `(N, H, W, C)` batch in the caller's axis order
    pub fn to_model_layout<'a>(&self, batch: ArrayView4<'a, f32>) -> ArrayViewD<'a, f32> {
        batch.into_dyn().permuted_axes(IxDyn(&self.to_model_order()))
    }

    /// Owned, contiguous copy of [`to_model_layout`](Self::to_model_layout)
    pub fn to_model_array(&self, batch: ArrayView4<f32>) -> ArrayD<f32> {
        self.to_model_layout(batch).as_standard_layout().into_owned()
    }
}
