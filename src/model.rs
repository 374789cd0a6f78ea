//! Embedding model capability and the batch runner around it

use anyhow::{bail, Context};
use ndarray::{Array2, ArrayD, ArrayView4, ArrayViewD, Axis};

use crate::error::{ExplainError, Result};
use crate::layout::InputLayout;

/// Trait for anything that maps a batch of inputs to embeddings
///
/// The batch arrives in the caller's own axis order (batch axis first). The
/// returned matrix must hold one embedding row per batch entry.
pub trait EmbeddingModel {
    fn embed_batch(&mut self, batch: ArrayViewD<f32>) -> anyhow::Result<Array2<f32>>;
}

/// Caller preprocessing applied to every batch before the model sees it
pub type PreprocessFn =
    Box<dyn Fn(ArrayViewD<f32>) -> anyhow::Result<ArrayD<f32>> + Send + Sync>;

/// Adapter turning a plain function or closure into an [`EmbeddingModel`]
pub struct FnModel<F>(F);

/// Wrap a closure as a model
///
/// ```rust,ignore
/// let mut model = model_fn(|batch| Ok(my_network.forward(batch)));
/// ```
pub fn model_fn<F>(f: F) -> FnModel<F>
where
    F: FnMut(ArrayViewD<f32>) -> anyhow::Result<Array2<f32>>,
{
    FnModel(f)
}

impl<F> EmbeddingModel for FnModel<F>
where
    F: FnMut(ArrayViewD<f32>) -> anyhow::Result<Array2<f32>>,
{
    fn embed_batch(&mut self, batch: ArrayViewD<f32>) -> anyhow::Result<Array2<f32>> {
        (self.0)(batch)
    }
}

/// Runs canonical masked batches through layout restore, preprocessing and the model
pub struct Runner<'a> {
    model: &'a mut dyn EmbeddingModel,
    layout: InputLayout,
    preprocess: Option<&'a PreprocessFn>,
}

impl<'a> Runner<'a> {
    pub fn new(
        model: &'a mut dyn EmbeddingModel,
        layout: InputLayout,
        preprocess: Option<&'a PreprocessFn>,
    ) -> Self {
        Self {
            model,
            layout,
            preprocess,
        }
    }

    /// Embed one `(N, H, W, C)` batch; errors from the model pass through unchanged
    pub fn run(&mut self, batch: ArrayView4<f32>) -> Result<Array2<f32>> {
        let expected = batch.len_of(Axis(0));
        let restored = self.layout.to_model_layout(batch);

        let predictions = match self.preprocess {
            Some(preprocess) => {
                let prepared = preprocess(restored)?;
                self.model.embed_batch(prepared.view())?
            }
            None => self.model.embed_batch(restored)?,
        };

        if predictions.nrows() != expected {
            return Err(ExplainError::invalid(format!(
                "Model returned {} embeddings for a batch of {}",
                predictions.nrows(),
                expected
            )));
        }
        Ok(predictions)
    }
}

/// Fixed random linear embedding of the flattened input
///
/// Deterministic for a given seed, which makes it a convenient stand-in
/// model for demos and tests.
pub struct RandomProjection {
    /// `(dimension, input_len)`
    weights: Array2<f32>,
}

impl RandomProjection {
    pub fn new(input_len: usize, dimension: usize, seed: u64) -> Self {
        let mut rng = fastrand::Rng::with_seed(seed);

        // Xavier-style scale keeps outputs in a sane range for any input size
        let scale = (6.0 / (input_len + dimension) as f32).sqrt();
        let weights =
            Array2::from_shape_fn((dimension, input_len), |_| (rng.f32() * 2.0 - 1.0) * scale);

        Self { weights }
    }

    pub fn dimension(&self) -> usize {
        self.weights.nrows()
    }
}

impl EmbeddingModel for RandomProjection {
    fn embed_batch(&mut self, batch: ArrayViewD<f32>) -> anyhow::Result<Array2<f32>> {
        if batch.ndim() == 0 {
            bail!("Batch must have a leading batch axis");
        }
        let n = batch.len_of(Axis(0));
        let input_len = self.weights.ncols();
        if batch.len() != n * input_len {
            bail!(
                "Expected inputs of {} values each, got batch shape {:?}",
                input_len,
                batch.shape()
            );
        }

        let flat = batch
            .as_standard_layout()
            .into_shape_with_order((n, input_len))
            .context("Failed to flatten batch")?;

        Ok(flat.dot(&self.weights.t()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, Array4};

    #[test]
    fn test_model_fn_wraps_closure() {
        let mut model = model_fn(|batch| Ok(Array2::zeros((batch.len_of(Axis(0)), 3))));
        let batch = Array4::<f32>::zeros((2, 4, 4, 1));
        let out = model.embed_batch(batch.view().into_dyn()).unwrap();
        assert_eq!(out.dim(), (2, 3));
    }

    #[test]
    fn test_runner_restores_caller_layout() {
        let mut seen = Vec::new();
        let mut model = model_fn(|batch| {
            seen.push(batch.shape().to_vec());
            Ok(Array2::ones((batch.len_of(Axis(0)), 2)))
        });

        let batch = Array4::<f32>::zeros((5, 6, 7, 3));
        // channels sat on axis 0 of the unbatched image
        let layout = InputLayout::normalize(
            ndarray::Array3::<f32>::zeros((3, 6, 7)).view().into_dyn(),
            &crate::layout::AxisLabels::new().with(0, "channels"),
            &["channels"],
        )
        .unwrap()
        .0;

        let mut runner = Runner::new(&mut model, layout, None);
        runner.run(batch.view()).unwrap();
        drop(runner);

        assert_eq!(seen, vec![vec![5, 3, 6, 7]]);
    }

    #[test]
    fn test_runner_applies_preprocessing() {
        let preprocess: PreprocessFn =
            Box::new(|batch: ArrayViewD<f32>| Ok(batch.mapv(|v| v + 1.0)));
        let mut model = model_fn(|batch| {
            let total: f32 = batch.sum();
            Ok(Array2::from_elem((batch.len_of(Axis(0)), 1), total))
        });

        let batch = Array4::<f32>::zeros((2, 2, 2, 1));
        let mut runner = Runner::new(&mut model, InputLayout::channels_last(), Some(&preprocess));
        let out = runner.run(batch.view()).unwrap();

        assert_eq!(out[[0, 0]], 8.0);
    }

    #[test]
    fn test_runner_rejects_wrong_row_count() {
        let mut model = model_fn(|_| Ok(Array2::zeros((1, 4))));
        let batch = Array4::<f32>::zeros((3, 2, 2, 1));
        let mut runner = Runner::new(&mut model, InputLayout::channels_last(), None);
        assert!(matches!(
            runner.run(batch.view()),
            Err(ExplainError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_runner_propagates_model_error() {
        let mut model = model_fn(|_| anyhow::bail!("device lost"));
        let batch = Array4::<f32>::zeros((1, 2, 2, 1));
        let mut runner = Runner::new(&mut model, InputLayout::channels_last(), None);
        let err = runner.run(batch.view()).unwrap_err();
        assert!(matches!(err, ExplainError::Model(_)));
        assert_eq!(err.to_string(), "device lost");
    }

    #[test]
    fn test_random_projection_is_deterministic() {
        let batch = Array4::from_shape_fn((4, 3, 3, 2), |(n, h, w, c)| (n + h * w + c) as f32);

        let a = RandomProjection::new(18, 10, 0)
            .embed_batch(batch.view().into_dyn())
            .unwrap();
        let b = RandomProjection::new(18, 10, 0)
            .embed_batch(batch.view().into_dyn())
            .unwrap();

        assert_eq!(a.dim(), (4, 10));
        assert_eq!(a, b);
    }

    #[test]
    fn test_random_projection_rejects_wrong_input_size() {
        let batch = Array4::<f32>::zeros((2, 3, 3, 1));
        assert!(RandomProjection::new(10, 4, 0)
            .embed_batch(batch.view().into_dyn())
            .is_err());
    }
}
