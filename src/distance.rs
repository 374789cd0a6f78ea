//! Cosine distances between embeddings and a reference point

use ndarray::{Array1, ArrayView1, ArrayView2, Axis};

use crate::error::{ExplainError, Result};

/// Compute cosine similarity between two embedding vectors
///
/// Returns a value between -1.0 and 1.0, where:
/// - 1.0 = identical direction
/// - 0.0 = orthogonal vectors
/// - -1.0 = opposite vectors
///
/// A zero-magnitude vector is treated as orthogonal to everything.
pub fn cosine_similarity(a: ArrayView1<f32>, b: ArrayView1<f32>) -> Result<f64> {
    if a.len() != b.len() {
        return Err(ExplainError::invalid(format!(
            "Vectors must have same dimension: {} vs {}",
            a.len(),
            b.len()
        )));
    }

    let (mut dot_product, mut magnitude_a, mut magnitude_b) = (0.0f64, 0.0f64, 0.0f64);
    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (x as f64, y as f64);
        dot_product += x * y;
        magnitude_a += x * x;
        magnitude_b += y * y;
    }

    // Handle zero magnitude case
    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return Ok(0.0);
    }

    Ok(dot_product / (magnitude_a.sqrt() * magnitude_b.sqrt()))
}

/// Distance of every prediction row to the single reference row
///
/// Cosine distance halved into [0, 1]: 0 = same direction, 0.5 = orthogonal,
/// 1 = opposite direction. Kept in f64 so that close distances stay distinct
/// when ranked.
pub fn calculate_distances(
    predictions: ArrayView2<f32>,
    embedded_reference: ArrayView2<f32>,
) -> Result<Array1<f64>> {
    let (n_reference, reference_dim) = embedded_reference.dim();
    if n_reference != 1 {
        return Err(ExplainError::invalid(format!(
            "Expected exactly one reference embedding, got {}",
            n_reference
        )));
    }
    if reference_dim == 0 || predictions.ncols() == 0 {
        return Err(ExplainError::invalid("Embeddings must not be zero-length"));
    }
    if predictions.ncols() != reference_dim {
        return Err(ExplainError::invalid(format!(
            "Prediction dimension {} does not match reference dimension {}",
            predictions.ncols(),
            reference_dim
        )));
    }

    let reference = embedded_reference.index_axis(Axis(0), 0);
    predictions
        .axis_iter(Axis(0))
        .map(|prediction| {
            let similarity = cosine_similarity(prediction, reference)?;
            Ok(((1.0 - similarity) / 2.0).clamp(0.0, 1.0))
        })
        .collect()
}
