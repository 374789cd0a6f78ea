//! Quantile band selection of masks by distance rank

use ndarray::{Array1, Array4, ArrayView1, ArrayView4, Axis};

use crate::error::{ExplainError, Result};

/// Fractional range of rank-ordered masks, `[min, max)` after truncation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantileBand {
    pub min: f64,
    pub max: f64,
}

impl QuantileBand {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Both bounds in [0, 1] and `min <= max`
    pub fn validate(&self) -> Result<()> {
        let in_unit = |x: f64| (0.0..=1.0).contains(&x);
        if !in_unit(self.min) || !in_unit(self.max) {
            return Err(ExplainError::config(format!(
                "Quantile band bounds must lie in [0, 1], got [{}, {}]",
                self.min, self.max
            )));
        }
        if self.min > self.max {
            return Err(ExplainError::config(format!(
                "Quantile band minimum {} exceeds maximum {}",
                self.min, self.max
            )));
        }
        Ok(())
    }

    /// Slice bounds over `n` sorted masks: `floor(n·min)..floor(n·max)`
    pub fn slice_bounds(&self, n: usize) -> (usize, usize) {
        let start = (n as f64 * self.min).floor() as usize;
        let end = (n as f64 * self.max).floor() as usize;
        (start.min(n), end.min(n).max(start.min(n)))
    }
}

/// Masks picked for one band, with their weights
#[derive(Debug, Clone)]
pub struct Selection {
    /// Indices into the mask population, in ascending distance order
    pub indices: Vec<usize>,
    /// Selected masks, `(k, H, W, 1)`
    pub masks: Array4<f32>,
    /// `exp(-distance)` per selected mask
    pub weights: Array1<f64>,
    /// Slice of the distance ranking this band covered
    pub bounds: (usize, usize),
}

impl Selection {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Mask indices sorted by ascending distance; ties keep the lower index first
pub fn rank_by_distance(distances: ArrayView1<f64>) -> Vec<usize> {
    let mut order: Vec<usize> = (0..distances.len()).collect();
    order.sort_by(|&a, &b| distances[a].total_cmp(&distances[b]).then(a.cmp(&b)));
    order
}

/// Select the masks whose distance rank falls into `band`
///
/// The lowest ranks are the masks whose occluded input embeds closest to the
/// reference, so a band near 0 picks "positive" masks and a band near 1 picks
/// "negative" ones. An empty band is a valid outcome.
pub fn select_masks(
    distances: ArrayView1<f64>,
    masks: ArrayView4<f32>,
    band: QuantileBand,
) -> Result<Selection> {
    band.validate()?;

    let n = distances.len();
    if masks.len_of(Axis(0)) != n {
        return Err(ExplainError::invalid(format!(
            "Got {} distances for {} masks",
            n,
            masks.len_of(Axis(0))
        )));
    }

    let (start, end) = band.slice_bounds(n);
    let mut indices = rank_by_distance(distances);
    indices.truncate(end);
    indices.drain(..start);

    let weights: Array1<f64> = indices.iter().map(|&i| (-distances[i]).exp()).collect();
    let selected = masks.select(Axis(0), &indices);

    tracing::debug!(
        "Selected {} of {} masks for band [{}, {})",
        indices.len(),
        n,
        band.min,
        band.max
    );

    Ok(Selection {
        indices,
        masks: selected,
        weights,
        bounds: (start, end),
    })
}
