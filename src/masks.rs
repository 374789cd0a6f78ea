//! Randomized occlusion masks
//!
//! The default generator follows RISE: a coarse random keep/drop grid is
//! bilinearly upsampled to slightly more than the image size and cropped at a
//! random sub-cell offset, so that mask edges do not always align with the
//! same pixel boundaries.

use fastrand::Rng;
use ndarray::Array4;
use rayon::prelude::*;

use crate::error::{ExplainError, Result};

/// Capability: produce a population of occlusion masks
///
/// Masks are shaped `(count, height, width, 1)` with values in [0, 1], where
/// 1 keeps a pixel and 0 occludes it completely.
pub trait MaskGenerator: Send {
    fn generate(
        &mut self,
        spatial_shape: (usize, usize),
        count: usize,
        p_keep: f32,
        feature_res: usize,
    ) -> Result<Array4<f32>>;
}

/// RISE-style mask generator backed by a seedable `fastrand::Rng`
pub struct RiseMaskGenerator {
    rng: Rng,
}

impl RiseMaskGenerator {
    /// Generator seeded from system entropy
    pub fn new() -> Self {
        Self { rng: Rng::new() }
    }

    /// Reproducible generator: same seed, same masks
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Rng::with_seed(seed),
        }
    }
}

impl Default for RiseMaskGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Random draws for one mask
struct MaskDraw {
    grid: Vec<f32>,
    shift: (usize, usize),
}

/// Interpolation taps of one output coordinate along one axis
#[derive(Clone, Copy)]
struct Tap {
    lo: usize,
    hi: usize,
    frac: f32,
}

/// Bilinear taps for `len` output pixels starting at `offset` in an upsampled
/// axis of `up_len` pixels over `cells` grid cells (half-pixel centres, edges clamped)
fn axis_taps(offset: usize, len: usize, up_len: usize, cells: usize) -> Vec<Tap> {
    let scale = cells as f32 / up_len as f32;
    let last = (cells - 1) as f32;
    (0..len)
        .map(|i| {
            let src = (((offset + i) as f32 + 0.5) * scale - 0.5).clamp(0.0, last);
            let lo = src.floor() as usize;
            Tap {
                lo,
                hi: (lo + 1).min(cells - 1),
                frac: src - lo as f32,
            }
        })
        .collect()
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

impl MaskDraw {
    /// Upsample the grid bilinearly and crop a window of `spatial_shape` at the shift
    fn render(&self, spatial_shape: (usize, usize), feature_res: usize) -> Vec<f32> {
        let (height, width) = spatial_shape;
        let cell = (height.div_ceil(feature_res), width.div_ceil(feature_res));
        let rows = axis_taps(self.shift.0, height, (feature_res + 1) * cell.0, feature_res);
        let cols = axis_taps(self.shift.1, width, (feature_res + 1) * cell.1, feature_res);
        let at = |r: usize, c: usize| self.grid[r * feature_res + c];

        let mut values = Vec::with_capacity(height * width);
        for row in &rows {
            for col in &cols {
                let top = lerp(at(row.lo, col.lo), at(row.lo, col.hi), col.frac);
                let bottom = lerp(at(row.hi, col.lo), at(row.hi, col.hi), col.frac);
                values.push(lerp(top, bottom, row.frac));
            }
        }
        values
    }
}

impl MaskGenerator for RiseMaskGenerator {
    fn generate(
        &mut self,
        spatial_shape: (usize, usize),
        count: usize,
        p_keep: f32,
        feature_res: usize,
    ) -> Result<Array4<f32>> {
        let (height, width) = spatial_shape;
        if height == 0 || width == 0 {
            return Err(ExplainError::invalid(format!(
                "Cannot generate masks for empty spatial shape {:?}",
                spatial_shape
            )));
        }
        if feature_res == 0 {
            return Err(ExplainError::config("feature_res must be positive"));
        }
        if !(0.0..=1.0).contains(&p_keep) {
            return Err(ExplainError::config(format!(
                "p_keep must lie in [0, 1], got {}",
                p_keep
            )));
        }

        let cell = (height.div_ceil(feature_res), width.div_ceil(feature_res));

        // All randomness is drawn up front and in order, so the output only
        // depends on the seed and not on how rayon schedules the upsampling.
        let draws: Vec<MaskDraw> = (0..count)
            .map(|_| {
                let grid = (0..feature_res * feature_res)
                    .map(|_| if self.rng.f32() < p_keep { 1.0 } else { 0.0 })
                    .collect();
                let shift = (self.rng.usize(0..cell.0), self.rng.usize(0..cell.1));
                MaskDraw { grid, shift }
            })
            .collect();

        let rendered: Vec<f32> = draws
            .par_iter()
            .flat_map_iter(|draw| draw.render(spatial_shape, feature_res))
            .collect();

        tracing::debug!(
            "Generated {} masks of {}x{} (feature_res={}, p_keep={})",
            count,
            height,
            width,
            feature_res,
            p_keep
        );

        Array4::from_shape_vec((count, height, width, 1), rendered)
            .map_err(|e| ExplainError::invalid(format!("Failed to shape masks: {}", e)))
    }
}
