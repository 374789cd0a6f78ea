//! End-to-end run on synthetic data: random image, random reference, random
//! linear embedding model, all derived from the experiment seed.

use anyhow::{Context, Result};
use distance_explainer::{
    AxisLabels, DistanceExplainer, Explanation, RandomProjection, RiseMaskGenerator,
};
use ndarray::{Array2, Array3};
use serde::Serialize;
use std::path::PathBuf;

pub struct DemoOptions {
    pub config: Option<PathBuf>,
    pub seed: Option<u64>,
    pub size: usize,
    pub dim: usize,
    pub output: Option<PathBuf>,
}

#[derive(Serialize)]
struct DemoReport<'a> {
    experiment_name: &'a str,
    random_seed: u64,
    /// Manual central value when configured, the computed neutral value otherwise
    central_value: f32,
    statistics: &'a str,
    explanation: &'a Explanation,
}

pub fn execute(options: DemoOptions) -> Result<()> {
    let mut experiment = super::load_experiment(options.config.as_deref())?;
    if let Some(seed) = options.seed {
        experiment.random_seed = seed;
    }
    let seed = experiment.random_seed;

    let mut rng = fastrand::Rng::with_seed(seed);
    let input = Array3::from_shape_fn((options.size, options.size, 3), |_| rng.f32());
    let reference = Array2::from_shape_fn((1, options.dim), |_| rng.f32() * 2.0 - 1.0);
    let mut model = RandomProjection::new(options.size * options.size * 3, options.dim, seed);

    let mut explainer = DistanceExplainer::new(experiment.explainer.clone())
        .context("Invalid explainer configuration")?
        .with_axis_labels(AxisLabels::new().with(2, "channels"))
        .with_mask_generator(RiseMaskGenerator::with_seed(seed));

    let explanation = explainer
        .explain_image_distance(&mut model, input.view().into_dyn(), reference.view(), None)
        .context("Explanation failed")?;

    let report = DemoReport {
        experiment_name: &experiment.experiment_name,
        random_seed: seed,
        central_value: experiment
            .manual_central_value
            .unwrap_or(explanation.neutral_value),
        statistics: explainer.statistics(),
        explanation: &explanation,
    };
    let rendered = serde_json::to_string_pretty(&report)?;

    match options.output {
        Some(path) => {
            std::fs::write(&path, rendered)
                .with_context(|| format!("Failed to write explanation: {:?}", path))?;
            eprintln!("Wrote explanation to {}", path.display());
        }
        None => println!("{}", rendered),
    }

    Ok(())
}
