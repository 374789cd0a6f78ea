pub mod config;
pub mod demo;

use anyhow::Result;
use distance_explainer::ExperimentConfig;
use std::path::Path;

/// Load the experiment at `path`, or the defaults when no path is given
pub fn load_experiment(path: Option<&Path>) -> Result<ExperimentConfig> {
    match path {
        Some(path) => ExperimentConfig::load(path),
        None => Ok(ExperimentConfig::default()),
    }
}
