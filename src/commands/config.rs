use anyhow::Result;
use distance_explainer::ExperimentConfig;
use std::path::Path;

pub fn show(path: Option<&Path>) -> Result<()> {
    let config = super::load_experiment(path)?;
    print!("{}", config.to_toml()?);
    Ok(())
}

pub fn diff(a: &Path, b: &Path) -> Result<()> {
    let first = ExperimentConfig::load(a)?;
    let second = ExperimentConfig::load(b)?;

    let fields = first.differing_fields(&second)?;
    if fields.is_empty() {
        println!("No differences");
        return Ok(());
    }

    for field in fields {
        println!("{field}");
    }
    Ok(())
}
