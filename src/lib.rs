pub mod aggregate;
pub mod config;
pub mod distance;
pub mod error;
pub mod explainer;
pub mod layout;
pub mod masks;
pub mod model;
pub mod selection;

// Re-export commonly used types
pub use config::{ExperimentConfig, ExplainerConfig};
pub use error::{ExplainError, Result};
pub use explainer::{DistanceExplainer, Explanation};
pub use layout::AxisLabels;
pub use masks::{MaskGenerator, RiseMaskGenerator};
pub use model::{model_fn, EmbeddingModel, RandomProjection};
