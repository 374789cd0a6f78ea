//! Error types for distance explanations

use thiserror::Error;

/// Result type alias using [`ExplainError`]
pub type Result<T> = std::result::Result<T, ExplainError>;

/// Errors raised while computing a distance explanation
///
/// Every variant is raised at the point of detection. Nothing is retried and
/// no partial explanation is ever returned alongside an error.
#[derive(Error, Debug)]
pub enum ExplainError {
    /// Explainer parameters or caller-supplied masks disagree with the configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A required axis label is absent from the input
    #[error("Missing axis: {0}")]
    MissingAxis(String),

    /// Embeddings, masks or input data have unusable shapes
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Both quantile bands selected zero masks
    #[error(
        "Both mask selection bands are empty (positive: [{}, {}), negative: [{}, {})); \
         no neutral value can be computed",
        positive.0, positive.1, negative.0, negative.1
    )]
    EmptySelection {
        /// Positive band slice bounds (start, end) over the sorted masks
        positive: (usize, usize),
        /// Negative band slice bounds (start, end) over the sorted masks
        negative: (usize, usize),
    },

    /// Failure raised by the caller's model or preprocessing function
    #[error(transparent)]
    Model(#[from] anyhow::Error),
}

impl ExplainError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_error_message_passes_through() {
        let err: ExplainError = anyhow::anyhow!("GPU out of memory").into();
        assert_eq!(err.to_string(), "GPU out of memory");
    }

    #[test]
    fn test_empty_selection_message_names_bands() {
        let err = ExplainError::EmptySelection {
            positive: (0, 0),
            negative: (1000, 1000),
        };
        let msg = err.to_string();
        assert!(msg.contains("[0, 0)"), "{}", msg);
        assert!(msg.contains("[1000, 1000)"), "{}", msg);
    }
}
