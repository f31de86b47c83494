use std::path::PathBuf;

use thiserror::Error;

/// Failures raised while loading, evaluating or explaining a classifier.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to read model artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse model artifact: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("unsupported objective '{0}'")]
    UnsupportedObjective(String),

    #[error("invalid base_score '{0}'")]
    InvalidBaseScore(String),

    #[error("tree {tree}: {reason}")]
    MalformedTree { tree: usize, reason: String },

    #[error("model expects {expected} features, got {found}")]
    FeatureCount { expected: usize, found: usize },

    #[error("model feature order {found:?} does not match {expected:?}")]
    FeatureOrder {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("invalid value for {feature}: {reason}")]
    InvalidInput { feature: String, reason: String },

    #[error("no class label for class index {0}")]
    UnknownClass(usize),

    #[error("model has {outputs} outputs, cannot explain class {class}")]
    OutputOutOfRange { class: usize, outputs: usize },

    #[error("render failed: {0}")]
    Render(String),
}

pub type ModelResult<T> = Result<T, ModelError>;
