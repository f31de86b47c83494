use serde::Serialize;

use crate::error::ModelResult;
use crate::explain::Attribution;

/// Class decision for one row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub class_index: usize,
    /// Probability of the predicted class.
    pub confidence: f64,
    pub probabilities: Vec<f64>,
}

/// Contract between the prediction handler and a trained model.
///
/// `row` is always given in training order. Implementations must be
/// deterministic: the same row yields the same prediction and attribution.
pub trait ClassifierModel: Send + Sync {
    fn predict(&self, row: &[f64]) -> ModelResult<Prediction>;

    /// Attribution of the model output for `class_index` to each feature of `row`.
    fn explain(&self, row: &[f64], class_index: usize) -> ModelResult<Attribution>;

    /// Raw (margin space) outputs, one per output group.
    fn raw_output(&self, row: &[f64]) -> ModelResult<Vec<f64>>;

    fn name(&self) -> &str {
        "classifier"
    }
}
