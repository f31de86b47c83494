use serde::Serialize;

use crate::error::{ModelError, ModelResult};
use crate::explain::tree_shap::ShapValues;

/// Contributions of each feature to one prediction, relative to a base value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attribution {
    pub feature_names: Vec<String>,
    pub feature_values: Vec<f64>,
    pub values: Vec<f64>,
    pub base_value: f64,
    /// Output group the values were taken from (always 0 for single-output models).
    pub output_index: usize,
}

impl Attribution {
    /// Pick the slice of `shap` that explains `class_index`.
    ///
    /// Multi-output models carry one attribution set per class, so both the
    /// values and the base value are taken for the predicted class. A
    /// single-output binary model has one undifferentiated set which is used
    /// as is, whatever class was predicted.
    pub fn select(
        shap: &ShapValues,
        class_index: usize,
        feature_names: Vec<String>,
        feature_values: Vec<f64>,
    ) -> ModelResult<Self> {
        let output_index = if shap.n_outputs() > 1 { class_index } else { 0 };
        if output_index >= shap.n_outputs() {
            return Err(ModelError::OutputOutOfRange {
                class: class_index,
                outputs: shap.n_outputs(),
            });
        }
        if feature_names.len() != shap.n_features() || feature_values.len() != shap.n_features() {
            return Err(ModelError::FeatureCount {
                expected: shap.n_features(),
                found: feature_names.len().min(feature_values.len()),
            });
        }
        Ok(Self {
            feature_names,
            feature_values,
            values: shap.values.column(output_index).to_vec(),
            base_value: shap.base_values[output_index],
            output_index,
        })
    }

    /// Model output reconstructed from the attribution: base value plus all contributions.
    pub fn output_value(&self) -> f64 {
        self.base_value + self.values.iter().sum::<f64>()
    }

    /// Feature indices ordered by decreasing absolute contribution.
    pub fn order_by_magnitude(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.values.len()).collect();
        order.sort_by(|&a, &b| {
            self.values[b]
                .abs()
                .partial_cmp(&self.values[a].abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        order
    }
}
