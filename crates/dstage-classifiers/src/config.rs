use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Display names for the classifier's output classes, indexed by class.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(transparent)]
pub struct ClassLabels(pub Vec<String>);

impl Default for ClassLabels {
    fn default() -> Self {
        Self(vec![
            "Moderate to Severe Dementia".to_string(),
            "Very Mild to Mild Dementia".to_string(),
        ])
    }
}

impl ClassLabels {
    pub fn label(&self, class_index: usize) -> ModelResult<&str> {
        self.0
            .get(class_index)
            .map(|s| s.as_str())
            .ok_or(ModelError::UnknownClass(class_index))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Presentation settings shared by the dashboard and the offline report.
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct RenderOptions {
    pub page_title: String,
    /// Height in pixels of the embedded interactive force plot.
    pub force_plot_height: u32,
    pub class_labels: ClassLabels,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            page_title: "Dementia Stage Prediction".to_string(),
            force_plot_height: 300,
            class_labels: ClassLabels::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_labels_cover_both_classes() {
        let labels = ClassLabels::default();
        assert_eq!(labels.label(0).unwrap(), "Moderate to Severe Dementia");
        assert_eq!(labels.label(1).unwrap(), "Very Mild to Mild Dementia");
        assert!(matches!(labels.label(2), Err(ModelError::UnknownClass(2))));
    }

    #[test]
    fn labels_serialize_as_plain_list() {
        let json = serde_json::to_string(&ClassLabels::default()).unwrap();
        assert!(json.starts_with('['));
    }
}
