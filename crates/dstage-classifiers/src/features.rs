//! Input schema for the classifier.
//!
//! The four features are always present and always ordered the way the model
//! was trained: `Education`, `MMSE`, `FDG_SUVR_Score`, `Amyloid_SUVR_Score`.
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

pub const N_FEATURES: usize = 4;

const RANGE_TOLERANCE: f64 = 1e-9;

/// Whether a slider produces whole numbers or fractional values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FeatureKind {
    Integer,
    Float,
}

/// Bounds and defaults for one input slider.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FeatureSpec {
    /// Column name the model was trained with.
    pub column: &'static str,
    /// Human readable slider label.
    pub label: &'static str,
    pub min: f64,
    pub max: f64,
    pub step: f64,
    pub default: f64,
    pub kind: FeatureKind,
}

impl FeatureSpec {
    /// Validate `value` against the slider bounds and snap it onto the step grid.
    pub fn normalize(&self, value: f64) -> ModelResult<f64> {
        if !value.is_finite() {
            return Err(ModelError::InvalidInput {
                feature: self.column.to_string(),
                reason: format!("{} is not a finite number", value),
            });
        }
        // closed range; the tolerance only absorbs float noise like 2.0000000001
        if value < self.min - RANGE_TOLERANCE || value > self.max + RANGE_TOLERANCE {
            return Err(ModelError::InvalidInput {
                feature: self.column.to_string(),
                reason: format!(
                    "{} is outside [{}, {}]",
                    value, self.min, self.max
                ),
            });
        }
        let steps = ((value - self.min) / self.step).round();
        let snapped = (self.min + steps * self.step).clamp(self.min, self.max);
        // strip the floating point noise introduced by the step arithmetic
        let snapped = match self.kind {
            FeatureKind::Integer => snapped.round(),
            FeatureKind::Float => (snapped * 100.0).round() / 100.0,
        };
        Ok(snapped)
    }

    /// Format a value the way the slider displays it.
    pub fn format_value(&self, value: f64) -> String {
        match self.kind {
            FeatureKind::Integer => format!("{}", value.round() as i64),
            FeatureKind::Float => format!("{:.2}", value),
        }
    }
}

pub const FEATURE_SPECS: [FeatureSpec; N_FEATURES] = [
    FeatureSpec {
        column: "Education",
        label: "Years of Education",
        min: 0.0,
        max: 30.0,
        step: 1.0,
        default: 12.0,
        kind: FeatureKind::Integer,
    },
    FeatureSpec {
        column: "MMSE",
        label: "MMSE",
        min: 0.0,
        max: 30.0,
        step: 1.0,
        default: 25.0,
        kind: FeatureKind::Integer,
    },
    FeatureSpec {
        column: "FDG_SUVR_Score",
        label: "FDG_SUVR_Score",
        min: -2.0,
        max: 2.0,
        step: 0.01,
        default: 0.0,
        kind: FeatureKind::Float,
    },
    FeatureSpec {
        column: "Amyloid_SUVR_Score",
        label: "Amyloid_SUVR_Score",
        min: -2.0,
        max: 2.0,
        step: 0.01,
        default: 0.0,
        kind: FeatureKind::Float,
    },
];

/// Column names in training order.
pub fn feature_names() -> Vec<String> {
    FEATURE_SPECS.iter().map(|s| s.column.to_string()).collect()
}

/// One row of model input, built fresh for every prediction request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    #[serde(rename = "Education")]
    pub education: i32,
    #[serde(rename = "MMSE")]
    pub mmse: i32,
    #[serde(rename = "FDG_SUVR_Score")]
    pub fdg_suvr: f64,
    #[serde(rename = "Amyloid_SUVR_Score")]
    pub amyloid_suvr: f64,
}

impl Default for FeatureVector {
    fn default() -> Self {
        Self {
            education: FEATURE_SPECS[0].default as i32,
            mmse: FEATURE_SPECS[1].default as i32,
            fdg_suvr: FEATURE_SPECS[2].default,
            amyloid_suvr: FEATURE_SPECS[3].default,
        }
    }
}

impl FeatureVector {
    pub fn new(education: i32, mmse: i32, fdg_suvr: f64, amyloid_suvr: f64) -> ModelResult<Self> {
        Self::from_values([education as f64, mmse as f64, fdg_suvr, amyloid_suvr])
    }

    /// Build a vector from raw values in training order, validating each one.
    pub fn from_values(values: [f64; N_FEATURES]) -> ModelResult<Self> {
        let mut normalized = [0.0; N_FEATURES];
        for (i, (spec, value)) in FEATURE_SPECS.iter().zip(values.iter()).enumerate() {
            normalized[i] = spec.normalize(*value)?;
        }
        Ok(Self {
            education: normalized[0] as i32,
            mmse: normalized[1] as i32,
            fdg_suvr: normalized[2],
            amyloid_suvr: normalized[3],
        })
    }

    /// Parse the four values from their textual form (e.g. submitted form fields).
    pub fn parse(raw: [&str; N_FEATURES]) -> ModelResult<Self> {
        let mut values = [0.0; N_FEATURES];
        for (i, (spec, text)) in FEATURE_SPECS.iter().zip(raw.iter()).enumerate() {
            values[i] = text.trim().parse::<f64>().map_err(|e| ModelError::InvalidInput {
                feature: spec.column.to_string(),
                reason: format!("'{}' is not a number ({})", text, e),
            })?;
        }
        Self::from_values(values)
    }

    /// Values in training order.
    pub fn as_row(&self) -> [f64; N_FEATURES] {
        [
            self.education as f64,
            self.mmse as f64,
            self.fdg_suvr,
            self.amyloid_suvr,
        ]
    }
}
