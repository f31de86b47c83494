//! Predict, explain and render one feature vector as a single failure boundary.
//!
//! Whatever goes wrong inside the boundary (a model error, a bad class index, a
//! plot that cannot be drawn) ends up as a [`PredictionOutcome::Failure`] carrying
//! the message and the full error chain. Nothing escapes as a panic or an `Err`,
//! so a caller can always render the outcome and keep serving requests.
use std::time::Instant;

use anyhow::{Context, Result};
use log::{debug, error, warn};
use serde::Serialize;

use crate::config::RenderOptions;
use crate::explain::Attribution;
use crate::features::FeatureVector;
use crate::models::{ClassifierModel, ModelCache};
use crate::report::{force_plot_document, waterfall_svg};

/// Tolerance between the attribution total and the model's raw output.
const ADDITIVITY_TOLERANCE: f64 = 1e-4;

/// The class decision as shown to the user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionView {
    pub class_index: usize,
    pub label: String,
    pub confidence: f64,
    pub probabilities: Vec<f64>,
}

/// Everything produced by a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct PredictionReport {
    pub inputs: FeatureVector,
    pub prediction: PredictionView,
    pub attribution: Attribution,
    /// Raw margin of every output group.
    pub raw_output: Vec<f64>,
    #[serde(skip)]
    pub force_plot_html: String,
    #[serde(skip)]
    pub waterfall_svg: String,
}

/// User facing description of a failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorDetail {
    /// One line message with the context chain.
    pub message: String,
    /// Full diagnostic dump of the error chain.
    pub diagnostic: String,
}

impl ErrorDetail {
    pub fn from_error(err: &anyhow::Error) -> Self {
        Self {
            message: format!("{:#}", err),
            diagnostic: format!("{:?}", err),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PredictionOutcome {
    Success(Box<PredictionReport>),
    /// `prediction` is kept when the failure happened after the model answered.
    Failure {
        prediction: Option<PredictionView>,
        error: ErrorDetail,
    },
}

impl PredictionOutcome {
    pub fn failure(prediction: Option<PredictionView>, err: &anyhow::Error) -> Self {
        PredictionOutcome::Failure {
            prediction,
            error: ErrorDetail::from_error(err),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PredictionOutcome::Success(_))
    }

    /// The prediction, if the model got far enough to produce one.
    pub fn prediction(&self) -> Option<&PredictionView> {
        match self {
            PredictionOutcome::Success(report) => Some(&report.prediction),
            PredictionOutcome::Failure { prediction, .. } => prediction.as_ref(),
        }
    }

    pub fn error(&self) -> Option<&ErrorDetail> {
        match self {
            PredictionOutcome::Success(_) => None,
            PredictionOutcome::Failure { error, .. } => Some(error),
        }
    }
}

/// Run the model on `features` and render both attribution views.
pub fn run_prediction(
    model: &dyn ClassifierModel,
    features: &FeatureVector,
    options: &RenderOptions,
) -> PredictionOutcome {
    let start = Instant::now();
    let mut shown: Option<PredictionView> = None;
    let outcome = match predict_and_explain(model, features, options, &mut shown) {
        Ok(report) => PredictionOutcome::Success(Box::new(report)),
        Err(e) => {
            error!("[{}] prediction request failed: {:#}", model.name(), e);
            PredictionOutcome::failure(shown, &e)
        }
    };
    debug!(
        "[{}] handled {:?} in {:?}",
        model.name(),
        features.as_row(),
        start.elapsed()
    );
    outcome
}

/// Same as [`run_prediction`], loading the classifier from `cache` first.
///
/// A classifier that cannot be loaded is reported like any other failure.
pub fn run_with_cache(
    cache: &ModelCache,
    features: &FeatureVector,
    options: &RenderOptions,
) -> PredictionOutcome {
    match cache.get_or_load() {
        Ok(model) => run_prediction(model.as_ref(), features, options),
        Err(e) => {
            let e = anyhow::Error::new(e).context(format!(
                "Failed to load classifier from {}",
                cache.path().display()
            ));
            error!("{:#}", e);
            PredictionOutcome::failure(None, &e)
        }
    }
}

fn predict_and_explain(
    model: &dyn ClassifierModel,
    features: &FeatureVector,
    options: &RenderOptions,
    shown: &mut Option<PredictionView>,
) -> Result<PredictionReport> {
    let row = features.as_row();

    let prediction = model.predict(&row).context("Prediction failed")?;
    let label = options
        .class_labels
        .label(prediction.class_index)
        .context("Prediction returned an unknown class")?
        .to_string();
    let view = PredictionView {
        class_index: prediction.class_index,
        label,
        confidence: prediction.confidence,
        probabilities: prediction.probabilities,
    };
    *shown = Some(view.clone());

    let attribution = model
        .explain(&row, view.class_index)
        .context("Failed to compute SHAP values")?;
    let raw_output = model
        .raw_output(&row)
        .context("Failed to compute raw model output")?;
    if let Some(raw) = raw_output.get(attribution.output_index) {
        let gap = (attribution.output_value() - raw).abs();
        if gap > ADDITIVITY_TOLERANCE {
            warn!(
                "[{}] attributions sum to {:.6} but raw output is {:.6}",
                model.name(),
                attribution.output_value(),
                raw
            );
        }
    }

    let force_plot_html = force_plot_document(&attribution, options.force_plot_height)
        .context("Failed to render SHAP force plot")?;
    let waterfall = waterfall_svg(&attribution)
        .context("Failed to render SHAP waterfall plot")?
        .into_string();

    Ok(PredictionReport {
        inputs: *features,
        prediction: view,
        attribution,
        raw_output,
        force_plot_html,
        waterfall_svg: waterfall,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ModelError, ModelResult};
    use crate::models::Prediction;

    /// Predicts class 1 and fails (or not) at the explanation step.
    struct Scripted {
        explain_fails: bool,
        class_index: usize,
    }

    impl ClassifierModel for Scripted {
        fn predict(&self, _row: &[f64]) -> ModelResult<Prediction> {
            Ok(Prediction {
                class_index: self.class_index,
                confidence: 0.8,
                probabilities: vec![0.2, 0.8],
            })
        }

        fn explain(&self, row: &[f64], _class_index: usize) -> ModelResult<Attribution> {
            if self.explain_fails {
                return Err(ModelError::Render("explainer unavailable".to_string()));
            }
            Ok(Attribution {
                feature_names: crate::features::feature_names(),
                feature_values: row.to_vec(),
                values: vec![0.1, 0.9, -0.2, 0.0],
                base_value: 0.586,
                output_index: 0,
            })
        }

        fn raw_output(&self, _row: &[f64]) -> ModelResult<Vec<f64>> {
            Ok(vec![1.386])
        }
    }

    #[test]
    fn success_renders_both_views() {
        let model = Scripted {
            explain_fails: false,
            class_index: 1,
        };
        let outcome = run_prediction(&model, &FeatureVector::default(), &RenderOptions::default());
        match outcome {
            PredictionOutcome::Success(report) => {
                assert_eq!(report.prediction.label, "Very Mild to Mild Dementia");
                assert!(report.force_plot_html.contains("plotly"));
                assert!(report.waterfall_svg.starts_with("<svg"));
            }
            PredictionOutcome::Failure { error, .. } => panic!("unexpected failure: {}", error.message),
        }
    }

    #[test]
    fn failure_after_prediction_keeps_the_prediction() {
        let model = Scripted {
            explain_fails: true,
            class_index: 1,
        };
        let outcome = run_prediction(&model, &FeatureVector::default(), &RenderOptions::default());
        assert!(!outcome.is_success());
        assert_eq!(outcome.prediction().map(|p| p.class_index), Some(1));
        let error = outcome.error().unwrap();
        assert!(error.message.starts_with("Failed to compute SHAP values"));
        assert!(error.message.contains("explainer unavailable"));
    }

    #[test]
    fn unknown_class_is_a_failure() {
        let model = Scripted {
            explain_fails: false,
            class_index: 5,
        };
        let outcome = run_prediction(&model, &FeatureVector::default(), &RenderOptions::default());
        assert!(outcome.prediction().is_none());
        assert!(outcome.error().unwrap().message.contains("unknown class"));
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let model = Scripted {
            explain_fails: true,
            class_index: 0,
        };
        let outcome = run_prediction(&model, &FeatureVector::default(), &RenderOptions::default());
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "failure");
        assert_eq!(json["prediction"]["label"], "Moderate to Severe Dementia");
    }
}
