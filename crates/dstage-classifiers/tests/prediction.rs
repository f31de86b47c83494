use std::path::PathBuf;

use dstage_classifiers::config::RenderOptions;
use dstage_classifiers::explain::{Attribution, TreeExplainer};
use dstage_classifiers::features::FeatureVector;
use dstage_classifiers::handler::{run_prediction, run_with_cache, PredictionOutcome};
use dstage_classifiers::models::{ClassifierModel, ModelCache, Prediction, XGBoostClassifier};
use dstage_classifiers::report::render_page;
use dstage_classifiers::{ModelError, ModelResult};

fn data_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

fn binary_model() -> XGBoostClassifier {
    XGBoostClassifier::from_json_file(data_path("binary_model.json")).unwrap()
}

fn grid() -> Vec<FeatureVector> {
    let mut rows = Vec::new();
    for education in [0, 8, 12, 30] {
        for mmse in [0, 10, 21, 25, 30] {
            for fdg in [-2.0, -1.0, 0.0, 1.37] {
                for amyloid in [-2.0, 0.25, 0.5, 2.0] {
                    rows.push(FeatureVector::new(education, mmse, fdg, amyloid).unwrap());
                }
            }
        }
    }
    rows
}

// ---------------------------------------------------------------------------
// Model level properties
// ---------------------------------------------------------------------------

#[test]
fn predictions_are_valid_classes_with_probabilities() {
    for path in ["binary_model.json", "multiclass_model.json"] {
        let model = XGBoostClassifier::from_json_file(data_path(path)).unwrap();
        for row in grid() {
            let prediction = model.predict(&row.as_row()).unwrap();
            assert!(prediction.class_index <= 1, "{}: {:?}", path, row);
            assert!((0.0..=1.0).contains(&prediction.confidence));
            assert!(prediction.confidence >= 0.5 - 1e-12);
            let total: f64 = prediction.probabilities.iter().sum();
            assert!((total - 1.0).abs() < 1e-9);
        }
    }
}

#[test]
fn binary_model_known_outputs() {
    let model = binary_model();
    // 0.6 + 0.05 + 0.2 on top of logit(0.5) = 0
    let raw = model.raw_output(&FeatureVector::default().as_row()).unwrap();
    assert!((raw[0] - 0.85).abs() < 1e-9);
    let p = model.predict(&FeatureVector::default().as_row()).unwrap();
    assert_eq!(p.class_index, 1);

    let severe = FeatureVector::new(30, 0, -2.0, -2.0).unwrap();
    let raw = model.raw_output(&severe.as_row()).unwrap();
    assert!((raw[0] + 0.75).abs() < 1e-9);
    assert_eq!(model.predict(&severe.as_row()).unwrap().class_index, 0);
}

#[test]
fn attributions_add_up_to_the_raw_output() {
    for path in ["binary_model.json", "multiclass_model.json"] {
        let model = XGBoostClassifier::from_json_file(data_path(path)).unwrap();
        for row in grid() {
            let values = row.as_row();
            let prediction = model.predict(&values).unwrap();
            let attribution = model.explain(&values, prediction.class_index).unwrap();
            let raw = model.raw_output(&values).unwrap();
            assert!(
                (attribution.output_value() - raw[attribution.output_index]).abs() < 1e-4,
                "{}: {:?} gives {} vs {}",
                path,
                row,
                attribution.output_value(),
                raw[attribution.output_index]
            );
        }
    }
}

#[test]
fn multiclass_explains_the_predicted_class() {
    let model = XGBoostClassifier::from_json_file(data_path("multiclass_model.json")).unwrap();
    for row in grid() {
        let values = row.as_row();
        let prediction = model.predict(&values).unwrap();
        let attribution = model.explain(&values, prediction.class_index).unwrap();
        assert_eq!(attribution.output_index, prediction.class_index);
    }
}

#[test]
fn base_value_is_the_expected_margin() {
    let model = binary_model();
    let explainer = TreeExplainer::new(model.forest());
    let expected = explainer.expected_value()[0];
    let attribution = model.explain(&FeatureVector::default().as_row(), 1).unwrap();
    assert!((attribution.base_value - expected).abs() < 1e-12);
    // cover weighted leaf means of the three trees
    let by_hand = (15.0 * -0.5 + 25.0 * -0.2 + 45.0 * 0.6 + 15.0 * 0.1) / 100.0
        + (30.0 * -0.15 + 40.0 * 0.05 + 30.0 * 0.3) / 100.0
        + (20.0 * -0.3 + 10.0 * -0.4 + 70.0 * 0.2) / 100.0;
    assert!((expected - by_hand).abs() < 1e-9);
}

#[test]
fn predict_and_explain_are_deterministic() {
    let model = binary_model();
    let row = FeatureVector::new(14, 22, 0.37, -0.81).unwrap().as_row();
    let first: (Prediction, Attribution) = (
        model.predict(&row).unwrap(),
        model.explain(&row, 1).unwrap(),
    );
    for _ in 0..5 {
        assert_eq!(model.predict(&row).unwrap(), first.0);
        assert_eq!(model.explain(&row, 1).unwrap(), first.1);
    }
}

#[test]
fn feature_order_mismatch_is_rejected() {
    let json = std::fs::read_to_string(data_path("binary_model.json")).unwrap();
    let swapped = json.replace(
        r#"["Education", "MMSE", "FDG_SUVR_Score", "Amyloid_SUVR_Score"]"#,
        r#"["MMSE", "Education", "FDG_SUVR_Score", "Amyloid_SUVR_Score"]"#,
    );
    assert!(matches!(
        XGBoostClassifier::from_json_str(&swapped),
        Err(ModelError::FeatureOrder { .. })
    ));
}

#[test]
fn wrong_feature_count_is_rejected() {
    let json = std::fs::read_to_string(data_path("multiclass_model.json")).unwrap();
    let json = json.replace(r#""num_feature": "4""#, r#""num_feature": "5""#);
    assert!(matches!(
        XGBoostClassifier::from_json_str(&json),
        Err(ModelError::FeatureCount {
            expected: 4,
            found: 5
        })
    ));
}

// ---------------------------------------------------------------------------
// Handler scenarios
// ---------------------------------------------------------------------------

#[test]
fn boundary_inputs_complete() {
    let model = binary_model();
    let options = RenderOptions::default();
    for row in [
        FeatureVector::new(0, 30, 2.0, 2.0).unwrap(),
        FeatureVector::new(30, 0, -2.0, -2.0).unwrap(),
    ] {
        let outcome = run_prediction(&model, &row, &options);
        let prediction = outcome.prediction().unwrap();
        assert!(outcome.is_success(), "{:?}", outcome.error());
        assert!([
            "Moderate to Severe Dementia",
            "Very Mild to Mild Dementia"
        ]
        .contains(&prediction.label.as_str()));
    }
}

#[test]
fn default_inputs_render_both_views() {
    let model = binary_model();
    let options = RenderOptions::default();
    let inputs = FeatureVector::default();
    let outcome = run_prediction(&model, &inputs, &options);
    let report = match &outcome {
        PredictionOutcome::Success(report) => report,
        PredictionOutcome::Failure { error, .. } => panic!("{}", error.diagnostic),
    };
    assert_eq!(report.prediction.label, "Very Mild to Mild Dementia");
    assert!(report.force_plot_html.contains("plotly"));
    assert!(report.waterfall_svg.contains("E[f(X)]"));

    let page = render_page(&inputs, Some(&outcome), &options, Some("/predict")).into_string();
    assert!(page.contains("Predicted Class:"));
    assert!(page.contains(&format!("{:.3}", report.prediction.confidence)));
    assert!(page.contains("A. SHAP Force Plot"));
    assert!(page.contains("B. SHAP Waterfall Plot"));
    assert!(page.contains("srcdoc="));
    assert!(page.contains("height=\"300\""));
}

/// Fails on demand, otherwise delegates to a real model.
struct Flaky {
    inner: XGBoostClassifier,
    fail: bool,
}

impl ClassifierModel for Flaky {
    fn predict(&self, row: &[f64]) -> ModelResult<Prediction> {
        if self.fail {
            return Err(ModelError::InvalidInput {
                feature: "MMSE".to_string(),
                reason: "injected failure".to_string(),
            });
        }
        self.inner.predict(row)
    }

    fn explain(&self, row: &[f64], class_index: usize) -> ModelResult<Attribution> {
        self.inner.explain(row, class_index)
    }

    fn raw_output(&self, row: &[f64]) -> ModelResult<Vec<f64>> {
        self.inner.raw_output(row)
    }
}

#[test]
fn injected_failure_is_reported_and_next_call_succeeds() {
    let options = RenderOptions::default();
    let inputs = FeatureVector::default();

    let failing = Flaky {
        inner: binary_model(),
        fail: true,
    };
    let outcome = run_prediction(&failing, &inputs, &options);
    assert!(outcome.prediction().is_none());
    let error = outcome.error().unwrap();
    assert!(error.message.contains("injected failure"));
    let page = render_page(&inputs, Some(&outcome), &options, Some("/predict")).into_string();
    assert!(page.contains("Error: Prediction failed"));

    let healthy = Flaky {
        inner: binary_model(),
        fail: false,
    };
    assert!(run_prediction(&healthy, &inputs, &options).is_success());
}

#[test]
fn missing_model_surfaces_as_failure() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ModelCache::new(dir.path().join("xgb_model.json"));
    let outcome = run_with_cache(&cache, &FeatureVector::default(), &RenderOptions::default());
    let error = outcome.error().unwrap();
    assert!(error.message.contains("Failed to load classifier"));
    assert!(!cache.is_loaded());

    // the artifact appears later and the same cache picks it up
    std::fs::copy(data_path("binary_model.json"), cache.path()).unwrap();
    let outcome = run_with_cache(&cache, &FeatureVector::default(), &RenderOptions::default());
    assert!(outcome.is_success());
    assert!(cache.is_loaded());
}
