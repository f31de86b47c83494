//! The single dashboard page: sidebar sliders, the trigger button and the
//! outcome of the last prediction.
use maud::{html, Markup, PreEscaped, DOCTYPE};

use crate::config::RenderOptions;
use crate::features::{FeatureVector, FEATURE_SPECS};
use crate::handler::{ErrorDetail, PredictionOutcome, PredictionView};

const STYLE: &str = r#"
body { font-family: "Times New Roman", serif; margin: 0; display: flex; color: #262730; }
aside { width: 300px; min-height: 100vh; padding: 24px; background: #f0f2f6; box-sizing: border-box; }
main { flex: 1; max-width: 760px; margin: 0 auto; padding: 24px 32px; }
.slider { margin-bottom: 18px; }
.slider label { display: block; font-size: 14px; margin-bottom: 4px; }
.slider input { width: 80%; }
.slider output { font-weight: bold; margin-left: 8px; }
button.primary { width: 100%; padding: 10px; border: none; border-radius: 6px; background: #ff4b4b; color: white; font-size: 16px; cursor: pointer; }
button.primary:disabled { background: #c9c9c9; cursor: default; }
.success { background: #dff5e3; color: #1b5e20; padding: 12px 16px; border-radius: 6px; }
.error { background: #fde2e2; color: #8a1c1c; padding: 12px 16px; border-radius: 6px; }
.diagnostic { background: #f5f5f5; padding: 10px; border-radius: 5px; overflow-x: auto; white-space: pre-wrap; font-family: monospace; font-size: 12px; }
.caption { font-size: 13px; color: #6b6b6b; }
.spinner { margin-top: 12px; font-style: italic; color: #6b6b6b; }
iframe.force-plot { width: 100%; border: none; }
footer { margin-top: 32px; }
"#;

/// Render the complete page.
///
/// `form_action` is where the sliders are submitted; `None` renders a
/// read-only snapshot (used for saved reports).
pub fn render_page(
    inputs: &FeatureVector,
    outcome: Option<&PredictionOutcome>,
    options: &RenderOptions,
    form_action: Option<&str>,
) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (options.page_title) }
                style { (PreEscaped(STYLE)) }
            }
            body {
                aside {
                    h2 { "Input Features" }
                    (render_inputs(inputs, form_action))
                }
                main {
                    h1 { (options.page_title) }
                    @if let Some(outcome) = outcome {
                        (render_outcome(outcome, options))
                    }
                    footer {
                        hr;
                        p class="caption" {
                            "Dementia Stage Prediction App © 2025 | Powered by XGBoost + SHAP"
                        }
                    }
                }
            }
        }
    }
}

/// Disables the button and shows the progress note while the request runs.
const ON_SUBMIT: &str = "this.querySelector('button.primary').disabled = true; \
                         document.getElementById('spinner').hidden = false;";

fn render_inputs(inputs: &FeatureVector, form_action: Option<&str>) -> Markup {
    let values = inputs.as_row();
    let disabled = form_action.is_none();
    html! {
        form method="post" action=(form_action.unwrap_or("#")) onsubmit=(ON_SUBMIT) {
            @for (spec, value) in FEATURE_SPECS.iter().zip(values.iter()) {
                div class="slider" {
                    label for=(spec.column) { (spec.label) }
                    input type="range" id=(spec.column) name=(spec.column)
                        min=(spec.format_value(spec.min)) max=(spec.format_value(spec.max))
                        step=(spec.format_value(spec.step)) value=(spec.format_value(*value))
                        disabled[disabled]
                        oninput="this.nextElementSibling.value = this.value";
                    output { (spec.format_value(*value)) }
                }
            }
            button type="submit" class="primary" disabled[disabled] { "Run Prediction" }
            p id="spinner" class="spinner" hidden { "Generating prediction and SHAP explanations..." }
        }
    }
}

fn render_prediction(prediction: &PredictionView) -> Markup {
    html! {
        div class="success" {
            strong { "Predicted Class:" } " " (prediction.label)
        }
        p {
            strong { "Confidence:" } " " (format!("{:.3}", prediction.confidence))
        }
    }
}

fn render_error(error: &ErrorDetail) -> Markup {
    html! {
        div class="error" role="alert" {
            "Error: " (error.message)
        }
        details open {
            summary { "Diagnostic detail" }
            pre class="diagnostic" { (error.diagnostic) }
        }
    }
}

/// Render the result area for one outcome.
pub fn render_outcome(outcome: &PredictionOutcome, options: &RenderOptions) -> Markup {
    match outcome {
        PredictionOutcome::Success(report) => html! {
            (render_prediction(&report.prediction))

            h3 { strong { "A. SHAP Force Plot" } }
            iframe class="force-plot" title="SHAP force plot"
                height=(options.force_plot_height) scrolling="yes"
                srcdoc=(report.force_plot_html) {}
            p class="caption" {
                strong { "A." } " SHAP force plot. "
                "Red = pushes toward mild dementia; Blue = pushes toward moderate-to-severe dementia."
            }

            h3 { strong { "B. SHAP Waterfall Plot" } }
            div class="waterfall-container" { (PreEscaped(&report.waterfall_svg)) }
            p class="caption" {
                strong { "B." } " Cumulative feature contributions from the base value (average prediction) "
                "to the final model output."
            }
        },
        PredictionOutcome::Failure { prediction, error } => html! {
            @if let Some(prediction) = prediction {
                (render_prediction(prediction))
            }
            (render_error(error))
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::PredictionOutcome;

    fn view() -> PredictionView {
        PredictionView {
            class_index: 0,
            label: "Moderate to Severe Dementia".to_string(),
            confidence: 0.91234,
            probabilities: vec![0.91234, 0.08766],
        }
    }

    #[test]
    fn idle_page_shows_sliders_and_button() {
        let html = render_page(
            &FeatureVector::default(),
            None,
            &RenderOptions::default(),
            Some("/predict"),
        )
        .into_string();
        for spec in FEATURE_SPECS.iter() {
            assert!(html.contains(&format!("name=\"{}\"", spec.column)));
        }
        assert!(html.contains("value=\"12\""));
        assert!(html.contains("value=\"0.00\""));
        assert!(html.contains("Run Prediction"));
        assert!(html.contains("onsubmit=\""));
        assert!(html.contains("id=\"spinner\""));
        assert!(html.contains("Generating prediction and SHAP explanations..."));
        assert!(!html.contains("Predicted Class:"));
        assert!(html.contains("Powered by XGBoost + SHAP"));
    }

    #[test]
    fn failure_after_prediction_shows_both() {
        let err = anyhow::anyhow!("plot backend <gone>").context("Failed to render SHAP force plot");
        let outcome = PredictionOutcome::failure(Some(view()), &err);
        let html = render_page(&FeatureVector::default(), Some(&outcome), &RenderOptions::default(), None)
            .into_string();
        assert!(html.contains("Moderate to Severe Dementia"));
        assert!(html.contains("0.912"));
        assert!(html.contains("role=\"alert\""));
        // error text is escaped
        assert!(html.contains("plot backend &lt;gone&gt;"));
        assert!(!html.contains("A. SHAP Force Plot"));
    }

    #[test]
    fn snapshot_disables_the_form() {
        let html = render_page(&FeatureVector::default(), None, &RenderOptions::default(), None)
            .into_string();
        assert!(html.contains("disabled"));
    }
}
