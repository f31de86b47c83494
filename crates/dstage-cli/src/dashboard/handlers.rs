use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Form, Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use dstage_classifiers::features::FeatureVector;
use dstage_classifiers::handler::{run_with_cache, PredictionOutcome};
use dstage_classifiers::report::render_page;

use super::AppState;

/// Slider values as submitted by the page form.
#[derive(Debug, Deserialize)]
pub struct SliderForm {
    #[serde(rename = "Education")]
    pub education: String,
    #[serde(rename = "MMSE")]
    pub mmse: String,
    #[serde(rename = "FDG_SUVR_Score")]
    pub fdg_suvr: String,
    #[serde(rename = "Amyloid_SUVR_Score")]
    pub amyloid_suvr: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    model_path: String,
    model_loaded: bool,
    timestamp: i64,
}

pub async fn index(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(render_page(&FeatureVector::default(), None, &state.options, Some("/predict")).into_string())
}

pub async fn predict_form(
    State(state): State<Arc<AppState>>,
    Form(form): Form<SliderForm>,
) -> Html<String> {
    let parsed = FeatureVector::parse([
        form.education.as_str(),
        form.mmse.as_str(),
        form.fdg_suvr.as_str(),
        form.amyloid_suvr.as_str(),
    ]);
    let (inputs, outcome) = match parsed {
        Ok(inputs) => (inputs, predict(state.clone(), inputs).await),
        Err(e) => {
            log::warn!("Rejected slider input: {}", e);
            let e = anyhow::Error::new(e).context("Invalid input");
            (FeatureVector::default(), PredictionOutcome::failure(None, &e))
        }
    };
    Html(render_page(&inputs, Some(&outcome), &state.options, Some("/predict")).into_string())
}

pub async fn predict_json(
    State(state): State<Arc<AppState>>,
    Json(inputs): Json<FeatureVector>,
) -> Response {
    // re-validate: serde only checks the types
    let inputs = match FeatureVector::new(
        inputs.education,
        inputs.mmse,
        inputs.fdg_suvr,
        inputs.amyloid_suvr,
    ) {
        Ok(inputs) => inputs,
        Err(e) => {
            let e = anyhow::Error::new(e).context("Invalid input");
            let outcome = PredictionOutcome::failure(None, &e);
            return (StatusCode::UNPROCESSABLE_ENTITY, Json(outcome)).into_response();
        }
    };
    Json(predict(state, inputs).await).into_response()
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        model_path: state.cache.path().display().to_string(),
        model_loaded: state.cache.is_loaded(),
        timestamp: chrono::Utc::now().timestamp(),
    })
}

/// Run the handler off the async workers; a panic inside it becomes a failure outcome.
async fn predict(state: Arc<AppState>, inputs: FeatureVector) -> PredictionOutcome {
    let result = tokio::task::spawn_blocking(move || {
        run_with_cache(&state.cache, &inputs, &state.options)
    })
    .await;
    match result {
        Ok(outcome) => outcome,
        Err(e) => {
            log::error!("Prediction task aborted: {}", e);
            let e = anyhow::Error::new(e).context("Prediction task aborted");
            PredictionOutcome::failure(None, &e)
        }
    }
}
