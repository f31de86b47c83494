//! One-shot prediction from the command line.
use anyhow::{Context, Result};
use log::info;
use serde::Serialize;
use std::path::{Path, PathBuf};

use dstage_classifiers::features::FeatureVector;
use dstage_classifiers::handler::{run_with_cache, PredictionOutcome};
use dstage_classifiers::models::ModelCache;
use dstage_classifiers::report::render_page;

use crate::config::DashboardConfig;
use crate::util::{write_attribution_table, write_bytes_to_file};

/// Where the optional artifacts of a prediction go.
#[derive(Debug, Clone, Default)]
pub struct PredictOutputs {
    pub report: Option<PathBuf>,
    pub attributions: Option<PathBuf>,
}

/// Summary printed to stdout as JSON.
#[derive(Debug, Serialize)]
pub struct PredictSummary {
    pub generated_at: String,
    pub model_path: String,
    #[serde(flatten)]
    pub outcome: PredictionOutcome,
}

/// Run the handler once and write the requested artifacts.
///
/// A failed prediction is not an `Err`: it is carried in the summary and the
/// report shows the error banner. `Err` means an artifact could not be written.
pub fn run_predict(
    config: &DashboardConfig,
    features: &FeatureVector,
    outputs: &PredictOutputs,
) -> Result<PredictSummary> {
    let cache = ModelCache::new(&config.model_path);
    let options = config.render_options();
    let outcome = run_with_cache(&cache, features, &options);

    if let Some(report_path) = &outputs.report {
        write_report(report_path, features, &outcome, config)?;
    }

    if let Some(table_path) = &outputs.attributions {
        match &outcome {
            PredictionOutcome::Success(report) => {
                write_attribution_table(&report.attribution, table_path)?;
                info!("Wrote attribution table to {:?}", table_path);
            }
            PredictionOutcome::Failure { .. } => {
                log::warn!("No attributions to write to {:?}", table_path);
            }
        }
    }

    Ok(PredictSummary {
        generated_at: chrono::Local::now().to_rfc3339(),
        model_path: config.model_path.clone(),
        outcome,
    })
}

fn write_report(
    path: &Path,
    features: &FeatureVector,
    outcome: &PredictionOutcome,
    config: &DashboardConfig,
) -> Result<()> {
    let markup = render_page(features, Some(outcome), &config.render_options(), None);
    write_bytes_to_file(path, markup.into_string().as_bytes())
        .with_context(|| format!("Failed to write report: {:?}", path))?;
    info!("Wrote report to {:?}", path);
    Ok(())
}
