//! dstage-classifiers: dementia stage classification with tree attributions.
//!
//! This crate loads a pretrained XGBoost model from its JSON dump, evaluates it
//! natively, explains each prediction with exact TreeSHAP and renders the
//! result (an interactive force plot and a static waterfall) into a single
//! dashboard page. The [`handler`] module ties these steps into one failure
//! boundary used by both the web dashboard and the command line tools.
pub mod config;
pub mod error;
pub mod explain;
pub mod features;
pub mod handler;
pub mod models;
pub mod report;

pub use error::{ModelError, ModelResult};
pub use features::{FeatureVector, FEATURE_SPECS};
pub use handler::{run_prediction, run_with_cache, PredictionOutcome};
