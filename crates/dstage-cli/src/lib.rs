//! Command line tools and the web dashboard for dementia stage prediction.
pub mod config;
pub mod dashboard;
pub mod predict;
pub mod util;
