//! Process-wide classifier handle, loaded on first use.
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::info;
use once_cell::sync::OnceCell;

use crate::error::ModelResult;
use crate::models::xgboost::XGBoostClassifier;

/// Lazily loads the classifier artifact once and hands out shared references.
///
/// A failed load is not remembered, so the next caller retries it. Once a
/// load succeeds the classifier is never reloaded or mutated.
pub struct ModelCache {
    path: PathBuf,
    cell: OnceCell<Arc<XGBoostClassifier>>,
}

impl ModelCache {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            cell: OnceCell::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }

    pub fn get_or_load(&self) -> ModelResult<Arc<XGBoostClassifier>> {
        self.cell
            .get_or_try_init(|| -> ModelResult<Arc<XGBoostClassifier>> {
                let start = std::time::Instant::now();
                let model = XGBoostClassifier::from_json_file(&self.path)?;
                info!(
                    "Loaded classifier from {} in {:?}",
                    self.path.display(),
                    start.elapsed()
                );
                Ok(Arc::new(model))
            })
            .cloned()
    }
}
