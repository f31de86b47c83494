pub mod cache;
pub mod classifier_trait;
pub mod forest;
pub mod xgboost;

pub use cache::ModelCache;
pub use classifier_trait::{ClassifierModel, Prediction};
pub use xgboost::XGBoostClassifier;
