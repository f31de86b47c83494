pub mod attribution;
pub mod tree_shap;

pub use attribution::Attribution;
pub use tree_shap::{ShapValues, TreeExplainer};
