//! Loader for models saved with XGBoost's `save_model("*.json")`.
//!
//! Only the fields needed for inference and TreeSHAP are read; everything else
//! in the artifact is ignored. Models from XGBoost 1.x through 3.x are accepted
//! (the later versions store `base_score` as a bracketed list and may encode
//! `default_left` as booleans).
use std::path::Path;

use log::{debug, info};
use serde::Deserialize;

use crate::error::{ModelError, ModelResult};
use crate::explain::{Attribution, TreeExplainer};
use crate::features::{feature_names, N_FEATURES};
use crate::models::classifier_trait::{ClassifierModel, Prediction};
use crate::models::forest::{predicted_class, Forest, Node, Objective, Tree};

#[derive(Debug, Deserialize)]
struct ModelFile {
    learner: Learner,
    #[serde(default)]
    version: Vec<u32>,
}

#[derive(Debug, Deserialize)]
struct Learner {
    #[serde(default)]
    feature_names: Vec<String>,
    gradient_booster: GradientBooster,
    learner_model_param: LearnerModelParam,
    objective: ObjectiveSection,
}

#[derive(Debug, Deserialize)]
struct GradientBooster {
    #[serde(default)]
    name: String,
    model: GbTreeModel,
}

#[derive(Debug, Deserialize)]
struct GbTreeModel {
    trees: Vec<TreeSection>,
    tree_info: Vec<usize>,
}

#[derive(Debug, Deserialize)]
struct LearnerModelParam {
    base_score: String,
    #[serde(default)]
    num_class: String,
    #[serde(default)]
    num_feature: String,
}

#[derive(Debug, Deserialize)]
struct ObjectiveSection {
    name: String,
}

#[derive(Debug, Deserialize)]
struct TreeSection {
    left_children: Vec<i64>,
    right_children: Vec<i64>,
    split_indices: Vec<i64>,
    split_conditions: Vec<f64>,
    default_left: Vec<Flag>,
    sum_hessian: Vec<f64>,
    /// 0 for numerical splits, 1 for categorical ones (absent before 1.6).
    #[serde(default)]
    split_type: Vec<i64>,
}

/// `default_left` is written as 0/1 by older releases and as booleans by newer ones.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(i64),
}

impl Flag {
    fn as_bool(&self) -> bool {
        match self {
            Flag::Bool(b) => *b,
            Flag::Int(i) => *i != 0,
        }
    }
}

/// Parsed artifact: the ensemble plus the declared feature names.
#[derive(Debug, Clone)]
pub struct XgbModel {
    pub forest: Forest,
    pub feature_names: Vec<String>,
    pub version: Vec<u32>,
}

/// Read and parse an XGBoost JSON model file.
pub fn load_xgboost_json<P: AsRef<Path>>(path: P) -> ModelResult<XgbModel> {
    let path = path.as_ref();
    info!("Loading XGBoost model from {}", path.display());
    let content = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_xgboost_json(&content)
}

/// Parse the JSON text of an XGBoost model.
pub fn parse_xgboost_json(content: &str) -> ModelResult<XgbModel> {
    let file: ModelFile = serde_json::from_str(content)?;
    let learner = file.learner;

    if !learner.gradient_booster.name.is_empty() && learner.gradient_booster.name != "gbtree" {
        return Err(ModelError::UnsupportedObjective(format!(
            "booster '{}'",
            learner.gradient_booster.name
        )));
    }

    let objective = Objective::from_name(&learner.objective.name)?;
    let base_score = parse_base_score(&learner.learner_model_param.base_score)?;
    let num_class = parse_count(&learner.learner_model_param.num_class);
    let n_groups = match objective {
        Objective::MultiSoftprob => num_class.max(1),
        Objective::BinaryLogistic | Objective::BinaryLogitRaw => 1,
    };
    let base_margin = (0..n_groups)
        .map(|g| {
            let score = base_score.get(g).or_else(|| base_score.first()).copied().unwrap_or(0.5);
            objective.base_margin(score)
        })
        .collect::<Vec<_>>();

    let model = learner.gradient_booster.model;
    let mut trees = Vec::with_capacity(model.trees.len());
    for (i, section) in model.trees.into_iter().enumerate() {
        trees.push(convert_tree(i, section)?);
    }

    let declared_features = parse_count(&learner.learner_model_param.num_feature);
    let n_features = if declared_features > 0 {
        declared_features
    } else {
        trees
            .iter()
            .filter_map(|t| t.max_feature())
            .max()
            .map(|f| f + 1)
            .unwrap_or(0)
    };

    debug!(
        "XGBoost model: version={:?}, objective={:?}, trees={}, groups={}, features={}",
        file.version,
        objective,
        trees.len(),
        n_groups,
        n_features
    );

    let forest = Forest::new(trees, model.tree_info, base_margin, objective, n_features)?;
    Ok(XgbModel {
        forest,
        feature_names: learner.feature_names,
        version: file.version,
    })
}

fn parse_count(s: &str) -> usize {
    s.trim().parse::<usize>().unwrap_or(0)
}

/// `"5E-1"` or `"[5E-1]"` or `"[5E-1,5E-1]"`.
fn parse_base_score(raw: &str) -> ModelResult<Vec<f64>> {
    let inner = raw.trim().trim_start_matches('[').trim_end_matches(']');
    let values = inner
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| ModelError::InvalidBaseScore(raw.to_string()))?;
    if values.is_empty() {
        return Err(ModelError::InvalidBaseScore(raw.to_string()));
    }
    Ok(values)
}

fn convert_tree(idx: usize, section: TreeSection) -> ModelResult<Tree> {
    let n = section.left_children.len();
    let malformed = |reason: String| ModelError::MalformedTree { tree: idx, reason };

    let lengths = [
        ("right_children", section.right_children.len()),
        ("split_indices", section.split_indices.len()),
        ("split_conditions", section.split_conditions.len()),
        ("default_left", section.default_left.len()),
        ("sum_hessian", section.sum_hessian.len()),
    ];
    for (name, len) in lengths {
        if len != n {
            return Err(malformed(format!(
                "{} has {} entries, expected {}",
                name, len, n
            )));
        }
    }

    if let Some(i) = section.split_type.iter().position(|&t| t != 0) {
        return Err(malformed(format!(
            "node {} is a categorical split, only numerical splits are supported",
            i
        )));
    }

    let mut nodes = Vec::with_capacity(n);
    for i in 0..n {
        let left = section.left_children[i];
        let right = section.right_children[i];
        let cover = section.sum_hessian[i];
        if left < 0 {
            // leaves store their weight in split_conditions
            nodes.push(Node::Leaf {
                value: section.split_conditions[i],
                cover,
            });
            continue;
        }
        if right < 0 || section.split_indices[i] < 0 {
            return Err(malformed(format!("node {} is only half a split", i)));
        }
        nodes.push(Node::Split {
            feature: section.split_indices[i] as usize,
            threshold: section.split_conditions[i] as f32,
            default_left: section.default_left[i].as_bool(),
            left: left as usize,
            right: right as usize,
            cover,
        });
    }
    Tree::new(nodes).map_err(malformed)
}

/// Pretrained XGBoost classifier over the four dashboard features.
pub struct XGBoostClassifier {
    forest: Forest,
    feature_names: Vec<String>,
}

impl XGBoostClassifier {
    /// Load a model and check it was trained on the dashboard's features, in order.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ModelResult<Self> {
        Self::from_model(load_xgboost_json(path)?)
    }

    pub fn from_json_str(content: &str) -> ModelResult<Self> {
        Self::from_model(parse_xgboost_json(content)?)
    }

    pub fn from_model(model: XgbModel) -> ModelResult<Self> {
        let expected = feature_names();
        if model.forest.n_features() != N_FEATURES {
            return Err(ModelError::FeatureCount {
                expected: N_FEATURES,
                found: model.forest.n_features(),
            });
        }
        if !model.feature_names.is_empty() && model.feature_names != expected {
            return Err(ModelError::FeatureOrder {
                expected,
                found: model.feature_names,
            });
        }
        info!(
            "XGBoost classifier ready: {} trees, {} classes",
            model.forest.trees().len(),
            model.forest.n_classes()
        );
        Ok(Self {
            forest: model.forest,
            feature_names: expected,
        })
    }

    pub fn forest(&self) -> &Forest {
        &self.forest
    }
}

impl ClassifierModel for XGBoostClassifier {
    fn predict(&self, row: &[f64]) -> ModelResult<Prediction> {
        let probabilities = self.forest.predict_proba(row)?;
        let class_index = predicted_class(&probabilities);
        debug!("[xgb.predict] probabilities = {:?}", probabilities);
        Ok(Prediction {
            class_index,
            confidence: probabilities[class_index],
            probabilities,
        })
    }

    fn explain(&self, row: &[f64], class_index: usize) -> ModelResult<Attribution> {
        let shap = TreeExplainer::new(&self.forest).shap_values(row)?;
        Attribution::select(&shap, class_index, self.feature_names.clone(), row.to_vec())
    }

    fn raw_output(&self, row: &[f64]) -> ModelResult<Vec<f64>> {
        self.forest.margins(row)
    }

    fn name(&self) -> &str {
        "xgboost"
    }
}
