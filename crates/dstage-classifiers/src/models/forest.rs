//! In-memory representation of a boosted tree ensemble.
use serde::Serialize;

use crate::error::{ModelError, ModelResult};

/// A single node of a regression tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Node {
    Split {
        feature: usize,
        threshold: f32,
        default_left: bool,
        left: usize,
        right: usize,
        cover: f64,
    },
    Leaf {
        value: f64,
        cover: f64,
    },
}

impl Node {
    pub fn cover(&self) -> f64 {
        match self {
            Node::Split { cover, .. } | Node::Leaf { cover, .. } => *cover,
        }
    }
}

/// Regression tree stored as a flat node array; node 0 is the root.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    /// Build a tree, checking that child indices are in bounds and that every
    /// split has positive cover on both sides.
    pub fn new(nodes: Vec<Node>) -> Result<Self, String> {
        if nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        for (i, node) in nodes.iter().enumerate() {
            if let Node::Split { left, right, .. } = node {
                if *left >= nodes.len() || *right >= nodes.len() {
                    return Err(format!("node {} points outside the tree", i));
                }
                if *left <= i || *right <= i {
                    return Err(format!("node {} has a child that is not below it", i));
                }
                if nodes[*left].cover() + nodes[*right].cover() <= 0.0 {
                    return Err(format!("node {} has no cover below it", i));
                }
            }
        }
        Ok(Self { nodes })
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, idx: usize) -> &Node {
        &self.nodes[idx]
    }

    /// Index of the child `row` is routed to from split node `idx`.
    pub fn next_node(&self, idx: usize, row: &[f64]) -> Option<usize> {
        match &self.nodes[idx] {
            Node::Leaf { .. } => None,
            Node::Split {
                feature,
                threshold,
                default_left,
                left,
                right,
                ..
            } => {
                let value = row.get(*feature).copied().unwrap_or(f64::NAN);
                let go_left = if value.is_nan() {
                    *default_left
                } else {
                    (value as f32) < *threshold
                };
                Some(if go_left { *left } else { *right })
            }
        }
    }

    /// Leaf value reached by `row`.
    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match self.next_node(idx, row) {
                Some(next) => idx = next,
                None => match &self.nodes[idx] {
                    Node::Leaf { value, .. } => return *value,
                    Node::Split { .. } => unreachable!("next_node returns None only for leaves"),
                },
            }
        }
    }

    /// Cover-weighted mean leaf value, i.e. the tree's expected output.
    pub fn expected_value(&self) -> f64 {
        self.expected_value_at(0)
    }

    fn expected_value_at(&self, idx: usize) -> f64 {
        match &self.nodes[idx] {
            Node::Leaf { value, .. } => *value,
            Node::Split { left, right, .. } => {
                let l = self.nodes[*left].cover();
                let r = self.nodes[*right].cover();
                (l * self.expected_value_at(*left) + r * self.expected_value_at(*right)) / (l + r)
            }
        }
    }

    pub fn max_depth(&self) -> usize {
        self.depth_at(0)
    }

    fn depth_at(&self, idx: usize) -> usize {
        match &self.nodes[idx] {
            Node::Leaf { .. } => 1,
            Node::Split { left, right, .. } => 1 + self.depth_at(*left).max(self.depth_at(*right)),
        }
    }

    /// Largest feature index used by any split.
    pub fn max_feature(&self) -> Option<usize> {
        self.nodes
            .iter()
            .filter_map(|n| match n {
                Node::Split { feature, .. } => Some(*feature),
                Node::Leaf { .. } => None,
            })
            .max()
    }
}

/// How raw margins are turned into class probabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Objective {
    /// One output group, sigmoid link, base score stored as a probability.
    BinaryLogistic,
    /// One output group, sigmoid link, base score stored as a margin.
    BinaryLogitRaw,
    /// One output group per class, softmax link.
    MultiSoftprob,
}

impl Objective {
    pub fn from_name(name: &str) -> ModelResult<Self> {
        match name {
            "binary:logistic" => Ok(Objective::BinaryLogistic),
            "binary:logitraw" => Ok(Objective::BinaryLogitRaw),
            "multi:softprob" | "multi:softmax" => Ok(Objective::MultiSoftprob),
            other => Err(ModelError::UnsupportedObjective(other.to_string())),
        }
    }

    /// Convert a stored base score into margin space.
    pub fn base_margin(&self, base_score: f64) -> f64 {
        match self {
            Objective::BinaryLogistic => {
                let p = base_score.clamp(1e-16, 1.0 - 1e-16);
                (p / (1.0 - p)).ln()
            }
            Objective::BinaryLogitRaw | Objective::MultiSoftprob => base_score,
        }
    }

    /// Class probabilities for one row of margins.
    pub fn probabilities(&self, margins: &[f64]) -> Vec<f64> {
        match self {
            Objective::BinaryLogistic | Objective::BinaryLogitRaw => {
                let p = sigmoid(margins[0]);
                vec![1.0 - p, p]
            }
            Objective::MultiSoftprob => softmax(margins),
        }
    }
}

pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

pub fn softmax(margins: &[f64]) -> Vec<f64> {
    let max = margins.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = margins.iter().map(|m| (m - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.iter().map(|e| e / total).collect()
}

/// Boosted ensemble: trees assigned to output groups plus a per-group base margin.
#[derive(Debug, Clone, Serialize)]
pub struct Forest {
    trees: Vec<Tree>,
    tree_groups: Vec<usize>,
    base_margin: Vec<f64>,
    objective: Objective,
    n_features: usize,
}

impl Forest {
    pub fn new(
        trees: Vec<Tree>,
        tree_groups: Vec<usize>,
        base_margin: Vec<f64>,
        objective: Objective,
        n_features: usize,
    ) -> ModelResult<Self> {
        if trees.len() != tree_groups.len() {
            return Err(ModelError::MalformedTree {
                tree: trees.len().min(tree_groups.len()),
                reason: format!(
                    "{} trees but {} group assignments",
                    trees.len(),
                    tree_groups.len()
                ),
            });
        }
        for (i, group) in tree_groups.iter().enumerate() {
            if *group >= base_margin.len() {
                return Err(ModelError::MalformedTree {
                    tree: i,
                    reason: format!(
                        "assigned to output group {} of {}",
                        group,
                        base_margin.len()
                    ),
                });
            }
        }
        for (i, tree) in trees.iter().enumerate() {
            if let Some(f) = tree.max_feature() {
                if f >= n_features {
                    return Err(ModelError::MalformedTree {
                        tree: i,
                        reason: format!("splits on feature {} of {}", f, n_features),
                    });
                }
            }
        }
        Ok(Self {
            trees,
            tree_groups,
            base_margin,
            objective,
            n_features,
        })
    }

    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    pub fn tree_groups(&self) -> &[usize] {
        &self.tree_groups
    }

    pub fn n_groups(&self) -> usize {
        self.base_margin.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn objective(&self) -> Objective {
        self.objective
    }

    pub fn base_margin(&self) -> &[f64] {
        &self.base_margin
    }

    /// Number of classes the model distinguishes.
    pub fn n_classes(&self) -> usize {
        match self.objective {
            Objective::BinaryLogistic | Objective::BinaryLogitRaw => 2,
            Objective::MultiSoftprob => self.n_groups(),
        }
    }

    /// Raw (pre-link) output per group for one row.
    pub fn margins(&self, row: &[f64]) -> ModelResult<Vec<f64>> {
        if row.len() != self.n_features {
            return Err(ModelError::FeatureCount {
                expected: self.n_features,
                found: row.len(),
            });
        }
        let mut margins = self.base_margin.clone();
        for (tree, group) in self.trees.iter().zip(self.tree_groups.iter()) {
            margins[*group] += tree.predict(row);
        }
        Ok(margins)
    }

    pub fn predict_proba(&self, row: &[f64]) -> ModelResult<Vec<f64>> {
        let margins = self.margins(row)?;
        Ok(self.objective.probabilities(&margins))
    }

    /// Expected margin per group under the cover distribution of the trees.
    pub fn expected_margins(&self) -> Vec<f64> {
        let mut expected = self.base_margin.clone();
        for (tree, group) in self.trees.iter().zip(self.tree_groups.iter()) {
            expected[*group] += tree.expected_value();
        }
        expected
    }
}

/// Index of the predicted class: `p > 0.5` for two classes, first argmax otherwise.
pub fn predicted_class(probabilities: &[f64]) -> usize {
    if probabilities.len() == 2 {
        return usize::from(probabilities[1] > 0.5);
    }
    let mut best = 0;
    for (i, p) in probabilities.iter().enumerate() {
        if *p > probabilities[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stump() -> Tree {
        Tree::new(vec![
            Node::Split {
                feature: 0,
                threshold: 0.5,
                default_left: true,
                left: 1,
                right: 2,
                cover: 100.0,
            },
            Node::Leaf { value: -1.0, cover: 25.0 },
            Node::Leaf { value: 1.0, cover: 75.0 },
        ])
        .unwrap()
    }

    #[test]
    fn routes_by_threshold_and_missing_default() {
        let tree = stump();
        assert_eq!(tree.predict(&[0.3]), -1.0);
        assert_eq!(tree.predict(&[0.5]), 1.0);
        assert_eq!(tree.predict(&[f64::NAN]), -1.0);
    }

    #[test]
    fn expected_value_is_cover_weighted() {
        let tree = stump();
        assert!((tree.expected_value() - 0.5).abs() < 1e-12);
        assert_eq!(tree.max_depth(), 2);
    }

    #[test]
    fn rejects_child_pointing_upwards() {
        let nodes = vec![
            Node::Split {
                feature: 0,
                threshold: 0.5,
                default_left: true,
                left: 0,
                right: 1,
                cover: 1.0,
            },
            Node::Leaf { value: 0.0, cover: 1.0 },
        ];
        assert!(Tree::new(nodes).is_err());
    }

    #[test]
    fn binary_probabilities_sum_to_one() {
        let probs = Objective::BinaryLogistic.probabilities(&[0.7]);
        assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert_eq!(predicted_class(&probs), 1);
    }

    #[test]
    fn logistic_base_margin_is_logit() {
        assert!(Objective::BinaryLogistic.base_margin(0.5).abs() < 1e-12);
        assert_eq!(Objective::MultiSoftprob.base_margin(0.5), 0.5);
    }

    #[test]
    fn forest_checks_row_width() {
        let forest = Forest::new(vec![stump()], vec![0], vec![0.0], Objective::BinaryLogitRaw, 1).unwrap();
        assert!(forest.margins(&[0.1, 0.2]).is_err());
        assert_eq!(forest.margins(&[0.9]).unwrap(), vec![1.0]);
    }

    #[test]
    fn argmax_prefers_first_on_ties() {
        assert_eq!(predicted_class(&[0.4, 0.4, 0.2]), 0);
        assert_eq!(predicted_class(&[0.2, 0.3, 0.5]), 2);
    }
}
