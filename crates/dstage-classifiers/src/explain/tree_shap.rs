//! Exact path-dependent TreeSHAP.
//!
//! Implements Algorithm 2 of Lundberg et al. (2020), "From local explanations
//! to global understanding with explainable AI for trees". Node covers are the
//! background distribution, so the contributions of one row plus the expected
//! margin add up to the row's margin for every output group.
use ndarray::Array2;

use crate::error::{ModelError, ModelResult};
use crate::models::forest::{Forest, Node, Tree};

/// One element of the unique feature path from the root to the current node.
#[derive(Debug, Clone, Copy)]
struct PathElement {
    /// `None` for the root placeholder.
    feature: Option<usize>,
    zero_fraction: f64,
    one_fraction: f64,
    pweight: f64,
}

/// SHAP values for one row: `values[[feature, output]]` plus a base value per output.
#[derive(Debug, Clone)]
pub struct ShapValues {
    pub values: Array2<f64>,
    pub base_values: Vec<f64>,
}

impl ShapValues {
    pub fn n_features(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_outputs(&self) -> usize {
        self.values.ncols()
    }

    /// Base value plus all contributions of one output.
    pub fn output_value(&self, output: usize) -> f64 {
        self.base_values[output] + self.values.column(output).sum()
    }
}

/// TreeSHAP explainer bound to a forest.
pub struct TreeExplainer<'a> {
    forest: &'a Forest,
    expected_value: Vec<f64>,
}

impl<'a> TreeExplainer<'a> {
    pub fn new(forest: &'a Forest) -> Self {
        let expected_value = forest.expected_margins();
        Self {
            forest,
            expected_value,
        }
    }

    /// Expected margin per output group.
    pub fn expected_value(&self) -> &[f64] {
        &self.expected_value
    }

    /// Per-feature contributions of `row` to every output group's margin.
    pub fn shap_values(&self, row: &[f64]) -> ModelResult<ShapValues> {
        let n_features = self.forest.n_features();
        if row.len() != n_features {
            return Err(ModelError::FeatureCount {
                expected: n_features,
                found: row.len(),
            });
        }
        let mut values = Array2::<f64>::zeros((n_features, self.forest.n_groups()));
        let mut phi = vec![0.0; n_features];
        for (tree, group) in self.forest.trees().iter().zip(self.forest.tree_groups()) {
            phi.iter_mut().for_each(|p| *p = 0.0);
            let path = Vec::with_capacity(tree.max_depth() + 1);
            recurse(tree, row, &mut phi, 0, path, 1.0, 1.0, None);
            for (f, contribution) in phi.iter().enumerate() {
                values[[f, *group]] += contribution;
            }
        }
        Ok(ShapValues {
            values,
            base_values: self.expected_value.clone(),
        })
    }
}

#[allow(clippy::too_many_arguments)]
fn recurse(
    tree: &Tree,
    row: &[f64],
    phi: &mut [f64],
    node: usize,
    mut path: Vec<PathElement>,
    zero_fraction: f64,
    one_fraction: f64,
    feature: Option<usize>,
) {
    extend(&mut path, zero_fraction, one_fraction, feature);

    let (split_feature, left, right) = match tree.node(node) {
        Node::Leaf { value, .. } => {
            for i in 1..path.len() {
                let weight = unwound_sum(&path, i);
                let el = path[i];
                if let Some(f) = el.feature {
                    phi[f] += weight * (el.one_fraction - el.zero_fraction) * value;
                }
            }
            return;
        }
        Node::Split {
            feature,
            left,
            right,
            ..
        } => (*feature, *left, *right),
    };

    let hot = tree.next_node(node, row).unwrap_or(left);
    let cold = if hot == left { right } else { left };
    let total = tree.node(left).cover() + tree.node(right).cover();
    let hot_zero_fraction = tree.node(hot).cover() / total;
    let cold_zero_fraction = tree.node(cold).cover() / total;

    // a feature already on the path is split again: undo its earlier extension
    let mut incoming_zero = 1.0;
    let mut incoming_one = 1.0;
    if let Some(k) = path.iter().position(|e| e.feature == Some(split_feature)) {
        incoming_zero = path[k].zero_fraction;
        incoming_one = path[k].one_fraction;
        unwind(&mut path, k);
    }

    recurse(
        tree,
        row,
        phi,
        hot,
        path.clone(),
        hot_zero_fraction * incoming_zero,
        incoming_one,
        Some(split_feature),
    );
    recurse(
        tree,
        row,
        phi,
        cold,
        path,
        cold_zero_fraction * incoming_zero,
        0.0,
        Some(split_feature),
    );
}

fn extend(path: &mut Vec<PathElement>, zero_fraction: f64, one_fraction: f64, feature: Option<usize>) {
    let depth = path.len();
    path.push(PathElement {
        feature,
        zero_fraction,
        one_fraction,
        pweight: if depth == 0 { 1.0 } else { 0.0 },
    });
    let denom = (depth + 1) as f64;
    for i in (0..depth).rev() {
        path[i + 1].pweight += one_fraction * path[i].pweight * (i + 1) as f64 / denom;
        path[i].pweight = zero_fraction * path[i].pweight * (depth - i) as f64 / denom;
    }
}

fn unwind(path: &mut Vec<PathElement>, index: usize) {
    let depth = path.len() - 1;
    let one_fraction = path[index].one_fraction;
    let zero_fraction = path[index].zero_fraction;
    let denom = (depth + 1) as f64;
    let mut next_one_portion = path[depth].pweight;

    for i in (0..depth).rev() {
        if one_fraction != 0.0 {
            let tmp = path[i].pweight;
            path[i].pweight = next_one_portion * denom / ((i + 1) as f64 * one_fraction);
            next_one_portion = tmp - path[i].pweight * zero_fraction * (depth - i) as f64 / denom;
        } else {
            path[i].pweight = path[i].pweight * denom / (zero_fraction * (depth - i) as f64);
        }
    }

    for i in index..depth {
        path[i].feature = path[i + 1].feature;
        path[i].zero_fraction = path[i + 1].zero_fraction;
        path[i].one_fraction = path[i + 1].one_fraction;
    }
    path.truncate(depth);
}

fn unwound_sum(path: &[PathElement], index: usize) -> f64 {
    let depth = path.len() - 1;
    let one_fraction = path[index].one_fraction;
    let zero_fraction = path[index].zero_fraction;
    let denom = (depth + 1) as f64;
    let mut next_one_portion = path[depth].pweight;
    let mut total = 0.0;

    for i in (0..depth).rev() {
        if one_fraction != 0.0 {
            let tmp = next_one_portion * denom / ((i + 1) as f64 * one_fraction);
            total += tmp;
            next_one_portion = path[i].pweight - tmp * zero_fraction * (depth - i) as f64 / denom;
        } else if zero_fraction != 0.0 {
            total += path[i].pweight / zero_fraction / ((depth - i) as f64 / denom);
        }
    }
    total
}
