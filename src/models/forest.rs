//! Native runtime for exported tree ensembles
//!
//! The artifact is JSON: a list of binary trees whose leaves hold per-class
//! sample weights. A sample goes left when `x[feature] <= threshold`.
//!
//! Probabilities follow the usual forest rule: each tree votes with its leaf's
//! normalized class weights and the votes are averaged. Feature importances
//! are the mean decrease in Gini impurity, computed once at load time.

use crate::models::classifier::{argmax_rows, check_batch, Classifier};
use anyhow::{bail, ensure, Context, Result};
use ndarray::{Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Internal decision node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Split {
    /// Index of the feature to split on
    pub feature: usize,
    /// Samples with `x[feature] <= threshold` go left
    pub threshold: f64,
    pub left: Box<TreeNode>,
    pub right: Box<TreeNode>,
}

/// Terminal node holding the training class weights that reached it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Leaf {
    pub value: Vec<f64>,
}

/// A node in a decision tree
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeNode {
    Split(Split),
    Leaf(Leaf),
}

/// One tree of the ensemble
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    pub root: TreeNode,
}

impl TreeNode {
    /// Walk from this node to the leaf a sample lands in
    fn leaf_for(&self, sample: ArrayView1<'_, f64>) -> &Leaf {
        let mut node = self;
        loop {
            match node {
                TreeNode::Leaf(leaf) => return leaf,
                TreeNode::Split(split) => {
                    node = if sample[split.feature] <= split.threshold {
                        &*split.left
                    } else {
                        &*split.right
                    };
                }
            }
        }
    }

    fn validate(&self, n_features: usize, n_classes: usize, path: &str) -> Result<()> {
        match self {
            TreeNode::Split(split) => {
                ensure!(
                    split.feature < n_features,
                    "{path}: split feature {} is out of range for {n_features} features",
                    split.feature
                );
                ensure!(
                    split.threshold.is_finite(),
                    "{path}: split threshold must be finite"
                );
                split
                    .left
                    .validate(n_features, n_classes, &format!("{path}.left"))?;
                split
                    .right
                    .validate(n_features, n_classes, &format!("{path}.right"))
            }
            TreeNode::Leaf(leaf) => {
                ensure!(
                    leaf.value.len() == n_classes,
                    "{path}: leaf has {} class weights, expected {n_classes}",
                    leaf.value.len()
                );
                ensure!(
                    leaf.value.iter().all(|w| w.is_finite() && *w >= 0.0),
                    "{path}: leaf weights must be finite and non-negative"
                );
                ensure!(
                    leaf.value.iter().sum::<f64>() > 0.0,
                    "{path}: leaf weights must not all be zero"
                );
                Ok(())
            }
        }
    }

    /// Add this subtree's impurity decreases to `importances` and return the
    /// class weights of the samples that reached it.
    fn accumulate_importances(&self, importances: &mut [f64]) -> Vec<f64> {
        match self {
            TreeNode::Leaf(leaf) => leaf.value.clone(),
            TreeNode::Split(split) => {
                let left = split.left.accumulate_importances(importances);
                let right = split.right.accumulate_importances(importances);
                let node: Vec<f64> = left.iter().zip(&right).map(|(l, r)| l + r).collect();

                importances[split.feature] +=
                    weighted_gini(&node) - weighted_gini(&left) - weighted_gini(&right);
                node
            }
        }
    }

    fn is_leaf(&self) -> bool {
        matches!(self, TreeNode::Leaf(_))
    }
}

/// Total weight times Gini impurity of a class weight vector
fn weighted_gini(weights: &[f64]) -> f64 {
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    let purity: f64 = weights.iter().map(|w| (w / total).powi(2)).sum();
    total * (1.0 - purity)
}

fn default_model_type() -> String {
    "RandomForestClassifier".to_string()
}

/// Tree-ensemble classifier evaluated natively
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestModel {
    #[serde(default = "default_model_type")]
    model_type: String,
    n_features: usize,
    n_classes: usize,
    trees: Vec<DecisionTree>,
    #[serde(skip)]
    importances: Vec<f64>,
}

impl ForestModel {
    /// Build a model from trees, validating them and computing importances
    pub fn new(
        model_type: impl Into<String>,
        n_features: usize,
        n_classes: usize,
        trees: Vec<DecisionTree>,
    ) -> Result<Self> {
        let mut model = Self {
            model_type: model_type.into(),
            n_features,
            n_classes,
            trees,
            importances: Vec::new(),
        };
        model.prepare()?;
        Ok(model)
    }

    /// Parse a JSON artifact
    pub fn from_json_str(json: &str) -> Result<Self> {
        let mut model: ForestModel =
            serde_json::from_str(json).context("Failed to parse tree ensemble artifact")?;
        model.prepare()?;
        Ok(model)
    }

    /// Load a JSON artifact from disk
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read model from {}", path.display()))?;
        Self::from_json_str(&json).with_context(|| format!("Invalid model file {}", path.display()))
    }

    fn prepare(&mut self) -> Result<()> {
        if self.trees.is_empty() {
            bail!("Tree ensemble has no estimators");
        }
        ensure!(self.n_features > 0, "Tree ensemble must have at least one feature");
        ensure!(self.n_classes > 0, "Tree ensemble must have at least one class");

        for (idx, tree) in self.trees.iter().enumerate() {
            tree.root
                .validate(self.n_features, self.n_classes, &format!("trees[{idx}]"))?;
        }

        self.importances = self.compute_importances();
        debug!(
            model_type = %self.model_type,
            n_estimators = self.trees.len(),
            importances = ?self.importances,
            "Tree ensemble prepared"
        );
        Ok(())
    }

    /// Mean decrease in impurity: per-tree normalized, averaged over trees
    /// that split at least once, then normalized to sum to 1.
    fn compute_importances(&self) -> Vec<f64> {
        let mut total = vec![0.0; self.n_features];
        let mut contributing = 0usize;

        for tree in &self.trees {
            if tree.root.is_leaf() {
                continue;
            }
            let mut tree_importances = vec![0.0; self.n_features];
            tree.root.accumulate_importances(&mut tree_importances);

            let tree_sum: f64 = tree_importances.iter().sum();
            if tree_sum > 0.0 {
                for (acc, importance) in total.iter_mut().zip(&tree_importances) {
                    *acc += importance / tree_sum;
                }
            }
            contributing += 1;
        }

        if contributing > 0 {
            for importance in &mut total {
                *importance /= contributing as f64;
            }
        }

        let sum: f64 = total.iter().sum();
        if sum > 0.0 {
            for importance in &mut total {
                *importance /= sum;
            }
        }

        total
    }
}

impl Classifier for ForestModel {
    fn model_type(&self) -> &str {
        &self.model_type
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn n_estimators(&self) -> usize {
        self.trees.len()
    }

    fn feature_importances(&self) -> &[f64] {
        &self.importances
    }

    fn predict(&self, batch: ArrayView2<'_, f64>) -> Result<Vec<usize>> {
        let proba = self.predict_proba(batch)?;
        Ok(argmax_rows(&proba))
    }

    fn predict_proba(&self, batch: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        check_batch(&batch, self.n_features)?;

        let mut proba = Array2::<f64>::zeros((batch.nrows(), self.n_classes));
        for (sample, mut out) in batch.rows().into_iter().zip(proba.rows_mut()) {
            for tree in &self.trees {
                let leaf = tree.root.leaf_for(sample);
                let weight: f64 = leaf.value.iter().sum();
                for (p, w) in out.iter_mut().zip(&leaf.value) {
                    *p += w / weight;
                }
            }
        }

        let n_trees = self.trees.len() as f64;
        proba.mapv_inplace(|p| p / n_trees);
        Ok(proba)
    }

    fn predict_with_proba(&self, batch: ArrayView2<'_, f64>) -> Result<(Vec<usize>, Array2<f64>)> {
        let proba = self.predict_proba(batch)?;
        Ok((argmax_rows(&proba), proba))
    }
}

/// The shipped Iris artifact, for tests across the crate
#[cfg(test)]
pub(crate) const IRIS_FOREST_JSON: &str = include_str!("../../models/iris_forest.json");

#[cfg(test)]
pub(crate) fn iris_forest() -> ForestModel {
    ForestModel::from_json_str(IRIS_FOREST_JSON).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn leaf(value: &[f64]) -> Box<TreeNode> {
        Box::new(TreeNode::Leaf(Leaf {
            value: value.to_vec(),
        }))
    }

    fn stump(feature: usize, threshold: f64, left: &[f64], right: &[f64]) -> DecisionTree {
        DecisionTree {
            root: TreeNode::Split(Split {
                feature,
                threshold,
                left: leaf(left),
                right: leaf(right),
            }),
        }
    }

    #[test]
    fn test_shipped_model_loads() {
        let model = iris_forest();
        assert_eq!(model.model_type(), "RandomForestClassifier");
        assert_eq!(model.n_estimators(), 3);
        assert_eq!(model.n_features(), 4);
        assert_eq!(model.n_classes(), 3);
    }

    #[test]
    fn test_predicts_each_species() {
        let model = iris_forest();
        let batch = array![
            [5.1, 3.5, 1.4, 0.2],
            [6.0, 2.9, 4.5, 1.5],
            [6.7, 3.0, 5.2, 2.3]
        ];

        assert_eq!(model.predict(batch.view()).unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_setosa_probabilities() {
        let model = iris_forest();
        let proba = model.predict_proba(array![[5.1, 3.5, 1.4, 0.2]].view()).unwrap();

        assert_eq!(proba.shape(), &[1, 3]);
        assert!((proba[[0, 0]] - 1.0).abs() < 1e-12);
        assert_eq!(proba[[0, 1]], 0.0);
        assert_eq!(proba[[0, 2]], 0.0);
    }

    #[test]
    fn test_probabilities_average_leaf_votes() {
        let model = iris_forest();
        let proba = model.predict_proba(array![[6.0, 2.9, 4.5, 1.5]].view()).unwrap();

        // Leaves reached: [0,47,1], [0,44,1], [0,48,2]
        let expected_versicolor = (47.0 / 48.0 + 44.0 / 45.0 + 48.0 / 50.0) / 3.0;
        assert!((proba[[0, 1]] - expected_versicolor).abs() < 1e-12);
        assert!((proba.row(0).sum() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_rows_sum_to_one() {
        let model = iris_forest();
        let batch = array![
            [4.3, 2.0, 1.0, 0.1],
            [7.9, 4.4, 6.9, 2.5],
            [5.8, 2.7, 5.1, 1.9],
            [0.0, 0.0, 0.0, 0.0],
            [100.0, 100.0, 100.0, 100.0]
        ];
        let proba = model.predict_proba(batch.view()).unwrap();
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
            assert!(row.iter().all(|p| (0.0..=1.0).contains(p)));
        }
    }

    #[test]
    fn test_predict_with_proba_agrees_with_separate_calls() {
        let model = iris_forest();
        let batch = array![[5.9, 3.0, 5.1, 1.8]];
        let (classes, proba) = model.predict_with_proba(batch.view()).unwrap();

        assert_eq!(classes, model.predict(batch.view()).unwrap());
        assert_eq!(proba, model.predict_proba(batch.view()).unwrap());
    }

    #[test]
    fn test_shipped_importances_favor_petal_features() {
        let model = iris_forest();
        let importances = model.feature_importances();

        assert_eq!(importances.len(), 4);
        assert!((importances.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        let petal = importances[2] + importances[3];
        assert!(petal > 0.9, "petal importance was {petal}");
        assert!(importances.iter().all(|i| *i >= 0.0));
    }

    #[test]
    fn test_single_split_owns_all_importance() {
        let model = ForestModel::new(
            "DecisionTreeClassifier",
            4,
            3,
            vec![stump(2, 2.45, &[50.0, 0.0, 0.0], &[0.0, 50.0, 50.0])],
        )
        .unwrap();

        assert_eq!(model.feature_importances(), &[0.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_importances_average_over_splitting_trees() {
        let model = ForestModel::new(
            "RandomForestClassifier",
            4,
            2,
            vec![
                stump(0, 5.0, &[10.0, 0.0], &[0.0, 10.0]),
                stump(3, 1.0, &[3.0, 1.0], &[1.0, 3.0]),
                DecisionTree {
                    root: TreeNode::Leaf(Leaf {
                        value: vec![5.0, 5.0],
                    }),
                },
            ],
        )
        .unwrap();

        let importances = model.feature_importances();
        assert!((importances[0] - 0.5).abs() < 1e-12);
        assert!((importances[3] - 0.5).abs() < 1e-12);
        assert_eq!(importances[1], 0.0);
    }

    #[test]
    fn test_leaf_only_forest_has_zero_importances() {
        let model = ForestModel::new(
            "RandomForestClassifier",
            2,
            2,
            vec![DecisionTree {
                root: TreeNode::Leaf(Leaf {
                    value: vec![1.0, 3.0],
                }),
            }],
        )
        .unwrap();

        assert_eq!(model.feature_importances(), &[0.0, 0.0]);
        let proba = model.predict_proba(array![[1.0, 2.0]].view()).unwrap();
        assert_eq!(proba, array![[0.25, 0.75]]);
    }

    #[test]
    fn test_threshold_is_inclusive_on_the_left() {
        let model =
            ForestModel::new("DecisionTreeClassifier", 1, 2, vec![stump(0, 1.0, &[1.0, 0.0], &[0.0, 1.0])])
                .unwrap();

        assert_eq!(model.predict(array![[1.0], [1.0001]].view()).unwrap(), vec![0, 1]);
    }

    #[test]
    fn test_wrong_batch_width_is_rejected() {
        let model = iris_forest();
        let err = model.predict(array![[5.1, 3.5, 1.4]].view()).unwrap_err();
        assert!(err.to_string().contains("3 features"));
    }

    #[test]
    fn test_validation_rejects_bad_artifacts() {
        let empty = ForestModel::new("RandomForestClassifier", 4, 3, vec![]);
        assert!(empty.is_err());

        let bad_feature = ForestModel::new(
            "RandomForestClassifier",
            4,
            3,
            vec![stump(4, 1.0, &[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0])],
        );
        assert!(bad_feature.unwrap_err().to_string().contains("out of range"));

        let short_leaf = ForestModel::new(
            "RandomForestClassifier",
            4,
            3,
            vec![stump(0, 1.0, &[1.0, 0.0], &[0.0, 1.0, 0.0])],
        );
        assert!(short_leaf.unwrap_err().to_string().contains("class weights"));

        let negative = ForestModel::new(
            "RandomForestClassifier",
            4,
            3,
            vec![stump(0, 1.0, &[1.0, -1.0, 0.0], &[0.0, 1.0, 0.0])],
        );
        assert!(negative.is_err());

        let all_zero = ForestModel::new(
            "RandomForestClassifier",
            4,
            3,
            vec![stump(0, 1.0, &[0.0, 0.0, 0.0], &[0.0, 1.0, 0.0])],
        );
        assert!(all_zero.is_err());
    }

    #[test]
    fn test_malformed_json_is_rejected() {
        assert!(ForestModel::from_json_str("{}").is_err());
        assert!(ForestModel::from_json_str("not json").is_err());
        assert!(ForestModel::from_json_str(
            r#"{"n_features": 4, "n_classes": 3, "trees": [{"root": {"branch": {}}}]}"#
        )
        .is_err());
    }

    #[test]
    fn test_model_type_defaults_when_absent() {
        let model = ForestModel::from_json_str(
            r#"{"n_features": 1, "n_classes": 2, "trees": [{"root": {"leaf": {"value": [1.0, 1.0]}}}]}"#,
        )
        .unwrap();
        assert_eq!(model.model_type(), "RandomForestClassifier");
    }
}
