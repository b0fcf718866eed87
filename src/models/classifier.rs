//! Classifier backends usable inside a model bundle.
//!
//! Tree models use the array layout of a fitted scikit-learn `tree_`
//! (`children_left`, `children_right`, `feature`, `threshold`, `value`),
//! so a trained estimator can be exported with a few lines of JSON dumping.

use crate::error::{BundleError, PredictError};
use crate::models::aggregator::{argmax, normalize, sigmoid, softmax, ProbabilityAggregator};
use crate::models::onnx::{OnnxClassifier, OnnxSpec};
use serde::Deserialize;
use std::fmt;
use std::path::Path;

/// A fitted multi-class classifier.
///
/// Implementations are immutable after construction and safe to share
/// across requests.
pub trait Classifier: Send + Sync + fmt::Debug {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// Class labels, in probability order
    fn classes(&self) -> &[String];

    /// Width of the input row
    fn n_features(&self) -> usize;

    /// One probability per class
    fn predict_proba(&self, row: &[f64]) -> Result<Vec<f64>, PredictError>;

    /// Most likely class label
    fn predict(&self, row: &[f64]) -> Result<String, PredictError> {
        let proba = self.predict_proba(row)?;
        argmax(&proba)
            .and_then(|i| self.classes().get(i).cloned())
            .ok_or_else(|| PredictError::Backend("empty probability vector".to_string()))
    }
}

/// Class label as exported; numeric labels are kept as their text form.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum RawLabel {
    Text(String),
    Int(i64),
}

fn class_labels(raw: Vec<RawLabel>) -> Result<Vec<String>, BundleError> {
    let labels: Vec<String> = raw
        .into_iter()
        .map(|label| match label {
            RawLabel::Text(s) => s,
            RawLabel::Int(i) => i.to_string(),
        })
        .collect();

    if labels.is_empty() {
        return Err(BundleError::Model("classes is empty".to_string()));
    }
    let mut sorted = labels.clone();
    sorted.sort();
    sorted.dedup();
    if sorted.len() != labels.len() {
        return Err(BundleError::Model("classes contains duplicates".to_string()));
    }
    Ok(labels)
}

/// Model section of a bundle file, tagged by `kind`
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSpec {
    RandomForest(ForestSpec),
    DecisionTree(SingleTreeSpec),
    LogisticRegression(LogisticSpec),
    Onnx(OnnxSpec),
}

impl ModelSpec {
    /// Build the classifier. `base_dir` resolves files referenced by the spec.
    pub fn build(self, base_dir: &Path) -> Result<Box<dyn Classifier>, BundleError> {
        let classifier: Box<dyn Classifier> = match self {
            ModelSpec::RandomForest(spec) => Box::new(RandomForest::from_spec(spec)?),
            ModelSpec::DecisionTree(spec) => {
                let classes = class_labels(spec.classes)?;
                let tree = DecisionTree::from_spec(spec.tree, classes.len(), spec.n_features)?;
                Box::new(SingleTree {
                    classes,
                    n_features: spec.n_features,
                    tree,
                })
            }
            ModelSpec::LogisticRegression(spec) => Box::new(LogisticRegression::from_spec(spec)?),
            ModelSpec::Onnx(mut spec) => {
                let classes = class_labels(std::mem::take(&mut spec.classes))?;
                Box::new(OnnxClassifier::load(spec, classes, base_dir)?)
            }
        };
        Ok(classifier)
    }
}

/// Arrays of one fitted tree
#[derive(Debug, Clone, Deserialize)]
pub struct TreeSpec {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    /// Per-node class counts or fractions, `[n_nodes][n_classes]`
    pub value: Vec<Vec<f64>>,
}

#[derive(Debug, Deserialize)]
pub struct SingleTreeSpec {
    classes: Vec<RawLabel>,
    n_features: usize,
    tree: TreeSpec,
}

#[derive(Debug, Deserialize)]
pub struct ForestSpec {
    classes: Vec<RawLabel>,
    n_features: usize,
    trees: Vec<TreeSpec>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MultiClass {
    #[default]
    Multinomial,
    Ovr,
}

#[derive(Debug, Deserialize)]
pub struct LogisticSpec {
    classes: Vec<RawLabel>,
    /// `[n_classes][n_features]`, or a single row for two classes
    coef: Vec<Vec<f64>>,
    intercept: Vec<f64>,
    #[serde(default)]
    multi_class: MultiClass,
}

const LEAF: i64 = -1;

#[derive(Debug, Clone)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf(Vec<f64>),
}

/// A binary decision tree with normalized leaf distributions
#[derive(Debug, Clone)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

impl DecisionTree {
    /// Validate the arrays and precompute leaf distributions.
    ///
    /// Children must have larger ids than their parent, which is how fitted
    /// trees number their nodes and guarantees traversal terminates.
    pub fn from_spec(spec: TreeSpec, n_classes: usize, n_features: usize) -> Result<Self, BundleError> {
        let n_nodes = spec.children_left.len();
        if n_nodes == 0 {
            return Err(BundleError::Model("tree has no nodes".to_string()));
        }
        if spec.children_right.len() != n_nodes
            || spec.feature.len() != n_nodes
            || spec.threshold.len() != n_nodes
            || spec.value.len() != n_nodes
        {
            return Err(BundleError::Model(format!(
                "tree arrays disagree on node count {}",
                n_nodes
            )));
        }

        let mut nodes = Vec::with_capacity(n_nodes);
        for id in 0..n_nodes {
            let (left, right) = (spec.children_left[id], spec.children_right[id]);

            if left == LEAF || right == LEAF {
                if left != right {
                    return Err(BundleError::Model(format!("node {} has a single child", id)));
                }
                let value = &spec.value[id];
                if value.len() != n_classes {
                    return Err(BundleError::Model(format!(
                        "node {} has {} class values, expected {}",
                        id,
                        value.len(),
                        n_classes
                    )));
                }
                let distribution = normalize(value).ok_or_else(|| {
                    BundleError::Model(format!("leaf {} has no usable class weights", id))
                })?;
                nodes.push(Node::Leaf(distribution));
                continue;
            }

            let child = |c: i64| -> Result<usize, BundleError> {
                usize::try_from(c)
                    .ok()
                    .filter(|&c| c > id && c < n_nodes)
                    .ok_or_else(|| BundleError::Model(format!("node {} has invalid child {}", id, c)))
            };
            let feature = usize::try_from(spec.feature[id])
                .ok()
                .filter(|&f| f < n_features)
                .ok_or_else(|| {
                    BundleError::Model(format!(
                        "node {} splits on feature {} of {}",
                        id, spec.feature[id], n_features
                    ))
                })?;
            let threshold = spec.threshold[id];
            if !threshold.is_finite() {
                return Err(BundleError::Model(format!("node {} has non-finite threshold", id)));
            }

            nodes.push(Node::Split {
                feature,
                threshold,
                left: child(left)?,
                right: child(right)?,
            });
        }

        Ok(Self { nodes })
    }

    /// Leaf distribution reached by `row`.
    ///
    /// Features are compared at single precision, as the trees were fitted.
    pub fn leaf(&self, row: &[f64]) -> &[f64] {
        let mut id = 0;
        loop {
            match &self.nodes[id] {
                Node::Leaf(distribution) => return distribution,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let x = f64::from(row[*feature] as f32);
                    id = if x <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

fn check_width(row: &[f64], n_features: usize) -> Result<(), PredictError> {
    if row.len() != n_features {
        return Err(PredictError::ShapeMismatch(format!(
            "row has {} features, model expects {}",
            row.len(),
            n_features
        )));
    }
    Ok(())
}

#[derive(Debug)]
struct SingleTree {
    classes: Vec<String>,
    n_features: usize,
    tree: DecisionTree,
}

impl Classifier for SingleTree {
    fn name(&self) -> &str {
        "decision_tree"
    }

    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_proba(&self, row: &[f64]) -> Result<Vec<f64>, PredictError> {
        check_width(row, self.n_features)?;
        Ok(self.tree.leaf(row).to_vec())
    }
}

/// Forest of decision trees; probabilities are the mean of leaf distributions
#[derive(Debug)]
pub struct RandomForest {
    classes: Vec<String>,
    n_features: usize,
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    fn from_spec(spec: ForestSpec) -> Result<Self, BundleError> {
        let classes = class_labels(spec.classes)?;
        if spec.trees.is_empty() {
            return Err(BundleError::Model("random forest has no trees".to_string()));
        }
        let trees = spec
            .trees
            .into_iter()
            .enumerate()
            .map(|(i, tree)| {
                DecisionTree::from_spec(tree, classes.len(), spec.n_features).map_err(|e| match e {
                    BundleError::Model(reason) => BundleError::Model(format!("tree {}: {}", i, reason)),
                    other => other,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            classes,
            n_features: spec.n_features,
            trees,
        })
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }
}

impl Classifier for RandomForest {
    fn name(&self) -> &str {
        "random_forest"
    }

    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_proba(&self, row: &[f64]) -> Result<Vec<f64>, PredictError> {
        check_width(row, self.n_features)?;
        let aggregator = ProbabilityAggregator::new(self.classes.len());
        Ok(aggregator.aggregate(self.trees.iter().map(|t| t.leaf(row))))
    }
}

/// Linear model with softmax (multinomial) or normalized sigmoid (one-vs-rest) output
#[derive(Debug)]
pub struct LogisticRegression {
    classes: Vec<String>,
    coef: Vec<Vec<f64>>,
    intercept: Vec<f64>,
    multi_class: MultiClass,
}

impl LogisticRegression {
    fn from_spec(spec: LogisticSpec) -> Result<Self, BundleError> {
        let classes = class_labels(spec.classes)?;
        let n_rows = if classes.len() == 2 { 1 } else { classes.len() };

        if classes.len() < 2 {
            return Err(BundleError::Model("logistic regression needs at least two classes".to_string()));
        }
        if spec.coef.len() != n_rows || spec.intercept.len() != n_rows {
            return Err(BundleError::Model(format!(
                "expected {} coefficient rows and intercepts, got {} and {}",
                n_rows,
                spec.coef.len(),
                spec.intercept.len()
            )));
        }
        let n_features = spec.coef[0].len();
        if n_features == 0 || spec.coef.iter().any(|r| r.len() != n_features) {
            return Err(BundleError::Model("coefficient rows differ in width".to_string()));
        }
        if spec
            .coef
            .iter()
            .flatten()
            .chain(spec.intercept.iter())
            .any(|v| !v.is_finite())
        {
            return Err(BundleError::Model("non-finite coefficient".to_string()));
        }

        Ok(Self {
            classes,
            coef: spec.coef,
            intercept: spec.intercept,
            multi_class: spec.multi_class,
        })
    }

    fn decision(&self, row: &[f64]) -> Vec<f64> {
        self.coef
            .iter()
            .zip(&self.intercept)
            .map(|(w, b)| b + w.iter().zip(row).map(|(w, x)| w * x).sum::<f64>())
            .collect()
    }
}

impl Classifier for LogisticRegression {
    fn name(&self) -> &str {
        "logistic_regression"
    }

    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn n_features(&self) -> usize {
        self.coef[0].len()
    }

    fn predict_proba(&self, row: &[f64]) -> Result<Vec<f64>, PredictError> {
        check_width(row, self.n_features())?;
        let scores = self.decision(row);

        if self.classes.len() == 2 {
            let p = sigmoid(scores[0]);
            return Ok(vec![1.0 - p, p]);
        }

        match self.multi_class {
            MultiClass::Multinomial => Ok(softmax(&scores)),
            MultiClass::Ovr => {
                let raw: Vec<f64> = scores.into_iter().map(sigmoid).collect();
                normalize(&raw)
                    .ok_or_else(|| PredictError::Backend("degenerate one-vs-rest scores".to_string()))
            }
        }
    }
}
