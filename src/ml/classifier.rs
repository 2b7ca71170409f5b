use crate::error::{AppError, Result};
use crate::ml::models::{ModelMetadata, ModelType};
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Marker for a leaf in `children_left` / `children_right`
const LEAF: i64 = -1;

/// Trait for pre-trained probabilistic classifiers
pub trait Classifier: Send + Sync {
    /// Class ids the model was trained on, in probability-column order
    fn classes(&self) -> &[usize];

    /// Number of input features expected per row
    fn n_features(&self) -> usize;

    /// Per-row class probabilities (n_rows × n_classes); each row sums to 1
    fn predict_proba(&self, features: &Array2<f64>) -> Result<Array2<f64>>;

    /// Get model metadata
    fn metadata(&self) -> &ModelMetadata;

    /// Get model type
    fn model_type(&self) -> ModelType {
        self.metadata().model_type
    }

    /// Most probable class id per row
    fn predict(&self, features: &Array2<f64>) -> Result<Vec<usize>> {
        let proba = self.predict_proba(features)?;
        let classes = self.classes();

        Ok(proba
            .rows()
            .into_iter()
            .map(|row| {
                let best = row
                    .iter()
                    .enumerate()
                    .fold((0, f64::MIN), |best, (i, &p)| if p > best.1 { (i, p) } else { best });
                classes[best.0]
            })
            .collect())
    }
}

/// One fitted decision tree as parallel node arrays
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeArtifact {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    /// Per-node class counts or weights; only leaves are read
    pub value: Vec<Vec<f64>>,
}

/// Persisted tree-ensemble model (`model.json`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestArtifact {
    #[serde(default = "default_model_name")]
    pub name: String,

    #[serde(default = "default_model_version")]
    pub version: String,

    pub n_features: usize,

    /// Encoded attack-type ids, one per probability column
    pub classes: Vec<usize>,

    pub trees: Vec<TreeArtifact>,

    #[serde(default)]
    pub hyperparameters: HashMap<String, String>,
}

fn default_model_name() -> String {
    "Random Forest".to_string()
}

fn default_model_version() -> String {
    "1.0".to_string()
}

/// A tree with leaf distributions normalized at load time
#[derive(Debug, Clone)]
struct Tree {
    children_left: Vec<i64>,
    children_right: Vec<i64>,
    feature: Vec<usize>,
    threshold: Vec<f64>,
    leaf_proba: Vec<Vec<f64>>,
}

impl Tree {
    fn from_artifact(
        index: usize,
        artifact: TreeArtifact,
        n_features: usize,
        n_classes: usize,
    ) -> Result<Self> {
        let n_nodes = artifact.children_left.len();
        let defect = |msg: String| AppError::Model(format!("tree {}: {}", index, msg));

        if n_nodes == 0 {
            return Err(defect("has no nodes".to_string()));
        }
        if [
            artifact.children_right.len(),
            artifact.feature.len(),
            artifact.threshold.len(),
            artifact.value.len(),
        ]
        .iter()
        .any(|&len| len != n_nodes)
        {
            return Err(defect("node arrays have different lengths".to_string()));
        }

        let mut feature = vec![0; n_nodes];
        let mut leaf_proba = vec![Vec::new(); n_nodes];
        for node in 0..n_nodes {
            let (left, right) = (artifact.children_left[node], artifact.children_right[node]);

            if left == LEAF {
                if right != LEAF {
                    return Err(defect(format!("node {} has only one child", node)));
                }
                let value = &artifact.value[node];
                if value.len() != n_classes {
                    return Err(defect(format!(
                        "leaf {} has {} values for {} classes",
                        node,
                        value.len(),
                        n_classes
                    )));
                }
                let total: f64 = value.iter().sum();
                if value.iter().any(|v| *v < 0.0 || !v.is_finite()) || total <= 0.0 {
                    return Err(defect(format!("leaf {} has an invalid distribution", node)));
                }
                leaf_proba[node] = value.iter().map(|v| v / total).collect();
                continue;
            }

            // Children always follow their parent, which also rules out cycles
            let node_i = node as i64;
            let in_range = |child: i64| child > node_i && child < n_nodes as i64;
            if !in_range(left) || !in_range(right) {
                return Err(defect(format!("node {} has out-of-range children", node)));
            }
            let f = artifact.feature[node];
            if f < 0 || f as usize >= n_features {
                return Err(defect(format!(
                    "node {} splits on feature {} (model has {})",
                    node, f, n_features
                )));
            }
            if !artifact.threshold[node].is_finite() {
                return Err(defect(format!("node {} has a non-finite threshold", node)));
            }
            feature[node] = f as usize;
        }

        Ok(Self {
            children_left: artifact.children_left,
            children_right: artifact.children_right,
            feature,
            threshold: artifact.threshold,
            leaf_proba,
        })
    }

    fn leaf_for(&self, x: ArrayView1<'_, f64>) -> &[f64] {
        let mut node = 0;
        while self.children_left[node] != LEAF {
            node = if x[self.feature[node]] <= self.threshold[node] {
                self.children_left[node] as usize
            } else {
                self.children_right[node] as usize
            };
        }
        &self.leaf_proba[node]
    }
}

/// Random-forest inference over exported trees.
///
/// The forest probability is the mean of each tree's normalized leaf distribution.
#[derive(Debug, Clone)]
pub struct ForestClassifier {
    metadata: ModelMetadata,
    classes: Vec<usize>,
    trees: Vec<Tree>,
}

impl ForestClassifier {
    /// Validate an artifact and build the classifier
    pub fn from_artifact(artifact: ForestArtifact) -> Result<Self> {
        if artifact.trees.is_empty() {
            return Err(AppError::Model("model has no trees".to_string()));
        }
        if artifact.classes.is_empty() {
            return Err(AppError::Model("model has no classes".to_string()));
        }
        let distinct: HashSet<usize> = artifact.classes.iter().copied().collect();
        if distinct.len() != artifact.classes.len() {
            return Err(AppError::Model(format!(
                "model class ids are not unique: {:?}",
                artifact.classes
            )));
        }
        if artifact.n_features == 0 {
            return Err(AppError::Model("model expects zero features".to_string()));
        }

        let n_classes = artifact.classes.len();
        let n_features = artifact.n_features;
        let trees = artifact
            .trees
            .into_iter()
            .enumerate()
            .map(|(i, tree)| Tree::from_artifact(i, tree, n_features, n_classes))
            .collect::<Result<Vec<_>>>()?;

        let model_type = if trees.len() == 1 {
            ModelType::DecisionTree
        } else {
            ModelType::RandomForest
        };

        Ok(Self {
            metadata: ModelMetadata {
                name: artifact.name,
                version: artifact.version,
                model_type,
                n_features,
                n_classes,
                n_estimators: trees.len(),
                loaded_at: chrono::Utc::now(),
                hyperparameters: artifact.hyperparameters,
            },
            classes: artifact.classes,
            trees,
        })
    }

    /// Parse and validate the persisted JSON form
    pub fn from_json(json: &str) -> Result<Self> {
        let artifact: ForestArtifact = serde_json::from_str(json)?;
        Self::from_artifact(artifact)
    }
}

impl Classifier for ForestClassifier {
    fn classes(&self) -> &[usize] {
        &self.classes
    }

    fn n_features(&self) -> usize {
        self.metadata.n_features
    }

    fn predict_proba(&self, features: &Array2<f64>) -> Result<Array2<f64>> {
        if features.ncols() != self.n_features() {
            return Err(AppError::Model(format!(
                "model expects {} features per row, got {}",
                self.n_features(),
                features.ncols()
            )));
        }

        let n_trees = self.trees.len() as f64;
        let mut proba = Array2::zeros((features.nrows(), self.classes.len()));

        for (x, mut out) in features.rows().into_iter().zip(proba.rows_mut()) {
            for tree in &self.trees {
                for (o, p) in out.iter_mut().zip(tree.leaf_for(x)) {
                    *o += p;
                }
            }
            out.mapv_inplace(|v| v / n_trees);
        }

        Ok(proba)
    }

    fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    /// Two stumps over two features, three classes
    fn stump_forest_json() -> &'static str {
        r#"{
            "n_features": 2,
            "classes": [0, 1, 2],
            "trees": [
                {
                    "children_left": [1, -1, -1],
                    "children_right": [2, -1, -1],
                    "feature": [0, -2, -2],
                    "threshold": [5.0, -2.0, -2.0],
                    "value": [[0, 0, 0], [8, 2, 0], [0, 2, 8]]
                },
                {
                    "children_left": [1, -1, -1],
                    "children_right": [2, -1, -1],
                    "feature": [1, -2, -2],
                    "threshold": [0.5, -2.0, -2.0],
                    "value": [[0, 0, 0], [1, 1, 0], [0, 0, 4]]
                }
            ]
        }"#
    }

    #[test]
    fn test_load_metadata() {
        let model = ForestClassifier::from_json(stump_forest_json()).unwrap();

        assert_eq!(model.classes(), &[0, 1, 2]);
        assert_eq!(model.n_features(), 2);
        assert_eq!(model.model_type(), ModelType::RandomForest);
        assert_eq!(model.metadata().n_estimators, 2);
        assert_eq!(model.metadata().name, "Random Forest");
    }

    #[test]
    fn test_predict_proba_averages_trees() {
        let model = ForestClassifier::from_json(stump_forest_json()).unwrap();
        let x = array![[2.0, 0.0], [9.0, 1.0]];

        let proba = model.predict_proba(&x).unwrap();

        // Row 0: tree 1 -> [0.8, 0.2, 0], tree 2 -> [0.5, 0.5, 0]
        assert!((proba[[0, 0]] - 0.65).abs() < 1e-12);
        assert!((proba[[0, 1]] - 0.35).abs() < 1e-12);
        assert_eq!(proba[[0, 2]], 0.0);
        // Row 1: tree 1 -> [0, 0.2, 0.8], tree 2 -> [0, 0, 1]
        assert!((proba[[1, 2]] - 0.9).abs() < 1e-12);
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_threshold_is_inclusive_on_the_left() {
        let model = ForestClassifier::from_json(stump_forest_json()).unwrap();
        let proba = model.predict_proba(&array![[5.0, 0.5]]).unwrap();

        assert!((proba[[0, 0]] - 0.65).abs() < 1e-12);
    }

    #[test]
    fn test_predict_argmax() {
        let model = ForestClassifier::from_json(stump_forest_json()).unwrap();
        let predictions = model.predict(&array![[2.0, 0.0], [9.0, 1.0]]).unwrap();

        assert_eq!(predictions, vec![0, 2]);
    }

    #[test]
    fn test_feature_count_mismatch() {
        let model = ForestClassifier::from_json(stump_forest_json()).unwrap();
        let err = model.predict_proba(&array![[1.0, 2.0, 3.0]]).unwrap_err();

        assert!(err.to_string().contains("expects 2 features"));
    }

    #[test]
    fn test_structural_defects_rejected() {
        let cases = [
            r#"{"n_features": 1, "classes": [0], "trees": []}"#,
            r#"{"n_features": 1, "classes": [0, 1], "trees": [{"children_left": [-1], "children_right": [-1], "feature": [-2], "threshold": [-2.0], "value": [[1.0]]}]}"#,
            r#"{"n_features": 1, "classes": [0], "trees": [{"children_left": [1, -1], "children_right": [0, -1], "feature": [0, -2], "threshold": [1.0, -2.0], "value": [[0], [1]]}]}"#,
            r#"{"n_features": 1, "classes": [0], "trees": [{"children_left": [1, -1, -1], "children_right": [2, -1, -1], "feature": [3, -2, -2], "threshold": [1.0, -2.0, -2.0], "value": [[0], [1], [1]]}]}"#,
            r#"{"n_features": 1, "classes": [0], "trees": [{"children_left": [-1], "children_right": [-1], "feature": [-2], "threshold": [-2.0], "value": [[0.0]]}]}"#,
            r#"{"n_features": 1, "classes": [0, 0], "trees": [{"children_left": [-1], "children_right": [-1], "feature": [-2], "threshold": [-2.0], "value": [[1.0, 1.0]]}]}"#,
        ];

        for json in cases {
            let err = ForestClassifier::from_json(json).unwrap_err();
            assert_eq!(err.error_code(), "MODEL_ERROR", "accepted: {json}");
        }
    }

    #[test]
    fn test_duplicate_class_ids_rejected() {
        let json = r#"{"n_features": 1, "classes": [3, 1, 3], "trees": [{"children_left": [-1], "children_right": [-1], "feature": [-2], "threshold": [-2.0], "value": [[1.0, 1.0, 1.0]]}]}"#;

        match ForestClassifier::from_json(json).unwrap_err() {
            AppError::Model(message) => assert!(message.contains("not unique")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_single_tree_is_decision_tree() {
        let json = r#"{"n_features": 1, "classes": [4, 7], "trees": [{"children_left": [-1], "children_right": [-1], "feature": [-2], "threshold": [-2.0], "value": [[1.0, 3.0]]}]}"#;
        let model = ForestClassifier::from_json(json).unwrap();

        assert_eq!(model.model_type(), ModelType::DecisionTree);
        assert_eq!(model.predict(&array![[0.0]]).unwrap(), vec![7]);
    }
}
