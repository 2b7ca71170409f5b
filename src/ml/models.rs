use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Model kinds the crate can run inference for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    RandomForest,
    DecisionTree,
}

/// Descriptive information about a loaded model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Model name
    pub name: String,

    /// Model version
    pub version: String,

    /// Model type
    pub model_type: ModelType,

    /// Number of input features
    pub n_features: usize,

    /// Number of target classes
    pub n_classes: usize,

    /// Number of trees in the ensemble
    pub n_estimators: usize,

    /// When the artifact was loaded into this process
    pub loaded_at: DateTime<Utc>,

    /// Free-form training parameters carried by the artifact
    #[serde(default)]
    pub hyperparameters: HashMap<String, String>,
}

/// One attack type with its batch-mean probability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedAttack {
    /// 1-based rank
    pub rank: usize,

    /// Model class id
    pub class_id: usize,

    /// Decoded attack-type label
    pub label: String,

    /// Mean probability across all uploaded rows
    pub probability: f64,
}

/// Top attack types, highest probability first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub ranked: Vec<RankedAttack>,
}

impl PredictionResult {
    pub fn top(&self) -> Option<&RankedAttack> {
        self.ranked.first()
    }

    pub fn len(&self) -> usize {
        self.ranked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranked.is_empty()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.ranked.iter().map(|r| r.label.as_str()).collect()
    }
}

/// Prediction outcome for one uploaded table, ready for presentation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionReport {
    /// Number of uploaded rows analysed
    pub rows_analysed: usize,

    /// Highest-ranked attack type
    pub top_prediction: Option<String>,

    /// Ranked attack types
    pub result: PredictionResult,

    /// Uploaded columns ignored by the schema
    pub ignored_columns: Vec<String>,

    /// Generation timestamp
    pub generated_at: DateTime<Utc>,
}

impl PredictionReport {
    pub fn new(rows_analysed: usize, result: PredictionResult, ignored_columns: Vec<String>) -> Self {
        Self {
            rows_analysed,
            top_prediction: result.top().map(|r| r.label.clone()),
            result,
            ignored_columns,
            generated_at: Utc::now(),
        }
    }
}
