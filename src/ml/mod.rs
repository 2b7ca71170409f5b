/// Machine learning pipeline for attack-type prediction
///
/// This module provides:
/// - Header normalization, alias resolution and required-column checks
/// - Categorical encoding with a stable unknown-category code
/// - Tree-ensemble inference over persisted model artifacts
/// - Batch aggregation and ranking of attack-type probabilities

pub mod aggregate;
pub mod classifier;
pub mod encoding;
pub mod features;
pub mod models;
pub mod schema;
pub mod service;
pub mod store;

pub use aggregate::{aggregate_mean, predict, DEFAULT_TOP_K};
pub use classifier::{Classifier, ForestArtifact, ForestClassifier, TreeArtifact};
pub use encoding::{CategoryEncoding, EncoderBundle, LabelDecoder, ATTACK_TYPE, UNKNOWN_CATEGORY};
pub use features::{FeatureEncoder, FeatureMatrix};
pub use models::{ModelMetadata, ModelType, PredictionReport, PredictionResult, RankedAttack};
pub use schema::{ColumnValidator, SchemaReport, SchemaVariant};
pub use service::PredictionService;
pub use store::{ArtifactStatus, ModelBundle, ModelDiagnostics, ModelStore};
