use crate::config::ModelsConfig;
use crate::error::{AppError, Result};
use crate::ml::classifier::{Classifier, ForestArtifact, ForestClassifier};
use crate::ml::encoding::EncoderBundle;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Everything needed to score an upload, loaded once per process
#[derive(Clone)]
pub struct ModelBundle {
    pub classifier: Arc<dyn Classifier>,
    pub encoders: EncoderBundle,
    pub feature_columns: Vec<String>,
}

impl std::fmt::Debug for ModelBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelBundle")
            .field("model", &self.classifier.metadata().name)
            .field("encoders", &self.encoders.keys().collect::<Vec<_>>())
            .field("feature_columns", &self.feature_columns)
            .finish()
    }
}

/// Presence of one artifact file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactStatus {
    pub path: PathBuf,
    pub exists: bool,
}

/// Snapshot of the model directory for troubleshooting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDiagnostics {
    pub dir: PathBuf,
    pub dir_exists: bool,
    pub artifacts: Vec<ArtifactStatus>,
    /// File names in the directory, sorted
    pub listing: Vec<String>,
}

impl ModelDiagnostics {
    pub fn is_ready(&self) -> bool {
        self.dir_exists && self.artifacts.iter().all(|a| a.exists)
    }
}

/// Loads persisted model artifacts from disk
pub struct ModelStore;

impl ModelStore {
    pub fn load(config: &ModelsConfig) -> Result<ModelBundle> {
        let model_path = config.model_path();
        let artifact: ForestArtifact = serde_json::from_str(&read(&model_path)?)?;
        let classifier = ForestClassifier::from_artifact(artifact)?;
        debug!(path = %model_path.display(), "Loaded model");

        let encoders = EncoderBundle::from_json(&read(&config.encoders_path())?)?;
        let feature_columns: Vec<String> =
            serde_json::from_str(&read(&config.feature_columns_path())?)?;
        if feature_columns.is_empty() {
            return Err(AppError::Model("feature column list is empty".to_string()));
        }

        let metadata = classifier.metadata();
        info!(
            model = %metadata.name,
            trees = metadata.n_estimators,
            classes = metadata.n_classes,
            features = feature_columns.len(),
            "Model artifacts loaded from {}",
            config.dir.display()
        );

        Ok(ModelBundle {
            classifier: Arc::new(classifier),
            encoders,
            feature_columns,
        })
    }

    /// Report what is on disk; never fails
    pub fn diagnostics(config: &ModelsConfig) -> ModelDiagnostics {
        let dir_exists = config.dir.is_dir();
        let artifacts = [
            config.model_path(),
            config.encoders_path(),
            config.feature_columns_path(),
        ]
        .into_iter()
        .map(|path| ArtifactStatus {
            exists: path.is_file(),
            path,
        })
        .collect();

        let mut listing: Vec<String> = fs::read_dir(&config.dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.file_name().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();
        listing.sort();

        ModelDiagnostics {
            dir: config.dir.clone(),
            dir_exists,
            artifacts,
            listing,
        }
    }
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| AppError::io(path, e))
}
