use crate::config::Config;
use crate::error::{AppError, Result};
use crate::ml::aggregate;
use crate::ml::classifier::Classifier;
use crate::ml::encoding::{LabelDecoder, ATTACK_TYPE};
use crate::ml::features::FeatureEncoder;
use crate::ml::models::{ModelMetadata, PredictionReport};
use crate::ml::schema::{ColumnValidator, SchemaVariant};
use crate::ml::store::ModelBundle;
use crate::table::Table;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Attack-type prediction over uploaded vulnerability tables
pub struct PredictionService {
    /// Loaded classifier
    classifier: Arc<dyn Classifier>,

    /// Header alias resolution and required-column checks
    validator: ColumnValidator,

    /// Table-to-matrix encoding
    encoder: FeatureEncoder,

    /// Class id to attack-type label
    decoder: LabelDecoder,

    /// Number of ranked attack types reported
    top_k: usize,
}

impl PredictionService {
    /// Create a service from a loaded bundle.
    ///
    /// Fails if the bundle lacks an encoder the configured schema needs, or if the
    /// model can produce a class id the attack-type decoder cannot label.
    pub fn new(bundle: ModelBundle, config: &Config) -> Result<Self> {
        Self::with_options(bundle, config.schema.variant, config.prediction.top_k)
    }

    pub fn with_options(bundle: ModelBundle, variant: SchemaVariant, top_k: usize) -> Result<Self> {
        if top_k == 0 {
            return Err(AppError::Configuration("top_k must be at least 1".to_string()));
        }

        let encoder = FeatureEncoder::new(variant, &bundle.encoders, bundle.feature_columns)?;
        let decoder = bundle.encoders.decoder(ATTACK_TYPE)?;

        let classes = bundle.classifier.classes();
        let distinct: HashSet<usize> = classes.iter().copied().collect();
        if distinct.len() != classes.len() {
            return Err(AppError::Model(format!(
                "model class ids are not unique: {:?}",
                classes
            )));
        }
        decoder.check_covers(classes)?;

        Ok(Self {
            classifier: bundle.classifier,
            validator: ColumnValidator::new(variant),
            encoder,
            decoder,
            top_k,
        })
    }

    pub fn variant(&self) -> SchemaVariant {
        self.validator.variant()
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn model_metadata(&self) -> &ModelMetadata {
        self.classifier.metadata()
    }

    /// Validate, encode and score a table, ranking attack types by mean probability
    pub fn predict_table(&self, table: &Table) -> Result<PredictionReport> {
        let report = self.validator.validate(table)?;
        debug!(
            columns = report.table.n_columns(),
            ignored = ?report.extra,
            "Validated uploaded table"
        );

        if report.table.is_empty() {
            return Err(AppError::EmptyInput);
        }

        let features = self.encoder.encode(&report.table)?;
        debug!(
            rows = features.n_rows(),
            features = features.n_features(),
            "Encoded uploaded table"
        );

        let result = aggregate::predict(
            &features,
            self.classifier.as_ref(),
            &self.decoder,
            self.top_k,
        )?;

        let prediction = PredictionReport::new(features.n_rows(), result, report.extra);
        info!(
            rows = prediction.rows_analysed,
            top = prediction.top_prediction.as_deref().unwrap_or("-"),
            "Attack type prediction completed"
        );

        Ok(prediction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::classifier::ForestClassifier;
    use crate::ml::encoding::EncoderBundle;
    use std::collections::BTreeMap;

    // Splits on cvss_score at 7.0: low scores lean Phishing, high scores Ransomware
    const MODEL: &str = r#"{
        "n_features": 5,
        "classes": [0, 1, 2],
        "trees": [{
            "children_left": [1, -1, -1],
            "children_right": [2, -1, -1],
            "feature": [0, -2, -2],
            "threshold": [7.0, -2.0, -2.0],
            "value": [[0, 0, 0], [6, 3, 1], [0, 2, 8]]
        }]
    }"#;

    fn bundle() -> ModelBundle {
        let mut classes = BTreeMap::new();
        for (key, values) in [
            ("severity", vec!["CRITICAL", "HIGH", "LOW", "MEDIUM"]),
            ("family", vec!["Databases", "Web Servers"]),
            ("bank_relevance", vec!["HIGH", "LOW"]),
            ("attack_type", vec!["Phishing", "Privilege Escalation", "Ransomware"]),
        ] {
            classes.insert(
                key.to_string(),
                values.into_iter().map(String::from).collect(),
            );
        }

        ModelBundle {
            classifier: Arc::new(ForestClassifier::from_json(MODEL).unwrap()),
            encoders: EncoderBundle::new(classes),
            feature_columns: ["cvss_score", "severity", "family", "verified_flag", "bank_relevance"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
        }
    }

    fn service() -> PredictionService {
        PredictionService::with_options(bundle(), SchemaVariant::Banking, 5).unwrap()
    }

    #[test]
    fn test_predict_table_ranks_by_mean() {
        let table = Table::from_rows(
            &["CVSS", "Severity", "Family", "Exploit", "Bank_Relevance", "Notes"],
            &[
                &["9.8", "CRITICAL", "Web Servers", "1", "HIGH", ""],
                &["8.1", "HIGH", "Databases", "0", "LOW", "x"],
            ],
        );

        let report = service().predict_table(&table).unwrap();
        assert_eq!(report.rows_analysed, 2);
        assert_eq!(report.top_prediction.as_deref(), Some("Ransomware"));
        assert_eq!(
            report.result.labels(),
            vec!["Ransomware", "Privilege Escalation", "Phishing"]
        );
        assert_eq!(report.ignored_columns, vec!["notes"]);
        assert!((report.result.ranked[0].probability - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_missing_columns_listed() {
        let table = Table::from_rows(&["cvss_score", "severity"], &[&["5.0", "LOW"]]);

        match service().predict_table(&table).unwrap_err() {
            AppError::Validation { missing } => {
                assert_eq!(missing, vec!["bank_relevance", "family", "verified_flag"])
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_empty_table() {
        let table = Table::from_rows(
            &["cvss_score", "severity", "family", "verified_flag", "bank_relevance"],
            &[],
        );
        assert!(matches!(
            service().predict_table(&table),
            Err(AppError::EmptyInput)
        ));
    }

    #[test]
    fn test_missing_attack_type_decoder() {
        let mut bundle = bundle();
        let mut classes = BTreeMap::new();
        for key in ["severity", "family", "bank_relevance"] {
            classes.insert(key.to_string(), vec!["X".to_string()]);
        }
        bundle.encoders = EncoderBundle::new(classes);

        match PredictionService::with_options(bundle, SchemaVariant::Banking, 5) {
            Err(AppError::EncoderKey { keys }) => assert_eq!(keys, vec!["attack_type"]),
            other => panic!("unexpected: {:?}", other.err()),
        }
    }

    #[test]
    fn test_decoder_must_label_every_model_class() {
        let mut bundle = bundle();
        let mut classes = BTreeMap::new();
        for (key, values) in [
            ("severity", vec!["HIGH"]),
            ("family", vec!["Databases"]),
            ("bank_relevance", vec!["LOW"]),
            ("attack_type", vec!["Phishing", "Privilege Escalation"]),
        ] {
            classes.insert(
                key.to_string(),
                values.into_iter().map(String::from).collect(),
            );
        }
        bundle.encoders = EncoderBundle::new(classes);

        match PredictionService::with_options(bundle, SchemaVariant::Banking, 2) {
            Err(AppError::Configuration(message)) => assert!(message.contains("[2]")),
            other => panic!("unexpected: {:?}", other.err()),
        }
    }

    #[test]
    fn test_top_k_truncates() {
        let service = PredictionService::with_options(bundle(), SchemaVariant::Banking, 1).unwrap();
        let table = Table::from_rows(
            &["cvss_score", "severity", "family", "verified_flag", "bank_relevance"],
            &[&["2.0", "LOW", "Databases", "no", "LOW"]],
        );

        let report = service.predict_table(&table).unwrap();
        assert_eq!(report.result.labels(), vec!["Phishing"]);
    }
}
