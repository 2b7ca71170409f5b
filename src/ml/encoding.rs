//! Category encoders and label decoders fixed at training time

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Reserved category that every unseen value maps to
pub const UNKNOWN_CATEGORY: &str = "UNKNOWN";

/// Decoder key for the model's target classes
pub const ATTACK_TYPE: &str = "attack_type";

/// Closed vocabulary mapping category strings to integer codes.
///
/// The `UNKNOWN` sentinel is appended once, at construction, when the training
/// vocabulary lacks it. Codes of the training classes are their positions and
/// never change.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryEncoding {
    classes: Vec<String>,
    exact: HashMap<String, usize>,
    folded: HashMap<String, usize>,
    unknown_code: usize,
}

impl CategoryEncoding {
    /// Build from a label encoder's ordered class list
    pub fn from_classes<I, S>(classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut classes: Vec<String> = classes.into_iter().map(Into::into).collect();
        if !classes.iter().any(|c| c == UNKNOWN_CATEGORY) {
            classes.push(UNKNOWN_CATEGORY.to_string());
        }

        let mut exact = HashMap::with_capacity(classes.len());
        let mut folded = HashMap::with_capacity(classes.len());
        for (code, class) in classes.iter().enumerate() {
            exact.entry(class.clone()).or_insert(code);
            folded.entry(class.to_lowercase()).or_insert(code);
        }
        let unknown_code = exact[UNKNOWN_CATEGORY];

        Self {
            classes,
            exact,
            folded,
            unknown_code,
        }
    }

    /// Encode a raw cell. Total: unseen and empty values get the unknown code.
    pub fn encode(&self, value: &str) -> usize {
        let value = value.trim();
        if value.is_empty() {
            return self.unknown_code;
        }
        self.exact
            .get(value)
            .or_else(|| self.folded.get(&value.to_lowercase()))
            .copied()
            .unwrap_or(self.unknown_code)
    }

    pub fn unknown_code(&self) -> usize {
        self.unknown_code
    }

    /// Vocabulary in code order, sentinel included
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

/// Maps model class ids back to human-readable labels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelDecoder {
    name: String,
    labels: Vec<String>,
}

impl LabelDecoder {
    pub fn new(name: impl Into<String>, labels: Vec<String>) -> Self {
        Self {
            name: name.into(),
            labels,
        }
    }

    /// Label for a class id; an id outside the vocabulary is a bundle defect
    pub fn decode(&self, class_id: usize) -> Result<&str> {
        self.labels
            .get(class_id)
            .map(String::as_str)
            .ok_or_else(|| {
                AppError::Configuration(format!(
                    "class id {} has no label in decoder '{}' ({} labels)",
                    class_id,
                    self.name,
                    self.labels.len()
                ))
            })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Fail unless every class id has a label, naming all that do not
    pub fn check_covers(&self, class_ids: &[usize]) -> Result<()> {
        let undecodable: Vec<String> = class_ids
            .iter()
            .filter(|id| **id >= self.labels.len())
            .map(|id| id.to_string())
            .collect();
        if undecodable.is_empty() {
            return Ok(());
        }
        Err(AppError::Configuration(format!(
            "class ids [{}] have no label in decoder '{}' ({} labels)",
            undecodable.join(", "),
            self.name,
            self.labels.len()
        )))
    }
}

/// Named encoders as persisted next to the model: `{ name: [class, ...] }`
#[derive(Debug, Clone, Default)]
pub struct EncoderBundle {
    classes: BTreeMap<String, Vec<String>>,
    encodings: HashMap<String, CategoryEncoding>,
}

impl EncoderBundle {
    pub fn new(classes: BTreeMap<String, Vec<String>>) -> Self {
        let encodings = classes
            .iter()
            .map(|(name, classes)| {
                (
                    name.clone(),
                    CategoryEncoding::from_classes(classes.iter().cloned()),
                )
            })
            .collect();
        Self { classes, encodings }
    }

    /// Parse the persisted JSON form
    pub fn from_json(json: &str) -> Result<Self> {
        let classes: BTreeMap<String, Vec<String>> = serde_json::from_str(json)?;
        Ok(Self::new(classes))
    }

    /// Category encoding for a feature column
    pub fn encoding(&self, key: &str) -> Result<&CategoryEncoding> {
        self.encodings.get(key).ok_or_else(|| AppError::EncoderKey {
            keys: vec![key.to_string()],
        })
    }

    /// Label decoder built from a persisted class list, without the unknown sentinel
    pub fn decoder(&self, key: &str) -> Result<LabelDecoder> {
        self.classes
            .get(key)
            .map(|labels| LabelDecoder::new(key, labels.clone()))
            .ok_or_else(|| AppError::EncoderKey {
                keys: vec![key.to_string()],
            })
    }

    /// Fail with every absent key named
    pub fn require(&self, keys: &[&str]) -> Result<()> {
        let missing: Vec<String> = keys
            .iter()
            .filter(|k| !self.classes.contains_key(**k))
            .map(|k| k.to_string())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AppError::EncoderKey { keys: missing })
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn severity_encoding() -> CategoryEncoding {
        CategoryEncoding::from_classes(["CRITICAL", "HIGH", "LOW", "MEDIUM"])
    }

    #[test]
    fn test_known_categories_keep_training_codes() {
        let enc = severity_encoding();

        assert_eq!(enc.encode("CRITICAL"), 0);
        assert_eq!(enc.encode("MEDIUM"), 3);
        assert_eq!(enc.unknown_code(), 4);
        assert_eq!(enc.len(), 5);
    }

    #[test]
    fn test_case_insensitive_fallback() {
        let enc = severity_encoding();

        assert_eq!(enc.encode("high"), 1);
        assert_eq!(enc.encode("  Low "), 2);
    }

    #[test]
    fn test_unknown_is_idempotent_and_stable() {
        let enc = severity_encoding();
        let before: Vec<usize> = ["CRITICAL", "HIGH", "LOW", "MEDIUM"]
            .iter()
            .map(|c| enc.encode(c))
            .collect();

        let first = enc.encode("Catastrophic");
        let second = enc.encode("Catastrophic");
        let after: Vec<usize> = ["CRITICAL", "HIGH", "LOW", "MEDIUM"]
            .iter()
            .map(|c| enc.encode(c))
            .collect();

        assert_eq!(first, second);
        assert_eq!(first, enc.unknown_code());
        assert_eq!(before, after);
        assert_eq!(enc.encode(""), enc.unknown_code());
    }

    #[test]
    fn test_existing_unknown_is_not_duplicated() {
        let enc = CategoryEncoding::from_classes(["General", "UNKNOWN", "Web Servers"]);

        assert_eq!(enc.len(), 3);
        assert_eq!(enc.unknown_code(), 1);
        assert_eq!(enc.encode("Mainframes"), 1);
        assert_eq!(enc.encode("Web Servers"), 2);
    }

    #[test]
    fn test_decoder() {
        let dec = LabelDecoder::new(ATTACK_TYPE, vec!["DDoS".into(), "Phishing".into()]);

        assert_eq!(dec.decode(1).unwrap(), "Phishing");
        let err = dec.decode(2).unwrap_err();
        assert!(err.to_string().contains("class id 2"));
    }

    #[test]
    fn test_decoder_coverage_names_every_missing_id() {
        let dec = LabelDecoder::new(ATTACK_TYPE, vec!["DDoS".into(), "Phishing".into()]);

        assert!(dec.check_covers(&[0, 1]).is_ok());
        match dec.check_covers(&[0, 1, 2, 5]) {
            Err(AppError::Configuration(message)) => assert!(message.contains("[2, 5]")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_bundle_from_json() {
        let bundle = EncoderBundle::from_json(
            r#"{"severity": ["HIGH", "LOW"], "attack_type": ["DDoS", "Ransomware"]}"#,
        )
        .unwrap();

        assert_eq!(bundle.encoding("severity").unwrap().encode("LOW"), 1);
        assert_eq!(bundle.decoder(ATTACK_TYPE).unwrap().labels().len(), 2);
        assert_eq!(bundle.keys().collect::<Vec<_>>(), vec!["attack_type", "severity"]);
    }

    #[test]
    fn test_missing_keys() {
        let bundle = EncoderBundle::from_json(r#"{"severity": ["HIGH"]}"#).unwrap();

        assert!(matches!(
            bundle.encoding("family"),
            Err(AppError::EncoderKey { keys }) if keys == ["family"]
        ));
        match bundle.require(&["severity", "family", "attack_type"]) {
            Err(AppError::EncoderKey { keys }) => assert_eq!(keys, vec!["family", "attack_type"]),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
