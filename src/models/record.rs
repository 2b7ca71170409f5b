use serde::{Deserialize, Serialize};

/// Score used when a row's CVSS cell is missing or unparseable
pub const DEFAULT_CVSS_SCORE: f64 = 5.0;

/// Cell values (lower-cased, trimmed) read as a verified/exploitable flag
const TRUE_FLAGS: [&str; 4] = ["1", "true", "yes", "y"];

/// One uploaded vulnerability row, with numeric fields already coerced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VulnerabilityRecord {
    /// CVSS base score; not range-checked here
    pub cvss_score: f64,

    /// Severity category as uploaded
    pub severity: String,

    /// Product family as uploaded
    pub family: String,

    /// Whether the vulnerability is verified/exploitable
    pub verified_flag: bool,

    /// Banking relevance category (banking schema only)
    pub bank_relevance: Option<String>,
}

impl VulnerabilityRecord {
    pub fn new(cvss_score: f64, severity: impl Into<String>, family: impl Into<String>) -> Self {
        Self {
            cvss_score,
            severity: severity.into(),
            family: family.into(),
            verified_flag: false,
            bank_relevance: None,
        }
    }

    pub fn with_verified(mut self, verified: bool) -> Self {
        self.verified_flag = verified;
        self
    }

    pub fn with_bank_relevance(mut self, relevance: impl Into<String>) -> Self {
        self.bank_relevance = Some(relevance.into());
        self
    }
}

/// Parse a CVSS cell, falling back to [`DEFAULT_CVSS_SCORE`]
pub fn parse_cvss_score(value: &str) -> f64 {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(DEFAULT_CVSS_SCORE)
}

/// Parse a boolean-like cell; anything unrecognized is `false`
pub fn parse_flag(value: &str) -> bool {
    let value = value.trim().to_lowercase();
    TRUE_FLAGS.contains(&value.as_str())
}
