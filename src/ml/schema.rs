//! Upload schema: canonical column names, alias resolution and required-column checks

use crate::error::{AppError, Result};
use crate::table::Table;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use strum::{Display, EnumString};
use tracing::debug;

pub const CVSS_SCORE: &str = "cvss_score";
pub const SEVERITY: &str = "severity";
pub const FAMILY: &str = "family";
pub const VERIFIED_FLAG: &str = "verified_flag";
pub const BANK_RELEVANCE: &str = "bank_relevance";

const CORE_COLUMNS: [&str; 4] = [CVSS_SCORE, SEVERITY, FAMILY, VERIFIED_FLAG];
const BANKING_COLUMNS: [&str; 5] = [CVSS_SCORE, SEVERITY, FAMILY, VERIFIED_FLAG, BANK_RELEVANCE];

/// Synonym header → canonical column. Checked in order; the first alias found
/// fills the canonical column, and only if that column is absent.
const ALIASES: [(&str, &str); 8] = [
    ("cvss", CVSS_SCORE),
    ("cvssbase", CVSS_SCORE),
    ("cvss3", CVSS_SCORE),
    ("cvss score", CVSS_SCORE),
    ("cvss_base_score", CVSS_SCORE),
    ("exploit", VERIFIED_FLAG),
    ("exploit_available", VERIFIED_FLAG),
    ("exploitability", VERIFIED_FLAG),
];

/// Which required-column set an upload must satisfy
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SchemaVariant {
    /// cvss_score, severity, family, verified_flag
    Core,
    /// The core columns plus bank_relevance
    #[default]
    Banking,
}

impl SchemaVariant {
    /// Required canonical columns, in feature order
    pub fn required_columns(&self) -> &'static [&'static str] {
        match self {
            SchemaVariant::Core => &CORE_COLUMNS,
            SchemaVariant::Banking => &BANKING_COLUMNS,
        }
    }

    /// Categorical columns that need a category encoder
    pub fn categorical_columns(&self) -> &'static [&'static str] {
        match self {
            SchemaVariant::Core => &[SEVERITY, FAMILY],
            SchemaVariant::Banking => &[SEVERITY, FAMILY, BANK_RELEVANCE],
        }
    }
}

/// Outcome of schema resolution
#[derive(Debug, Clone)]
pub struct SchemaReport {
    /// Input table with normalized and alias-resolved headers
    pub table: Table,

    /// Required columns that are absent, sorted
    pub missing: Vec<String>,

    /// Columns outside the required set, in input order
    pub extra: Vec<String>,
}

impl SchemaReport {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Normalize a header for matching: trimmed and lower-cased
pub fn normalize_header(header: &str) -> String {
    header.trim().to_lowercase()
}

/// Resolves header aliases and checks uploads against a [`SchemaVariant`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ColumnValidator {
    variant: SchemaVariant,
}

impl ColumnValidator {
    pub fn new(variant: SchemaVariant) -> Self {
        Self { variant }
    }

    pub fn variant(&self) -> SchemaVariant {
        self.variant
    }

    /// Normalize headers, apply aliases and report missing and extra columns.
    ///
    /// Never fails; see [`ColumnValidator::validate`] for the strict form.
    pub fn resolve(&self, table: &Table) -> SchemaReport {
        let mut normalized = table.clone();
        let headers: Vec<String> = table.headers().iter().map(|h| normalize_header(h)).collect();
        for (i, header) in headers.iter().enumerate() {
            normalized.rename_column(i, header.clone());
        }

        let present: HashSet<&str> = headers.iter().map(String::as_str).collect();
        let mut filled: HashSet<&str> = HashSet::new();
        for (alias, canonical) in ALIASES {
            if present.contains(canonical) || filled.contains(canonical) {
                continue;
            }
            if let Some(idx) = headers.iter().position(|h| h == alias) {
                debug!(alias, canonical, "Resolved column alias");
                normalized.rename_column(idx, canonical);
                filled.insert(canonical);
            }
        }

        let required = self.variant.required_columns();
        let mut missing: Vec<String> = required
            .iter()
            .filter(|c| normalized.column_index(c).is_none())
            .map(|c| c.to_string())
            .collect();
        missing.sort();

        // First occurrence of a required column is used; anything else is extra
        let extra = {
            let mut seen: HashSet<&str> = HashSet::new();
            normalized
                .headers()
                .iter()
                .filter(|h| !(required.contains(&h.as_str()) && seen.insert(h.as_str())))
                .cloned()
                .collect()
        };

        SchemaReport {
            table: normalized,
            missing,
            extra,
        }
    }

    /// Like [`ColumnValidator::resolve`], failing with every missing column listed
    pub fn validate(&self, table: &Table) -> Result<SchemaReport> {
        let report = self.resolve(table);
        if !report.is_complete() {
            return Err(AppError::Validation {
                missing: report.missing,
            });
        }
        Ok(report)
    }
}
