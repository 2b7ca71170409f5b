//! Add a severity band column to a table that carries CVSS scores

use crate::error::{AppError, Result};
use crate::severity::classify;
use crate::table::Table;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Header names accepted as the CVSS column, after lower-casing and folding spaces to `_`
const CVSS_CANDIDATES: [&str; 3] = ["cvss_score", "cvss", "cvss3"];

/// Name of the appended column
pub const SEVERITY_BAND_COLUMN: &str = "severity_band";

/// A row whose score could not be banded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedScore {
    /// 1-based data row number (header excluded)
    pub row: usize,
    pub value: String,
    pub reason: String,
}

/// Result of annotating a table
#[derive(Debug, Clone)]
pub struct SeverityAnnotation {
    /// Input table plus the `severity_band` column
    pub table: Table,

    /// Header the scores were read from
    pub source_column: String,

    /// Rows left with an empty band
    pub rejected: Vec<RejectedScore>,
}

fn fold_header(header: &str) -> String {
    header.trim().to_lowercase().replace(' ', "_")
}

/// Locate the CVSS column by its candidate names
pub fn find_cvss_column(table: &Table) -> Option<usize> {
    table
        .headers()
        .iter()
        .position(|h| CVSS_CANDIDATES.contains(&fold_header(h).as_str()))
}

/// Append a `severity_band` column computed from the table's CVSS column.
///
/// Empty, unparseable and out-of-range scores leave the band empty and are
/// all reported in [`SeverityAnnotation::rejected`].
pub fn annotate(table: &Table) -> Result<SeverityAnnotation> {
    let column = find_cvss_column(table).ok_or_else(|| {
        AppError::Configuration(format!(
            "could not find a CVSS column; columns available: [{}]",
            table.headers().join(", ")
        ))
    })?;
    let source_column = table.headers()[column].clone();
    debug!(column = %source_column, rows = table.n_rows(), "Annotating severity bands");

    let mut bands = Vec::with_capacity(table.n_rows());
    let mut rejected = Vec::new();

    for (i, raw) in table.column(column).enumerate() {
        let value = raw.trim();
        let outcome = if value.is_empty() {
            Err("missing score".to_string())
        } else {
            match value.parse::<f64>() {
                Ok(score) => classify(score).map_err(|e| e.to_string()),
                Err(_) => Err("not a number".to_string()),
            }
        };

        match outcome {
            Ok(band) => bands.push(band.to_string()),
            Err(reason) => {
                bands.push(String::new());
                rejected.push(RejectedScore {
                    row: i + 1,
                    value: raw.to_string(),
                    reason,
                });
            }
        }
    }

    if !rejected.is_empty() {
        warn!(count = rejected.len(), "Some scores could not be banded");
    }

    let mut annotated = table.clone();
    annotated.push_column(SEVERITY_BAND_COLUMN, bands);

    Ok(SeverityAnnotation {
        table: annotated,
        source_column,
        rejected,
    })
}
