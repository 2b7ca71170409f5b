use crate::error::{AppError, Result};
use crate::ml::encoding::{CategoryEncoding, EncoderBundle};
use crate::ml::schema::{
    normalize_header, SchemaVariant, BANK_RELEVANCE, CVSS_SCORE, FAMILY, SEVERITY, VERIFIED_FLAG,
};
use crate::models::{parse_cvss_score, parse_flag, VulnerabilityRecord};
use crate::table::Table;
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Numeric features in the model's column order (n_rows × n_features)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    columns: Vec<String>,
    values: Array2<f64>,
}

impl FeatureMatrix {
    pub fn new(columns: Vec<String>, values: Array2<f64>) -> Result<Self> {
        if columns.len() != values.ncols() {
            return Err(AppError::Internal(format!(
                "feature matrix has {} columns but {} names",
                values.ncols(),
                columns.len()
            )));
        }
        Ok(Self { columns, values })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn row(&self, index: usize) -> ArrayView1<'_, f64> {
        self.values.row(index)
    }

    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.values.ncols()
    }
}

/// Turns validated vulnerability tables into model-ready feature matrices
#[derive(Debug, Clone)]
pub struct FeatureEncoder {
    /// Schema the uploaded table follows
    variant: SchemaVariant,

    /// Column order the model was trained with
    feature_columns: Vec<String>,

    /// Severity encoding
    severity: CategoryEncoding,

    /// Family encoding
    family: CategoryEncoding,

    /// Bank relevance encoding (banking schema only)
    bank_relevance: Option<CategoryEncoding>,
}

impl FeatureEncoder {
    /// Create an encoder; fails if the bundle lacks an encoder the schema needs
    pub fn new(
        variant: SchemaVariant,
        encoders: &EncoderBundle,
        feature_columns: Vec<String>,
    ) -> Result<Self> {
        encoders.require(variant.categorical_columns())?;

        let bank_relevance = match variant {
            SchemaVariant::Banking => Some(encoders.encoding(BANK_RELEVANCE)?.clone()),
            SchemaVariant::Core => None,
        };

        Ok(Self {
            variant,
            feature_columns: feature_columns.iter().map(|c| normalize_header(c)).collect(),
            severity: encoders.encoding(SEVERITY)?.clone(),
            family: encoders.encoding(FAMILY)?.clone(),
            bank_relevance,
        })
    }

    /// Feature column order applied to every matrix
    pub fn feature_columns(&self) -> &[String] {
        &self.feature_columns
    }

    /// Read typed records from a table whose headers are already canonical
    pub fn records(&self, table: &Table) -> Result<Vec<VulnerabilityRecord>> {
        let required = self.variant.required_columns();
        let mut indices = Vec::with_capacity(required.len());
        let mut missing = Vec::new();
        for column in required {
            match table.column_index(column) {
                Some(idx) => indices.push(idx),
                None => missing.push(column.to_string()),
            }
        }
        if !missing.is_empty() {
            missing.sort();
            return Err(AppError::Validation { missing });
        }

        let records = table
            .rows()
            .iter()
            .map(|row| {
                let mut record = VulnerabilityRecord::new(
                    parse_cvss_score(&row[indices[0]]),
                    row[indices[1]].trim(),
                    row[indices[2]].trim(),
                )
                .with_verified(parse_flag(&row[indices[3]]));
                if let Some(&idx) = indices.get(4) {
                    record = record.with_bank_relevance(row[idx].trim());
                }
                record
            })
            .collect();

        Ok(records)
    }

    /// Encode one record in schema order, paired with column names
    pub fn encode_record(&self, record: &VulnerabilityRecord) -> Vec<(&'static str, f64)> {
        let mut features = vec![
            (CVSS_SCORE, record.cvss_score),
            (SEVERITY, self.severity.encode(&record.severity) as f64),
            (FAMILY, self.family.encode(&record.family) as f64),
            (VERIFIED_FLAG, if record.verified_flag { 1.0 } else { 0.0 }),
        ];
        if let Some(encoding) = &self.bank_relevance {
            let value = record.bank_relevance.as_deref().unwrap_or_default();
            features.push((BANK_RELEVANCE, encoding.encode(value) as f64));
        }
        features
    }

    /// Encode a validated table and reorder the result to the feature-column list.
    ///
    /// Columns in the list that the schema does not produce are filled with 0.
    pub fn encode(&self, table: &Table) -> Result<FeatureMatrix> {
        let records = self.records(table)?;
        let native = self.variant.required_columns();

        let absent: Vec<&str> = self
            .feature_columns
            .iter()
            .map(String::as_str)
            .filter(|c| !native.contains(c))
            .collect();
        if !absent.is_empty() {
            warn!(columns = ?absent, "Feature columns not produced by the encoder; filling with 0");
        }

        let mut values = Array2::zeros((records.len(), self.feature_columns.len()));
        for (i, record) in records.iter().enumerate() {
            let encoded = self.encode_record(record);
            for (j, column) in self.feature_columns.iter().enumerate() {
                if let Some((_, value)) = encoded.iter().find(|(name, _)| name == column) {
                    values[[i, j]] = *value;
                }
            }
        }

        debug!(
            rows = records.len(),
            features = self.feature_columns.len(),
            "Encoded feature matrix"
        );

        FeatureMatrix::new(self.feature_columns.clone(), values)
    }
}
