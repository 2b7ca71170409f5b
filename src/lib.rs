//! Attack-type prediction from vulnerability lists, plus CVSS severity banding.
//!
//! Uploaded tables are validated against a required-column schema, encoded with the
//! encoders persisted next to a tree-ensemble model, and scored row by row. Per-row
//! class probabilities are averaged over the whole upload and the top attack types
//! are reported.

pub mod config;
pub mod error;
pub mod ml;
pub mod models;
pub mod severity;
pub mod table;

pub use config::Config;
pub use error::{AppError, Result};
pub use ml::{ModelStore, PredictionReport, PredictionService, SchemaVariant};
pub use severity::{classify, SeverityBand};
pub use table::Table;
