use crate::error::{AppError, Result};
use crate::ml::classifier::Classifier;
use crate::ml::encoding::LabelDecoder;
use crate::ml::features::FeatureMatrix;
use crate::ml::models::{PredictionResult, RankedAttack};
use ndarray::{Array1, Array2, Axis};
use std::cmp::Ordering;
use tracing::debug;

/// Allowed deviation of a probability row sum from 1.0
pub const ROW_SUM_TOLERANCE: f64 = 1e-6;

/// Number of ranked attack types returned when nothing else is configured
pub const DEFAULT_TOP_K: usize = 5;

/// Check that every row is a probability distribution
pub fn check_distributions(proba: &Array2<f64>) -> Result<()> {
    for (i, row) in proba.rows().into_iter().enumerate() {
        if row.iter().any(|p| !p.is_finite() || *p < 0.0 || *p > 1.0) {
            return Err(AppError::Model(format!(
                "row {} has probabilities outside [0, 1]",
                i
            )));
        }
        let sum = row.sum();
        if (sum - 1.0).abs() > ROW_SUM_TOLERANCE {
            return Err(AppError::Model(format!(
                "row {} probabilities sum to {}",
                i, sum
            )));
        }
    }
    Ok(())
}

/// Mean class probability over all rows
pub fn aggregate_mean(proba: &Array2<f64>) -> Result<Array1<f64>> {
    if proba.nrows() == 0 {
        return Err(AppError::EmptyInput);
    }
    check_distributions(proba)?;
    proba.mean_axis(Axis(0)).ok_or(AppError::EmptyInput)
}

/// Decode and rank mean probabilities, highest first, ties by class id
pub fn rank(
    mean: &Array1<f64>,
    classes: &[usize],
    decoder: &LabelDecoder,
    top_k: usize,
) -> Result<PredictionResult> {
    if mean.len() != classes.len() {
        return Err(AppError::Model(format!(
            "{} probabilities for {} classes",
            mean.len(),
            classes.len()
        )));
    }

    let mut scored: Vec<(usize, f64)> = classes.iter().copied().zip(mean.iter().copied()).collect();
    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });

    let ranked = scored
        .into_iter()
        .take(top_k)
        .enumerate()
        .map(|(i, (class_id, probability))| {
            Ok(RankedAttack {
                rank: i + 1,
                class_id,
                label: decoder.decode(class_id)?.to_string(),
                probability,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(PredictionResult { ranked })
}

/// Run the model over every row and rank attack types by mean probability
pub fn predict(
    features: &FeatureMatrix,
    model: &dyn Classifier,
    decoder: &LabelDecoder,
    top_k: usize,
) -> Result<PredictionResult> {
    if features.n_rows() == 0 {
        return Err(AppError::EmptyInput);
    }
    if features.n_features() != model.n_features() {
        return Err(AppError::Model(format!(
            "feature matrix has {} columns, model expects {}",
            features.n_features(),
            model.n_features()
        )));
    }

    let proba = model.predict_proba(features.values())?;
    let mean = aggregate_mean(&proba)?;
    debug!(rows = proba.nrows(), classes = mean.len(), "Aggregated class probabilities");

    rank(&mean, model.classes(), decoder, top_k)
}
