//! CVSS severity banding
//!
//! Maps a CVSS base score onto one of five ordered bands. Scores outside
//! `[0.0, 10.0]` (and NaN) are rejected instead of being clamped.

pub mod annotate;

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

pub use annotate::{annotate, RejectedScore, SeverityAnnotation};

/// Lowest valid CVSS score
pub const MIN_SCORE: f64 = 0.0;

/// Highest valid CVSS score
pub const MAX_SCORE: f64 = 10.0;

/// Qualitative severity band for a CVSS score
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, EnumString,
    EnumIter, Display,
)]
pub enum SeverityBand {
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl SeverityBand {
    /// Numeric index of the band (None = 0 .. Critical = 4)
    pub fn index(&self) -> u8 {
        match self {
            SeverityBand::None => 0,
            SeverityBand::Low => 1,
            SeverityBand::Medium => 2,
            SeverityBand::High => 3,
            SeverityBand::Critical => 4,
        }
    }

    /// Inclusive upper score bound of the band
    pub fn upper_bound(&self) -> f64 {
        match self {
            SeverityBand::None => 0.0,
            SeverityBand::Low => 3.9,
            SeverityBand::Medium => 6.9,
            SeverityBand::High => 8.9,
            SeverityBand::Critical => MAX_SCORE,
        }
    }

    /// All bands, lowest first
    pub fn all() -> Vec<SeverityBand> {
        SeverityBand::iter().collect()
    }
}

/// Classify a CVSS score into its severity band.
///
/// Each band covers the half-open interval above the previous band's upper
/// bound, so 3.95 is `Medium` and 8.95 is `Critical`.
pub fn classify(score: f64) -> Result<SeverityBand> {
    if !(MIN_SCORE..=MAX_SCORE).contains(&score) {
        return Err(AppError::OutOfRange { score });
    }

    let band = SeverityBand::iter()
        .find(|band| score <= band.upper_bound())
        .unwrap_or(SeverityBand::Critical);

    Ok(band)
}
