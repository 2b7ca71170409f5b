pub mod record;

pub use record::{parse_cvss_score, parse_flag, VulnerabilityRecord, DEFAULT_CVSS_SCORE};
