/// Integration tests for CVSS severity banding
///
/// These tests verify:
/// - Band boundaries
/// - Rejection of out-of-range and NaN scores
/// - Monotonic banding over the valid range
/// - Annotating an uploaded CSV

use predict_attack::{
    error::AppError,
    severity::{annotate, classify, SeverityBand},
    table::{read_csv, write_csv},
};
use proptest::prelude::*;

#[test]
fn test_band_boundaries() {
    let cases = [
        (0.0, SeverityBand::None),
        (0.1, SeverityBand::Low),
        (3.9, SeverityBand::Low),
        (4.0, SeverityBand::Medium),
        (6.9, SeverityBand::Medium),
        (7.0, SeverityBand::High),
        (8.9, SeverityBand::High),
        (9.0, SeverityBand::Critical),
        (10.0, SeverityBand::Critical),
    ];

    for (score, expected) in cases {
        assert_eq!(classify(score).unwrap(), expected, "score {}", score);
    }
}

#[test]
fn test_invalid_scores_are_rejected() {
    for score in [-0.1, 10.1, 100.0, f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
        assert!(
            matches!(classify(score), Err(AppError::OutOfRange { .. })),
            "score {} should be rejected",
            score
        );
    }
}

#[test]
fn test_annotate_uploaded_csv() {
    let table = read_csv("id,CVSS Score\nA,9.8\nB,\nC,4.2\nD,11\n").unwrap();

    let annotation = annotate(&table).unwrap();
    assert_eq!(annotation.source_column, "CVSS Score");
    assert_eq!(
        write_csv(&annotation.table),
        "id,CVSS Score,severity_band\nA,9.8,Critical\nB,,\nC,4.2,Medium\nD,11,\n"
    );

    let rows: Vec<usize> = annotation.rejected.iter().map(|r| r.row).collect();
    assert_eq!(rows, vec![2, 4]);
}

#[test]
fn test_annotate_without_cvss_column() {
    let table = read_csv("id,severity\nA,HIGH\n").unwrap();

    match annotate(&table).unwrap_err() {
        AppError::Configuration(message) => assert!(message.contains("id, severity")),
        other => panic!("unexpected: {other:?}"),
    }
}

proptest! {
    #[test]
    fn valid_scores_fall_inside_their_band(score in 0.0f64..=10.0) {
        let band = classify(score).unwrap();
        prop_assert!(score <= band.upper_bound());

        if band.index() > 0 {
            let previous = SeverityBand::all()[band.index() as usize - 1];
            prop_assert!(score > previous.upper_bound());
        }
    }

    #[test]
    fn banding_is_monotonic(a in 0.0f64..=10.0, b in 0.0f64..=10.0) {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(classify(low).unwrap() <= classify(high).unwrap());
    }

    #[test]
    fn scores_above_ten_are_rejected(excess in 1e-9f64..1e6) {
        let rejected = matches!(classify(10.0 + excess), Err(AppError::OutOfRange { .. }));
        prop_assert!(rejected);
    }

    #[test]
    fn negative_scores_are_rejected(deficit in 1e-9f64..1e6) {
        let rejected = matches!(classify(-deficit), Err(AppError::OutOfRange { .. }));
        prop_assert!(rejected);
    }
}
