//! Cancellation and per-unit timeout behavior of a full run.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use field_guard::analyzers::{AnalysisRunner, ProfileStatus, SkipReason};
use field_guard::cancellation::CancellationToken;
use field_guard::config::AnalysisConfig;
use field_guard::dataset::Dataset;
use field_guard::error::EngineError;

fn config() -> AnalysisConfig {
    AnalysisConfig::builder()
        .isolation_seed(3)
        .max_concurrency(2)
        .build()
        .unwrap()
}

fn measurements(rows: usize) -> Dataset {
    Dataset::builder("measurements")
        .column_from("a", (0..rows).map(|i| (i % 97) as f64 * 1.5))
        .column_from("b", (0..rows).map(|i| ((i * 7) % 31) as i64))
        .column_from("c", (0..rows).map(|i| ["x", "y", "z"][i % 3]))
        .build()
        .unwrap()
}

#[test]
fn test_cancel_before_start_is_an_error() {
    let token = CancellationToken::new();
    token.cancel();
    let result = AnalysisRunner::new(config())
        .cancellation_token(token)
        .run(&measurements(50));
    assert!(matches!(
        result,
        Err(EngineError::Cancelled { completed_units: 0 })
    ));
}

#[test]
fn test_cancel_after_first_unit_returns_partial_profile() {
    let token = CancellationToken::new();
    let trigger = token.clone();
    let ticks = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&ticks);

    let profile = AnalysisRunner::new(config())
        .cancellation_token(token.clone())
        .on_progress(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                trigger.cancel();
            }
        })
        .run(&measurements(500))
        .unwrap();

    assert!(token.is_cancelled());
    assert_eq!(profile.status, ProfileStatus::Cancelled);
    assert!(profile.rules.is_empty());
    assert_eq!(profile.columns.len(), 3);
    assert!(profile
        .diagnostics
        .iter()
        .any(|d| d.reason == SkipReason::Cancelled));
}

#[test]
fn test_token_is_not_shared_between_runners() {
    let cancelled = CancellationToken::new();
    cancelled.cancel();
    let _ = AnalysisRunner::new(config())
        .cancellation_token(cancelled)
        .run(&measurements(20));

    let profile = AnalysisRunner::new(config()).run(&measurements(20)).unwrap();
    assert!(profile.is_complete());
    assert!(!profile.rules.is_empty());
}

#[test]
fn test_unit_timeout_is_recorded_as_diagnostic() {
    let config = AnalysisConfig::builder()
        .isolation_seed(3)
        .max_concurrency(1)
        .per_unit_timeout_ms(1)
        .build()
        .unwrap();
    let profile = field_guard::analyze(&measurements(300_000), &config).unwrap();

    assert!(profile.is_complete());
    assert!(profile
        .diagnostics
        .iter()
        .any(|d| d.reason == SkipReason::Timeout { timeout_ms: 1 }));
    assert_eq!(profile.columns.len(), 3);
}
