//! Property-based tests for the profiling engine.
//!
//! These check the invariants every profile must satisfy whatever the input:
//!
//! - Quartiles are ordered: min <= Q1 <= median <= Q3 <= max
//! - Completeness and missing ratio sum to one; distinct count never exceeds the
//!   non-missing count
//! - Pearson r stays in [-1, 1]; the chi-square statistic is non-negative and
//!   Cramér's V stays in [0, 1]
//! - Frequency tables account for every value and are sorted by count
//! - The isolation ensemble is a pure function of its inputs and seed
//! - Rule synthesis is a pure function of the profile

use field_guard::analyzers::inference::{TypeInferenceEngine, TypedColumn};
use field_guard::analyzers::quality::measure_column;
use field_guard::analyzers::{
    FrequencyTable, IsolationForest, NumericSummary, RelationshipAnalyzer, RuleSynthesizer,
};
use field_guard::cancellation::CancellationToken;
use field_guard::config::AnalysisConfig;
use field_guard::dataset::{CellValue, Column, Dataset};
use proptest::prelude::*;

fn infer(name: &str, values: Vec<CellValue>, index: usize) -> TypedColumn {
    let column = Column::new(name, values);
    TypeInferenceEngine::default()
        .infer(&column, index, &CancellationToken::new())
        .unwrap_or_else(|_| TypedColumn::unknown(name, index, 0))
}

fn floats(values: &[f64]) -> Vec<CellValue> {
    values.iter().copied().map(CellValue::Float).collect()
}

// ============================================================================
// Statistical summaries
// ============================================================================

proptest! {
    /// Quartiles by linear interpolation can never leave the observed range or
    /// cross each other.
    #[test]
    fn test_quartiles_are_ordered(values in prop::collection::vec(-1.0e6f64..1.0e6, 1..200)) {
        let summary = NumericSummary::compute(&values).unwrap();
        prop_assert!(summary.min <= summary.q1);
        prop_assert!(summary.q1 <= summary.median);
        prop_assert!(summary.median <= summary.q3);
        prop_assert!(summary.q3 <= summary.max);
        prop_assert!(summary.iqr >= 0.0);
        prop_assert!(summary.std_dev >= 0.0);
        prop_assert_eq!(summary.count, values.len());
    }

    /// Every label lands in an entry or in the remainder, and entries are sorted
    /// by count.
    #[test]
    fn test_frequency_table_accounts_for_every_value(
        labels in prop::collection::vec(prop::sample::select(vec!["a", "b", "c", "d", "e", "f"]), 1..150),
        top_n in 1usize..8
    ) {
        let table = FrequencyTable::build(labels.iter().copied(), top_n);
        let listed: usize = table.entries.iter().map(|e| e.count).sum();
        prop_assert_eq!(listed + table.other_count, labels.len());
        prop_assert_eq!(table.total, labels.len());
        prop_assert!(table.entries.len() <= top_n);
        prop_assert!(table.entries.windows(2).all(|w| w[0].count >= w[1].count));
    }
}

// ============================================================================
// Quality metrics
// ============================================================================

proptest! {
    #[test]
    fn test_completeness_and_distinctness_bounds(
        values in prop::collection::vec(prop::option::of(-50i64..50), 1..120)
    ) {
        let cells: Vec<CellValue> = values.iter().copied().map(CellValue::from).collect();
        let column = Column::new("x", cells.clone());
        let typed = infer("x", cells, 0);
        let quality = measure_column(&column, &typed, &CancellationToken::new()).unwrap();

        let present = values.iter().filter(|v| v.is_some()).count();
        prop_assert_eq!(quality.non_missing, present);
        prop_assert!((quality.completeness + quality.missing_ratio - 1.0).abs() < 1e-12);
        prop_assert!(quality.distinct_count <= quality.non_missing);
        match quality.distinctness {
            Some(d) => prop_assert!(d > 0.0 && d <= 1.0),
            None => prop_assert_eq!(present, 0),
        }
    }
}

// ============================================================================
// Relationships
// ============================================================================

proptest! {
    #[test]
    fn test_pearson_is_bounded(
        pairs in prop::collection::vec((-1.0e4f64..1.0e4, -1.0e4f64..1.0e4), 3..80)
    ) {
        let (xs, ys): (Vec<f64>, Vec<f64>) = pairs.into_iter().unzip();
        let a = infer("a", floats(&xs), 0);
        let b = infer("b", floats(&ys), 1);
        let analyzer = RelationshipAnalyzer::new(&AnalysisConfig::default());

        if let Ok(edge) = analyzer.pearson(&a, &b, &CancellationToken::new()) {
            prop_assert!((-1.0..=1.0).contains(&edge.value));
            if let Some(p) = edge.p_value {
                prop_assert!((0.0..=1.0).contains(&p));
            }
        }
    }

    #[test]
    fn test_chi_square_is_non_negative(
        pairs in prop::collection::vec(
            (prop::sample::select(vec!["red", "green", "blue"]), prop::sample::select(vec!["s", "m", "l", "xl"])),
            20..150
        )
    ) {
        let a = infer("colour", pairs.iter().map(|(c, _)| CellValue::from(*c)).collect(), 0);
        let b = infer("size", pairs.iter().map(|(_, s)| CellValue::from(*s)).collect(), 1);
        let analyzer = RelationshipAnalyzer::new(&AnalysisConfig::default());

        if let Ok(edge) = analyzer.chi_square(&a, &b, &CancellationToken::new()) {
            prop_assert!(edge.value >= 0.0);
            let v = edge.association_strength.unwrap();
            prop_assert!((0.0..=1.0).contains(&v));
            prop_assert!((0.0..=1.0).contains(&edge.p_value.unwrap()));
        }
    }
}

// ============================================================================
// Outliers and rules
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_isolation_forest_is_deterministic(
        values in prop::collection::vec(-1.0e3f64..1.0e3, 2..120),
        seed in any::<u64>()
    ) {
        let token = CancellationToken::new();
        let first = IsolationForest::fit(&values, 20, 64, seed, &token).unwrap();
        let second = IsolationForest::fit(&values, 20, 64, seed, &token).unwrap();
        for value in &values {
            let score = first.score(*value);
            prop_assert!(score > 0.0 && score <= 1.0);
            prop_assert_eq!(score, second.score(*value));
        }
    }

    #[test]
    fn test_rule_synthesis_is_pure(
        numbers in prop::collection::vec(prop::option::of(0i64..500), 4..40),
        seed in any::<u64>()
    ) {
        let labels: Vec<&str> = (0..numbers.len()).map(|i| ["on", "off"][i % 2]).collect();
        let dataset = Dataset::builder("generated")
            .column_from("n", numbers)
            .column_from("state", labels)
            .build()
            .unwrap();
        let config = AnalysisConfig::builder()
            .isolation_seed(seed)
            .max_concurrency(2)
            .build()
            .unwrap();
        let profile = field_guard::analyze(&dataset, &config).unwrap();

        let synthesizer = RuleSynthesizer::from_config(&config);
        let rules = synthesizer.synthesize(&profile);
        prop_assert_eq!(&rules, &synthesizer.synthesize(&profile));
        prop_assert_eq!(&rules, &profile.rules);
    }
}
