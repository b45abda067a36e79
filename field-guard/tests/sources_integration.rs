//! Integration tests for profiling data registered with DataFusion.

#[cfg(feature = "test-utils")]
mod tests {
    use field_guard::analyzers::{
        AnalysisRunner, OutlierMethod, RuleKind, RuleStrength, SemanticType,
    };
    use field_guard::dataset::{CellValue, Dataset};
    use field_guard::error::EngineError;
    use field_guard::test_fixtures::{
        create_context_with_nulls, create_context_with_outliers, deterministic_config,
    };

    #[tokio::test]
    async fn test_profile_table_with_nulls() {
        let ctx = create_context_with_nulls().await.unwrap();
        let dataset = Dataset::from_table(&ctx, "customers").await.unwrap();
        assert_eq!(dataset.row_count(), 10);
        assert_eq!(
            dataset.column_names(),
            vec!["id", "name", "active", "age", "score"]
        );
        assert_eq!(dataset.column("name").unwrap().values[1], CellValue::Missing);

        let profile = AnalysisRunner::new(deterministic_config())
            .run_async(&dataset)
            .await
            .unwrap();

        let name = profile.column("name").unwrap();
        assert_eq!(name.semantic_type, SemanticType::Text);
        assert!((name.completeness - 0.7).abs() < 1e-12);

        let active = profile.column("active").unwrap();
        assert_eq!(active.semantic_type, SemanticType::Boolean);
        assert!((active.missing_ratio - 0.1).abs() < 1e-12);

        let age = profile.column("age").unwrap();
        assert_eq!(age.semantic_type, SemanticType::Numeric);
        let nullability = profile
            .rules_for("age")
            .find(|r| r.kind == RuleKind::Nullability)
            .unwrap();
        assert_eq!(nullability.strength, RuleStrength::Advisory);

        assert_eq!(profile.dataset.missing_cells, 3 + 1 + 2 + 3);
    }

    #[tokio::test]
    async fn test_profile_multi_batch_sensor_table() {
        let ctx = create_context_with_outliers().await.unwrap();
        let dataset = Dataset::from_table(&ctx, "sensor_readings").await.unwrap();
        assert_eq!(dataset.row_count(), 15);

        let profile = AnalysisRunner::new(deterministic_config())
            .run_async(&dataset)
            .await
            .unwrap();

        assert_eq!(
            profile.column("timestamp").unwrap().semantic_type,
            SemanticType::Datetime
        );
        let zscore: Vec<usize> = profile
            .outliers_by_method(OutlierMethod::ZScore)
            .filter(|o| o.column == "temperature")
            .map(|o| o.row_index)
            .collect();
        assert_eq!(zscore, vec![5, 10]);
        let iqr: Vec<usize> = profile
            .outliers_by_method(OutlierMethod::Iqr)
            .filter(|o| o.column == "temperature")
            .map(|o| o.row_index)
            .collect();
        assert!(iqr.contains(&5) && iqr.contains(&10));
        assert_eq!(
            profile.outliers_by_method(OutlierMethod::ZScore).next().unwrap().value,
            CellValue::Float(85.0)
        );
    }

    #[tokio::test]
    async fn test_empty_table_is_invalid_for_analysis() {
        let ctx = create_context_with_nulls().await.unwrap();
        ctx.sql("CREATE VIEW nobody AS SELECT * FROM customers WHERE id < 0")
            .await
            .unwrap();
        let dataset = Dataset::from_table(&ctx, "nobody").await.unwrap();
        assert_eq!(dataset.row_count(), 0);
        assert_eq!(dataset.column_count(), 5);

        let result = AnalysisRunner::new(deterministic_config())
            .run_async(&dataset)
            .await;
        assert!(matches!(result, Err(EngineError::InvalidDataset { .. })));
    }
}
