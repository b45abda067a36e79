//! Ingestion of Arrow record batches and DataFusion tables.
//!
//! The engine never parses raw file bytes. Callers that already hold data in Arrow
//! form (or registered with a DataFusion [`SessionContext`]) convert it into a
//! [`Dataset`] here and hand that to [`analyze`](crate::analyze).
//!
//! ```rust,no_run
//! use datafusion::prelude::*;
//! use field_guard::dataset::Dataset;
//!
//! # async fn example() -> field_guard::error::Result<()> {
//! let ctx = SessionContext::new();
//! ctx.register_csv("orders", "orders.csv", CsvReadOptions::new()).await?;
//! let dataset = Dataset::from_table(&ctx, "orders").await?;
//! # Ok(())
//! # }
//! ```

mod arrow_cells;

use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use datafusion::prelude::SessionContext;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::dataset::{Column, Dataset};
use crate::error::{EngineError, Result};

pub use arrow_cells::array_to_cells;

impl Dataset {
    /// Converts record batches sharing one schema into a dataset.
    ///
    /// Column names come from the schema of the first batch.
    pub fn from_record_batches(name: impl Into<String>, batches: &[RecordBatch]) -> Result<Self> {
        let first = batches
            .first()
            .ok_or_else(|| EngineError::invalid_dataset("no record batches supplied"))?;
        Self::from_schema_and_batches(name, first.schema(), batches)
    }

    /// Collects a table registered with a DataFusion context into a dataset.
    ///
    /// The table keeps its columns even when it holds zero rows, so an empty table
    /// is reported by `analyze` as an invalid dataset rather than failing here.
    #[instrument(skip(ctx))]
    pub async fn from_table(ctx: &SessionContext, table: &str) -> Result<Self> {
        let df = ctx.table(table).await?;
        let schema: SchemaRef = Arc::new(df.schema().as_arrow().clone());
        let batches = df.collect().await?;
        debug!(
            table = %table,
            batches = batches.len(),
            columns = schema.fields().len(),
            "Collected table for profiling"
        );
        Self::from_schema_and_batches(table, schema, &batches)
    }

    fn from_schema_and_batches(
        name: impl Into<String>,
        schema: SchemaRef,
        batches: &[RecordBatch],
    ) -> Result<Self> {
        let total_rows: usize = batches.iter().map(RecordBatch::num_rows).sum();
        let mut columns: Vec<Column> = schema
            .fields()
            .iter()
            .map(|f| Column::new(f.name().clone(), Vec::with_capacity(total_rows)))
            .collect();

        for batch in batches {
            if batch.num_columns() != columns.len() {
                return Err(EngineError::invalid_dataset(format!(
                    "record batch has {} columns, expected {}",
                    batch.num_columns(),
                    columns.len()
                )));
            }
            for (column, array) in columns.iter_mut().zip(batch.columns()) {
                column.values.extend(array_to_cells(array.as_ref())?);
            }
        }

        Dataset::try_new(name, columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::CellValue;
    use arrow::array::{Float64Array, Int32Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use datafusion::datasource::MemTable;

    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int32, false),
            Field::new("score", DataType::Float64, true),
            Field::new("label", DataType::Utf8, true),
        ]))
    }

    fn batch(ids: Vec<i32>, scores: Vec<Option<f64>>, labels: Vec<Option<&str>>) -> RecordBatch {
        RecordBatch::try_new(
            schema(),
            vec![
                Arc::new(Int32Array::from(ids)),
                Arc::new(Float64Array::from(scores)),
                Arc::new(StringArray::from(labels)),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_from_record_batches_concatenates() {
        let batches = vec![
            batch(vec![1, 2], vec![Some(1.5), None], vec![Some("a"), Some("b")]),
            batch(vec![3], vec![Some(2.5)], vec![None]),
        ];
        let dataset = Dataset::from_record_batches("t", &batches).unwrap();

        assert_eq!(dataset.row_count(), 3);
        assert_eq!(dataset.column_names(), vec!["id", "score", "label"]);
        let id = dataset.column("id").unwrap();
        assert_eq!(id.values[2], CellValue::Int(3));
        let score = dataset.column("score").unwrap();
        assert_eq!(score.values[1], CellValue::Missing);
        let label = dataset.column("label").unwrap();
        assert_eq!(label.values[0], CellValue::Text("a".to_string()));
        assert_eq!(label.values[2], CellValue::Missing);
    }

    #[test]
    fn test_from_record_batches_requires_a_batch() {
        let result = Dataset::from_record_batches("t", &[]);
        assert!(matches!(result, Err(EngineError::InvalidDataset { .. })));
    }

    #[tokio::test]
    async fn test_from_table() {
        let ctx = SessionContext::new();
        let table = MemTable::try_new(
            schema(),
            vec![vec![batch(
                vec![1, 2, 3, 4],
                vec![Some(0.1), Some(0.2), None, Some(0.4)],
                vec![Some("x"), Some("y"), Some("x"), None],
            )]],
        )
        .unwrap();
        ctx.register_table("scores", Arc::new(table)).unwrap();

        let dataset = Dataset::from_table(&ctx, "scores").await.unwrap();
        assert_eq!(dataset.name(), "scores");
        assert_eq!(dataset.row_count(), 4);
        assert_eq!(dataset.column("score").unwrap().non_missing_count(), 3);
    }

    #[tokio::test]
    async fn test_from_table_unknown_table() {
        let ctx = SessionContext::new();
        let result = Dataset::from_table(&ctx, "missing").await;
        assert!(matches!(result, Err(EngineError::DataFusion(_))));
    }
}
