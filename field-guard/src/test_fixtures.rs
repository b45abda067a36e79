//! Common test fixtures for profiling scenarios.
//!
//! In-memory datasets with known shapes (outliers, missing values, duplicates, a
//! daily series, correlated measurements) plus DataFusion contexts holding the same
//! kind of data, for exercising the ingestion path.

use std::sync::Arc;

use arrow::array::{BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::{Duration, NaiveDate};
use datafusion::datasource::MemTable;
use datafusion::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::AnalysisConfig;
use crate::dataset::{CellValue, Dataset};
use crate::error::Result;

/// Configuration with a fixed isolation seed and small concurrency.
pub fn deterministic_config() -> AnalysisConfig {
    AnalysisConfig {
        isolation_seed: Some(42),
        max_concurrency: 2,
        ..AnalysisConfig::default()
    }
}

/// Orders with a numeric outlier, a Y/N flag, a status label, free text and dates.
pub fn orders_dataset() -> Dataset {
    let amounts = [
        12.5, 13.0, 11.75, 12.25, 14.0, 12.0, 13.5, 12.75, 11.5, 13.25, 12.5, 980.0,
    ];
    let paid = ["Y", "N", "Y", "Y", "Y", "N", "Y", "Y", "N", "Y", "Y", "Y"];
    let status = [
        "shipped", "pending", "shipped", "shipped", "cancelled", "pending", "shipped",
        "shipped", "pending", "shipped", "shipped", "shipped",
    ];
    let notes = [
        "Leave at the door",
        "Call before delivery",
        "Fragile, handle with care",
        "Gift wrap requested",
        "Customer asked for a refund",
        "Deliver after 5pm",
        "Back entrance",
        "Ring twice",
        "Use side gate #2",
        "No notes ~ see ticket",
        "Signature required",
        "Bulk order, pallet",
    ];
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date");

    Dataset::builder("orders")
        .column_from("order_id", 1..=12i64)
        .column_from("amount", amounts)
        .column_from("paid", paid)
        .column_from("status", status)
        .column_from("note", notes)
        .column_from(
            "order_date",
            (0..12).map(|d| (start + Duration::days(d)).format("%Y-%m-%d").to_string()),
        )
        .build()
        .expect("orders fixture is well formed")
}

/// A dataset whose two columns have no values at all.
pub fn sparse_dataset() -> Dataset {
    Dataset::builder("sparse")
        .column_from("id", 1..=6i64)
        .column("empty_a", vec![CellValue::Missing; 6])
        .column("empty_b", vec![CellValue::Text("  ".to_string()); 6])
        .build()
        .expect("sparse fixture is well formed")
}

/// `height` and `weight` with Pearson r of about 0.96, plus an unrelated column.
pub fn correlated_dataset() -> Dataset {
    let height = [150.0, 155.0, 160.0, 165.0, 170.0, 175.0, 180.0, 185.0, 190.0, 195.0];
    let weight = [52.0, 60.0, 58.0, 66.0, 64.0, 75.0, 72.0, 80.0, 86.0, 83.0];
    let shoe = ["a", "b", "c", "d", "e", "f", "g", "h", "i", "j"];
    Dataset::builder("people")
        .column_from("height", height)
        .column_from("weight", weight)
        .column_from("code", shoe)
        .build()
        .expect("correlated fixture is well formed")
}

/// Daily sales over `days` days with a weekly cycle and a linear trend.
pub fn daily_sales_dataset(days: usize) -> Dataset {
    let pattern = [3.0, -1.0, -1.0, -1.0, -1.0, 0.0, 1.0];
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date");
    Dataset::builder("sales")
        .column_from(
            "day",
            (0..days).map(|d| (start + Duration::days(d as i64)).format("%Y-%m-%d").to_string()),
        )
        .column_from(
            "sales",
            (0..days).map(|d| 100.0 + 0.5 * d as f64 + pattern[d % pattern.len()]),
        )
        .build()
        .expect("sales fixture is well formed")
}

/// Random mixed-type dataset for benchmarks and property tests.
///
/// Columns: `value` (normal-ish floats with rare spikes), `count` (integers),
/// `segment` (five labels), `flag` (yes/no) and `score` (correlated with `value`).
pub fn synthetic_dataset(rows: usize, seed: u64) -> Dataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let segments = ["north", "south", "east", "west", "central"];
    let mut value = Vec::with_capacity(rows);
    let mut count = Vec::with_capacity(rows);
    let mut segment = Vec::with_capacity(rows);
    let mut flag = Vec::with_capacity(rows);
    let mut score = Vec::with_capacity(rows);

    for _ in 0..rows {
        let base: f64 = (0..6).map(|_| rng.random_range(-1.0..1.0)).sum::<f64>() * 10.0 + 100.0;
        let v = if rng.random_range(0..200) == 0 { base * 8.0 } else { base };
        value.push(CellValue::Float(v));
        count.push(CellValue::Int(rng.random_range(0..1_000)));
        segment.push(CellValue::from(segments[rng.random_range(0..segments.len())]));
        flag.push(CellValue::from(if rng.random_bool(0.3) { "yes" } else { "no" }));
        score.push(if rng.random_range(0..50) == 0 {
            CellValue::Missing
        } else {
            CellValue::Float(v * 0.5 + rng.random_range(-2.0..2.0))
        });
    }

    Dataset::builder("synthetic")
        .column("value", value)
        .column("count", count)
        .column("segment", segment)
        .column("flag", flag)
        .column("score", score)
        .build()
        .expect("synthetic fixture is well formed")
}

/// Creates a context with a `customers` table containing null values.
pub async fn create_context_with_nulls() -> Result<SessionContext> {
    let ctx = SessionContext::new();

    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("name", DataType::Utf8, true),
        Field::new("active", DataType::Boolean, true),
        Field::new("age", DataType::Int64, true),
        Field::new("score", DataType::Float64, true),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Int64Array::from(vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10])),
            Arc::new(StringArray::from(vec![
                Some("Alice"),
                None,
                Some("Charlie"),
                Some("David"),
                None,
                Some("Frank"),
                Some("Grace"),
                None,
                Some("Ivan"),
                Some("Jane"),
            ])),
            Arc::new(BooleanArray::from(vec![
                Some(true),
                Some(false),
                Some(true),
                None,
                Some(true),
                Some(true),
                Some(false),
                Some(true),
                Some(true),
                Some(false),
            ])),
            Arc::new(Int64Array::from(vec![
                Some(25),
                Some(30),
                Some(35),
                Some(40),
                None,
                Some(28),
                None,
                Some(33),
                Some(29),
                Some(31),
            ])),
            Arc::new(Float64Array::from(vec![
                Some(85.5),
                Some(92.0),
                None,
                Some(78.5),
                Some(88.0),
                Some(91.5),
                Some(76.0),
                None,
                None,
                Some(83.5),
            ])),
        ],
    )?;

    let table = MemTable::try_new(schema, vec![vec![batch]])?;
    ctx.register_table("customers", Arc::new(table))?;

    Ok(ctx)
}

/// Creates a context with a `sensor_readings` table split over two batches.
///
/// `temperature` holds 85.0 and -40.0 among readings around 23; readings are five
/// minutes apart.
pub async fn create_context_with_outliers() -> Result<SessionContext> {
    let ctx = SessionContext::new();

    let schema = Arc::new(Schema::new(vec![
        Field::new("sensor_id", DataType::Int64, false),
        Field::new("temperature", DataType::Float64, false),
        Field::new("timestamp", DataType::Utf8, false),
    ]));

    let temperatures = [
        22.5, 23.0, 22.8, 23.2, 22.9, 85.0, 23.1, 22.7, 23.3, 22.6, -40.0, 23.0, 22.9, 23.4, 22.8,
    ];
    let timestamps: Vec<String> = (0..15)
        .map(|i| format!("2024-01-01 {:02}:{:02}:00", i * 5 / 60, i * 5 % 60))
        .collect();

    let batch = |range: std::ops::Range<usize>| {
        RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(Int64Array::from_iter_values(range.clone().map(|i| i as i64 + 1))),
                Arc::new(Float64Array::from(temperatures[range.clone()].to_vec())),
                Arc::new(StringArray::from_iter_values(
                    timestamps[range].iter().map(String::as_str),
                )),
            ],
        )
    };
    let batches = vec![batch(0..8)?, batch(8..15)?];

    let table = MemTable::try_new(schema, vec![batches])?;
    ctx.register_table("sensor_readings", Arc::new(table))?;

    Ok(ctx)
}
