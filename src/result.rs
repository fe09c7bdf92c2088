//! Standardized query result: column names plus JSON rows, so callers
//! (CLI, tests, narrative prompts) never need Polars types themselves.

use crate::error::{InsightError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub success: bool,
    pub row_count: usize,
    pub columns: Vec<String>,
    /// One JSON object per row, keyed by column name.
    pub rows: Vec<serde_json::Value>,
    pub elapsed_ms: u64,
    pub warnings: Vec<String>,
}

impl QueryResult {
    pub fn from_frame(df: &DataFrame, elapsed_ms: u64) -> Result<Self> {
        let columns: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
        Ok(Self {
            success: true,
            row_count: df.height(),
            rows: frame_rows(df, &columns)?,
            columns,
            elapsed_ms,
            warnings: Vec::new(),
        })
    }

    /// Value of `column` in each row, for rows where it is numeric.
    pub fn numeric_column(&self, column: &str) -> Vec<f64> {
        self.rows
            .iter()
            .filter_map(|row| row.get(column).and_then(|v| v.as_f64()))
            .collect()
    }
}

/// Structured failure surfaced to the user in place of a result: a
/// human-readable message and no partial output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryFailure {
    pub query: String,
    pub message: String,
}

impl QueryFailure {
    pub fn new(query: &str, err: &InsightError) -> Self {
        Self {
            query: query.to_string(),
            message: err.to_string(),
        }
    }
}

fn frame_rows(df: &DataFrame, columns: &[String]) -> Result<Vec<serde_json::Value>> {
    let mut rows = Vec::with_capacity(df.height());
    for row_idx in 0..df.height() {
        let mut row = serde_json::Map::new();
        for name in columns {
            let series = df.column(name)?;
            row.insert(name.clone(), cell_to_json(series, row_idx)?);
        }
        rows.push(serde_json::Value::Object(row));
    }
    Ok(rows)
}

fn cell_to_json(series: &Series, row_idx: usize) -> Result<serde_json::Value> {
    let value = series
        .get(row_idx)
        .map_err(|e| InsightError::Aggregation(format!("failed to read result cell: {}", e)))?;

    let json = match value {
        AnyValue::Null => serde_json::Value::Null,
        AnyValue::Boolean(b) => serde_json::Value::Bool(b),
        AnyValue::String(s) => serde_json::Value::String(s.to_string()),
        AnyValue::Int8(i) => serde_json::Value::Number(i.into()),
        AnyValue::Int16(i) => serde_json::Value::Number(i.into()),
        AnyValue::Int32(i) => serde_json::Value::Number(i.into()),
        AnyValue::Int64(i) => serde_json::Value::Number(i.into()),
        AnyValue::UInt8(u) => serde_json::Value::Number(u.into()),
        AnyValue::UInt16(u) => serde_json::Value::Number(u.into()),
        AnyValue::UInt32(u) => serde_json::Value::Number(u.into()),
        AnyValue::UInt64(u) => serde_json::Value::Number(u.into()),
        AnyValue::Float32(f) => serde_json::Number::from_f64(f as f64)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        AnyValue::Float64(f) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        other => serde_json::Value::String(format!("{:?}", other)),
    };
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_round_trip_to_json_rows() {
        let df = df![
            "category" => ["Clothing", "Books"],
            "total_amount" => [120.5f64, 40.0],
            "count" => [3i64, 1],
        ]
        .unwrap();

        let result = QueryResult::from_frame(&df, 7).unwrap();
        assert!(result.success);
        assert_eq!(result.row_count, 2);
        assert_eq!(result.columns, vec!["category", "total_amount", "count"]);
        assert_eq!(result.rows[0]["category"], "Clothing");
        assert_eq!(result.rows[1]["count"], 1);
        assert_eq!(result.numeric_column("total_amount"), vec![120.5, 40.0]);
    }

    #[test]
    fn failure_carries_query_and_message() {
        let err = InsightError::MissingColumn {
            column: "total_amount".to_string(),
        };
        let failure = QueryFailure::new("revenue by category", &err);
        assert_eq!(failure.query, "revenue by category");
        assert!(failure.message.contains("total_amount"));
    }
}
