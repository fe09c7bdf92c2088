//! Chart descriptors. Rendering is out of scope; downstream consumers
//! receive a (type, title, axes) descriptor and draw it themselves.

use crate::result::QueryResult;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartType {
    Bar,
    Line,
    Pie,
}

impl fmt::Display for ChartType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChartType::Bar => f.write_str("bar"),
            ChartType::Line => f.write_str("line"),
            ChartType::Pie => f.write_str("pie"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartSpec {
    pub chart_type: ChartType,
    pub title: String,
    pub x_column: String,
    pub y_column: String,
}

impl ChartSpec {
    /// Build a descriptor over a result table: first column on the x
    /// axis, reduced (last) column on the y axis. Returns `None` when
    /// the table has fewer than two columns; callers report this as a
    /// warning, never an error.
    pub fn for_result(result: &QueryResult, chart_type: ChartType, title: &str) -> Option<Self> {
        if result.columns.len() < 2 {
            return None;
        }
        Some(Self {
            chart_type,
            title: title.to_string(),
            x_column: result.columns[0].clone(),
            y_column: result.columns[result.columns.len() - 1].clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_tables_without_two_columns() {
        let narrow = QueryResult {
            success: true,
            row_count: 1,
            columns: vec!["count".to_string()],
            rows: vec![],
            elapsed_ms: 0,
            warnings: vec![],
        };
        assert!(ChartSpec::for_result(&narrow, ChartType::Bar, "t").is_none());

        let wide = QueryResult {
            columns: vec!["category".to_string(), "total_amount".to_string()],
            ..narrow
        };
        let spec = ChartSpec::for_result(&wide, ChartType::Pie, "Revenue").unwrap();
        assert_eq!(spec.x_column, "category");
        assert_eq!(spec.y_column, "total_amount");
        assert_eq!(spec.chart_type, ChartType::Pie);
    }
}
