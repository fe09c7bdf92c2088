use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InsightError {
    #[error("Data file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to parse input data: {0}")]
    Parse(String),

    #[error("Column '{column}' missing from dataset")]
    MissingColumn { column: String },

    #[error("Aggregation error: {0}")]
    Aggregation(String),

    #[error("Unsupported query shape: {0}")]
    UnsupportedQuery(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Polars error: {0}")]
    Polars(String),
}

impl From<polars::error::PolarsError> for InsightError {
    fn from(err: polars::error::PolarsError) -> Self {
        InsightError::Polars(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, InsightError>;
