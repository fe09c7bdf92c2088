//! Dataset Loader
//!
//! Reads the customer transaction CSV into a DataFrame, then derives the
//! computed columns (total amount, age group, spending band, calendar
//! fields) and drops rows with missing or uncoercible required values.

use crate::error::{InsightError, Result};
use crate::schema;
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use std::path::Path;
use tracing::{info, warn};

/// Row-count bookkeeping from the clean pass. Dropped rows are a
/// diagnostic, never an error.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct CleanReport {
    pub rows_loaded: usize,
    pub rows_kept: usize,
    pub rows_dropped: usize,
}

/// The cleaned transaction table. Treated as read-only for the rest of
/// the session; every aggregation view is a pure derivation from it.
#[derive(Debug, Clone)]
pub struct CleanedDataset {
    pub frame: DataFrame,
    pub report: CleanReport,
}

pub struct DatasetLoader;

impl DatasetLoader {
    /// Load the raw CSV. Fails fast when the file is absent or a required
    /// column is missing; value-level coercion problems are deferred to
    /// [`DatasetLoader::clean`], which drops the affected rows.
    pub fn load(path: &Path) -> Result<DataFrame> {
        if !path.exists() {
            return Err(InsightError::FileNotFound(path.to_path_buf()));
        }

        let df = LazyCsvReader::new(path)
            .with_has_header(true)
            .finish()
            .map_err(|e| InsightError::Parse(format!("failed to read {}: {}", path.display(), e)))?
            .collect()
            .map_err(|e| InsightError::Parse(format!("failed to read {}: {}", path.display(), e)))?;

        require_columns(&df, &schema::REQUIRED_COLUMNS)?;
        info!(rows = df.height(), path = %path.display(), "loaded transaction data");
        Ok(df)
    }

    /// Clean the raw table: parse `DD/MM/YYYY` invoice dates, derive
    /// `total_amount`, the fixed-edge buckets and the calendar fields,
    /// and drop every row with a null required value, an unparseable
    /// date, or an out-of-range bucket input.
    pub fn clean(raw: &DataFrame) -> Result<CleanedDataset> {
        require_columns(raw, &schema::REQUIRED_COLUMNS)?;

        // Non-strict casts: values Polars cannot coerce become nulls and
        // the row is dropped below.
        let typed = raw
            .clone()
            .lazy()
            .with_columns([
                col(schema::INVOICE_NO).cast(DataType::String),
                col(schema::CUSTOMER_ID).cast(DataType::String),
                col(schema::GENDER).cast(DataType::String),
                col(schema::AGE).cast(DataType::Int64),
                col(schema::CATEGORY).cast(DataType::String),
                col(schema::QUANTITY).cast(DataType::Int64),
                col(schema::PRICE).cast(DataType::Float64),
                col(schema::PAYMENT_METHOD).cast(DataType::String),
                col(schema::INVOICE_DATE).cast(DataType::String),
                col(schema::SHOPPING_MALL).cast(DataType::String),
            ])
            .collect()?;

        let invoice_no = typed.column(schema::INVOICE_NO)?.str()?;
        let customer_id = typed.column(schema::CUSTOMER_ID)?.str()?;
        let gender = typed.column(schema::GENDER)?.str()?;
        let age = typed.column(schema::AGE)?.i64()?;
        let category = typed.column(schema::CATEGORY)?.str()?;
        let quantity = typed.column(schema::QUANTITY)?.i64()?;
        let price = typed.column(schema::PRICE)?.f64()?;
        let payment = typed.column(schema::PAYMENT_METHOD)?.str()?;
        let date = typed.column(schema::INVOICE_DATE)?.str()?;
        let mall = typed.column(schema::SHOPPING_MALL)?.str()?;

        let rows_loaded = typed.height();
        let mut out = CleanColumns::with_capacity(rows_loaded);

        for i in 0..rows_loaded {
            let parsed = (
                invoice_no.get(i),
                customer_id.get(i),
                gender.get(i),
                age.get(i),
                category.get(i),
                quantity.get(i),
                price.get(i),
                payment.get(i),
                date.get(i).and_then(parse_invoice_date),
                mall.get(i),
            );

            let (
                Some(invoice_no),
                Some(customer_id),
                Some(gender),
                Some(age),
                Some(category),
                Some(quantity),
                Some(price),
                Some(payment),
                Some(date),
                Some(mall),
            ) = parsed
            else {
                continue;
            };

            let total = quantity as f64 * price;
            let (Some(age_group), Some(band)) = (age_group(age), spending_band(total)) else {
                continue;
            };

            out.push(Row {
                invoice_no,
                customer_id,
                gender,
                age,
                category,
                quantity,
                price,
                payment,
                date,
                mall,
                total,
                age_group,
                band,
            });
        }

        let rows_kept = out.len();
        let report = CleanReport {
            rows_loaded,
            rows_kept,
            rows_dropped: rows_loaded - rows_kept,
        };
        if report.rows_dropped > 0 {
            warn!(
                dropped = report.rows_dropped,
                kept = report.rows_kept,
                "dropped rows with missing or invalid values during cleaning"
            );
        }

        Ok(CleanedDataset {
            frame: out.into_frame()?,
            report,
        })
    }
}

/// Load and clean in one step.
pub fn load_and_clean(path: &Path) -> Result<CleanedDataset> {
    let raw = DatasetLoader::load(path)?;
    DatasetLoader::clean(&raw)
}

fn require_columns(df: &DataFrame, required: &[&str]) -> Result<()> {
    let present: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
    for column in required {
        if !present.iter().any(|c| c == column) {
            return Err(InsightError::MissingColumn {
                column: column.to_string(),
            });
        }
    }
    Ok(())
}

fn parse_invoice_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), schema::INPUT_DATE_FORMAT).ok()
}

/// Fixed-edge age buckets over `[0, 25, 35, 45, 55, 100]`.
///
/// All bucketing in this crate is left-open/right-closed with the first
/// bin including 0, so 25 -> "18-25" and 55 -> "46-55". Ages outside
/// (0, 100] are treated as invalid and the row is dropped.
pub fn age_group(age: i64) -> Option<&'static str> {
    match age {
        0..=25 => Some("18-25"),
        26..=35 => Some("26-35"),
        36..=45 => Some("36-45"),
        46..=55 => Some("46-55"),
        56..=100 => Some("55+"),
        _ => None,
    }
}

/// Fixed-edge spending bands over `[0, 100, 500, 1000, 5000, inf]`,
/// same edge policy as [`age_group`].
pub fn spending_band(total_amount: f64) -> Option<&'static str> {
    if total_amount < 0.0 || !total_amount.is_finite() {
        None
    } else if total_amount <= 100.0 {
        Some("Low (<$100)")
    } else if total_amount <= 500.0 {
        Some("Medium ($100-$500)")
    } else if total_amount <= 1000.0 {
        Some("High ($500-$1000)")
    } else if total_amount <= 5000.0 {
        Some("Very High ($1000-$5000)")
    } else {
        Some("Premium ($5000+)")
    }
}

struct Row<'a> {
    invoice_no: &'a str,
    customer_id: &'a str,
    gender: &'a str,
    age: i64,
    category: &'a str,
    quantity: i64,
    price: f64,
    payment: &'a str,
    date: NaiveDate,
    mall: &'a str,
    total: f64,
    age_group: &'static str,
    band: &'static str,
}

struct CleanColumns {
    invoice_no: Vec<String>,
    customer_id: Vec<String>,
    gender: Vec<String>,
    age: Vec<i64>,
    category: Vec<String>,
    quantity: Vec<i64>,
    price: Vec<f64>,
    payment: Vec<String>,
    date: Vec<String>,
    mall: Vec<String>,
    total: Vec<f64>,
    age_group: Vec<&'static str>,
    band: Vec<&'static str>,
    year: Vec<i32>,
    month: Vec<i32>,
    quarter: Vec<i32>,
    day_of_week: Vec<String>,
}

impl CleanColumns {
    fn with_capacity(n: usize) -> Self {
        Self {
            invoice_no: Vec::with_capacity(n),
            customer_id: Vec::with_capacity(n),
            gender: Vec::with_capacity(n),
            age: Vec::with_capacity(n),
            category: Vec::with_capacity(n),
            quantity: Vec::with_capacity(n),
            price: Vec::with_capacity(n),
            payment: Vec::with_capacity(n),
            date: Vec::with_capacity(n),
            mall: Vec::with_capacity(n),
            total: Vec::with_capacity(n),
            age_group: Vec::with_capacity(n),
            band: Vec::with_capacity(n),
            year: Vec::with_capacity(n),
            month: Vec::with_capacity(n),
            quarter: Vec::with_capacity(n),
            day_of_week: Vec::with_capacity(n),
        }
    }

    fn len(&self) -> usize {
        self.invoice_no.len()
    }

    fn push(&mut self, row: Row<'_>) {
        self.invoice_no.push(row.invoice_no.to_string());
        self.customer_id.push(row.customer_id.to_string());
        self.gender.push(row.gender.to_string());
        self.age.push(row.age);
        self.category.push(row.category.to_string());
        self.quantity.push(row.quantity);
        self.price.push(row.price);
        self.payment.push(row.payment.to_string());
        self.date
            .push(row.date.format(schema::CLEAN_DATE_FORMAT).to_string());
        self.mall.push(row.mall.to_string());
        self.total.push(row.total);
        self.age_group.push(row.age_group);
        self.band.push(row.band);
        self.year.push(row.date.year());
        self.month.push(row.date.month() as i32);
        self.quarter.push(((row.date.month() as i32 - 1) / 3) + 1);
        self.day_of_week.push(row.date.format("%A").to_string());
    }

    fn into_frame(self) -> Result<DataFrame> {
        let df = DataFrame::new(vec![
            Series::new(schema::INVOICE_NO, self.invoice_no),
            Series::new(schema::CUSTOMER_ID, self.customer_id),
            Series::new(schema::GENDER, self.gender),
            Series::new(schema::AGE, self.age),
            Series::new(schema::CATEGORY, self.category),
            Series::new(schema::QUANTITY, self.quantity),
            Series::new(schema::PRICE, self.price),
            Series::new(schema::PAYMENT_METHOD, self.payment),
            Series::new(schema::INVOICE_DATE, self.date),
            Series::new(schema::SHOPPING_MALL, self.mall),
            Series::new(schema::TOTAL_AMOUNT, self.total),
            Series::new(schema::AGE_GROUP, self.age_group),
            Series::new(schema::SPENDING_BAND, self.band),
            Series::new(schema::YEAR, self.year),
            Series::new(schema::MONTH, self.month),
            Series::new(schema::QUARTER, self.quarter),
            Series::new(schema::DAY_OF_WEEK, self.day_of_week),
        ])?;
        Ok(df)
    }
}
