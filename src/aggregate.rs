//! Aggregation Engine
//!
//! Named aggregation views over the cleaned transaction table: a closed
//! (group key, metric, reduction) enumeration, customer segmentation and
//! the scalar dataset summary. Views are recomputed on demand and never
//! maintained incrementally.

use crate::error::{InsightError, Result};
use crate::schema;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Column or column tuple used to partition rows before reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKey {
    Category,
    ShoppingMall,
    Gender,
    AgeGroup,
    PaymentMethod,
    InvoiceDate,
    CustomerId,
    YearMonth,
    GenderCategory,
    DateCategory,
}

impl GroupKey {
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            GroupKey::Category => &[schema::CATEGORY],
            GroupKey::ShoppingMall => &[schema::SHOPPING_MALL],
            GroupKey::Gender => &[schema::GENDER],
            GroupKey::AgeGroup => &[schema::AGE_GROUP],
            GroupKey::PaymentMethod => &[schema::PAYMENT_METHOD],
            GroupKey::InvoiceDate => &[schema::INVOICE_DATE],
            GroupKey::CustomerId => &[schema::CUSTOMER_ID],
            GroupKey::YearMonth => &[schema::YEAR, schema::MONTH],
            GroupKey::GenderCategory => &[schema::GENDER, schema::CATEGORY],
            GroupKey::DateCategory => &[schema::INVOICE_DATE, schema::CATEGORY],
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            GroupKey::Category => "Category",
            GroupKey::ShoppingMall => "Shopping Mall",
            GroupKey::Gender => "Gender",
            GroupKey::AgeGroup => "Age Group",
            GroupKey::PaymentMethod => "Payment Method",
            GroupKey::InvoiceDate => "Date",
            GroupKey::CustomerId => "Customer",
            GroupKey::YearMonth => "Month",
            GroupKey::GenderCategory => "Gender and Category",
            GroupKey::DateCategory => "Date and Category",
        };
        f.write_str(label)
    }
}

/// Numeric column a reduction is applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    TotalAmount,
    Quantity,
    Price,
    Age,
}

impl Metric {
    pub fn column(&self) -> &'static str {
        match self {
            Metric::TotalAmount => schema::TOTAL_AMOUNT,
            Metric::Quantity => schema::QUANTITY,
            Metric::Price => schema::PRICE,
            Metric::Age => schema::AGE,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Metric::TotalAmount => "Revenue",
            Metric::Quantity => "Quantity",
            Metric::Price => "Price",
            Metric::Age => "Age",
        };
        f.write_str(label)
    }
}

/// Per-group reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reduction {
    Sum,
    Mean,
    Count,
    NUnique,
}

impl fmt::Display for Reduction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Reduction::Sum => "Total",
            Reduction::Mean => "Average",
            Reduction::Count => "Count",
            Reduction::NUnique => "Distinct",
        };
        f.write_str(label)
    }
}

/// Name of the reduced column in an aggregation result.
pub fn value_column(metric: Metric, reduction: Reduction) -> String {
    match reduction {
        Reduction::Sum | Reduction::Mean => metric.column().to_string(),
        Reduction::Count => "count".to_string(),
        Reduction::NUnique => format!("distinct_{}", metric.column()),
    }
}

/// Group the cleaned table by `group_by` and reduce `metric`.
///
/// One output row per distinct group value present in the input; absent
/// groups are never synthesized. An empty input yields an empty result.
pub fn aggregate(
    df: &DataFrame,
    group_by: GroupKey,
    metric: Metric,
    reduction: Reduction,
) -> Result<DataFrame> {
    let mut needed: Vec<&str> = group_by.columns().to_vec();
    needed.push(metric.column());
    require_columns(df, &needed)?;

    let keys: Vec<Expr> = group_by.columns().iter().map(|c| col(c)).collect();
    let value = value_column(metric, reduction);
    let agg = match reduction {
        Reduction::Sum => col(metric.column()).sum().alias(&value),
        Reduction::Mean => col(metric.column()).mean().alias(&value),
        Reduction::Count => col(metric.column()).count().alias(&value),
        Reduction::NUnique => col(metric.column()).n_unique().alias(&value),
    };

    let out = df.clone().lazy().group_by(keys).agg([agg]).collect()?;
    Ok(out)
}

/// [`aggregate`], with the result sorted descending on the reduced
/// column (the "most popular X" views).
pub fn aggregate_sorted(
    df: &DataFrame,
    group_by: GroupKey,
    metric: Metric,
    reduction: Reduction,
) -> Result<DataFrame> {
    let grouped = aggregate(df, group_by, metric, reduction)?;
    let value = value_column(metric, reduction);
    let sorted = grouped.sort(
        [value.as_str()],
        SortMultipleOptions::default().with_order_descending(true),
    )?;
    Ok(sorted)
}

/// Customer segment labels, by total spend at fixed edges
/// `[0, 1000, 5000, 10000, inf]`, left-open/right-closed with the first
/// bin including 0.
pub fn segment_label(total_spent: f64) -> &'static str {
    if total_spent <= 1000.0 {
        "Budget"
    } else if total_spent <= 5000.0 {
        "Regular"
    } else if total_spent <= 10000.0 {
        "Premium"
    } else {
        "VIP"
    }
}

pub const SEGMENT: &str = "segment";
pub const TOTAL_SPENT: &str = "total_spent";
pub const DISTINCT_INVOICES: &str = "distinct_invoices";
pub const DISTINCT_CATEGORIES: &str = "distinct_categories";

/// Per-customer roll-up: total spend, distinct invoices, distinct
/// categories, and the derived segment label.
pub fn segment_customers(df: &DataFrame) -> Result<DataFrame> {
    require_columns(
        df,
        &[
            schema::CUSTOMER_ID,
            schema::TOTAL_AMOUNT,
            schema::INVOICE_NO,
            schema::CATEGORY,
        ],
    )?;

    let mut rollup = df
        .clone()
        .lazy()
        .group_by([col(schema::CUSTOMER_ID)])
        .agg([
            col(schema::TOTAL_AMOUNT).sum().alias(TOTAL_SPENT),
            col(schema::INVOICE_NO).n_unique().alias(DISTINCT_INVOICES),
            col(schema::CATEGORY).n_unique().alias(DISTINCT_CATEGORIES),
        ])
        .collect()?;

    let spent = rollup.column(TOTAL_SPENT)?.f64()?;
    let labels: Vec<&'static str> = spent
        .into_iter()
        .map(|v| segment_label(v.unwrap_or(0.0)))
        .collect();
    rollup.with_column(Series::new(SEGMENT, labels))?;
    Ok(rollup)
}

/// Segmentation followed by a count of customers per segment.
pub fn segment_counts(df: &DataFrame) -> Result<DataFrame> {
    let segments = segment_customers(df)?;
    let counts = segments
        .lazy()
        .group_by([col(SEGMENT)])
        .agg([col(schema::CUSTOMER_ID).count().alias("count")])
        .collect()?;
    Ok(counts)
}

/// The scalar statistics bundle for summary/overview queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub total_revenue: f64,
    pub transaction_count: usize,
    pub distinct_customers: usize,
    pub distinct_invoices: usize,
    pub avg_transaction_value: f64,
    pub total_quantity: i64,
    pub distinct_categories: usize,
    pub distinct_malls: usize,
    pub date_start: Option<String>,
    pub date_end: Option<String>,
    pub average_age: f64,
    pub gender_counts: BTreeMap<String, u64>,
}

pub fn dataset_summary(df: &DataFrame) -> Result<DatasetSummary> {
    require_columns(
        df,
        &[
            schema::TOTAL_AMOUNT,
            schema::CUSTOMER_ID,
            schema::INVOICE_NO,
            schema::QUANTITY,
            schema::CATEGORY,
            schema::SHOPPING_MALL,
            schema::INVOICE_DATE,
            schema::AGE,
            schema::GENDER,
        ],
    )?;

    let total = df.column(schema::TOTAL_AMOUNT)?.f64()?;
    let transaction_count = df.height();
    let total_revenue = total.sum().unwrap_or(0.0);
    let avg_transaction_value = if transaction_count > 0 {
        total_revenue / transaction_count as f64
    } else {
        0.0
    };

    let ages = df.column(schema::AGE)?.i64()?;
    let average_age = if transaction_count > 0 {
        ages.sum().unwrap_or(0) as f64 / transaction_count as f64
    } else {
        0.0
    };

    let dates = df.column(schema::INVOICE_DATE)?.str()?;
    let date_start = dates.into_iter().flatten().min().map(str::to_string);
    let date_end = dates.into_iter().flatten().max().map(str::to_string);

    let mut gender_counts = BTreeMap::new();
    for g in df.column(schema::GENDER)?.str()?.into_iter().flatten() {
        *gender_counts.entry(g.to_string()).or_insert(0u64) += 1;
    }

    Ok(DatasetSummary {
        total_revenue,
        transaction_count,
        distinct_customers: df.column(schema::CUSTOMER_ID)?.n_unique()?,
        distinct_invoices: df.column(schema::INVOICE_NO)?.n_unique()?,
        avg_transaction_value,
        total_quantity: df.column(schema::QUANTITY)?.i64()?.sum().unwrap_or(0),
        distinct_categories: df.column(schema::CATEGORY)?.n_unique()?,
        distinct_malls: df.column(schema::SHOPPING_MALL)?.n_unique()?,
        date_start,
        date_end,
        average_age,
        gender_counts,
    })
}

/// Render the summary bundle as a one-row table for display.
pub fn summary_frame(summary: &DatasetSummary) -> Result<DataFrame> {
    let df = df![
        "total_revenue" => [summary.total_revenue],
        "transaction_count" => [summary.transaction_count as i64],
        "distinct_customers" => [summary.distinct_customers as i64],
        "distinct_invoices" => [summary.distinct_invoices as i64],
        "avg_transaction_value" => [summary.avg_transaction_value],
        "total_quantity" => [summary.total_quantity],
        "distinct_categories" => [summary.distinct_categories as i64],
        "distinct_malls" => [summary.distinct_malls as i64],
    ]?;
    Ok(df)
}

fn require_columns(df: &DataFrame, needed: &[&str]) -> Result<()> {
    let present: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
    for column in needed {
        if !present.iter().any(|c| c == column) {
            return Err(InsightError::MissingColumn {
                column: column.to_string(),
            });
        }
    }
    Ok(())
}
