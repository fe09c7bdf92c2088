//! Analytics Engine
//!
//! Owns the cleaned transaction table and drives the pipeline:
//! translate a free-text query, execute the typed plan, attach a chart
//! descriptor and annotate the result with a narrative.

use crate::aggregate::{
    self, DatasetSummary, GroupKey, Metric, Reduction,
};
use crate::chart::{ChartSpec, ChartType};
use crate::error::Result;
use crate::loader::{self, CleanReport, CleanedDataset};
use crate::narrative::{NarrativeContext, NarrativeGenerator, NarrativeKind};
use crate::result::QueryResult;
use crate::translator::{self, AggregationSpec, QueryPlan, Translation};
use polars::prelude::DataFrame;
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// Everything produced for one query. Built atomically: a failing query
/// yields an error and no partial outcome.
#[derive(Debug, Clone, serde::Serialize)]
pub struct QueryOutcome {
    pub query: String,
    pub rule: &'static str,
    pub result: QueryResult,
    pub chart: Option<ChartSpec>,
    pub summary: Option<DatasetSummary>,
    pub narrative: String,
}

pub struct AnalyticsEngine {
    table: DataFrame,
    report: CleanReport,
    narrator: NarrativeGenerator,
}

impl AnalyticsEngine {
    pub fn new(dataset: CleanedDataset, narrator: NarrativeGenerator) -> Self {
        Self {
            table: dataset.frame,
            report: dataset.report,
            narrator,
        }
    }

    /// Load, clean and wrap a CSV in one step.
    pub fn from_csv(path: &Path, narrator: NarrativeGenerator) -> Result<Self> {
        Ok(Self::new(loader::load_and_clean(path)?, narrator))
    }

    /// The cleaned table. Read-only: every view is recomputed from it.
    pub fn data(&self) -> &DataFrame {
        &self.table
    }

    pub fn clean_report(&self) -> CleanReport {
        self.report
    }

    /// Run one free-text query through translate -> aggregate -> chart ->
    /// narrative.
    pub async fn run(&self, query: &str) -> Result<QueryOutcome> {
        let started = Instant::now();
        let translation = translator::translate(query);
        info!(query, rule = translation.rule, "translated query");

        let (frame, summary) = self.execute_plan(&translation.plan)?;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        let mut result = QueryResult::from_frame(&frame, elapsed_ms)?;

        let title = self.title_for(&translation);
        let chart = match translation.plan {
            // The scalar bundle is a one-row table; there is nothing to
            // plot against.
            QueryPlan::Summary => None,
            _ => {
                let spec = ChartSpec::for_result(&result, translation.chart, &title);
                if spec.is_none() {
                    result
                        .warnings
                        .push("chart skipped: result has fewer than two columns".to_string());
                }
                spec
            }
        };

        let kind = match (&translation.plan, &chart) {
            (QueryPlan::Summary, _) => NarrativeKind::DatasetSummary,
            (_, Some(spec)) if spec.chart_type == ChartType::Line => NarrativeKind::TrendAnalysis,
            (_, Some(_)) => NarrativeKind::VisualizationInsight,
            _ => NarrativeKind::QueryAnalysis,
        };

        let mut ctx = NarrativeContext::for_result(&title, Some(query), &result)
            .with_chart(chart.as_ref().map(|c| c.chart_type));
        if let Some(summary) = &summary {
            ctx = ctx.with_stats(summary.clone());
        }
        let narrative = self.narrator.generate(kind, &ctx).await;

        Ok(QueryOutcome {
            query: query.to_string(),
            rule: translation.rule,
            result,
            chart,
            summary,
            narrative,
        })
    }

    /// The scalar statistics bundle.
    pub fn summary(&self) -> Result<DatasetSummary> {
        aggregate::dataset_summary(&self.table)
    }

    /// Per-customer segmentation roll-up.
    pub fn segment_customers(&self) -> Result<DataFrame> {
        aggregate::segment_customers(&self.table)
    }

    /// Grouped comparison with a comparative narrative, independent of
    /// the query translator.
    pub async fn compare(&self, group_by: GroupKey, metric: Metric) -> Result<(QueryResult, String)> {
        let started = Instant::now();
        let frame = aggregate::aggregate(&self.table, group_by, metric, Reduction::Sum)?;
        let result = QueryResult::from_frame(&frame, started.elapsed().as_millis() as u64)?;

        let title = format!("{} by {}", metric, group_by);
        let ctx = NarrativeContext::for_result(&title, None, &result);
        let narrative = self
            .narrator
            .generate(NarrativeKind::ComparativeAnalysis, &ctx)
            .await;
        Ok((result, narrative))
    }

    fn execute_plan(&self, plan: &QueryPlan) -> Result<(DataFrame, Option<DatasetSummary>)> {
        match plan {
            QueryPlan::Aggregate(spec) => Ok((self.run_aggregation(spec)?, None)),
            QueryPlan::SegmentCounts => Ok((aggregate::segment_counts(&self.table)?, None)),
            QueryPlan::Summary => {
                let summary = aggregate::dataset_summary(&self.table)?;
                Ok((aggregate::summary_frame(&summary)?, Some(summary)))
            }
        }
    }

    fn run_aggregation(&self, spec: &AggregationSpec) -> Result<DataFrame> {
        if spec.sort_desc {
            aggregate::aggregate_sorted(&self.table, spec.group_by, spec.metric, spec.reduction)
        } else {
            aggregate::aggregate(&self.table, spec.group_by, spec.metric, spec.reduction)
        }
    }

    fn title_for(&self, translation: &Translation) -> String {
        match &translation.plan {
            QueryPlan::Summary => "Dataset Summary".to_string(),
            QueryPlan::SegmentCounts => "Customer Segments".to_string(),
            QueryPlan::Aggregate(spec) => match spec.reduction {
                Reduction::Count => format!("Transaction Count by {}", spec.group_by),
                Reduction::Mean => format!("Average {} by {}", spec.metric, spec.group_by),
                Reduction::NUnique => format!("Distinct {} by {}", spec.metric, spec.group_by),
                Reduction::Sum => format!("{} by {}", spec.metric, spec.group_by),
            },
        }
    }
}
