//! Narrative Generator
//!
//! Turns aggregation results into prose. With a remote provider
//! configured the prompt is delegated to it; on any failure (timeout,
//! auth, quota, network, malformed reply) the generator logs a warning
//! and falls back to the deterministic local templates, so narrative
//! generation itself never fails.

use crate::aggregate::DatasetSummary;
use crate::chart::ChartType;
use crate::config::NarrativeConfig;
use crate::llm::TextGenerator;
use crate::result::QueryResult;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NarrativeKind {
    DatasetSummary,
    VisualizationInsight,
    QueryAnalysis,
    TrendAnalysis,
    ComparativeAnalysis,
}

impl NarrativeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NarrativeKind::DatasetSummary => "dataset_summary",
            NarrativeKind::VisualizationInsight => "visualization_insight",
            NarrativeKind::QueryAnalysis => "query_analysis",
            NarrativeKind::TrendAnalysis => "trend_analysis",
            NarrativeKind::ComparativeAnalysis => "comparative_analysis",
        }
    }
}

/// Structured input for a narrative: the result table plus whatever the
/// caller knows about its shape. Templates are pure functions of this.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrativeContext {
    pub title: String,
    pub query: Option<String>,
    pub columns: Vec<String>,
    pub rows: Vec<serde_json::Value>,
    pub row_count: usize,
    pub group_column: Option<String>,
    pub value_column: Option<String>,
    pub chart: Option<ChartType>,
    pub stats: Option<DatasetSummary>,
    pub elapsed_ms: u64,
}

impl NarrativeContext {
    pub fn for_result(title: &str, query: Option<&str>, result: &QueryResult) -> Self {
        Self {
            title: title.to_string(),
            query: query.map(str::to_string),
            columns: result.columns.clone(),
            rows: result.rows.clone(),
            row_count: result.row_count,
            group_column: result.columns.first().cloned(),
            value_column: result.columns.last().cloned(),
            chart: None,
            stats: None,
            elapsed_ms: result.elapsed_ms,
        }
    }

    pub fn with_chart(mut self, chart: Option<ChartType>) -> Self {
        self.chart = chart;
        self
    }

    pub fn with_stats(mut self, stats: DatasetSummary) -> Self {
        self.stats = Some(stats);
        self
    }

    /// (group label, numeric value) pairs, descending by value.
    fn ranked_pairs(&self) -> Vec<(String, f64)> {
        let (Some(group), Some(value)) = (&self.group_column, &self.value_column) else {
            return Vec::new();
        };
        self.rows
            .iter()
            .filter_map(|row| {
                let label = match row.get(group.as_str()) {
                    Some(serde_json::Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                    None => return None,
                };
                let v = row.get(value.as_str()).and_then(|v| v.as_f64())?;
                Some((label, v))
            })
            .sorted_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal))
            .collect()
    }

    /// (x label, numeric value) pairs in x order, for trend templates.
    fn series_pairs(&self) -> Vec<(String, f64)> {
        let mut pairs = self.ranked_pairs();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        pairs
    }
}

pub struct NarrativeGenerator {
    provider: Option<Box<dyn TextGenerator>>,
}

impl NarrativeGenerator {
    /// Template-only generator.
    pub fn local() -> Self {
        Self { provider: None }
    }

    pub fn with_provider(provider: Box<dyn TextGenerator>) -> Self {
        Self {
            provider: Some(provider),
        }
    }

    pub fn from_config(config: &NarrativeConfig) -> Self {
        match config.remote_provider() {
            Some(provider) => Self::with_provider(provider),
            None => Self::local(),
        }
    }

    /// Generate prose for `kind`. Infallible: remote failures degrade to
    /// the local template.
    pub async fn generate(&self, kind: NarrativeKind, ctx: &NarrativeContext) -> String {
        if let Some(provider) = &self.provider {
            let prompt = prompt_for(kind, ctx);
            match provider.generate_text(&prompt, Some(system_for(kind))).await {
                Ok(text) if !text.trim().is_empty() => return text,
                Ok(_) => warn!(
                    provider = provider.name(),
                    kind = kind.as_str(),
                    "provider returned empty narrative, falling back to local template"
                ),
                Err(err) => warn!(
                    provider = provider.name(),
                    kind = kind.as_str(),
                    error = %err,
                    "narrative provider failed, falling back to local template"
                ),
            }
        }
        local_template(kind, ctx)
    }
}

fn system_for(kind: NarrativeKind) -> &'static str {
    match kind {
        NarrativeKind::DatasetSummary => {
            "You are an expert data analyst specializing in customer shopping behavior and retail analytics."
        }
        NarrativeKind::VisualizationInsight => {
            "You are an expert in data visualization and business analytics, skilled at extracting meaningful insights from charts."
        }
        NarrativeKind::QueryAnalysis => {
            "You are an expert business intelligence analyst with deep understanding of customer shopping data."
        }
        NarrativeKind::TrendAnalysis => {
            "You are an expert in time series analysis and business trend interpretation."
        }
        NarrativeKind::ComparativeAnalysis => {
            "You are an expert in comparative analysis and business performance evaluation."
        }
    }
}

fn prompt_for(kind: NarrativeKind, ctx: &NarrativeContext) -> String {
    let sample: String = ctx
        .rows
        .iter()
        .take(5)
        .map(|row| row.to_string())
        .join("\n");

    match kind {
        NarrativeKind::DatasetSummary => {
            let stats = ctx
                .stats
                .as_ref()
                .and_then(|s| serde_json::to_string(s).ok())
                .unwrap_or_default();
            format!(
                "Provide a concise summary (200-300 words) of this customer shopping dataset.\n\
                 Statistics: {}\n\
                 Cover the dataset structure, key business metrics, notable shopping patterns \
                 and areas worth deeper analysis.",
                stats
            )
        }
        NarrativeKind::VisualizationInsight => format!(
            "Provide insights (150-250 words) for this chart.\n\
             Chart type: {}\nTitle: {}\nColumns: {}\nData:\n{}\n\
             Cover key observations, notable patterns and business implications.",
            ctx.chart.map(|c| c.to_string()).unwrap_or_else(|| "table".to_string()),
            ctx.title,
            ctx.columns.join(", "),
            sample
        ),
        NarrativeKind::QueryAnalysis => format!(
            "Analyze this query and its results (200-300 words).\n\
             Query: \"{}\"\nExecution time: {} ms\nRows: {}\nColumns: {}\nSample:\n{}\n\
             Cover what the query asked for, the significance of the results and \
             recommended follow-up analysis.",
            ctx.query.as_deref().unwrap_or(""),
            ctx.elapsed_ms,
            ctx.row_count,
            ctx.columns.join(", "),
            sample
        ),
        NarrativeKind::TrendAnalysis => format!(
            "Analyze this time series (200-300 words).\nTitle: {}\nData points: {}\nData:\n{}\n\
             Cover the overall trend direction, notable peaks and troughs and \
             business implications.",
            ctx.title, ctx.row_count, sample
        ),
        NarrativeKind::ComparativeAnalysis => format!(
            "Compare the groups in this result (200-300 words).\nTitle: {}\nData:\n{}\n\
             Rank the groups, call out the key differences and suggest reasons for \
             the performance gaps.",
            ctx.title, sample
        ),
    }
}

fn local_template(kind: NarrativeKind, ctx: &NarrativeContext) -> String {
    match kind {
        NarrativeKind::DatasetSummary => summary_template(ctx),
        NarrativeKind::VisualizationInsight => insight_template(ctx),
        NarrativeKind::QueryAnalysis => analysis_template(ctx),
        NarrativeKind::TrendAnalysis => trend_template(ctx),
        NarrativeKind::ComparativeAnalysis => comparative_template(ctx),
    }
}

fn summary_template(ctx: &NarrativeContext) -> String {
    let Some(stats) = &ctx.stats else {
        return "Dataset summary is unavailable: no statistics were provided.".to_string();
    };
    let range = match (&stats.date_start, &stats.date_end) {
        (Some(start), Some(end)) => format!("{} to {}", start, end),
        _ => "an unknown period".to_string(),
    };
    let genders = stats
        .gender_counts
        .iter()
        .map(|(g, n)| format!("{}: {}", g, n))
        .join(", ");
    format!(
        "The dataset covers {} transactions from {} distinct customers across {} over {}. \
         Total revenue is ${:.2} with an average transaction value of ${:.2} and {} units sold. \
         Purchases span {} product categories and {} malls; the average customer age is {:.1} \
         ({}). Demographic, mall-level and category-level breakdowns are all well populated \
         for further analysis.",
        stats.transaction_count,
        stats.distinct_customers,
        plural(stats.distinct_invoices, "invoice"),
        range,
        stats.total_revenue,
        stats.avg_transaction_value,
        stats.total_quantity,
        stats.distinct_categories,
        stats.distinct_malls,
        stats.average_age,
        genders
    )
}

fn insight_template(ctx: &NarrativeContext) -> String {
    let pairs = ctx.ranked_pairs();
    let chart = ctx
        .chart
        .map(|c| c.to_string())
        .unwrap_or_else(|| "table".to_string());
    if pairs.is_empty() {
        return format!(
            "The {} view \"{}\" produced {} rows. No numeric breakdown is available for comment.",
            chart, ctx.title, ctx.row_count
        );
    }
    let total: f64 = pairs.iter().map(|(_, v)| v).sum();
    let leaders = pairs
        .iter()
        .take(3)
        .map(|(label, v)| format!("{} ({:.2})", label, v))
        .join(", ");
    let share = if total > 0.0 {
        pairs[0].1 / total * 100.0
    } else {
        0.0
    };
    format!(
        "The {} chart \"{}\" compares {} groups. Leading values: {}. The top group accounts \
         for {:.1}% of the plotted total, so differences across groups are material and worth \
         acting on.",
        chart,
        ctx.title,
        pairs.len(),
        leaders,
        share
    )
}

fn analysis_template(ctx: &NarrativeContext) -> String {
    let pairs = ctx.ranked_pairs();
    let headline = pairs
        .first()
        .map(|(label, v)| format!(" The largest value belongs to {} at {:.2}.", label, v))
        .unwrap_or_default();
    format!(
        "Query \"{}\" completed in {} ms and returned {} rows over columns [{}].{} \
         Results were computed locally from the cleaned transaction table.",
        ctx.query.as_deref().unwrap_or(""),
        ctx.elapsed_ms,
        ctx.row_count,
        ctx.columns.join(", "),
        headline
    )
}

fn trend_template(ctx: &NarrativeContext) -> String {
    let series = ctx.series_pairs();
    if series.len() < 2 {
        return format!(
            "The series \"{}\" has {} data points, which is not enough to describe a trend.",
            ctx.title,
            series.len()
        );
    }
    let first = series[0].1;
    let last = series[series.len() - 1].1;
    let growth = if first != 0.0 {
        (last - first) / first * 100.0
    } else {
        0.0
    };
    let max = series
        .iter()
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
    let min = series
        .iter()
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
    let extremes = match (max, min) {
        (Some(max), Some(min)) => format!(
            " The peak is {} ({:.2}) and the trough is {} ({:.2}).",
            max.0, max.1, min.0, min.1
        ),
        _ => String::new(),
    };
    format!(
        "\"{}\" spans {} points from {} to {}. The value moved from {:.2} to {:.2}, a change \
         of {:.1}%.{}",
        ctx.title,
        series.len(),
        series[0].0,
        series[series.len() - 1].0,
        first,
        last,
        growth,
        extremes
    )
}

fn comparative_template(ctx: &NarrativeContext) -> String {
    let pairs = ctx.ranked_pairs();
    if pairs.is_empty() {
        return format!("\"{}\" has no groups to compare.", ctx.title);
    }
    let ranking = pairs
        .iter()
        .enumerate()
        .map(|(i, (label, v))| format!("{}. {} ({:.2})", i + 1, label, v))
        .join("; ");
    let gap = if pairs.len() > 1 {
        format!(
            " The leader outperforms the runner-up by {:.2}.",
            pairs[0].1 - pairs[1].1
        )
    } else {
        String::new()
    };
    format!("Ranking for \"{}\": {}.{}", ctx.title, ranking, gap)
}

fn plural(n: usize, noun: &str) -> String {
    if n == 1 {
        format!("{} {}", n, noun)
    } else {
        format!("{} {}s", n, noun)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmFailure;
    use async_trait::async_trait;

    fn grouped_context() -> NarrativeContext {
        NarrativeContext {
            title: "Revenue by Category".to_string(),
            query: Some("revenue by category".to_string()),
            columns: vec!["category".to_string(), "total_amount".to_string()],
            rows: vec![
                serde_json::json!({"category": "Clothing", "total_amount": 900.0}),
                serde_json::json!({"category": "Books", "total_amount": 100.0}),
            ],
            row_count: 2,
            group_column: Some("category".to_string()),
            value_column: Some("total_amount".to_string()),
            chart: Some(ChartType::Bar),
            stats: None,
            elapsed_ms: 3,
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl TextGenerator for FailingProvider {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn generate_text(
            &self,
            _prompt: &str,
            _system: Option<&str>,
        ) -> std::result::Result<String, LlmFailure> {
            Err(LlmFailure::Network("connection refused".to_string()))
        }
    }

    struct EchoProvider;

    #[async_trait]
    impl TextGenerator for EchoProvider {
        fn name(&self) -> &'static str {
            "echo"
        }

        async fn generate_text(
            &self,
            prompt: &str,
            _system: Option<&str>,
        ) -> std::result::Result<String, LlmFailure> {
            Ok(format!("remote says: {}", &prompt[..20.min(prompt.len())]))
        }
    }

    #[test]
    fn templates_are_deterministic() {
        let ctx = grouped_context();
        let a = insight_template(&ctx);
        let b = insight_template(&ctx);
        assert_eq!(a, b);
        assert!(a.contains("Clothing"));
        assert!(a.contains("90.0%"));
    }

    #[test]
    fn comparative_template_ranks_groups() {
        let text = comparative_template(&grouped_context());
        assert!(text.contains("1. Clothing (900.00)"));
        assert!(text.contains("outperforms the runner-up by 800.00"));
    }

    #[tokio::test]
    async fn remote_failure_falls_back_to_template() {
        let generator = NarrativeGenerator::with_provider(Box::new(FailingProvider));
        let text = generator
            .generate(NarrativeKind::QueryAnalysis, &grouped_context())
            .await;
        assert!(text.contains("completed in 3 ms"));
        assert!(text.contains("Clothing"));
    }

    #[tokio::test]
    async fn remote_success_is_used_verbatim() {
        let generator = NarrativeGenerator::with_provider(Box::new(EchoProvider));
        let text = generator
            .generate(NarrativeKind::QueryAnalysis, &grouped_context())
            .await;
        assert!(text.starts_with("remote says:"));
    }
}
