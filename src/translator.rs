//! Query Translator
//!
//! Maps a free-text question to a typed aggregation plan through an
//! explicit, ordered rule table. Matching is case-insensitive substring
//! search, first match wins, and the table order is part of the
//! observable contract. The translator is total: the final catch-all
//! rule absorbs anything the earlier families do not claim.

use crate::aggregate::{GroupKey, Metric, Reduction};
use crate::chart::ChartType;
use crate::error::{InsightError, Result};
use serde::{Deserialize, Serialize};

/// A fully-specified group-by + reduction request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationSpec {
    pub group_by: GroupKey,
    pub metric: Metric,
    pub reduction: Reduction,
    /// Sort descending on the reduced column ("most popular X").
    pub sort_desc: bool,
}

impl AggregationSpec {
    fn new(group_by: GroupKey, metric: Metric, reduction: Reduction) -> Self {
        Self {
            group_by,
            metric,
            reduction,
            sort_desc: false,
        }
    }

    fn sorted(group_by: GroupKey, metric: Metric, reduction: Reduction) -> Self {
        Self {
            group_by,
            metric,
            reduction,
            sort_desc: true,
        }
    }
}

/// What the engine should execute for a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueryPlan {
    Aggregate(AggregationSpec),
    /// Customer segmentation followed by a count per segment.
    SegmentCounts,
    /// The scalar statistics bundle instead of a grouped table.
    Summary,
}

/// Translation output: the plan, the chart type from the independent
/// chart pass, and the name of the rule family that matched.
#[derive(Debug, Clone, Serialize)]
pub struct Translation {
    pub plan: QueryPlan,
    pub chart: ChartType,
    pub rule: &'static str,
}

/// Lowercased query text with substring membership tests.
pub struct QueryText {
    lower: String,
}

impl QueryText {
    pub fn new(query: &str) -> Self {
        Self {
            lower: query.to_lowercase(),
        }
    }

    pub fn has(&self, token: &str) -> bool {
        self.lower.contains(token)
    }

    fn has_any(&self, tokens: &[&str]) -> bool {
        tokens.iter().any(|t| self.has(t))
    }
}

struct Rule {
    name: &'static str,
    applies: fn(&QueryText) -> bool,
    build: fn(&QueryText) -> QueryPlan,
}

/// The canonical rule table. Order matters and is covered by tests:
/// earlier families shadow later ones (e.g. "revenue by category" is a
/// revenue rule, not a category rule).
static RULES: [Rule; 11] = [
    Rule {
        name: "revenue",
        applies: |q| q.has_any(&["revenue", "sales"]),
        build: |q| {
            let group_by = if q.has("category") {
                GroupKey::Category
            } else if q.has_any(&["mall", "shopping"]) {
                GroupKey::ShoppingMall
            } else if q.has("gender") {
                GroupKey::Gender
            } else if q.has("age") {
                GroupKey::AgeGroup
            } else {
                GroupKey::InvoiceDate
            };
            QueryPlan::Aggregate(AggregationSpec::new(
                group_by,
                Metric::TotalAmount,
                Reduction::Sum,
            ))
        },
    },
    Rule {
        name: "category",
        applies: |q| q.has("category"),
        build: |q| {
            if q.has_any(&["popular", "most"]) {
                QueryPlan::Aggregate(AggregationSpec::sorted(
                    GroupKey::Category,
                    Metric::TotalAmount,
                    Reduction::Count,
                ))
            } else {
                QueryPlan::Aggregate(AggregationSpec::new(
                    GroupKey::Category,
                    Metric::TotalAmount,
                    Reduction::Sum,
                ))
            }
        },
    },
    Rule {
        name: "mall",
        applies: |q| q.has_any(&["mall", "shopping"]),
        build: |q| {
            if q.has_any(&["popular", "most"]) {
                QueryPlan::Aggregate(AggregationSpec::sorted(
                    GroupKey::ShoppingMall,
                    Metric::TotalAmount,
                    Reduction::Count,
                ))
            } else {
                QueryPlan::Aggregate(AggregationSpec::new(
                    GroupKey::ShoppingMall,
                    Metric::TotalAmount,
                    Reduction::Sum,
                ))
            }
        },
    },
    Rule {
        name: "gender",
        applies: |q| q.has("gender"),
        build: |q| {
            if q.has("spending") {
                QueryPlan::Aggregate(AggregationSpec::new(
                    GroupKey::Gender,
                    Metric::TotalAmount,
                    Reduction::Sum,
                ))
            } else if q.has_any(&["preference", "category"]) {
                QueryPlan::Aggregate(AggregationSpec::new(
                    GroupKey::GenderCategory,
                    Metric::TotalAmount,
                    Reduction::Sum,
                ))
            } else {
                QueryPlan::Aggregate(AggregationSpec::new(
                    GroupKey::Gender,
                    Metric::TotalAmount,
                    Reduction::Count,
                ))
            }
        },
    },
    Rule {
        name: "age",
        applies: |q| q.has("age"),
        build: |q| {
            if q.has("group") {
                QueryPlan::Aggregate(AggregationSpec::new(
                    GroupKey::AgeGroup,
                    Metric::TotalAmount,
                    Reduction::Sum,
                ))
            } else if q.has("spending") {
                QueryPlan::Aggregate(AggregationSpec::new(
                    GroupKey::AgeGroup,
                    Metric::TotalAmount,
                    Reduction::Mean,
                ))
            } else {
                QueryPlan::Aggregate(AggregationSpec::new(
                    GroupKey::AgeGroup,
                    Metric::TotalAmount,
                    Reduction::Count,
                ))
            }
        },
    },
    Rule {
        name: "payment",
        applies: |q| q.has("payment"),
        build: |q| {
            if q.has("method") {
                QueryPlan::Aggregate(AggregationSpec::new(
                    GroupKey::PaymentMethod,
                    Metric::TotalAmount,
                    Reduction::Sum,
                ))
            } else {
                QueryPlan::Aggregate(AggregationSpec::new(
                    GroupKey::PaymentMethod,
                    Metric::TotalAmount,
                    Reduction::Count,
                ))
            }
        },
    },
    Rule {
        name: "customer",
        applies: |q| q.has("customer"),
        build: |q| {
            if q.has("segment") {
                QueryPlan::SegmentCounts
            } else {
                QueryPlan::Aggregate(AggregationSpec::new(
                    GroupKey::CustomerId,
                    Metric::TotalAmount,
                    Reduction::Sum,
                ))
            }
        },
    },
    Rule {
        name: "trend",
        applies: |q| q.has_any(&["trend", "time"]),
        build: |q| {
            let group_by = if q.has("monthly") {
                GroupKey::YearMonth
            } else {
                // "daily" and the unqualified case both group by date.
                GroupKey::InvoiceDate
            };
            QueryPlan::Aggregate(AggregationSpec::new(
                group_by,
                Metric::TotalAmount,
                Reduction::Sum,
            ))
        },
    },
    Rule {
        name: "quantity",
        applies: |q| q.has("quantity"),
        build: |q| {
            let group_by = if q.has("category") {
                GroupKey::Category
            } else if q.has("mall") {
                GroupKey::ShoppingMall
            } else {
                GroupKey::InvoiceDate
            };
            QueryPlan::Aggregate(AggregationSpec::new(
                group_by,
                Metric::Quantity,
                Reduction::Sum,
            ))
        },
    },
    Rule {
        name: "summary",
        applies: |q| q.has_any(&["summary", "overview"]),
        build: |_| QueryPlan::Summary,
    },
    Rule {
        name: "default",
        applies: |_| true,
        build: |_| {
            QueryPlan::Aggregate(AggregationSpec::new(
                GroupKey::Category,
                Metric::TotalAmount,
                Reduction::Sum,
            ))
        },
    },
];

/// Chart selection is an independent pass over the same query text.
pub fn chart_type(query: &QueryText) -> ChartType {
    if query.has("trend") {
        ChartType::Line
    } else if query.has_any(&["pie", "distribution"]) {
        ChartType::Pie
    } else {
        ChartType::Bar
    }
}

/// Translate a free-text query. Never fails: unrecognized queries fall
/// through to the default rule (revenue by category).
pub fn translate(query: &str) -> Translation {
    let text = QueryText::new(query);
    // The catch-all rule makes this loop total.
    let rule = RULES
        .iter()
        .find(|r| (r.applies)(&text))
        .unwrap_or(&RULES[RULES.len() - 1]);
    Translation {
        plan: (rule.build)(&text),
        chart: chart_type(&text),
        rule: rule.name,
    }
}

/// Reserved stricter mode: refuse queries no named family claims instead
/// of defaulting.
pub fn translate_strict(query: &str) -> Result<Translation> {
    let text = QueryText::new(query);
    let matched = RULES
        .iter()
        .take(RULES.len() - 1)
        .find(|r| (r.applies)(&text));
    match matched {
        Some(rule) => Ok(Translation {
            plan: (rule.build)(&text),
            chart: chart_type(&text),
            rule: rule.name,
        }),
        None => Err(InsightError::UnsupportedQuery(query.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(t: &Translation) -> AggregationSpec {
        match t.plan {
            QueryPlan::Aggregate(spec) => spec,
            other => panic!("expected aggregate plan, got {:?}", other),
        }
    }

    #[test]
    fn revenue_by_category() {
        let t = translate("Show me revenue by category");
        assert_eq!(t.rule, "revenue");
        let s = spec(&t);
        assert_eq!(s.group_by, GroupKey::Category);
        assert_eq!(s.metric, Metric::TotalAmount);
        assert_eq!(s.reduction, Reduction::Sum);
        assert_eq!(t.chart, ChartType::Bar);
    }

    #[test]
    fn popular_malls_count_descending() {
        let t = translate("What are the most popular shopping malls?");
        assert_eq!(t.rule, "mall");
        let s = spec(&t);
        assert_eq!(s.group_by, GroupKey::ShoppingMall);
        assert_eq!(s.reduction, Reduction::Count);
        assert!(s.sort_desc);
        assert_eq!(t.chart, ChartType::Bar);
    }

    #[test]
    fn daily_revenue_trends_line_chart() {
        let t = translate("Show me daily revenue trends");
        // "revenue" wins the family match; the chart pass still sees "trend".
        assert_eq!(t.rule, "revenue");
        let s = spec(&t);
        assert_eq!(s.group_by, GroupKey::InvoiceDate);
        assert_eq!(s.reduction, Reduction::Sum);
        assert_eq!(t.chart, ChartType::Line);
    }

    #[test]
    fn gibberish_hits_default_rule() {
        let t = translate("gibberish query xyz");
        assert_eq!(t.rule, "default");
        let s = spec(&t);
        assert_eq!(s.group_by, GroupKey::Category);
        assert_eq!(s.metric, Metric::TotalAmount);
        assert_eq!(s.reduction, Reduction::Sum);
        assert_eq!(t.chart, ChartType::Bar);
    }

    #[test]
    fn rule_order_gives_revenue_priority_over_category() {
        // Same wording minus "revenue" flips families: order is contract.
        let with_revenue = translate("revenue for each category");
        let without = translate("most popular category");
        assert_eq!(with_revenue.rule, "revenue");
        assert_eq!(without.rule, "category");
        assert_eq!(spec(&without).reduction, Reduction::Count);
        assert!(spec(&without).sort_desc);
    }

    #[test]
    fn gender_family_subrules() {
        assert_eq!(
            spec(&translate("spending by gender")).reduction,
            Reduction::Sum
        );
        assert_eq!(
            spec(&translate("gender preference")).group_by,
            GroupKey::GenderCategory
        );
        // A literal "category" token is claimed by the earlier category
        // family; only "preference" reaches the tuple grouping.
        assert_eq!(
            translate("gender category preference").rule,
            "category"
        );
        assert_eq!(
            spec(&translate("gender split")).reduction,
            Reduction::Count
        );
    }

    #[test]
    fn age_family_subrules() {
        assert_eq!(
            spec(&translate("age group totals")).reduction,
            Reduction::Sum
        );
        assert_eq!(
            spec(&translate("age spending habits")).reduction,
            Reduction::Mean
        );
        assert_eq!(spec(&translate("age counts")).reduction, Reduction::Count);
    }

    #[test]
    fn customer_and_summary_plans() {
        assert_eq!(
            translate("customer segments please").plan,
            QueryPlan::SegmentCounts
        );
        assert_eq!(
            spec(&translate("top customers")).group_by,
            GroupKey::CustomerId
        );
        assert_eq!(translate("give me an overview").plan, QueryPlan::Summary);
    }

    #[test]
    fn trend_and_quantity_subrules() {
        assert_eq!(
            spec(&translate("monthly trend")).group_by,
            GroupKey::YearMonth
        );
        assert_eq!(
            spec(&translate("spending over time")).group_by,
            GroupKey::InvoiceDate
        );
        let q = spec(&translate("quantity shipped"));
        assert_eq!(q.group_by, GroupKey::InvoiceDate);
        assert_eq!(q.metric, Metric::Quantity);
        // "mall" is claimed by the earlier mall family even when the
        // query also says "quantity" -- match order is the contract.
        assert_eq!(translate("quantity per mall").rule, "mall");
    }

    #[test]
    fn pie_chart_pass() {
        let t = translate("category distribution");
        assert_eq!(t.chart, ChartType::Pie);
        assert_eq!(t.rule, "category");
    }

    #[test]
    fn strict_mode_rejects_unmatched_queries() {
        assert!(translate_strict("Show me revenue by category").is_ok());
        match translate_strict("gibberish query xyz") {
            Err(InsightError::UnsupportedQuery(q)) => assert!(q.contains("gibberish")),
            other => panic!("expected UnsupportedQuery, got {:?}", other),
        }
    }
}
