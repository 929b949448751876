//! Query Builder - NerdGraph documents and NRQL display queries
//!
//! Every function here is pure and total: the same inputs always produce the
//! same text, and no input makes a builder fail.
//!
//! ## Queries
//!
//! - `build_catalog_query`: condition ids seen in deviation signals (GraphQL)
//! - `build_detail_query`: name, terms and signal query of one condition (GraphQL)
//! - `build_candidate_thresholds_query`: avg/p75/p95 of hourly max deviations (NRQL)
//! - `build_deviation_trend_query`: 30-minute max deviations vs threshold (NRQL)
//! - `build_model_behavior_query`: signal, prediction and upper band (NRQL)
//! - `build_condition_signal_query`: the condition's own signal over a week (NRQL)
//!
//! Condition ids are [`ConditionId`]s, which are identifier-shaped by
//! construction; non-numeric ids are quoted in NRQL. Threshold text is
//! interpolated verbatim.

use serde::Serialize;
use std::borrow::Cow;

use crate::types::{ConditionId, SelectedCondition, Threshold};

/// Maximum number of distinct condition ids requested by the catalog query.
pub const CATALOG_LIMIT: usize = 5000;

/// Server-side NRQL timeout attached to the catalog query (seconds).
pub const NRQL_TIMEOUT_SECS: u32 = 90;

/// Standard-deviation multiplier used for the model's upper band.
pub const UPPER_BAND_SIGMA: u32 = 7;

/// Event type carrying deviation signals.
const SIGNAL_EVENT: &str = "NrAiSignal";

// ============================================================================
// NerdGraph documents
// ============================================================================

/// Condition ids with deviation activity in the trailing month.
pub fn build_catalog_query(account_id: u64) -> String {
    format!(
        r#"{{
  actor {{
    account(id: {account_id}) {{
      nrql(query: "SELECT uniques(conditionId, {CATALOG_LIMIT}) as 'conditions' FROM {SIGNAL_EVENT} where numberOfDeviations is not null since 1 month ago", timeout: {NRQL_TIMEOUT_SECS}) {{
        results
      }}
    }}
  }}
}}"#
    )
}

/// Name, id, type, terms and signal query of a single NRQL condition.
pub fn build_detail_query(account_id: u64, condition_id: &ConditionId) -> String {
    format!(
        r#"{{
  actor {{
    account(id: {account_id}) {{
      alerts {{
        nrqlCondition(id: "{condition_id}") {{
          name
          id
          terms {{
            threshold
          }}
          type
          nrql {{
            query
          }}
        }}
      }}
    }}
  }}
}}"#
    )
}

// ============================================================================
// NRQL display queries
// ============================================================================

/// NRQL literal for a condition id. No selection renders as `0`, which
/// yields a valid query with no rows. Numeric ids stay bare; any other id is
/// quoted so `a-b` compares as a string instead of parsing as `a - b`.
fn condition_literal(condition_id: Option<&ConditionId>) -> Cow<'_, str> {
    match condition_id {
        None => Cow::Borrowed("0"),
        Some(id) if id.is_numeric() => Cow::Borrowed(id.as_str()),
        Some(id) => Cow::Owned(format!("'{id}'")),
    }
}

/// Average, p75 and p95 of the hourly max absolute deviation count over the
/// trailing week, compared with two weeks ago, faceted by the threshold.
pub fn build_candidate_thresholds_query(
    condition_id: Option<&ConditionId>,
    threshold: &str,
) -> String {
    let condition = condition_literal(condition_id);
    format!(
        "SELECT average(deviations) as 'avg', percentile(deviations, 75) as 'p75', percentile(deviations, 95) as 'p95' \
         FROM (FROM {SIGNAL_EVENT} SELECT max(abs(numberOfDeviations)) as 'deviations' WHERE conditionId = {condition} TIMESERIES 1 hour LIMIT MAX) \
         since 1 week ago compare with 2 weeks ago FACET string({threshold}) as 'Current Threshold'"
    )
}

/// Max absolute deviations per 30 minutes against the threshold as a
/// constant series. `or 0` keeps an empty threshold well-formed.
pub fn build_deviation_trend_query(condition_id: Option<&ConditionId>, threshold: &str) -> String {
    let condition = condition_literal(condition_id);
    format!(
        "FROM {SIGNAL_EVENT} SELECT max(abs(numberOfDeviations)), ({threshold} or 0) as 'Current Threshold' \
         WHERE conditionId = {condition} SINCE 1 week ago TIMESERIES 30 minutes COMPARE WITH 2 weeks ago"
    )
}

/// Latest signal, latest prediction and the prediction's upper band.
pub fn build_model_behavior_query(condition_id: Option<&ConditionId>) -> String {
    let condition = condition_literal(condition_id);
    format!(
        "FROM {SIGNAL_EVENT} SELECT latest(signalValue), latest(predictedValue), \
         latest(predictedValue + (standardDeviation * {UPPER_BAND_SIGMA})) as 'Upper Threshold' \
         WHERE conditionId = {condition} SINCE 1 week ago TIMESERIES 30 minutes"
    )
}

/// The condition's own signal query charted over the trailing week.
pub fn build_condition_signal_query(signal_query: &str) -> String {
    format!("{signal_query} SINCE 1 WEEK AGO TIMESERIES")
}

// ============================================================================
// Derived panels
// ============================================================================

/// Widget a display query is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelKind {
    Table,
    LineChart,
}

/// A titled display query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Panel {
    pub title: &'static str,
    pub kind: PanelKind,
    pub query: String,
}

/// Display queries derived from the current selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DerivedQueries {
    pub candidate_thresholds: String,
    /// Only present when the condition's detail was resolved.
    pub condition_signal: Option<String>,
    pub deviation_trend: String,
    pub model_behavior: String,
}

impl DerivedQueries {
    pub fn derive(condition: &SelectedCondition, threshold: &Threshold) -> Self {
        Self::for_parts(Some(condition.id()), condition.query(), threshold)
    }

    /// Derive from loose parts, e.g. without a resolved condition.
    pub fn for_parts(
        condition_id: Option<&ConditionId>,
        signal_query: Option<&str>,
        threshold: &Threshold,
    ) -> Self {
        Self {
            candidate_thresholds: build_candidate_thresholds_query(
                condition_id,
                threshold.as_str(),
            ),
            condition_signal: signal_query.map(build_condition_signal_query),
            deviation_trend: build_deviation_trend_query(condition_id, threshold.as_str()),
            model_behavior: build_model_behavior_query(condition_id),
        }
    }

    /// Panels in display order.
    pub fn panels(&self) -> Vec<Panel> {
        let mut panels = vec![Panel {
            title: "Candidate Thresholds",
            kind: PanelKind::Table,
            query: self.candidate_thresholds.clone(),
        }];
        if let Some(q) = &self.condition_signal {
            panels.push(Panel {
                title: "Condition Signal",
                kind: PanelKind::LineChart,
                query: q.clone(),
            });
        }
        panels.push(Panel {
            title: "Deviations vs Current Threshold",
            kind: PanelKind::LineChart,
            query: self.deviation_trend.clone(),
        });
        panels.push(Panel {
            title: "Model Behavior",
            kind: PanelKind::LineChart,
            query: self.model_behavior.clone(),
        });
        panels
    }
}
