//! Condition Detail Resolver
//!
//! Fetches a condition's signal query and configured threshold. The
//! threshold comes from the condition's terms; how multiple terms are
//! treated is governed by [`TermPolicy`].

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::gateway::{AnalyticsGateway, GatewayError};
use crate::query;
use crate::types::{Account, Condition, ConditionDetail, ConditionId};

#[derive(Debug, Error)]
pub enum DetailError {
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Malformed detail payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Condition {0} not found")]
    NotFound(ConditionId),

    #[error("Condition {0} has no signal query")]
    MissingQuery(ConditionId),

    #[error("Condition {0} has no terms")]
    NoTerms(ConditionId),

    #[error("Condition {id} has conflicting term thresholds: {thresholds:?}")]
    ConflictingTerms { id: ConditionId, thresholds: Vec<f64> },
}

/// How the configured threshold is picked from a condition's terms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TermPolicy {
    /// Use the first term; warn if later terms disagree.
    #[default]
    First,
    /// Refuse conditions whose terms disagree.
    Strict,
}

impl std::fmt::Display for TermPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TermPolicy::First => write!(f, "first"),
            TermPolicy::Strict => write!(f, "strict"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DetailData {
    actor: ActorNode,
}

#[derive(Debug, Deserialize)]
struct ActorNode {
    account: AccountNode,
}

#[derive(Debug, Deserialize)]
struct AccountNode {
    alerts: AlertsNode,
}

#[derive(Debug, Deserialize)]
struct AlertsNode {
    #[serde(rename = "nrqlCondition")]
    nrql_condition: Option<NrqlConditionNode>,
}

#[derive(Debug, Deserialize)]
struct NrqlConditionNode {
    #[serde(default)]
    terms: Vec<TermNode>,
    nrql: Option<NrqlNode>,
}

#[derive(Debug, Deserialize)]
struct TermNode {
    threshold: f64,
}

#[derive(Debug, Deserialize)]
struct NrqlNode {
    query: Option<String>,
}

/// Extract the detail of condition `id` from a detail-query payload.
pub fn extract_detail(
    id: &ConditionId,
    data: serde_json::Value,
    policy: TermPolicy,
) -> Result<ConditionDetail, DetailError> {
    let parsed: DetailData = serde_json::from_value(data)?;
    let node = parsed
        .actor
        .account
        .alerts
        .nrql_condition
        .ok_or_else(|| DetailError::NotFound(id.clone()))?;

    let query = node
        .nrql
        .and_then(|n| n.query)
        .ok_or_else(|| DetailError::MissingQuery(id.clone()))?;

    let first = node
        .terms
        .first()
        .map(|t| t.threshold)
        .ok_or_else(|| DetailError::NoTerms(id.clone()))?;

    #[allow(clippy::float_cmp)]
    let conflicting = node.terms.iter().any(|t| t.threshold != first);
    if conflicting {
        let thresholds: Vec<f64> = node.terms.iter().map(|t| t.threshold).collect();
        match policy {
            TermPolicy::First => {
                warn!(condition_id = %id, ?thresholds, "Condition terms disagree, using first term threshold {}", first);
            }
            TermPolicy::Strict => {
                return Err(DetailError::ConflictingTerms {
                    id: id.clone(),
                    thresholds,
                });
            }
        }
    }

    Ok(ConditionDetail {
        query,
        current_threshold: first,
    })
}

/// Fetch the detail of `condition` in `account`.
pub async fn resolve_detail(
    gateway: &dyn AnalyticsGateway,
    account: &Account,
    condition: &Condition,
    policy: TermPolicy,
) -> Result<ConditionDetail, DetailError> {
    let document = query::build_detail_query(account.id, &condition.id);
    let data = gateway.query(&document).await?;
    extract_detail(&condition.id, data, policy)
}

/// Fetch the detail, degrading every failure to `None`.
pub async fn resolve_detail_or_none(
    gateway: &dyn AnalyticsGateway,
    account: &Account,
    condition: &Condition,
    policy: TermPolicy,
) -> Option<ConditionDetail> {
    match resolve_detail(gateway, account, condition, policy).await {
        Ok(detail) => Some(detail),
        Err(e) => {
            debug!(
                account_id = account.id,
                condition_id = %condition.id,
                error = %e,
                "Failed to retrieve condition detail for condition id: {}",
                condition.id
            );
            None
        }
    }
}

/// Detail-query payload for a condition with the given term thresholds.
#[cfg(test)]
pub(crate) fn detail_payload(id: &str, query: &str, thresholds: &[f64]) -> serde_json::Value {
    let terms: Vec<_> = thresholds
        .iter()
        .map(|t| serde_json::json!({ "threshold": t }))
        .collect();
    serde_json::json!({
        "actor": { "account": { "alerts": { "nrqlCondition": {
            "name": id,
            "id": id,
            "type": "BASELINE",
            "terms": terms,
            "nrql": { "query": query }
        } } } }
    })
}
