//! Condition Catalog Loader
//!
//! Fetches the condition ids with deviation activity for an account.
//! Any failure degrades to an empty catalog.

use serde::Deserialize;
use std::collections::HashSet;
use tracing::debug;

use crate::gateway::AnalyticsGateway;
use crate::query;
use crate::types::{Account, Condition, ConditionId};

#[derive(Debug, Deserialize)]
struct CatalogData {
    actor: ActorNode,
}

#[derive(Debug, Deserialize)]
struct ActorNode {
    account: AccountNode,
}

#[derive(Debug, Deserialize)]
struct AccountNode {
    nrql: NrqlNode,
}

#[derive(Debug, Deserialize)]
struct NrqlNode {
    #[serde(default)]
    results: Vec<CatalogRow>,
}

#[derive(Debug, Deserialize)]
struct CatalogRow {
    #[serde(default)]
    conditions: Vec<serde_json::Value>,
}

/// Extract the catalog from a catalog-query payload.
///
/// Duplicate ids keep their first occurrence. Ids that are not
/// identifier-shaped are dropped.
pub fn parse_catalog(data: serde_json::Value) -> Result<Vec<Condition>, serde_json::Error> {
    let parsed: CatalogData = serde_json::from_value(data)?;
    let Some(row) = parsed.actor.account.nrql.results.into_iter().next() else {
        return Ok(Vec::new());
    };

    let mut seen = HashSet::new();
    let mut catalog = Vec::with_capacity(row.conditions.len());
    for raw in &row.conditions {
        match ConditionId::from_json(raw) {
            Some(id) if seen.insert(id.clone()) => catalog.push(Condition::new(id)),
            Some(_) => {}
            None => debug!(value = %raw, "Skipping malformed condition id"),
        }
    }
    Ok(catalog)
}

/// Load the catalog for `account`. Never fails: transport and payload errors
/// are logged and yield an empty catalog.
pub async fn load_catalog(gateway: &dyn AnalyticsGateway, account: &Account) -> Vec<Condition> {
    let document = query::build_catalog_query(account.id);

    let data = match gateway.query(&document).await {
        Ok(data) => data,
        Err(e) => {
            debug!(account_id = account.id, error = %e, "Failed to retrieve conditions for account: {}", account.id);
            return Vec::new();
        }
    };

    match parse_catalog(data) {
        Ok(catalog) => {
            if catalog.is_empty() {
                debug!(account_id = account.id, "No deviation-signal conditions for account: {}", account.id);
            }
            catalog
        }
        Err(e) => {
            debug!(account_id = account.id, error = %e, "Failed to retrieve conditions for account: {}", account.id);
            Vec::new()
        }
    }
}

/// Catalog-query payload for a list of ids.
#[cfg(test)]
pub(crate) fn catalog_payload(ids: &[serde_json::Value]) -> serde_json::Value {
    serde_json::json!({
        "actor": { "account": { "nrql": { "results": [ { "conditions": ids } ] } } }
    })
}
