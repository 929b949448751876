//! Canned NerdGraph `data` payloads shared by the integration tests.

use serde_json::{json, Value};

/// Catalog-query payload for a list of ids.
pub fn catalog_payload(ids: &[Value]) -> Value {
    json!({
        "actor": { "account": { "nrql": { "results": [ { "conditions": ids } ] } } }
    })
}

/// Detail-query payload for a condition with the given term thresholds.
pub fn detail_payload(id: &str, query: &str, thresholds: &[f64]) -> Value {
    let terms: Vec<_> = thresholds.iter().map(|t| json!({ "threshold": t })).collect();
    json!({
        "actor": { "account": { "alerts": { "nrqlCondition": {
            "name": id,
            "id": id,
            "type": "BASELINE",
            "terms": terms,
            "nrql": { "query": query }
        } } } }
    })
}
