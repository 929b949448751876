//! Fixture gateway - replays canned responses
//!
//! Routes are matched in order by substring against the query document.
//! A fixture file is a JSON array of routes:
//!
//! ```json
//! [
//!   { "match": "uniques(conditionId", "data": { "actor": { ... } } },
//!   { "match": "nrqlCondition(id: \"205\")", "error": "forbidden", "delay_ms": 50 }
//! ]
//! ```

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

use super::{AnalyticsGateway, GatewayError};

/// One canned response.
#[derive(Debug, Clone, Deserialize)]
pub struct FixtureRoute {
    /// Substring the query document must contain.
    #[serde(rename = "match")]
    pub pattern: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    /// When set, the route fails with this message instead of returning data.
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub delay_ms: u64,
}

/// Gateway answering from a list of [`FixtureRoute`]s.
#[derive(Debug, Default)]
pub struct FixtureGateway {
    routes: Vec<FixtureRoute>,
    calls: Mutex<Vec<String>>,
}

impl FixtureGateway {
    pub fn new(routes: Vec<FixtureRoute>) -> Self {
        Self {
            routes,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Load routes from a JSON fixture file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read fixture {}", path.display()))?;
        let routes: Vec<FixtureRoute> = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse fixture {}", path.display()))?;
        Ok(Self::new(routes))
    }

    /// Answer documents containing `pattern` with `data`.
    #[must_use]
    pub fn with_data(mut self, pattern: &str, data: serde_json::Value) -> Self {
        self.routes.push(FixtureRoute {
            pattern: pattern.to_string(),
            data: Some(data),
            error: None,
            delay_ms: 0,
        });
        self
    }

    /// Fail documents containing `pattern` with `message`.
    #[must_use]
    pub fn with_error(mut self, pattern: &str, message: &str) -> Self {
        self.routes.push(FixtureRoute {
            pattern: pattern.to_string(),
            data: None,
            error: Some(message.to_string()),
            delay_ms: 0,
        });
        self
    }

    /// Delay the most recently added route.
    #[must_use]
    pub fn delayed(mut self, delay: Duration) -> Self {
        if let Some(route) = self.routes.last_mut() {
            route.delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        }
        self
    }

    /// Documents received so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl AnalyticsGateway for FixtureGateway {
    async fn query(&self, document: &str) -> Result<serde_json::Value, GatewayError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(document.to_string());

        let Some(route) = self.routes.iter().find(|r| document.contains(&r.pattern)) else {
            debug!("[FixtureGateway] No route matched query document");
            return Err(GatewayError::NoData);
        };

        if route.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(route.delay_ms)).await;
        }

        if let Some(message) = &route.error {
            return Err(GatewayError::Query(message.clone()));
        }
        route.data.clone().ok_or(GatewayError::NoData)
    }

    fn gateway_name(&self) -> &str {
        "fixture"
    }
}
