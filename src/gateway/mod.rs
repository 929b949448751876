//! Analytics Gateway - executes query documents against the analytics service
//!
//! [`AnalyticsGateway`] is the only seam between the workflow and the
//! outside world. Implementations:
//!
//! - [`NerdGraphGateway`]: HTTPS GraphQL transport
//! - [`FixtureGateway`]: canned responses for offline runs and tests

use async_trait::async_trait;
use thiserror::Error;

mod fixture;
mod nerdgraph;

pub use fixture::{FixtureGateway, FixtureRoute};
pub use nerdgraph::{NerdGraphGateway, NERDGRAPH_EU_ENDPOINT, NERDGRAPH_US_ENDPOINT};

/// Transport failures. Callers in this crate log these and degrade to
/// empty results; nothing here is shown to the operator.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned status {0}")]
    ServerError(reqwest::StatusCode),

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Query errors: {0}")]
    Query(String),

    #[error("No data in response")]
    NoData,

    #[error("Invalid API key header value")]
    InvalidApiKey,

    #[error("No API key configured (set NEW_RELIC_API_KEY or nerdgraph.api_key)")]
    MissingApiKey,
}

/// Executes a single query document and returns the `data` payload.
#[async_trait]
pub trait AnalyticsGateway: Send + Sync {
    /// Run `document` and return its `data` member.
    async fn query(&self, document: &str) -> Result<serde_json::Value, GatewayError>;

    /// Human-readable name for logging.
    fn gateway_name(&self) -> &str;
}
