//! NerdGraph client - GraphQL over HTTPS

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

use super::{AnalyticsGateway, GatewayError};
use crate::config::NerdGraphConfig;

/// US region endpoint.
pub const NERDGRAPH_US_ENDPOINT: &str = "https://api.newrelic.com/graphql";

/// EU region endpoint.
pub const NERDGRAPH_EU_ENDPOINT: &str = "https://api.eu.newrelic.com/graphql";

const API_KEY_HEADER: &str = "api-key";

#[derive(Debug, Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<serde_json::Value>,
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

/// Gateway backed by the NerdGraph API.
#[derive(Debug, Clone)]
pub struct NerdGraphGateway {
    http: reqwest::Client,
    endpoint: String,
}

impl NerdGraphGateway {
    /// Build a client for `endpoint` authenticating with `api_key`.
    pub fn new(endpoint: &str, api_key: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let mut headers = HeaderMap::new();
        let mut key = HeaderValue::from_str(api_key).map_err(|_| GatewayError::InvalidApiKey)?;
        key.set_sensitive(true);
        headers.insert(API_KEY_HEADER, key);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            endpoint: endpoint.to_string(),
        })
    }

    /// Build from the `[nerdgraph]` config section.
    pub fn from_config(cfg: &NerdGraphConfig) -> Result<Self, GatewayError> {
        let api_key = cfg.resolve_api_key().ok_or(GatewayError::MissingApiKey)?;
        Self::new(
            &cfg.endpoint_url(),
            &api_key,
            Duration::from_secs(cfg.timeout_secs),
        )
    }

    /// Endpoint URL for logging.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl AnalyticsGateway for NerdGraphGateway {
    #[instrument(skip(self, document), fields(endpoint = %self.endpoint))]
    async fn query(&self, document: &str) -> Result<serde_json::Value, GatewayError> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(&GraphQlRequest { query: document })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::ServerError(status));
        }

        let body = response.bytes().await?;
        let parsed: GraphQlResponse = serde_json::from_slice(&body)
            .map_err(|e| GatewayError::Malformed(e.to_string()))?;

        if let Some(errors) = parsed.errors.filter(|errs| !errs.is_empty()) {
            let messages: Vec<_> = errors.iter().map(|e| e.message.as_str()).collect();
            return Err(GatewayError::Query(messages.join(", ")));
        }

        debug!(bytes = body.len(), "NerdGraph query succeeded");
        parsed
            .data
            .filter(|d| !d.is_null())
            .ok_or(GatewayError::NoData)
    }

    fn gateway_name(&self) -> &str {
        "NerdGraph"
    }
}
