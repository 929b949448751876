//! Tuner Configuration - transport, term policy and session settings as TOML
//!
//! Each section implements `Default`, so a missing file or missing section
//! behaves exactly like the built-in defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use super::defaults;
use crate::detail::TermPolicy;
use crate::gateway::{NERDGRAPH_EU_ENDPOINT, NERDGRAPH_US_ENDPOINT};

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration.
///
/// Load with `TunerConfig::load()` which searches:
/// 1. `$TUNER_CONFIG` env var
/// 2. `./tuner_config.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TunerConfig {
    /// NerdGraph transport
    #[serde(default)]
    pub nerdgraph: NerdGraphConfig,

    /// Condition detail resolution
    #[serde(default)]
    pub detail: DetailConfig,

    /// Session driver
    #[serde(default)]
    pub session: SessionConfig,
}

impl TunerConfig {
    /// Load configuration using the standard search order:
    /// 1. `$TUNER_CONFIG` environment variable
    /// 2. `./tuner_config.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        for (path, origin) in Self::candidate_files() {
            match Self::load_from_file(&path) {
                Ok(config) => {
                    info!(path = %path.display(), origin, "Loaded tuner config");
                    return config;
                }
                Err(e) => {
                    warn!(path = %path.display(), origin, error = %e, "Skipping unusable tuner config");
                }
            }
        }

        info!("No usable tuner config found, using built-in defaults");
        Self::default()
    }

    /// Existing config files in search order, tagged with where they came from.
    fn candidate_files() -> Vec<(PathBuf, &'static str)> {
        let mut files = Vec::with_capacity(2);

        if let Some(path) = std::env::var_os(defaults::CONFIG_ENV).map(PathBuf::from) {
            if path.is_file() {
                files.push((path, defaults::CONFIG_ENV));
            } else {
                warn!(path = %path.display(), "{} does not name a file, ignoring", defaults::CONFIG_ENV);
            }
        }

        let local = PathBuf::from(defaults::CONFIG_FILE);
        if local.is_file() {
            files.push((local, "working directory"));
        }

        files
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse and validate TOML text. Unknown keys are warned about, not rejected.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in &super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(PathBuf::new(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate value ranges.
    ///
    /// Rules:
    /// - Timeouts and buffer sizes must be > 0
    /// - An endpoint override must be an absolute http(s) URL
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        let ng = &self.nerdgraph;
        if ng.timeout_secs == 0 {
            errors.push("nerdgraph.timeout_secs must be > 0".to_string());
        }
        if let Some(endpoint) = &ng.endpoint {
            match reqwest::Url::parse(endpoint) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => {}
                Ok(url) => errors.push(format!(
                    "nerdgraph.endpoint must use http or https, got '{}'",
                    url.scheme()
                )),
                Err(e) => errors.push(format!("nerdgraph.endpoint '{endpoint}' is not a URL: {e}")),
            }
        }

        if self.session.event_buffer == 0 {
            errors.push("session.event_buffer must be > 0".to_string());
        }

        let (range_errors, range_warnings) = super::validation::validate_ranges(self);
        errors.extend(range_errors);
        for w in &range_warnings {
            warn!("{}", w);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config {}: {1}", .0.display())]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Invalid TOML in config {}: {1}", .0.display())]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("Cannot serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid config values: {}", .0.join("; "))]
    Validation(Vec<String>),
}

// ============================================================================
// NerdGraph
// ============================================================================

/// NerdGraph data center region.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    #[default]
    Us,
    Eu,
}

/// NerdGraph transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NerdGraphConfig {
    /// Region selecting the default endpoint
    #[serde(default)]
    pub region: Region,

    /// Explicit endpoint, overrides `region`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// User API key. `NEW_RELIC_API_KEY` takes precedence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    defaults::NERDGRAPH_TIMEOUT_SECS
}

impl Default for NerdGraphConfig {
    fn default() -> Self {
        Self {
            region: Region::default(),
            endpoint: None,
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl NerdGraphConfig {
    /// Endpoint to send queries to.
    pub fn endpoint_url(&self) -> String {
        match (&self.endpoint, self.region) {
            (Some(url), _) => url.clone(),
            (None, Region::Us) => NERDGRAPH_US_ENDPOINT.to_string(),
            (None, Region::Eu) => NERDGRAPH_EU_ENDPOINT.to_string(),
        }
    }

    /// API key from the environment, falling back to the config file.
    pub fn resolve_api_key(&self) -> Option<String> {
        std::env::var(defaults::API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| self.api_key.clone().filter(|k| !k.trim().is_empty()))
    }
}

// ============================================================================
// Detail
// ============================================================================

/// Condition detail resolution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetailConfig {
    /// How the configured threshold is picked from multiple terms
    #[serde(default)]
    pub term_policy: TermPolicy,
}

// ============================================================================
// Session
// ============================================================================

/// Session driver sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Capacity of the event channel
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_event_buffer() -> usize {
    defaults::SESSION_EVENT_BUFFER
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            event_buffer: default_event_buffer(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = TunerConfig::default();
        assert_eq!(cfg.nerdgraph.timeout_secs, 30);
        assert_eq!(cfg.nerdgraph.endpoint_url(), NERDGRAPH_US_ENDPOINT);
        assert_eq!(cfg.detail.term_policy, TermPolicy::First);
        assert_eq!(cfg.session.event_buffer, 32);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_is_default() {
        let cfg = TunerConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.nerdgraph.region, Region::Us);
        assert_eq!(cfg.session.event_buffer, 32);
    }

    #[test]
    fn test_region_and_override() {
        let cfg = TunerConfig::from_toml_str("[nerdgraph]\nregion = \"eu\"\n").unwrap();
        assert_eq!(cfg.nerdgraph.endpoint_url(), NERDGRAPH_EU_ENDPOINT);

        let cfg = TunerConfig::from_toml_str(
            "[nerdgraph]\nregion = \"eu\"\nendpoint = \"http://localhost:9000/graphql\"\n",
        )
        .unwrap();
        assert_eq!(cfg.nerdgraph.endpoint_url(), "http://localhost:9000/graphql");
    }

    #[test]
    fn test_config_error_messages_and_sources() {
        let err = ConfigError::Validation(vec!["a must be > 0".into(), "b must be > 0".into()]);
        assert_eq!(
            err.to_string(),
            "Invalid config values: a must be > 0; b must be > 0"
        );

        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = ConfigError::Io(PathBuf::from("/etc/tuner.toml"), io);
        assert_eq!(err.to_string(), "Cannot read config /etc/tuner.toml: gone");
        assert!(std::error::Error::source(&err).is_some());

        let err = TunerConfig::from_toml_str("[session\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(..)));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_validation_errors_collected() {
        let err = TunerConfig::from_toml_str(
            "[nerdgraph]\ntimeout_secs = 0\nendpoint = \"ftp://x\"\n[session]\nevent_buffer = 0\n",
        )
        .unwrap_err();
        match err {
            ConfigError::Validation(errors) => assert_eq!(errors.len(), 3),
            other => panic!("expected validation error, got {other}"),
        }
    }

    #[test]
    fn test_toml_roundtrip() {
        let mut cfg = TunerConfig::default();
        cfg.detail.term_policy = TermPolicy::Strict;
        let text = cfg.to_toml().unwrap();
        let back = TunerConfig::from_toml_str(&text).unwrap();
        assert_eq!(back.detail.term_policy, TermPolicy::Strict);
    }
}
