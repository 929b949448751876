//! System-wide default constants.

// ============================================================================
// NerdGraph
// ============================================================================

/// HTTP client timeout for NerdGraph requests (seconds).
pub const NERDGRAPH_TIMEOUT_SECS: u64 = 30;

/// Upper bound above which a timeout is flagged as suspicious (seconds).
pub const NERDGRAPH_TIMEOUT_WARN_SECS: u64 = 300;

/// Environment variable holding the user API key. Takes precedence over
/// `nerdgraph.api_key`.
pub const API_KEY_ENV: &str = "NEW_RELIC_API_KEY";

// ============================================================================
// Session
// ============================================================================

/// Capacity of the session's event channel.
pub const SESSION_EVENT_BUFFER: usize = 32;

// ============================================================================
// Config discovery
// ============================================================================

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "TUNER_CONFIG";

/// Config file looked up in the working directory.
pub const CONFIG_FILE: &str = "tuner_config.toml";
