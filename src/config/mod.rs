//! Tuner Configuration Module
//!
//! Provides the process configuration loaded from a TOML file: NerdGraph
//! transport, detail term policy and session sizing.
//!
//! ## Loading Order
//!
//! 1. `TUNER_CONFIG` environment variable (path to TOML file)
//! 2. `tuner_config.toml` in the current working directory
//! 3. Built-in defaults
//!
//! ## Usage
//!
//! Call `config::init()` once at startup, then `config::get()` anywhere:
//!
//! ```ignore
//! // In main():
//! config::init(TunerConfig::load());
//!
//! // Anywhere in the codebase:
//! let policy = config::get().detail.term_policy;
//! ```

mod tuner_config;
pub mod defaults;
pub mod validation;

pub use tuner_config::*;

use std::sync::OnceLock;

/// Global tuner configuration, initialized once at startup.
static TUNER_CONFIG: OnceLock<TunerConfig> = OnceLock::new();

/// Initialize the global tuner configuration.
///
/// Later calls are ignored with a warning.
pub fn init(config: TunerConfig) {
    if TUNER_CONFIG.set(config).is_err() {
        tracing::warn!("config::init() called more than once, ignoring");
    }
}

/// Get a reference to the global tuner configuration.
///
/// Panics if `init()` has not been called. Library code checks
/// `is_initialized()` first and falls back to defaults.
#[allow(clippy::expect_used)]
pub fn get() -> &'static TunerConfig {
    TUNER_CONFIG
        .get()
        .expect("config::get() called before config::init(): startup bug")
}

/// Check whether the config has been initialized.
pub fn is_initialized() -> bool {
    TUNER_CONFIG.get().is_some()
}
