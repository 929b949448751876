//! baseline-tuner: Baseline Alert Threshold Tuning
//!
//! Helps an operator tune the deviation threshold of a baseline alert
//! condition from historical deviation statistics and model behavior.
//!
//! ## Architecture
//!
//! - **Query Builder** (`query`): pure NerdGraph/NRQL query construction
//! - **Analytics Gateway** (`gateway`): executes queries (NerdGraph, fixtures)
//! - **Catalog Loader** (`catalog`) / **Detail Resolver** (`detail`): fetches
//!   that degrade to empty results instead of failing
//! - **Selection State Machine** (`selection`): account/condition/threshold/search
//!   workflow with generation-tagged fetches
//! - **Session** (`session`): drives the machine on a tokio task

pub mod config;
pub mod types;
pub mod query;
pub mod gateway;
pub mod catalog;
pub mod detail;
pub mod selection;
pub mod session;

// Re-export configuration
pub use config::TunerConfig;

// Re-export commonly used types
pub use types::{
    Account, Condition, ConditionDetail, ConditionId, SelectedCondition, Threshold,
};

// Re-export query builder
pub use query::{
    build_candidate_thresholds_query, build_catalog_query, build_condition_signal_query,
    build_deviation_trend_query, build_detail_query, build_model_behavior_query,
    DerivedQueries, Panel, PanelKind,
};

// Re-export gateway
pub use gateway::{AnalyticsGateway, FixtureGateway, GatewayError, NerdGraphGateway};

// Re-export loaders
pub use catalog::load_catalog;
pub use detail::{resolve_detail, resolve_detail_or_none, DetailError, TermPolicy};

// Re-export workflow
pub use selection::{
    filter_conditions, FetchOutcome, FetchRequest, Notice, Phase, Selection, SelectionEvent,
    SelectionMachine, SelectionView,
};
pub use session::{Session, SessionError, SessionHandle};
