//! Shared data structures for the threshold tuning workflow
//!
//! - Account: host-supplied account reference
//! - Condition / ConditionId: catalog entries observed in deviation signals
//! - ConditionDetail: signal query + configured threshold of one condition
//! - SelectedCondition: a picked condition merged with its (optional) detail
//! - Threshold: operator-editable threshold text

use serde::{Deserialize, Serialize};

// ============================================================================
// Account
// ============================================================================

/// Account reference supplied by the host environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Account {
    pub id: u64,
}

impl Account {
    pub const fn new(id: u64) -> Self {
        Self { id }
    }
}

impl std::fmt::Display for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}

// ============================================================================
// Conditions
// ============================================================================

/// Identifier of an alerting condition.
///
/// Only ASCII alphanumerics, `-` and `_` are accepted, so an id can be
/// interpolated into NRQL and GraphQL text without escaping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConditionId(String);

impl ConditionId {
    /// Parse an identifier, rejecting empty or non identifier-shaped text.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let well_formed = !raw.is_empty()
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        well_formed.then(|| Self(raw.to_string()))
    }

    /// Build an identifier from a JSON value as returned by the analytics
    /// service. `uniques(conditionId)` yields numbers; strings are accepted too.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => Self::parse(&n.to_string()),
            serde_json::Value::String(s) => Self::parse(s),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the id is all digits, the shape alerting condition ids have.
    pub fn is_numeric(&self) -> bool {
        self.0.bytes().all(|b| b.is_ascii_digit())
    }
}

impl std::fmt::Display for ConditionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ConditionId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("invalid condition id '{value}'"))
    }
}

impl From<ConditionId> for String {
    fn from(id: ConditionId) -> Self {
        id.0
    }
}

/// A catalog entry. The source data carries no display name, so `name`
/// mirrors `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub id: ConditionId,
    pub name: String,
}

impl Condition {
    pub fn new(id: ConditionId) -> Self {
        let name = id.to_string();
        Self { id, name }
    }
}

/// Signal query and configured threshold resolved for one condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionDetail {
    pub query: String,
    pub current_threshold: f64,
}

/// A picked condition. `detail` is `None` when resolution failed; the
/// condition stays selected regardless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedCondition {
    #[serde(flatten)]
    pub condition: Condition,
    #[serde(flatten)]
    pub detail: Option<ConditionDetail>,
}

impl SelectedCondition {
    pub fn id(&self) -> &ConditionId {
        &self.condition.id
    }

    pub fn name(&self) -> &str {
        &self.condition.name
    }

    pub fn query(&self) -> Option<&str> {
        self.detail.as_ref().map(|d| d.query.as_str())
    }

    pub fn current_threshold(&self) -> Option<f64> {
        self.detail.as_ref().map(|d| d.current_threshold)
    }
}

// ============================================================================
// Threshold
// ============================================================================

/// Operator-editable threshold text.
///
/// Deliberately not parsed: empty and non-numeric text are carried through
/// to the derived queries verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Threshold(String);

impl Threshold {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Threshold text for a numeric value (`3.0` renders as `3`).
    pub fn from_value(value: f64) -> Self {
        Self(value.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self("0".to_string())
    }
}

impl std::fmt::Display for Threshold {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
