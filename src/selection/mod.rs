//! Selection State Machine
//!
//! Owns the session's [`Selection`] and sequences catalog and detail fetches
//! in response to operator and host events.
//!
//! ## States
//!
//! ```text
//! Idle --AccountChanged--> Loading --catalog--> ReadyEmpty | ReadySelecting
//! ReadySelecting | ReadySelected --ConditionPicked--> Loading --detail--> ReadySelected
//! any --AccountChanged--> Loading
//! ```
//!
//! The machine itself does no I/O. [`SelectionMachine::handle`] returns a
//! [`FetchRequest`] when an event needs data; the caller runs it and feeds
//! the [`FetchOutcome`] back through [`SelectionMachine::complete`].
//!
//! ## Superseded fetches
//!
//! In-flight fetches are never cancelled. Every request carries the
//! generation current when it was issued, and an outcome whose generation
//! is no longer current is discarded rather than applied.

mod filter;
mod view;

pub use filter::filter_conditions;
pub use view::{Notice, SelectionView};

use serde::Serialize;
use tracing::{debug, info};

use crate::catalog;
use crate::detail::{self, TermPolicy};
use crate::gateway::AnalyticsGateway;
use crate::query::DerivedQueries;
use crate::types::{Account, Condition, ConditionDetail, SelectedCondition, Threshold};

// ============================================================================
// State
// ============================================================================

/// Workflow phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    Loading,
    ReadyEmpty,
    ReadySelecting,
    ReadySelected,
}

impl Phase {
    pub fn is_ready(self) -> bool {
        matches!(
            self,
            Phase::ReadyEmpty | Phase::ReadySelecting | Phase::ReadySelected
        )
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Idle => write!(f, "Idle"),
            Phase::Loading => write!(f, "Loading"),
            Phase::ReadyEmpty => write!(f, "Ready-Empty"),
            Phase::ReadySelecting => write!(f, "Ready-Selecting"),
            Phase::ReadySelected => write!(f, "Ready-Selected"),
        }
    }
}

/// Mutable workflow state of one session.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub account: Option<Account>,
    pub catalog: Vec<Condition>,
    pub condition: Option<SelectedCondition>,
    pub threshold: Threshold,
    pub search: String,
    pub loading: bool,
    /// True until the first account change.
    pub first_load: bool,
}

impl Default for Selection {
    fn default() -> Self {
        Self {
            account: None,
            catalog: Vec::new(),
            condition: None,
            threshold: Threshold::default(),
            search: String::new(),
            loading: false,
            first_load: true,
        }
    }
}

// ============================================================================
// Events and fetches
// ============================================================================

/// External events driving the machine.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionEvent {
    AccountChanged(Account),
    ConditionPicked(Condition),
    ThresholdEdited(String),
    SearchEdited(String),
}

/// Data the machine needs before it can leave `Loading`.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchRequest {
    Catalog {
        generation: u64,
        account: Account,
    },
    Detail {
        generation: u64,
        account: Account,
        condition: Condition,
    },
}

impl FetchRequest {
    pub fn generation(&self) -> u64 {
        match self {
            FetchRequest::Catalog { generation, .. } | FetchRequest::Detail { generation, .. } => {
                *generation
            }
        }
    }

    /// Run the fetch. Failures are already folded into empty outcomes.
    pub async fn run(self, gateway: &dyn AnalyticsGateway, policy: TermPolicy) -> FetchOutcome {
        match self {
            FetchRequest::Catalog {
                generation,
                account,
            } => FetchOutcome::Catalog {
                generation,
                conditions: catalog::load_catalog(gateway, &account).await,
            },
            FetchRequest::Detail {
                generation,
                account,
                condition,
            } => {
                let detail =
                    detail::resolve_detail_or_none(gateway, &account, &condition, policy).await;
                FetchOutcome::Detail {
                    generation,
                    condition,
                    detail,
                }
            }
        }
    }
}

/// Completed fetch, tagged with the generation it was issued under.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Catalog {
        generation: u64,
        conditions: Vec<Condition>,
    },
    Detail {
        generation: u64,
        condition: Condition,
        detail: Option<ConditionDetail>,
    },
}

impl FetchOutcome {
    pub fn generation(&self) -> u64 {
        match self {
            FetchOutcome::Catalog { generation, .. } | FetchOutcome::Detail { generation, .. } => {
                *generation
            }
        }
    }
}

// ============================================================================
// Machine
// ============================================================================

/// The selection state machine. Single owner of [`Selection`].
#[derive(Debug, Clone, Default)]
pub struct SelectionMachine {
    selection: Selection,
    phase: Phase,
    generation: u64,
}

impl SelectionMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Generation of the most recently issued fetch.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Apply an event. Returns the fetch to run, if any.
    ///
    /// Events that are not valid in the current phase are ignored.
    pub fn handle(&mut self, event: SelectionEvent) -> Option<FetchRequest> {
        match event {
            SelectionEvent::AccountChanged(account) => Some(self.change_account(account)),
            SelectionEvent::ConditionPicked(condition) => self.pick_condition(condition),
            SelectionEvent::ThresholdEdited(text) => {
                if self.phase == Phase::ReadySelected {
                    self.selection.threshold = Threshold::new(text);
                } else {
                    debug!(phase = %self.phase, "Ignoring threshold edit");
                }
                None
            }
            SelectionEvent::SearchEdited(text) => {
                if matches!(self.phase, Phase::ReadySelecting | Phase::ReadySelected) {
                    self.selection.search = text;
                } else {
                    debug!(phase = %self.phase, "Ignoring search edit");
                }
                None
            }
        }
    }

    fn change_account(&mut self, account: Account) -> FetchRequest {
        self.generation += 1;
        info!(account_id = account.id, generation = self.generation, "Account changed");

        let sel = &mut self.selection;
        sel.account = Some(account);
        sel.catalog.clear();
        sel.condition = None;
        sel.threshold = Threshold::default();
        sel.search.clear();
        sel.loading = true;
        sel.first_load = false;
        self.phase = Phase::Loading;

        FetchRequest::Catalog {
            generation: self.generation,
            account,
        }
    }

    fn pick_condition(&mut self, condition: Condition) -> Option<FetchRequest> {
        if !matches!(self.phase, Phase::ReadySelecting | Phase::ReadySelected) {
            debug!(phase = %self.phase, condition_id = %condition.id, "Ignoring condition pick");
            return None;
        }
        let Some(account) = self.selection.account else {
            debug!(condition_id = %condition.id, "Ignoring condition pick without account");
            return None;
        };
        if !self.selection.catalog.iter().any(|c| c.id == condition.id) {
            debug!(condition_id = %condition.id, "Ignoring pick of condition outside catalog");
            return None;
        }

        self.generation += 1;
        info!(condition_id = %condition.id, generation = self.generation, "Condition picked");

        self.selection.search.clear();
        self.selection.loading = true;
        self.phase = Phase::Loading;

        Some(FetchRequest::Detail {
            generation: self.generation,
            account,
            condition,
        })
    }

    /// Apply a completed fetch. Returns `false` if it was stale and dropped.
    pub fn complete(&mut self, outcome: FetchOutcome) -> bool {
        if outcome.generation() != self.generation {
            debug!(
                generation = outcome.generation(),
                current = self.generation,
                "Discarding stale fetch result"
            );
            return false;
        }

        match outcome {
            FetchOutcome::Catalog { conditions, .. } => {
                self.phase = if conditions.is_empty() {
                    Phase::ReadyEmpty
                } else {
                    Phase::ReadySelecting
                };
                info!(count = conditions.len(), phase = %self.phase, "Catalog loaded");
                self.selection.catalog = conditions;
            }
            FetchOutcome::Detail {
                condition, detail, ..
            } => {
                if let Some(d) = &detail {
                    self.selection.threshold = Threshold::from_value(d.current_threshold);
                }
                info!(
                    condition_id = %condition.id,
                    resolved = detail.is_some(),
                    "Condition selected"
                );
                self.selection.condition = Some(SelectedCondition { condition, detail });
                self.phase = Phase::ReadySelected;
            }
        }
        self.selection.loading = false;
        true
    }

    /// Handle an event and run its fetch to completion before returning.
    pub async fn dispatch(
        &mut self,
        gateway: &dyn AnalyticsGateway,
        policy: TermPolicy,
        event: SelectionEvent,
    ) {
        if let Some(request) = self.handle(event) {
            let outcome = request.run(gateway, policy).await;
            self.complete(outcome);
        }
    }

    /// Catalog entries matching the current search.
    pub fn filtered_catalog(&self) -> Vec<&Condition> {
        filter_conditions(&self.selection.catalog, &self.selection.search)
    }

    /// Display queries for the selected condition, if any.
    pub fn derived_queries(&self) -> Option<DerivedQueries> {
        self.selection
            .condition
            .as_ref()
            .map(|c| DerivedQueries::derive(c, &self.selection.threshold))
    }

    /// Snapshot for the presentation layer.
    pub fn view(&self) -> SelectionView {
        SelectionView::from_machine(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::catalog_payload;
    use crate::detail::detail_payload;
    use crate::gateway::FixtureGateway;
    use crate::types::ConditionId;
    use serde_json::json;

    fn cond(id: &str) -> Condition {
        Condition::new(ConditionId::parse(id).unwrap())
    }

    fn catalog_outcome(generation: u64, ids: &[&str]) -> FetchOutcome {
        FetchOutcome::Catalog {
            generation,
            conditions: ids.iter().map(|id| cond(id)).collect(),
        }
    }

    /// Machine with a loaded catalog for account 1.
    fn ready(ids: &[&str]) -> SelectionMachine {
        let mut m = SelectionMachine::new();
        let req = m
            .handle(SelectionEvent::AccountChanged(Account::new(1)))
            .unwrap();
        assert!(m.complete(catalog_outcome(req.generation(), ids)));
        m
    }

    fn select(m: &mut SelectionMachine, id: &str, detail: Option<ConditionDetail>) {
        let req = m
            .handle(SelectionEvent::ConditionPicked(cond(id)))
            .unwrap();
        assert!(m.complete(FetchOutcome::Detail {
            generation: req.generation(),
            condition: cond(id),
            detail,
        }));
    }

    fn detail(threshold: f64) -> ConditionDetail {
        ConditionDetail {
            query: "SELECT ...".to_string(),
            current_threshold: threshold,
        }
    }

    #[test]
    fn test_initial_state() {
        let m = SelectionMachine::new();
        assert_eq!(m.phase(), Phase::Idle);
        assert!(m.selection().first_load);
        assert_eq!(m.selection().threshold.as_str(), "0");
        assert!(m.derived_queries().is_none());
    }

    #[test]
    fn test_account_change_enters_loading() {
        let mut m = SelectionMachine::new();
        let req = m.handle(SelectionEvent::AccountChanged(Account::new(7)));
        assert!(matches!(
            req,
            Some(FetchRequest::Catalog { generation: 1, account }) if account.id == 7
        ));
        assert_eq!(m.phase(), Phase::Loading);
        assert!(m.selection().loading);
        assert!(!m.selection().first_load);
    }

    #[test]
    fn test_account_change_drops_previous_catalog() {
        let mut m = ready(&["100"]);
        assert_eq!(m.phase(), Phase::ReadySelecting);

        m.handle(SelectionEvent::AccountChanged(Account::new(2)));
        assert_eq!(m.phase(), Phase::Loading);
        assert!(m.selection().catalog.is_empty());

        let view = m.view();
        assert_eq!(view.account_ids, [2]);
        assert!(view.catalog.is_empty());
    }

    #[test]
    fn test_catalog_completion_phases() {
        assert_eq!(ready(&[]).phase(), Phase::ReadyEmpty);
        assert_eq!(ready(&["1"]).phase(), Phase::ReadySelecting);
        assert!(!ready(&["1"]).selection().loading);
    }

    #[test]
    fn test_account_change_resets_selection() {
        let mut m = ready(&["100", "205"]);
        select(&mut m, "205", Some(detail(3.0)));
        m.handle(SelectionEvent::ThresholdEdited("4".to_string()));
        m.handle(SelectionEvent::SearchEdited("2".to_string()));

        m.handle(SelectionEvent::AccountChanged(Account::new(2)));
        let sel = m.selection();
        assert!(sel.condition.is_none());
        assert_eq!(sel.threshold.as_str(), "0");
        assert!(sel.search.is_empty());
        assert_eq!(sel.account, Some(Account::new(2)));
    }

    #[test]
    fn test_successful_pick_defaults_threshold() {
        let mut m = ready(&["100", "205"]);
        select(&mut m, "205", Some(detail(3.0)));
        assert_eq!(m.phase(), Phase::ReadySelected);
        assert_eq!(m.selection().threshold.as_str(), "3");
        let selected = m.selection().condition.as_ref().unwrap();
        assert_eq!(selected.current_threshold(), Some(3.0));
    }

    #[test]
    fn test_failed_pick_keeps_threshold_and_selects() {
        let mut m = ready(&["100", "205"]);
        select(&mut m, "100", Some(detail(5.0)));
        m.handle(SelectionEvent::ThresholdEdited("6".to_string()));

        select(&mut m, "205", None);
        let sel = m.selection();
        assert_eq!(sel.threshold.as_str(), "6");
        let selected = sel.condition.as_ref().unwrap();
        assert_eq!(selected.id().as_str(), "205");
        assert_eq!(selected.name(), "205");
        assert!(selected.query().is_none());
        assert!(selected.current_threshold().is_none());
    }

    #[test]
    fn test_pick_clears_search() {
        let mut m = ready(&["100", "205"]);
        m.handle(SelectionEvent::SearchEdited("20".to_string()));
        m.handle(SelectionEvent::ConditionPicked(cond("205")));
        assert!(m.selection().search.is_empty());
    }

    #[test]
    fn test_threshold_edit_only_when_selected() {
        let mut m = ready(&["1"]);
        assert!(m
            .handle(SelectionEvent::ThresholdEdited("9".to_string()))
            .is_none());
        assert_eq!(m.selection().threshold.as_str(), "0");

        select(&mut m, "1", Some(detail(2.0)));
        m.handle(SelectionEvent::ThresholdEdited(String::new()));
        assert_eq!(m.selection().threshold.as_str(), "");
        assert_eq!(m.phase(), Phase::ReadySelected);
    }

    #[test]
    fn test_search_ignored_before_catalog() {
        let mut m = SelectionMachine::new();
        m.handle(SelectionEvent::SearchEdited("x".to_string()));
        assert!(m.selection().search.is_empty());

        let mut m = ready(&[]);
        m.handle(SelectionEvent::SearchEdited("x".to_string()));
        assert!(m.selection().search.is_empty());
    }

    #[test]
    fn test_pick_ignored_while_loading_or_idle() {
        let mut m = SelectionMachine::new();
        assert!(m.handle(SelectionEvent::ConditionPicked(cond("1"))).is_none());

        m.handle(SelectionEvent::AccountChanged(Account::new(1)));
        assert!(m.handle(SelectionEvent::ConditionPicked(cond("1"))).is_none());
        assert_eq!(m.phase(), Phase::Loading);
    }

    #[test]
    fn test_pick_outside_catalog_ignored() {
        let mut m = ready(&["1"]);
        assert!(m.handle(SelectionEvent::ConditionPicked(cond("2"))).is_none());
        assert_eq!(m.phase(), Phase::ReadySelecting);
    }

    #[test]
    fn test_stale_catalog_discarded() {
        let mut m = SelectionMachine::new();
        let first = m
            .handle(SelectionEvent::AccountChanged(Account::new(1)))
            .unwrap();
        let second = m
            .handle(SelectionEvent::AccountChanged(Account::new(2)))
            .unwrap();

        assert!(m.complete(catalog_outcome(second.generation(), &["20"])));
        // Late response for the superseded account must not overwrite.
        assert!(!m.complete(catalog_outcome(first.generation(), &["10", "11"])));

        assert_eq!(m.selection().catalog.len(), 1);
        assert_eq!(m.selection().catalog[0].name, "20");
        assert_eq!(m.phase(), Phase::ReadySelecting);
    }

    #[test]
    fn test_stale_detail_discarded_after_account_change() {
        let mut m = ready(&["1"]);
        let pick = m.handle(SelectionEvent::ConditionPicked(cond("1"))).unwrap();
        m.handle(SelectionEvent::AccountChanged(Account::new(2)));

        assert!(!m.complete(FetchOutcome::Detail {
            generation: pick.generation(),
            condition: cond("1"),
            detail: Some(detail(3.0)),
        }));
        assert!(m.selection().condition.is_none());
        assert_eq!(m.phase(), Phase::Loading);
    }

    #[test]
    fn test_derived_queries_follow_selection() {
        let mut m = ready(&["100", "205"]);
        select(&mut m, "205", Some(detail(3.0)));
        let q = m.derived_queries().unwrap();
        assert!(q.candidate_thresholds.contains("conditionId = 205"));
        assert!(q.candidate_thresholds.contains("string(3)"));
        assert!(q.deviation_trend.contains("(3 or 0)"));
        assert!(q.model_behavior.contains("conditionId = 205"));

        m.handle(SelectionEvent::ThresholdEdited("4.5".to_string()));
        let q = m.derived_queries().unwrap();
        assert!(q.candidate_thresholds.contains("string(4.5)"));
    }

    #[tokio::test]
    async fn test_dispatch_runs_fetches() {
        let gw = FixtureGateway::default()
            .with_data("uniques(conditionId", catalog_payload(&[json!(100), json!(205)]))
            .with_data(r#"nrqlCondition(id: "205")"#, detail_payload("205", "SELECT 1", &[3.0]));

        let mut m = SelectionMachine::new();
        m.dispatch(&gw, TermPolicy::First, SelectionEvent::AccountChanged(Account::new(1)))
            .await;
        assert_eq!(m.phase(), Phase::ReadySelecting);

        m.dispatch(&gw, TermPolicy::First, SelectionEvent::ConditionPicked(cond("205")))
            .await;
        assert_eq!(m.phase(), Phase::ReadySelected);
        assert_eq!(m.selection().threshold.as_str(), "3");
        assert_eq!(gw.calls().len(), 2);
    }
}
