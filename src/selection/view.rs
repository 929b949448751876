//! View model handed to the presentation layer

use serde::Serialize;

use super::{Phase, SelectionMachine};
use crate::query::Panel;
use crate::types::{Condition, SelectedCondition, Threshold};

/// Placeholder message shown instead of the selection widgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Notice {
    SelectAccount,
    NoActiveConditions,
    SelectCondition,
}

impl Notice {
    pub fn message(self) -> &'static str {
        match self {
            Notice::SelectAccount => "Select account above to get started",
            Notice::NoActiveConditions => {
                "No active baseline conditions in selected account or error occurred fetching conditions."
            }
            Notice::SelectCondition => "Select condition id from dropdown above",
        }
    }
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// Serializable snapshot of a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionView {
    pub phase: Phase,
    pub loading: bool,
    pub first_load: bool,
    /// Accounts the chart widgets should query.
    pub account_ids: Vec<u64>,
    /// Catalog filtered by `search`.
    pub catalog: Vec<Condition>,
    pub selected_condition: Option<SelectedCondition>,
    pub threshold: Threshold,
    pub search: String,
    pub panels: Vec<Panel>,
    pub notice: Option<Notice>,
}

impl SelectionView {
    pub(super) fn from_machine(machine: &SelectionMachine) -> Self {
        let sel = machine.selection();
        let phase = machine.phase();

        let notice = match phase {
            Phase::Idle if sel.first_load => Some(Notice::SelectAccount),
            Phase::ReadyEmpty => Some(Notice::NoActiveConditions),
            Phase::ReadySelecting => Some(Notice::SelectCondition),
            _ => None,
        };

        Self {
            phase,
            loading: sel.loading,
            first_load: sel.first_load,
            account_ids: sel.account.iter().map(|a| a.id).collect(),
            catalog: machine.filtered_catalog().into_iter().cloned().collect(),
            selected_condition: sel.condition.clone(),
            threshold: sel.threshold.clone(),
            search: sel.search.clone(),
            panels: machine
                .derived_queries()
                .map(|q| q.panels())
                .unwrap_or_default(),
            notice,
        }
    }
}

impl Default for SelectionView {
    fn default() -> Self {
        SelectionMachine::new().view()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::{FetchOutcome, SelectionEvent};
    use crate::types::{Account, ConditionDetail, ConditionId};

    fn cond(id: &str) -> Condition {
        Condition::new(ConditionId::parse(id).unwrap())
    }

    #[test]
    fn test_first_load_notice() {
        let view = SelectionView::default();
        assert_eq!(view.notice, Some(Notice::SelectAccount));
        assert!(view.account_ids.is_empty());
        assert!(view.panels.is_empty());
    }

    #[test]
    fn test_empty_catalog_notice() {
        let mut m = SelectionMachine::new();
        let req = m
            .handle(SelectionEvent::AccountChanged(Account::new(3)))
            .unwrap();
        assert_eq!(m.view().notice, None);
        assert!(m.view().loading);

        m.complete(FetchOutcome::Catalog {
            generation: req.generation(),
            conditions: Vec::new(),
        });
        let view = m.view();
        assert_eq!(view.notice, Some(Notice::NoActiveConditions));
        assert_eq!(view.account_ids, [3]);
    }

    #[test]
    fn test_selected_view_has_panels() {
        let mut m = SelectionMachine::new();
        let req = m
            .handle(SelectionEvent::AccountChanged(Account::new(3)))
            .unwrap();
        m.complete(FetchOutcome::Catalog {
            generation: req.generation(),
            conditions: vec![cond("100"), cond("205"), cond("300")],
        });
        assert_eq!(m.view().notice, Some(Notice::SelectCondition));

        m.handle(SelectionEvent::SearchEdited("20".to_string()));
        let names: Vec<_> = m.view().catalog.into_iter().map(|c| c.name).collect();
        assert_eq!(names, ["205"]);

        let req = m
            .handle(SelectionEvent::ConditionPicked(cond("205")))
            .unwrap();
        m.complete(FetchOutcome::Detail {
            generation: req.generation(),
            condition: cond("205"),
            detail: Some(ConditionDetail {
                query: "SELECT count(*) FROM Transaction".to_string(),
                current_threshold: 3.0,
            }),
        });
        let view = m.view();
        assert_eq!(view.notice, None);
        assert_eq!(view.panels.len(), 4);
        assert_eq!(view.threshold.as_str(), "3");

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["phase"], "ready_selected");
        assert_eq!(json["selected_condition"]["id"], "205");
    }

    #[test]
    fn test_notice_messages() {
        assert!(Notice::NoActiveConditions.message().starts_with("No active baseline conditions"));
        assert_eq!(Notice::SelectCondition.to_string(), "Select condition id from dropdown above");
    }
}
