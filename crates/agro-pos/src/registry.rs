//! # Tab Registry
//!
//! The in-memory list of order tabs. Every method here is synchronous: the
//! engine takes the registry lock, makes one state transition, and releases
//! the lock before awaiting the gateway.

use std::collections::HashSet;

use agro_core::cart::LineKey;
use agro_gateway::DraftOrder;

use crate::delayed::Debouncer;
use crate::error::{PosError, PosResult};
use crate::tab::{OrderTab, SessionState, TabStatus};

/// A tab plus the bookkeeping the UI never sees.
#[derive(Debug)]
pub(crate) struct TabEntry {
    pub tab: OrderTab,
    /// Pending debounced confirm.
    pub confirm: Debouncer,
    /// Lines whose remote add is in flight.
    pub adding: HashSet<LineKey>,
    /// Lines the user removed while their add was in flight.
    pub removed_while_adding: HashSet<LineKey>,
}

impl TabEntry {
    pub fn new(tab: OrderTab) -> Self {
        TabEntry {
            tab,
            confirm: Debouncer::new(),
            adding: HashSet::new(),
            removed_while_adding: HashSet::new(),
        }
    }
}

/// What `reconcile` changed.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct ReconcileReport {
    pub added: Vec<String>,
    pub dropped: Vec<String>,
}

#[derive(Debug, Default)]
pub(crate) struct TabRegistry {
    entries: Vec<TabEntry>,
    active: Option<String>,
    next_label: u32,
}

impl TabRegistry {
    pub fn new() -> Self {
        TabRegistry {
            entries: Vec::new(),
            active: None,
            next_label: 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn tabs(&self) -> impl Iterator<Item = &OrderTab> {
        self.entries.iter().map(|e| &e.tab)
    }

    pub fn get(&self, id: &str) -> Option<&TabEntry> {
        self.entries.iter().find(|e| e.tab.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut TabEntry> {
        self.entries.iter_mut().find(|e| e.tab.id == id)
    }

    /// Entry that accepts edits.
    pub fn editable_mut(&mut self, id: &str) -> PosResult<&mut TabEntry> {
        let entry = self
            .get_mut(id)
            .ok_or_else(|| PosError::TabNotFound(id.to_string()))?;
        if entry.tab.status == TabStatus::Deleting {
            return Err(PosError::TabDeleting(id.to_string()));
        }
        Ok(entry)
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn set_active(&mut self, id: Option<String>) {
        self.active = id;
    }

    pub fn active_entry_mut(&mut self) -> PosResult<&mut TabEntry> {
        let id = self.active.clone().ok_or(PosError::NoActiveTab)?;
        self.editable_mut(&id)
    }

    /// The tab currently holding the edit session, if any.
    pub fn session_holder(&self) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.tab.session.holds_session())
            .map(|e| e.tab.id.as_str())
    }

    pub fn set_session(&mut self, id: &str, state: SessionState) {
        if let Some(entry) = self.get_mut(id) {
            entry.tab.session = state;
        }
    }

    pub fn session(&self, id: &str) -> Option<SessionState> {
        self.get(id).map(|e| e.tab.session)
    }

    /// Appends a tab for a freshly created or newly listed draft.
    pub fn insert_draft(&mut self, draft: &DraftOrder) -> &OrderTab {
        let label = self.next_label;
        self.next_label += 1;
        self.entries.push(TabEntry::new(OrderTab::from_draft(draft, label)));
        let index = self.entries.len() - 1;
        &self.entries[index].tab
    }

    /// Removes a tab. Its pending confirm is dropped with it.
    pub fn remove(&mut self, id: &str) -> Option<OrderTab> {
        let index = self.entries.iter().position(|e| e.tab.id == id)?;
        let mut entry = self.entries.remove(index);
        entry.confirm.cancel();
        if self.active.as_deref() == Some(id) {
            self.active = None;
        }
        Some(entry.tab)
    }

    /// Brings the registry in line with the backend's list of drafts.
    ///
    /// Known ids keep their local state, unknown ids are added, and ids the
    /// backend no longer lists are dropped. Tabs mid-deletion are left alone.
    pub fn reconcile(&mut self, drafts: &[DraftOrder]) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        let listed: HashSet<&str> = drafts.iter().map(|d| d.id.as_str()).collect();
        let stale: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.tab.status == TabStatus::Ready && !listed.contains(e.tab.id.as_str()))
            .map(|e| e.tab.id.clone())
            .collect();
        for id in stale {
            self.remove(&id);
            report.dropped.push(id);
        }

        for draft in drafts {
            if self.get(&draft.id).is_none() {
                self.insert_draft(draft);
                report.added.push(draft.id.clone());
            }
        }

        report
    }

    /// First tab that accepts edits.
    pub fn first_ready(&self) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.tab.status == TabStatus::Ready)
            .map(|e| e.tab.id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(id: &str) -> DraftOrder {
        serde_json::from_value(serde_json::json!({ "id": id })).unwrap()
    }

    #[test]
    fn test_labels_increase() {
        let mut reg = TabRegistry::new();
        assert_eq!(reg.insert_draft(&draft("a")).label, 1);
        assert_eq!(reg.insert_draft(&draft("b")).label, 2);
        reg.remove("a");
        assert_eq!(reg.insert_draft(&draft("c")).label, 3);
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn test_reconcile_keeps_adds_and_drops() {
        let mut reg = TabRegistry::new();
        reg.insert_draft(&draft("a"));
        reg.insert_draft(&draft("b"));
        reg.insert_draft(&draft("c"));
        reg.get_mut("c").unwrap().tab.status = TabStatus::Deleting;
        reg.get_mut("a").unwrap().tab.discount = agro_core::Money::from_minor(5);
        reg.set_active(Some("b".to_string()));

        let report = reg.reconcile(&[draft("a"), draft("d")]);
        assert_eq!(report.dropped, vec!["b".to_string()]);
        assert_eq!(report.added, vec!["d".to_string()]);

        // Local state of "a" survives, "c" is mid-deletion and stays
        assert_eq!(reg.get("a").unwrap().tab.discount.minor(), 5);
        assert!(reg.get("c").is_some());
        assert_eq!(reg.active_id(), None);
    }

    #[test]
    fn test_editable_rejects_deleting() {
        let mut reg = TabRegistry::new();
        reg.insert_draft(&draft("a"));
        reg.get_mut("a").unwrap().tab.status = TabStatus::Deleting;
        assert!(matches!(reg.editable_mut("a"), Err(PosError::TabDeleting(_))));
        assert!(matches!(reg.editable_mut("x"), Err(PosError::TabNotFound(_))));
        assert!(reg.first_ready().is_none());
    }

    #[test]
    fn test_session_holder() {
        let mut reg = TabRegistry::new();
        reg.insert_draft(&draft("a"));
        reg.insert_draft(&draft("b"));
        assert_eq!(reg.session_holder(), None);
        reg.set_session("b", SessionState::Open);
        assert_eq!(reg.session_holder(), Some("b"));
        reg.set_session("b", SessionState::Cancelling);
        assert_eq!(reg.session_holder(), None);
    }
}
