//! Observable session status and the in-memory draft collection

use chrono::{DateTime, Utc};

use super::history::{Snapshot, UndoHistory};
use crate::models::{Draft, DraftId};
use crate::version::content_hash;
use crate::version::HashMetadata;

/// Where the session stands relative to the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    /// Nothing loaded yet, not even from cache
    Uninitialized,
    /// Authoritative load in flight; previous data stays visible
    Loading,
    /// Data is on screen; `sync_pending` when it has not been reconciled
    Ready { sync_pending: bool },
    /// Matches the store as of the last load
    Synced,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionStatus {
    pub phase: SessionPhase,
    /// Last failure, cleared by the next successful operation
    pub error: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl SessionStatus {
    pub const fn new(phase: SessionPhase) -> Self {
        Self {
            phase,
            error: None,
            last_synced_at: None,
        }
    }
}

/// Unpersisted content laid over the tip it was derived from.
#[derive(Debug, Clone)]
pub(crate) struct WorkingCopy {
    pub base_id: DraftId,
    pub snapshot: Snapshot,
}

pub(crate) struct SessionState {
    /// Tips of non-archived lineages, most recently touched first
    pub drafts: Vec<Draft>,
    /// Lineage id of the selected draft
    pub selected: Option<DraftId>,
    pub working_copy: Option<WorkingCopy>,
    pub history: UndoHistory,
}

impl SessionState {
    pub fn new(undo_capacity: usize) -> Self {
        Self {
            drafts: Vec::new(),
            selected: None,
            working_copy: None,
            history: UndoHistory::new(undo_capacity),
        }
    }

    /// Local tip matching either a tip id or a lineage id
    pub fn find(&self, id: DraftId) -> Option<&Draft> {
        self.drafts
            .iter()
            .find(|draft| draft.id == id || draft.lineage_id == id)
    }

    pub fn tip(&self, lineage_id: DraftId) -> Option<&Draft> {
        self.drafts
            .iter()
            .find(|draft| draft.lineage_id == lineage_id)
    }

    pub fn selected_tip(&self) -> Option<&Draft> {
        self.selected.and_then(|lineage_id| self.tip(lineage_id))
    }

    /// Working copy, if it still sits on the selected tip
    pub fn overlay(&self) -> Option<&Snapshot> {
        let tip = self.selected_tip()?;
        self.working_copy
            .as_ref()
            .filter(|copy| copy.base_id == tip.id)
            .map(|copy| &copy.snapshot)
    }

    /// What the user currently sees for the selected draft
    pub fn displayed(&self) -> Option<Snapshot> {
        if let Some(snapshot) = self.overlay() {
            return Some(snapshot.clone());
        }
        self.selected_tip().map(|tip| Snapshot {
            content: tip.content.clone(),
            sections: tip.sections.clone(),
        })
    }

    /// The selected tip with the working copy applied
    pub fn active_draft(&self) -> Option<Draft> {
        let mut draft = self.selected_tip()?.clone();
        if let Some(snapshot) = self.overlay() {
            draft.content = snapshot.content.clone();
            draft.sections = snapshot.sections.clone();
            draft.content_hash = content_hash(&draft.content, HashMetadata::of(&draft));
        }
        Some(draft)
    }

    /// Replace the lineage's tip, or add it, and move it to the front.
    pub fn upsert_tip(&mut self, draft: Draft) {
        self.drafts
            .retain(|existing| existing.lineage_id != draft.lineage_id);
        self.drafts.insert(0, draft);
    }

    pub fn remove_lineage(&mut self, lineage_id: DraftId) {
        self.drafts
            .retain(|existing| existing.lineage_id != lineage_id);
        if self.selected == Some(lineage_id) {
            self.deselect();
        }
    }

    /// Switch selection, dropping per-draft undo state.
    pub fn select(&mut self, lineage_id: Option<DraftId>) {
        if self.selected != lineage_id {
            self.history.clear();
            self.working_copy = None;
        }
        self.selected = lineage_id;
    }

    pub fn deselect(&mut self) {
        self.select(None);
    }

    /// Set the working copy, or drop it when it equals the tip.
    pub fn set_displayed(&mut self, snapshot: Snapshot) {
        let Some(tip) = self.selected_tip() else {
            return;
        };
        if tip.content == snapshot.content && tip.sections == snapshot.sections {
            self.working_copy = None;
        } else {
            self.working_copy = Some(WorkingCopy {
                base_id: tip.id,
                snapshot,
            });
        }
    }

    /// Tip id of the selected lineage, as the cache records it
    pub fn active_draft_id(&self) -> Option<DraftId> {
        self.selected_tip().map(|tip| tip.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DraftContent, DraftOrigin, OwnerId, SectionMetadata};
    use crate::version::{mint_version, start_lineage};

    fn root(summary: &str) -> Draft {
        start_lineage(
            OwnerId::new("alice").unwrap(),
            "Draft".into(),
            "classic".into(),
            DraftContent {
                summary: summary.into(),
                ..DraftContent::default()
            },
            SectionMetadata::default(),
            DraftOrigin::Manual,
        )
    }

    #[test]
    fn upsert_replaces_lineage_tip() {
        let mut state = SessionState::new(10);
        let v1 = root("one");
        let other = root("other");
        state.upsert_tip(v1.clone());
        state.upsert_tip(other.clone());

        let v2 = mint_version(&v1, v1.content.clone(), v1.sections.clone(), DraftOrigin::Manual);
        state.upsert_tip(v2.clone());

        assert_eq!(state.drafts.len(), 2);
        assert_eq!(state.drafts[0].id, v2.id);
        assert_eq!(state.find(v1.lineage_id).map(|draft| draft.id), Some(v2.id));
    }

    #[test]
    fn overlay_only_applies_to_its_base() {
        let mut state = SessionState::new(10);
        let v1 = root("one");
        state.upsert_tip(v1.clone());
        state.select(Some(v1.lineage_id));

        let mut edited = state.displayed().unwrap();
        edited.content.summary = "draft".into();
        state.set_displayed(edited);
        assert_eq!(state.active_draft().unwrap().content.summary, "draft");
        assert_ne!(state.active_draft().unwrap().content_hash, v1.content_hash);

        let v2 = mint_version(&v1, v1.content.clone(), v1.sections.clone(), DraftOrigin::Manual);
        state.upsert_tip(v2);
        assert!(state.overlay().is_none());
        assert_eq!(state.active_draft().unwrap().content.summary, "one");
    }

    #[test]
    fn selecting_another_draft_clears_undo() {
        let mut state = SessionState::new(10);
        let a = root("a");
        let b = root("b");
        state.upsert_tip(a.clone());
        state.upsert_tip(b.clone());
        state.select(Some(a.lineage_id));
        let before = state.displayed().unwrap();
        state.history.record(before, "edit");

        state.select(Some(b.lineage_id));
        assert!(!state.history.can_undo());
    }
}
