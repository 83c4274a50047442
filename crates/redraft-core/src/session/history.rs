//! Bounded undo/redo log of in-memory snapshots

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use crate::models::{DraftContent, SectionMetadata};

/// What undo/redo swaps in and out: content plus section metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub content: DraftContent,
    pub sections: SectionMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoEntry {
    pub snapshot: Snapshot,
    pub at: DateTime<Utc>,
    pub label: String,
}

#[derive(Debug, Clone)]
pub struct UndoHistory {
    undo: VecDeque<UndoEntry>,
    redo: Vec<UndoEntry>,
    capacity: usize,
}

impl UndoHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            undo: VecDeque::with_capacity(capacity),
            redo: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    /// Remember the state before an undoable operation. Drops the redo branch.
    pub fn record(&mut self, before: Snapshot, label: impl Into<String>) {
        if self.undo.len() == self.capacity {
            self.undo.pop_front();
        }
        self.undo.push_back(UndoEntry {
            snapshot: before,
            at: Utc::now(),
            label: label.into(),
        });
        self.redo.clear();
    }

    /// Step back from `current`; `None` when there is nothing to undo.
    pub fn undo(&mut self, current: Snapshot) -> Option<Snapshot> {
        let entry = self.undo.pop_back()?;
        self.redo.push(UndoEntry {
            snapshot: current,
            at: Utc::now(),
            label: entry.label.clone(),
        });
        Some(entry.snapshot)
    }

    /// Step forward from `current`; `None` when there is nothing to redo.
    pub fn redo(&mut self, current: Snapshot) -> Option<Snapshot> {
        let entry = self.redo.pop()?;
        if self.undo.len() == self.capacity {
            self.undo.pop_front();
        }
        self.undo.push_back(UndoEntry {
            snapshot: current,
            at: Utc::now(),
            label: entry.label.clone(),
        });
        Some(entry.snapshot)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Label of the operation the next undo would revert
    pub fn undo_label(&self) -> Option<&str> {
        self.undo.back().map(|entry| entry.label.as_str())
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    pub fn len(&self) -> usize {
        self.undo.len()
    }
}
