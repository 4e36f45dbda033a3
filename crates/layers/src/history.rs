//! Undo history.

use serde_json::Value;
use std::time::SystemTime;

use crate::id::LayerId;

/// Kind of recorded change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    /// A layer was inserted.
    Add,
    /// A layer was removed.
    Remove,
    /// Fields of a layer changed.
    Modify,
}

/// Where a layer lives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayerLocation {
    pub page: usize,
    /// Enclosing group, or `None` for the page's own list.
    pub group: Option<LayerId>,
    pub index: usize,
}

/// One undoable user action.
#[derive(Clone, Debug)]
pub struct HistoryEntry {
    /// Assigned when recorded.
    pub id: u64,
    pub kind: ChangeKind,
    pub description: String,
    pub layer_id: LayerId,
    pub location: Option<LayerLocation>,
    /// Plain record before the change (`None` for `Add`).
    pub before: Option<Value>,
    /// Plain record after the change (`None` for `Remove`).
    pub after: Option<Value>,
    pub time: SystemTime,
}

impl HistoryEntry {
    pub fn new(kind: ChangeKind, description: impl Into<String>, layer_id: LayerId) -> Self {
        Self {
            id: 0,
            kind,
            description: description.into(),
            layer_id,
            location: None,
            before: None,
            after: None,
            time: SystemTime::now(),
        }
    }

    pub fn at(mut self, location: LayerLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_before(mut self, before: Value) -> Self {
        self.before = Some(before);
        self
    }

    pub fn with_after(mut self, after: Value) -> Self {
        self.after = Some(after);
        self
    }
}

/// Linear undo/redo stack.
pub struct History {
    entries: Vec<HistoryEntry>,
    /// Number of entries currently applied.
    cursor: usize,
    id_counter: u64,
    max_entries: usize,
}

impl History {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Vec::new(),
            cursor: 0,
            id_counter: 0,
            max_entries: max_entries.max(1),
        }
    }

    /// Record an entry, dropping anything that could have been redone.
    pub fn push(&mut self, mut entry: HistoryEntry) -> u64 {
        self.entries.truncate(self.cursor);

        self.id_counter += 1;
        entry.id = self.id_counter;
        self.entries.push(entry);

        // Enforce max entries
        if self.entries.len() > self.max_entries {
            let excess = self.entries.len() - self.max_entries;
            self.entries.drain(..excess);
        }
        self.cursor = self.entries.len();
        self.id_counter
    }

    /// Step back; returns the entry to revert.
    pub fn undo(&mut self) -> Option<HistoryEntry> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        self.entries.get(self.cursor).cloned()
    }

    /// Step forward; returns the entry to re-apply.
    pub fn redo(&mut self) -> Option<HistoryEntry> {
        let entry = self.entries.get(self.cursor).cloned()?;
        self.cursor += 1;
        Some(entry)
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor < self.entries.len()
    }

    /// Applied entries, oldest first.
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries[..self.cursor]
    }

    pub fn len(&self) -> usize {
        self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.cursor == 0
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = 0;
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(100)
    }
}
