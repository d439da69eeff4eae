//! The current-value cell and its merge rules.
//!
//! Three sources write into one cell: the initial read, the change feed,
//! and local optimistic edits. The merge policy here is deliberately
//! independent of timing so it can be tested without threads: callers
//! apply completions in whatever order they actually happened.

use liverow_store::{ChangeEvent, ChangeType, Row};

/// The last known state of the bound row.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RowValue {
    /// Nothing has arrived yet (pre-fetch). Rendered as "not loaded".
    #[default]
    Unknown,
    /// Definite absence: the row was not found or was deleted.
    Absent,
    /// The last known row.
    Row(Row),
}

impl RowValue {
    /// Returns true before anything has arrived.
    pub fn is_unknown(&self) -> bool {
        matches!(self, RowValue::Unknown)
    }

    /// Returns true for definite absence.
    pub fn is_absent(&self) -> bool {
        matches!(self, RowValue::Absent)
    }

    /// The row, if one is known.
    pub fn as_row(&self) -> Option<&Row> {
        match self {
            RowValue::Row(row) => Some(row),
            _ => None,
        }
    }
}

/// The observable state of one engine instance at a point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct RowSnapshot {
    /// Current value.
    pub value: RowValue,
    /// Whether the initial read or the feed has resolved at least once.
    pub loaded: bool,
}

/// Mutable cell state, guarded by the engine's lock.
///
/// `feed_seen` implements the ordering rule: once the feed has delivered
/// any event it is authoritative, and a read result that resolves later
/// only settles the loaded flag.
#[derive(Debug, Default)]
pub(crate) struct CellState {
    value: RowValue,
    loaded: bool,
    feed_seen: bool,
}

impl CellState {
    /// A fresh cell: unknown value, not loaded.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&self) -> &RowValue {
        &self.value
    }

    pub fn loaded(&self) -> bool {
        self.loaded
    }

    pub fn snapshot(&self) -> RowSnapshot {
        RowSnapshot {
            value: self.value.clone(),
            loaded: self.loaded,
        }
    }

    /// Applies the initial read's resolution.
    ///
    /// The loaded flag is set unconditionally. A fetched row is applied
    /// only if the feed has not delivered yet; a missing row or a failed
    /// read never erases a value another source has produced. Returns
    /// true if the value was applied.
    pub fn apply_read(&mut self, fetched: Option<Row>) -> bool {
        self.loaded = true;
        match fetched {
            Some(row) if !self.feed_seen => {
                self.value = RowValue::Row(row);
                true
            }
            _ => false,
        }
    }

    /// Applies one change-feed event.
    ///
    /// Insert and update install the new row and mark the cell loaded;
    /// delete installs definite absence and leaves the loaded flag as it
    /// was (a delete implies a prior existence).
    pub fn apply_event(&mut self, event: &ChangeEvent) {
        self.feed_seen = true;
        match event.change_type {
            ChangeType::Insert | ChangeType::Update => {
                if let Some(row) = &event.new_row {
                    self.value = RowValue::Row(row.clone());
                    self.loaded = true;
                }
            }
            ChangeType::Delete => {
                self.value = RowValue::Absent;
            }
        }
    }

    /// Applies a local optimistic edit.
    ///
    /// The loaded flag is untouched: only the read and the feed load.
    pub fn apply_local(&mut self, row: Option<Row>) {
        self.value = match row {
            Some(row) => RowValue::Row(row),
            None => RowValue::Absent,
        };
    }
}
