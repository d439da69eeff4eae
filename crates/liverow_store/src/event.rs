//! Change events and subscription filters.

use crate::row::{Row, RowKey};
use std::fmt;

/// Type of change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeType {
    /// Row was inserted (no previous version existed).
    Insert,
    /// Row was updated (previous version existed).
    Update,
    /// Row was deleted.
    Delete,
}

/// A single change event delivered by the store's change feed.
///
/// Events carry the post-image for inserts and updates and the pre-image
/// where the store provides one. Delivery order is the store's commit
/// order; this crate never reorders events.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    /// Schema the affected table lives in.
    pub schema: String,
    /// Affected table.
    pub table: String,
    /// Type of change.
    pub change_type: ChangeType,
    /// New row image (for Insert/Update). None for Delete.
    pub new_row: Option<Row>,
    /// Previous row image, when the store provides one.
    pub old_row: Option<Row>,
}

impl ChangeEvent {
    /// Creates an insert event.
    pub fn insert(schema: impl Into<String>, table: impl Into<String>, new_row: Row) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            change_type: ChangeType::Insert,
            new_row: Some(new_row),
            old_row: None,
        }
    }

    /// Creates an update event.
    pub fn update(
        schema: impl Into<String>,
        table: impl Into<String>,
        new_row: Row,
        old_row: Option<Row>,
    ) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            change_type: ChangeType::Update,
            new_row: Some(new_row),
            old_row,
        }
    }

    /// Creates a delete event.
    pub fn delete(schema: impl Into<String>, table: impl Into<String>, old_row: Row) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            change_type: ChangeType::Delete,
            new_row: None,
            old_row: Some(old_row),
        }
    }

    /// The row image that identifies which row the event is about.
    ///
    /// Inserts and updates are identified by the new image, deletes by
    /// the old one.
    pub fn identifying_row(&self) -> Option<&Row> {
        match self.change_type {
            ChangeType::Insert | ChangeType::Update => self.new_row.as_ref(),
            ChangeType::Delete => self.old_row.as_ref(),
        }
    }
}

/// Which event types a subscription wants delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventFilter {
    /// Deliver inserts, updates, and deletes.
    #[default]
    All,
    /// Deliver inserts only.
    Insert,
    /// Deliver updates only.
    Update,
    /// Deliver deletes only.
    Delete,
}

impl EventFilter {
    /// Returns true if the filter admits the given change type.
    pub fn admits(&self, change_type: ChangeType) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::Insert => change_type == ChangeType::Insert,
            EventFilter::Update => change_type == ChangeType::Update,
            EventFilter::Delete => change_type == ChangeType::Delete,
        }
    }
}

/// Scope of one change-feed registration: a single row of a single table.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeFilter {
    /// Event types to deliver.
    pub events: EventFilter,
    /// Schema qualifier.
    pub schema: String,
    /// Table name.
    pub table: String,
    /// Primary-key column the equality filter applies to.
    pub column: String,
    /// Primary-key value of the watched row.
    pub key: RowKey,
}

impl ChangeFilter {
    /// Creates a filter for all event types on one row.
    pub fn for_row(
        schema: impl Into<String>,
        table: impl Into<String>,
        column: impl Into<String>,
        key: RowKey,
    ) -> Self {
        Self {
            events: EventFilter::All,
            schema: schema.into(),
            table: table.into(),
            column: column.into(),
            key,
        }
    }

    /// Restricts the filter to one event type.
    pub fn with_events(mut self, events: EventFilter) -> Self {
        self.events = events;
        self
    }

    /// Returns true if the event falls within this filter's scope.
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        if event.schema != self.schema || event.table != self.table {
            return false;
        }
        if !self.events.admits(event.change_type) {
            return false;
        }
        match event.identifying_row().and_then(|row| row.get(&self.column)) {
            Some(value) => self.key.matches(value),
            None => false,
        }
    }

    /// Derives the channel key this registration is deduplicated under.
    pub fn channel_key(&self) -> ChannelKey {
        ChannelKey::new(&self.schema, &self.table, &self.column, &self.key)
    }
}

/// Identifier under which a change-feed registration is deduplicated.
///
/// Derived from the same fields the filter matches on, so two
/// registrations with the same key watch the same row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelKey(String);

impl ChannelKey {
    /// Builds the canonical channel key for one row.
    pub fn new(schema: &str, table: &str, column: &str, key: &RowKey) -> Self {
        Self(format!("{schema}:{table}:{column}=eq.{key}"))
    }

    /// The key as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
