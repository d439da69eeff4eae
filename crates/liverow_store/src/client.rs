//! The store client trait and its request types.

use crate::error::StoreResult;
use crate::event::{ChangeEvent, ChangeFilter, ChannelKey};
use crate::row::{Row, RowKey};
use std::fmt;
use std::sync::Arc;

/// Callback invoked for each change event delivered to a subscription.
///
/// Called on the store's delivery thread; implementations must be cheap
/// and must not block delivery.
pub type ChangeCallback = Arc<dyn Fn(ChangeEvent) + Send + Sync>;

/// Opaque token identifying one active change-feed registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// A single-row point read request.
#[derive(Debug, Clone, PartialEq)]
pub struct RowSelect {
    /// Schema qualifier.
    pub schema: String,
    /// Table to read from.
    pub table: String,
    /// Select expression (columns to fetch).
    pub columns: String,
    /// Primary-key column for the equality filter.
    pub column: String,
    /// Primary-key value of the wanted row.
    pub key: RowKey,
}

impl RowSelect {
    /// Creates a point read for one row, fetching all columns.
    pub fn new(
        schema: impl Into<String>,
        table: impl Into<String>,
        column: impl Into<String>,
        key: RowKey,
    ) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            columns: "*".into(),
            column: column.into(),
            key,
        }
    }

    /// Sets the select expression.
    pub fn with_columns(mut self, columns: impl Into<String>) -> Self {
        self.columns = columns.into();
        self
    }
}

/// A single-row point update request.
///
/// `row` carries the full new value; the store applies it to the row
/// matched by `column = key`.
#[derive(Debug, Clone, PartialEq)]
pub struct RowUpdate {
    /// Schema qualifier.
    pub schema: String,
    /// Table to update.
    pub table: String,
    /// Primary-key column for the equality filter.
    pub column: String,
    /// Primary-key value of the row to update.
    pub key: RowKey,
    /// New column values.
    pub row: Row,
}

impl RowUpdate {
    /// Creates a point update for one row.
    pub fn new(
        schema: impl Into<String>,
        table: impl Into<String>,
        column: impl Into<String>,
        key: RowKey,
        row: Row,
    ) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            column: column.into(),
            key,
            row,
        }
    }
}

/// A client for a remote relational store with a change feed.
///
/// This trait abstracts the store, allowing different implementations
/// (network clients, the in-memory store for testing). All methods are
/// callable from any thread.
pub trait StoreClient: Send + Sync {
    /// Reads a single row, expecting at most one match.
    ///
    /// Zero matching rows is `Ok(None)`, not an error.
    fn fetch_row(&self, select: &RowSelect) -> StoreResult<Option<Row>>;

    /// Applies a single-row update.
    fn update_row(&self, update: &RowUpdate) -> StoreResult<()>;

    /// Registers a change-feed subscription under the given channel key.
    ///
    /// Events matching the filter are delivered to the callback in the
    /// store's commit order until the returned id is unsubscribed.
    fn subscribe(
        &self,
        key: ChannelKey,
        filter: ChangeFilter,
        callback: ChangeCallback,
    ) -> StoreResult<SubscriptionId>;

    /// Releases a change-feed registration.
    ///
    /// Idempotent: unknown or already-released ids are a no-op.
    fn unsubscribe(&self, id: SubscriptionId) -> StoreResult<()>;

    /// Enumerates the channel keys of all live registrations.
    ///
    /// Side-effect free; used for best-effort duplicate-key diagnostics.
    /// There is no atomicity guarantee against concurrent registration.
    fn live_channels(&self) -> Vec<ChannelKey>;
}
