//! An in-memory store client for tests and embedding.

use crate::client::{ChangeCallback, RowSelect, RowUpdate, StoreClient, SubscriptionId};
use crate::error::{StoreError, StoreResult};
use crate::event::{ChangeEvent, ChangeFilter, ChannelKey};
use crate::row::Row;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

struct Subscriber {
    id: SubscriptionId,
    key: ChannelKey,
    filter: ChangeFilter,
    callback: ChangeCallback,
}

/// An in-memory `StoreClient`.
///
/// Holds rows per `(schema, table)` and routes change events to
/// subscribers through their filters, synchronously and in emit order.
/// `update_row` merges the new columns into the stored row and emits the
/// resulting event to subscribers, so persisted writes round-trip through
/// the feed the way they do against a real store.
///
/// Failure injection (`fail_fetches`, `fail_updates`) and an optional
/// fetch delay make read/feed races and persist failures reproducible in
/// tests.
pub struct MemoryStore {
    tables: Mutex<HashMap<(String, String), Vec<Row>>>,
    key_columns: Mutex<HashMap<(String, String), String>>,
    subscribers: Mutex<Vec<Subscriber>>,
    next_id: AtomicU64,
    fetch_delay: Mutex<Option<Duration>>,
    fail_fetches: AtomicBool,
    fail_updates: AtomicBool,
    closed: AtomicBool,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
            key_columns: Mutex::new(HashMap::new()),
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            fetch_delay: Mutex::new(None),
            fail_fetches: AtomicBool::new(false),
            fail_updates: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    /// Seeds or replaces a row without emitting a change event.
    ///
    /// An existing row with the same value in `column` is replaced.
    /// Intended for test setup; live writes go through `update_row` or
    /// `emit`.
    pub fn put_row(&self, schema: &str, table: &str, column: &str, row: Row) {
        self.record_key_column(schema, table, column);
        let mut tables = self.tables.lock();
        let rows = tables
            .entry((schema.to_string(), table.to_string()))
            .or_default();
        if let Some(existing) = rows
            .iter_mut()
            .find(|r| r.get(column) == row.get(column))
        {
            *existing = row;
        } else {
            rows.push(row);
        }
    }

    /// Injects a change event, as if another client had committed it.
    ///
    /// For deletes the stored row matching the event's key column is
    /// removed; for inserts and updates the stored row is not touched
    /// (callers that want the store's state to move use `update_row`).
    pub fn emit(&self, event: ChangeEvent) {
        if event.change_type == crate::event::ChangeType::Delete {
            if let Some(old) = &event.old_row {
                let scope = (event.schema.clone(), event.table.clone());
                let key = self
                    .key_columns
                    .lock()
                    .get(&scope)
                    .and_then(|column| old.get(column).map(|value| (column.clone(), value.clone())));
                let mut tables = self.tables.lock();
                if let Some(rows) = tables.get_mut(&scope) {
                    match &key {
                        // Match on the table's key column, the way
                        // fetch_row and update_row locate rows.
                        Some((column, value)) => rows.retain(|r| r.get(column) != Some(value)),
                        None => rows.retain(|r| r != old),
                    }
                }
            }
        }
        self.deliver(&event);
    }

    fn record_key_column(&self, schema: &str, table: &str, column: &str) {
        self.key_columns
            .lock()
            .insert((schema.to_string(), table.to_string()), column.to_string());
    }

    /// Delays every subsequent `fetch_row` by the given duration.
    ///
    /// Lets tests arrange for change-feed events to arrive while a read
    /// is still in flight.
    pub fn set_fetch_delay(&self, delay: Option<Duration>) {
        *self.fetch_delay.lock() = delay;
    }

    /// Makes subsequent `fetch_row` calls fail.
    pub fn set_fail_fetches(&self, fail: bool) {
        self.fail_fetches.store(fail, Ordering::SeqCst);
    }

    /// Makes subsequent `update_row` calls fail.
    pub fn set_fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    /// Closes the store; all further operations fail with `Closed`.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Number of live registrations.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    fn check_open(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }

    /// Delivers an event to every subscriber whose filter admits it.
    fn deliver(&self, event: &ChangeEvent) {
        // Callbacks run outside the subscriber lock so they may
        // re-enter the store.
        let callbacks: Vec<ChangeCallback> = self
            .subscribers
            .lock()
            .iter()
            .filter(|s| s.filter.matches(event))
            .map(|s| s.callback.clone())
            .collect();
        tracing::trace!(
            target: "liverow",
            schema = %event.schema,
            table = %event.table,
            change = ?event.change_type,
            subscribers = callbacks.len(),
            "delivering change event"
        );
        for callback in callbacks {
            callback(event.clone());
        }
    }

    fn project(row: &Row, columns: &str) -> Row {
        let expr = columns.trim();
        if expr.is_empty() || expr == "*" {
            return row.clone();
        }
        let wanted: Vec<&str> = expr.split(',').map(str::trim).collect();
        row.iter()
            .filter(|(name, _)| wanted.contains(&name.as_str()))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreClient for MemoryStore {
    fn fetch_row(&self, select: &RowSelect) -> StoreResult<Option<Row>> {
        self.check_open()?;
        let delay = *self.fetch_delay.lock();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(StoreError::Query("injected fetch failure".into()));
        }
        let tables = self.tables.lock();
        let row = tables
            .get(&(select.schema.clone(), select.table.clone()))
            .and_then(|rows| {
                rows.iter().find(|r| {
                    r.get(&select.column)
                        .is_some_and(|value| select.key.matches(value))
                })
            })
            .map(|row| Self::project(row, &select.columns));
        Ok(row)
    }

    fn update_row(&self, update: &RowUpdate) -> StoreResult<()> {
        self.check_open()?;
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(StoreError::Persist("injected persist failure".into()));
        }
        self.record_key_column(&update.schema, &update.table, &update.column);
        let event = {
            let mut tables = self.tables.lock();
            let rows = tables
                .entry((update.schema.clone(), update.table.clone()))
                .or_default();
            match rows.iter_mut().find(|r| {
                r.get(&update.column)
                    .is_some_and(|value| update.key.matches(value))
            }) {
                Some(existing) => {
                    let old = existing.clone();
                    for (name, value) in &update.row {
                        existing.insert(name.clone(), value.clone());
                    }
                    ChangeEvent::update(
                        update.schema.clone(),
                        update.table.clone(),
                        existing.clone(),
                        Some(old),
                    )
                }
                None => {
                    // Upsert: a point update against a missing row
                    // materializes it.
                    let mut row = update.row.clone();
                    row.insert(update.column.clone(), update.key.to_value());
                    rows.push(row.clone());
                    ChangeEvent::insert(update.schema.clone(), update.table.clone(), row)
                }
            }
        };
        self.deliver(&event);
        Ok(())
    }

    fn subscribe(
        &self,
        key: ChannelKey,
        filter: ChangeFilter,
        callback: ChangeCallback,
    ) -> StoreResult<SubscriptionId> {
        self.check_open()?;
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        tracing::debug!(target: "liverow", channel = %key, %id, "registration added");
        self.subscribers.lock().push(Subscriber {
            id,
            key,
            filter,
            callback,
        });
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> StoreResult<()> {
        self.subscribers.lock().retain(|s| s.id != id);
        Ok(())
    }

    fn live_channels(&self) -> Vec<ChannelKey> {
        self.subscribers.lock().iter().map(|s| s.key.clone()).collect()
    }
}
