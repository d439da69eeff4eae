//! The row synchronization engine.

use crate::cell::{CellState, RowSnapshot, RowValue};
use crate::error::EngineResult;
use crate::feed::FeedSubscription;
use crate::options::RowOptions;
use crate::registry::ClientRegistry;
use liverow_store::{
    ChangeCallback, ChangeEvent, ChangeFilter, Row, RowKey, RowSelect, RowUpdate, StoreClient,
    StoreResult,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;

/// Identifies the row one engine instance is bound to.
///
/// Immutable for the lifetime of the instance: a different table or key
/// means detaching and attaching a new engine. The key may be absent,
/// in which case attach short-circuits to an inert engine.
#[derive(Debug, Clone, PartialEq)]
pub struct RowIdentity {
    /// Table the row lives in.
    pub table: String,
    /// Primary-key value, when known.
    pub key: Option<RowKey>,
}

impl RowIdentity {
    /// Identity with a known key.
    pub fn keyed(table: impl Into<String>, key: impl Into<RowKey>) -> Self {
        Self {
            table: table.into(),
            key: Some(key.into()),
        }
    }

    /// Identity whose key is not available yet.
    pub fn unkeyed(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            key: None,
        }
    }
}

/// Shared state of one live engine instance.
struct Inner {
    table: String,
    key: RowKey,
    options: RowOptions,
    client: Arc<dyn StoreClient>,
    cell: Mutex<CellState>,
    live: AtomicBool,
    subscription: Mutex<FeedSubscription>,
    watchers: Mutex<Vec<mpsc::Sender<RowSnapshot>>>,
}

impl Inner {
    /// Spawns the one initial point read.
    fn spawn_read(this: &Arc<Self>) {
        let weak = Arc::downgrade(this);
        let client = Arc::clone(&this.client);
        let select = RowSelect::new(
            this.options.schema.clone(),
            this.table.clone(),
            this.options.primary_key.clone(),
            this.key.clone(),
        )
        .with_columns(this.options.select.clone());
        thread::spawn(move || {
            let result = client.fetch_row(&select);
            if let Some(inner) = weak.upgrade() {
                inner.apply_read(result);
            }
        });
    }

    /// Opens the one change-feed registration.
    ///
    /// A subscribe failure degrades the engine to read-only-plus-writes:
    /// it is reported through the sink, not propagated.
    fn open_feed(this: &Arc<Self>) {
        let weak = Arc::downgrade(this);
        let callback: ChangeCallback = Arc::new(move |event| {
            if let Some(inner) = weak.upgrade() {
                inner.apply_event(&event);
            }
        });
        let filter = ChangeFilter::for_row(
            this.options.schema.clone(),
            this.table.clone(),
            this.options.primary_key.clone(),
            this.key.clone(),
        );
        if let Err(err) = this.subscription.lock().open(filter, callback) {
            this.options.sink.warn(&format!(
                "change feed for {}.{} could not be opened: {err}",
                this.options.schema, this.table
            ));
        }
    }

    /// Applies the initial read's resolution, unless detached.
    fn apply_read(&self, result: StoreResult<Option<Row>>) {
        let mut cell = self.cell.lock();
        if !self.live.load(Ordering::SeqCst) {
            return;
        }
        match result {
            Ok(Some(row)) => {
                if cell.apply_read(Some(row)) {
                    tracing::debug!(target: "liverow", table = %self.table, key = %self.key, "initial read applied");
                } else {
                    tracing::debug!(target: "liverow", table = %self.table, key = %self.key, "initial read superseded by change feed");
                }
            }
            Ok(None) => {
                cell.apply_read(None);
                self.options.sink.warn(&format!(
                    "no row in {}.{} with {} = {}",
                    self.options.schema, self.table, self.options.primary_key, self.key
                ));
            }
            Err(err) => {
                cell.apply_read(None);
                self.options.sink.warn(&format!(
                    "initial read of {}.{} failed: {err}",
                    self.options.schema, self.table
                ));
            }
        }
        self.notify(cell.snapshot());
    }

    /// Applies one change-feed event, unless detached.
    fn apply_event(&self, event: &ChangeEvent) {
        let mut cell = self.cell.lock();
        if !self.live.load(Ordering::SeqCst) {
            return;
        }
        cell.apply_event(event);
        tracing::debug!(target: "liverow", table = %self.table, key = %self.key, change = ?event.change_type, "change feed event applied");
        self.notify(cell.snapshot());
    }

    /// Applies a local optimistic edit and schedules its persist.
    fn write_local(&self, updater: impl FnOnce(Option<Row>) -> Option<Row>) {
        let computed = {
            let mut cell = self.cell.lock();
            if !self.live.load(Ordering::SeqCst) {
                return;
            }
            let previous = cell.value().as_row().cloned();
            let computed = updater(previous);
            cell.apply_local(computed.clone());
            self.notify(cell.snapshot());
            computed
        };

        if !self.options.auto_sync {
            return;
        }
        let Some(row) = computed else { return };
        let update = RowUpdate::new(
            self.options.schema.clone(),
            self.table.clone(),
            self.options.primary_key.clone(),
            self.key.clone(),
            row,
        );
        let client = Arc::clone(&self.client);
        let sink = Arc::clone(&self.options.sink);
        // Fire and forget: failure is logged, never retried, and the
        // optimistic value stands.
        thread::spawn(move || {
            if let Err(err) = client.update_row(&update) {
                sink.warn(&format!(
                    "persist of {}.{} failed: {err}",
                    update.schema, update.table
                ));
            }
        });
    }

    /// Flips the live flag and releases the subscription.
    ///
    /// The flag changes under the cell lock so no in-flight completion
    /// straddles the detach: a completion either finished before it or
    /// observes the dead flag.
    fn detach(&self) {
        let was_live = {
            let _cell = self.cell.lock();
            self.live.swap(false, Ordering::SeqCst)
        };
        if was_live {
            self.subscription.lock().close();
            self.watchers.lock().clear();
            tracing::debug!(target: "liverow", table = %self.table, key = %self.key, "engine detached");
        }
    }

    /// Sends a snapshot to every watcher.
    ///
    /// Callers hold the cell lock, and `watch` registers senders under
    /// that same lock (cell before watchers, everywhere). Deliveries
    /// therefore reach each watcher in mutation order, and a watcher
    /// registered while a mutation is in flight sees either the
    /// pre-mutation snapshot plus the notification, or the post-mutation
    /// snapshot; never neither.
    fn notify(&self, snapshot: RowSnapshot) {
        let mut watchers = self.watchers.lock();
        watchers.retain(|tx| tx.send(snapshot.clone()).is_ok());
    }
}

/// Binds one identified row to a local observable value.
///
/// An engine performs exactly one initial read and holds at most one
/// change-feed subscription for its whole lifetime. Local edits through
/// [`set_row`](Self::set_row) and [`update_row`](Self::update_row) are
/// applied synchronously and persisted asynchronously. [`detach`]
/// (Self::detach) ends the instance; dropping it detaches too.
pub struct RowSyncEngine {
    /// None for the inert engine returned when the identity has no key.
    inner: Option<Arc<Inner>>,
}

impl RowSyncEngine {
    /// Attaches an engine to one row.
    ///
    /// Returns immediately with an unloaded `Unknown` value; the initial
    /// read and the change feed fill the value in asynchronously.
    ///
    /// If `identity.key` is absent this is a documented short-circuit,
    /// not an error: one diagnostic is emitted (unless
    /// `skip_if_no_key`) and the returned engine is permanently absent,
    /// never loaded, with no-op edits and detach.
    ///
    /// # Errors
    ///
    /// Fails only when the registry has no client installed.
    pub fn attach(
        registry: &ClientRegistry,
        identity: RowIdentity,
        options: RowOptions,
    ) -> EngineResult<Self> {
        let RowIdentity { table, key } = identity;
        let Some(key) = key else {
            if !options.skip_if_no_key {
                options.sink.warn(&format!(
                    "attach for table {table:?} has no row key; value stays absent and edits are dropped"
                ));
            }
            return Ok(Self { inner: None });
        };

        let client = registry.client()?;
        let subscription = FeedSubscription::new(Arc::clone(&client), Arc::clone(&options.sink));
        let inner = Arc::new(Inner {
            table,
            key,
            options,
            client,
            cell: Mutex::new(CellState::new()),
            live: AtomicBool::new(true),
            subscription: Mutex::new(subscription),
            watchers: Mutex::new(Vec::new()),
        });

        Inner::spawn_read(&inner);
        Inner::open_feed(&inner);

        Ok(Self { inner: Some(inner) })
    }

    /// Attaches against the process-wide registry.
    pub fn attach_global(identity: RowIdentity, options: RowOptions) -> EngineResult<Self> {
        Self::attach(ClientRegistry::global(), identity, options)
    }

    /// The current value.
    pub fn value(&self) -> RowValue {
        match &self.inner {
            Some(inner) => inner.cell.lock().value().clone(),
            None => RowValue::Absent,
        }
    }

    /// Whether the initial read or the feed has resolved at least once.
    pub fn loaded(&self) -> bool {
        match &self.inner {
            Some(inner) => inner.cell.lock().loaded(),
            None => false,
        }
    }

    /// The current value and loaded flag, read atomically.
    pub fn snapshot(&self) -> RowSnapshot {
        match &self.inner {
            Some(inner) => inner.cell.lock().snapshot(),
            None => RowSnapshot {
                value: RowValue::Absent,
                loaded: false,
            },
        }
    }

    /// Registers a watcher.
    ///
    /// The receiver gets the current snapshot immediately, then one
    /// snapshot per subsequent mutation, in mutation order. Watchers of
    /// a detached or inert engine see the current snapshot and then the
    /// channel closing.
    pub fn watch(&self) -> mpsc::Receiver<RowSnapshot> {
        let (tx, rx) = mpsc::channel();
        match &self.inner {
            Some(inner) => {
                // Snapshot and registration happen under the cell lock
                // so no mutation can slip between them undelivered.
                let cell = inner.cell.lock();
                let _ = tx.send(cell.snapshot());
                if inner.live.load(Ordering::SeqCst) {
                    inner.watchers.lock().push(tx);
                }
            }
            None => {
                let _ = tx.send(RowSnapshot {
                    value: RowValue::Absent,
                    loaded: false,
                });
            }
        }
        rx
    }

    /// Replaces the value with a literal row.
    ///
    /// Applied synchronously; when `auto_sync` is on, a persist is
    /// scheduled fire-and-forget. No read-back occurs: the local value
    /// is trusted until the next change-feed event.
    pub fn set_row(&self, row: Row) {
        if let Some(inner) = &self.inner {
            inner.write_local(|_| Some(row));
        }
    }

    /// Computes a new value from the previous one.
    ///
    /// The updater sees `None` when no row is currently known and may
    /// return `None` to make the value absent (absence is not
    /// persisted). Same synchronous-apply and persist semantics as
    /// [`set_row`](Self::set_row).
    pub fn update_row(&self, updater: impl FnOnce(Option<Row>) -> Option<Row>) {
        if let Some(inner) = &self.inner {
            inner.write_local(updater);
        }
    }

    /// Detaches the engine. Idempotent.
    ///
    /// Releases the change-feed registration and discards any in-flight
    /// read completion; no state mutates afterwards.
    pub fn detach(&self) {
        if let Some(inner) = &self.inner {
            inner.detach();
        }
    }

    /// Returns true while the engine is attached and not inert.
    pub fn is_live(&self) -> bool {
        self.inner
            .as_ref()
            .is_some_and(|inner| inner.live.load(Ordering::SeqCst))
    }
}

impl Drop for RowSyncEngine {
    fn drop(&mut self) {
        self.detach();
    }
}
