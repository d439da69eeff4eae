//! Rebindable handle for rendering layers.

use crate::cell::{RowSnapshot, RowValue};
use crate::engine::{RowIdentity, RowSyncEngine};
use crate::error::EngineResult;
use crate::options::RowOptions;
use crate::registry::ClientRegistry;
use liverow_store::Row;
use std::sync::mpsc;

/// A row binding a rendering layer can hold across identity changes.
///
/// Wraps one [`RowSyncEngine`] and recreates it when the bound identity
/// changes, detaching the previous instance before attaching the
/// replacement so at most one subscription exists at any time.
pub struct BoundRow {
    engine: RowSyncEngine,
    identity: RowIdentity,
}

impl BoundRow {
    /// Attaches a binding to one row.
    pub fn attach(
        registry: &ClientRegistry,
        identity: RowIdentity,
        options: RowOptions,
    ) -> EngineResult<Self> {
        let engine = RowSyncEngine::attach(registry, identity.clone(), options)?;
        Ok(Self { engine, identity })
    }

    /// Rebinds to a different identity.
    ///
    /// Release before acquire: the previous engine is detached before
    /// the new one attaches. Rebinding to the current identity is a
    /// no-op and keeps the existing engine (and its loaded state).
    pub fn rebind(
        &mut self,
        registry: &ClientRegistry,
        identity: RowIdentity,
        options: RowOptions,
    ) -> EngineResult<()> {
        if identity == self.identity {
            return Ok(());
        }
        self.engine.detach();
        self.engine = RowSyncEngine::attach(registry, identity.clone(), options)?;
        self.identity = identity;
        Ok(())
    }

    /// The currently bound identity.
    pub fn identity(&self) -> &RowIdentity {
        &self.identity
    }

    /// The current value.
    pub fn value(&self) -> RowValue {
        self.engine.value()
    }

    /// Whether the current engine has loaded.
    pub fn loaded(&self) -> bool {
        self.engine.loaded()
    }

    /// The current value and loaded flag.
    pub fn snapshot(&self) -> RowSnapshot {
        self.engine.snapshot()
    }

    /// Registers a watcher on the current engine.
    ///
    /// Watchers do not survive a rebind; a rendering layer re-watches
    /// after changing identity.
    pub fn watch(&self) -> mpsc::Receiver<RowSnapshot> {
        self.engine.watch()
    }

    /// Replaces the value with a literal row.
    pub fn set_row(&self, row: Row) {
        self.engine.set_row(row);
    }

    /// Computes a new value from the previous one.
    pub fn update_row(&self, updater: impl FnOnce(Option<Row>) -> Option<Row>) {
        self.engine.update_row(updater);
    }

    /// Manually detaches the current engine.
    pub fn detach(&self) {
        self.engine.detach();
    }
}
