//! Process-wide store client registry.

use crate::error::{EngineError, EngineResult};
use liverow_store::StoreClient;
use std::sync::{Arc, OnceLock};

/// Holds the configured store client.
///
/// The process-wide instance is reached through [`ClientRegistry::global`]
/// (or the free functions [`initialize`] and [`client`]); standalone
/// instances exist so tests can run isolated registries. There is no
/// teardown: a registry lives as long as its owner.
pub struct ClientRegistry {
    slot: OnceLock<Arc<dyn StoreClient>>,
}

impl ClientRegistry {
    /// Creates an uninitialized registry.
    pub const fn new() -> Self {
        Self {
            slot: OnceLock::new(),
        }
    }

    /// The process-wide registry.
    pub fn global() -> &'static ClientRegistry {
        static GLOBAL: ClientRegistry = ClientRegistry::new();
        &GLOBAL
    }

    /// Installs the store client.
    ///
    /// Must be called exactly once before any attach; a second call
    /// fails and leaves the first client in place.
    pub fn initialize(&self, client: Arc<dyn StoreClient>) -> EngineResult<()> {
        self.slot
            .set(client)
            .map_err(|_| EngineError::RegistryAlreadyInitialized)
    }

    /// Returns the configured client.
    pub fn client(&self) -> EngineResult<Arc<dyn StoreClient>> {
        self.slot
            .get()
            .cloned()
            .ok_or(EngineError::RegistryNotInitialized)
    }

    /// Returns true if a client has been installed.
    pub fn is_initialized(&self) -> bool {
        self.slot.get().is_some()
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Installs the store client into the process-wide registry.
pub fn initialize(client: Arc<dyn StoreClient>) -> EngineResult<()> {
    ClientRegistry::global().initialize(client)
}

/// Returns the client from the process-wide registry.
pub fn client() -> EngineResult<Arc<dyn StoreClient>> {
    ClientRegistry::global().client()
}
