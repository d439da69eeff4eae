//! Error types for the row sync engine.

use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can cross the engine boundary.
///
/// Only configuration errors do: fetch and persist failures are absorbed
/// and reported through the attach-time diagnostic sink instead, since
/// the engine is a best-effort caching layer.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The client registry was used before `initialize`.
    #[error("store client registry was never initialized")]
    RegistryNotInitialized,

    /// The client registry was initialized twice.
    #[error("store client registry is already initialized")]
    RegistryAlreadyInitialized,
}
