//! Error types for store clients.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store client operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A point read failed.
    #[error("query failed: {0}")]
    Query(String),

    /// A point update failed.
    #[error("persist failed: {0}")]
    Persist(String),

    /// A change-feed registration could not be established.
    #[error("subscribe failed: {0}")]
    Subscribe(String),

    /// The client has been closed and accepts no further operations.
    #[error("store client is closed")]
    Closed,
}
