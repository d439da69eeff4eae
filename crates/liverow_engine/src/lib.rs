//! # Liverow Engine
//!
//! Row synchronization engine: binds one row of a remote relational
//! store to a local observable value.
//!
//! This crate provides:
//! - `RowSyncEngine`: one initial point read, one change-feed
//!   subscription, optimistic local writes with fire-and-forget persist
//! - `ClientRegistry`: process-wide store client configuration
//! - `FeedSubscription`: deduplicated single-row change-feed ownership
//! - `BoundRow`: rebindable handle for rendering layers
//! - `DiagnosticSink`: configurable destination for absorbed failures
//!
//! ## Architecture
//!
//! Three sources write into one current-value cell: the initial read,
//! the change feed, and local optimistic edits. The merge policy is
//! **last event wins**, with the change feed authoritative over an
//! in-flight read: once the feed has delivered anything, a later read
//! result only settles the loaded flag.
//!
//! ## Key Invariants
//!
//! - Exactly one read and at most one live subscription per engine
//! - A value that has left `Unknown` never returns to it
//! - The loaded flag is monotonic and set exactly once
//! - After `detach()` no completion mutates engine state
//! - Only configuration errors cross the `attach` boundary; fetch and
//!   persist failures are absorbed into diagnostics

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod binding;
mod cell;
mod diag;
mod engine;
mod error;
mod feed;
mod options;
mod registry;

pub use binding::BoundRow;
pub use cell::{RowSnapshot, RowValue};
pub use diag::{DiagnosticSink, RecordingSink, TracingSink};
pub use engine::{RowIdentity, RowSyncEngine};
pub use error::{EngineError, EngineResult};
pub use feed::FeedSubscription;
pub use options::RowOptions;
pub use registry::{client, initialize, ClientRegistry};
