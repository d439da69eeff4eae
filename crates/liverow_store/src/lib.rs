//! # Liverow Store Contract
//!
//! Store-facing contract for liverow.
//!
//! This crate provides:
//! - `Row` and `RowKey` value types
//! - `ChangeEvent` and `ChangeFilter` for change-feed delivery
//! - The `StoreClient` trait (point read, point update, subscribe)
//! - `MemoryStore`, an in-memory reference client
//!
//! This is a pure contract crate: the only `StoreClient` implementation
//! it ships is the in-memory one used for tests and embedding. Network
//! clients for concrete stores live outside this workspace and implement
//! the same trait.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod error;
mod event;
mod memory;
mod row;

pub use client::{ChangeCallback, RowSelect, RowUpdate, StoreClient, SubscriptionId};
pub use error::{StoreError, StoreResult};
pub use event::{ChangeEvent, ChangeFilter, ChangeType, ChannelKey, EventFilter};
pub use memory::MemoryStore;
pub use row::{Row, RowKey};
