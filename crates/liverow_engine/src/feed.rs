//! Ownership of one change-feed registration.

use crate::diag::DiagnosticSink;
use liverow_store::{ChangeCallback, ChangeFilter, ChannelKey, StoreClient, StoreResult, SubscriptionId};
use std::sync::Arc;

/// Owns at most one change-feed registration for one row.
///
/// `open` releases any registration this instance already holds before
/// subscribing, so one instance never holds two live registrations.
/// Dropping the subscription closes it.
pub struct FeedSubscription {
    client: Arc<dyn StoreClient>,
    sink: Arc<dyn DiagnosticSink>,
    id: Option<SubscriptionId>,
    key: Option<ChannelKey>,
}

impl FeedSubscription {
    /// Creates an unopened subscription bound to a client.
    pub fn new(client: Arc<dyn StoreClient>, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            client,
            sink,
            id: None,
            key: None,
        }
    }

    /// Opens a registration for the filter's row.
    ///
    /// Any registration this instance already holds is released first.
    /// If the store already carries a live registration under the same
    /// channel key, a diagnostic is emitted; the check is a side-effect
    /// free enumeration with no atomicity guarantee against concurrent
    /// registration from elsewhere.
    pub fn open(
        &mut self,
        filter: ChangeFilter,
        callback: ChangeCallback,
    ) -> StoreResult<SubscriptionId> {
        self.close();

        let key = filter.channel_key();
        if self.client.live_channels().contains(&key) {
            self.sink.warn(&format!(
                "channel {key} already has a live registration; events will be delivered to both"
            ));
        }

        let id = self.client.subscribe(key.clone(), filter, callback)?;
        tracing::debug!(target: "liverow", channel = %key, %id, "change feed opened");
        self.id = Some(id);
        self.key = Some(key);
        Ok(id)
    }

    /// Releases the registration, if one is held. Idempotent.
    ///
    /// A store-side unsubscribe failure is reported through the sink;
    /// the local handle is cleared either way.
    pub fn close(&mut self) {
        if let Some(id) = self.id.take() {
            let key = self.key.take();
            if let Err(err) = self.client.unsubscribe(id) {
                self.sink.warn(&format!("failed to release change feed {id}: {err}"));
            } else if let Some(key) = key {
                tracing::debug!(target: "liverow", channel = %key, %id, "change feed closed");
            }
        }
    }

    /// Returns true while a registration is held.
    pub fn is_open(&self) -> bool {
        self.id.is_some()
    }

    /// The channel key of the held registration.
    pub fn channel_key(&self) -> Option<&ChannelKey> {
        self.key.as_ref()
    }
}

impl Drop for FeedSubscription {
    fn drop(&mut self) {
        self.close();
    }
}
