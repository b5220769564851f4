//! Per-channel mutual exclusion.

use std::sync::Arc;

use dashmap::DashMap;
use duet_channel_primitives::ChannelId;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per channel id.
///
/// Operations on the same channel are serialized; distinct channels proceed
/// in parallel. An entry only lives while some task holds or waits on it, so
/// messages naming unknown channels leave nothing behind.
#[derive(Debug, Default)]
pub struct ChannelLocks {
    locks: DashMap<ChannelId, Arc<Mutex<()>>>,
}

impl ChannelLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `channel_id`.
    pub async fn lock(&self, channel_id: ChannelId) -> ChannelGuard<'_> {
        // Clone out of the map so no shard guard is held across the await.
        let mutex = self.locks.entry(channel_id).or_default().clone();
        ChannelGuard {
            guard: Some(mutex.lock_owned().await),
            channel_id,
            locks: &self.locks,
        }
    }

    /// Number of channels currently locked or awaited.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Exclusive access to one channel. Releasing the last reference to a
/// channel's mutex removes it from the map.
#[derive(Debug)]
pub struct ChannelGuard<'a> {
    guard: Option<OwnedMutexGuard<()>>,
    channel_id: ChannelId,
    locks: &'a DashMap<ChannelId, Arc<Mutex<()>>>,
}

impl Drop for ChannelGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Waiters hold their own clone, so a count of one means only the map is left.
        self.locks
            .remove_if(&self.channel_id, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
