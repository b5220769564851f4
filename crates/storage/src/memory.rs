//! In-memory channel store (does not persist across restarts).

use std::collections::HashMap;

use duet_channel_primitives::{Channel, ChannelId};
use parking_lot::RwLock;

use crate::{ChannelStore, StoreError};

/// In-memory channel store for testing and ephemeral nodes.
#[derive(Debug, Default)]
pub struct MemoryChannelStore {
    channels: RwLock<HashMap<ChannelId, Channel>>,
}

impl MemoryChannelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.channels.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.read().is_empty()
    }
}

impl ChannelStore for MemoryChannelStore {
    fn get(&self, channel_id: &ChannelId) -> Result<Option<Channel>, StoreError> {
        Ok(self.channels.read().get(channel_id).cloned())
    }

    fn put(&self, channel: &Channel) -> Result<(), StoreError> {
        self.channels.write().insert(channel.id(), channel.clone());
        Ok(())
    }

    fn channel_ids(&self) -> Result<Vec<ChannelId>, StoreError> {
        let mut ids: Vec<_> = self.channels.read().keys().copied().collect();
        ids.sort();
        Ok(ids)
    }
}
