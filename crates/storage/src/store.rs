use auto_impl::auto_impl;
use duet_channel_primitives::{Channel, ChannelId, PendingUpdate, UpdateBucket};

use crate::StoreError;

/// Channel persistence trait with auto-impl for &, Box, Arc.
///
/// Implementations only need to be linearizable per key; callers serialize
/// read-modify-write sequences on one channel themselves.
#[auto_impl(&, Box, Arc)]
pub trait ChannelStore: Send + Sync {
    fn get(&self, channel_id: &ChannelId) -> Result<Option<Channel>, StoreError>;

    /// Insert or replace the record for `channel.id()`.
    fn put(&self, channel: &Channel) -> Result<(), StoreError>;

    /// Ids of all stored channels, in ascending order.
    fn channel_ids(&self) -> Result<Vec<ChannelId>, StoreError>;

    fn contains(&self, channel_id: &ChannelId) -> Result<bool, StoreError> {
        Ok(self.get(channel_id)?.is_some())
    }

    /// Like [`get`](Self::get), but a missing record is an error.
    fn require(&self, channel_id: &ChannelId) -> Result<Channel, StoreError> {
        self.get(channel_id)?
            .ok_or(StoreError::ChannelNotFound(*channel_id))
    }

    /// Append `update` to one of the channel's buckets.
    fn append_update(
        &self,
        channel_id: &ChannelId,
        bucket: UpdateBucket,
        update: PendingUpdate,
    ) -> Result<(), StoreError> {
        let mut channel = self.require(channel_id)?;
        channel.updates.bucket_mut(bucket).push(update);
        self.put(&channel)
    }

    /// Remove the update with `sequence_number` from one of the channel's
    /// buckets, returning it if it was present.
    fn remove_update(
        &self,
        channel_id: &ChannelId,
        bucket: UpdateBucket,
        sequence_number: u64,
    ) -> Result<Option<PendingUpdate>, StoreError> {
        let mut channel = self.require(channel_id)?;
        let removed = channel.updates.remove(bucket, sequence_number);
        if removed.is_some() {
            self.put(&channel)?;
        }
        Ok(removed)
    }
}
