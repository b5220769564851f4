//! Durable [`ChannelStore`] backed by a single redb table.
//!
//! Keys are raw 32-byte channel ids, values are postcard-encoded channel
//! records. Every `put` is its own write transaction, committed before it
//! returns.

use std::{fmt::Display, path::Path};

use duet_channel_primitives::{Channel, ChannelId};
use duet_storage::{ChannelStore, Compress, DatabaseError, Decode, Decompress, Encode, StoreError};
use metrics::Counter;
use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};
use tracing::{debug, trace};

const CHANNELS: TableDefinition<'static, &[u8], &[u8]> = TableDefinition::new("channels");

#[derive(Clone)]
struct StoreMetrics {
    reads: Counter,
    writes: Counter,
}

impl Default for StoreMetrics {
    fn default() -> Self {
        Self {
            reads: metrics::counter!("storage.redb.reads_total"),
            writes: metrics::counter!("storage.redb.writes_total"),
        }
    }
}

/// redb-backed channel store.
pub struct RedbChannelStore {
    db: Database,
    metrics: StoreMetrics,
}

impl std::fmt::Debug for RedbChannelStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbChannelStore").finish_non_exhaustive()
    }
}

fn open_err(e: impl Display) -> DatabaseError {
    DatabaseError::Open(e.to_string())
}

fn read_err(e: impl Display) -> DatabaseError {
    DatabaseError::Read(e.to_string())
}

fn write_err(e: impl Display) -> DatabaseError {
    DatabaseError::Write(e.to_string())
}

impl RedbChannelStore {
    /// Open the database at `path`, creating it and the channel table if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DatabaseError> {
        let path = path.as_ref();
        let db = Database::create(path).map_err(open_err)?;

        let txn = db.begin_write().map_err(open_err)?;
        let existing = txn.open_table(CHANNELS).map_err(open_err)?.len().map_err(open_err)?;
        txn.commit().map_err(open_err)?;

        debug!(path = %path.display(), channels = existing, "opened channel database");
        Ok(Self {
            db,
            metrics: StoreMetrics::default(),
        })
    }
}

impl ChannelStore for RedbChannelStore {
    fn get(&self, channel_id: &ChannelId) -> Result<Option<Channel>, StoreError> {
        self.metrics.reads.increment(1);
        let key = channel_id.encode();

        let txn = self.db.begin_read().map_err(read_err)?;
        let table = txn.open_table(CHANNELS).map_err(read_err)?;
        let Some(value) = table.get(key.as_slice()).map_err(read_err)? else {
            return Ok(None);
        };

        Ok(Some(Channel::decompress(value.value())?))
    }

    fn put(&self, channel: &Channel) -> Result<(), StoreError> {
        self.metrics.writes.increment(1);
        let key = channel.id().encode();
        let value = channel.compress()?;

        let txn = self.db.begin_write().map_err(write_err)?;
        {
            let mut table = txn.open_table(CHANNELS).map_err(write_err)?;
            table
                .insert(key.as_slice(), value.as_slice())
                .map_err(write_err)?;
        }
        txn.commit().map_err(write_err)?;

        trace!(channel_id = %channel.id(), phase = %channel.phase, bytes = value.len(), "stored channel");
        Ok(())
    }

    fn channel_ids(&self) -> Result<Vec<ChannelId>, StoreError> {
        self.metrics.reads.increment(1);
        let txn = self.db.begin_read().map_err(read_err)?;
        let table = txn.open_table(CHANNELS).map_err(read_err)?;

        let mut ids = Vec::new();
        for entry in table.iter().map_err(read_err)? {
            let (key, _) = entry.map_err(read_err)?;
            ids.push(ChannelId::decode(key.value())?);
        }
        Ok(ids)
    }
}
