use duet_channel_primitives::ChannelId;

/// Backend-level error.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DatabaseError {
    /// Failed to decode a key or value read from a table.
    #[error("failed to decode a record from a table")]
    Decode,
    /// Failed to encode a value for writing.
    #[error("failed to encode a record: {0}")]
    Encode(String),
    /// Failed to open the database.
    #[error("failed to open the database: {0}")]
    Open(String),
    /// Failed to read from a table.
    #[error("failed to read from a database table: {0}")]
    Read(String),
    /// Failed to write or commit a transaction.
    #[error("failed to write to a database table: {0}")]
    Write(String),
}

/// Errors surfaced by a [`ChannelStore`](crate::ChannelStore).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No record exists for the channel.
    #[error("channel {0} not found in store")]
    ChannelNotFound(ChannelId),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}
