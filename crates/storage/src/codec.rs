use std::fmt::Debug;

use duet_channel_primitives::{Channel, ChannelId};

use crate::DatabaseError;

/// Transforms a value into the bytes written to the database.
pub trait Compress: Send + Sync + Sized + Debug {
    /// Serializes data going into the database.
    fn compress(&self) -> Result<Vec<u8>, DatabaseError>;
}

/// Transforms bytes read from the database back into a value.
pub trait Decompress: Send + Sync + Sized + Debug {
    /// Deserializes data coming from the database.
    fn decompress(value: &[u8]) -> Result<Self, DatabaseError>;
}

/// Transforms a key into its database form.
///
/// Encoded keys must sort the same way as the keys themselves.
pub trait Encode: Send + Sync + Sized + Debug {
    /// Encoded type.
    type Encoded: AsRef<[u8]> + Into<Vec<u8>> + Send + Sync + Ord + Debug;

    /// Encodes data going into the database.
    fn encode(self) -> Self::Encoded;
}

/// Transforms a database key back into its typed form.
pub trait Decode: Send + Sync + Sized + Debug {
    /// Decodes data coming from the database.
    fn decode(value: &[u8]) -> Result<Self, DatabaseError>;
}

impl Encode for ChannelId {
    type Encoded = [u8; 32];

    fn encode(self) -> Self::Encoded {
        self.as_b256().0
    }
}

impl Decode for ChannelId {
    fn decode(value: &[u8]) -> Result<Self, DatabaseError> {
        let bytes: [u8; 32] = value.try_into().map_err(|_| DatabaseError::Decode)?;
        Ok(ChannelId::new(bytes))
    }
}

impl Compress for Channel {
    fn compress(&self) -> Result<Vec<u8>, DatabaseError> {
        postcard::to_allocvec(self).map_err(|e| DatabaseError::Encode(e.to_string()))
    }
}

impl Decompress for Channel {
    fn decompress(value: &[u8]) -> Result<Self, DatabaseError> {
        postcard::from_bytes(value).map_err(|_| DatabaseError::Decode)
    }
}
