//! Channel identifier.

use core::str::FromStr;

use alloy_primitives::B256;
use serde::{Deserialize, Serialize};

/// Opaque 32-byte channel identifier.
///
/// Chosen by the proposer and never reused, even after the channel closes.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::From,
    derive_more::Into,
)]
#[serde(transparent)]
pub struct ChannelId(B256);

impl ChannelId {
    /// Create a channel id from raw bytes.
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(B256::new(bytes))
    }

    /// Generate a random channel id.
    pub fn random() -> Self {
        Self::new(rand::random())
    }

    /// Channel id whose last byte is `byte` and all others zero.
    pub fn with_last_byte(byte: u8) -> Self {
        Self(B256::with_last_byte(byte))
    }

    /// The id as a 32-byte word.
    pub const fn as_b256(&self) -> &B256 {
        &self.0
    }

    /// The id as a byte slice.
    pub fn as_slice(&self) -> &[u8] {
        self.0.as_slice()
    }
}

impl FromStr for ChannelId {
    type Err = <B256 as FromStr>::Err;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        B256::from_str(s).map(Self)
    }
}

impl AsRef<[u8]> for ChannelId {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}
