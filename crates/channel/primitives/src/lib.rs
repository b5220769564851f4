//! Core types for Duet bilateral payment channels.
//!
//! - [`ChannelId`] - 32-byte channel identifier chosen by the proposer
//! - [`Channel`] - Local channel record with role-typed participant accessors
//! - [`PendingUpdate`] - Candidate state transition awaiting signatures
//! - [`PeerMessage`] - The four message kinds exchanged between counterparties
//! - [`fingerprint`] - Canonical tagged encoding that signatures cover
//!
//! Addresses, hashes and signatures use alloy types so that fingerprints and
//! signatures are interchangeable with the on-chain arbiter.

mod channel;
pub mod fingerprint;
mod id;
mod message;
mod update;

pub use channel::{Channel, ChannelParams, Phase, Role};
pub use fingerprint::{EncodeError, Field, Operation};
pub use id::ChannelId;
pub use message::{AcceptedChannel, MessageError, PeerMessage, ProposedChannel};
pub use update::{PendingUpdate, UpdateBucket, UpdateBuckets};

// Re-export commonly used types
pub use alloy_primitives::{Address, B256, Bytes, U256};
