//! Interfaces to the collaborators of the channel protocol.
//!
//! - [`ArbiterClient`] - The on-chain settlement contract, seen as an opaque
//!   authority that accepts or rejects submissions
//! - [`PeerLink`] - At-most-once delivery of [`PeerMessage`]s to a counterparty
//!
//! Both are object-safe and implemented for `&T` and `Arc<T>`.

mod arbiter;
mod error;
mod peer;

pub use arbiter::{ArbiterChannel, ArbiterClient, OpenChannelRequest, UpdateStateRequest};
pub use error::{ArbiterError, PeerLinkError, Rejection};
pub use peer::PeerLink;

pub use duet_channel_primitives::PeerMessage;
