use async_trait::async_trait;
use duet_channel_primitives::{Address, PeerMessage};

use crate::PeerLinkError;

/// Delivers messages to a counterparty.
///
/// Delivery is at most once. Receivers re-verify everything and tolerate
/// duplicates and reordering, so callers never retry on their own.
#[async_trait]
#[auto_impl::auto_impl(&, Arc)]
pub trait PeerLink: Send + Sync {
    /// Send `message` to the participant identified by `recipient`.
    async fn send(&self, recipient: Address, message: PeerMessage) -> Result<(), PeerLinkError>;
}
