//! Peer links for tests.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use duet_channel_api::{PeerLink, PeerLinkError};
use duet_channel_primitives::{Address, PeerMessage};
use parking_lot::Mutex;
use tokio::sync::mpsc;

/// Records every message instead of delivering it.
#[derive(Debug, Default)]
pub struct RecordingPeerLink {
    sent: Mutex<Vec<(Address, PeerMessage)>>,
    offline: Mutex<bool>,
}

impl RecordingPeerLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline every send fails with [`PeerLinkError::Unreachable`]
    /// and nothing is recorded.
    pub fn set_offline(&self, offline: bool) {
        *self.offline.lock() = offline;
    }

    /// Take every message recorded so far.
    pub fn take(&self) -> Vec<(Address, PeerMessage)> {
        std::mem::take(&mut *self.sent.lock())
    }

    pub fn len(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sent.lock().is_empty()
    }
}

#[async_trait]
impl PeerLink for RecordingPeerLink {
    async fn send(&self, recipient: Address, message: PeerMessage) -> Result<(), PeerLinkError> {
        if *self.offline.lock() {
            return Err(PeerLinkError::Unreachable(recipient));
        }
        self.sent.lock().push((recipient, message));
        Ok(())
    }
}

/// Routes messages to per-address mailboxes.
///
/// Each party [`register`](Self::register)s its address and reads its
/// mailbox; sending to an unregistered or disconnected address fails with
/// [`PeerLinkError::Unreachable`].
#[derive(Debug, Default)]
pub struct MailboxNetwork {
    mailboxes: Mutex<HashMap<Address, mpsc::UnboundedSender<PeerMessage>>>,
    disconnected: Mutex<HashSet<Address>>,
}

impl MailboxNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a mailbox for `address`, replacing any previous one.
    pub fn register(&self, address: Address) -> mpsc::UnboundedReceiver<PeerMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.mailboxes.lock().insert(address, tx);
        rx
    }

    /// Make `address` unreachable until [`reconnect`](Self::reconnect)ed.
    pub fn disconnect(&self, address: Address) {
        self.disconnected.lock().insert(address);
    }

    pub fn reconnect(&self, address: Address) {
        self.disconnected.lock().remove(&address);
    }
}

#[async_trait]
impl PeerLink for MailboxNetwork {
    async fn send(&self, recipient: Address, message: PeerMessage) -> Result<(), PeerLinkError> {
        if self.disconnected.lock().contains(&recipient) {
            return Err(PeerLinkError::Unreachable(recipient));
        }
        let mailboxes = self.mailboxes.lock();
        let mailbox = mailboxes
            .get(&recipient)
            .ok_or(PeerLinkError::Unreachable(recipient))?;
        mailbox
            .send(message)
            .map_err(|_| PeerLinkError::Transport(format!("mailbox of {recipient} closed")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use duet_channel_primitives::{Bytes, ChannelId, PendingUpdate};

    fn message() -> PeerMessage {
        PeerMessage::ProposedUpdate(PendingUpdate::new(
            ChannelId::with_last_byte(1),
            1,
            Bytes::from_static(b"s"),
        ))
    }

    #[tokio::test]
    async fn mailbox_routes_by_address() {
        let network = MailboxNetwork::new();
        let bob = Address::repeat_byte(2);
        let mut inbox = network.register(bob);

        network.send(bob, message()).await.unwrap();
        assert_eq!(inbox.recv().await, Some(message()));

        assert_matches!(
            network.send(Address::repeat_byte(3), message()).await,
            Err(PeerLinkError::Unreachable(_))
        );

        network.disconnect(bob);
        assert_matches!(
            network.send(bob, message()).await,
            Err(PeerLinkError::Unreachable(_))
        );
        network.reconnect(bob);
        network.send(bob, message()).await.unwrap();
        assert_eq!(inbox.recv().await, Some(message()));
    }

    #[tokio::test]
    async fn recording_link_respects_offline() {
        let link = RecordingPeerLink::new();
        link.set_offline(true);
        assert!(link.send(Address::ZERO, message()).await.is_err());
        assert!(link.is_empty());

        link.set_offline(false);
        link.send(Address::ZERO, message()).await.unwrap();
        assert_eq!(link.take(), vec![(Address::ZERO, message())]);
        assert!(link.is_empty());
    }
}
