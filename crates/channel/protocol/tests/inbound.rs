//! Message delivery through the inbound service and its handle.

mod common;

use std::sync::Arc;

use assert_matches::assert_matches;
use duet_channel_primitives::{Bytes, ChannelId, PeerMessage, PendingUpdate, Phase, UpdateBucket};
use duet_channel_protocol::{
    ChannelProposalRequest, ChannelProtocol, InboundError, InboundHandle, InboundService,
    ProtocolError, ValidationError,
};
use duet_channel_signer::Keyring;
use duet_channel_test_utils::{MailboxNetwork, MockArbiter, TestParty};
use duet_storage::MemoryChannelStore;
use tokio::sync::mpsc;

type MailboxProtocol =
    ChannelProtocol<MemoryChannelStore, Keyring, Arc<MockArbiter>, Arc<MailboxNetwork>>;

struct Peer {
    party: TestParty,
    protocol: Arc<MailboxProtocol>,
    inbox: mpsc::UnboundedReceiver<PeerMessage>,
    handle: InboundHandle,
}

impl Peer {
    fn join(network: &Arc<MailboxNetwork>, arbiter: &Arc<MockArbiter>) -> Self {
        common::init_tracing();
        let party = TestParty::random();
        let inbox = network.register(party.address);
        let protocol = Arc::new(
            ChannelProtocol::new(
                party.address,
                MemoryChannelStore::new(),
                party.keyring.clone(),
                Arc::clone(arbiter),
                Arc::clone(network),
                &common::test_args(),
            )
            .unwrap(),
        );
        let handle = InboundService::spawn(Arc::clone(&protocol));
        Self {
            party,
            protocol,
            inbox,
            handle,
        }
    }

    /// Deliver the next message waiting in the mailbox.
    async fn receive_one(&mut self) -> Result<(), InboundError> {
        let message = self.inbox.recv().await.expect("mailbox open");
        self.handle.deliver(message).await
    }
}

#[tokio::test]
async fn channel_opens_and_updates_over_mailboxes() {
    let network = Arc::new(MailboxNetwork::new());
    let arbiter = Arc::new(MockArbiter::new());
    let mut alice = Peer::join(&network, &arbiter);
    let mut bob = Peer::join(&network, &arbiter);

    let proposal = alice
        .protocol
        .propose_channel(ChannelProposalRequest::new(
            bob.party.address,
            Bytes::from_static(b"genesis"),
            3,
        ))
        .await
        .unwrap();
    let channel_id = proposal.params.channel_id;
    bob.receive_one().await.unwrap();

    let pending = bob.protocol.pending_channel_proposals().unwrap();
    bob.protocol.accept_channel(pending[0].clone()).await.unwrap();
    alice.receive_one().await.unwrap();
    assert_eq!(
        alice.protocol.channel(&channel_id).unwrap().unwrap().phase,
        Phase::Open
    );

    alice
        .protocol
        .propose_update(channel_id, Bytes::from_static(b"one"))
        .await
        .unwrap();
    bob.receive_one().await.unwrap();

    let queued = bob
        .protocol
        .channel(&channel_id)
        .unwrap()
        .unwrap()
        .updates
        .find(UpdateBucket::TheirProposed, 1)
        .cloned()
        .unwrap();
    bob.protocol.accept_update(queued).await.unwrap();
    alice.receive_one().await.unwrap();

    for protocol in [&alice.protocol, &bob.protocol] {
        let channel = protocol.channel(&channel_id).unwrap().unwrap();
        assert_eq!(channel.sequence_number, 1);
        assert_eq!(channel.state, Bytes::from_static(b"one"));
    }
}

#[tokio::test]
async fn raw_messages_are_decoded_or_rejected() {
    let network = Arc::new(MailboxNetwork::new());
    let arbiter = Arc::new(MockArbiter::new());
    let alice = Peer::join(&network, &arbiter);
    let mut bob = Peer::join(&network, &arbiter);

    let err = bob.handle.deliver_raw("{\"type\":\"proposedChannel\"}").await.unwrap_err();
    assert_matches!(
        err,
        InboundError::Protocol(ProtocolError::Validation(ValidationError::MalformedField(_)))
    );
    assert_matches!(
        bob.protocol.handle_raw_message("not json").await,
        Err(ProtocolError::Validation(ValidationError::MalformedField(_)))
    );

    let proposal = alice
        .protocol
        .propose_channel(ChannelProposalRequest::new(bob.party.address, Bytes::new(), 3))
        .await
        .unwrap();
    let json = bob.inbox.try_recv().unwrap().to_json().unwrap();

    let channel_id = bob.handle.deliver_raw(&json).await.unwrap();
    assert_eq!(channel_id, proposal.params.channel_id);
    assert_eq!(bob.protocol.pending_channel_proposals().unwrap(), vec![proposal]);
}

#[tokio::test]
async fn many_channels_are_handled_concurrently() {
    let network = Arc::new(MailboxNetwork::new());
    let arbiter = Arc::new(MockArbiter::new());
    let alice = Peer::join(&network, &arbiter);
    let mut bob = Peer::join(&network, &arbiter);

    for _ in 0..8 {
        alice
            .protocol
            .propose_channel(ChannelProposalRequest::new(bob.party.address, Bytes::new(), 3))
            .await
            .unwrap();
    }

    let mut deliveries = Vec::new();
    while let Ok(message) = bob.inbox.try_recv() {
        let handle = bob.handle.clone();
        deliveries.push(tokio::spawn(async move { handle.deliver(message).await }));
    }
    assert_eq!(deliveries.len(), 8);
    for delivery in deliveries {
        delivery.await.unwrap().unwrap();
    }

    assert_eq!(bob.protocol.pending_channel_proposals().unwrap().len(), 8);
}

#[tokio::test]
async fn stopped_service_is_reported() {
    let network = Arc::new(MailboxNetwork::new());
    let arbiter = Arc::new(MockArbiter::new());
    let alice = Peer::join(&network, &arbiter);

    let (command_tx, command_rx) = mpsc::unbounded_channel();
    drop(InboundService::new(command_rx, Arc::clone(&alice.protocol)));
    let handle = InboundHandle::new(command_tx);
    assert!(handle.is_closed());

    let message = PeerMessage::ProposedUpdate(PendingUpdate::new(
        ChannelId::with_last_byte(1),
        1,
        Bytes::new(),
    ));
    assert_matches!(handle.deliver(message).await, Err(InboundError::ServiceStopped));

    // decoding happens before the service is involved
    assert_matches!(
        handle.deliver_raw("{}").await,
        Err(InboundError::Protocol(ProtocolError::Validation(_)))
    );
}
