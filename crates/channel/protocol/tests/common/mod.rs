//! Shared fixtures for protocol integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use duet_channel_primitives::{Address, Bytes, ChannelId, PendingUpdate, UpdateBucket};
use duet_channel_protocol::{ChannelProposalRequest, ChannelProtocol, ProtocolArgs, ProtocolError};
use duet_channel_signer::Keyring;
use duet_channel_test_utils::{MockArbiter, RecordingPeerLink, TestParty};
use duet_storage::{ChannelStore, MemoryChannelStore};

pub type TestProtocol<S> = ChannelProtocol<S, Keyring, Arc<MockArbiter>, Arc<RecordingPeerLink>>;

/// Small timeouts and backoffs so failure paths finish quickly.
pub fn test_args() -> ProtocolArgs {
    ProtocolArgs {
        request_timeout_ms: 200,
        arbiter_retry_attempts: 3,
        arbiter_retry_initial_backoff_ms: 1,
        arbiter_retry_max_backoff_ms: 4,
        min_challenge_period: 1,
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("duet=debug")
        .with_test_writer()
        .try_init();
}

/// One participant: its key, its outbox and its protocol instance.
pub struct Node<S = MemoryChannelStore> {
    pub party: TestParty,
    pub link: Arc<RecordingPeerLink>,
    pub protocol: TestProtocol<S>,
}

impl Node<MemoryChannelStore> {
    pub fn new(arbiter: &Arc<MockArbiter>) -> Self {
        Self::with_store(arbiter, MemoryChannelStore::new())
    }
}

impl<S: ChannelStore> Node<S> {
    pub fn with_store(arbiter: &Arc<MockArbiter>, store: S) -> Self {
        init_tracing();
        let party = TestParty::random();
        let link = Arc::new(RecordingPeerLink::new());
        let protocol = ChannelProtocol::new(
            party.address,
            store,
            party.keyring.clone(),
            Arc::clone(arbiter),
            Arc::clone(&link),
            &test_args(),
        )
        .unwrap();
        Self {
            party,
            link,
            protocol,
        }
    }

    pub fn address(&self) -> Address {
        self.party.address
    }

    /// Hand every message sent so far to `to`, in order.
    pub async fn deliver_to<T: ChannelStore>(
        &self,
        to: &Node<T>,
    ) -> Vec<Result<(), ProtocolError>> {
        let mut results = Vec::new();
        for (recipient, message) in self.link.take() {
            assert_eq!(recipient, to.address(), "message addressed elsewhere");
            results.push(to.protocol.handle_message(message).await);
        }
        results
    }

    /// The single proposal `self` holds from the counterparty at `sequence_number`.
    pub fn their_proposal(&self, channel_id: ChannelId, sequence_number: u64) -> PendingUpdate {
        self.protocol
            .channel(&channel_id)
            .unwrap()
            .unwrap()
            .updates
            .find(UpdateBucket::TheirProposed, sequence_number)
            .cloned()
            .unwrap()
    }
}

pub fn all_ok(results: Vec<Result<(), ProtocolError>>) {
    for result in results {
        result.unwrap();
    }
}

/// Open a channel proposed by `alice` and accepted by `bob`.
pub async fn open_channel<A: ChannelStore, B: ChannelStore>(
    alice: &Node<A>,
    bob: &Node<B>,
    challenge_period: u64,
) -> ChannelId {
    let proposal = alice
        .protocol
        .propose_channel(ChannelProposalRequest::new(
            bob.address(),
            Bytes::from_static(b"genesis"),
            challenge_period,
        ))
        .await
        .unwrap();
    all_ok(alice.deliver_to(bob).await);

    bob.protocol.accept_channel(proposal.clone()).await.unwrap();
    all_ok(bob.deliver_to(alice).await);

    proposal.params.channel_id
}

/// Run a full propose/accept round from `proposer` to `accepter`.
pub async fn exchange_update<A: ChannelStore, B: ChannelStore>(
    proposer: &Node<A>,
    accepter: &Node<B>,
    channel_id: ChannelId,
    state: &'static [u8],
) -> PendingUpdate {
    let proposed = proposer
        .protocol
        .propose_update(channel_id, Bytes::from_static(state))
        .await
        .unwrap();
    all_ok(proposer.deliver_to(accepter).await);

    let queued = accepter.their_proposal(channel_id, proposed.sequence_number);
    let accepted = accepter.protocol.accept_update(queued).await.unwrap();
    all_ok(accepter.deliver_to(proposer).await);
    accepted
}
