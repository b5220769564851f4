//! The channel protocol state machine.
//!
//! Every operation validates before it mutates anything. Work on one channel
//! runs under that channel's lock, which covers local reads, signing and
//! writes only; the lock is released before any arbiter or peer round trip,
//! and the outcome is applied under a fresh acquisition after re-reading the
//! record.

mod dispute;
mod inbound;
mod open;
mod update;

pub use open::ChannelProposalRequest;

use std::{future::Future, time::Duration};

use duet_channel_api::{
    ArbiterChannel, ArbiterClient, ArbiterError, PeerLink, PeerLinkError, PeerMessage,
};
use duet_channel_primitives::{
    Address, B256, Bytes, Channel, ChannelId, PendingUpdate, Phase, ProposedChannel, Role,
};
use duet_channel_signer::{ChannelSigner, verify};
use duet_storage::ChannelStore;
use tracing::{debug, warn};

use crate::{
    Backoff, ChannelLocks, ChannelProtocolMetrics, ProtocolConfig, ProtocolError, SignatureError,
    StateConflict, ValidationError,
};

/// Runs the channel lifecycle for one local identity.
///
/// Generic over its collaborators so that backends can be swapped without
/// dynamic dispatch:
///
/// - `S`: channel record storage
/// - `K`: signer holding the local identity's key
/// - `A`: the on-chain arbiter
/// - `P`: transport to counterparties
pub struct ChannelProtocol<S, K, A, P> {
    identity: Address,
    store: S,
    signer: K,
    arbiter: A,
    peers: P,
    locks: ChannelLocks,
    metrics: ChannelProtocolMetrics,
    request_timeout: Duration,
    retry_attempts: u32,
    retry_initial_backoff: Duration,
    retry_max_backoff: Duration,
    min_challenge_period: u64,
}

impl<S, K, A, P> std::fmt::Debug for ChannelProtocol<S, K, A, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelProtocol")
            .field("identity", &self.identity)
            .field("min_challenge_period", &self.min_challenge_period)
            .finish_non_exhaustive()
    }
}

impl<S, K, A, P> ChannelProtocol<S, K, A, P>
where
    S: ChannelStore,
    K: ChannelSigner,
    A: ArbiterClient,
    P: PeerLink,
{
    /// Create a protocol instance acting as `identity`.
    ///
    /// Fails with [`ValidationError::UnknownIdentity`] if `signer` cannot sign
    /// for `identity`.
    pub fn new(
        identity: Address,
        store: S,
        signer: K,
        arbiter: A,
        peers: P,
        config: &impl ProtocolConfig,
    ) -> Result<Self, ProtocolError> {
        if !signer.holds(&identity) {
            return Err(ValidationError::UnknownIdentity(identity).into());
        }

        Ok(Self {
            identity,
            store,
            signer,
            arbiter,
            peers,
            locks: ChannelLocks::new(),
            metrics: ChannelProtocolMetrics::default(),
            request_timeout: config.request_timeout(),
            retry_attempts: config.arbiter_retry_attempts(),
            retry_initial_backoff: config.arbiter_retry_initial_backoff(),
            retry_max_backoff: config.arbiter_retry_max_backoff(),
            min_challenge_period: config.min_challenge_period(),
        })
    }

    /// The local party's address.
    pub fn identity(&self) -> Address {
        self.identity
    }

    /// Current local record of a channel.
    pub fn channel(&self, channel_id: &ChannelId) -> Result<Option<Channel>, ProtocolError> {
        Ok(self.store.get(channel_id)?)
    }

    /// Ids of every locally known channel, including closed ones.
    pub fn channel_ids(&self) -> Result<Vec<ChannelId>, ProtocolError> {
        Ok(self.store.channel_ids()?)
    }

    /// Verified proposals from counterparties awaiting [`accept_channel`](Self::accept_channel).
    pub fn pending_channel_proposals(&self) -> Result<Vec<ProposedChannel>, ProtocolError> {
        let mut proposals = Vec::new();
        for channel_id in self.store.channel_ids()? {
            let Some(channel) = self.store.get(&channel_id)? else {
                continue;
            };
            if channel.phase != Phase::Proposed || channel.role() != Role::One {
                continue;
            }
            if let Some(signature0) = channel.signature0.clone() {
                proposals.push(ProposedChannel {
                    params: channel.params().clone(),
                    signature0,
                });
            }
        }
        Ok(proposals)
    }

    fn require_channel(&self, channel_id: &ChannelId) -> Result<Channel, ProtocolError> {
        self.store
            .get(channel_id)?
            .ok_or_else(|| StateConflict::ChannelNotFound(*channel_id).into())
    }

    fn validate_terms(
        &self,
        address0: Address,
        address1: Address,
        challenge_period: u64,
    ) -> Result<(), ValidationError> {
        if address0 == address1 {
            return Err(ValidationError::SelfChannel(address0));
        }
        if challenge_period < self.min_challenge_period {
            return Err(ValidationError::ChallengePeriodTooShort {
                period: challenge_period,
                minimum: self.min_challenge_period,
            });
        }
        Ok(())
    }

    async fn sign(&self, fingerprint: B256) -> Result<Bytes, ProtocolError> {
        Ok(self.signer.sign(self.identity, fingerprint).await?)
    }

    /// Verify the counterparty's signature on an update against the local record.
    fn verify_counterparty(
        &self,
        channel: &Channel,
        update: &PendingUpdate,
    ) -> Result<(), SignatureError> {
        let role = channel.role().counterparty();
        let valid = update.signature(role).is_some_and(|signature| {
            verify(&update.fingerprint(), signature, &channel.counterparty_address())
        });
        if valid {
            Ok(())
        } else {
            Err(SignatureError::InvalidCounterpartySignature {
                channel_id: channel.id(),
                sequence_number: update.sequence_number,
            })
        }
    }

    /// Verify both signatures on an update against the local record.
    fn verify_dual_signed(
        &self,
        channel: &Channel,
        update: &PendingUpdate,
    ) -> Result<(), SignatureError> {
        let fingerprint = update.fingerprint();
        let valid = [Role::Zero, Role::One].into_iter().all(|role| {
            update.signature(role).is_some_and(|signature| {
                verify(&fingerprint, signature, &channel.params().address(role))
            })
        });
        if valid {
            Ok(())
        } else {
            Err(SignatureError::SignatureMismatch {
                channel_id: channel.id(),
                sequence_number: update.sequence_number,
            })
        }
    }

    /// Record a failed inbound signature check.
    fn suspect_fraud(&self, from: Address, err: SignatureError) -> ProtocolError {
        self.metrics.fraud_suspected_total.increment(1);
        warn!(%from, error = %err, "rejected inbound message with invalid signature");
        err.into()
    }

    /// Send a message to a counterparty, bounded by the request timeout.
    async fn send(&self, recipient: Address, message: PeerMessage) -> Result<(), ProtocolError> {
        let kind = message.kind();
        let channel_id = message.channel_id();
        match tokio::time::timeout(self.request_timeout, self.peers.send(recipient, message)).await
        {
            Ok(Ok(())) => {
                debug!(%channel_id, %recipient, kind, "sent peer message");
                Ok(())
            }
            Ok(Err(err)) => {
                warn!(%channel_id, %recipient, kind, %err, "failed to send peer message");
                Err(err.into())
            }
            Err(_) => {
                warn!(%channel_id, %recipient, kind, "peer message timed out");
                Err(PeerLinkError::Transport(format!(
                    "{kind} to {recipient} timed out after {:?}",
                    self.request_timeout
                ))
                .into())
            }
        }
    }

    /// Call the arbiter, retrying transient failures with capped exponential
    /// backoff. Each attempt is bounded by the request timeout.
    async fn call_arbiter<T, F, Fut>(
        &self,
        operation: &'static str,
        mut call: F,
    ) -> Result<T, ArbiterError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ArbiterError>>,
    {
        let mut backoff = Backoff::new(
            self.retry_attempts,
            self.retry_initial_backoff,
            self.retry_max_backoff,
        );

        loop {
            let result = match tokio::time::timeout(self.request_timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(ArbiterError::Unavailable(format!(
                    "{operation} timed out after {:?}",
                    self.request_timeout
                ))),
            };

            match result {
                Err(err) if err.is_transient() => {
                    let Some(delay) = backoff.next_delay() else {
                        warn!(operation, %err, "arbiter unavailable, giving up");
                        return Err(err);
                    };
                    self.metrics.arbiter_retries_total.increment(1);
                    debug!(operation, %err, ?delay, "arbiter unavailable, retrying");
                    tokio::time::sleep(delay).await;
                }
                result => return result,
            }
        }
    }
}

/// Move a local record forward to match the arbiter's.
///
/// Returns `true` if anything changed. Never moves the phase backwards.
fn apply_arbiter_record(channel: &mut Channel, record: &ArbiterChannel) -> bool {
    let before = (
        channel.phase,
        channel.closing_block,
        channel.onchain_sequence,
        channel.sequence_number,
    );

    channel.advance_phase(record.phase);
    if record.closing_block.is_some() {
        channel.closing_block = record.closing_block;
    }
    if record.sequence_number > channel.sequence_number {
        // The arbiter holds a dual-signed state newer than ours; it is authoritative.
        channel.sequence_number = record.sequence_number;
        channel.state = record.state.clone();
        channel.updates.prune_proposals(record.sequence_number);
    }
    channel.record_onchain_sequence(record.sequence_number);

    before
        != (
            channel.phase,
            channel.closing_block,
            channel.onchain_sequence,
            channel.sequence_number,
        )
}
