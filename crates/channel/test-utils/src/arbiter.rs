//! In-memory arbiter.

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use duet_channel_api::{
    ArbiterChannel, ArbiterClient, ArbiterError, OpenChannelRequest, Rejection,
    UpdateStateRequest,
};
use duet_channel_primitives::{Address, Bytes, ChannelId, Phase, fingerprint};
use duet_channel_signer::verify;
use parking_lot::Mutex;

/// Number of calls the arbiter has received, per operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArbiterCalls {
    pub open: usize,
    pub update: usize,
    pub start_challenge_period: usize,
    pub get_channel: usize,
    pub block_number: usize,
}

/// An arbiter that keeps its records in memory.
///
/// Enforces the same rules as the on-chain contract: both opening signatures
/// must verify, sequence numbers only increase, only participants may start
/// a challenge, and a challenge closes the channel once the block height
/// passes the closing block. Updates accepted while challenging rearm the
/// closing block. As on chain, a lapsed challenge is only written back as
/// closed by the next transaction, so [`get_channel`](ArbiterClient::get_channel)
/// can still report it as challenging.
///
/// Failures can be injected with [`fail_next`](Self::fail_next) and
/// latency with [`set_latency`](Self::set_latency).
#[derive(Debug)]
pub struct MockArbiter {
    inner: Mutex<ArbiterState>,
}

#[derive(Debug, Default)]
struct ArbiterState {
    block: u64,
    channels: HashMap<ChannelId, ArbiterChannel>,
    fail_next: usize,
    latency: Option<Duration>,
    calls: ArbiterCalls,
}

impl ArbiterState {
    /// Close every channel whose challenge has expired.
    fn finalize_expired(&mut self) {
        let block = self.block;
        for record in self.channels.values_mut() {
            if record.phase == Phase::Challenging && record.challenge_expired(block) {
                record.phase = Phase::Closed;
            }
        }
    }

    fn take_failure(&mut self) -> Result<(), ArbiterError> {
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(ArbiterError::Unavailable("injected failure".into()));
        }
        Ok(())
    }

    fn record_mut(&mut self, channel_id: ChannelId) -> Result<&mut ArbiterChannel, Rejection> {
        self.channels
            .get_mut(&channel_id)
            .ok_or(Rejection::ChannelNotFound(channel_id))
    }
}

impl Default for MockArbiter {
    fn default() -> Self {
        Self::new()
    }
}

impl MockArbiter {
    pub fn new() -> Self {
        Self::at_block(0)
    }

    /// Arbiter whose chain starts at `block`.
    pub fn at_block(block: u64) -> Self {
        Self {
            inner: Mutex::new(ArbiterState {
                block,
                ..Default::default()
            }),
        }
    }

    /// Advance the chain, finalizing expired challenges.
    pub fn advance_blocks(&self, blocks: u64) {
        let mut state = self.inner.lock();
        state.block += blocks;
        state.finalize_expired();
    }

    /// Move the chain head to `block` without finalizing anything.
    pub fn set_block(&self, block: u64) {
        self.inner.lock().block = block;
    }

    pub fn current_block(&self) -> u64 {
        self.inner.lock().block
    }

    /// Make the next `count` calls fail with [`ArbiterError::Unavailable`].
    pub fn fail_next(&self, count: usize) {
        self.inner.lock().fail_next = count;
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.inner.lock().latency = latency;
    }

    pub fn calls(&self) -> ArbiterCalls {
        self.inner.lock().calls
    }

    /// Snapshot of a record, bypassing failure injection.
    pub fn record(&self, channel_id: &ChannelId) -> Option<ArbiterChannel> {
        let mut state = self.inner.lock();
        state.finalize_expired();
        state.channels.get(channel_id).cloned()
    }

    async fn delay(&self) {
        let latency = self.inner.lock().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl ArbiterClient for MockArbiter {
    async fn open(&self, request: OpenChannelRequest) -> Result<(), ArbiterError> {
        self.delay().await;
        let mut state = self.inner.lock();
        state.calls.open += 1;
        state.take_failure()?;

        let params = &request.params;
        if state.channels.contains_key(&params.channel_id) {
            return Err(Rejection::DuplicateChannelId(params.channel_id).into());
        }
        let fingerprint = params.fingerprint();
        if !verify(&fingerprint, &request.signature0, &params.address0) {
            return Err(Rejection::InvalidSignature0.into());
        }
        if !verify(&fingerprint, &request.signature1, &params.address1) {
            return Err(Rejection::InvalidSignature1.into());
        }

        state.channels.insert(
            params.channel_id,
            ArbiterChannel {
                channel_id: params.channel_id,
                address0: params.address0,
                address1: params.address1,
                challenge_period: params.challenge_period,
                phase: Phase::Open,
                sequence_number: 0,
                state: params.state.clone(),
                closing_block: None,
            },
        );
        Ok(())
    }

    async fn update(&self, request: UpdateStateRequest) -> Result<(), ArbiterError> {
        self.delay().await;
        let mut state = self.inner.lock();
        state.calls.update += 1;
        state.take_failure()?;
        state.finalize_expired();

        let block = state.block;
        let record = state.record_mut(request.channel_id)?;
        if !record.phase.accepts_updates() {
            return Err(Rejection::WrongPhase {
                phase: record.phase,
            }
            .into());
        }
        if request.sequence_number <= record.sequence_number {
            return Err(Rejection::StaleSequenceNumber {
                submitted: request.sequence_number,
                recorded: record.sequence_number,
            }
            .into());
        }
        let fingerprint = fingerprint::update_fingerprint(
            &request.channel_id,
            request.sequence_number,
            &request.state,
        );
        if !verify(&fingerprint, &request.signature0, &record.address0) {
            return Err(Rejection::InvalidSignature0.into());
        }
        if !verify(&fingerprint, &request.signature1, &record.address1) {
            return Err(Rejection::InvalidSignature1.into());
        }

        record.sequence_number = request.sequence_number;
        record.state = request.state;
        if record.phase == Phase::Challenging {
            record.closing_block = Some(block + record.challenge_period);
        }
        Ok(())
    }

    async fn start_challenge_period(
        &self,
        channel_id: ChannelId,
        signer: Address,
        signature: Bytes,
    ) -> Result<(), ArbiterError> {
        self.delay().await;
        let mut state = self.inner.lock();
        state.calls.start_challenge_period += 1;
        state.take_failure()?;
        state.finalize_expired();

        let block = state.block;
        let record = state.record_mut(channel_id)?;
        if !record.is_participant(&signer) {
            return Err(Rejection::NotParticipant(signer).into());
        }
        if !verify(&fingerprint::challenge_fingerprint(&channel_id), &signature, &signer) {
            return Err(Rejection::InvalidSignature.into());
        }
        if record.phase != Phase::Open {
            return Err(Rejection::WrongPhase {
                phase: record.phase,
            }
            .into());
        }

        record.phase = Phase::Challenging;
        record.closing_block = Some(block + record.challenge_period);
        Ok(())
    }

    async fn get_channel(
        &self,
        channel_id: ChannelId,
    ) -> Result<Option<ArbiterChannel>, ArbiterError> {
        self.delay().await;
        let mut state = self.inner.lock();
        state.calls.get_channel += 1;
        state.take_failure()?;
        Ok(state.channels.get(&channel_id).cloned())
    }

    async fn block_number(&self) -> Result<u64, ArbiterError> {
        self.delay().await;
        let mut state = self.inner.lock();
        state.calls.block_number += 1;
        state.take_failure()?;
        Ok(state.block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TestParty;
    use assert_matches::assert_matches;
    use duet_channel_primitives::{ChannelParams, PendingUpdate, Role};

    async fn opened(arbiter: &MockArbiter) -> (TestParty, TestParty, ChannelParams) {
        let (alice, bob) = (TestParty::random(), TestParty::random());
        let params = ChannelParams {
            channel_id: ChannelId::with_last_byte(1),
            address0: alice.address,
            address1: bob.address,
            state: Bytes::from_static(b"genesis"),
            challenge_period: 5,
        };
        let request = OpenChannelRequest {
            params: params.clone(),
            signature0: alice.sign(params.fingerprint()).await.unwrap(),
            signature1: bob.sign(params.fingerprint()).await.unwrap(),
        };
        arbiter.open(request).await.unwrap();
        (alice, bob, params)
    }

    async fn dual_signed(
        alice: &TestParty,
        bob: &TestParty,
        channel_id: ChannelId,
        sequence_number: u64,
    ) -> UpdateStateRequest {
        let update = PendingUpdate::new(channel_id, sequence_number, Bytes::from(vec![1, 2, 3]));
        let update = alice.sign_update(update, Role::Zero).await.unwrap();
        let update = bob.sign_update(update, Role::One).await.unwrap();
        UpdateStateRequest::from_update(&update).unwrap()
    }

    #[tokio::test]
    async fn open_rejects_duplicates_and_bad_signatures() {
        let arbiter = MockArbiter::new();
        let (alice, bob, params) = opened(&arbiter).await;

        let record = arbiter.record(&params.channel_id).unwrap();
        assert_eq!(record.phase, Phase::Open);
        assert_eq!(record.sequence_number, 0);

        let duplicate = OpenChannelRequest {
            params: params.clone(),
            signature0: alice.sign(params.fingerprint()).await.unwrap(),
            signature1: bob.sign(params.fingerprint()).await.unwrap(),
        };
        assert_matches!(
            arbiter.open(duplicate).await,
            Err(ArbiterError::Rejected(Rejection::DuplicateChannelId(_)))
        );

        let fresh = ChannelParams {
            channel_id: ChannelId::with_last_byte(2),
            ..params
        };
        let forged = OpenChannelRequest {
            params: fresh.clone(),
            signature0: alice.sign(fresh.fingerprint()).await.unwrap(),
            signature1: alice.sign(fresh.fingerprint()).await.unwrap(),
        };
        assert_matches!(
            arbiter.open(forged).await,
            Err(ArbiterError::Rejected(Rejection::InvalidSignature1))
        );
        assert!(arbiter.record(&fresh.channel_id).is_none());
    }

    #[tokio::test]
    async fn update_requires_higher_sequence() {
        let arbiter = MockArbiter::new();
        let (alice, bob, params) = opened(&arbiter).await;
        let id = params.channel_id;

        arbiter.update(dual_signed(&alice, &bob, id, 2).await).await.unwrap();
        assert_matches!(
            arbiter.update(dual_signed(&alice, &bob, id, 1).await).await,
            Err(ArbiterError::Rejected(Rejection::StaleSequenceNumber {
                submitted: 1,
                recorded: 2
            }))
        );
        assert_eq!(arbiter.record(&id).unwrap().sequence_number, 2);
    }

    #[tokio::test]
    async fn challenge_closes_after_period_and_updates_rearm() {
        let arbiter = MockArbiter::at_block(100);
        let (alice, bob, params) = opened(&arbiter).await;
        let id = params.channel_id;

        let stranger = TestParty::random();
        let signature = stranger.sign(fingerprint::challenge_fingerprint(&id)).await.unwrap();
        assert_matches!(
            arbiter.start_challenge_period(id, stranger.address, signature).await,
            Err(ArbiterError::Rejected(Rejection::NotParticipant(_)))
        );

        let signature = alice.sign(fingerprint::challenge_fingerprint(&id)).await.unwrap();
        arbiter
            .start_challenge_period(id, alice.address, signature)
            .await
            .unwrap();
        assert_eq!(arbiter.record(&id).unwrap().closing_block, Some(105));

        arbiter.advance_blocks(3);
        arbiter.update(dual_signed(&alice, &bob, id, 1).await).await.unwrap();
        assert_eq!(arbiter.record(&id).unwrap().closing_block, Some(108));

        arbiter.advance_blocks(5);
        assert_eq!(arbiter.record(&id).unwrap().phase, Phase::Challenging);
        arbiter.advance_blocks(1);
        assert_eq!(arbiter.record(&id).unwrap().phase, Phase::Closed);

        assert_matches!(
            arbiter.update(dual_signed(&alice, &bob, id, 2).await).await,
            Err(ArbiterError::Rejected(Rejection::WrongPhase {
                phase: Phase::Closed
            }))
        );
    }

    #[tokio::test]
    async fn lapsed_challenge_is_closed_by_next_transaction() {
        let arbiter = MockArbiter::new();
        let (alice, bob, params) = opened(&arbiter).await;
        let id = params.channel_id;

        let signature = alice.sign(fingerprint::challenge_fingerprint(&id)).await.unwrap();
        arbiter
            .start_challenge_period(id, alice.address, signature)
            .await
            .unwrap();

        arbiter.set_block(9);
        assert_eq!(arbiter.block_number().await.unwrap(), 9);
        let stored = arbiter.get_channel(id).await.unwrap().unwrap();
        assert_eq!(stored.phase, Phase::Challenging);
        assert!(stored.challenge_expired(9));

        assert_matches!(
            arbiter.update(dual_signed(&alice, &bob, id, 1).await).await,
            Err(ArbiterError::Rejected(Rejection::WrongPhase {
                phase: Phase::Closed
            }))
        );
        assert_eq!(arbiter.calls().block_number, 1);
    }

    #[tokio::test]
    async fn injected_failures_are_transient() {
        let arbiter = MockArbiter::new();
        arbiter.fail_next(2);
        let id = ChannelId::with_last_byte(9);

        assert!(arbiter.get_channel(id).await.unwrap_err().is_transient());
        assert!(arbiter.get_channel(id).await.unwrap_err().is_transient());
        assert_eq!(arbiter.get_channel(id).await.unwrap(), None);
        assert_eq!(arbiter.calls().get_channel, 3);
    }
}
