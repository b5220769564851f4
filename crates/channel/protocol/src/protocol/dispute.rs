//! Arbiter submissions, unilateral exit and reconciliation.

use duet_channel_api::{ArbiterClient, PeerLink, UpdateStateRequest};
use duet_channel_primitives::{Channel, ChannelId, Phase, UpdateBucket, fingerprint};
use duet_channel_signer::ChannelSigner;
use duet_storage::ChannelStore;
use tracing::{debug, info, warn};

use super::{ChannelProtocol, apply_arbiter_record};
use crate::{ProtocolError, SignatureError, StateConflict, ValidationError};

impl<S, K, A, P> ChannelProtocol<S, K, A, P>
where
    S: ChannelStore,
    K: ChannelSigner,
    A: ArbiterClient,
    P: PeerLink,
{
    /// Submit an accepted update to the arbiter.
    ///
    /// On success the update and every older accepted one are dropped from
    /// the `accepted` bucket. Posting during a challenge overrides the
    /// closing state and rearms the closing block.
    pub async fn post_update(
        &self,
        channel_id: ChannelId,
        sequence_number: u64,
    ) -> Result<(), ProtocolError> {
        let request = {
            let _guard = self.locks.lock(channel_id).await;
            let channel = self.require_channel(&channel_id)?;
            if !channel.phase.accepts_updates() {
                return Err(StateConflict::WrongPhase {
                    channel_id,
                    phase: channel.phase,
                }
                .into());
            }

            let update = channel
                .updates
                .find(UpdateBucket::Accepted, sequence_number)
                .ok_or(StateConflict::UpdateNotFound {
                    channel_id,
                    sequence_number,
                })?;
            self.verify_dual_signed(&channel, update)?;
            UpdateStateRequest::from_update(update).ok_or(SignatureError::SignatureMismatch {
                channel_id,
                sequence_number,
            })?
        };

        self.call_arbiter("update", || self.arbiter.update(request.clone()))
            .await?;

        let challenging = {
            let _guard = self.locks.lock(channel_id).await;
            let mut channel = self.require_channel(&channel_id)?;
            channel.record_onchain_sequence(sequence_number);
            self.store.put(&channel)?;
            channel.phase == Phase::Challenging
        };

        self.metrics.updates_posted_total.increment(1);
        info!(%channel_id, sequence = sequence_number, "posted update to arbiter");

        if challenging {
            // The arbiter moved the closing block; pick it up.
            self.sync_channel(channel_id).await?;
        }
        Ok(())
    }

    /// Submit the highest accepted update to the arbiter.
    ///
    /// Returns the posted sequence number.
    pub async fn post_latest_update(&self, channel_id: ChannelId) -> Result<u64, ProtocolError> {
        let sequence_number = {
            let _guard = self.locks.lock(channel_id).await;
            let channel = self.require_channel(&channel_id)?;
            channel
                .updates
                .latest_accepted()
                .map(|update| update.sequence_number)
                .ok_or(StateConflict::UpdateNotFound {
                    channel_id,
                    sequence_number: channel.sequence_number,
                })?
        };

        self.post_update(channel_id, sequence_number).await?;
        Ok(sequence_number)
    }

    /// Begin a unilateral exit. Returns the block after which the arbiter
    /// permits finalization.
    pub async fn start_challenge_period(&self, channel_id: ChannelId) -> Result<u64, ProtocolError> {
        let signature = {
            let _guard = self.locks.lock(channel_id).await;
            let channel = self.require_channel(&channel_id)?;
            if channel.phase != Phase::Open {
                return Err(StateConflict::WrongPhase {
                    channel_id,
                    phase: channel.phase,
                }
                .into());
            }
            self.sign(fingerprint::challenge_fingerprint(&channel_id))
                .await?
        };

        self.call_arbiter("start_challenge_period", || {
            self.arbiter
                .start_challenge_period(channel_id, self.identity, signature.clone())
        })
        .await?;

        let record = self
            .call_arbiter("get_channel", || self.arbiter.get_channel(channel_id))
            .await?
            .ok_or(StateConflict::ChannelNotFound(channel_id))?;

        let closing_block = record.closing_block.ok_or(StateConflict::WrongPhase {
            channel_id,
            phase: record.phase,
        })?;

        {
            let _guard = self.locks.lock(channel_id).await;
            let mut channel = self.require_channel(&channel_id)?;
            channel.advance_phase(Phase::Challenging);
            apply_arbiter_record(&mut channel, &record);
            self.store.put(&channel)?;
        }

        self.metrics.challenges_started_total.increment(1);
        info!(%channel_id, closing_block, "started challenge period");
        Ok(closing_block)
    }

    /// Bring the local record in line with the arbiter's.
    ///
    /// Moves the phase forward (never back), refreshes the closing block and
    /// the on-chain sequence number, and drops accepted updates the arbiter
    /// already holds. Returns the reconciled record.
    pub async fn sync_channel(&self, channel_id: ChannelId) -> Result<Channel, ProtocolError> {
        let mut record = self
            .call_arbiter("get_channel", || self.arbiter.get_channel(channel_id))
            .await?;

        // A lapsed challenge stays stored as challenging until the next
        // transaction on the arbiter; it is final either way.
        if let Some(record) = record.as_mut().filter(|r| r.phase == Phase::Challenging) {
            let block = self
                .call_arbiter("block_number", || self.arbiter.block_number())
                .await?;
            if record.challenge_expired(block) {
                debug!(
                    %channel_id,
                    block,
                    closing_block = ?record.closing_block,
                    "challenge period lapsed"
                );
                record.phase = Phase::Closed;
            }
        }

        let _guard = self.locks.lock(channel_id).await;
        let mut channel = self.require_channel(&channel_id)?;
        let Some(record) = record else {
            debug!(%channel_id, phase = %channel.phase, "channel unknown to arbiter");
            return Ok(channel);
        };
        if !record.matches(channel.params()) {
            return Err(ValidationError::ChannelMismatch(channel_id).into());
        }

        let phase = channel.phase;
        if apply_arbiter_record(&mut channel, &record) {
            self.store.put(&channel)?;
            if phase == Phase::Proposed && channel.phase >= Phase::Open {
                self.metrics.opened_total.increment(1);
            }
            info!(
                %channel_id,
                from = %phase,
                to = %channel.phase,
                onchain_sequence = channel.onchain_sequence,
                closing_block = ?channel.closing_block,
                "synced channel with arbiter"
            );
        }
        Ok(channel)
    }

    /// Answer a challenge with a newer dual-signed state, if we hold one.
    ///
    /// Returns the sequence number posted, or `None` when the channel is not
    /// challenging or the arbiter already holds our latest state.
    pub async fn respond_to_challenge(
        &self,
        channel_id: ChannelId,
    ) -> Result<Option<u64>, ProtocolError> {
        let channel = self.sync_channel(channel_id).await?;
        if channel.phase != Phase::Challenging {
            return Ok(None);
        }

        // Syncing pruned everything the arbiter already holds.
        let Some(latest) = channel.updates.latest_accepted() else {
            debug!(%channel_id, "arbiter holds our latest state");
            return Ok(None);
        };
        let sequence_number = latest.sequence_number;

        warn!(
            %channel_id,
            onchain_sequence = channel.onchain_sequence,
            sequence = sequence_number,
            "challenge closing on stale state, posting newer update"
        );
        self.post_update(channel_id, sequence_number).await?;
        Ok(Some(sequence_number))
    }
}
