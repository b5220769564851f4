//! Off-chain state updates.
//!
//! An update moves through the proposer's `my_proposed` bucket and the
//! receiver's `their_proposed` bucket, and lands in both parties' `accepted`
//! bucket once it carries both signatures. Only the update whose sequence
//! number is exactly one past the channel's current one can be accepted.

use duet_channel_api::{ArbiterClient, PeerLink, PeerMessage};
use duet_channel_primitives::{Bytes, Channel, ChannelId, PendingUpdate, Phase, UpdateBucket};
use duet_channel_signer::ChannelSigner;
use duet_storage::ChannelStore;
use tracing::{debug, info};

use super::ChannelProtocol;
use crate::{ProtocolError, StateConflict};

impl<S, K, A, P> ChannelProtocol<S, K, A, P>
where
    S: ChannelStore,
    K: ChannelSigner,
    A: ArbiterClient,
    P: PeerLink,
{
    /// Propose `state` as the channel's next state.
    ///
    /// Only one own proposal per sequence number may be outstanding; abandon
    /// it with [`abandon_update`](Self::abandon_update) to propose another.
    pub async fn propose_update(
        &self,
        channel_id: ChannelId,
        state: Bytes,
    ) -> Result<PendingUpdate, ProtocolError> {
        let (update, counterparty) = {
            let _guard = self.locks.lock(channel_id).await;
            let mut channel = self.require_channel(&channel_id)?;
            require_phase(&channel, Phase::Open)?;

            let sequence_number = channel.next_sequence();
            if channel
                .updates
                .find(UpdateBucket::MyProposed, sequence_number)
                .is_some()
            {
                return Err(StateConflict::ProposalOutstanding {
                    channel_id,
                    sequence_number,
                }
                .into());
            }

            let mut update = PendingUpdate::new(channel_id, sequence_number, state);
            let signature = self.sign(update.fingerprint()).await?;
            update.set_signature(channel.role(), signature);

            channel.updates.my_proposed.push(update.clone());
            self.store.put(&channel)?;
            (update, channel.counterparty_address())
        };

        debug!(%channel_id, sequence = update.sequence_number, "proposed update");
        self.send(counterparty, PeerMessage::ProposedUpdate(update.clone()))
            .await?;
        Ok(update)
    }

    /// Withdraw an own proposal that has not been countersigned.
    pub async fn abandon_update(
        &self,
        channel_id: ChannelId,
        sequence_number: u64,
    ) -> Result<PendingUpdate, ProtocolError> {
        let _guard = self.locks.lock(channel_id).await;
        let mut channel = self.require_channel(&channel_id)?;
        let removed = channel
            .updates
            .remove(UpdateBucket::MyProposed, sequence_number)
            .ok_or(StateConflict::UpdateNotFound {
                channel_id,
                sequence_number,
            })?;
        self.store.put(&channel)?;

        debug!(%channel_id, sequence = sequence_number, "abandoned update");
        Ok(removed)
    }

    /// Verify an inbound proposal and queue it for a decision.
    ///
    /// Never countersigns on its own; see [`accept_update`](Self::accept_update).
    pub async fn receive_proposed_update(&self, update: PendingUpdate) -> Result<(), ProtocolError> {
        let channel_id = update.channel_id;
        let _guard = self.locks.lock(channel_id).await;
        let mut channel = self.require_channel(&channel_id)?;
        require_accepts_updates(&channel)?;

        if let Err(err) = self.verify_counterparty(&channel, &update) {
            return Err(self.suspect_fraud(channel.counterparty_address(), err));
        }
        if update.sequence_number <= channel.sequence_number {
            return Err(stale(&channel, update.sequence_number));
        }

        let sequence_number = update.sequence_number;
        let queued = channel
            .updates
            .find(UpdateBucket::TheirProposed, sequence_number)
            .map(|existing| existing.same_terms(&update));
        match queued {
            Some(true) => {
                debug!(%channel_id, sequence = sequence_number, "ignoring redelivered proposal");
                return Ok(());
            }
            Some(false) => {
                // revised proposal for the same sequence number replaces the old one
                channel
                    .updates
                    .remove(UpdateBucket::TheirProposed, sequence_number);
            }
            None => {}
        }

        channel.updates.their_proposed.push(update);
        self.store.put(&channel)?;

        debug!(%channel_id, sequence = sequence_number, "received update proposal");
        Ok(())
    }

    /// Countersign the counterparty's update, making it the channel's state.
    pub async fn accept_update(&self, update: PendingUpdate) -> Result<PendingUpdate, ProtocolError> {
        let channel_id = update.channel_id;
        let (update, counterparty) = {
            let _guard = self.locks.lock(channel_id).await;
            let mut channel = self.require_channel(&channel_id)?;
            require_accepts_updates(&channel)?;

            if let Err(err) = self.verify_counterparty(&channel, &update) {
                return Err(self.suspect_fraud(channel.counterparty_address(), err));
            }
            if update.sequence_number != channel.next_sequence() {
                return Err(stale(&channel, update.sequence_number));
            }

            let signature = self.sign(update.fingerprint()).await?;
            let mut update = update;
            update.set_signature(channel.role(), signature);

            commit(&mut channel, update.clone());
            self.store.put(&channel)?;
            (update, channel.counterparty_address())
        };

        self.metrics.updates_accepted_total.increment(1);
        info!(%channel_id, sequence = update.sequence_number, "accepted update");

        self.send(counterparty, PeerMessage::AcceptedUpdate(update.clone()))
            .await?;
        Ok(update)
    }

    /// Handle the counterparty's countersignature on one of our proposals.
    pub async fn receive_accepted_update(&self, update: PendingUpdate) -> Result<(), ProtocolError> {
        let channel_id = update.channel_id;
        let sequence_number = update.sequence_number;
        let _guard = self.locks.lock(channel_id).await;
        let mut channel = self.require_channel(&channel_id)?;
        require_accepts_updates(&channel)?;

        if let Err(err) = self.verify_dual_signed(&channel, &update) {
            return Err(self.suspect_fraud(channel.counterparty_address(), err));
        }

        let already_accepted = sequence_number <= channel.sequence_number
            && (sequence_number <= channel.onchain_sequence
                || channel
                    .updates
                    .find(UpdateBucket::Accepted, sequence_number)
                    .is_some_and(|accepted| accepted.same_terms(&update)));
        if already_accepted {
            debug!(%channel_id, sequence = sequence_number, "ignoring redelivered acceptance");
            return Ok(());
        }

        let Some(proposed) = channel.updates.find(UpdateBucket::MyProposed, sequence_number) else {
            return Err(StateConflict::UpdateNotFound {
                channel_id,
                sequence_number,
            }
            .into());
        };
        if !proposed.same_terms(&update) {
            return Err(StateConflict::UpdateMismatch {
                channel_id,
                sequence_number,
            }
            .into());
        }
        if sequence_number != channel.next_sequence() {
            return Err(stale(&channel, sequence_number));
        }

        commit(&mut channel, update);
        self.store.put(&channel)?;

        self.metrics.updates_accepted_total.increment(1);
        info!(%channel_id, sequence = sequence_number, "update accepted by counterparty");
        Ok(())
    }
}

/// Make a dual-signed update the channel's current state.
fn commit(channel: &mut Channel, update: PendingUpdate) {
    channel.sequence_number = update.sequence_number;
    channel.state = update.state.clone();
    channel.updates.prune_proposals(update.sequence_number);
    channel.updates.accepted.push(update);
}

fn require_phase(channel: &Channel, phase: Phase) -> Result<(), StateConflict> {
    if channel.phase == phase {
        Ok(())
    } else {
        Err(StateConflict::WrongPhase {
            channel_id: channel.id(),
            phase: channel.phase,
        })
    }
}

fn require_accepts_updates(channel: &Channel) -> Result<(), StateConflict> {
    if channel.phase.accepts_updates() {
        Ok(())
    } else {
        Err(StateConflict::WrongPhase {
            channel_id: channel.id(),
            phase: channel.phase,
        })
    }
}

fn stale(channel: &Channel, actual: u64) -> ProtocolError {
    StateConflict::StaleSequenceNumber {
        channel_id: channel.id(),
        expected: channel.next_sequence(),
        actual,
    }
    .into()
}
