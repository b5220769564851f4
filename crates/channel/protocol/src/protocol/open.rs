//! Proposing, accepting and abandoning channels.

use duet_channel_api::{ArbiterClient, OpenChannelRequest, PeerLink, PeerMessage};
use duet_channel_primitives::{
    AcceptedChannel, Address, Bytes, Channel, ChannelId, ChannelParams, Phase, ProposedChannel,
    Role,
};
use duet_channel_signer::{ChannelSigner, verify};
use duet_storage::ChannelStore;
use tracing::{debug, info};

use super::{ChannelProtocol, apply_arbiter_record};
use crate::{ProtocolError, SignatureError, StateConflict, ValidationError};

/// Terms for a new channel, proposed by the local party as `address0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelProposalRequest {
    pub channel_id: ChannelId,
    pub counterparty: Address,
    pub state: Bytes,
    /// Challenge period in blocks.
    pub challenge_period: u64,
}

impl ChannelProposalRequest {
    /// Proposal under a fresh random channel id.
    pub fn new(counterparty: Address, state: Bytes, challenge_period: u64) -> Self {
        Self {
            channel_id: ChannelId::random(),
            counterparty,
            state,
            challenge_period,
        }
    }
}

impl<S, K, A, P> ChannelProtocol<S, K, A, P>
where
    S: ChannelStore,
    K: ChannelSigner,
    A: ArbiterClient,
    P: PeerLink,
{
    /// Propose a channel to `request.counterparty`.
    ///
    /// Signs the opening terms as `address0`, records the channel as
    /// `Proposed` and sends the proposal. A colliding channel id is rejected
    /// and the existing record left untouched.
    pub async fn propose_channel(
        &self,
        request: ChannelProposalRequest,
    ) -> Result<ProposedChannel, ProtocolError> {
        let params = ChannelParams {
            channel_id: request.channel_id,
            address0: self.identity,
            address1: request.counterparty,
            state: request.state,
            challenge_period: request.challenge_period,
        };
        self.validate_terms(params.address0, params.address1, params.challenge_period)?;

        let proposal = {
            let _guard = self.locks.lock(params.channel_id).await;
            if self.store.contains(&params.channel_id)? {
                return Err(StateConflict::DuplicateChannelId(params.channel_id).into());
            }

            let signature0 = self.sign(params.fingerprint()).await?;
            let mut channel = Channel::new(params.clone(), Role::Zero);
            channel.signature0 = Some(signature0.clone());
            self.store.put(&channel)?;

            ProposedChannel { params, signature0 }
        };

        self.metrics.proposed_total.increment(1);
        info!(
            channel_id = %proposal.params.channel_id,
            counterparty = %proposal.params.address1,
            challenge_period = proposal.params.challenge_period,
            "proposed channel"
        );

        self.send(
            proposal.params.address1,
            PeerMessage::ProposedChannel(proposal.clone()),
        )
        .await?;
        Ok(proposal)
    }

    /// Verify an inbound proposal and queue it for acceptance.
    ///
    /// Identical redeliveries are no-ops. A different proposal under an id
    /// already in use is rejected.
    pub async fn receive_proposed_channel(
        &self,
        proposal: ProposedChannel,
    ) -> Result<(), ProtocolError> {
        self.verify_proposal(&proposal)?;
        let params = &proposal.params;

        let _guard = self.locks.lock(params.channel_id).await;
        if let Some(existing) = self.store.get(&params.channel_id)? {
            if existing.role() == Role::One && existing.params() == params {
                debug!(channel_id = %params.channel_id, "ignoring redelivered proposal");
                return Ok(());
            }
            return Err(StateConflict::DuplicateChannelId(params.channel_id).into());
        }

        let mut channel = Channel::new(params.clone(), Role::One);
        channel.signature0 = Some(proposal.signature0.clone());
        self.store.put(&channel)?;

        info!(
            channel_id = %params.channel_id,
            proposer = %params.address0,
            challenge_period = params.challenge_period,
            "received channel proposal"
        );
        Ok(())
    }

    /// Countersign a proposal and open the channel with the arbiter.
    ///
    /// On success the channel is `Open` locally and the dual-signed terms are
    /// sent back to the proposer. If that delivery fails the channel stays
    /// open and the error is returned; the proposer converges through
    /// [`sync_channel`](Self::sync_channel).
    pub async fn accept_channel(
        &self,
        proposal: ProposedChannel,
    ) -> Result<AcceptedChannel, ProtocolError> {
        self.verify_proposal(&proposal)?;
        let params = proposal.params.clone();
        let channel_id = params.channel_id;

        let accepted = {
            let _guard = self.locks.lock(channel_id).await;
            let mut channel = match self.store.get(&channel_id)? {
                None => Channel::new(params.clone(), Role::One),
                Some(existing)
                    if existing.phase == Phase::Proposed
                        && existing.role() == Role::One
                        && existing.params() == &params =>
                {
                    existing
                }
                Some(_) => return Err(StateConflict::DuplicateChannelId(channel_id).into()),
            };

            let signature1 = self.sign(params.fingerprint()).await?;
            channel.signature0 = Some(proposal.signature0.clone());
            channel.signature1 = Some(signature1.clone());
            self.store.put(&channel)?;

            AcceptedChannel {
                params,
                signature0: proposal.signature0,
                signature1,
            }
        };

        let request = OpenChannelRequest::from(accepted.clone());
        self.call_arbiter("open", || self.arbiter.open(request.clone()))
            .await?;

        {
            let _guard = self.locks.lock(channel_id).await;
            let mut channel = self.require_channel(&channel_id)?;
            if channel.advance_phase(Phase::Open) {
                self.store.put(&channel)?;
            }
        }

        self.metrics.opened_total.increment(1);
        info!(%channel_id, proposer = %accepted.params.address0, "opened channel");

        self.send(
            accepted.params.address0,
            PeerMessage::AcceptedChannel(accepted.clone()),
        )
        .await?;
        Ok(accepted)
    }

    /// Handle the counterparty's acceptance of our proposal.
    ///
    /// Stores `signature1`, then reconciles with the arbiter. Returns the
    /// resulting local phase: `Open` once the arbiter shows the channel with
    /// the same terms, otherwise still `Proposed`.
    pub async fn receive_accepted_channel(
        &self,
        accepted: AcceptedChannel,
    ) -> Result<Phase, ProtocolError> {
        let params = &accepted.params;
        let channel_id = params.channel_id;
        let fingerprint = params.fingerprint();
        if !verify(&fingerprint, &accepted.signature0, &params.address0) {
            return Err(self.suspect_fraud(
                params.address1,
                SignatureError::InvalidSignature0(channel_id),
            ));
        }
        if !verify(&fingerprint, &accepted.signature1, &params.address1) {
            return Err(self.suspect_fraud(
                params.address1,
                SignatureError::InvalidSignature1(channel_id),
            ));
        }

        {
            let _guard = self.locks.lock(channel_id).await;
            let mut channel = self.require_channel(&channel_id)?;
            if channel.role() != Role::Zero || channel.params() != params {
                return Err(ValidationError::ChannelMismatch(channel_id).into());
            }
            match channel.phase {
                Phase::Proposed => {
                    channel.signature1 = Some(accepted.signature1.clone());
                    self.store.put(&channel)?;
                }
                phase => {
                    debug!(%channel_id, %phase, "ignoring acceptance of settled proposal");
                    return Ok(phase);
                }
            }
        }

        let record = self
            .call_arbiter("get_channel", || self.arbiter.get_channel(channel_id))
            .await?;

        let _guard = self.locks.lock(channel_id).await;
        let mut channel = self.require_channel(&channel_id)?;
        match record {
            Some(record) if record.matches(channel.params()) => {
                let was_proposed = channel.phase == Phase::Proposed;
                if apply_arbiter_record(&mut channel, &record) {
                    self.store.put(&channel)?;
                }
                if was_proposed && channel.phase >= Phase::Open {
                    self.metrics.opened_total.increment(1);
                    info!(%channel_id, counterparty = %params.address1, "opened channel");
                }
            }
            Some(_) => return Err(ValidationError::ChannelMismatch(channel_id).into()),
            None => debug!(%channel_id, "acceptance not yet visible to arbiter"),
        }
        Ok(channel.phase)
    }

    /// Abandon a proposal that never opened. The id stays reserved.
    pub async fn abandon_channel_proposal(&self, channel_id: ChannelId) -> Result<(), ProtocolError> {
        let _guard = self.locks.lock(channel_id).await;
        let mut channel = self.require_channel(&channel_id)?;
        if channel.phase != Phase::Proposed {
            return Err(StateConflict::WrongPhase {
                channel_id,
                phase: channel.phase,
            }
            .into());
        }

        channel.advance_phase(Phase::Closed);
        self.store.put(&channel)?;
        info!(%channel_id, role = ?channel.role(), "abandoned channel proposal");
        Ok(())
    }

    /// Checks shared by inbound proposals and their acceptance.
    fn verify_proposal(&self, proposal: &ProposedChannel) -> Result<(), ProtocolError> {
        let params = &proposal.params;
        if !verify(&params.fingerprint(), &proposal.signature0, &params.address0) {
            return Err(self.suspect_fraud(
                params.address0,
                SignatureError::InvalidSignature0(params.channel_id),
            ));
        }
        if params.address1 != self.identity {
            return Err(ValidationError::UnknownIdentity(params.address1).into());
        }
        self.validate_terms(params.address0, params.address1, params.challenge_period)?;
        Ok(())
    }
}
