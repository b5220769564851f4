//! Dispatch of inbound peer messages.

use duet_channel_api::{ArbiterClient, PeerLink, PeerMessage};
use duet_channel_signer::ChannelSigner;
use duet_storage::ChannelStore;
use tracing::trace;

use super::ChannelProtocol;
use crate::{ProtocolError, ValidationError};

impl<S, K, A, P> ChannelProtocol<S, K, A, P>
where
    S: ChannelStore,
    K: ChannelSigner,
    A: ArbiterClient,
    P: PeerLink,
{
    /// Route an inbound message to its handler.
    ///
    /// Proposals are only verified and queued; accepting them is always an
    /// explicit local decision.
    pub async fn handle_message(&self, message: PeerMessage) -> Result<(), ProtocolError> {
        trace!(channel_id = %message.channel_id(), kind = message.kind(), "handling peer message");
        match message {
            PeerMessage::ProposedChannel(proposal) => self.receive_proposed_channel(proposal).await,
            PeerMessage::AcceptedChannel(accepted) => {
                self.receive_accepted_channel(accepted).await.map(drop)
            }
            PeerMessage::ProposedUpdate(update) => self.receive_proposed_update(update).await,
            PeerMessage::AcceptedUpdate(update) => self.receive_accepted_update(update).await,
        }
    }

    /// Decode a JSON wire message and handle it.
    pub async fn handle_raw_message(&self, json: &str) -> Result<(), ProtocolError> {
        let message = PeerMessage::from_json(json)
            .map_err(|err| ValidationError::MalformedField(err.to_string()))?;
        self.handle_message(message).await
    }
}
