//! Cloneable handle for delivering messages to the inbound service.

use duet_channel_api::PeerMessage;
use duet_channel_primitives::ChannelId;
use tokio::sync::{mpsc, oneshot};

use crate::{InboundError, ProtocolError, ValidationError, service::InboundCommand};

/// Cloneable handle for handing peer messages to the inbound service.
#[derive(Debug, Clone)]
pub struct InboundHandle {
    command_tx: mpsc::UnboundedSender<InboundCommand>,
}

impl InboundHandle {
    /// Create a new handle from a command sender.
    pub fn new(command_tx: mpsc::UnboundedSender<InboundCommand>) -> Self {
        Self { command_tx }
    }

    /// Deliver a message and wait for it to be handled.
    pub async fn deliver(&self, message: PeerMessage) -> Result<(), InboundError> {
        let (tx, rx) = oneshot::channel();

        self.command_tx
            .send(InboundCommand::Deliver {
                message,
                response_tx: tx,
            })
            .map_err(|_| InboundError::ServiceStopped)?;

        Ok(rx.await.map_err(|_| InboundError::ServiceStopped)??)
    }

    /// Decode a JSON wire message and deliver it.
    ///
    /// Returns the channel the message concerned.
    pub async fn deliver_raw(&self, json: &str) -> Result<ChannelId, InboundError> {
        let message = PeerMessage::from_json(json).map_err(|err| {
            ProtocolError::from(ValidationError::MalformedField(err.to_string()))
        })?;
        let channel_id = message.channel_id();
        self.deliver(message).await?;
        Ok(channel_id)
    }

    /// Whether the service has stopped.
    pub fn is_closed(&self) -> bool {
        self.command_tx.is_closed()
    }
}
