//! Inbound message service actor.
//!
//! Transports hand decoded peer messages to an [`InboundHandle`]; the service
//! runs in its own tokio task and dispatches each message to the protocol on
//! a task of its own, so messages for different channels are processed in
//! parallel while the per-channel locks serialize work on any one channel.

use std::sync::Arc;

use duet_channel_api::{ArbiterClient, PeerLink, PeerMessage};
use duet_channel_signer::ChannelSigner;
use duet_storage::ChannelStore;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::{ChannelProtocol, InboundHandle, ProtocolError};

/// Commands from the handle to the service.
pub enum InboundCommand {
    /// Deliver a message received from a counterparty.
    Deliver {
        message: PeerMessage,
        /// Channel to send the result.
        response_tx: oneshot::Sender<Result<(), ProtocolError>>,
    },
}

/// Dispatches inbound peer messages to a [`ChannelProtocol`].
pub struct InboundService<S, K, A, P> {
    /// Receive commands from handles.
    command_rx: mpsc::UnboundedReceiver<InboundCommand>,
    protocol: Arc<ChannelProtocol<S, K, A, P>>,
}

impl<S, K, A, P> InboundService<S, K, A, P>
where
    S: ChannelStore + 'static,
    K: ChannelSigner + 'static,
    A: ArbiterClient + 'static,
    P: PeerLink + 'static,
{
    /// Create a new inbound service.
    pub fn new(
        command_rx: mpsc::UnboundedReceiver<InboundCommand>,
        protocol: Arc<ChannelProtocol<S, K, A, P>>,
    ) -> Self {
        Self {
            command_rx,
            protocol,
        }
    }

    /// Spawn the service on the current runtime and return a handle to it.
    ///
    /// The service stops once every handle has been dropped.
    pub fn spawn(protocol: Arc<ChannelProtocol<S, K, A, P>>) -> InboundHandle {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        tokio::spawn(Self::new(command_rx, protocol).into_task());
        InboundHandle::new(command_tx)
    }

    /// Run the service loop.
    pub async fn run(mut self) {
        while let Some(cmd) = self.command_rx.recv().await {
            self.handle_command(cmd);
        }
        debug!("inbound service shutting down");
    }

    /// Convert self into a spawnable future.
    pub async fn into_task(self) {
        self.run().await;
    }

    fn handle_command(&self, cmd: InboundCommand) {
        match cmd {
            InboundCommand::Deliver {
                message,
                response_tx,
            } => {
                let protocol = Arc::clone(&self.protocol);
                tokio::spawn(async move {
                    let channel_id = message.channel_id();
                    let kind = message.kind();
                    let result = protocol.handle_message(message).await;
                    if let Err(err) = &result {
                        warn!(%channel_id, kind, %err, "failed to handle peer message");
                    }
                    // The sender may have stopped waiting.
                    let _ = response_tx.send(result);
                });
            }
        }
    }
}
