//! Duet channel protocol.
//!
//! [`ChannelProtocol`] drives a channel through its lifecycle for one local
//! identity: proposing and accepting channels, exchanging dual-signed state
//! updates, posting them to the arbiter and unilaterally exiting through a
//! challenge period. It is generic over its collaborators:
//!
//! - [`ChannelStore`](duet_storage::ChannelStore) for channel records
//! - [`ChannelSigner`](duet_channel_signer::ChannelSigner) for the local key
//! - [`ArbiterClient`](duet_channel_api::ArbiterClient) for the on-chain arbiter
//! - [`PeerLink`](duet_channel_api::PeerLink) for the counterparty transport
//!
//! Inbound messages reach the protocol either directly through
//! [`ChannelProtocol::handle_message`] or through an [`InboundService`]
//! spawned behind an [`InboundHandle`].

mod args;
mod backoff;
mod config;
mod constants;
mod error;
mod handle;
mod locks;
mod metrics;
mod protocol;
mod service;

pub use args::{ConfigError, ProtocolArgs};
pub use backoff::Backoff;
pub use config::{DefaultProtocolConfig, ProtocolConfig};
pub use error::{InboundError, ProtocolError, SignatureError, StateConflict, ValidationError};
pub use handle::InboundHandle;
pub use locks::{ChannelGuard, ChannelLocks};
pub use metrics::ChannelProtocolMetrics;
pub use protocol::{ChannelProposalRequest, ChannelProtocol};
pub use service::{InboundCommand, InboundService};
