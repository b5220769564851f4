//! Arbiter and transport errors.
//!
//! Rejections carry the arbiter's verdict verbatim; the protocol surfaces
//! them to callers without reinterpretation.

use duet_channel_primitives::{Address, ChannelId, Phase};

/// A semantic refusal by the arbiter. Never worth retrying.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("channel {0} already exists")]
    DuplicateChannelId(ChannelId),

    #[error("signature0 does not verify against address0")]
    InvalidSignature0,

    #[error("signature1 does not verify against address1")]
    InvalidSignature1,

    #[error("sequence number {submitted} does not exceed recorded {recorded}")]
    StaleSequenceNumber { submitted: u64, recorded: u64 },

    #[error("channel {0} not found")]
    ChannelNotFound(ChannelId),

    #[error("operation not allowed while the channel is {phase}")]
    WrongPhase { phase: Phase },

    #[error("signature does not verify against the claimed signer")]
    InvalidSignature,

    #[error("{0} is not a participant of the channel")]
    NotParticipant(Address),
}

/// Errors returned by an [`ArbiterClient`](crate::ArbiterClient).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArbiterError {
    /// The arbiter processed and refused the submission.
    #[error("arbiter rejected submission: {0}")]
    Rejected(#[from] Rejection),

    /// The arbiter could not be reached or did not answer in time.
    #[error("arbiter unavailable: {0}")]
    Unavailable(String),
}

impl ArbiterError {
    /// Whether the same submission may succeed if tried again.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    /// The arbiter's verdict, if this is a rejection.
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Rejected(rejection) => Some(rejection),
            Self::Unavailable(_) => None,
        }
    }
}

/// Errors returned by a [`PeerLink`](crate::PeerLink).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PeerLinkError {
    /// No route to the recipient.
    #[error("peer {0} is unreachable")]
    Unreachable(Address),

    /// The recipient received the message and refused it.
    #[error("peer {peer} refused message: {reason}")]
    Refused { peer: Address, reason: String },

    /// The transport failed underneath the message.
    #[error("transport error: {0}")]
    Transport(String),
}

impl PeerLinkError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unreachable(_) | Self::Transport(_))
    }
}
