//! Protocol errors.
//!
//! Every failure is scoped to one channel and returned to the caller; none is
//! fatal to the process.

use duet_channel_api::{ArbiterError, PeerLinkError};
use duet_channel_primitives::{Address, ChannelId, Phase};
use duet_channel_signer::SignerError;
use duet_storage::StoreError;

/// Input rejected before any state was read.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// A wire message could not be decoded.
    #[error("malformed message: {0}")]
    MalformedField(String),

    #[error("challenge period {period} is below the minimum of {minimum} blocks")]
    ChallengePeriodTooShort { period: u64, minimum: u64 },

    #[error("both participants are {0}")]
    SelfChannel(Address),

    /// The local party does not hold the identity the message is addressed to.
    #[error("identity {0} is not held locally")]
    UnknownIdentity(Address),

    /// The message or arbiter record disagrees with the stored opening terms.
    #[error("terms of channel {0} do not match the local record")]
    ChannelMismatch(ChannelId),
}

/// A signature failed to verify. Inbound occurrences may indicate fraud.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("signature0 on channel {0} does not verify against address0")]
    InvalidSignature0(ChannelId),

    #[error("signature1 on channel {0} does not verify against address1")]
    InvalidSignature1(ChannelId),

    #[error("counterparty signature on channel {channel_id} update {sequence_number} is invalid")]
    InvalidCounterpartySignature {
        channel_id: ChannelId,
        sequence_number: u64,
    },

    /// A supposedly dual-signed update does not carry two valid signatures.
    #[error("update {sequence_number} on channel {channel_id} is not validly dual-signed")]
    SignatureMismatch {
        channel_id: ChannelId,
        sequence_number: u64,
    },
}

/// The request is well-formed but conflicts with the channel's state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateConflict {
    #[error("channel {0} already exists")]
    DuplicateChannelId(ChannelId),

    #[error("channel {0} not found")]
    ChannelNotFound(ChannelId),

    #[error("channel {channel_id} is {phase}")]
    WrongPhase { channel_id: ChannelId, phase: Phase },

    #[error("channel {channel_id} expects sequence number {expected}, got {actual}")]
    StaleSequenceNumber {
        channel_id: ChannelId,
        expected: u64,
        actual: u64,
    },

    #[error("update {sequence_number} on channel {channel_id} is already proposed")]
    ProposalOutstanding {
        channel_id: ChannelId,
        sequence_number: u64,
    },

    #[error("no pending update {sequence_number} on channel {channel_id}")]
    UpdateNotFound {
        channel_id: ChannelId,
        sequence_number: u64,
    },

    /// The counterparty accepted terms other than the ones we proposed.
    #[error("update {sequence_number} on channel {channel_id} differs from our proposal")]
    UpdateMismatch {
        channel_id: ChannelId,
        sequence_number: u64,
    },
}

/// Errors returned by [`ChannelProtocol`](crate::ChannelProtocol) operations.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Signature(#[from] SignatureError),

    #[error(transparent)]
    Conflict(#[from] StateConflict),

    /// Passed through from the arbiter verbatim.
    #[error(transparent)]
    Arbiter(#[from] ArbiterError),

    #[error(transparent)]
    Peer(#[from] PeerLinkError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Signer(#[from] SignerError),
}

impl ProtocolError {
    /// Whether repeating the operation unchanged may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Arbiter(e) => e.is_transient(),
            Self::Peer(e) => e.is_transient(),
            _ => false,
        }
    }

    /// Whether the error is a failed signature check.
    pub fn is_fraud_suspect(&self) -> bool {
        matches!(self, Self::Signature(_))
    }

    /// The state conflict, if this is one.
    pub fn conflict(&self) -> Option<&StateConflict> {
        match self {
            Self::Conflict(conflict) => Some(conflict),
            _ => None,
        }
    }
}

/// Errors from delivering a message through an [`InboundHandle`](crate::InboundHandle).
#[derive(Debug, thiserror::Error)]
pub enum InboundError {
    #[error("inbound service stopped")]
    ServiceStopped,

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
