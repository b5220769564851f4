//! Messages exchanged between counterparties.

use alloy_primitives::Bytes;
use serde::{Deserialize, Serialize};

use crate::{ChannelId, ChannelParams, PendingUpdate};

/// Opening terms signed by the proposer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposedChannel {
    #[serde(flatten)]
    pub params: ChannelParams,
    pub signature0: Bytes,
}

/// Opening terms signed by both participants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedChannel {
    #[serde(flatten)]
    pub params: ChannelParams,
    pub signature0: Bytes,
    pub signature1: Bytes,
}

impl AcceptedChannel {
    /// The proposal this acceptance answers.
    pub fn proposal(&self) -> ProposedChannel {
        ProposedChannel {
            params: self.params.clone(),
            signature0: self.signature0.clone(),
        }
    }
}

/// A message delivered over a peer link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, strum::IntoStaticStr)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum PeerMessage {
    ProposedChannel(ProposedChannel),
    AcceptedChannel(AcceptedChannel),
    ProposedUpdate(PendingUpdate),
    AcceptedUpdate(PendingUpdate),
}

impl PeerMessage {
    /// Channel the message refers to.
    pub fn channel_id(&self) -> ChannelId {
        match self {
            Self::ProposedChannel(m) => m.params.channel_id,
            Self::AcceptedChannel(m) => m.params.channel_id,
            Self::ProposedUpdate(u) | Self::AcceptedUpdate(u) => u.channel_id,
        }
    }

    /// Message kind, as it appears in the `type` field on the wire.
    pub fn kind(&self) -> &'static str {
        self.into()
    }

    pub fn to_json(&self) -> Result<String, MessageError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, MessageError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Errors decoding a [`PeerMessage`].
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("malformed peer message: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Address;
    use assert_matches::assert_matches;

    fn params() -> ChannelParams {
        ChannelParams {
            channel_id: ChannelId::with_last_byte(1),
            address0: Address::repeat_byte(0xaa),
            address1: Address::repeat_byte(0xbb),
            state: Bytes::from_static(&[0x11, 0x11]),
            challenge_period: 1,
        }
    }

    #[test]
    fn proposed_channel_wire_shape() {
        let message = PeerMessage::ProposedChannel(ProposedChannel {
            params: params(),
            signature0: Bytes::from_static(&[0xde, 0xad]),
        });
        let value: serde_json::Value = serde_json::from_str(&message.to_json().unwrap()).unwrap();

        assert_eq!(value["type"], "proposedChannel");
        let payload = &value["payload"];
        assert_eq!(payload["challengePeriod"], 1);
        assert_eq!(payload["state"], "0x1111");
        assert_eq!(payload["signature0"], "0xdead");
        assert!(payload["address0"].is_string());
    }

    #[test]
    fn decodes_what_it_encodes() {
        let update = PendingUpdate::new(params().channel_id, 3, Bytes::from_static(b"abc"))
            .with_signature(crate::Role::Zero, Bytes::from_static(&[1; 65]));
        let message = PeerMessage::AcceptedUpdate(update);
        let decoded = PeerMessage::from_json(&message.to_json().unwrap()).unwrap();
        assert_eq!(decoded, message);
        assert_eq!(decoded.kind(), "acceptedUpdate");
        assert_eq!(decoded.channel_id(), ChannelId::with_last_byte(1));
    }

    #[test]
    fn rejects_unknown_kind() {
        let err = PeerMessage::from_json(r#"{"type":"closeChannel","payload":{}}"#).unwrap_err();
        assert_matches!(err, MessageError::Json(_));
    }

    #[test]
    fn accepted_channel_carries_proposal() {
        let accepted = AcceptedChannel {
            params: params(),
            signature0: Bytes::from_static(&[0]),
            signature1: Bytes::from_static(&[1]),
        };
        let proposal = accepted.proposal();
        assert_eq!(proposal.params, accepted.params);
        assert_eq!(proposal.signature0, accepted.signature0);
    }
}
