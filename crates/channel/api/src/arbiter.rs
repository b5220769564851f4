use async_trait::async_trait;
use duet_channel_primitives::{
    AcceptedChannel, Address, Bytes, ChannelId, ChannelParams, PendingUpdate, Phase,
};
use serde::{Deserialize, Serialize};

use crate::ArbiterError;

/// Dual-signed opening terms submitted to the arbiter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenChannelRequest {
    #[serde(flatten)]
    pub params: ChannelParams,
    pub signature0: Bytes,
    pub signature1: Bytes,
}

impl From<AcceptedChannel> for OpenChannelRequest {
    fn from(accepted: AcceptedChannel) -> Self {
        Self {
            params: accepted.params,
            signature0: accepted.signature0,
            signature1: accepted.signature1,
        }
    }
}

/// Dual-signed state update submitted to the arbiter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStateRequest {
    pub channel_id: ChannelId,
    pub sequence_number: u64,
    pub state: Bytes,
    pub signature0: Bytes,
    pub signature1: Bytes,
}

impl UpdateStateRequest {
    /// Build a submission from an update; `None` unless both signatures are present.
    pub fn from_update(update: &PendingUpdate) -> Option<Self> {
        Some(Self {
            channel_id: update.channel_id,
            sequence_number: update.sequence_number,
            state: update.state.clone(),
            signature0: update.signature0.clone()?,
            signature1: update.signature1.clone()?,
        })
    }
}

/// The arbiter's authoritative record of a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArbiterChannel {
    pub channel_id: ChannelId,
    pub address0: Address,
    pub address1: Address,
    pub challenge_period: u64,
    /// `Open`, `Challenging` or `Closed`.
    pub phase: Phase,
    pub sequence_number: u64,
    pub state: Bytes,
    pub closing_block: Option<u64>,
}

impl ArbiterChannel {
    /// Whether the record was opened with the same participants and terms.
    pub fn matches(&self, params: &ChannelParams) -> bool {
        self.channel_id == params.channel_id
            && self.address0 == params.address0
            && self.address1 == params.address1
            && self.challenge_period == params.challenge_period
    }

    pub fn is_participant(&self, address: &Address) -> bool {
        *address == self.address0 || *address == self.address1
    }

    /// Whether the challenge period has run out at `block`.
    pub fn challenge_expired(&self, block: u64) -> bool {
        self.closing_block.is_some_and(|closing| block > closing)
    }
}

/// The on-chain settlement contract.
///
/// Every call either takes effect or fails with an [`ArbiterError`]; a
/// [`Rejected`](ArbiterError::Rejected) submission left no trace.
#[async_trait]
#[auto_impl::auto_impl(&, Arc)]
pub trait ArbiterClient: Send + Sync {
    /// Open a channel from dual-signed terms.
    async fn open(&self, request: OpenChannelRequest) -> Result<(), ArbiterError>;

    /// Record a dual-signed update with a higher sequence number.
    ///
    /// While challenging, an accepted update rearms the closing block.
    async fn update(&self, request: UpdateStateRequest) -> Result<(), ArbiterError>;

    /// Start the challenge period on behalf of `signer`.
    async fn start_challenge_period(
        &self,
        channel_id: ChannelId,
        signer: Address,
        signature: Bytes,
    ) -> Result<(), ArbiterError>;

    /// Current record of a channel, if the arbiter knows it.
    async fn get_channel(&self, channel_id: ChannelId)
    -> Result<Option<ArbiterChannel>, ArbiterError>;

    /// Current block height.
    async fn block_number(&self) -> Result<u64, ArbiterError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_request_requires_both_signatures() {
        let id = ChannelId::with_last_byte(1);
        let update = PendingUpdate::new(id, 2, Bytes::from_static(b"s"));
        assert!(UpdateStateRequest::from_update(&update).is_none());

        let mut update = update;
        update.signature0 = Some(Bytes::from_static(&[0]));
        assert!(UpdateStateRequest::from_update(&update).is_none());

        update.signature1 = Some(Bytes::from_static(&[1]));
        let request = UpdateStateRequest::from_update(&update).unwrap();
        assert_eq!(request.sequence_number, 2);
        assert_eq!(request.signature1, Bytes::from_static(&[1]));
    }

    #[test]
    fn challenge_expiry_is_strictly_after_closing_block() {
        let record = ArbiterChannel {
            channel_id: ChannelId::with_last_byte(1),
            address0: Address::repeat_byte(1),
            address1: Address::repeat_byte(2),
            challenge_period: 5,
            phase: Phase::Challenging,
            sequence_number: 0,
            state: Bytes::new(),
            closing_block: Some(10),
        };
        assert!(!record.challenge_expired(10));
        assert!(record.challenge_expired(11));
        assert!(record.is_participant(&Address::repeat_byte(2)));
        assert!(!record.is_participant(&Address::repeat_byte(3)));
    }

    #[test]
    fn open_request_wire_shape() {
        let request = OpenChannelRequest {
            params: ChannelParams {
                channel_id: ChannelId::with_last_byte(1),
                address0: Address::repeat_byte(1),
                address1: Address::repeat_byte(2),
                state: Bytes::from_static(&[0x11]),
                challenge_period: 1,
            },
            signature0: Bytes::from_static(&[0xaa]),
            signature1: Bytes::from_static(&[0xbb]),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["challengePeriod"], 1);
        assert_eq!(value["signature1"], "0xbb");
    }
}
