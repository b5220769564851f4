//! Pending state updates and their per-channel buckets.

use alloy_primitives::{B256, Bytes};
use serde::{Deserialize, Serialize};

use crate::fingerprint::update_fingerprint;
use crate::{ChannelId, Role};

/// A candidate state transition that may carry zero, one or two signatures.
///
/// Signature slots are positional (`signature0` belongs to `address0`), which
/// is also the wire shape; use [`PendingUpdate::signature`] with a [`Role`]
/// rather than picking a slot by hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingUpdate {
    pub channel_id: ChannelId,
    pub sequence_number: u64,
    pub state: Bytes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature0: Option<Bytes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature1: Option<Bytes>,
}

impl PendingUpdate {
    /// Create an unsigned update.
    pub fn new(channel_id: ChannelId, sequence_number: u64, state: Bytes) -> Self {
        Self {
            channel_id,
            sequence_number,
            state,
            signature0: None,
            signature1: None,
        }
    }

    /// Fingerprint both signatures must cover.
    pub fn fingerprint(&self) -> B256 {
        update_fingerprint(&self.channel_id, self.sequence_number, &self.state)
    }

    /// Signature of the participant holding `role`.
    pub fn signature(&self, role: Role) -> Option<&Bytes> {
        match role {
            Role::Zero => self.signature0.as_ref(),
            Role::One => self.signature1.as_ref(),
        }
    }

    /// Store the signature of the participant holding `role`.
    pub fn set_signature(&mut self, role: Role, signature: Bytes) {
        match role {
            Role::Zero => self.signature0 = Some(signature),
            Role::One => self.signature1 = Some(signature),
        }
    }

    /// Builder-style [`set_signature`](Self::set_signature).
    pub fn with_signature(mut self, role: Role, signature: Bytes) -> Self {
        self.set_signature(role, signature);
        self
    }

    /// Both signature slots are filled (not necessarily valid).
    pub fn is_dual_signed(&self) -> bool {
        self.signature0.is_some() && self.signature1.is_some()
    }

    /// Same channel, sequence number and state, ignoring signatures.
    pub fn same_terms(&self, other: &PendingUpdate) -> bool {
        self.channel_id == other.channel_id
            && self.sequence_number == other.sequence_number
            && self.state == other.state
    }
}

/// Which bucket an update sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum UpdateBucket {
    /// Proposed by us, waiting for the counterparty's signature.
    MyProposed,
    /// Proposed by the counterparty, waiting for our decision.
    TheirProposed,
    /// Dual-signed and ready to post to the arbiter.
    Accepted,
}

/// The three disjoint pending-update buckets of a channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateBuckets {
    pub my_proposed: Vec<PendingUpdate>,
    pub their_proposed: Vec<PendingUpdate>,
    pub accepted: Vec<PendingUpdate>,
}

impl UpdateBuckets {
    pub fn bucket(&self, bucket: UpdateBucket) -> &Vec<PendingUpdate> {
        match bucket {
            UpdateBucket::MyProposed => &self.my_proposed,
            UpdateBucket::TheirProposed => &self.their_proposed,
            UpdateBucket::Accepted => &self.accepted,
        }
    }

    pub fn bucket_mut(&mut self, bucket: UpdateBucket) -> &mut Vec<PendingUpdate> {
        match bucket {
            UpdateBucket::MyProposed => &mut self.my_proposed,
            UpdateBucket::TheirProposed => &mut self.their_proposed,
            UpdateBucket::Accepted => &mut self.accepted,
        }
    }

    /// Find the update with `sequence_number` in `bucket`.
    pub fn find(&self, bucket: UpdateBucket, sequence_number: u64) -> Option<&PendingUpdate> {
        self.bucket(bucket)
            .iter()
            .find(|u| u.sequence_number == sequence_number)
    }

    /// Remove and return the update with `sequence_number` from `bucket`.
    pub fn remove(&mut self, bucket: UpdateBucket, sequence_number: u64) -> Option<PendingUpdate> {
        let updates = self.bucket_mut(bucket);
        let index = updates
            .iter()
            .position(|u| u.sequence_number == sequence_number)?;
        Some(updates.remove(index))
    }

    /// Drop proposals at or below `sequence_number` from both proposal buckets.
    pub fn prune_proposals(&mut self, sequence_number: u64) {
        self.my_proposed
            .retain(|u| u.sequence_number > sequence_number);
        self.their_proposed
            .retain(|u| u.sequence_number > sequence_number);
    }

    /// Accepted update with the highest sequence number.
    pub fn latest_accepted(&self) -> Option<&PendingUpdate> {
        self.accepted.iter().max_by_key(|u| u.sequence_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(seq: u64) -> PendingUpdate {
        PendingUpdate::new(ChannelId::with_last_byte(1), seq, Bytes::from_static(b"22"))
    }

    #[test]
    fn signatures_by_role() {
        let mut u = update(1);
        assert!(!u.is_dual_signed());

        u.set_signature(Role::One, Bytes::from_static(&[1]));
        assert_eq!(u.signature1, Some(Bytes::from_static(&[1])));
        assert!(u.signature(Role::Zero).is_none());

        let u = u.with_signature(Role::Zero, Bytes::from_static(&[0]));
        assert!(u.is_dual_signed());
    }

    #[test]
    fn same_terms_ignores_signatures() {
        let a = update(1);
        let b = update(1).with_signature(Role::Zero, Bytes::from_static(&[9]));
        assert!(a.same_terms(&b));
        assert!(!a.same_terms(&update(2)));
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn bucket_find_and_remove() {
        let mut buckets = UpdateBuckets::default();
        buckets.bucket_mut(UpdateBucket::MyProposed).push(update(1));
        buckets.bucket_mut(UpdateBucket::Accepted).push(update(2));
        buckets.bucket_mut(UpdateBucket::Accepted).push(update(3));

        assert!(buckets.find(UpdateBucket::MyProposed, 1).is_some());
        assert!(buckets.find(UpdateBucket::TheirProposed, 1).is_none());
        assert_eq!(buckets.latest_accepted().unwrap().sequence_number, 3);

        assert_eq!(buckets.remove(UpdateBucket::Accepted, 2), Some(update(2)));
        assert_eq!(buckets.remove(UpdateBucket::Accepted, 2), None);
        assert_eq!(buckets.accepted.len(), 1);
    }

    #[test]
    fn wire_shape_is_camel_case_without_empty_signatures() {
        let json = serde_json::to_string(&update(4)).unwrap();
        assert!(json.contains("\"sequenceNumber\":4"));
        assert!(json.contains("\"channelId\""));
        assert!(!json.contains("signature"));
    }
}
