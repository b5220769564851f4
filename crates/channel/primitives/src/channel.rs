//! Local channel record.

use alloy_primitives::{Address, B256, Bytes};
use serde::{Deserialize, Serialize};

use crate::fingerprint::new_channel_fingerprint;
use crate::{ChannelId, UpdateBuckets};

/// Channel lifecycle phase.
///
/// Phases only ever move forward: `Proposed → Open → Challenging → Closed`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumIter,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Phase {
    /// Proposed by `address0`, not yet confirmed by the arbiter.
    Proposed,
    /// Opened on-chain; updates may be exchanged.
    Open,
    /// A participant started the challenge period.
    Challenging,
    /// Finalized, or abandoned before opening.
    Closed,
}

impl Phase {
    /// Whether moving from `self` to `next` goes strictly forward.
    pub fn can_advance_to(self, next: Phase) -> bool {
        next > self
    }

    /// Whether off-chain updates may still be exchanged in this phase.
    pub fn accepts_updates(self) -> bool {
        matches!(self, Phase::Open | Phase::Challenging)
    }
}

/// Position of a participant in the channel's opening terms.
///
/// `Zero` is always the proposer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// `address0`, the proposer.
    Zero,
    /// `address1`, the accepter.
    One,
}

impl Role {
    /// The other participant's role.
    pub const fn counterparty(self) -> Role {
        match self {
            Role::Zero => Role::One,
            Role::One => Role::Zero,
        }
    }
}

/// Opening terms of a channel, covered by the `newChannel` fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelParams {
    pub channel_id: ChannelId,
    pub address0: Address,
    pub address1: Address,
    pub state: Bytes,
    /// Challenge period in blocks.
    pub challenge_period: u64,
}

impl ChannelParams {
    /// Fingerprint both opening signatures must cover.
    pub fn fingerprint(&self) -> B256 {
        new_channel_fingerprint(self)
    }

    /// Address of the participant holding `role`.
    pub fn address(&self, role: Role) -> Address {
        match role {
            Role::Zero => self.address0,
            Role::One => self.address1,
        }
    }

    /// Role held by `address`, if it participates.
    pub fn role_of(&self, address: &Address) -> Option<Role> {
        if *address == self.address0 {
            Some(Role::Zero)
        } else if *address == self.address1 {
            Some(Role::One)
        } else {
            None
        }
    }
}

/// Local view of a channel.
///
/// The opening terms and the local role are fixed at construction; everything
/// the protocol mutates is public.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    params: ChannelParams,
    role: Role,
    /// Current lifecycle phase.
    pub phase: Phase,
    /// Sequence number of the latest dual-signed state.
    pub sequence_number: u64,
    /// Highest sequence number the arbiter is known to hold.
    pub onchain_sequence: u64,
    /// Latest dual-signed state.
    pub state: Bytes,
    /// Block after which the arbiter permits finalization.
    pub closing_block: Option<u64>,
    /// Proposer's signature over the opening terms.
    pub signature0: Option<Bytes>,
    /// Accepter's signature over the opening terms.
    pub signature1: Option<Bytes>,
    /// Pending update buckets.
    pub updates: UpdateBuckets,
}

impl Channel {
    /// Create a `Proposed` record for the given terms, held locally as `role`.
    pub fn new(params: ChannelParams, role: Role) -> Self {
        let state = params.state.clone();
        Self {
            params,
            role,
            phase: Phase::Proposed,
            sequence_number: 0,
            onchain_sequence: 0,
            state,
            closing_block: None,
            signature0: None,
            signature1: None,
            updates: UpdateBuckets::default(),
        }
    }

    pub fn id(&self) -> ChannelId {
        self.params.channel_id
    }

    pub fn params(&self) -> &ChannelParams {
        &self.params
    }

    pub fn address0(&self) -> Address {
        self.params.address0
    }

    pub fn address1(&self) -> Address {
        self.params.address1
    }

    pub fn challenge_period(&self) -> u64 {
        self.params.challenge_period
    }

    /// Role the local party holds.
    pub fn role(&self) -> Role {
        self.role
    }

    pub fn self_address(&self) -> Address {
        self.params.address(self.role)
    }

    pub fn counterparty_address(&self) -> Address {
        self.params.address(self.role.counterparty())
    }

    /// Our signature over the opening terms.
    pub fn self_signature(&self) -> Option<&Bytes> {
        self.opening_signature(self.role)
    }

    /// Counterparty's signature over the opening terms.
    pub fn counterparty_signature(&self) -> Option<&Bytes> {
        self.opening_signature(self.role.counterparty())
    }

    fn opening_signature(&self, role: Role) -> Option<&Bytes> {
        match role {
            Role::Zero => self.signature0.as_ref(),
            Role::One => self.signature1.as_ref(),
        }
    }

    /// Sequence number the next update must carry.
    pub fn next_sequence(&self) -> u64 {
        self.sequence_number + 1
    }

    /// Move to `phase` if it lies ahead of the current one.
    ///
    /// Returns `true` if the phase changed.
    pub fn advance_phase(&mut self, phase: Phase) -> bool {
        if self.phase.can_advance_to(phase) {
            self.phase = phase;
            true
        } else {
            false
        }
    }

    /// Record that the arbiter holds `sequence`, dropping superseded
    /// accepted updates.
    pub fn record_onchain_sequence(&mut self, sequence: u64) {
        if sequence > self.onchain_sequence {
            self.onchain_sequence = sequence;
        }
        let onchain = self.onchain_sequence;
        self.updates.accepted.retain(|u| u.sequence_number > onchain);
    }

    /// Number of dual-signed updates not yet known to the arbiter.
    pub fn unposted_updates(&self) -> usize {
        self.updates.accepted.len()
    }
}
