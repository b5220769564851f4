//! Canonical fingerprint encoding.
//!
//! A fingerprint is `keccak256(tag || field_0 || ... || field_n)` where every
//! field occupies a fixed width:
//!
//! | Field       | Encoding                                    |
//! |-------------|---------------------------------------------|
//! | `Address`   | 20 bytes, verbatim                          |
//! | `Word`      | 32 bytes, verbatim                          |
//! | `Uint`      | 32 bytes, big-endian, zero-padded           |
//! | `Dynamic`   | 32 bytes, `keccak256` of the payload        |
//!
//! The operation tag leads the encoding, so a signature over one operation
//! can never be presented as a signature over another operation whose
//! remaining field bytes happen to coincide.
//!
//! Field order per operation:
//!
//! ```text
//! newChannel           channelId, address0, address1, state, challengePeriod
//! updateState          channelId, sequenceNumber, state
//! startChallengePeriod channelId
//! ```

use alloy_primitives::{Address, B256, U256, keccak256};

use crate::{ChannelId, ChannelParams};

/// Width of a hash output and of every numeric field.
pub const WORD_SIZE: usize = 32;

/// Width of an account address.
pub const ADDRESS_SIZE: usize = 20;

/// Protocol operations that carry a signature.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::AsRefStr,
    strum::Display,
    strum::IntoStaticStr,
    strum::EnumIter,
)]
#[strum(serialize_all = "camelCase")]
pub enum Operation {
    /// Channel opening terms, signed by both participants.
    NewChannel,
    /// Off-chain state update, signed by both participants.
    UpdateState,
    /// Unilateral exit request, signed by one participant.
    StartChallengePeriod,
}

impl Operation {
    /// The tag that leads the encoding.
    pub fn tag(&self) -> &'static str {
        (*self).into()
    }
}

/// A single untyped field.
///
/// Byte fields carry their expected width; a slice of any other length is
/// rejected with [`EncodeError::MalformedField`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field<'a> {
    /// 20-byte account address.
    Address(&'a [u8]),
    /// 32-byte word (channel id, hash).
    Word(&'a [u8]),
    /// Unsigned integer.
    Uint(U256),
    /// Variable-length payload, hashed to a word.
    Dynamic(&'a [u8]),
}

impl Field<'_> {
    /// Unsigned integer field from a `u64`.
    pub fn uint(value: u64) -> Self {
        Field::Uint(U256::from(value))
    }

    fn expected_width(&self) -> Option<usize> {
        match self {
            Field::Address(_) => Some(ADDRESS_SIZE),
            Field::Word(_) => Some(WORD_SIZE),
            Field::Uint(_) | Field::Dynamic(_) => None,
        }
    }
}

/// Errors raised while encoding untrusted field values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    /// The operation tag is empty.
    #[error("operation tag must not be empty")]
    EmptyTag,

    /// A fixed-width field has the wrong length.
    #[error("field {index} must be {expected} bytes, got {actual}")]
    MalformedField {
        index: usize,
        expected: usize,
        actual: usize,
    },
}

/// Append-only encoder over already-typed values. Cannot fail.
#[derive(Debug)]
struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    fn new(tag: &str, fields: usize) -> Self {
        let mut buf = Vec::with_capacity(tag.len() + fields * WORD_SIZE);
        buf.extend_from_slice(tag.as_bytes());
        Self { buf }
    }

    fn raw(mut self, bytes: &[u8]) -> Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    fn address(self, address: &Address) -> Self {
        self.raw(address.as_slice())
    }

    fn word(self, word: &B256) -> Self {
        self.raw(word.as_slice())
    }

    fn uint(self, value: U256) -> Self {
        self.raw(&value.to_be_bytes::<WORD_SIZE>())
    }

    fn dynamic(self, payload: &[u8]) -> Self {
        self.word(&keccak256(payload))
    }

    fn finish(self) -> Vec<u8> {
        self.buf
    }

    fn hash(self) -> B256 {
        keccak256(self.buf)
    }
}

/// Encode `tag` followed by `fields` into their canonical byte form.
pub fn encode(tag: &str, fields: &[Field<'_>]) -> Result<Vec<u8>, EncodeError> {
    if tag.is_empty() {
        return Err(EncodeError::EmptyTag);
    }

    let mut encoder = Encoder::new(tag, fields.len());
    for (index, field) in fields.iter().enumerate() {
        if let (Field::Address(bytes) | Field::Word(bytes), Some(expected)) =
            (field, field.expected_width())
        {
            if bytes.len() != expected {
                return Err(EncodeError::MalformedField {
                    index,
                    expected,
                    actual: bytes.len(),
                });
            }
        }

        encoder = match field {
            Field::Address(bytes) | Field::Word(bytes) => encoder.raw(bytes),
            Field::Uint(value) => encoder.uint(*value),
            Field::Dynamic(payload) => encoder.dynamic(payload),
        };
    }

    Ok(encoder.finish())
}

/// Hash of [`encode`]: the message both signatures must cover.
pub fn fingerprint(tag: &str, fields: &[Field<'_>]) -> Result<B256, EncodeError> {
    encode(tag, fields).map(keccak256)
}

/// Fingerprint of the channel opening terms.
pub fn new_channel_fingerprint(params: &ChannelParams) -> B256 {
    Encoder::new(Operation::NewChannel.tag(), 5)
        .word(params.channel_id.as_b256())
        .address(&params.address0)
        .address(&params.address1)
        .dynamic(&params.state)
        .uint(U256::from(params.challenge_period))
        .hash()
}

/// Fingerprint of an off-chain state update.
pub fn update_fingerprint(channel_id: &ChannelId, sequence_number: u64, state: &[u8]) -> B256 {
    Encoder::new(Operation::UpdateState.tag(), 3)
        .word(channel_id.as_b256())
        .uint(U256::from(sequence_number))
        .dynamic(state)
        .hash()
}

/// Fingerprint of a challenge-period request.
pub fn challenge_fingerprint(channel_id: &ChannelId) -> B256 {
    Encoder::new(Operation::StartChallengePeriod.tag(), 1)
        .word(channel_id.as_b256())
        .hash()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Bytes;
    use assert_matches::assert_matches;
    use proptest::prelude::*;

    fn params() -> ChannelParams {
        ChannelParams {
            channel_id: ChannelId::with_last_byte(0x01),
            address0: Address::repeat_byte(0xaa),
            address1: Address::repeat_byte(0xbb),
            state: Bytes::from_static(&[0x11, 0x11]),
            challenge_period: 1,
        }
    }

    #[test]
    fn tag_leads_encoding() {
        let encoded = encode("updateState", &[Field::uint(1)]).unwrap();
        assert!(encoded.starts_with(b"updateState"));
        assert_eq!(encoded.len(), "updateState".len() + WORD_SIZE);
    }

    #[test]
    fn uint_is_big_endian_word() {
        let encoded = encode("t", &[Field::uint(0x0102)]).unwrap();
        let word = &encoded[1..];
        assert_eq!(word.len(), WORD_SIZE);
        assert!(word[..30].iter().all(|b| *b == 0));
        assert_eq!(&word[30..], &[0x01, 0x02]);
    }

    #[test]
    fn dynamic_is_hashed() {
        let encoded = encode("t", &[Field::Dynamic(b"1111")]).unwrap();
        assert_eq!(&encoded[1..], keccak256(b"1111").as_slice());
    }

    #[test]
    fn rejects_short_address() {
        let err = encode("newChannel", &[Field::Address(&[0u8; 19])]).unwrap_err();
        assert_matches!(
            err,
            EncodeError::MalformedField {
                index: 0,
                expected: ADDRESS_SIZE,
                actual: 19
            }
        );
    }

    #[test]
    fn rejects_long_word() {
        let id = [0u8; 33];
        let err = encode("t", &[Field::uint(1), Field::Word(&id)]).unwrap_err();
        assert_matches!(err, EncodeError::MalformedField { index: 1, .. });
    }

    #[test]
    fn rejects_empty_tag() {
        assert_eq!(encode("", &[]), Err(EncodeError::EmptyTag));
    }

    #[test]
    fn typed_helpers_match_generic_encoding() {
        let p = params();
        let generic = fingerprint(
            Operation::NewChannel.tag(),
            &[
                Field::Word(p.channel_id.as_slice()),
                Field::Address(p.address0.as_slice()),
                Field::Address(p.address1.as_slice()),
                Field::Dynamic(&p.state),
                Field::uint(p.challenge_period),
            ],
        )
        .unwrap();
        assert_eq!(new_channel_fingerprint(&p), generic);

        let generic = fingerprint(
            "updateState",
            &[
                Field::Word(p.channel_id.as_slice()),
                Field::uint(7),
                Field::Dynamic(b"2222"),
            ],
        )
        .unwrap();
        assert_eq!(update_fingerprint(&p.channel_id, 7, b"2222"), generic);

        let generic =
            fingerprint("startChallengePeriod", &[Field::Word(p.channel_id.as_slice())]).unwrap();
        assert_eq!(challenge_fingerprint(&p.channel_id), generic);
    }

    #[test]
    fn operation_tags_do_not_collide() {
        let id = ChannelId::with_last_byte(0x01);
        let fields = [Field::Word(id.as_slice()), Field::uint(1), Field::Dynamic(b"x")];
        let a = fingerprint(Operation::NewChannel.tag(), &fields).unwrap();
        let b = fingerprint(Operation::UpdateState.tag(), &fields).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn operation_tags_are_fixed() {
        use strum::IntoEnumIterator;

        let tags: Vec<_> = Operation::iter().map(|op| op.tag()).collect();
        assert_eq!(tags, ["newChannel", "updateState", "startChallengePeriod"]);
        for op in Operation::iter() {
            assert_eq!(op.to_string(), op.tag());
            assert_eq!(op.as_ref(), op.tag());
        }
    }

    proptest! {
        #[test]
        fn encoding_is_deterministic(
            id in any::<[u8; 32]>(),
            seq in any::<u64>(),
            state in proptest::collection::vec(any::<u8>(), 0..256),
        ) {
            let fields = [Field::Word(&id), Field::uint(seq), Field::Dynamic(&state)];
            let first = encode("updateState", &fields).unwrap();
            let second = encode("updateState", &fields.clone()).unwrap();
            prop_assert_eq!(&first, &second);

            let channel_id = ChannelId::new(id);
            prop_assert_eq!(
                update_fingerprint(&channel_id, seq, &state),
                update_fingerprint(&channel_id, seq, &state.clone())
            );
        }

        #[test]
        fn distinct_sequence_numbers_distinct_fingerprints(a in any::<u64>(), b in any::<u64>()) {
            prop_assume!(a != b);
            let id = ChannelId::with_last_byte(9);
            prop_assert_ne!(update_fingerprint(&id, a, b"s"), update_fingerprint(&id, b, b"s"));
        }
    }
}
