use alloy_primitives::{Address, B256, Signature};

/// Length of an encoded `r || s || v` signature.
pub const SIGNATURE_LENGTH: usize = 65;

/// Recover the address that signed `fingerprint`.
///
/// Returns `None` for wrong-length, malformed or unrecoverable signatures.
pub fn recover(fingerprint: &B256, signature: &[u8]) -> Option<Address> {
    if signature.len() != SIGNATURE_LENGTH {
        return None;
    }
    let signature = Signature::try_from(signature).ok()?;
    signature.recover_address_from_prehash(fingerprint).ok()
}

/// Whether `signature` over `fingerprint` was produced by `claimed`.
pub fn verify(fingerprint: &B256, signature: &[u8], claimed: &Address) -> bool {
    recover(fingerprint, signature).is_some_and(|signer| signer == *claimed)
}
