//! Signing and verification of channel fingerprints.
//!
//! Signatures are 65-byte `r || s || v` secp256k1 signatures over the raw
//! fingerprint (no message prefix), the same form the on-chain arbiter
//! recovers with `ecrecover`.
//!
//! - [`ChannelSigner`] - Async signing interface over one or more identities
//! - [`Keyring`] - Local implementation backed by in-memory private keys
//! - [`verify`] / [`recover`] - Pure signature checks

mod error;
mod keyring;
mod verify;

pub use error::SignerError;
pub use keyring::Keyring;
pub use verify::{SIGNATURE_LENGTH, recover, verify};

use alloy_primitives::{Address, B256, Bytes};
use async_trait::async_trait;

/// Signs fingerprints on behalf of the identities it holds.
///
/// Signing may suspend on an external key custodian (hardware wallet, remote
/// signer), hence async.
#[async_trait]
#[auto_impl::auto_impl(&, Arc)]
pub trait ChannelSigner: Send + Sync {
    /// Addresses this signer can sign for.
    fn identities(&self) -> Vec<Address>;

    /// Whether `identity` is held by this signer.
    fn holds(&self, identity: &Address) -> bool {
        self.identities().contains(identity)
    }

    /// Sign `fingerprint` as `identity`.
    async fn sign(&self, identity: Address, fingerprint: B256) -> Result<Bytes, SignerError>;
}
