use alloy_primitives::Address;

/// Errors raised while signing.
#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    /// No key is held for the requested identity.
    #[error("no signing key for identity {0}")]
    UnknownIdentity(Address),

    /// The key custodian failed to produce a signature.
    #[error("signing failed: {0}")]
    Signing(String),
}
