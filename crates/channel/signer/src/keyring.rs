use std::collections::HashMap;

use alloy_primitives::{Address, B256, Bytes};
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use tracing::trace;

use crate::{ChannelSigner, SignerError};

/// In-memory keys, indexed by address.
#[derive(Debug, Clone, Default)]
pub struct Keyring {
    signers: HashMap<Address, PrivateKeySigner>,
}

impl Keyring {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keyring holding a single key.
    pub fn single(signer: PrivateKeySigner) -> Self {
        Self::new().with_signer(signer)
    }

    /// Keyring holding one freshly generated key.
    pub fn random() -> Self {
        Self::single(PrivateKeySigner::random())
    }

    pub fn with_signer(mut self, signer: PrivateKeySigner) -> Self {
        self.insert(signer);
        self
    }

    /// Add a key, returning its address.
    pub fn insert(&mut self, signer: PrivateKeySigner) -> Address {
        let address = signer.address();
        self.signers.insert(address, signer);
        address
    }

    pub fn len(&self) -> usize {
        self.signers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signers.is_empty()
    }
}

#[async_trait]
impl ChannelSigner for Keyring {
    fn identities(&self) -> Vec<Address> {
        let mut identities: Vec<_> = self.signers.keys().copied().collect();
        identities.sort();
        identities
    }

    fn holds(&self, identity: &Address) -> bool {
        self.signers.contains_key(identity)
    }

    async fn sign(&self, identity: Address, fingerprint: B256) -> Result<Bytes, SignerError> {
        let signer = self
            .signers
            .get(&identity)
            .ok_or(SignerError::UnknownIdentity(identity))?;

        let signature = signer
            .sign_hash(&fingerprint)
            .await
            .map_err(|e| SignerError::Signing(e.to_string()))?;

        trace!(%identity, %fingerprint, "signed fingerprint");
        Ok(Bytes::copy_from_slice(&signature.as_bytes()))
    }
}
