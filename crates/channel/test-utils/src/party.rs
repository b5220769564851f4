use alloy_signer_local::PrivateKeySigner;
use duet_channel_primitives::{Address, B256, Bytes, PendingUpdate, Role};
use duet_channel_signer::{ChannelSigner, Keyring, SignerError};

/// A channel participant with a fresh random key.
#[derive(Debug, Clone)]
pub struct TestParty {
    pub address: Address,
    pub keyring: Keyring,
}

impl TestParty {
    pub fn random() -> Self {
        let signer = PrivateKeySigner::random();
        let address = signer.address();
        Self {
            address,
            keyring: Keyring::single(signer),
        }
    }

    /// Sign a fingerprint with this party's key.
    pub async fn sign(&self, fingerprint: B256) -> Result<Bytes, SignerError> {
        self.keyring.sign(self.address, fingerprint).await
    }

    /// Add this party's signature to `update` in the given role.
    pub async fn sign_update(
        &self,
        update: PendingUpdate,
        role: Role,
    ) -> Result<PendingUpdate, SignerError> {
        let signature = self.sign(update.fingerprint()).await?;
        Ok(update.with_signature(role, signature))
    }
}
