//! Local signing oracle over secp256k1.
//!
//! Signs the raw 32-byte digest (no message prefix) and returns the
//! Ethereum-style recoverable form `r ‖ s ‖ v` with `v ∈ {27, 28}`.

use crate::domain::errors::SignerError;
use crate::ports::outbound::SignerOracle;
use async_trait::async_trait;
use compact_types::{keccak256, Address, Hash32, Signature};
use k256::ecdsa::SigningKey;
use zeroize::Zeroize;

/// In-process signer holding the allocator's private key.
pub struct LocalSigner {
    signing_key: SigningKey,
}

impl LocalSigner {
    /// Generate a random key.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::random(&mut rand::thread_rng()),
        }
    }

    /// Create from secret key bytes (32 bytes).
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, SignerError> {
        let signing_key = SigningKey::from_bytes((&bytes).into())
            .map_err(|_| SignerError::Failure("invalid secret key".to_string()))?;
        Ok(Self { signing_key })
    }

    /// The signer's account address: last 20 bytes of the keccak of the
    /// uncompressed public key without its `0x04` prefix.
    pub fn address(&self) -> Address {
        let point = self.signing_key.verifying_key().to_encoded_point(false);
        let hash = keccak256(&point.as_bytes()[1..]);
        let mut addr = [0u8; 20];
        addr.copy_from_slice(&hash[12..]);
        Address::new(addr)
    }
}

#[async_trait]
impl SignerOracle for LocalSigner {
    async fn sign(&self, digest: &Hash32) -> Result<Signature, SignerError> {
        let (sig, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(digest.as_bytes())
            .map_err(|e| SignerError::Failure(e.to_string()))?;
        let bytes = sig.to_bytes();
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..]);
        Ok(Signature::from_parts(r, s, 27 + recovery_id.to_byte()))
    }
}

impl Drop for LocalSigner {
    fn drop(&mut self) {
        let mut bytes: [u8; 32] = self.signing_key.to_bytes().into();
        bytes.zeroize();
    }
}
