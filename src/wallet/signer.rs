//! Signing backends
//!
//! The transfer builder only needs a public key and a way to sign a 32-byte
//! hash. A hardware device can implement [`TransferSigner`] just as well as
//! the local Ed25519 key below.

use std::fmt;

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::{Error, Result};

/// Anything that can produce wallet signatures
pub trait TransferSigner: Send + Sync {
    /// Ed25519 public key the wallet contract was deployed with
    fn public_key(&self) -> [u8; 32];

    /// Sign `message` (a cell hash or a ton_proof digest)
    fn sign(&self, message: &[u8]) -> Result<[u8; 64]>;
}

/// Ed25519 key held in process memory
pub struct LocalSigner {
    signing_key: SigningKey,
}

impl LocalSigner {
    /// Build from a 32-byte seed or a 64-byte `seed || public key` secret
    pub fn from_seed(secret: &[u8]) -> Result<Self> {
        let seed: [u8; 32] = match secret.len() {
            32 | 64 => secret[..32]
                .try_into()
                .map_err(|_| Error::InvalidKeypair("bad seed slice".to_string()))?,
            len => {
                return Err(Error::InvalidKeypair(format!(
                    "expected 32 or 64 secret bytes, got {}",
                    len
                )))
            }
        };

        let signing_key = SigningKey::from_bytes(&seed);
        if secret.len() == 64 && signing_key.verifying_key().as_bytes()[..] != secret[32..] {
            return Err(Error::InvalidKeypair(
                "public half does not match seed".to_string(),
            ));
        }

        Ok(Self { signing_key })
    }

    /// Fresh key from the OS random source
    pub fn generate() -> Self {
        let mut seed = [0u8; 32];
        OsRng.fill_bytes(&mut seed);
        Self {
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    /// 32-byte seed, for writing back to disk
    pub fn seed(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }
}

impl TransferSigner for LocalSigner {
    fn public_key(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    fn sign(&self, message: &[u8]) -> Result<[u8; 64]> {
        Ok(self.signing_key.sign(message).to_bytes())
    }
}

impl fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalSigner")
            .field("public_key", &hex::encode(self.public_key()))
            .finish()
    }
}

/// Check an Ed25519 signature against a raw public key
pub fn verify_signature(public_key: &[u8; 32], message: &[u8], signature: &[u8; 64]) -> Result<bool> {
    let key = VerifyingKey::from_bytes(public_key)
        .map_err(|e| Error::InvalidKeypair(format!("bad public key: {}", e)))?;
    let signature = Signature::from_bytes(signature);
    Ok(key.verify(message, &signature).is_ok())
}
