//! Session encryption
//!
//! NaCl box (X25519 + XSalsa20-Poly1305) between the wallet's session key and
//! the dapp's key. Every sealed message is `nonce(24) | ciphertext`.

use std::fmt;
use std::sync::Arc;

use crypto_box::aead::{Aead, Nonce};
use crypto_box::{PublicKey, SalsaBox, SecretKey};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Error, Result};

/// Bytes of random nonce prefixed to every box
pub const NONCE_LENGTH: usize = 24;

/// Supplies nonces for [`SessionCrypto::encrypt`]
///
/// Implementations must never hand out the same nonce twice for one key.
pub trait NonceSource: Send + Sync {
    fn next_nonce(&self) -> [u8; NONCE_LENGTH];
}

/// Random nonces from the operating system CSPRNG
#[derive(Debug, Default, Clone, Copy)]
pub struct OsNonceSource;

impl NonceSource for OsNonceSource {
    fn next_nonce(&self) -> [u8; NONCE_LENGTH] {
        let mut nonce = [0u8; NONCE_LENGTH];
        OsRng.fill_bytes(&mut nonce);
        nonce
    }
}

/// X25519 session keypair
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyPair {
    public_key: [u8; 32],
    secret_key: [u8; 32],
}

impl KeyPair {
    /// Fresh X25519 key pair from the OS random source
    pub fn generate() -> Self {
        let mut secret = [0u8; 32];
        OsRng.fill_bytes(&mut secret);
        let key_pair = Self::from_secret(secret);
        secret.zeroize();
        key_pair
    }

    /// Restore from a stored secret key
    pub fn from_secret(secret: [u8; 32]) -> Self {
        let secret_key = SecretKey::from(secret);
        Self {
            public_key: *secret_key.public_key().as_bytes(),
            secret_key: secret,
        }
    }

    pub fn public_key(&self) -> &[u8; 32] {
        &self.public_key
    }

    pub fn secret_key(&self) -> &[u8; 32] {
        &self.secret_key
    }

    fn salsa_box(&self, counterparty: &[u8; 32]) -> SalsaBox {
        let secret = SecretKey::from(self.secret_key);
        SalsaBox::new(&PublicKey::from(*counterparty), &secret)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &hex::encode(self.public_key))
            .field("secret_key", &"***")
            .finish()
    }
}

/// One side of a dapp pairing
#[derive(Clone)]
pub struct SessionCrypto {
    key_pair: KeyPair,
    nonce_source: Arc<dyn NonceSource>,
}

impl SessionCrypto {
    /// Fresh session with a random keypair
    pub fn new() -> Self {
        Self::with_key_pair(KeyPair::generate())
    }

    /// Restore a persisted session from its secret key
    pub fn from_private_key(secret: &[u8]) -> Result<Self> {
        let secret: [u8; 32] = secret.try_into().map_err(|_| {
            Error::InvalidKeypair(format!("session key must be 32 bytes, got {}", secret.len()))
        })?;
        Ok(Self::with_key_pair(KeyPair::from_secret(secret)))
    }

    /// Session with an existing key pair and OS nonces
    pub fn with_key_pair(key_pair: KeyPair) -> Self {
        Self {
            key_pair,
            nonce_source: Arc::new(OsNonceSource),
        }
    }

    /// Swap the nonce generator, mainly for deterministic tests
    pub fn with_nonce_source(mut self, nonce_source: Arc<dyn NonceSource>) -> Self {
        self.nonce_source = nonce_source;
        self
    }

    /// Hex public key, the id the relay knows this side by
    pub fn session_id(&self) -> String {
        hex::encode(self.key_pair.public_key())
    }

    pub fn key_pair(&self) -> &KeyPair {
        &self.key_pair
    }

    /// Seal `message` for `receiver_public_key`
    ///
    /// # Arguments
    /// * `message` - Plaintext, usually a JSON envelope
    /// * `receiver_public_key` - The dapp's X25519 key (its client id)
    ///
    /// # Returns
    /// `nonce | ciphertext`, ready to be base64 encoded for the bridge
    pub fn encrypt(&self, message: &[u8], receiver_public_key: &[u8; 32]) -> Result<Vec<u8>> {
        let nonce = self.nonce_source.next_nonce();
        let ciphertext = self
            .key_pair
            .salsa_box(receiver_public_key)
            .encrypt(Nonce::<SalsaBox>::from_slice(&nonce), message)
            .map_err(|e| Error::Encryption(e.to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_LENGTH + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    /// Open `nonce | ciphertext`
    ///
    /// Input shorter than a nonce yields an empty message rather than an error.
    pub fn decrypt(&self, message: &[u8], sender_public_key: &[u8; 32]) -> Result<Vec<u8>> {
        if message.len() < NONCE_LENGTH {
            return Ok(Vec::new());
        }
        let (nonce, ciphertext) = message.split_at(NONCE_LENGTH);

        self.key_pair
            .salsa_box(sender_public_key)
            .decrypt(Nonce::<SalsaBox>::from_slice(nonce), ciphertext)
            .map_err(|e| Error::Decryption(e.to_string()))
    }
}

impl Default for SessionCrypto {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SessionCrypto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCrypto")
            .field("session_id", &self.session_id())
            .finish()
    }
}
