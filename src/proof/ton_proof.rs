//! `ton_proof` signatures
//!
//! The signed message binds an address to a requesting domain, a timestamp and
//! an opaque payload:
//!
//! ```text
//! message = "ton-proof-item-v2/" | wc:i32be | hash:32 | len:u32le | domain | ts:u64le | payload
//! digest  = sha256(0xffff | "ton-connect" | sha256(message))
//! ```

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::ton::Address;
use crate::wallet::{verify_signature, TransferSigner};

const TON_PROOF_PREFIX: &[u8] = b"ton-proof-item-v2/";
const TON_CONNECT_PREFIX: &[u8] = b"ton-connect";

/// Current wall-clock time in unix seconds
pub fn unix_now() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Domain {
    pub length_bytes: u32,
    pub value: String,
}

impl Domain {
    /// Domain with its UTF-8 byte length
    pub fn new(value: &str) -> Self {
        Self {
            length_bytes: value.len() as u32,
            value: value.to_string(),
        }
    }
}

/// A signed ownership attestation as sent in a `ton_proof` reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TonProof {
    pub timestamp: u64,
    pub domain: Domain,
    /// Base64 Ed25519 signature over the proof digest
    pub signature: String,
    pub payload: String,
}

impl TonProof {
    /// Sign a ton_proof for `address` over `domain` and `payload`
    ///
    /// # Arguments
    /// * `address` - Wallet address the proof is bound to
    /// * `domain` - Host of the dapp (or verifier) asking for the proof
    /// * `payload` - Dapp-chosen challenge, signed verbatim
    /// * `timestamp` - Unix seconds
    /// * `signer` - Wallet key
    ///
    /// # Returns
    /// The proof with a base64 Ed25519 signature
    pub fn sign(
        address: &Address,
        domain: &str,
        payload: &str,
        timestamp: u64,
        signer: &dyn TransferSigner,
    ) -> Result<Self> {
        let domain = Domain::new(domain);
        let digest = proof_digest(address, &domain, timestamp, payload);
        let signature = signer.sign(&digest)?;

        Ok(Self {
            timestamp,
            domain,
            signature: STANDARD.encode(signature),
            payload: payload.to_string(),
        })
    }

    /// Check the signature against the key that supposedly owns `address`
    pub fn verify(&self, address: &Address, public_key: &[u8; 32]) -> Result<bool> {
        let signature: [u8; 64] = STANDARD
            .decode(&self.signature)?
            .try_into()
            .map_err(|_| Error::Deserialization("signature must be 64 bytes".to_string()))?;
        let digest = proof_digest(address, &self.domain, self.timestamp, &self.payload);
        verify_signature(public_key, &digest, &signature)
    }
}

fn proof_message(address: &Address, domain: &Domain, timestamp: u64, payload: &str) -> Vec<u8> {
    let mut message = Vec::with_capacity(
        TON_PROOF_PREFIX.len() + 4 + 32 + 4 + domain.value.len() + 8 + payload.len(),
    );
    message.extend_from_slice(TON_PROOF_PREFIX);
    message.extend_from_slice(&address.workchain().to_be_bytes());
    message.extend_from_slice(address.hash_part());
    message.extend_from_slice(&domain.length_bytes.to_le_bytes());
    message.extend_from_slice(domain.value.as_bytes());
    message.extend_from_slice(&timestamp.to_le_bytes());
    message.extend_from_slice(payload.as_bytes());
    message
}

fn proof_digest(address: &Address, domain: &Domain, timestamp: u64, payload: &str) -> [u8; 32] {
    let inner = Sha256::digest(proof_message(address, domain, timestamp, payload));

    let mut outer = Sha256::new();
    outer.update([0xff, 0xff]);
    outer.update(TON_CONNECT_PREFIX);
    outer.update(inner);
    outer.finalize().into()
}
