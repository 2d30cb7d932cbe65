//! NFT ownership proof links
//!
//! Produces a verifier URL carrying a `ton_proof` over the NFT address plus the
//! wallet's public key and state init, so the verifier can check both the
//! signature and that the wallet contract really holds that key.

use tracing::debug;
use url::Url;

use crate::error::{Error, Result};
use crate::ton::Address;
use crate::wallet::{TransferSigner, Wallet};

use super::ton_proof::TonProof;

/// Build a verifier link proving this wallet owns `nft_address`
///
/// The ton_proof is signed over the verifier's host with the raw NFT address
/// as payload, so the verifier can check ownership and key in one request.
///
/// # Arguments
/// * `verifier_url` - Base URL of the verifier; existing query pairs are kept
/// * `wallet` - Wallet claiming ownership
/// * `nft_address` - NFT item address
/// * `signer` - Key the wallet contract was deployed with
/// * `timestamp` - Unix seconds embedded in the proof
///
/// # Returns
/// The full URL, or an error if `verifier_url` does not parse or has no host
pub fn build_nft_ownership_proof_url(
    verifier_url: &str,
    wallet: &Wallet,
    nft_address: &Address,
    signer: &dyn TransferSigner,
    timestamp: u64,
) -> Result<String> {
    let mut url = Url::parse(verifier_url)
        .map_err(|e| Error::InvalidRequest(format!("Bad verifier URL {}: {}", verifier_url, e)))?;
    let domain = url
        .host_str()
        .ok_or_else(|| Error::InvalidRequest(format!("Verifier URL has no host: {}", verifier_url)))?
        .to_string();

    let address = wallet.address();
    let payload = nft_address.to_raw();
    let proof = TonProof::sign(&address, &domain, &payload, timestamp, signer)?;
    let state_init = wallet.state_init_boc_base64()?;

    url.query_pairs_mut()
        .append_pair("address", &address.to_raw())
        .append_pair("network", &String::from(wallet.network()))
        .append_pair("publicKey", &hex::encode(wallet.public_key()))
        .append_pair("stateInit", &state_init)
        .append_pair("timestamp", &proof.timestamp.to_string())
        .append_pair("domain", &proof.domain.value)
        .append_pair("domainLength", &proof.domain.length_bytes.to_string())
        .append_pair("payload", &proof.payload)
        .append_pair("signature", &proof.signature);

    debug!("Built NFT ownership proof for {} owned by {}", payload, address);
    Ok(url.to_string())
}
