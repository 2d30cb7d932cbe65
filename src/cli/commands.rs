//! CLI command implementations

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::Error;
use crate::proof::{build_nft_ownership_proof_url, unix_now};
use crate::ton::Address;
use crate::tonconnect::{
    build_connect_success, build_send_transaction_response_error,
    build_send_transaction_response_success, AppRequest, ConnectParameters, Manifest,
    SendTransactionErrorCode, SendTransactionRequest, Session, SessionCrypto,
};
use crate::transfer::{build_transfer, new_query_id, TransferIntent, TransferParams};
use crate::wallet::{load_signer, LocalSigner, TransferSigner, Wallet};

fn load_wallet(config: &Config) -> Result<(LocalSigner, Wallet)> {
    let signer = load_signer(Path::new(&config.wallet.seed_path))
        .with_context(|| format!("Failed to load seed from {}", config.wallet.seed_path))?;
    let wallet = config.build_wallet(signer.public_key())?;
    info!("Loaded {} wallet {}", wallet.version(), wallet.friendly_address());
    Ok((signer, wallet))
}

fn session_crypto(session_key: &str) -> Result<SessionCrypto> {
    let secret = hex::decode(session_key.trim()).context("Session key is not hex")?;
    Ok(SessionCrypto::from_private_key(&secret)?)
}

/// Generate a new wallet seed
pub fn keygen(config: &Config, out: Option<&str>, force: bool) -> Result<()> {
    let path = out.unwrap_or(&config.wallet.seed_path);
    if Path::new(path).exists() && !force {
        anyhow::bail!("{} already exists, pass --force to overwrite", path);
    }
    if let Some(parent) = Path::new(path).parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let signer = LocalSigner::generate();
    write_secret_file(path, &hex::encode(signer.seed()))?;
    info!("Wrote new seed to {}", path);

    println!("\n=== NEW WALLET KEY ===\n");
    println!("Seed file:  {}", path);
    println!("Public key: {}", hex::encode(signer.public_key()));
    match config.build_wallet(signer.public_key()) {
        Ok(wallet) => {
            println!("Version:    {}", wallet.version());
            println!("Address:    {}", wallet.friendly_address());
            println!("Raw:        {}", wallet.address());
        }
        Err(e) => warn!("Address not derived: {}", e),
    }
    Ok(())
}

fn write_secret_file(path: &str, content: &str) -> Result<()> {
    use std::io::Write;

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options
        .open(path)
        .with_context(|| format!("Failed to open {}", path))?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

/// Decrypt a bridge message and print its plaintext
pub fn decrypt(session_key: &str, client_id: &str, message: &str) -> Result<()> {
    let session = Session::new(client_id, session_crypto(session_key)?);
    let request = session.open(message)?;

    println!("Request {} from {}:", request.id(), session.client_id());
    match request {
        AppRequest::SendTransaction(request) => {
            for (i, param) in request.params.iter().enumerate() {
                println!(
                    "  param {}: {} message(s), valid until {}{}",
                    i,
                    param.messages.len(),
                    param.valid_until,
                    if param.is_expired(unix_now()) { " (expired)" } else { "" }
                );
                for message in &param.messages {
                    println!("    {} -> {} nanoton", message.address, message.amount);
                }
            }
        }
        AppRequest::Disconnect { .. } => println!("  disconnect"),
    }
    Ok(())
}

/// Answer a connect link
pub fn connect(config: &Config, link: &str, manifest_path: &str, session_key: Option<&str>) -> Result<()> {
    let params = ConnectParameters::parse(link)?;
    let manifest: Manifest = serde_json::from_str(
        &std::fs::read_to_string(manifest_path)
            .with_context(|| format!("Failed to read manifest {}", manifest_path))?,
    )
    .context("Failed to parse manifest")?;
    if manifest.url != params.request.manifest_url {
        warn!(
            "Manifest {} does not match requested {}",
            manifest.url, params.request.manifest_url
        );
    }

    let crypto = match session_key {
        Some(key) => session_crypto(key)?,
        None => SessionCrypto::new(),
    };
    let (signer, wallet) = load_wallet(config)?;

    let sealed = build_connect_success(
        &params.request.items,
        &wallet,
        &crypto,
        &signer,
        &manifest,
        &params.client_id,
        &config.device_info(),
    )?
    .ok_or_else(|| anyhow::anyhow!("Client id {} is not a valid key", params.client_id))?;

    println!("\n=== CONNECT REPLY ===\n");
    println!("Dapp:        {} ({})", manifest.name, manifest.url);
    println!("Session id:  {}", crypto.session_id());
    println!("Session key: {}", hex::encode(crypto.key_pair().secret_key()));
    println!("Reply:       {}", sealed);
    Ok(())
}

/// Sign the first param of a decrypted sendTransaction request and seal the answer
pub fn respond(config: &Config, session_key: &str, client_id: &str, message: &str, seqno: u32) -> Result<()> {
    let session = Session::new(client_id, session_crypto(session_key)?);

    let request = match session.open(message)? {
        AppRequest::SendTransaction(request) => request,
        AppRequest::Disconnect { id } => {
            info!("Dapp disconnected (request {})", id);
            return Ok(());
        }
    };

    let (signer, wallet) = load_wallet(config)?;
    let sealed = match sign_request(config, &wallet, &signer, &request, seqno) {
        Ok(boc) => build_send_transaction_response_success(session.crypto(), &boc, &request.id, client_id)?,
        Err(e) => {
            warn!("Rejecting request {}: {}", request.id, e);
            let code = e
                .downcast_ref::<Error>()
                .map(SendTransactionErrorCode::from)
                .unwrap_or(SendTransactionErrorCode::UnknownError);
            build_send_transaction_response_error(session.crypto(), code, &request.id, client_id)?
        }
    }
    .ok_or_else(|| anyhow::anyhow!("Client id {} is not a valid key", client_id))?;

    println!("{}", sealed);
    Ok(())
}

fn sign_request(
    config: &Config,
    wallet: &Wallet,
    signer: &dyn TransferSigner,
    request: &SendTransactionRequest,
    seqno: u32,
) -> Result<String> {
    let param = request
        .params
        .first()
        .ok_or_else(|| Error::MissingField("params".to_string()))?;

    let now = unix_now();
    if param.is_expired(now) {
        return Err(Error::InvalidRequest(format!("request expired at {}", param.valid_until)).into());
    }
    if let Some(network) = param.network {
        if network != wallet.network() {
            return Err(Error::InvalidRequest(format!("request is for {}", network)).into());
        }
    }
    if let Some(from) = param.from {
        if from.address() != wallet.address() {
            return Err(Error::InvalidRequest(format!("request is from {}", from)).into());
        }
    }

    let valid_until = clamp_valid_until(param.valid_until, now, config.transfer.timeout_secs)?;
    let params = TransferParams::new(seqno, valid_until, new_query_id());

    let transfer = build_transfer(wallet, &params, param.to_intent(), signer)?;
    debug!("Request {} signed as {}", request.id, hex::encode(transfer.hash()));
    Ok(transfer.to_boc_base64()?)
}

/// Deadline for a dapp transfer: the dapp's own, but no later than our timeout
fn clamp_valid_until(requested: u64, now: u64, timeout_secs: u64) -> Result<u32> {
    let deadline = requested.min(now.saturating_add(timeout_secs));
    u32::try_from(deadline).with_context(|| format!("valid_until {} out of range", deadline))
}

/// Build and sign a transfer from a JSON intent (inline or `@file`)
pub fn transfer(config: &Config, intent: &str, seqno: u32) -> Result<()> {
    let json = match intent.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?,
        None => intent.to_string(),
    };
    let intent = TransferIntent::from_json(&json)?;
    let (signer, wallet) = load_wallet(config)?;

    let params = TransferParams::with_timeout(seqno, config.transfer.timeout_secs)?;
    let transfer = build_transfer(&wallet, &params, intent, &signer)?;

    println!("\n=== SIGNED TRANSFER ===\n");
    println!("From:        {}", wallet.friendly_address());
    println!("Seqno:       {}", transfer.seqno);
    println!("Valid until: {}", transfer.valid_until);
    println!("Send mode:   {}", transfer.send_mode.bits());
    for message in &transfer.messages {
        println!("  -> {} {} TON", message.destination, message.value.to_ton_string());
    }
    println!("Hash:        {}", hex::encode(transfer.hash()));
    println!("BOC:         {}", transfer.to_boc_base64()?);
    Ok(())
}

/// Print a verifier link proving ownership of an NFT
pub fn nft_proof(config: &Config, nft_address: &str) -> Result<()> {
    if config.nft_proof.verifier_url.is_empty() {
        anyhow::bail!("nft_proof.verifier_url is not set");
    }
    let nft: Address = nft_address.parse()?;
    let (signer, wallet) = load_wallet(config)?;

    let link = build_nft_ownership_proof_url(
        &config.nft_proof.verifier_url,
        &wallet,
        &nft,
        &signer,
        unix_now(),
    )?;
    println!("{}", link);
    Ok(())
}

/// Show current configuration (secrets masked)
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.masked_display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_valid_until() {
        assert_eq!(clamp_valid_until(1_000, 900, 60).unwrap(), 960);
        assert_eq!(clamp_valid_until(950, 900, 60).unwrap(), 950);
    }

    #[test]
    fn test_clamp_valid_until_huge_timeout() {
        assert_eq!(clamp_valid_until(1_000, 900, u64::MAX).unwrap(), 1_000);
        assert!(clamp_valid_until(u64::MAX, 900, u64::MAX).is_err());
    }
}
