//! Transfer construction
//!
//! Turns a [`TransferIntent`] into one signed [`WalletTransfer`]:
//!
//! ```text
//! TransferIntent ─┬─ Ton ─────────────┐
//!                 ├─ Jetton ──────────┤
//!                 ├─ Nft ─────────────┤  (SendMode, [InternalMessage])
//!                 ├─ Stake ───────────┼──────────────────────────────→ WalletTransferBuilder
//!                 ├─ ChangeDnsRecord ─┤
//!                 └─ SignRaw ─────────┘
//! ```
//!
//! Construction is strict: any bad address, BOC or amount aborts the build
//! before anything is signed.

pub mod dns;
pub mod intent;
pub mod jetton;
pub mod nft;
pub mod sign_raw;
pub mod stake;
pub mod ton;

pub use intent::{DnsAction, RawMessage, StakeDirection, StakingPoolKind, TransferIntent};

use rand::rngs::OsRng;
use rand::RngCore;
use tracing::info;

use crate::error::{Error, Result};
use crate::proof::unix_now;
use crate::ton::{Cell, SendMode};
use crate::wallet::{TransferSigner, Wallet, WalletTransfer, WalletTransferBuilder};

/// Per-call inputs the caller owns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferParams {
    /// Current wallet seqno, fetched by the caller
    pub seqno: u32,
    pub valid_until: u32,
    /// Query id stamped into jetton, NFT, stake and DNS bodies
    pub query_id: u64,
}

impl TransferParams {
    pub fn new(seqno: u32, valid_until: u32, query_id: u64) -> Self {
        Self {
            seqno,
            valid_until,
            query_id,
        }
    }

    /// Valid for `timeout_secs` from now, with a fresh query id
    pub fn with_timeout(seqno: u32, timeout_secs: u64) -> Result<Self> {
        let valid_until = unix_now()
            .checked_add(timeout_secs)
            .and_then(|deadline| u32::try_from(deadline).ok())
            .ok_or_else(|| Error::InvalidRequest(format!("timeout out of range: {}s", timeout_secs)))?;
        Ok(Self::new(seqno, valid_until, new_query_id()))
    }
}

/// Unix time in the high half, random low half
pub fn new_query_id() -> u64 {
    (unix_now() << 32) | OsRng.next_u32() as u64
}

/// Build and sign the transfer described by `intent`
///
/// # Arguments
/// * `wallet` - Sending wallet
/// * `params` - Seqno, deadline and query id
/// * `intent` - What to send
/// * `signer` - Holder of the wallet key
///
/// # Returns
/// The signed transfer, or the first validation error in the intent
pub fn build_transfer(
    wallet: &Wallet,
    params: &TransferParams,
    intent: TransferIntent,
    signer: &dyn TransferSigner,
) -> Result<WalletTransfer> {
    let sender = wallet.address();
    let kind = intent.kind();

    let (send_mode, messages) = match intent {
        TransferIntent::Ton {
            recipient,
            amount,
            is_max,
            comment,
            bounceable,
        } => (
            ton::ton_send_mode(is_max),
            vec![ton::build_ton_message(&recipient, amount, comment.as_deref(), bounceable)?],
        ),
        TransferIntent::Jetton {
            jetton_master,
            jetton_wallet,
            amount,
            recipient,
            comment,
            custom_payload,
            response_address,
        } => {
            let custom_payload = custom_payload.as_deref().map(Cell::from_boc_base64).transpose()?;
            info!("Jetton {} transfer via wallet {}", jetton_master, jetton_wallet);
            (
                SendMode::wallet_default(),
                vec![jetton::build_jetton_message(
                    &sender,
                    &jetton_wallet,
                    amount,
                    &recipient,
                    comment.as_deref(),
                    custom_payload,
                    response_address.as_ref(),
                    params.query_id,
                )?],
            )
        }
        TransferIntent::Nft {
            nft_address,
            recipient,
            forward_payload,
        } => (
            SendMode::wallet_default(),
            vec![nft::build_nft_message(
                &sender,
                &nft_address,
                &recipient,
                forward_payload.as_deref(),
                params.query_id,
            )?],
        ),
        TransferIntent::Stake {
            implementation,
            direction,
            pool,
            amount,
            fees,
            jetton_wallet,
        } => (
            SendMode::wallet_default(),
            vec![stake::build_stake_message(
                &sender,
                implementation,
                direction,
                &pool,
                amount,
                fees,
                jetton_wallet.as_ref(),
                params.query_id,
            )?],
        ),
        TransferIntent::ChangeDnsRecord {
            nft_address,
            action,
            amount,
            deployed,
            nft_state_init,
        } => (
            SendMode::wallet_default(),
            vec![dns::build_dns_message(
                &nft_address,
                &action,
                amount,
                deployed,
                nft_state_init.as_deref(),
                params.query_id,
            )?],
        ),
        TransferIntent::SignRaw { messages } => {
            (SendMode::wallet_default(), sign_raw::build_raw_messages(&messages)?)
        }
    };

    info!(
        "Signing {} transfer from {} (seqno {}, mode {})",
        kind,
        sender,
        params.seqno,
        send_mode.bits()
    );
    WalletTransferBuilder::new(wallet).build(
        params.seqno,
        params.valid_until,
        send_mode,
        messages,
        signer,
    )
}
