//! Signed wallet transfers
//!
//! Wraps a list of outgoing internal messages into the external message a
//! wallet contract accepts: signing message, signature, optional state init.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::ton::{Cell, ExternalMessage, InternalMessage, SendMode};

use super::signer::{verify_signature, TransferSigner};
use super::types::Wallet;

/// A signed transfer, ready to be serialized and broadcast
#[derive(Debug, Clone)]
pub struct WalletTransfer {
    pub seqno: u32,
    pub send_mode: SendMode,
    pub messages: Vec<InternalMessage>,
    pub valid_until: u32,
    pub signing_message: Arc<Cell>,
    pub external_message: Arc<Cell>,
}

impl WalletTransfer {
    /// External message as a BOC
    pub fn to_boc(&self) -> Result<Vec<u8>> {
        self.external_message.to_boc()
    }

    /// Base64 BOC, the form dapps and liteservers expect
    pub fn to_boc_base64(&self) -> Result<String> {
        Ok(STANDARD.encode(self.to_boc()?))
    }

    /// Hash of the external message, usable to track the transaction
    pub fn hash(&self) -> [u8; 32] {
        self.external_message.hash()
    }
}

/// Builds and signs transfers for one wallet
pub struct WalletTransferBuilder<'a> {
    wallet: &'a Wallet,
}

impl<'a> WalletTransferBuilder<'a> {
    pub fn new(wallet: &'a Wallet) -> Self {
        Self { wallet }
    }

    /// Sign `messages` under `seqno`
    ///
    /// Input checks happen before the signer is called, so a rejected build
    /// never leaves a signature behind. The returned signature is verified
    /// against the wallet key before it is used.
    ///
    /// # Arguments
    /// * `seqno` - Current wallet seqno; 0 also deploys the wallet
    /// * `valid_until` - Unix deadline (ignored by the contract at seqno 0)
    /// * `send_mode` - Mode applied to every message
    /// * `messages` - Outgoing internal messages, at most the version's limit
    /// * `signer` - Holder of the wallet key
    ///
    /// # Returns
    /// The signed external message and the pieces it was built from
    pub fn build(
        &self,
        seqno: u32,
        valid_until: u32,
        send_mode: SendMode,
        messages: Vec<InternalMessage>,
        signer: &dyn TransferSigner,
    ) -> Result<WalletTransfer> {
        let contract = self.wallet.contract();

        if messages.is_empty() {
            return Err(Error::MissingField("at least one message".to_string()));
        }
        let max = contract.version().max_messages();
        if messages.len() > max {
            return Err(Error::TooManyMessages {
                count: messages.len(),
                max,
            });
        }
        if &signer.public_key() != contract.public_key() {
            return Err(Error::SignerMismatch(self.wallet.address().to_raw()));
        }

        let signing_message = contract.signing_message(seqno, valid_until, send_mode, &messages)?;
        debug!(
            "Signing {} message(s) for {} ({}), seqno {}",
            messages.len(),
            self.wallet.address(),
            contract.version(),
            seqno
        );

        let digest = signing_message.hash();
        let signature = signer.sign(&digest)?;
        if !verify_signature(contract.public_key(), &digest, &signature)? {
            return Err(Error::Signing(format!(
                "signer returned an invalid signature for {}",
                self.wallet.address()
            )));
        }
        let body = contract.signed_body(&signing_message, &signature)?;

        // an undeployed wallet deploys itself with its first transfer
        let state_init = (seqno == 0).then(|| contract.state_init_cell().clone());

        let external_message = ExternalMessage {
            destination: self.wallet.address(),
            state_init,
            body: Arc::new(body),
        }
        .to_cell()?;

        let transfer = WalletTransfer {
            seqno,
            send_mode,
            messages,
            valid_until,
            signing_message: Arc::new(signing_message),
            external_message: Arc::new(external_message),
        };

        info!(
            "Built transfer {} from {} with {} message(s)",
            hex::encode(transfer.hash()),
            self.wallet.address(),
            transfer.messages.len()
        );

        Ok(transfer)
    }
}
