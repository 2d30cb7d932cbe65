//! Versioned wallet contracts
//!
//! Each version stores its data and lays out the signed transfer body a little
//! differently:
//!
//! ```text
//! v3:  wallet_id valid_until seqno (mode ^msg)*
//! v4:  wallet_id valid_until seqno op=0 (mode ^msg)*
//! v5:  "sign" wallet_id valid_until seqno ^out_list? has_extra=0
//! ```
//!
//! v3/v4 prefix the 512-bit signature, v5 appends it. The contract code is
//! passed in as a cell, usually [`super::code::standard_code`].

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ton::{Address, Cell, CellBuilder, InternalMessage, SendMode, StateInit};

use super::types::Network;

/// Subwallet id shared by v3 and v4 wallets on workchain 0
pub const DEFAULT_WALLET_ID: u32 = 698_983_191;

/// `action_send_msg#0ec3c86d`
const ACTION_SEND_MSG: u64 = 0x0ec3c86d;

/// `"sign"` op for externally signed v5 requests
const V5_AUTH_SIGNED: u64 = 0x7369676e;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum WalletVersion {
    V3R1,
    V3R2,
    V4R1,
    V4R2,
    V5R1,
}

impl WalletVersion {
    /// Outgoing messages one signed transfer may carry
    pub fn max_messages(&self) -> usize {
        match self {
            WalletVersion::V3R1
            | WalletVersion::V3R2
            | WalletVersion::V4R1
            | WalletVersion::V4R2 => 4,
            WalletVersion::V5R1 => 255,
        }
    }

    /// Default wallet id for a fresh wallet of this version
    pub fn default_wallet_id(&self, workchain: i32, network: Network) -> u32 {
        match self {
            WalletVersion::V5R1 => {
                // client context: flag, workchain, version 0, subwallet 0
                let context = (1u32 << 31) | ((workchain as i8 as u8 as u32) << 23);
                (network.global_id() as u32) ^ context
            }
            _ => DEFAULT_WALLET_ID.wrapping_add(workchain as u32),
        }
    }
}

impl FromStr for WalletVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "v3r1" => Ok(WalletVersion::V3R1),
            "v3r2" => Ok(WalletVersion::V3R2),
            "v4r1" => Ok(WalletVersion::V4R1),
            "v4r2" => Ok(WalletVersion::V4R2),
            "v5r1" | "w5" => Ok(WalletVersion::V5R1),
            other => Err(Error::Config(format!("Unknown wallet version: {}", other))),
        }
    }
}

impl TryFrom<String> for WalletVersion {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<WalletVersion> for String {
    fn from(value: WalletVersion) -> Self {
        value.to_string()
    }
}

impl fmt::Display for WalletVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WalletVersion::V3R1 => write!(f, "v3R1"),
            WalletVersion::V3R2 => write!(f, "v3R2"),
            WalletVersion::V4R1 => write!(f, "v4R1"),
            WalletVersion::V4R2 => write!(f, "v4R2"),
            WalletVersion::V5R1 => write!(f, "v5R1"),
        }
    }
}

/// A wallet contract instance: version, code, owner key and derived address
#[derive(Debug, Clone)]
pub struct WalletContract {
    version: WalletVersion,
    workchain: i32,
    wallet_id: u32,
    public_key: [u8; 32],
    state_init: StateInit,
    state_init_cell: Arc<Cell>,
    address: Address,
}

impl WalletContract {
    /// Contract with the default wallet id for its version
    pub fn new(
        version: WalletVersion,
        code: Arc<Cell>,
        public_key: [u8; 32],
        workchain: i32,
        network: Network,
    ) -> Result<Self> {
        let wallet_id = version.default_wallet_id(workchain, network);
        Self::with_wallet_id(version, code, public_key, workchain, wallet_id)
    }

    /// Contract with an explicit subwallet id
    pub fn with_wallet_id(
        version: WalletVersion,
        code: Arc<Cell>,
        public_key: [u8; 32],
        workchain: i32,
        wallet_id: u32,
    ) -> Result<Self> {
        let data = Arc::new(initial_data(version, wallet_id, &public_key)?);
        let state_init = StateInit::new(code, data);
        let state_init_cell = Arc::new(state_init.to_cell()?);
        let address = Address::new(workchain, state_init_cell.hash());

        Ok(Self {
            version,
            workchain,
            wallet_id,
            public_key,
            state_init,
            state_init_cell,
            address,
        })
    }

    pub fn version(&self) -> WalletVersion {
        self.version
    }

    pub fn workchain(&self) -> i32 {
        self.workchain
    }

    pub fn wallet_id(&self) -> u32 {
        self.wallet_id
    }

    pub fn public_key(&self) -> &[u8; 32] {
        &self.public_key
    }

    /// Address derived from the state init hash
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn state_init(&self) -> &StateInit {
        &self.state_init
    }

    /// State init as attached to the first external message
    pub fn state_init_cell(&self) -> &Arc<Cell> {
        &self.state_init_cell
    }

    /// The cell whose hash the owner signs
    ///
    /// With `seqno == 0` the valid-until field is all ones, matching what an
    /// undeployed wallet expects on its first transfer.
    pub fn signing_message(
        &self,
        seqno: u32,
        valid_until: u32,
        send_mode: SendMode,
        messages: &[InternalMessage],
    ) -> Result<Cell> {
        let valid_until = if seqno == 0 { u32::MAX } else { valid_until };
        let mut builder = CellBuilder::new();

        match self.version {
            WalletVersion::V3R1 | WalletVersion::V3R2 => {
                builder
                    .store_uint(self.wallet_id as u64, 32)?
                    .store_uint(valid_until as u64, 32)?
                    .store_uint(seqno as u64, 32)?;
                store_inline_messages(&mut builder, send_mode, messages)?;
            }
            WalletVersion::V4R1 | WalletVersion::V4R2 => {
                builder
                    .store_uint(self.wallet_id as u64, 32)?
                    .store_uint(valid_until as u64, 32)?
                    .store_uint(seqno as u64, 32)?
                    .store_uint(0, 8)?; // simple send
                store_inline_messages(&mut builder, send_mode, messages)?;
            }
            WalletVersion::V5R1 => {
                let out_list = out_list(send_mode, messages)?;
                builder
                    .store_uint(V5_AUTH_SIGNED, 32)?
                    .store_uint(self.wallet_id as u64, 32)?
                    .store_uint(valid_until as u64, 32)?
                    .store_uint(seqno as u64, 32)?
                    .store_maybe_reference(out_list.map(Arc::new))?
                    .store_bit(false)?; // no extended actions
            }
        }

        builder.build()
    }

    /// Combine the signing message with its signature in version order
    pub fn signed_body(&self, signing_message: &Cell, signature: &[u8; 64]) -> Result<Cell> {
        let mut builder = CellBuilder::new();
        match self.version {
            WalletVersion::V5R1 => {
                builder.store_cell(signing_message)?.store_bytes(signature)?;
            }
            _ => {
                builder.store_bytes(signature)?.store_cell(signing_message)?;
            }
        }
        builder.build()
    }
}

fn initial_data(version: WalletVersion, wallet_id: u32, public_key: &[u8; 32]) -> Result<Cell> {
    let mut builder = CellBuilder::new();
    match version {
        WalletVersion::V3R1 | WalletVersion::V3R2 => {
            builder
                .store_uint(0, 32)?
                .store_uint(wallet_id as u64, 32)?
                .store_bytes(public_key)?;
        }
        WalletVersion::V4R1 | WalletVersion::V4R2 => {
            builder
                .store_uint(0, 32)?
                .store_uint(wallet_id as u64, 32)?
                .store_bytes(public_key)?
                .store_bit(false)?; // empty plugin dict
        }
        WalletVersion::V5R1 => {
            builder
                .store_bit(true)? // signature auth allowed
                .store_uint(0, 32)?
                .store_uint(wallet_id as u64, 32)?
                .store_bytes(public_key)?
                .store_bit(false)?; // empty extension dict
        }
    }
    builder.build()
}

fn store_inline_messages(
    builder: &mut CellBuilder,
    send_mode: SendMode,
    messages: &[InternalMessage],
) -> Result<()> {
    for message in messages {
        builder
            .store_uint(send_mode.bits() as u64, 8)?
            .store_reference(Arc::new(message.to_cell()?))?;
    }
    Ok(())
}

/// `OutList`: each node references the previous list, the last action is outermost
fn out_list(send_mode: SendMode, messages: &[InternalMessage]) -> Result<Option<Cell>> {
    if messages.is_empty() {
        return Ok(None);
    }
    let mut list = Cell::empty();
    for message in messages {
        list = CellBuilder::new()
            .store_reference(Arc::new(list))?
            .store_uint(ACTION_SEND_MSG, 32)?
            .store_uint(send_mode.bits() as u64, 8)?
            .store_reference(Arc::new(message.to_cell()?))?
            .build()?;
    }
    Ok(Some(list))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ton::Coins;

    fn code() -> Arc<Cell> {
        Arc::new(
            CellBuilder::new()
                .store_uint(0xFF00, 16)
                .unwrap()
                .build()
                .unwrap(),
        )
    }

    fn message() -> InternalMessage {
        InternalMessage::new(Address::new(0, [1u8; 32]), Coins::from_nano(5), true)
    }

    #[test]
    fn test_version_parse() {
        assert_eq!("v4R2".parse::<WalletVersion>().unwrap(), WalletVersion::V4R2);
        assert_eq!("V3R1".parse::<WalletVersion>().unwrap(), WalletVersion::V3R1);
        assert_eq!("w5".parse::<WalletVersion>().unwrap(), WalletVersion::V5R1);
        assert!("v2r2".parse::<WalletVersion>().is_err());
        assert_eq!(WalletVersion::V5R1.to_string(), "v5R1");
    }

    #[test]
    fn test_default_wallet_ids() {
        assert_eq!(
            WalletVersion::V4R2.default_wallet_id(0, Network::Mainnet),
            698_983_191
        );
        assert_eq!(
            WalletVersion::V3R2.default_wallet_id(-1, Network::Mainnet),
            698_983_190
        );
        assert_eq!(
            WalletVersion::V5R1.default_wallet_id(0, Network::Mainnet),
            2_147_483_409
        );
        assert_ne!(
            WalletVersion::V5R1.default_wallet_id(0, Network::Testnet),
            WalletVersion::V5R1.default_wallet_id(0, Network::Mainnet)
        );
    }

    #[test]
    fn test_address_depends_on_version_and_key() {
        let v3 = WalletContract::new(WalletVersion::V3R2, code(), [9u8; 32], 0, Network::Mainnet)
            .unwrap();
        let v4 = WalletContract::new(WalletVersion::V4R2, code(), [9u8; 32], 0, Network::Mainnet)
            .unwrap();
        let other_key =
            WalletContract::new(WalletVersion::V4R2, code(), [8u8; 32], 0, Network::Mainnet)
                .unwrap();

        assert_ne!(v3.address(), v4.address());
        assert_ne!(v4.address(), other_key.address());
        assert_eq!(v4.address().hash_part(), &v4.state_init_cell().hash());
    }

    #[test]
    fn test_v4_signing_message_layout() {
        let contract =
            WalletContract::new(WalletVersion::V4R2, code(), [9u8; 32], 0, Network::Mainnet)
                .unwrap();
        let cell = contract
            .signing_message(7, 1_700_000_000, SendMode::wallet_default(), &[message()])
            .unwrap();

        let mut slice = cell.parse();
        assert_eq!(slice.load_uint(32).unwrap(), DEFAULT_WALLET_ID as u64);
        assert_eq!(slice.load_uint(32).unwrap(), 1_700_000_000);
        assert_eq!(slice.load_uint(32).unwrap(), 7);
        assert_eq!(slice.load_uint(8).unwrap(), 0);
        assert_eq!(slice.load_uint(8).unwrap(), 3);
        assert_eq!(slice.remaining_bits(), 0);
        assert_eq!(cell.references().len(), 1);
    }

    #[test]
    fn test_seqno_zero_never_expires() {
        let contract =
            WalletContract::new(WalletVersion::V3R2, code(), [9u8; 32], 0, Network::Mainnet)
                .unwrap();
        let cell = contract
            .signing_message(0, 1_700_000_000, SendMode::wallet_default(), &[message()])
            .unwrap();

        let mut slice = cell.parse();
        slice.load_uint(32).unwrap();
        assert_eq!(slice.load_uint(32).unwrap(), u32::MAX as u64);
    }

    #[test]
    fn test_v5_signing_message_layout() {
        let contract =
            WalletContract::new(WalletVersion::V5R1, code(), [9u8; 32], 0, Network::Mainnet)
                .unwrap();
        let cell = contract
            .signing_message(3, 1_700_000_000, SendMode::send_max_ton(), &[message(), message()])
            .unwrap();

        let mut slice = cell.parse();
        assert_eq!(slice.load_uint(32).unwrap(), V5_AUTH_SIGNED);
        assert_eq!(slice.load_uint(32).unwrap(), contract.wallet_id() as u64);
        assert_eq!(slice.load_uint(32).unwrap(), 1_700_000_000);
        assert_eq!(slice.load_uint(32).unwrap(), 3);

        let outer = slice.load_maybe_reference().unwrap().unwrap();
        let mut action = outer.parse();
        let previous = action.load_reference().unwrap();
        assert_eq!(action.load_uint(32).unwrap(), ACTION_SEND_MSG);
        assert_eq!(action.load_uint(8).unwrap(), 128);
        assert_eq!(previous.references().len(), 2);
        assert!(!slice.load_bit().unwrap());
    }

    #[test]
    fn test_signature_position() {
        let signature = [0xAB; 64];

        let v4 = WalletContract::new(WalletVersion::V4R2, code(), [9u8; 32], 0, Network::Mainnet)
            .unwrap();
        let unsigned = v4
            .signing_message(1, 100, SendMode::wallet_default(), &[message()])
            .unwrap();
        let body = v4.signed_body(&unsigned, &signature).unwrap();
        assert_eq!(body.parse().load_bytes(64).unwrap(), signature.to_vec());

        let v5 = WalletContract::new(WalletVersion::V5R1, code(), [9u8; 32], 0, Network::Mainnet)
            .unwrap();
        let unsigned = v5
            .signing_message(1, 100, SendMode::wallet_default(), &[message()])
            .unwrap();
        let body = v5.signed_body(&unsigned, &signature).unwrap();
        assert_eq!(body.parse().load_uint(32).unwrap(), V5_AUTH_SIGNED);
        assert_eq!(body.bit_len(), unsigned.bit_len() + 512);
    }
}
