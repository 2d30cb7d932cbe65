//! Core wallet types
//!
//! The wallet is an external collaborator: callers hand us its contract (code,
//! public key, version) and the network it lives on.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ton::{Address, StateInit};

use super::contract::{WalletContract, WalletVersion};

/// Network a wallet lives on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

impl Network {
    /// Global network id, also the TonConnect `network` field
    pub fn global_id(&self) -> i32 {
        match self {
            Network::Mainnet => -239,
            Network::Testnet => -3,
        }
    }

    pub fn is_testnet(&self) -> bool {
        matches!(self, Network::Testnet)
    }
}

impl FromStr for Network {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" | "-239" => Ok(Network::Mainnet),
            "testnet" | "-3" => Ok(Network::Testnet),
            other => Err(Error::Config(format!("Unknown network: {}", other))),
        }
    }
}

impl TryFrom<String> for Network {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Network> for String {
    fn from(value: Network) -> Self {
        value.global_id().to_string()
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Testnet => write!(f, "testnet"),
        }
    }
}

/// A wallet contract bound to a network
#[derive(Debug, Clone)]
pub struct Wallet {
    contract: WalletContract,
    network: Network,
}

impl Wallet {
    /// Wallet for `contract` on `network`
    pub fn new(contract: WalletContract, network: Network) -> Self {
        Self { contract, network }
    }

    pub fn contract(&self) -> &WalletContract {
        &self.contract
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn version(&self) -> WalletVersion {
        self.contract.version()
    }

    pub fn public_key(&self) -> &[u8; 32] {
        self.contract.public_key()
    }

    /// Raw wallet address
    pub fn address(&self) -> Address {
        self.contract.address()
    }

    /// User-facing address: non-bounceable, flagged for testnet when relevant
    pub fn friendly_address(&self) -> String {
        self.address()
            .to_friendly(false, self.network.is_testnet())
    }

    /// State init deploying this wallet
    pub fn state_init(&self) -> &StateInit {
        self.contract.state_init()
    }

    /// Base64 BOC of the state init, as TonConnect and verifiers expect it
    pub fn state_init_boc_base64(&self) -> Result<String> {
        self.contract.state_init_cell().to_boc_base64()
    }
}
