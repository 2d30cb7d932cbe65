//! Transfer intents
//!
//! One variant per kind of user action. Intents are consumed once by
//! [`super::build_transfer`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::ton::{Address, AnyAddress, Coins};

/// Staking pool contract families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StakingPoolKind {
    /// TON Whales nominator pool
    Whales,
    /// Tonstakers-style liquid pool with a pool jetton
    LiquidTf,
    /// Classic TON Foundation nominator pool driven by text comments
    Tf,
}

impl FromStr for StakingPoolKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "whales" => Ok(StakingPoolKind::Whales),
            "liquidTF" => Ok(StakingPoolKind::LiquidTf),
            "tf" => Ok(StakingPoolKind::Tf),
            other => Err(Error::UnsupportedTransaction(format!(
                "staking pool implementation {}",
                other
            ))),
        }
    }
}

impl TryFrom<String> for StakingPoolKind {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<StakingPoolKind> for String {
    fn from(value: StakingPoolKind) -> Self {
        value.to_string()
    }
}

impl fmt::Display for StakingPoolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StakingPoolKind::Whales => write!(f, "whales"),
            StakingPoolKind::LiquidTf => write!(f, "liquidTF"),
            StakingPoolKind::Tf => write!(f, "tf"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StakeDirection {
    Deposit,
    Withdraw,
}

/// What to do with the `wallet` record of a .ton domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DnsAction {
    Link { address: Address },
    Unlink,
    Renew,
}

/// One caller-supplied message, signed verbatim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMessage {
    pub address: AnyAddress,
    pub amount: Coins,
    /// Base64 BOC
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_init: Option<String>,
    /// Base64 BOC
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum TransferIntent {
    Ton {
        recipient: AnyAddress,
        amount: Coins,
        /// Send the whole balance; `amount` is then ignored
        #[serde(default)]
        is_max: bool,
        #[serde(default)]
        comment: Option<String>,
        /// Defaults to the flag implied by the recipient's address form
        #[serde(default)]
        bounceable: Option<bool>,
    },
    Jetton {
        jetton_master: Address,
        /// Sender's own jetton wallet for this master, resolved by the caller
        jetton_wallet: Address,
        amount: Coins,
        recipient: AnyAddress,
        #[serde(default)]
        comment: Option<String>,
        /// Base64 BOC
        #[serde(default)]
        custom_payload: Option<String>,
        #[serde(default)]
        response_address: Option<Address>,
    },
    Nft {
        nft_address: Address,
        recipient: AnyAddress,
        /// Text comment forwarded to the new owner
        #[serde(default)]
        forward_payload: Option<String>,
    },
    Stake {
        implementation: StakingPoolKind,
        direction: StakeDirection,
        pool: Address,
        amount: Coins,
        fees: Coins,
        /// Staker's pool-jetton wallet, needed for liquid withdrawals
        #[serde(default)]
        jetton_wallet: Option<Address>,
    },
    #[serde(rename = "changeDNSRecord")]
    ChangeDnsRecord {
        nft_address: Address,
        action: DnsAction,
        amount: Coins,
        #[serde(default = "deployed_by_default")]
        deployed: bool,
        /// Base64 BOC, required when the domain NFT is not deployed yet
        #[serde(default)]
        nft_state_init: Option<String>,
    },
    SignRaw {
        messages: Vec<RawMessage>,
    },
}

fn deployed_by_default() -> bool {
    true
}

const KNOWN_KINDS: [&str; 6] = ["ton", "jetton", "nft", "stake", "changeDNSRecord", "signRaw"];

impl TransferIntent {
    /// Decode a `kind`-tagged JSON intent
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| Error::InvalidRequest(format!("Malformed transfer intent: {}", e)))?;

        let kind = value
            .get("kind")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::MissingField("kind".to_string()))?
            .to_string();
        if !KNOWN_KINDS.contains(&kind.as_str()) {
            return Err(Error::UnsupportedTransaction(kind));
        }
        if let Some(implementation) = value.get("implementation").and_then(Value::as_str) {
            implementation.parse::<StakingPoolKind>()?;
        }

        serde_json::from_value(value)
            .map_err(|e| Error::InvalidRequest(format!("Malformed {} intent: {}", kind, e)))
    }

    /// Wire name of the intent kind
    pub fn kind(&self) -> &'static str {
        match self {
            TransferIntent::Ton { .. } => "ton",
            TransferIntent::Jetton { .. } => "jetton",
            TransferIntent::Nft { .. } => "nft",
            TransferIntent::Stake { .. } => "stake",
            TransferIntent::ChangeDnsRecord { .. } => "changeDNSRecord",
            TransferIntent::SignRaw { .. } => "signRaw",
        }
    }
}
