//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

use crate::ton::Cell;
use crate::tonconnect::DeviceInfo;
use crate::wallet::{standard_code, Network, Wallet, WalletContract, WalletVersion};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub wallet: WalletConfig,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub transfer: TransferConfig,
    #[serde(default)]
    pub nft_proof: NftProofConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    #[serde(default = "default_wallet_version")]
    pub version: WalletVersion,
    #[serde(default)]
    pub workchain: i32,
    #[serde(default)]
    pub network: Network,
    /// Base64 BOC overriding the version's standard contract code
    #[serde(default)]
    pub code_boc: String,
    /// Overrides the version's default subwallet id
    #[serde(default)]
    pub wallet_id: Option<u32>,
    /// File holding the Ed25519 seed (hex or JSON byte array)
    #[serde(default = "default_seed_path")]
    pub seed_path: String,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            version: default_wallet_version(),
            workchain: 0,
            network: Network::Mainnet,
            code_boc: String::new(),
            wallet_id: None,
            seed_path: default_seed_path(),
        }
    }
}

/// What the wallet tells dapps about itself
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default = "default_app_version")]
    pub app_version: String,
    #[serde(default = "default_max_messages")]
    pub max_messages: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            app_version: default_app_version(),
            max_messages: default_max_messages(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransferConfig {
    /// Seconds a signed transfer stays valid
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NftProofConfig {
    #[serde(default)]
    pub verifier_url: String,
}

fn default_wallet_version() -> WalletVersion {
    WalletVersion::V4R2
}

fn default_seed_path() -> String {
    "./credentials/wallet.seed".to_string()
}

fn default_app_name() -> String {
    env!("CARGO_PKG_NAME").to_string()
}

fn default_app_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_max_messages() -> u32 {
    4
}

fn default_timeout_secs() -> u64 {
    60
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Start with defaults
            .set_default("wallet.version", default_wallet_version().to_string())?
            .set_default("wallet.workchain", 0)?
            .set_default("device.max_messages", default_max_messages() as i64)?
            .set_default("transfer.timeout_secs", default_timeout_secs() as i64)?
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix TONWALLET_)
            .add_source(
                config::Environment::with_prefix("TONWALLET")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !matches!(self.wallet.workchain, 0 | -1) {
            anyhow::bail!("workchain must be 0 or -1, got {}", self.wallet.workchain);
        }

        let max = self.wallet.version.max_messages();
        if self.device.max_messages == 0 || self.device.max_messages as usize > max {
            anyhow::bail!(
                "device.max_messages must be between 1 and {} for {}",
                max,
                self.wallet.version
            );
        }

        if self.transfer.timeout_secs == 0 || self.transfer.timeout_secs > u32::MAX as u64 {
            anyhow::bail!(
                "transfer.timeout_secs must be between 1 and {}, got {}",
                u32::MAX,
                self.transfer.timeout_secs
            );
        }

        if !self.wallet.code_boc.is_empty() {
            Cell::from_boc_base64(&self.wallet.code_boc)
                .context("wallet.code_boc is not a valid base64 BOC")?;
        }

        if !self.nft_proof.verifier_url.is_empty() {
            url::Url::parse(&self.nft_proof.verifier_url)
                .with_context(|| format!("Invalid verifier_url: {}", self.nft_proof.verifier_url))?;
        }

        if self.wallet.network.is_testnet() && self.wallet.wallet_id.is_none() {
            tracing::warn!("Testnet wallet without explicit wallet_id, using the version default");
        }

        Ok(())
    }

    /// Wallet contract code: `wallet.code_boc` if set, else the version's standard code
    pub fn wallet_code(&self) -> Result<Arc<Cell>> {
        if self.wallet.code_boc.is_empty() {
            return standard_code(self.wallet.version)
                .with_context(|| format!("Standard {} code is unreadable", self.wallet.version));
        }
        Ok(Cell::from_boc_base64(&self.wallet.code_boc)?)
    }

    /// The configured wallet for `public_key`
    pub fn build_wallet(&self, public_key: [u8; 32]) -> Result<Wallet> {
        let code = self.wallet_code()?;
        let contract = match self.wallet.wallet_id {
            Some(wallet_id) => WalletContract::with_wallet_id(
                self.wallet.version,
                code,
                public_key,
                self.wallet.workchain,
                wallet_id,
            ),
            None => WalletContract::new(
                self.wallet.version,
                code,
                public_key,
                self.wallet.workchain,
                self.wallet.network,
            ),
        }
        .context("Failed to build wallet contract")?;

        Ok(Wallet::new(contract, self.wallet.network))
    }

    /// Device info announced to dapps on connect
    pub fn device_info(&self) -> DeviceInfo {
        DeviceInfo::new(
            &self.device.app_name,
            &self.device.app_version,
            self.device.max_messages,
        )
    }

    /// Get masked configuration for display (hide secrets)
    pub fn masked_display(&self) -> String {
        format!(
            r#"Configuration:
  Wallet:
    version: {}
    workchain: {}
    network: {}
    wallet_id: {}
    code_boc: {}
    seed_path: {}
  Device:
    app: {} {}
    max_messages: {}
  Transfer:
    timeout: {}s
  NFT proof:
    verifier_url: {}
"#,
            self.wallet.version,
            self.wallet.workchain,
            self.wallet.network,
            self.wallet
                .wallet_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "(default)".to_string()),
            if self.wallet.code_boc.is_empty() {
                "(standard)".to_string()
            } else {
                format!("(custom, {} chars)", self.wallet.code_boc.len())
            },
            self.wallet.seed_path,
            self.device.app_name,
            self.device.app_version,
            self.device.max_messages,
            self.transfer.timeout_secs,
            if self.nft_proof.verifier_url.is_empty() {
                "(not set)".to_string()
            } else {
                mask_url(&self.nft_proof.verifier_url)
            },
        )
    }
}

/// Mask URL for display (hide API keys in query params)
fn mask_url(url: &str) -> String {
    if let Some(idx) = url.find('?') {
        format!("{}?***", &url[..idx])
    } else {
        url.to_string()
    }
}
