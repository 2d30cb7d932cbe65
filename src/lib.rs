//! TonConnect Wallet Library
//!
//! Wallet side of the TonConnect protocol plus the TON transfer builders its
//! `sendTransaction` flow ends in.

pub mod cli;
pub mod config;
pub mod error;
pub mod proof;
pub mod ton;
pub mod tonconnect;
pub mod transfer;
pub mod wallet;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
pub use tonconnect::{Session, SessionCrypto};
pub use transfer::{build_transfer, TransferIntent, TransferParams};
pub use wallet::{TransferSigner, Wallet, WalletTransfer, WalletTransferBuilder};
