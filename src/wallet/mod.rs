//! Wallet module
//!
//! Provides the wallet-side half of a transfer:
//! - Versioned wallet contracts (v3R1/v3R2, v4R1/v4R2, v5R1) and their standard code
//! - Signing backends behind a trait (local Ed25519 key or anything else)
//! - Seed file loading
//! - Signed transfer construction
//!
//! # Architecture
//!
//! ```text
//! TransferIntent → per-kind builder → WalletTransferBuilder → WalletTransfer (BOC)
//!                                            ↑
//!                                     TransferSigner
//! ```
//!
//! # Scope
//!
//! Seqno, balances and broadcast are the caller's business. Nothing here
//! performs I/O apart from reading a seed file on request.

pub mod code;
pub mod contract;
pub mod credentials;
pub mod signer;
pub mod transfer;
pub mod types;

pub use code::{standard_code, standard_code_boc};
pub use contract::{WalletContract, WalletVersion, DEFAULT_WALLET_ID};
pub use credentials::load_signer;
pub use signer::{verify_signature, LocalSigner, TransferSigner};
pub use transfer::{WalletTransfer, WalletTransferBuilder};
pub use types::{Network, Wallet};
