//! TonConnect wallet side
//!
//! Encrypted pairing with a dapp over an untrusted relay:
//! - Session keys and NaCl box sealing
//! - Connect requests, `ton_addr` / `ton_proof` replies
//! - `sendTransaction` requests and their responses
//!
//! # Flow
//!
//! ```text
//! tc:// link → ConnectParameters → build_connect_success → relay
//! relay → Session::open → AppRequest::SendTransaction → TransferIntent
//!       → WalletTransfer (BOC) → build_send_transaction_response_success → relay
//! ```
//!
//! Relay transport itself lives outside this crate.

pub mod connect;
pub mod crypto;
pub mod send_transaction;
pub mod session;

pub use connect::{
    build_connect_error, build_connect_success, ConnectErrorCode, ConnectEvent, ConnectItem,
    ConnectItemReply, ConnectRequestPayload, DeviceInfo, Feature, Manifest,
};
pub use crypto::{KeyPair, NonceSource, OsNonceSource, SessionCrypto, NONCE_LENGTH};
pub use send_transaction::{
    build_send_transaction_response_error, build_send_transaction_response_success, Message,
    SendTransactionErrorCode, SendTransactionParam, SendTransactionRequest,
    SendTransactionResponse,
};
pub use session::{parse_client_id, AppRequest, ConnectParameters, Session, PROTOCOL_VERSION};
