//! `sendTransaction` requests and their responses
//!
//! Parsing is lenient: a malformed param is dropped and an unreadable amount
//! becomes zero. Only address errors abort the whole request.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::ton::{AnyAddress, Coins};
use crate::transfer::{RawMessage, TransferIntent};
use crate::wallet::Network;

use super::crypto::SessionCrypto;
use super::session::seal_for_client;

/// RPC method name dapps use for transfers
pub const SEND_TRANSACTION_METHOD: &str = "sendTransaction";

/// Request ids arrive as strings or numbers depending on the dapp SDK
pub(crate) fn deserialize_id<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(text) => text,
        Id::Number(number) => number.to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub address: AnyAddress,
    pub amount: Coins,
    /// Base64 BOC
    pub state_init: Option<String>,
    /// Base64 BOC
    pub payload: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendTransactionParam {
    pub messages: Vec<Message>,
    pub valid_until: u64,
    pub from: Option<AnyAddress>,
    pub network: Option<Network>,
}

impl SendTransactionParam {
    /// Whether `valid_until` lies before `now` (unix seconds)
    pub fn is_expired(&self, now: u64) -> bool {
        self.valid_until < now
    }

    /// The messages as a raw-signing intent, verbatim
    pub fn to_intent(&self) -> TransferIntent {
        TransferIntent::SignRaw {
            messages: self
                .messages
                .iter()
                .map(|message| RawMessage {
                    address: message.address,
                    amount: message.amount,
                    state_init: message.state_init.clone(),
                    body: message.payload.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendTransactionRequest {
    pub id: String,
    pub params: Vec<SendTransactionParam>,
}

#[derive(Deserialize)]
struct RequestWire {
    method: String,
    #[serde(default)]
    params: Vec<Value>,
    #[serde(default, deserialize_with = "deserialize_id")]
    id: String,
}

#[derive(Deserialize)]
struct ParamWire {
    #[serde(alias = "validUntil")]
    valid_until: u64,
    messages: Vec<MessageWire>,
    #[serde(default)]
    from: Option<String>,
    #[serde(default)]
    network: Option<Network>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageWire {
    address: String,
    #[serde(default)]
    amount: Value,
    #[serde(default)]
    state_init: Option<String>,
    #[serde(default)]
    payload: Option<String>,
}

impl SendTransactionRequest {
    /// Decode a `sendTransaction` RPC request
    ///
    /// Params may arrive as JSON strings or objects. A param that fails to decode,
    /// or that names an unparsable address, is logged and dropped; the rest of the
    /// batch survives. Unreadable amounts become zero.
    ///
    /// # Returns
    /// The request, or `MethodNotSupported` when `method` is anything else
    pub fn parse(json: &str) -> Result<Self> {
        let wire: RequestWire = serde_json::from_str(json)
            .map_err(|e| Error::InvalidRequest(format!("Malformed sendTransaction request: {}", e)))?;
        if wire.method != SEND_TRANSACTION_METHOD {
            return Err(Error::MethodNotSupported(wire.method));
        }

        let mut params = Vec::with_capacity(wire.params.len());
        for raw in &wire.params {
            let decoded = match raw {
                Value::String(text) => serde_json::from_str::<ParamWire>(text),
                other => serde_json::from_value::<ParamWire>(other.clone()),
            };
            match decoded.map_err(Error::from).and_then(convert_param) {
                Ok(param) => params.push(param),
                Err(e) => warn!("Dropping malformed sendTransaction param in request {}: {}", wire.id, e),
            }
        }

        debug!(
            "Parsed sendTransaction {} with {}/{} param(s)",
            wire.id,
            params.len(),
            wire.params.len()
        );
        Ok(Self { id: wire.id, params })
    }
}

fn convert_param(wire: ParamWire) -> Result<SendTransactionParam> {
    let messages = wire
        .messages
        .into_iter()
        .map(|message| {
            Ok(Message {
                address: AnyAddress::parse(&message.address)?,
                amount: lenient_amount(&message.amount),
                state_init: message.state_init,
                payload: message.payload,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let from = wire.from.as_deref().map(AnyAddress::parse).transpose()?;

    Ok(SendTransactionParam {
        messages,
        valid_until: wire.valid_until,
        from,
        network: wire.network,
    })
}

// Unreadable amounts are indistinguishable from an explicit zero downstream.
fn lenient_amount(value: &Value) -> Coins {
    let parsed = match value {
        Value::String(text) => text.parse::<Coins>().ok(),
        Value::Number(number) => number.as_u64().map(Coins::from_nano),
        _ => None,
    };
    parsed.unwrap_or_else(|| {
        warn!("Unreadable message amount {}, using 0", value);
        Coins::ZERO
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u16", into = "u16")]
pub enum SendTransactionErrorCode {
    UnknownError,
    BadRequest,
    UnknownApp,
    UserDeclinedTransaction,
    MethodNotSupported,
}

impl From<SendTransactionErrorCode> for u16 {
    fn from(code: SendTransactionErrorCode) -> Self {
        match code {
            SendTransactionErrorCode::UnknownError => 0,
            SendTransactionErrorCode::BadRequest => 1,
            SendTransactionErrorCode::UnknownApp => 10,
            SendTransactionErrorCode::UserDeclinedTransaction => 300,
            SendTransactionErrorCode::MethodNotSupported => 400,
        }
    }
}

impl From<u16> for SendTransactionErrorCode {
    fn from(code: u16) -> Self {
        match code {
            1 => SendTransactionErrorCode::BadRequest,
            10 => SendTransactionErrorCode::UnknownApp,
            300 => SendTransactionErrorCode::UserDeclinedTransaction,
            400 => SendTransactionErrorCode::MethodNotSupported,
            _ => SendTransactionErrorCode::UnknownError,
        }
    }
}

impl From<&Error> for SendTransactionErrorCode {
    fn from(error: &Error) -> Self {
        match error {
            Error::MethodNotSupported(_) => SendTransactionErrorCode::MethodNotSupported,
            e if e.is_protocol_error() || e.is_build_error() => SendTransactionErrorCode::BadRequest,
            _ => SendTransactionErrorCode::UnknownError,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseError {
    pub code: SendTransactionErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SendTransactionResponse {
    Success { result: String, id: String },
    Error { error: ResponseError, id: String },
}

/// Seal `{result: boc, id}` for the dapp; `Ok(None)` on a bad client id
pub fn build_send_transaction_response_success(
    session_crypto: &SessionCrypto,
    boc: &str,
    id: &str,
    client_id: &str,
) -> Result<Option<String>> {
    let response = SendTransactionResponse::Success {
        result: boc.to_string(),
        id: id.to_string(),
    };
    seal_for_client(session_crypto, client_id, &serde_json::to_string(&response)?)
}

/// Seal `{error: {code, message}, id}` for the dapp
///
/// # Arguments
/// * `session_crypto` - Wallet side of the session
/// * `code` - Reason the request was not signed
/// * `id` - Id of the request being answered
/// * `client_id` - Hex X25519 key of the dapp
///
/// # Returns
/// Base64 of the sealed response, or `Ok(None)` on a bad client id
pub fn build_send_transaction_response_error(
    session_crypto: &SessionCrypto,
    code: SendTransactionErrorCode,
    id: &str,
    client_id: &str,
) -> Result<Option<String>> {
    let response = SendTransactionResponse::Error {
        error: ResponseError {
            code,
            message: String::new(),
        },
        id: id.to_string(),
    };
    seal_for_client(session_crypto, client_id, &serde_json::to_string(&response)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;

    const RAW: &str = "0:83dfd552e63729b472fcbcc8c45ebcc6691702558b68ec7527e1ba403a0f31a8";

    fn request(params: &[&str]) -> String {
        serde_json::json!({
            "method": "sendTransaction",
            "params": params,
            "id": "42",
        })
        .to_string()
    }

    #[test]
    fn test_parse_valid_param() {
        let param = format!(
            r#"{{"valid_until":1700000000,"from":"{}","network":"-239","messages":[{{"address":"{}","amount":"1000000000","payload":"te6c"}}]}}"#,
            RAW, RAW
        );
        let parsed = SendTransactionRequest::parse(&request(&[param.as_str()])).unwrap();

        assert_eq!(parsed.id, "42");
        assert_eq!(parsed.params.len(), 1);
        let param = &parsed.params[0];
        assert_eq!(param.valid_until, 1_700_000_000);
        assert_eq!(param.network, Some(Network::Mainnet));
        assert_eq!(param.messages[0].amount, Coins::from_nano(1_000_000_000));
        assert_eq!(param.messages[0].payload.as_deref(), Some("te6c"));
        assert!(param.messages[0].state_init.is_none());
    }

    #[test]
    fn test_malformed_param_dropped() {
        let good = format!(r#"{{"valid_until":1,"messages":[{{"address":"{}","amount":"1"}}]}}"#, RAW);
        let missing_valid_until = format!(r#"{{"messages":[{{"address":"{}","amount":"1"}}]}}"#, RAW);
        let garbage = "{not json";

        let parsed =
            SendTransactionRequest::parse(&request(&[good.as_str(), missing_valid_until.as_str(), garbage])).unwrap();
        assert_eq!(parsed.params.len(), 1);
    }

    #[test]
    fn test_unreadable_amount_is_zero() {
        let param = format!(r#"{{"valid_until":1,"messages":[{{"address":"{}","amount":"lots"}}]}}"#, RAW);
        let parsed = SendTransactionRequest::parse(&request(&[param.as_str()])).unwrap();
        assert_eq!(parsed.params[0].messages[0].amount, Coins::ZERO);
    }

    #[test]
    fn test_bad_address_drops_only_its_param() {
        let good = format!(r#"{{"valid_until":1,"messages":[{{"address":"{}","amount":"1"}}]}}"#, RAW);
        let bad_address = r#"{"valid_until":2,"messages":[{"address":"0:zz","amount":"1"}]}"#;
        let bad_from = format!(
            r#"{{"valid_until":3,"from":"nowhere","messages":[{{"address":"{}","amount":"1"}}]}}"#,
            RAW
        );

        let parsed =
            SendTransactionRequest::parse(&request(&[good.as_str(), bad_address, bad_from.as_str()])).unwrap();
        assert_eq!(parsed.params.len(), 1);
        assert_eq!(parsed.params[0].valid_until, 1);
    }

    #[test]
    fn test_all_params_bad_yields_empty_request() {
        let bad_address = r#"{"valid_until":2,"messages":[{"address":"0:zz","amount":"1"}]}"#;
        let parsed = SendTransactionRequest::parse(&request(&[bad_address])).unwrap();
        assert!(parsed.params.is_empty());
    }

    #[test]
    fn test_wrong_method() {
        let json = r#"{"method":"signData","params":[],"id":"1"}"#;
        assert!(matches!(
            SendTransactionRequest::parse(json),
            Err(Error::MethodNotSupported(_))
        ));
    }

    #[test]
    fn test_expiry_and_intent() {
        let param = format!(r#"{{"valid_until":100,"messages":[{{"address":"{}","amount":"7"}}]}}"#, RAW);
        let parsed = SendTransactionRequest::parse(&request(&[param.as_str()])).unwrap();
        let param = &parsed.params[0];

        assert!(!param.is_expired(100));
        assert!(param.is_expired(101));

        match param.to_intent() {
            TransferIntent::SignRaw { messages } => {
                assert_eq!(messages.len(), 1);
                assert_eq!(messages[0].amount, Coins::from_nano(7));
                assert!(messages[0].address.bounceable());
            }
            other => panic!("unexpected intent {:?}", other),
        }
    }

    #[test]
    fn test_responses_reach_client() {
        let wallet = SessionCrypto::new();
        let dapp = SessionCrypto::new();

        let sealed = build_send_transaction_response_success(&wallet, "te6cc", "42", &dapp.session_id())
            .unwrap()
            .unwrap();
        let plain = dapp
            .decrypt(&STANDARD.decode(sealed).unwrap(), wallet.key_pair().public_key())
            .unwrap();
        let json: Value = serde_json::from_slice(&plain).unwrap();
        assert_eq!(json, serde_json::json!({"result": "te6cc", "id": "42"}));

        let sealed = build_send_transaction_response_error(
            &wallet,
            SendTransactionErrorCode::UserDeclinedTransaction,
            "42",
            &dapp.session_id(),
        )
        .unwrap()
        .unwrap();
        let plain = dapp
            .decrypt(&STANDARD.decode(sealed).unwrap(), wallet.key_pair().public_key())
            .unwrap();
        let json: Value = serde_json::from_slice(&plain).unwrap();
        assert_eq!(json["error"]["code"], 300);
        assert_eq!(json["error"]["message"], "");
        assert_eq!(json["id"], "42");

        assert!(build_send_transaction_response_success(&wallet, "x", "1", "xyz")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_error_code_mapping() {
        assert_eq!(
            SendTransactionErrorCode::from(&Error::MethodNotSupported("x".to_string())),
            SendTransactionErrorCode::MethodNotSupported
        );
        assert_eq!(
            SendTransactionErrorCode::from(&Error::MissingField("x".to_string())),
            SendTransactionErrorCode::BadRequest
        );
        assert_eq!(u16::from(SendTransactionErrorCode::UnknownApp), 10);
    }
}
