//! Pairing sessions and the bridge messages exchanged over them

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::error::{Error, Result};

use super::connect::ConnectRequestPayload;
use super::crypto::SessionCrypto;
use super::send_transaction::SendTransactionRequest;

/// Protocol version spoken by this wallet
pub const PROTOCOL_VERSION: u32 = 2;

/// Decode a hex client id into the dapp's public key
pub fn parse_client_id(client_id: &str) -> Option<[u8; 32]> {
    hex::decode(client_id).ok()?.try_into().ok()
}

/// Encrypt a JSON envelope to `client_id` and base64 it
///
/// `Ok(None)` means the client id is not a usable key.
pub fn seal_for_client(crypto: &SessionCrypto, client_id: &str, envelope: &str) -> Result<Option<String>> {
    let Some(client_key) = parse_client_id(client_id) else {
        warn!("Client id is not a 32-byte hex key: {}", client_id);
        return Ok(None);
    };
    let sealed = crypto.encrypt(envelope.as_bytes(), &client_key)?;
    Ok(Some(STANDARD.encode(sealed)))
}

/// A dapp pairing: the dapp's key plus our own session keypair
#[derive(Debug, Clone)]
pub struct Session {
    client_id: String,
    crypto: SessionCrypto,
}

impl Session {
    /// Session with a dapp identified by its hex client id
    pub fn new(client_id: impl Into<String>, crypto: SessionCrypto) -> Self {
        Self {
            client_id: client_id.into(),
            crypto,
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn crypto(&self) -> &SessionCrypto {
        &self.crypto
    }

    /// Client id as a key; `None` if it is not 32 hex bytes
    pub fn client_public_key(&self) -> Option<[u8; 32]> {
        parse_client_id(&self.client_id)
    }

    /// Encrypt `envelope` for the dapp and base64 it
    pub fn seal(&self, envelope: &str) -> Result<Option<String>> {
        seal_for_client(&self.crypto, &self.client_id, envelope)
    }

    /// Decrypt a base64 bridge message from the dapp and route it
    pub fn open(&self, message: &str) -> Result<AppRequest> {
        let client_key = self
            .client_public_key()
            .ok_or_else(|| Error::InvalidRequest(format!("Bad client id: {}", self.client_id)))?;

        let sealed = STANDARD.decode(message.trim())?;
        let plain = self.crypto.decrypt(&sealed, &client_key)?;
        if plain.is_empty() {
            return Err(Error::Decryption("message shorter than nonce".to_string()));
        }
        let json = String::from_utf8(plain)
            .map_err(|e| Error::Deserialization(format!("bridge message is not UTF-8: {}", e)))?;

        AppRequest::parse(&json)
    }
}

/// Parameters of a `tc://` (or universal link) connect request
#[derive(Debug, Clone)]
pub struct ConnectParameters {
    pub version: u32,
    pub client_id: String,
    pub request: ConnectRequestPayload,
    pub return_strategy: Option<String>,
}

impl ConnectParameters {
    /// Parse a `tc://` or universal connect link
    pub fn parse(link: &str) -> Result<Self> {
        let url = Url::parse(link.trim())
            .map_err(|e| Error::InvalidRequest(format!("Bad connect link: {}", e)))?;

        let mut version = None;
        let mut client_id = None;
        let mut request = None;
        let mut return_strategy = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "v" => version = Some(value.into_owned()),
                "id" => client_id = Some(value.into_owned()),
                "r" => request = Some(value.into_owned()),
                "ret" => return_strategy = Some(value.into_owned()),
                _ => {}
            }
        }

        let version: u32 = version
            .ok_or_else(|| Error::MissingField("v".to_string()))?
            .parse()
            .map_err(|_| Error::InvalidRequest("protocol version is not a number".to_string()))?;
        if version != PROTOCOL_VERSION {
            return Err(Error::InvalidRequest(format!("Unsupported protocol version {}", version)));
        }

        let client_id = client_id.ok_or_else(|| Error::MissingField("id".to_string()))?;
        if parse_client_id(&client_id).is_none() {
            return Err(Error::InvalidRequest(format!("Bad client id: {}", client_id)));
        }

        let request = request.ok_or_else(|| Error::MissingField("r".to_string()))?;
        let request = ConnectRequestPayload::parse(&request)?;

        debug!("Connect link from client {} for {}", client_id, request.manifest_url);
        Ok(Self {
            version,
            client_id,
            request,
            return_strategy,
        })
    }
}

/// A decrypted request coming from the dapp
#[derive(Debug, Clone)]
pub enum AppRequest {
    SendTransaction(SendTransactionRequest),
    Disconnect { id: String },
}

#[derive(Deserialize)]
struct RequestHeader {
    method: String,
    #[serde(default, deserialize_with = "super::send_transaction::deserialize_id")]
    id: String,
}

impl AppRequest {
    /// Route a decrypted bridge message by its `method`
    pub fn parse(json: &str) -> Result<Self> {
        let header: RequestHeader = serde_json::from_str(json)
            .map_err(|e| Error::InvalidRequest(format!("Malformed app request: {}", e)))?;

        match header.method.as_str() {
            "sendTransaction" => Ok(AppRequest::SendTransaction(SendTransactionRequest::parse(json)?)),
            "disconnect" => Ok(AppRequest::Disconnect { id: header.id }),
            other => Err(Error::MethodNotSupported(other.to_string())),
        }
    }

    /// Id to echo in the response
    pub fn id(&self) -> &str {
        match self {
            AppRequest::SendTransaction(request) => &request.id,
            AppRequest::Disconnect { id } => id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paired() -> (Session, SessionCrypto) {
        let dapp = SessionCrypto::new();
        let session = Session::new(dapp.session_id(), SessionCrypto::new());
        (session, dapp)
    }

    fn from_dapp(session: &Session, dapp: &SessionCrypto, json: &str) -> String {
        let sealed = dapp
            .encrypt(json.as_bytes(), session.crypto().key_pair().public_key())
            .unwrap();
        STANDARD.encode(sealed)
    }

    #[test]
    fn test_parse_client_id() {
        assert!(parse_client_id(&"ab".repeat(32)).is_some());
        assert!(parse_client_id("abcd").is_none());
        assert!(parse_client_id(&"zz".repeat(32)).is_none());
    }

    #[test]
    fn test_seal_is_readable_by_client() {
        let (session, dapp) = paired();
        let sealed = session.seal(r#"{"event":"disconnect"}"#).unwrap().unwrap();

        let bytes = STANDARD.decode(sealed).unwrap();
        let opened = dapp
            .decrypt(&bytes, session.crypto().key_pair().public_key())
            .unwrap();
        assert_eq!(opened, br#"{"event":"disconnect"}"#);
    }

    #[test]
    fn test_seal_with_bad_client_id() {
        let session = Session::new("not-hex", SessionCrypto::new());
        assert!(session.seal("{}").unwrap().is_none());
    }

    #[test]
    fn test_open_routes_requests() {
        let (session, dapp) = paired();

        let disconnect = from_dapp(&session, &dapp, r#"{"method":"disconnect","params":[],"id":"7"}"#);
        match session.open(&disconnect).unwrap() {
            AppRequest::Disconnect { id } => assert_eq!(id, "7"),
            other => panic!("unexpected request {:?}", other),
        }

        let param = r#"{"valid_until":1700000000,"messages":[{"address":"0:0000000000000000000000000000000000000000000000000000000000000000","amount":"5"}]}"#;
        let send = serde_json::json!({"method":"sendTransaction","params":[param],"id":8}).to_string();
        let request = session.open(&from_dapp(&session, &dapp, &send)).unwrap();
        assert_eq!(request.id(), "8");
        assert!(matches!(request, AppRequest::SendTransaction(ref r) if r.params.len() == 1));

        let sign_data = from_dapp(&session, &dapp, r#"{"method":"signData","params":[],"id":"9"}"#);
        assert!(matches!(session.open(&sign_data), Err(Error::MethodNotSupported(_))));
    }

    #[test]
    fn test_connect_link() {
        let client = "ab".repeat(32);
        let request = r#"{"manifestUrl":"https://app.example/tonconnect-manifest.json","items":[{"name":"ton_addr"}]}"#;
        let mut url = Url::parse("tc://").unwrap();
        url.query_pairs_mut()
            .append_pair("v", "2")
            .append_pair("id", &client)
            .append_pair("r", request)
            .append_pair("ret", "none");

        let params = ConnectParameters::parse(url.as_str()).unwrap();
        assert_eq!(params.version, 2);
        assert_eq!(params.client_id, client);
        assert_eq!(params.request.items.len(), 1);
        assert_eq!(params.return_strategy.as_deref(), Some("none"));
    }

    #[test]
    fn test_connect_link_rejects_missing_parts() {
        assert!(ConnectParameters::parse("tc://?v=2&r=%7B%7D").is_err());
        assert!(ConnectParameters::parse("tc://?v=1&id=00").is_err());
    }
}
