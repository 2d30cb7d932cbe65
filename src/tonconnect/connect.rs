//! Connect request parsing and the wallet's connect reply

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::proof::{unix_now, TonProof};
use crate::wallet::{Network, TransferSigner, Wallet};

use super::crypto::SessionCrypto;
use super::session::{seal_for_client, PROTOCOL_VERSION};

/// Dapp manifest, consumed as-is
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub url: String,
    pub name: String,
    pub icon_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terms_of_use_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privacy_policy_url: Option<String>,
}

impl Manifest {
    /// Domain the ton_proof is bound to
    pub fn host(&self) -> Result<String> {
        let url = Url::parse(&self.url)
            .map_err(|e| Error::InvalidManifest(format!("{}: {}", self.url, e)))?;
        url.host_str()
            .map(str::to_string)
            .ok_or_else(|| Error::InvalidManifest(format!("{} has no host", self.url)))
    }
}

/// An item requested by the dapp
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name")]
pub enum ConnectItem {
    #[serde(rename = "ton_addr")]
    TonAddress,
    #[serde(rename = "ton_proof")]
    TonProof { payload: String },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectRequestPayload {
    pub manifest_url: String,
    #[serde(default)]
    pub items: Vec<ConnectItem>,
}

impl ConnectRequestPayload {
    /// Decode the `r` payload of a connect link
    pub fn parse(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::InvalidRequest(format!("Malformed connect request: {}", e)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name")]
pub enum ConnectItemReply {
    #[serde(rename = "ton_addr", rename_all = "camelCase")]
    TonAddress {
        address: String,
        network: Network,
        public_key: String,
        wallet_state_init: String,
    },
    #[serde(rename = "ton_proof")]
    TonProof { proof: TonProof },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Feature {
    Name(String),
    SendTransaction {
        name: String,
        #[serde(rename = "maxMessages")]
        max_messages: u32,
    },
}

/// Capability descriptor sent with every connect reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub platform: String,
    pub app_name: String,
    pub app_version: String,
    pub max_protocol_version: u32,
    pub features: Vec<Feature>,
}

impl DeviceInfo {
    /// Device info advertising `SendTransaction` with `max_messages`
    pub fn new(app_name: &str, app_version: &str, max_messages: u32) -> Self {
        let platform = match std::env::consts::OS {
            "macos" => "mac",
            other => other,
        };
        Self {
            platform: platform.to_string(),
            app_name: app_name.to_string(),
            app_version: app_version.to_string(),
            max_protocol_version: PROTOCOL_VERSION,
            features: vec![
                Feature::Name("SendTransaction".to_string()),
                Feature::SendTransaction {
                    name: "SendTransaction".to_string(),
                    max_messages,
                },
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u16", into = "u16")]
pub enum ConnectErrorCode {
    UnknownError,
    BadRequest,
    AppManifestNotFound,
    AppManifestContentError,
    UnknownApp,
    UserDeclinedTheConnection,
}

impl ConnectErrorCode {
    /// Human-readable text sent alongside the code
    pub fn message(&self) -> &'static str {
        match self {
            ConnectErrorCode::UnknownError => "Unknown error",
            ConnectErrorCode::BadRequest => "Bad request",
            ConnectErrorCode::AppManifestNotFound => "App manifest not found",
            ConnectErrorCode::AppManifestContentError => "App manifest content error",
            ConnectErrorCode::UnknownApp => "Unknown app",
            ConnectErrorCode::UserDeclinedTheConnection => "User declined the connection",
        }
    }
}

impl From<ConnectErrorCode> for u16 {
    fn from(code: ConnectErrorCode) -> Self {
        match code {
            ConnectErrorCode::UnknownError => 0,
            ConnectErrorCode::BadRequest => 1,
            ConnectErrorCode::AppManifestNotFound => 2,
            ConnectErrorCode::AppManifestContentError => 3,
            ConnectErrorCode::UnknownApp => 100,
            ConnectErrorCode::UserDeclinedTheConnection => 300,
        }
    }
}

impl From<u16> for ConnectErrorCode {
    fn from(code: u16) -> Self {
        match code {
            1 => ConnectErrorCode::BadRequest,
            2 => ConnectErrorCode::AppManifestNotFound,
            3 => ConnectErrorCode::AppManifestContentError,
            100 => ConnectErrorCode::UnknownApp,
            300 => ConnectErrorCode::UserDeclinedTheConnection,
            _ => ConnectErrorCode::UnknownError,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectPayload {
    pub items: Vec<ConnectItemReply>,
    pub device: DeviceInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectErrorPayload {
    pub code: ConnectErrorCode,
    pub message: String,
}

/// Wallet → dapp connect outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ConnectEvent {
    Connect { id: u64, payload: ConnectPayload },
    ConnectError { id: u64, payload: ConnectErrorPayload },
}

/// Answer the understood items and seal the reply for the dapp
///
/// # Arguments
/// * `items` - Items from the connect request, in request order
/// * `wallet` - Wallet being connected
/// * `session_crypto` - Wallet side of the new session
/// * `signer` - Wallet key, used for `ton_proof`
/// * `manifest` - Dapp manifest; its host is the proof domain
/// * `client_id` - Hex X25519 key of the dapp
/// * `device` - Device info to announce
///
/// # Returns
/// Base64 of the sealed `connect` event, or `Ok(None)` when `client_id` is not
/// a valid hex key
pub fn build_connect_success(
    items: &[ConnectItem],
    wallet: &Wallet,
    session_crypto: &SessionCrypto,
    signer: &dyn TransferSigner,
    manifest: &Manifest,
    client_id: &str,
    device: &DeviceInfo,
) -> Result<Option<String>> {
    let event = connect_event(items, wallet, signer, manifest, device)?;
    let envelope = serde_json::to_string(&event)?;

    let sealed = seal_for_client(session_crypto, client_id, &envelope)?;
    if sealed.is_some() {
        info!("Connect reply for {} from {}", manifest.url, wallet.address());
    }
    Ok(sealed)
}

fn connect_event(
    items: &[ConnectItem],
    wallet: &Wallet,
    signer: &dyn TransferSigner,
    manifest: &Manifest,
    device: &DeviceInfo,
) -> Result<ConnectEvent> {
    let mut replies = Vec::with_capacity(items.len());
    for item in items {
        match item {
            ConnectItem::TonAddress => replies.push(ConnectItemReply::TonAddress {
                address: wallet.address().to_raw(),
                network: wallet.network(),
                public_key: hex::encode(wallet.public_key()),
                wallet_state_init: wallet.state_init_boc_base64()?,
            }),
            ConnectItem::TonProof { payload } => {
                let domain = manifest.host()?;
                let proof = TonProof::sign(&wallet.address(), &domain, payload, unix_now(), signer)?;
                debug!("Signed ton_proof for {}", domain);
                replies.push(ConnectItemReply::TonProof { proof });
            }
            ConnectItem::Unknown => warn!("Dropping unknown connect item"),
        }
    }

    Ok(ConnectEvent::Connect {
        id: unix_now(),
        payload: ConnectPayload {
            items: replies,
            device: device.clone(),
        },
    })
}

/// Plain JSON `connect_error` envelope; seal it with [`super::Session::seal`]
pub fn build_connect_error(code: ConnectErrorCode) -> Result<String> {
    let event = ConnectEvent::ConnectError {
        id: unix_now(),
        payload: ConnectErrorPayload {
            code,
            message: code.message().to_string(),
        },
    };
    Ok(serde_json::to_string(&event)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ton::CellBuilder;
    use crate::wallet::{LocalSigner, WalletContract, WalletVersion};
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use std::sync::Arc;

    fn manifest() -> Manifest {
        Manifest {
            url: "https://app.example.org".to_string(),
            name: "Example".to_string(),
            icon_url: "https://app.example.org/icon.png".to_string(),
            terms_of_use_url: None,
            privacy_policy_url: None,
        }
    }

    fn wallet(signer: &LocalSigner) -> Wallet {
        let code = Arc::new(CellBuilder::new().store_uint(0xC0DE, 16).unwrap().build().unwrap());
        let contract =
            WalletContract::new(WalletVersion::V4R2, code, signer.public_key(), 0, Network::Mainnet)
                .unwrap();
        Wallet::new(contract, Network::Mainnet)
    }

    fn open(sealed: &str, dapp: &SessionCrypto, wallet_session: &SessionCrypto) -> ConnectEvent {
        let bytes = STANDARD.decode(sealed).unwrap();
        let plain = dapp
            .decrypt(&bytes, wallet_session.key_pair().public_key())
            .unwrap();
        serde_json::from_slice(&plain).unwrap()
    }

    #[test]
    fn test_parse_request_items() {
        let payload = ConnectRequestPayload::parse(
            r#"{"manifestUrl":"https://a.b/m.json","items":[{"name":"ton_addr"},{"name":"ton_proof","payload":"abc"},{"name":"sign_data","extra":1}]}"#,
        )
        .unwrap();
        assert_eq!(
            payload.items,
            vec![
                ConnectItem::TonAddress,
                ConnectItem::TonProof {
                    payload: "abc".to_string()
                },
                ConnectItem::Unknown
            ]
        );
    }

    #[test]
    fn test_address_only() {
        let signer = LocalSigner::from_seed(&[1u8; 32]).unwrap();
        let wallet = wallet(&signer);
        let dapp = SessionCrypto::new();
        let session = SessionCrypto::new();
        let device = DeviceInfo::new("Wallet", "1.0.0", 4);

        let sealed = build_connect_success(
            &[ConnectItem::TonAddress],
            &wallet,
            &session,
            &signer,
            &manifest(),
            &dapp.session_id(),
            &device,
        )
        .unwrap()
        .unwrap();

        match open(&sealed, &dapp, &session) {
            ConnectEvent::Connect { payload, .. } => {
                assert_eq!(payload.items.len(), 1);
                match &payload.items[0] {
                    ConnectItemReply::TonAddress { address, network, .. } => {
                        assert_eq!(address, &wallet.address().to_raw());
                        assert_eq!(*network, Network::Mainnet);
                    }
                    other => panic!("unexpected reply {:?}", other),
                }
                assert_eq!(payload.device, device);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_address_and_proof() {
        let signer = LocalSigner::from_seed(&[1u8; 32]).unwrap();
        let wallet = wallet(&signer);
        let dapp = SessionCrypto::new();
        let session = SessionCrypto::new();

        let items = [
            ConnectItem::TonAddress,
            ConnectItem::TonProof {
                payload: "abc".to_string(),
            },
            ConnectItem::Unknown,
        ];
        let sealed = build_connect_success(
            &items,
            &wallet,
            &session,
            &signer,
            &manifest(),
            &dapp.session_id(),
            &DeviceInfo::new("Wallet", "1.0.0", 4),
        )
        .unwrap()
        .unwrap();

        let ConnectEvent::Connect { payload, .. } = open(&sealed, &dapp, &session) else {
            panic!("expected connect event");
        };
        assert_eq!(payload.items.len(), 2);
        match &payload.items[1] {
            ConnectItemReply::TonProof { proof } => {
                assert_eq!(proof.payload, "abc");
                assert_eq!(proof.domain.value, "app.example.org");
                assert!(proof.verify(&wallet.address(), &signer.public_key()).unwrap());
            }
            other => panic!("unexpected reply {:?}", other),
        }
    }

    #[test]
    fn test_bad_client_id_yields_none() {
        let signer = LocalSigner::from_seed(&[1u8; 32]).unwrap();
        let result = build_connect_success(
            &[ConnectItem::TonAddress],
            &wallet(&signer),
            &SessionCrypto::new(),
            &signer,
            &manifest(),
            "definitely not hex",
            &DeviceInfo::new("Wallet", "1.0.0", 4),
        )
        .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_envelope_wire_shape() {
        let signer = LocalSigner::from_seed(&[1u8; 32]).unwrap();
        let event = connect_event(
            &[ConnectItem::TonAddress],
            &wallet(&signer),
            &signer,
            &manifest(),
            &DeviceInfo::new("Wallet", "1.0.0", 4),
        )
        .unwrap();
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["event"], "connect");
        assert!(json["id"].is_u64());
        let item = &json["payload"]["items"][0];
        assert_eq!(item["name"], "ton_addr");
        assert_eq!(item["network"], "-239");
        assert!(item["publicKey"].is_string());
        assert!(item["walletStateInit"].is_string());

        let device = &json["payload"]["device"];
        assert_eq!(device["maxProtocolVersion"], 2);
        assert_eq!(device["features"][0], "SendTransaction");
        assert_eq!(device["features"][1]["maxMessages"], 4);
    }

    #[test]
    fn test_connect_error_envelope() {
        let json: serde_json::Value =
            serde_json::from_str(&build_connect_error(ConnectErrorCode::UserDeclinedTheConnection).unwrap())
                .unwrap();
        assert_eq!(json["event"], "connect_error");
        assert_eq!(json["payload"]["code"], 300);
        assert_eq!(ConnectErrorCode::from(100), ConnectErrorCode::UnknownApp);
    }

    #[test]
    fn test_manifest_host() {
        assert_eq!(manifest().host().unwrap(), "app.example.org");
        let mut broken = manifest();
        broken.url = "nowhere".to_string();
        assert!(matches!(broken.host(), Err(Error::InvalidManifest(_))));
    }
}
