//! Standard account addresses
//!
//! Two textual forms exist:
//! - raw: `<workchain>:<64 hex chars>`
//! - friendly: 48 base64 chars over `tag | workchain | hash | crc16`, where the
//!   tag carries the bounceable and testnet-only flags

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use crc::{Crc, CRC_16_XMODEM};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

const TAG_BOUNCEABLE: u8 = 0x11;
const TAG_NON_BOUNCEABLE: u8 = 0x51;
const TAG_TESTNET: u8 = 0x80;

const FRIENDLY_LEN: usize = 48;

/// An `addr_std` account address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address {
    workchain: i32,
    hash: [u8; 32],
}

impl Address {
    /// Address from workchain and account hash
    pub const fn new(workchain: i32, hash: [u8; 32]) -> Self {
        Self { workchain, hash }
    }

    /// Workchain id (0 basechain, -1 masterchain)
    pub fn workchain(&self) -> i32 {
        self.workchain
    }

    /// 256-bit account id
    pub fn hash_part(&self) -> &[u8; 32] {
        &self.hash
    }

    /// Parse the raw `wc:hex` form
    pub fn from_raw(value: &str) -> Result<Self> {
        let (workchain, hash) = value
            .split_once(':')
            .ok_or_else(|| Error::InvalidAddress(format!("missing workchain: {}", value)))?;

        let workchain: i32 = workchain
            .parse()
            .map_err(|_| Error::InvalidAddress(format!("bad workchain: {}", value)))?;
        if !(i8::MIN as i32..=i8::MAX as i32).contains(&workchain) {
            return Err(Error::InvalidAddress(format!(
                "workchain out of range: {}",
                workchain
            )));
        }

        let bytes = hex::decode(hash)
            .map_err(|e| Error::InvalidAddress(format!("bad hash in {}: {}", value, e)))?;
        let hash: [u8; 32] = bytes
            .try_into()
            .map_err(|_| Error::InvalidAddress(format!("hash must be 32 bytes: {}", value)))?;

        Ok(Self { workchain, hash })
    }

    /// Parse the 48-character friendly form (standard or url-safe alphabet)
    pub fn from_friendly(value: &str) -> Result<FriendlyAddress> {
        if value.len() != FRIENDLY_LEN {
            return Err(Error::InvalidAddress(format!(
                "friendly address must be {} chars: {}",
                FRIENDLY_LEN, value
            )));
        }

        let normalized: String = value
            .chars()
            .map(|c| match c {
                '-' => '+',
                '_' => '/',
                other => other,
            })
            .collect();
        let bytes = STANDARD
            .decode(normalized)
            .map_err(|e| Error::InvalidAddress(format!("{}: {}", value, e)))?;
        if bytes.len() != 36 {
            return Err(Error::InvalidAddress(format!("bad length: {}", value)));
        }

        let expected = u16::from_be_bytes([bytes[34], bytes[35]]);
        if CRC16.checksum(&bytes[..34]) != expected {
            return Err(Error::InvalidAddress(format!("checksum mismatch: {}", value)));
        }

        let testnet = bytes[0] & TAG_TESTNET != 0;
        let bounceable = match bytes[0] & !TAG_TESTNET {
            TAG_BOUNCEABLE => true,
            TAG_NON_BOUNCEABLE => false,
            tag => {
                return Err(Error::InvalidAddress(format!(
                    "unknown tag {:#04x}: {}",
                    tag, value
                )))
            }
        };

        let mut hash = [0u8; 32];
        hash.copy_from_slice(&bytes[2..34]);

        Ok(FriendlyAddress {
            address: Self {
                workchain: bytes[1] as i8 as i32,
                hash,
            },
            bounceable,
            testnet,
        })
    }

    /// `workchain:hex` form
    pub fn to_raw(&self) -> String {
        format!("{}:{}", self.workchain, hex::encode(self.hash))
    }

    /// 48-char URL-safe base64 form with tag and crc16
    pub fn to_friendly(&self, bounceable: bool, testnet: bool) -> String {
        let mut tag = if bounceable {
            TAG_BOUNCEABLE
        } else {
            TAG_NON_BOUNCEABLE
        };
        if testnet {
            tag |= TAG_TESTNET;
        }

        let mut bytes = Vec::with_capacity(36);
        bytes.push(tag);
        bytes.push(self.workchain as i8 as u8);
        bytes.extend_from_slice(&self.hash);
        let crc = CRC16.checksum(&bytes);
        bytes.extend_from_slice(&crc.to_be_bytes());

        URL_SAFE.encode(bytes)
    }
}

impl FromStr for Address {
    type Err = Error;

    /// Accepts either textual form; friendly flags are discarded
    fn from_str(s: &str) -> Result<Self> {
        AnyAddress::parse(s).map(|a| a.address())
    }
}

impl TryFrom<String> for Address {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.to_raw()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_raw())
    }
}

/// A friendly address together with the flags it was encoded with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FriendlyAddress {
    pub address: Address,
    pub bounceable: bool,
    pub testnet: bool,
}

/// An address in whichever form the caller supplied it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AnyAddress {
    Raw(Address),
    Friendly(FriendlyAddress),
}

impl AnyAddress {
    /// Parse either form, remembering which one it was
    pub fn parse(value: &str) -> Result<Self> {
        if value.contains(':') {
            Address::from_raw(value).map(AnyAddress::Raw)
        } else {
            Address::from_friendly(value).map(AnyAddress::Friendly)
        }
    }

    /// Underlying address, form dropped
    pub fn address(&self) -> Address {
        match self {
            AnyAddress::Raw(address) => *address,
            AnyAddress::Friendly(friendly) => friendly.address,
        }
    }

    /// Bounce flag implied by the textual form: raw addresses always bounce
    pub fn bounceable(&self) -> bool {
        match self {
            AnyAddress::Raw(_) => true,
            AnyAddress::Friendly(friendly) => friendly.bounceable,
        }
    }
}

impl TryFrom<String> for AnyAddress {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        AnyAddress::parse(&value)
    }
}

impl From<AnyAddress> for String {
    fn from(value: AnyAddress) -> Self {
        value.to_string()
    }
}

impl fmt::Display for AnyAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnyAddress::Raw(address) => f.write_str(&address.to_raw()),
            AnyAddress::Friendly(friendly) => f.write_str(
                &friendly
                    .address
                    .to_friendly(friendly.bounceable, friendly.testnet),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: &str = "0:83dfd552e63729b472fcbcc8c45ebcc6691702558b68ec7527e1ba403a0f31a8";

    #[test]
    fn test_raw_roundtrip() {
        let address = Address::from_raw(RAW).unwrap();
        assert_eq!(address.workchain(), 0);
        assert_eq!(address.to_raw(), RAW);

        let master = Address::from_raw(
            "-1:3333333333333333333333333333333333333333333333333333333333333333",
        )
        .unwrap();
        assert_eq!(master.workchain(), -1);
    }

    #[test]
    fn test_raw_rejects_garbage() {
        assert!(Address::from_raw("0:zz").is_err());
        assert!(Address::from_raw("0:83df").is_err());
        assert!(Address::from_raw("300:83dfd552e63729b472fcbcc8c45ebcc6691702558b68ec7527e1ba403a0f31a8").is_err());
        assert!(Address::from_raw("83dfd552").is_err());
    }

    #[test]
    fn test_friendly_flags() {
        let address = Address::from_raw(RAW).unwrap();

        for (bounceable, testnet) in [(true, false), (false, false), (true, true), (false, true)] {
            let text = address.to_friendly(bounceable, testnet);
            assert_eq!(text.len(), 48);

            let parsed = Address::from_friendly(&text).unwrap();
            assert_eq!(parsed.address, address);
            assert_eq!(parsed.bounceable, bounceable);
            assert_eq!(parsed.testnet, testnet);
        }
    }

    #[test]
    fn test_friendly_prefixes() {
        let address = Address::from_raw(RAW).unwrap();
        assert!(address.to_friendly(true, false).starts_with("EQ"));
        assert!(address.to_friendly(false, false).starts_with("UQ"));
    }

    #[test]
    fn test_friendly_checksum_mismatch() {
        let address = Address::from_raw(RAW).unwrap();
        let mut text = address.to_friendly(true, false).into_bytes();
        let last = text.len() - 1;
        text[last] = if text[last] == b'A' { b'B' } else { b'A' };
        let text = String::from_utf8(text).unwrap();

        assert!(Address::from_friendly(&text).is_err());
    }

    #[test]
    fn test_any_address_bounce() {
        let address = Address::from_raw(RAW).unwrap();

        assert!(AnyAddress::parse(RAW).unwrap().bounceable());
        let non_bounceable = address.to_friendly(false, false);
        assert!(!AnyAddress::parse(&non_bounceable).unwrap().bounceable());
        let bounceable = address.to_friendly(true, false);
        assert!(AnyAddress::parse(&bounceable).unwrap().bounceable());

        assert_eq!(non_bounceable.parse::<Address>().unwrap(), address);
    }
}
