//! Toncoin and jetton amounts
//!
//! Amounts travel as `VarUInteger 16` on chain, so anything above 2^120 - 1
//! cannot be encoded. Every conversion into [`Coins`] is fallible.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Nanotons per toncoin
pub const NANO_PER_TON: u128 = 1_000_000_000;

/// Amount in the smallest indivisible unit (nanotons for toncoin)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Coins(u128);

impl Coins {
    pub const ZERO: Coins = Coins(0);

    /// Largest value a `VarUInteger 16` can carry
    pub const MAX_NANO: u128 = (1u128 << 120) - 1;

    /// Infallible constructor for amounts that fit in 64 bits
    pub const fn from_nano(nano: u64) -> Self {
        Coins(nano as u128)
    }

    /// Create from a raw amount, rejecting values the chain cannot encode
    pub fn new(nano: u128) -> Result<Self> {
        if nano > Self::MAX_NANO {
            return Err(Error::InvalidAmount(format!(
                "{} exceeds the 120-bit coin range",
                nano
            )));
        }
        Ok(Coins(nano))
    }

    /// Parse a decimal toncoin amount like `"1.5"` into nanotons
    pub fn from_ton(value: &str) -> Result<Self> {
        let value = value.trim();
        let (whole, fraction) = value.split_once('.').unwrap_or((value, ""));

        if whole.is_empty() && fraction.is_empty() {
            return Err(Error::InvalidAmount(format!("empty amount: {:?}", value)));
        }
        if fraction.len() > 9 {
            return Err(Error::InvalidAmount(format!(
                "more than 9 decimal places: {}",
                value
            )));
        }

        let whole = if whole.is_empty() { 0 } else { parse_digits(whole)? };
        let fraction = if fraction.is_empty() {
            0
        } else {
            parse_digits(fraction)? * 10u128.pow(9 - fraction.len() as u32)
        };

        let nano = whole
            .checked_mul(NANO_PER_TON)
            .and_then(|n| n.checked_add(fraction))
            .ok_or_else(|| Error::InvalidAmount(format!("amount overflow: {}", value)))?;

        Self::new(nano)
    }

    /// Amount in nanotons
    pub fn nano(&self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Sum, or `InvalidAmount` past the 120-bit range
    pub fn checked_add(self, other: Coins) -> Result<Coins> {
        let sum = self
            .0
            .checked_add(other.0)
            .ok_or_else(|| Error::InvalidAmount("amount overflow".to_string()))?;
        Self::new(sum)
    }

    /// Human-readable toncoin amount, trailing zeros trimmed
    pub fn to_ton_string(&self) -> String {
        let whole = self.0 / NANO_PER_TON;
        let fraction = self.0 % NANO_PER_TON;
        if fraction == 0 {
            return whole.to_string();
        }
        let fraction = format!("{:09}", fraction);
        format!("{}.{}", whole, fraction.trim_end_matches('0'))
    }
}

fn parse_digits(digits: &str) -> Result<u128> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidAmount(format!("not a number: {:?}", digits)));
    }
    digits
        .parse::<u128>()
        .map_err(|e| Error::InvalidAmount(format!("{}: {}", digits, e)))
}

impl FromStr for Coins {
    type Err = Error;

    /// Parse an integer amount in the smallest unit
    fn from_str(s: &str) -> Result<Self> {
        Self::new(parse_digits(s)?)
    }
}

impl TryFrom<String> for Coins {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Coins> for String {
    fn from(value: Coins) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_ton() {
        assert_eq!(Coins::from_ton("1").unwrap().nano(), 1_000_000_000);
        assert_eq!(Coins::from_ton("0.5").unwrap().nano(), 500_000_000);
        assert_eq!(Coins::from_ton(".05").unwrap().nano(), 50_000_000);
        assert_eq!(Coins::from_ton("12.000000001").unwrap().nano(), 12_000_000_001);

        assert!(Coins::from_ton("1.0000000001").is_err());
        assert!(Coins::from_ton("abc").is_err());
        assert!(Coins::from_ton("-1").is_err());
        assert!(Coins::from_ton("").is_err());
    }

    #[test]
    fn test_from_str_is_strict() {
        assert_eq!("1000".parse::<Coins>().unwrap(), Coins::from_nano(1000));
        assert!("1e9".parse::<Coins>().is_err());
        assert!(" 1".parse::<Coins>().is_err());
        assert!("".parse::<Coins>().is_err());
    }

    #[test]
    fn test_range_limit() {
        assert!(Coins::new(Coins::MAX_NANO).is_ok());
        assert!(Coins::new(Coins::MAX_NANO + 1).is_err());
        assert!(Coins::new(Coins::MAX_NANO)
            .unwrap()
            .checked_add(Coins::from_nano(1))
            .is_err());
    }

    #[test]
    fn test_to_ton_string() {
        assert_eq!(Coins::from_nano(1_500_000_000).to_ton_string(), "1.5");
        assert_eq!(Coins::from_nano(2_000_000_000).to_ton_string(), "2");
        assert_eq!(Coins::from_nano(1).to_ton_string(), "0.000000001");
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&Coins::from_nano(42)).unwrap();
        assert_eq!(json, "\"42\"");
        let back: Coins = serde_json::from_str("\"42\"").unwrap();
        assert_eq!(back, Coins::from_nano(42));
        assert!(serde_json::from_str::<Coins>("\"4x2\"").is_err());
    }
}
