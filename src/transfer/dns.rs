//! .ton domain record changes
//!
//! `change_dns_record#4eb1f0f9 query_id:u64 key:uint256 value:(Maybe ^Cell)`
//! sent to the domain NFT. Renewal is a change with a zero key and no value.

use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::ton::{Address, Cell, CellBuilder, Coins, InternalMessage};

use super::intent::DnsAction;

/// `change_dns_record` op of TON DNS items
pub const CHANGE_DNS_RECORD_OP: u32 = 0x4eb1_f0f9;
/// `dns_smc_address#9fd3` record tag
pub const DNS_SMC_ADDRESS_PREFIX: u64 = 0x9fd3;

/// Record key of the `wallet` category
pub fn wallet_record_key() -> [u8; 32] {
    Sha256::digest(b"wallet").into()
}

fn smc_address_record(address: &Address) -> Result<Cell> {
    CellBuilder::new()
        .store_uint(DNS_SMC_ADDRESS_PREFIX, 16)?
        .store_address(address)?
        .store_uint(0, 8)? // no capability flags
        .build()
}

/// Body setting, clearing or renewing the `wallet` record
pub fn change_dns_record_body(query_id: u64, action: &DnsAction) -> Result<Cell> {
    let (key, value) = match action {
        DnsAction::Link { address } => (wallet_record_key(), Some(Arc::new(smc_address_record(address)?))),
        DnsAction::Unlink => (wallet_record_key(), None),
        DnsAction::Renew => ([0u8; 32], None),
    };

    CellBuilder::new()
        .store_uint(CHANGE_DNS_RECORD_OP as u64, 32)?
        .store_uint(query_id, 64)?
        .store_bytes(&key)?
        .store_maybe_reference(value)?
        .build()
}

/// The NFT's state init goes along only while the NFT is undeployed
pub fn build_dns_message(
    nft_address: &Address,
    action: &DnsAction,
    amount: Coins,
    deployed: bool,
    nft_state_init: Option<&str>,
    query_id: u64,
) -> Result<InternalMessage> {
    let state_init = if deployed {
        None
    } else {
        let encoded = nft_state_init.ok_or_else(|| Error::MissingField("nftStateInit".to_string()))?;
        Some(Cell::from_boc_base64(encoded)?)
    };

    Ok(InternalMessage::new(*nft_address, amount, true)
        .with_state_init(state_init)
        .with_body(change_dns_record_body(query_id, action)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nft() -> Address {
        Address::new(0, [5u8; 32])
    }

    #[test]
    fn test_link_record() {
        let target = Address::new(0, [6u8; 32]);
        let message = build_dns_message(
            &nft(),
            &DnsAction::Link { address: target },
            Coins::from_nano(20_000_000),
            true,
            None,
            3,
        )
        .unwrap();
        assert!(message.state_init.is_none());

        let body = message.body.unwrap();
        let mut slice = body.parse();
        assert_eq!(slice.load_uint(32).unwrap(), CHANGE_DNS_RECORD_OP as u64);
        assert_eq!(slice.load_uint(64).unwrap(), 3);
        assert_eq!(slice.load_bytes(32).unwrap(), wallet_record_key().to_vec());

        let value = slice.load_maybe_reference().unwrap().unwrap();
        let mut record = value.parse();
        assert_eq!(record.load_uint(16).unwrap(), DNS_SMC_ADDRESS_PREFIX);
        assert_eq!(record.load_address().unwrap(), Some(target));
    }

    #[test]
    fn test_unlink_and_renew() {
        let body = change_dns_record_body(1, &DnsAction::Unlink).unwrap();
        let mut slice = body.parse();
        slice.load_uint(32).unwrap();
        slice.load_uint(64).unwrap();
        assert_eq!(slice.load_bytes(32).unwrap(), wallet_record_key().to_vec());
        assert!(slice.load_maybe_reference().unwrap().is_none());

        let body = change_dns_record_body(1, &DnsAction::Renew).unwrap();
        let mut slice = body.parse();
        slice.load_uint(32).unwrap();
        slice.load_uint(64).unwrap();
        assert_eq!(slice.load_bytes(32).unwrap(), vec![0u8; 32]);
        assert!(!slice.load_bit().unwrap());
    }

    #[test]
    fn test_undeployed_nft_carries_state_init() {
        let init = CellBuilder::new().store_uint(0xAB, 8).unwrap().build().unwrap();
        let encoded = init.to_boc_base64().unwrap();

        let message = build_dns_message(
            &nft(),
            &DnsAction::Renew,
            Coins::from_nano(1),
            false,
            Some(&encoded),
            1,
        )
        .unwrap();
        assert_eq!(message.state_init.unwrap().hash(), init.hash());

        assert!(matches!(
            build_dns_message(&nft(), &DnsAction::Renew, Coins::from_nano(1), false, None, 1),
            Err(Error::MissingField(_))
        ));
    }
}
