//! NFT ownership transfers (TEP-62)

use std::sync::Arc;

use crate::error::Result;
use crate::ton::{comment_body, Address, AnyAddress, Cell, CellBuilder, Coins, InternalMessage};

/// TEP-62 `transfer`
pub const NFT_TRANSFER_OP: u32 = 0x5fcc_3d14;

pub const NFT_TRANSFER_TON: Coins = Coins::from_nano(50_000_000);
pub const NFT_FORWARD_TON_AMOUNT: Coins = Coins::from_nano(1);

/// TEP-62 transfer body handing the item to `new_owner`
///
/// Excess TON returns to `response_destination`. A non-zero `forward_amount`
/// makes the item notify the new owner with `forward_payload`.
pub fn nft_transfer_body(
    query_id: u64,
    new_owner: &Address,
    response_destination: &Address,
    forward_amount: Coins,
    forward_payload: Option<Cell>,
) -> Result<Cell> {
    let mut builder = CellBuilder::new();
    builder
        .store_uint(NFT_TRANSFER_OP as u64, 32)?
        .store_uint(query_id, 64)?
        .store_address(new_owner)?
        .store_address(response_destination)?
        .store_bit(false)? // no custom payload
        .store_coins(forward_amount)?;

    match forward_payload {
        Some(payload) => builder.store_bit(true)?.store_reference(Arc::new(payload))?,
        None => builder.store_bit(false)?,
    };
    builder.build()
}

/// Excess TON returns to `sender`
pub fn build_nft_message(
    sender: &Address,
    nft_address: &Address,
    recipient: &AnyAddress,
    forward_payload: Option<&str>,
    query_id: u64,
) -> Result<InternalMessage> {
    let forward_payload = forward_payload
        .filter(|text| !text.is_empty())
        .map(comment_body)
        .transpose()?;

    let body = nft_transfer_body(
        query_id,
        &recipient.address(),
        sender,
        NFT_FORWARD_TON_AMOUNT,
        forward_payload,
    )?;

    Ok(InternalMessage::new(*nft_address, NFT_TRANSFER_TON, true).with_body(body))
}
