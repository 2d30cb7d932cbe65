//! Jetton transfers (TEP-74)
//!
//! ```text
//! transfer#0f8a7ea5 query_id:u64 amount:Coins destination:Address
//!     response_destination:Address custom_payload:(Maybe ^Cell)
//!     forward_ton_amount:Coins forward_payload:(Either Cell ^Cell)
//! ```

use std::sync::Arc;

use crate::error::Result;
use crate::ton::{comment_body, Address, AnyAddress, Cell, CellBuilder, Coins, InternalMessage};

/// TEP-74 `transfer`
pub const JETTON_TRANSFER_OP: u32 = 0x0f8a_7ea5;

/// TON attached to the sender's jetton wallet to pay for the transfer
pub const JETTON_TRANSFER_TON: Coins = Coins::from_nano(50_000_000);
pub const JETTON_TRANSFER_TON_WITH_CUSTOM_PAYLOAD: Coins = Coins::from_nano(100_000_000);

/// Enough to trigger a transfer notification at the recipient
pub const FORWARD_TON_AMOUNT: Coins = Coins::from_nano(1);

#[allow(clippy::too_many_arguments)]
pub fn jetton_transfer_body(
    query_id: u64,
    amount: Coins,
    destination: &Address,
    response_destination: &Address,
    custom_payload: Option<Arc<Cell>>,
    forward_ton_amount: Coins,
    forward_payload: Option<Cell>,
) -> Result<Cell> {
    let mut builder = CellBuilder::new();
    builder
        .store_uint(JETTON_TRANSFER_OP as u64, 32)?
        .store_uint(query_id, 64)?
        .store_coins(amount)?
        .store_address(destination)?
        .store_address(response_destination)?
        .store_maybe_reference(custom_payload)?
        .store_coins(forward_ton_amount)?;

    match forward_payload {
        Some(payload) => builder.store_bit(true)?.store_reference(Arc::new(payload))?,
        None => builder.store_bit(false)?,
    };
    builder.build()
}

/// Transfer sent to the sender's own jetton wallet, which moves the tokens on
#[allow(clippy::too_many_arguments)]
pub fn build_jetton_message(
    sender: &Address,
    jetton_wallet: &Address,
    amount: Coins,
    recipient: &AnyAddress,
    comment: Option<&str>,
    custom_payload: Option<Arc<Cell>>,
    response_address: Option<&Address>,
    query_id: u64,
) -> Result<InternalMessage> {
    let attached = if custom_payload.is_some() {
        JETTON_TRANSFER_TON_WITH_CUSTOM_PAYLOAD
    } else {
        JETTON_TRANSFER_TON
    };

    let forward_payload = comment
        .filter(|text| !text.is_empty())
        .map(comment_body)
        .transpose()?;

    let body = jetton_transfer_body(
        query_id,
        amount,
        &recipient.address(),
        response_address.unwrap_or(sender),
        custom_payload,
        FORWARD_TON_AMOUNT,
        forward_payload,
    )?;

    Ok(InternalMessage::new(*jetton_wallet, attached, true).with_body(body))
}
