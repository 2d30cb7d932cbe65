//! Staking pool deposits and withdrawals
//!
//! Three pool families, each with its own wire layout:
//!
//! | Pool      | Deposit                            | Withdraw                               |
//! |-----------|------------------------------------|----------------------------------------|
//! | Whales    | op 0x7bcd1fef to pool              | op 0xda803efd to pool                  |
//! | Liquid TF | op 0x47d54391 to pool              | jetton burn 0x595f07bc to jetton wallet |
//! | TF        | text comment "d" to pool           | text comment "w" to pool               |

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::ton::{comment_body, Address, Cell, CellBuilder, Coins, InternalMessage};

use super::intent::{StakeDirection, StakingPoolKind};

/// Whales nominator pool ops
pub const WHALES_DEPOSIT_OP: u32 = 0x7bcd_1fef;
pub const WHALES_WITHDRAW_OP: u32 = 0xda80_3efd;
pub const WHALES_GAS_LIMIT: Coins = Coins::from_nano(100_000);

/// Liquid TF deposit, tagged with the app id below
pub const LIQUID_TF_DEPOSIT_OP: u32 = 0x47d5_4391;
pub const LIQUID_TF_APP_ID: u64 = 0x0005_b7ce;
/// TEP-74 `burn`, used to withdraw from liquid pools
pub const JETTON_BURN_OP: u32 = 0x595f_07bc;

/// TF nominator pools act on plain comments
pub const TF_DEPOSIT_COMMENT: &str = "d";
pub const TF_WITHDRAW_COMMENT: &str = "w";

fn whales_deposit_body(query_id: u64) -> Result<Cell> {
    CellBuilder::new()
        .store_uint(WHALES_DEPOSIT_OP as u64, 32)?
        .store_uint(query_id, 64)?
        .store_coins(WHALES_GAS_LIMIT)?
        .build()
}

/// `amount` zero asks the pool for everything
fn whales_withdraw_body(query_id: u64, amount: Coins) -> Result<Cell> {
    CellBuilder::new()
        .store_uint(WHALES_WITHDRAW_OP as u64, 32)?
        .store_uint(query_id, 64)?
        .store_coins(WHALES_GAS_LIMIT)?
        .store_coins(amount)?
        .build()
}

fn liquid_deposit_body(query_id: u64) -> Result<Cell> {
    CellBuilder::new()
        .store_uint(LIQUID_TF_DEPOSIT_OP as u64, 32)?
        .store_uint(query_id, 64)?
        .store_uint(LIQUID_TF_APP_ID, 64)?
        .build()
}

fn liquid_withdraw_body(query_id: u64, amount: Coins, response: &Address) -> Result<Cell> {
    // wait_till_round_end:Bool fill_or_kill:Bool
    let flags = CellBuilder::new()
        .store_bit(false)?
        .store_bit(false)?
        .build()?;

    CellBuilder::new()
        .store_uint(JETTON_BURN_OP as u64, 32)?
        .store_uint(query_id, 64)?
        .store_coins(amount)?
        .store_address(response)?
        .store_maybe_reference(Some(Arc::new(flags)))?
        .build()
}

/// Deposits carry the stake (plus fees for liquid pools), withdrawals carry only fees
#[allow(clippy::too_many_arguments)]
pub fn build_stake_message(
    sender: &Address,
    implementation: StakingPoolKind,
    direction: StakeDirection,
    pool: &Address,
    amount: Coins,
    fees: Coins,
    jetton_wallet: Option<&Address>,
    query_id: u64,
) -> Result<InternalMessage> {
    let message = match (implementation, direction) {
        (StakingPoolKind::Whales, StakeDirection::Deposit) => {
            InternalMessage::new(*pool, amount, true).with_body(whales_deposit_body(query_id)?)
        }
        (StakingPoolKind::Whales, StakeDirection::Withdraw) => InternalMessage::new(*pool, fees, true)
            .with_body(whales_withdraw_body(query_id, amount)?),
        (StakingPoolKind::LiquidTf, StakeDirection::Deposit) => {
            InternalMessage::new(*pool, amount.checked_add(fees)?, true)
                .with_body(liquid_deposit_body(query_id)?)
        }
        (StakingPoolKind::LiquidTf, StakeDirection::Withdraw) => {
            let jetton_wallet = jetton_wallet
                .ok_or_else(|| Error::MissingField("jettonWallet".to_string()))?;
            InternalMessage::new(*jetton_wallet, fees, true)
                .with_body(liquid_withdraw_body(query_id, amount, sender)?)
        }
        (StakingPoolKind::Tf, StakeDirection::Deposit) => {
            InternalMessage::new(*pool, amount, true).with_body(comment_body(TF_DEPOSIT_COMMENT)?)
        }
        (StakingPoolKind::Tf, StakeDirection::Withdraw) => {
            InternalMessage::new(*pool, fees, true).with_body(comment_body(TF_WITHDRAW_COMMENT)?)
        }
    };
    Ok(message)
}
