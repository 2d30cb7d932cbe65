//! Messages, state init and send modes

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::address::Address;
use super::cell::{Cell, CellBuilder};
use super::coins::Coins;

/// Flags controlling how the wallet contract spends attached value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SendMode(u8);

impl SendMode {
    pub const PAY_GAS_SEPARATELY: u8 = 1;
    pub const IGNORE_ERRORS: u8 = 2;
    pub const DESTROY_ACCOUNT_IF_ZERO: u8 = 32;
    pub const CARRY_ALL_REMAINING_INCOMING_VALUE: u8 = 64;
    pub const CARRY_ALL_REMAINING_BALANCE: u8 = 128;

    /// Raw mode byte
    pub const fn new(bits: u8) -> Self {
        Self(bits)
    }

    /// Exact amount, fees paid on top, errors ignored
    pub const fn wallet_default() -> Self {
        Self(Self::PAY_GAS_SEPARATELY | Self::IGNORE_ERRORS)
    }

    /// Whole balance; the message value is not consulted
    pub const fn send_max_ton() -> Self {
        Self(Self::CARRY_ALL_REMAINING_BALANCE)
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    /// Whether flag 128 is set
    pub fn carries_all_balance(&self) -> bool {
        self.0 & Self::CARRY_ALL_REMAINING_BALANCE != 0
    }
}

impl Default for SendMode {
    fn default() -> Self {
        Self::wallet_default()
    }
}

/// Code and data needed to deploy a contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateInit {
    pub code: Option<Arc<Cell>>,
    pub data: Option<Arc<Cell>>,
}

impl StateInit {
    pub fn new(code: Arc<Cell>, data: Arc<Cell>) -> Self {
        Self {
            code: Some(code),
            data: Some(data),
        }
    }

    /// `split_depth:(Maybe) special:(Maybe) code:(Maybe ^Cell) data:(Maybe ^Cell) library:(HashmapE)`
    pub fn to_cell(&self) -> Result<Cell> {
        CellBuilder::new()
            .store_bit(false)?
            .store_bit(false)?
            .store_maybe_reference(self.code.clone())?
            .store_maybe_reference(self.data.clone())?
            .store_bit(false)?
            .build()
    }

    /// Address a contract deployed with this state init would get
    pub fn address(&self, workchain: i32) -> Result<Address> {
        Ok(Address::new(workchain, self.to_cell()?.hash()))
    }
}

/// Outgoing internal message in its relaxed form (source left empty)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalMessage {
    pub bounce: bool,
    pub destination: Address,
    pub value: Coins,
    pub state_init: Option<Arc<Cell>>,
    pub body: Option<Arc<Cell>>,
}

impl InternalMessage {
    /// Message without body or state init
    pub fn new(destination: Address, value: Coins, bounce: bool) -> Self {
        Self {
            bounce,
            destination,
            value,
            state_init: None,
            body: None,
        }
    }

    pub fn with_body(mut self, body: Cell) -> Self {
        self.body = Some(Arc::new(body));
        self
    }

    /// Attach a state init for deploying the destination
    pub fn with_state_init(mut self, state_init: Option<Arc<Cell>>) -> Self {
        self.state_init = state_init;
        self
    }

    pub fn to_cell(&self) -> Result<Cell> {
        let mut builder = CellBuilder::new();
        builder
            .store_bit(false)? // int_msg_info$0
            .store_bit(true)? // ihr_disabled
            .store_bit(self.bounce)?
            .store_bit(false)? // bounced
            .store_address_none()?
            .store_address(&self.destination)?
            .store_coins(self.value)?
            .store_bit(false)? // no extra currencies
            .store_coins(Coins::ZERO)? // ihr_fee
            .store_coins(Coins::ZERO)? // fwd_fee
            .store_uint(0, 64)? // created_lt
            .store_uint(0, 32)?; // created_at

        match &self.state_init {
            Some(init) => {
                builder
                    .store_bit(true)?
                    .store_bit(true)?
                    .store_reference(init.clone())?;
            }
            None => {
                builder.store_bit(false)?;
            }
        }

        match &self.body {
            Some(body) => {
                builder.store_bit(true)?.store_reference(body.clone())?;
            }
            None => {
                builder.store_bit(false)?;
            }
        }

        builder.build()
    }

    /// Parse a relaxed internal message back into its parts
    pub fn from_cell(cell: &Cell) -> Result<Self> {
        let mut slice = cell.parse();

        if slice.load_bit()? {
            return Err(Error::Deserialization("not an internal message".to_string()));
        }
        let _ihr_disabled = slice.load_bit()?;
        let bounce = slice.load_bit()?;
        let _bounced = slice.load_bit()?;
        let _source = slice.load_address()?;
        let destination = slice
            .load_address()?
            .ok_or_else(|| Error::Deserialization("message without destination".to_string()))?;
        let value = slice.load_coins()?;
        if slice.load_bit()? {
            slice.load_reference()?;
        }
        slice.load_coins()?;
        slice.load_coins()?;
        slice.load_uint(64)?;
        slice.load_uint(32)?;

        let state_init = if slice.load_bit()? {
            if !slice.load_bit()? {
                return Err(Error::Deserialization(
                    "inline state init is not supported".to_string(),
                ));
            }
            Some(slice.load_reference()?.clone())
        } else {
            None
        };

        let body = if slice.load_bit()? {
            Some(slice.load_reference()?.clone())
        } else if slice.remaining_bits() > 0 || slice.remaining_refs() > 0 {
            Some(Arc::new(slice.to_cell()?))
        } else {
            None
        };

        Ok(Self {
            bounce,
            destination,
            value,
            state_init,
            body,
        })
    }

    /// Text comment carried in the body, if the body is one
    pub fn comment(&self) -> Option<String> {
        self.body.as_deref().and_then(parse_comment)
    }
}

/// Inbound external message delivering a signed body to a wallet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalMessage {
    pub destination: Address,
    pub state_init: Option<Arc<Cell>>,
    pub body: Arc<Cell>,
}

impl ExternalMessage {
    /// `ext_in_msg` with init and body as references
    pub fn to_cell(&self) -> Result<Cell> {
        let mut builder = CellBuilder::new();
        builder
            .store_uint(0b10, 2)? // ext_in_msg_info$10
            .store_address_none()?
            .store_address(&self.destination)?
            .store_coins(Coins::ZERO)?; // import_fee

        match &self.state_init {
            Some(init) => {
                builder
                    .store_bit(true)?
                    .store_bit(true)?
                    .store_reference(init.clone())?;
            }
            None => {
                builder.store_bit(false)?;
            }
        }

        builder
            .store_bit(true)?
            .store_reference(self.body.clone())?
            .build()
    }
}

/// Body carrying a plain text comment: op 0 followed by snake-encoded UTF-8
pub fn comment_body(text: &str) -> Result<Cell> {
    CellBuilder::new()
        .store_uint(0, 32)?
        .store_snake_bytes(text.as_bytes())?
        .build()
}

/// Decode a text comment body; anything else yields `None`
pub fn parse_comment(cell: &Cell) -> Option<String> {
    let mut slice = cell.parse();
    if slice.remaining_bits() < 32 || slice.load_uint(32).ok()? != 0 {
        return None;
    }
    let bytes = slice.load_snake_bytes().ok()?;
    String::from_utf8(bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn destination() -> Address {
        Address::new(0, [0x42; 32])
    }

    #[test]
    fn test_send_mode_flags() {
        assert_eq!(SendMode::wallet_default().bits(), 3);
        assert_eq!(SendMode::send_max_ton().bits(), 128);
        assert!(SendMode::send_max_ton().carries_all_balance());
        assert!(!SendMode::wallet_default().carries_all_balance());
    }

    #[test]
    fn test_comment_roundtrip() {
        let body = comment_body("hi").unwrap();
        assert_eq!(body.bit_len(), 32 + 16);
        assert_eq!(parse_comment(&body).as_deref(), Some("hi"));

        let long = "long comment ".repeat(30);
        let body = comment_body(&long).unwrap();
        assert_eq!(parse_comment(&body), Some(long));
    }

    #[test]
    fn test_non_comment_body() {
        let body = CellBuilder::new()
            .store_uint(0x0f8a7ea5, 32)
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(parse_comment(&body), None);
        assert_eq!(parse_comment(&Cell::empty()), None);
    }

    #[test]
    fn test_internal_message_roundtrip() {
        let message = InternalMessage::new(destination(), Coins::from_nano(1_000_000_000), false)
            .with_body(comment_body("hello").unwrap());
        let cell = message.to_cell().unwrap();

        let parsed = InternalMessage::from_cell(&cell).unwrap();
        assert_eq!(parsed.destination, destination());
        assert_eq!(parsed.value, Coins::from_nano(1_000_000_000));
        assert!(!parsed.bounce);
        assert!(parsed.state_init.is_none());
        assert_eq!(parsed.comment().as_deref(), Some("hello"));
    }

    #[test]
    fn test_internal_message_with_state_init() {
        let init = StateInit::new(Arc::new(Cell::empty()), Arc::new(Cell::empty()));
        let init_cell = Arc::new(init.to_cell().unwrap());
        let message = InternalMessage::new(destination(), Coins::ZERO, true)
            .with_state_init(Some(init_cell.clone()));

        let parsed = InternalMessage::from_cell(&message.to_cell().unwrap()).unwrap();
        assert!(parsed.bounce);
        assert_eq!(parsed.state_init.unwrap().hash(), init_cell.hash());
        assert!(parsed.body.is_none());
    }

    #[test]
    fn test_state_init_address_is_hash() {
        let init = StateInit::new(
            Arc::new(CellBuilder::new().store_uint(1, 8).unwrap().build().unwrap()),
            Arc::new(Cell::empty()),
        );
        let address = init.address(0).unwrap();
        assert_eq!(address.workchain(), 0);
        assert_eq!(address.hash_part(), &init.to_cell().unwrap().hash());
    }

    #[test]
    fn test_external_message_layout() {
        let external = ExternalMessage {
            destination: destination(),
            state_init: None,
            body: Arc::new(Cell::empty()),
        };
        let cell = external.to_cell().unwrap();
        let mut slice = cell.parse();
        assert_eq!(slice.load_uint(2).unwrap(), 0b10);
        assert_eq!(slice.load_address().unwrap(), None);
        assert_eq!(slice.load_address().unwrap(), Some(destination()));
        assert_eq!(cell.references().len(), 1);
    }
}
