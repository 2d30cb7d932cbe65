//! Raw messages supplied by a dapp, signed as given

use crate::error::Result;
use crate::ton::{Cell, InternalMessage};

use super::intent::RawMessage;

/// Bounce follows the address form: raw always bounces, friendly keeps its flag
pub fn build_raw_messages(messages: &[RawMessage]) -> Result<Vec<InternalMessage>> {
    messages
        .iter()
        .map(|raw| {
            let state_init = raw.state_init.as_deref().map(Cell::from_boc_base64).transpose()?;
            let body = raw.body.as_deref().map(Cell::from_boc_base64).transpose()?;

            let mut message = InternalMessage::new(raw.address.address(), raw.amount, raw.address.bounceable())
                .with_state_init(state_init);
            message.body = body;
            Ok(message)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::ton::{Address, AnyAddress, CellBuilder, Coins};

    fn raw(address: AnyAddress) -> RawMessage {
        RawMessage {
            address,
            amount: Coins::from_nano(10),
            state_init: None,
            body: None,
        }
    }

    #[test]
    fn test_bounce_from_address_form() {
        let address = Address::new(0, [8u8; 32]);
        let friendly = AnyAddress::parse(&address.to_friendly(false, false)).unwrap();

        let messages = build_raw_messages(&[raw(friendly), raw(AnyAddress::Raw(address))]).unwrap();
        assert!(!messages[0].bounce);
        assert!(messages[1].bounce);
        assert_eq!(messages[0].destination, address);
    }

    #[test]
    fn test_payloads_decoded() {
        let body = CellBuilder::new().store_uint(0xDEAD, 16).unwrap().build().unwrap();
        let mut message = raw(AnyAddress::Raw(Address::new(0, [8u8; 32])));
        message.body = Some(body.to_boc_base64().unwrap());

        let built = build_raw_messages(&[message]).unwrap();
        assert_eq!(built[0].body.as_ref().unwrap().hash(), body.hash());
    }

    #[test]
    fn test_bad_boc_rejected() {
        let mut message = raw(AnyAddress::Raw(Address::new(0, [8u8; 32])));
        message.state_init = Some("not a boc".to_string());
        let result = build_raw_messages(&[message]);
        assert!(result.is_err());
        assert!(!matches!(result, Err(Error::UnsupportedTransaction(_))));
    }
}
