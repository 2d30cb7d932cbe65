//! Plain TON transfers

use crate::error::Result;
use crate::ton::{comment_body, AnyAddress, Coins, InternalMessage, SendMode};

/// Send mode for a TON transfer: the whole balance, or exactly `amount`
pub fn ton_send_mode(is_max: bool) -> SendMode {
    if is_max {
        SendMode::send_max_ton()
    } else {
        SendMode::wallet_default()
    }
}

/// `bounceable` falls back to the flag carried by the recipient's address form
pub fn build_ton_message(
    recipient: &AnyAddress,
    amount: Coins,
    comment: Option<&str>,
    bounceable: Option<bool>,
) -> Result<InternalMessage> {
    let bounce = bounceable.unwrap_or_else(|| recipient.bounceable());
    let message = InternalMessage::new(recipient.address(), amount, bounce);

    match comment.filter(|text| !text.is_empty()) {
        Some(text) => Ok(message.with_body(comment_body(text)?)),
        None => Ok(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ton::Address;

    #[test]
    fn test_comment_payload() {
        let recipient = AnyAddress::Raw(Address::new(0, [1u8; 32]));
        let message =
            build_ton_message(&recipient, Coins::from_nano(5), Some("thanks"), None).unwrap();

        assert!(message.bounce);
        assert_eq!(message.value, Coins::from_nano(5));
        assert_eq!(message.comment().as_deref(), Some("thanks"));
    }

    #[test]
    fn test_no_comment_no_body() {
        let recipient = AnyAddress::Raw(Address::new(0, [1u8; 32]));
        let message = build_ton_message(&recipient, Coins::from_nano(5), Some(""), Some(false)).unwrap();
        assert!(message.body.is_none());
        assert!(!message.bounce);
    }

    #[test]
    fn test_max_mode_ignores_amount() {
        assert!(ton_send_mode(true).carries_all_balance());
        assert_eq!(ton_send_mode(false), SendMode::wallet_default());
    }
}
