//! Error types for the wallet protocol and transfer builders

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the wallet core
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid keypair: {0}")]
    InvalidKeypair(String),

    #[error("Insecure keypair permissions: {0}")]
    InsecureKeypair(String),

    // Cell and BOC errors
    #[error("Cell overflow: {0}")]
    CellOverflow(String),

    #[error("Cell underflow: {0}")]
    CellUnderflow(String),

    #[error("Invalid BOC: {0}")]
    InvalidBoc(String),

    // Address and amount errors
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    // Session crypto errors
    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Decryption failed: {0}")]
    Decryption(String),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Signer public key does not match wallet {0}")]
    SignerMismatch(String),

    // TonConnect protocol errors
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Method not supported: {0}")]
    MethodNotSupported(String),

    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    // Transfer construction errors
    #[error("Unsupported transaction: {0}")]
    UnsupportedTransaction(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Too many messages: {count} given, wallet accepts at most {max}")]
    TooManyMessages { count: usize, max: usize },

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Check if this error came from decoding a dapp request
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidRequest(_)
                | Error::MethodNotSupported(_)
                | Error::InvalidManifest(_)
                | Error::Decryption(_)
                | Error::Deserialization(_)
        )
    }

    /// Check if this error aborted a transfer build
    pub fn is_build_error(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedTransaction(_)
                | Error::MissingField(_)
                | Error::TooManyMessages { .. }
                | Error::InvalidAddress(_)
                | Error::InvalidAmount(_)
                | Error::InvalidBoc(_)
                | Error::CellOverflow(_)
                | Error::SignerMismatch(_)
        )
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

// Conversion from I/O errors
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

// Conversion from base64 errors
impl From<base64::DecodeError> for Error {
    fn from(e: base64::DecodeError) -> Self {
        Error::Deserialization(format!("base64: {}", e))
    }
}

// Conversion from hex errors
impl From<hex::FromHexError> for Error {
    fn from(e: hex::FromHexError) -> Self {
        Error::Deserialization(format!("hex: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        assert!(Error::MethodNotSupported("signData".to_string()).is_protocol_error());
        assert!(!Error::MethodNotSupported("signData".to_string()).is_build_error());

        assert!(Error::UnsupportedTransaction("x".to_string()).is_build_error());
        assert!(Error::TooManyMessages { count: 5, max: 4 }.is_build_error());
        assert!(!Error::Io("disk".to_string()).is_build_error());
    }

    #[test]
    fn test_too_many_messages_display() {
        let err = Error::TooManyMessages { count: 5, max: 4 };
        assert_eq!(
            err.to_string(),
            "Too many messages: 5 given, wallet accepts at most 4"
        );
    }
}
