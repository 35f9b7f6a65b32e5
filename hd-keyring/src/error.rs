//! Error types for the hd-keyring library

use thiserror::Error;

/// Custom error type for keyring operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    #[error("Unknown account: {0}")]
    UnknownAccount(String),

    #[error("Unsupported curve parameters: {0}")]
    UnsupportedCurveParameters(String),

    #[error("Signing failed: {0}")]
    SigningFailed(String),

    #[error("Key derivation error: {0}")]
    KeyDerivation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Result type for keyring operations
pub type Result<T> = std::result::Result<T, Error>;
