//! Address normalization

use std::fmt;

use serde::{Serialize, Deserialize};

/// A canonical account address: lowercase, `0x`-prefixed hex
///
/// Every address stored by the keyring and every address a caller asks about
/// goes through [`normalize_address`], so comparisons are plain string equality.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(from = "String", into = "String")]
pub struct Address {
    address: String,
}

/// Lowercase `input` and add a `0x` prefix when missing
pub fn normalize_address(input: &str) -> String {
    let lowered = input.trim().to_lowercase();
    if lowered.starts_with("0x") {
        lowered
    } else {
        format!("0x{}", lowered)
    }
}

impl Address {
    /// Normalize any caller-supplied address string
    pub fn normalize(input: &str) -> Self {
        Self { address: normalize_address(input) }
    }

    /// Build an address from its raw 20 bytes
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self { address: format!("0x{}", hex::encode(bytes)) }
    }

    /// Get the address string
    pub fn as_str(&self) -> &str {
        &self.address
    }
}

impl From<String> for Address {
    fn from(value: String) -> Self {
        Self::normalize(&value)
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.address
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address)
    }
}
