//! HD Keyring - hierarchical-deterministic Ethereum keyring
//!
//! Derives accounts from a BIP-39 mnemonic along a BIP-32 base path and signs
//! transactions, raw digests, personal messages and typed data with them.
//! App keys live at arbitrary derivation paths and can additionally sign on
//! the STARK curve or another short-Weierstrass curve.

pub mod error;
pub mod crypto;
pub mod account;
pub mod signing;
pub mod transaction;
pub mod keyring;

// Re-export commonly used types for convenience
pub use error::{Error, Result};
pub use crypto::{CurveParams, CurveSignature};
pub use keyring::{Keyring, KeyringOptions, SerializedKeyring, DEFAULT_HD_PATH, KEYRING_TYPE};
pub use signing::{LegacyTypedField, TypedData};
pub use transaction::{EthereumTransaction, SignableTransaction};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
