//! Key derivation and management
//!
//! secp256k1 BIP-32 derivation and the key types shared by accounts and app keys.

pub mod ethereum;
mod derivation;

pub use derivation::*;
