//! Transaction signing
//!
//! The keyring treats transactions as opaque values that know how to sign
//! themselves once handed a private key.

mod ethereum;

pub use ethereum::*;

use crate::crypto::keys::PrivateKey;
use crate::error::Result;

/// A transaction that signs itself in place with a raw private key
pub trait SignableTransaction {
    /// Sign with `private_key`, replacing any previous signature
    fn sign(&mut self, private_key: &PrivateKey) -> Result<()>;
}
