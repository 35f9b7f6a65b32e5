//! Signing dispatch
//!
//! Every request kind resolves to one external primitive. The kinds look alike
//! but are not interchangeable:
//!
//! - raw message: the decoded bytes are the 32-byte digest, signed as-is
//! - personal message: EIP-191 prefix, keccak256, sign
//! - geth message: hex-decode, `hash_message`, then sign that digest
//! - typed data: legacy or EIP-712 struct hash, then sign
//! - alternate curve: deterministic ECDSA on a caller-chosen curve
//!
//! secp256k1 signatures are returned as `0x` followed by r, s and v (27/28).

mod typed_data;

pub use typed_data::*;

use ethers::signers::LocalWallet;
use ethers::types::H256;
use ethers::utils::hash_message;
use serde::Serialize;
use tracing::debug;

use crate::crypto::curve::{Curve, CurveSignature};
use crate::crypto::keys::KeyPair;
use crate::error::{Error, Result};
use crate::transaction::SignableTransaction;

/// Decode hex with an optional `0x` prefix; odd lengths get a leading zero nibble
pub fn decode_hex(input: &str) -> Result<Vec<u8>> {
    let digits = input.strip_prefix("0x").unwrap_or(input);
    let padded;
    let digits = if digits.len() % 2 == 1 {
        padded = format!("0{}", digits);
        padded.as_str()
    } else {
        digits
    };

    hex::decode(digits).map_err(|e| Error::SigningFailed(format!("invalid hex {}: {}", input, e)))
}

/// `0x`-prefixed hex is decoded, anything else is taken as UTF-8 text
pub fn to_buffer(input: &str) -> Result<Vec<u8>> {
    match input.strip_prefix("0x") {
        Some(digits) if digits.chars().all(|c| c.is_ascii_hexdigit()) => decode_hex(input),
        _ => Ok(input.as_bytes().to_vec()),
    }
}

/// A signing request, one variant per encoding
#[derive(Debug, Clone, Copy)]
pub enum SignRequest<'a> {
    RawMessage(&'a str),
    PersonalMessage(&'a str),
    TypedData(&'a TypedData),
    GethMessage(&'a str),
    AlternateCurve { message: &'a str, curve: &'a Curve },
}

/// Output of [`SigningDispatcher::dispatch`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SignatureOutput {
    Hex(String),
    Curve(CurveSignature),
}

impl SignatureOutput {
    pub fn as_hex(&self) -> Option<&str> {
        match self {
            SignatureOutput::Hex(hex) => Some(hex),
            SignatureOutput::Curve(_) => None,
        }
    }

    pub fn as_curve(&self) -> Option<&CurveSignature> {
        match self {
            SignatureOutput::Curve(signature) => Some(signature),
            SignatureOutput::Hex(_) => None,
        }
    }
}

/// Signs on behalf of one resolved key pair
pub struct SigningDispatcher<'k> {
    key_pair: &'k KeyPair,
}

impl<'k> SigningDispatcher<'k> {
    pub fn new(key_pair: &'k KeyPair) -> Self {
        Self { key_pair }
    }

    fn wallet(&self) -> Result<LocalWallet> {
        LocalWallet::from_bytes(self.key_pair.private_key().as_bytes())
            .map_err(|e| Error::SigningFailed(format!("Invalid private key: {}", e)))
    }

    /// ECDSA over a 32-byte digest, no further hashing
    fn sign_digest(&self, digest: [u8; 32]) -> Result<String> {
        let signature = self.wallet()?
            .sign_hash(H256::from(digest))
            .map_err(|e| Error::SigningFailed(e.to_string()))?;

        Ok(format!("0x{}", hex::encode(signature.to_vec())))
    }

    /// Sign the decoded bytes directly; they must already be a 32-byte digest
    ///
    /// Unlike the prefixed encodings, odd-length hex is rejected rather than padded.
    pub fn raw_message(&self, message_hex: &str) -> Result<String> {
        let digits = message_hex.strip_prefix("0x").unwrap_or(message_hex);
        if digits.len() % 2 == 1 {
            return Err(Error::SigningFailed(format!("raw message has odd hex length {}", digits.len())));
        }
        let bytes = decode_hex(message_hex)?;
        let digest: [u8; 32] = bytes.as_slice().try_into()
            .map_err(|_| Error::SigningFailed(format!("raw message must be 32 bytes, got {}", bytes.len())))?;

        debug!(address = %self.key_pair.address(), "signing raw message");
        self.sign_digest(digest)
    }

    /// EIP-191 personal message; hex input with `0x` is decoded, other input is text
    pub fn personal_message(&self, message: &str) -> Result<String> {
        let bytes = to_buffer(message)?;

        debug!(address = %self.key_pair.address(), len = bytes.len(), "signing personal message");
        self.sign_digest(hash_message(bytes).0)
    }

    /// Hex-decode, hash with the personal-message hash, sign the digest
    pub fn geth_message(&self, message_hex: &str) -> Result<String> {
        let bytes = decode_hex(message_hex)?;
        let digest = hash_message(&bytes);

        debug!(address = %self.key_pair.address(), "signing geth message");
        self.sign_digest(digest.0)
    }

    pub fn typed_data(&self, data: &TypedData) -> Result<String> {
        let digest = data.signing_hash()?;

        debug!(address = %self.key_pair.address(), "signing typed data");
        self.sign_digest(digest)
    }

    pub fn alternate_curve(&self, message: &str, curve: &Curve) -> Result<CurveSignature> {
        debug!(address = %self.key_pair.address(), "signing alternate curve message");
        curve.sign(self.key_pair.private_key().as_bytes(), message)
    }

    /// Hand the private key to the transaction and return it signed
    pub fn transaction<T: SignableTransaction>(&self, mut tx: T) -> Result<T> {
        debug!(address = %self.key_pair.address(), "signing transaction");
        tx.sign(self.key_pair.private_key())?;
        Ok(tx)
    }

    /// Route a message request to its encoding
    pub fn dispatch(&self, request: SignRequest<'_>) -> Result<SignatureOutput> {
        match request {
            SignRequest::RawMessage(message) => self.raw_message(message).map(SignatureOutput::Hex),
            SignRequest::PersonalMessage(message) => self.personal_message(message).map(SignatureOutput::Hex),
            SignRequest::TypedData(data) => self.typed_data(data).map(SignatureOutput::Hex),
            SignRequest::GethMessage(message) => self.geth_message(message).map(SignatureOutput::Hex),
            SignRequest::AlternateCurve { message, curve } => {
                self.alternate_curve(message, curve).map(SignatureOutput::Curve)
            }
        }
    }
}
