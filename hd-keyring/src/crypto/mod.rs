//! Cryptographic primitives and operations
//!
//! This module provides mnemonic handling, secp256k1 HD key derivation and the
//! parameterised alternate curve used for app-key signing.

pub mod mnemonic;
pub mod keys;
pub mod curve;

pub use mnemonic::*;
pub use keys::*;
pub use curve::{Curve, CurveHash, CurveParams, CurveSignature};
