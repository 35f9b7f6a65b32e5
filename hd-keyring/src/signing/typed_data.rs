//! Typed structured data
//!
//! Two request shapes are accepted: the legacy array of `{type, name, value}`
//! fields, and an EIP-712 document with `types`, `domain`, `primaryType` and
//! `message`.

use std::str::FromStr;

use ethers::types::transaction::eip712::{Eip712, TypedData as Eip712TypedData};
use ethers::types::{Address as EthAddress, I256, U256};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::crypto::keys::ethereum::keccak256;
use crate::error::{Error, Result};
use super::{decode_hex, to_buffer};

/// One field of a legacy typed-data request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyTypedField {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub value: Value,
}

impl LegacyTypedField {
    pub fn new(kind: &str, name: &str, value: impl Into<Value>) -> Self {
        Self { kind: kind.to_string(), name: name.to_string(), value: value.into() }
    }
}

/// A typed-data signing request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypedData {
    Legacy(Vec<LegacyTypedField>),
    Eip712(Box<Eip712TypedData>),
}

impl TypedData {
    /// The 32-byte digest that gets signed
    pub fn signing_hash(&self) -> Result<[u8; 32]> {
        match self {
            TypedData::Legacy(fields) => legacy_hash(fields),
            TypedData::Eip712(data) => data
                .encode_eip712()
                .map_err(|e| Error::SigningFailed(format!("EIP-712 encoding failed: {}", e))),
        }
    }
}

/// keccak256(keccak256(packed schema) || keccak256(packed values))
fn legacy_hash(fields: &[LegacyTypedField]) -> Result<[u8; 32]> {
    let mut schema = Vec::new();
    let mut values = Vec::new();

    for field in fields {
        if field.name.is_empty() {
            return Err(Error::SigningFailed(format!("typed data field of type {} has no name", field.kind)));
        }
        schema.extend_from_slice(format!("{} {}", field.kind, field.name).as_bytes());
        values.extend(pack_value(&field.kind, &field.value)?);
    }

    let mut outer = Vec::with_capacity(64);
    outer.extend_from_slice(&keccak256(&schema));
    outer.extend_from_slice(&keccak256(&values));
    Ok(keccak256(&outer))
}

fn value_text(value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(Error::SigningFailed(format!("unsupported typed data value: {}", other))),
    }
}

fn bit_width(kind: &str, prefix: &str) -> Result<usize> {
    let suffix = &kind[prefix.len()..];
    let bits = if suffix.is_empty() { 256 } else {
        suffix.parse::<usize>()
            .map_err(|_| Error::SigningFailed(format!("unsupported typed data type: {}", kind)))?
    };
    if bits == 0 || bits > 256 || bits % 8 != 0 {
        return Err(Error::SigningFailed(format!("unsupported typed data type: {}", kind)));
    }
    Ok(bits)
}

fn parse_u256(text: &str) -> Result<U256> {
    let parsed = match text.strip_prefix("0x") {
        Some(digits) => U256::from_str_radix(digits, 16).map_err(|e| e.to_string()),
        None => U256::from_dec_str(text).map_err(|e| e.to_string()),
    };
    parsed.map_err(|e| Error::SigningFailed(format!("invalid integer {}: {}", text, e)))
}

fn low_bytes(word: U256, bits: usize) -> Vec<u8> {
    let mut buf = [0u8; 32];
    word.to_big_endian(&mut buf);
    buf[32 - bits / 8..].to_vec()
}

/// Whether the top `256 - bits` bits are a sign extension of the rest
fn fits_signed(word: U256, bits: usize) -> bool {
    let mut buf = [0u8; 32];
    word.to_big_endian(&mut buf);
    let start = 32 - bits / 8;
    let fill = if buf[start] & 0x80 != 0 { 0xff } else { 0x00 };
    buf[..start].iter().all(|byte| *byte == fill)
}

/// JavaScript truthiness, so `"false"` is true and `0` is false
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Tightly packed encoding of one value, as used by `soliditySha3`
fn pack_value(kind: &str, value: &Value) -> Result<Vec<u8>> {
    if kind == "bool" {
        return Ok(vec![u8::from(truthy(value))]);
    }

    let text = value_text(value)?;

    match kind {
        "string" => Ok(text.into_bytes()),
        "address" => EthAddress::from_str(&text)
            .map(|address| address.as_bytes().to_vec())
            .map_err(|e| Error::SigningFailed(format!("invalid address {}: {}", text, e))),
        "bytes" => to_buffer(&text),
        k if k.starts_with("bytes") => {
            let size = k["bytes".len()..].parse::<usize>()
                .ok()
                .filter(|size| (1..=32).contains(size))
                .ok_or_else(|| Error::SigningFailed(format!("unsupported typed data type: {}", k)))?;
            let mut bytes = decode_hex(&text)?;
            if bytes.len() > size {
                return Err(Error::SigningFailed(format!("{} value is {} bytes long", k, bytes.len())));
            }
            bytes.resize(size, 0);
            Ok(bytes)
        }
        k if k.starts_with("uint") => {
            let bits = bit_width(k, "uint")?;
            let number = parse_u256(&text)?;
            if number.bits() > bits {
                return Err(Error::SigningFailed(format!("{} does not fit in {}", text, k)));
            }
            Ok(low_bytes(number, bits))
        }
        k if k.starts_with("int") => {
            let bits = bit_width(k, "int")?;
            let number = I256::from_dec_str(&text)
                .map_err(|e| Error::SigningFailed(format!("invalid integer {}: {}", text, e)))?;
            if !fits_signed(number.into_raw(), bits) {
                return Err(Error::SigningFailed(format!("{} does not fit in {}", text, k)));
            }
            Ok(low_bytes(number.into_raw(), bits))
        }
        other => Err(Error::SigningFailed(format!("unsupported typed data type: {}", other))),
    }
}
