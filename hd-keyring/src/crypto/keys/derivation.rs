//! Derivation paths, key pairs and the HD derivation tree

use std::fmt;
use std::str::FromStr;

use crate::account::Address;
use crate::error::{Error, Result};
use super::ethereum::{public_key_from_secret, public_key_to_address, ExtendedKey};

/// First hardened child index
pub const HARDENED_OFFSET: u32 = 0x8000_0000;

/// Base path for Ethereum accounts
pub const DEFAULT_HD_PATH: &str = "m/44'/60'/0'/0";

/// A BIP-32 derivation path such as `m/44'/60'/0'/0`
///
/// Equality follows the exact string the path was parsed from, so `m/1'` and
/// `m/1h` are different paths even though they derive the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DerivationPath {
    path: String,
    indices: Vec<u32>,
}

impl DerivationPath {
    /// Parse a path string
    pub fn parse(path: &str) -> Result<Self> {
        let rest = match path.strip_prefix('m') {
            Some("") => "",
            Some(rest) if rest.starts_with('/') => &rest[1..],
            _ => return Err(Error::KeyDerivation(format!("Invalid derivation path: {}", path))),
        };

        let mut indices = Vec::new();
        for component in rest.split('/') {
            if component.is_empty() {
                continue;
            }

            let (digits, hardened) = match component.strip_suffix(['\'', 'h', 'H']) {
                Some(digits) => (digits, true),
                None => (component, false),
            };

            let index = digits.parse::<u32>()
                .ok()
                .filter(|index| *index < HARDENED_OFFSET)
                .ok_or_else(|| Error::KeyDerivation(format!("Invalid derivation path component: {}", component)))?;

            indices.push(if hardened { index + HARDENED_OFFSET } else { index });
        }

        Ok(Self { path: path.to_string(), indices })
    }

    /// The path exactly as it was given
    pub fn as_str(&self) -> &str {
        &self.path
    }

    /// Child indices with the hardened bit applied
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }
}

impl Default for DerivationPath {
    fn default() -> Self {
        Self {
            path: DEFAULT_HD_PATH.to_string(),
            indices: vec![HARDENED_OFFSET + 44, HARDENED_OFFSET + 60, HARDENED_OFFSET, 0],
        }
    }
}

impl FromStr for DerivationPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

/// A secp256k1 private key
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey {
    bytes: [u8; 32],
}

impl PrivateKey {
    /// Create a new private key from bytes
    pub fn new(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    /// Get the raw private key bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// Hex encoding without a `0x` prefix
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(..)")
    }
}

/// An uncompressed secp256k1 public key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    bytes: [u8; 65],
}

impl PublicKey {
    /// Create a new public key from its uncompressed encoding
    pub fn new(bytes: [u8; 65]) -> Self {
        Self { bytes }
    }

    /// Get the raw public key bytes, including the `0x04` tag
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// `0x`-prefixed hex of the 64-byte key without its tag
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.bytes[1..]))
    }
}

/// A derived key pair and the address it controls
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPair {
    private_key: PrivateKey,
    public_key: PublicKey,
    address: Address,
}

impl KeyPair {
    /// Build the full key pair from a secret scalar
    pub fn from_private_key(private_key: PrivateKey) -> Result<Self> {
        let public_key = PublicKey::new(public_key_from_secret(private_key.as_bytes())?);
        let address = public_key_to_address(public_key.as_bytes())?;

        Ok(Self { private_key, public_key, address })
    }

    /// Get the private key
    pub fn private_key(&self) -> &PrivateKey {
        &self.private_key
    }

    /// Get the public key
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Get the normalized address
    pub fn address(&self) -> &Address {
        &self.address
    }
}

impl From<&ExtendedKey> for PrivateKey {
    fn from(key: &ExtendedKey) -> Self {
        PrivateKey::new(key.secret_bytes())
    }
}

/// Deterministic derivation from a master seed and a base path
///
/// Holds the master node (for absolute app-key paths) and the root node at the
/// base path (for sequential account indices). Nothing is cached here.
#[derive(Clone)]
pub struct DerivationTree {
    master: ExtendedKey,
    root: ExtendedKey,
}

impl DerivationTree {
    /// Build the tree for `seed`, deriving the root node at `base_path`
    pub fn new(seed: &[u8], base_path: &DerivationPath) -> Result<Self> {
        let master = ExtendedKey::master(seed)?;
        let root = master.derive_path(base_path)?;
        Ok(Self { master, root })
    }

    /// Non-hardened child `index` of the root node
    pub fn derive_child(&self, index: u32) -> Result<KeyPair> {
        if index >= HARDENED_OFFSET {
            return Err(Error::KeyDerivation(format!("Account index out of range: {}", index)));
        }
        let child = self.root.derive_child(index)?;
        KeyPair::from_private_key(PrivateKey::from(&child))
    }

    /// Key pair at an absolute path from the master node
    pub fn derive_path(&self, path: &DerivationPath) -> Result<KeyPair> {
        let child = self.master.derive_path(path)?;
        KeyPair::from_private_key(PrivateKey::from(&child))
    }
}
