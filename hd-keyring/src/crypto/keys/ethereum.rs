//! Ethereum (secp256k1) BIP-32 key derivation

use hmac::{Hmac, Mac};
use sha2::Sha512;
use secp256k1::{Secp256k1, SecretKey, PublicKey as Secp256k1PublicKey};

use crate::account::Address;
use crate::error::{Error, Result};
use super::derivation::{DerivationPath, HARDENED_OFFSET};

/// A BIP-32 extended private key: secret scalar plus chain code
#[derive(Clone)]
pub struct ExtendedKey {
    secret_key: [u8; 32],
    chain_code: [u8; 32],
}

impl ExtendedKey {
    /// Derive the master key from a seed
    pub fn master(seed: &[u8]) -> Result<Self> {
        let (secret_key, chain_code) = derive_master_key(seed)?;
        Ok(Self { secret_key, chain_code })
    }

    /// Derive a single child, hardened when `index >= 2^31`
    pub fn derive_child(&self, index: u32) -> Result<Self> {
        let (secret_key, chain_code) = derive_child_key(self.secret_key, self.chain_code, index)?;
        Ok(Self { secret_key, chain_code })
    }

    /// Walk every segment of `path` starting from this key
    pub fn derive_path(&self, path: &DerivationPath) -> Result<Self> {
        path.indices()
            .iter()
            .try_fold(self.clone(), |key, index| key.derive_child(*index))
    }

    /// The raw 32-byte secret scalar
    pub fn secret_bytes(&self) -> [u8; 32] {
        self.secret_key
    }
}

/// Derive the master key from a seed
fn derive_master_key(seed: &[u8]) -> Result<([u8; 32], [u8; 32])> {
    let mut hmac = Hmac::<Sha512>::new_from_slice(b"Bitcoin seed")
        .map_err(|_| Error::KeyDerivation("HMAC error".to_string()))?;

    hmac.update(seed);
    let result = hmac.finalize().into_bytes();

    let mut secret_key = [0u8; 32];
    let mut chain_code = [0u8; 32];

    secret_key.copy_from_slice(&result[0..32]);
    chain_code.copy_from_slice(&result[32..64]);

    // The master scalar must itself be a valid key
    SecretKey::from_slice(&secret_key)
        .map_err(|e| Error::KeyDerivation(format!("Invalid master key: {}", e)))?;

    Ok((secret_key, chain_code))
}

/// Derive a child key from a parent key
fn derive_child_key(parent_key: [u8; 32], parent_chain_code: [u8; 32], index: u32) -> Result<([u8; 32], [u8; 32])> {
    let secp = Secp256k1::new();
    let parent_secret_key = SecretKey::from_slice(&parent_key)
        .map_err(|e| Error::KeyDerivation(format!("Invalid parent key: {}", e)))?;

    let mut data = Vec::with_capacity(37);

    if index >= HARDENED_OFFSET {
        data.push(0);
        data.extend_from_slice(&parent_key);
    } else {
        let parent_public_key = Secp256k1PublicKey::from_secret_key(&secp, &parent_secret_key);
        data.extend_from_slice(&parent_public_key.serialize());
    }

    data.extend_from_slice(&index.to_be_bytes());

    let mut hmac = Hmac::<Sha512>::new_from_slice(&parent_chain_code)
        .map_err(|_| Error::KeyDerivation("HMAC error".to_string()))?;

    hmac.update(&data);
    let result = hmac.finalize().into_bytes();

    let mut child_key = [0u8; 32];
    let mut child_chain_code = [0u8; 32];

    child_key.copy_from_slice(&result[0..32]);
    child_chain_code.copy_from_slice(&result[32..64]);

    // child = IL + parent (mod n)
    let child_secret_key = SecretKey::from_slice(&child_key)
        .map_err(|e| Error::KeyDerivation(format!("Invalid child key at index {}: {}", index, e)))?;

    let child_secret_key = child_secret_key.add_tweak(&parent_secret_key.into())
        .map_err(|e| Error::KeyDerivation(format!("Key addition error: {}", e)))?;

    Ok((child_secret_key.secret_bytes(), child_chain_code))
}

/// Compute the uncompressed (65-byte) public key for a secret scalar
pub fn public_key_from_secret(secret: &[u8; 32]) -> Result<[u8; 65]> {
    let secp = Secp256k1::signing_only();
    let secret_key = SecretKey::from_slice(secret)
        .map_err(|e| Error::KeyDerivation(format!("Invalid secret key: {}", e)))?;

    Ok(Secp256k1PublicKey::from_secret_key(&secp, &secret_key).serialize_uncompressed())
}

/// Get the Ethereum address from an uncompressed public key
pub fn public_key_to_address(public_key: &[u8]) -> Result<Address> {
    if public_key.len() != 65 {
        return Err(Error::KeyDerivation("Invalid Ethereum public key length".to_string()));
    }

    // Skip the 0x04 tag and hash the rest
    let key_hash = keccak256(&public_key[1..]);

    Ok(Address::from_bytes(&key_hash[12..]))
}

/// Calculate the Keccak-256 hash of data
pub(crate) fn keccak256(data: &[u8]) -> [u8; 32] {
    use sha3::{Digest, Keccak256};
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}
