//! The HD keyring
//!
//! One mnemonic, one base path, an append-only account list and a cache of app
//! keys, all behind a single lock so a keyring can be shared across threads.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::account::{AccountStore, AppKeyCache};
use crate::crypto::curve::{Curve, CurveParams, CurveSignature};
use crate::crypto::keys::{DerivationPath, DerivationTree, KeyPair};
use crate::crypto::mnemonic::{generate_mnemonic, mnemonic_to_seed, validate_mnemonic, MnemonicStrength};
use crate::error::{Error, Result};
use crate::signing::{SigningDispatcher, TypedData};
use crate::transaction::SignableTransaction;

/// Keyring type identifier
pub const KEYRING_TYPE: &str = "HD Key Tree";

pub use crate::crypto::keys::DEFAULT_HD_PATH;

/// Construction and restore options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyringOptions {
    #[serde(default)]
    pub mnemonic: Option<String>,
    #[serde(default)]
    pub number_of_accounts: Option<usize>,
    #[serde(default)]
    pub hd_path: Option<String>,
}

/// Exported keyring state; addresses are re-derived on restore, never stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedKeyring {
    pub mnemonic: Option<String>,
    pub number_of_accounts: usize,
    pub hd_path: String,
}

impl From<SerializedKeyring> for KeyringOptions {
    fn from(value: SerializedKeyring) -> Self {
        Self {
            mnemonic: value.mnemonic,
            number_of_accounts: Some(value.number_of_accounts),
            hd_path: Some(value.hd_path),
        }
    }
}

/// Mnemonic plus the derivation tree it seeds
struct SeedSource {
    mnemonic: String,
    tree: DerivationTree,
}

impl SeedSource {
    fn from_mnemonic(mnemonic: &str, base_path: &DerivationPath) -> Result<Self> {
        validate_mnemonic(mnemonic)?;
        let seed = mnemonic_to_seed(mnemonic, None)?;
        let tree = DerivationTree::new(&seed, base_path)?;

        Ok(Self { mnemonic: mnemonic.to_string(), tree })
    }
}

enum SeedState {
    Unseeded,
    Seeded(SeedSource),
}

impl SeedState {
    /// The one place derivations obtain their tree
    ///
    /// An unseeded keyring adopts a freshly generated mnemonic here, so callers
    /// that derive before seeding get brand-new key material.
    fn ensure_seeded(&mut self, base_path: &DerivationPath) -> Result<&DerivationTree> {
        if let SeedState::Unseeded = self {
            let mnemonic = generate_mnemonic(MnemonicStrength::Words12)?;
            info!(hd_path = %base_path, "no mnemonic set, generated a new one");
            *self = SeedState::Seeded(SeedSource::from_mnemonic(&mnemonic, base_path)?);
        }

        match self {
            SeedState::Seeded(source) => Ok(&source.tree),
            SeedState::Unseeded => Err(Error::Unknown("keyring failed to seed".to_string())),
        }
    }

    fn mnemonic(&self) -> Option<&str> {
        match self {
            SeedState::Seeded(source) => Some(&source.mnemonic),
            SeedState::Unseeded => None,
        }
    }
}

struct KeyringState {
    hd_path: DerivationPath,
    seed: SeedState,
    accounts: AccountStore,
    app_keys: AppKeyCache,
}

impl KeyringState {
    fn empty(hd_path: DerivationPath) -> Self {
        Self {
            hd_path,
            seed: SeedState::Unseeded,
            accounts: AccountStore::new(),
            app_keys: AppKeyCache::new(),
        }
    }
}

/// Hierarchical-deterministic keyring
pub struct Keyring {
    state: RwLock<KeyringState>,
}

impl Keyring {
    /// Build a keyring from restore options
    pub fn new(options: KeyringOptions) -> Result<Self> {
        let keyring = Self::default();
        keyring.deserialize(options)?;
        Ok(keyring)
    }

    /// Restore from a previously serialized keyring
    pub fn from_serialized(serialized: SerializedKeyring) -> Result<Self> {
        Self::new(serialized.into())
    }

    pub fn keyring_type(&self) -> &'static str {
        KEYRING_TYPE
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, KeyringState>> {
        self.state.read().map_err(|_| Error::Unknown("keyring lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, KeyringState>> {
        self.state.write().map_err(|_| Error::Unknown("keyring lock poisoned".to_string()))
    }

    /// Export mnemonic, account count and base path
    pub fn serialize(&self) -> Result<SerializedKeyring> {
        let state = self.read()?;
        Ok(SerializedKeyring {
            mnemonic: state.seed.mnemonic().map(str::to_string),
            number_of_accounts: state.accounts.len(),
            hd_path: state.hd_path.to_string(),
        })
    }

    /// Replace all state with what `options` describe
    ///
    /// Returns the addresses derived for `numberOfAccounts`, if any.
    pub fn deserialize(&self, options: KeyringOptions) -> Result<Vec<String>> {
        let hd_path = match options.hd_path.as_deref() {
            Some(path) => DerivationPath::parse(path)?,
            None => DerivationPath::default(),
        };
        let mut next = KeyringState::empty(hd_path);

        if let Some(mnemonic) = options.mnemonic.as_deref() {
            next.seed = SeedState::Seeded(SeedSource::from_mnemonic(mnemonic, &next.hd_path)?);
        }

        let mut added = Vec::new();
        if let Some(count) = options.number_of_accounts.filter(|count| *count > 0) {
            let tree = next.seed.ensure_seeded(&next.hd_path)?;
            added = next.accounts.add_accounts(tree, count)?;
        }

        debug!(hd_path = %next.hd_path, accounts = next.accounts.len(), "keyring restored");
        *self.write()? = next;
        Ok(added.into_iter().map(String::from).collect())
    }

    /// Seed from `mnemonic`, dropping every account and app key of the old seed
    pub fn init_from_mnemonic(&self, mnemonic: &str) -> Result<()> {
        let mut state = self.write()?;
        let source = SeedSource::from_mnemonic(mnemonic, &state.hd_path)?;

        if let SeedState::Seeded(_) = state.seed {
            info!(
                accounts = state.accounts.len(),
                app_keys = state.app_keys.len(),
                "reseeding keyring, clearing derived keys"
            );
        }
        state.accounts.clear();
        state.app_keys.clear();
        state.seed = SeedState::Seeded(source);
        Ok(())
    }

    /// Derive `count` new accounts, returning only their addresses
    pub fn add_accounts(&self, count: usize) -> Result<Vec<String>> {
        let mut state = self.write()?;
        let KeyringState { hd_path, seed, accounts, .. } = &mut *state;

        let tree = seed.ensure_seeded(hd_path)?;
        let added = accounts.add_accounts(tree, count)?;
        Ok(added.into_iter().map(String::from).collect())
    }

    /// Derive a single new account
    pub fn add_account(&self) -> Result<String> {
        self.add_accounts(1)?
            .pop()
            .ok_or_else(|| Error::Unknown("no account derived".to_string()))
    }

    /// Every account address, in derivation order
    pub fn get_accounts(&self) -> Result<Vec<String>> {
        let state = self.read()?;
        Ok(state.accounts.addresses().into_iter().map(String::from).collect())
    }

    fn with_account<R>(&self, address: &str, f: impl FnOnce(&KeyPair) -> Result<R>) -> Result<R> {
        let state = self.read()?;
        let key_pair = state.accounts.get(address)?;
        f(key_pair)
    }

    fn with_app_key<R>(&self, path: &str, f: impl FnOnce(&KeyPair) -> Result<R>) -> Result<R> {
        let path = DerivationPath::parse(path)?;

        {
            let state = self.read()?;
            if let Some(key_pair) = state.app_keys.get(&path) {
                return f(key_pair);
            }
        }

        // Re-checked under the write lock, so a path is derived at most once
        let mut state = self.write()?;
        let KeyringState { hd_path, seed, app_keys, .. } = &mut *state;
        let key_pair = app_keys.get_or_create(&path, |path| seed.ensure_seeded(hd_path)?.derive_path(path))?;
        f(key_pair)
    }

    pub fn sign_transaction<T: SignableTransaction>(&self, address: &str, tx: T) -> Result<T> {
        self.with_account(address, |key_pair| SigningDispatcher::new(key_pair).transaction(tx))
    }

    /// Sign 32 raw bytes given as hex, without hashing
    pub fn sign_message(&self, address: &str, message_hex: &str) -> Result<String> {
        self.with_account(address, |key_pair| SigningDispatcher::new(key_pair).raw_message(message_hex))
    }

    pub fn sign_personal_message(&self, address: &str, message: &str) -> Result<String> {
        self.with_account(address, |key_pair| SigningDispatcher::new(key_pair).personal_message(message))
    }

    pub fn sign_typed_data(&self, address: &str, typed_data: &TypedData) -> Result<String> {
        self.with_account(address, |key_pair| SigningDispatcher::new(key_pair).typed_data(typed_data))
    }

    pub fn new_geth_sign_message(&self, address: &str, message_hex: &str) -> Result<String> {
        self.with_account(address, |key_pair| SigningDispatcher::new(key_pair).geth_message(message_hex))
    }

    /// Hex private key (no `0x`) of an account
    pub fn export_account(&self, address: &str) -> Result<String> {
        self.with_account(address, |key_pair| Ok(key_pair.private_key().to_hex()))
    }

    /// Derivation paths of every app key derived so far
    pub fn app_key_paths(&self) -> Result<Vec<String>> {
        Ok(self.read()?.app_keys.paths())
    }

    pub fn get_app_key_public_key(&self, path: &str) -> Result<String> {
        self.with_app_key(path, |key_pair| Ok(key_pair.public_key().to_hex()))
    }

    pub fn get_app_key_address(&self, path: &str) -> Result<String> {
        self.with_app_key(path, |key_pair| Ok(key_pair.address().to_string()))
    }

    /// Sign 32 raw bytes with the app key at `path`
    pub fn sign_app_key_message(&self, path: &str, message_hex: &str) -> Result<String> {
        self.with_app_key(path, |key_pair| SigningDispatcher::new(key_pair).raw_message(message_hex))
    }

    pub fn sign_app_key_transaction<T: SignableTransaction>(&self, path: &str, tx: T) -> Result<T> {
        self.with_app_key(path, |key_pair| SigningDispatcher::new(key_pair).transaction(tx))
    }

    pub fn sign_app_key_typed_message(&self, path: &str, typed_data: &TypedData) -> Result<String> {
        self.with_app_key(path, |key_pair| SigningDispatcher::new(key_pair).typed_data(typed_data))
    }

    /// Sign on the STARK curve with the app key at `path`
    pub fn sign_app_key_alternate_curve_message(&self, path: &str, message_hex: &str) -> Result<CurveSignature> {
        self.sign_app_key_curve_message(path, message_hex, &CurveParams::stark())
    }

    /// Sign on a caller-described curve with the app key at `path`
    pub fn sign_app_key_curve_message(&self, path: &str, message_hex: &str, params: &CurveParams) -> Result<CurveSignature> {
        let curve = Curve::from_params(params)?;
        self.with_app_key(path, |key_pair| SigningDispatcher::new(key_pair).alternate_curve(message_hex, &curve))
    }
}

impl Default for Keyring {
    /// An empty, unseeded keyring on the default base path
    fn default() -> Self {
        Self { state: RwLock::new(KeyringState::empty(DerivationPath::default())) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ABANDON: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    #[test]
    fn test_empty_restore_is_unseeded() {
        let keyring = Keyring::new(KeyringOptions::default()).unwrap();
        let serialized = keyring.serialize().unwrap();

        assert_eq!(serialized.mnemonic, None);
        assert_eq!(serialized.number_of_accounts, 0);
        assert_eq!(serialized.hd_path, DEFAULT_HD_PATH);
        assert_eq!(keyring.keyring_type(), "HD Key Tree");
    }

    #[test]
    fn test_lazy_seeding_on_first_account() {
        let keyring = Keyring::default();
        let address = keyring.add_account().unwrap();

        let serialized = keyring.serialize().unwrap();
        let mnemonic = serialized.mnemonic.clone().unwrap();
        assert_eq!(mnemonic.split_whitespace().count(), 12);

        let restored = Keyring::from_serialized(serialized).unwrap();
        assert_eq!(restored.get_accounts().unwrap(), vec![address]);
    }

    #[test]
    fn test_lazy_seeding_on_first_app_key() {
        let keyring = Keyring::default();
        keyring.get_app_key_address("m/44'/60'/0'/0/0").unwrap();
        assert!(keyring.serialize().unwrap().mnemonic.is_some());
    }

    #[test]
    fn test_reseed_clears_derived_keys() {
        let keyring = Keyring::new(KeyringOptions {
            mnemonic: Some(ABANDON.to_string()),
            number_of_accounts: Some(2),
            hd_path: None,
        })
        .unwrap();
        keyring.get_app_key_address("m/1'").unwrap();

        let other = generate_mnemonic(MnemonicStrength::Words12).unwrap();
        keyring.init_from_mnemonic(&other).unwrap();

        assert!(keyring.get_accounts().unwrap().is_empty());
        assert!(keyring.app_key_paths().unwrap().is_empty());
        assert_eq!(keyring.serialize().unwrap().mnemonic, Some(other));
    }

    #[test]
    fn test_invalid_mnemonic_leaves_state_untouched() {
        let keyring = Keyring::new(KeyringOptions {
            mnemonic: Some(ABANDON.to_string()),
            number_of_accounts: Some(1),
            hd_path: None,
        })
        .unwrap();

        let result = keyring.init_from_mnemonic("not a real phrase");
        assert!(matches!(result, Err(Error::InvalidMnemonic(_))));
        assert_eq!(keyring.get_accounts().unwrap().len(), 1);
    }

    #[test]
    fn test_zero_count_restore_leaves_accounts_empty() {
        let keyring = Keyring::new(KeyringOptions {
            mnemonic: Some(ABANDON.to_string()),
            number_of_accounts: Some(0),
            hd_path: None,
        })
        .unwrap();

        assert!(keyring.get_accounts().unwrap().is_empty());
    }
}
