//! App keys: key pairs memoized by derivation path

use std::collections::HashMap;

use tracing::debug;

use crate::crypto::keys::{DerivationPath, KeyPair};
use crate::error::Result;

/// A key pair derived for an application at a caller-chosen path
#[derive(Debug, Clone)]
pub struct AppKeyEntry {
    path: DerivationPath,
    key_pair: KeyPair,
}

impl AppKeyEntry {
    pub fn path(&self) -> &DerivationPath {
        &self.path
    }

    pub fn key_pair(&self) -> &KeyPair {
        &self.key_pair
    }
}

/// Path-addressed cache with at most one entry per path string and no eviction
#[derive(Debug, Default)]
pub struct AppKeyCache {
    entries: Vec<AppKeyEntry>,
    by_path: HashMap<DerivationPath, usize>,
}

impl AppKeyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached key pair for exactly this path, if any
    pub fn get(&self, path: &DerivationPath) -> Option<&KeyPair> {
        self.by_path.get(path).map(|slot| &self.entries[*slot].key_pair)
    }

    /// Return the cached pair, or run `derive` once and remember its result
    ///
    /// `derive` only runs on a miss, so repeated calls are free of side effects.
    pub fn get_or_create<F>(&mut self, path: &DerivationPath, derive: F) -> Result<&KeyPair>
    where
        F: FnOnce(&DerivationPath) -> Result<KeyPair>,
    {
        let cached = self.by_path.get(path).copied();
        let slot = match cached {
            Some(slot) => {
                debug!(path = %path, "app key cache hit");
                slot
            }
            None => {
                let key_pair = derive(path)?;
                debug!(path = %path, address = %key_pair.address(), "derived app key");
                self.entries.push(AppKeyEntry { path: path.clone(), key_pair });
                let slot = self.entries.len() - 1;
                self.by_path.insert(path.clone(), slot);
                slot
            }
        };

        Ok(&self.entries[slot].key_pair)
    }

    /// Cached paths in the order they were first requested
    pub fn paths(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.path.to_string()).collect()
    }

    pub fn entries(&self) -> &[AppKeyEntry] {
        &self.entries
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.by_path.clear();
    }
}
