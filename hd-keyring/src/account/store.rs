//! Sequential HD accounts

use tracing::debug;

use crate::crypto::keys::{DerivationTree, KeyPair};
use crate::error::{Error, Result};
use super::address::Address;

/// A derived account and its position in the sequence
#[derive(Debug, Clone)]
pub struct Account {
    index: u32,
    key_pair: KeyPair,
}

impl Account {
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn key_pair(&self) -> &KeyPair {
        &self.key_pair
    }

    pub fn address(&self) -> &Address {
        self.key_pair.address()
    }
}

/// Append-only list of accounts; indices are dense and start at 0
#[derive(Debug, Default)]
pub struct AccountStore {
    accounts: Vec<Account>,
}

impl AccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Derive `count` more accounts and return only the new addresses
    ///
    /// Nothing is appended unless every new index derives successfully.
    pub fn add_accounts(&mut self, tree: &DerivationTree, count: usize) -> Result<Vec<Address>> {
        if count == 0 {
            return Err(Error::InvalidInput("number of accounts must be positive".to_string()));
        }

        let start = self.accounts.len();
        let mut added = Vec::with_capacity(count);
        for position in start..start + count {
            let index = u32::try_from(position)
                .map_err(|_| Error::KeyDerivation(format!("Account index out of range: {}", position)))?;
            let key_pair = tree.derive_child(index)?;
            debug!(index, address = %key_pair.address(), "derived account");
            added.push(Account { index, key_pair });
        }

        let addresses = added.iter().map(|account| account.address().clone()).collect();
        self.accounts.extend(added);
        Ok(addresses)
    }

    /// All addresses in derivation order
    pub fn addresses(&self) -> Vec<Address> {
        self.accounts.iter().map(|account| account.address().clone()).collect()
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    /// First account whose address matches `address` after normalization
    pub fn find_by_address(&self, address: &str) -> Option<&KeyPair> {
        let target = Address::normalize(address);
        self.accounts
            .iter()
            .find(|account| *account.address() == target)
            .map(Account::key_pair)
    }

    /// Like [`find_by_address`](Self::find_by_address) but unknown addresses are an error
    pub fn get(&self, address: &str) -> Result<&KeyPair> {
        self.find_by_address(address)
            .ok_or_else(|| Error::UnknownAccount(address.to_string()))
    }

    pub fn clear(&mut self) {
        self.accounts.clear();
    }
}
