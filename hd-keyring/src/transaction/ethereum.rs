//! Ethereum transaction functionality

use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Bytes, Signature, H256};

use crate::crypto::keys::PrivateKey;
use crate::error::{Error, Result};
use super::SignableTransaction;

/// Chain used when the request does not name one
pub const DEFAULT_CHAIN_ID: u64 = 1;

/// An Ethereum transaction request plus the signature it receives
#[derive(Debug, Clone)]
pub struct EthereumTransaction {
    request: TypedTransaction,
    signature: Option<Signature>,
}

impl EthereumTransaction {
    /// Wrap an unsigned request
    pub fn new(request: impl Into<TypedTransaction>) -> Self {
        Self { request: request.into(), signature: None }
    }

    pub fn request(&self) -> &TypedTransaction {
        &self.request
    }

    pub fn signature(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }

    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    /// Hash that was (or will be) signed
    pub fn sighash(&self) -> H256 {
        self.request.sighash()
    }

    /// RLP encoding of the signed transaction, ready for broadcast
    pub fn raw_signed(&self) -> Option<Bytes> {
        self.signature.as_ref().map(|signature| self.request.rlp_signed(signature))
    }
}

impl SignableTransaction for EthereumTransaction {
    fn sign(&mut self, private_key: &PrivateKey) -> Result<()> {
        let wallet = LocalWallet::from_bytes(private_key.as_bytes())
            .map_err(|e| Error::SigningFailed(format!("Invalid private key: {}", e)))?;

        // The sighash must commit to the same chain id the signature's v encodes
        if self.request.chain_id().is_none() {
            self.request.set_chain_id(DEFAULT_CHAIN_ID);
        }
        self.request.set_from(wallet.address());

        let signature = wallet.sign_transaction_sync(&self.request)
            .map_err(|e| Error::SigningFailed(e.to_string()))?;

        self.signature = Some(signature);
        Ok(())
    }
}
