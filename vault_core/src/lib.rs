//! The vault: the persistent, transactional core of a multisignature
//! wallet.
//!
//! Manages hierarchical deterministic keychains, m-of-n accounts with their
//! address bins and unused-script pools, transactions across their signature
//! and confirmation lifecycle, and a tracked block-header chain with
//! reorganization handling. All state lives in an LMDB store; every public
//! operation runs under one process-wide mutex and one store transaction.

pub mod accounts;
pub mod bloom;
pub mod chain;
pub mod error;
pub mod keychains;
pub mod portable;
pub mod scripts;
pub mod txs;
mod unlock;
pub mod vault;
pub mod views;

pub use accounts::{ImportAccountReport, ImportAccountRequest};
pub use bloom::BloomFilter;
pub use error::VaultError;
pub use keychains::{ImportKeychainReport, ImportKeychainRequest};
pub use txs::SigningRequest;
pub use vault::Vault;
pub use views::{AccountInfo, SigningScriptView, TxOutView};
