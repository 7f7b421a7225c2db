//! Entity records and the storage contract for the vault.
//!
//! Every storage backend persists these records and serves the indexed
//! lookups the engines need; the rest of the codebase depends only on the
//! records and [`StoreError`]. Relationships between entities are surrogate
//! ids, and back-references (an output's spender) are nullable id pairs, so
//! the cyclic transaction graph never holds owning pointers.

pub mod account;
pub mod chain;
pub mod error;
pub mod keychain;
pub mod script;
pub mod tx;

pub use account::{AccountRecord, BinRecord};
pub use chain::{HeaderRecord, MerkleBlockRecord};
pub use error::StoreError;
pub use keychain::KeychainRecord;
pub use script::{KeyRecord, ScriptRecord};
pub use tx::{InPoint, TxInRecord, TxOutRecord, TxRecord};

/// Surrogate id types. Allocated by the backend from per-entity sequences;
/// zero is never issued.
pub type KeychainId = u64;
pub type AccountId = u64;
pub type BinId = u64;
pub type ScriptId = u64;
pub type KeyId = u64;
pub type TxId = u64;
pub type HeaderId = u64;
