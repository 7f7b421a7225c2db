//! LMDB storage backend for the vault.
//!
//! One environment holds a database per entity plus the secondary indexes
//! (by name, by content hash, by outpoint, by height, by output script) the
//! engines query. All access goes through [`WriteBatch`], a single LMDB
//! write transaction that commits atomically or rolls back on drop.

pub mod batch;
pub mod environment;
pub mod error;

pub use batch::WriteBatch;
pub use environment::VaultEnvironment;
pub use error::LmdbError;
