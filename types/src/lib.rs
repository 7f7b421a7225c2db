//! Core types shared across the vault crates.
//!
//! Hashes, secret byte containers, timestamps, the status machines for
//! transactions / outputs / signing scripts, the raw transaction and block
//! header wire codecs, and protocol constants.

pub mod block;
pub mod encoding;
pub mod hash;
pub mod params;
pub mod secret;
pub mod status;
pub mod time;
pub mod tx;

pub use block::{BlockHeaderData, MerkleBlockData};
pub use encoding::CodecError;
pub use hash::{BlockHash, Hash160, TxHash};
pub use secret::SecretBytes;
pub use status::{OutputStatus, ScriptStatus, TxStatus};
pub use time::Timestamp;
pub use tx::{RawTransaction, RawTxIn, RawTxOut};
