//! Block header and merkle block records.

use serde::{Deserialize, Serialize};

use vault_types::{BlockHash, TxHash};

use crate::HeaderId;

/// A stored block header. At most one exists per height.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HeaderRecord {
    pub id: HeaderId,
    pub hash: BlockHash,
    pub height: u32,
    pub version: u32,
    pub prev_hash: BlockHash,
    pub merkle_root: TxHash,
    pub timestamp: u32,
    pub bits: u32,
    pub nonce: u32,
}

/// The merkle proof data that arrived with a header. Erased together with
/// its header during reorganization.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MerkleBlockRecord {
    pub header: HeaderId,
    pub tx_count: u32,
    /// Transaction hashes matched by the proof.
    pub hashes: Vec<TxHash>,
    pub flags: Vec<u8>,
}
