//! Block header and merkle block types.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::encoding::ByteWriter;
use crate::hash::{BlockHash, TxHash};

/// A block header with its chain height.
///
/// The hash covers the 80-byte wire layout (version, prev hash, merkle root,
/// timestamp, bits, nonce); height is local bookkeeping and not hashed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeaderData {
    pub version: u32,
    pub prev_hash: BlockHash,
    pub merkle_root: TxHash,
    pub timestamp: u32,
    pub bits: u32,
    pub nonce: u32,
    pub height: u32,
}

impl BlockHeaderData {
    pub fn hash(&self) -> BlockHash {
        let mut w = ByteWriter::with_capacity(80);
        w.put_u32_le(self.version);
        w.put_bytes(self.prev_hash.as_bytes());
        w.put_bytes(self.merkle_root.as_bytes());
        w.put_u32_le(self.timestamp);
        w.put_u32_le(self.bits);
        w.put_u32_le(self.nonce);
        let first = Sha256::digest(w.into_bytes());
        BlockHash::new(Sha256::digest(first).into())
    }
}

/// A merkle block: a header plus the matched transaction hashes and the
/// partial-merkle-tree flag bits that prove their inclusion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleBlockData {
    pub header: BlockHeaderData,
    /// Total transactions in the full block.
    pub tx_count: u32,
    /// Hashes matched by the filter, in depth-first tree order.
    pub hashes: Vec<TxHash>,
    pub flags: Vec<u8>,
}
