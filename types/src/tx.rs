//! Raw transaction wire codec.
//!
//! The canonical byte layout: version, varint-counted inputs
//! (outpoint + script + sequence), varint-counted outputs (value + script),
//! locktime. Hashes are double SHA-256 over these bytes.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::encoding::{ByteReader, ByteWriter, CodecError};
use crate::hash::TxHash;

/// A transaction input on the wire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTxIn {
    /// Hash of the transaction whose output is being spent.
    pub prev_hash: TxHash,
    /// Index of that output.
    pub prev_index: u32,
    pub script: Vec<u8>,
    pub sequence: u32,
}

/// A transaction output on the wire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTxOut {
    pub value: u64,
    pub script: Vec<u8>,
}

/// A complete raw transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTransaction {
    pub version: u32,
    pub inputs: Vec<RawTxIn>,
    pub outputs: Vec<RawTxOut>,
    pub locktime: u32,
}

impl RawTransaction {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = ByteWriter::with_capacity(64 + 64 * self.inputs.len());
        w.put_u32_le(self.version);
        w.put_varint(self.inputs.len() as u64);
        for input in &self.inputs {
            w.put_bytes(input.prev_hash.as_bytes());
            w.put_u32_le(input.prev_index);
            w.put_var_bytes(&input.script);
            w.put_u32_le(input.sequence);
        }
        w.put_varint(self.outputs.len() as u64);
        for output in &self.outputs {
            w.put_u64_le(output.value);
            w.put_var_bytes(&output.script);
        }
        w.put_u32_le(self.locktime);
        w.into_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut r = ByteReader::new(bytes);
        let version = r.get_u32_le()?;
        let input_count = r.get_varint()?;
        let mut inputs = Vec::with_capacity(input_count.min(1024) as usize);
        for _ in 0..input_count {
            inputs.push(RawTxIn {
                prev_hash: TxHash::new(r.get_array()?),
                prev_index: r.get_u32_le()?,
                script: r.get_var_bytes()?,
                sequence: r.get_u32_le()?,
            });
        }
        let output_count = r.get_varint()?;
        let mut outputs = Vec::with_capacity(output_count.min(1024) as usize);
        for _ in 0..output_count {
            outputs.push(RawTxOut {
                value: r.get_u64_le()?,
                script: r.get_var_bytes()?,
            });
        }
        let locktime = r.get_u32_le()?;
        r.finish()?;
        Ok(Self {
            version,
            inputs,
            outputs,
            locktime,
        })
    }

    /// Double SHA-256 of the serialized transaction.
    pub fn txid(&self) -> TxHash {
        TxHash::new(sha256d(&self.to_bytes()))
    }

    /// The signature-hash preimage digest: serialized transaction with a
    /// 32-bit hash-type code appended, double SHA-256'd.
    pub fn hash_with_appended_code(&self, code: u32) -> TxHash {
        let mut bytes = self.to_bytes();
        bytes.extend_from_slice(&code.to_le_bytes());
        TxHash::new(sha256d(&bytes))
    }
}

fn sha256d(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    Sha256::digest(first).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tx() -> RawTransaction {
        RawTransaction {
            version: 1,
            inputs: vec![RawTxIn {
                prev_hash: TxHash::new([7u8; 32]),
                prev_index: 2,
                script: vec![0x51],
                sequence: 0xffff_ffff,
            }],
            outputs: vec![
                RawTxOut {
                    value: 50_000,
                    script: vec![0xa9, 0x14],
                },
                RawTxOut {
                    value: 1_234,
                    script: vec![],
                },
            ],
            locktime: 0,
        }
    }

    #[test]
    fn serialize_roundtrip() {
        let tx = sample_tx();
        let decoded = RawTransaction::from_bytes(&tx.to_bytes()).unwrap();
        assert_eq!(decoded, tx);
    }

    #[test]
    fn txid_is_stable() {
        let tx = sample_tx();
        assert_eq!(tx.txid(), tx.txid());
        let mut other = tx.clone();
        other.locktime = 1;
        assert_ne!(other.txid(), tx.txid());
    }

    #[test]
    fn appended_code_changes_digest() {
        let tx = sample_tx();
        assert_ne!(tx.hash_with_appended_code(1), tx.txid());
        assert_ne!(tx.hash_with_appended_code(1), tx.hash_with_appended_code(2));
    }

    #[test]
    fn truncated_input_rejected() {
        let tx = sample_tx();
        let bytes = tx.to_bytes();
        assert!(RawTransaction::from_bytes(&bytes[..bytes.len() - 1]).is_err());
    }
}
