//! Transaction records.

use serde::{Deserialize, Serialize};

use vault_types::{OutputStatus, Timestamp, TxHash, TxStatus};

use crate::{AccountId, HeaderId, ScriptId, TxId};

/// Identifies one input of a stored transaction; the target of an output's
/// `spent_by` back-reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InPoint {
    pub tx: TxId,
    pub input: u32,
}

/// An input owned by its transaction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TxInRecord {
    /// Hash of the transaction whose output this spends.
    pub outpoint_hash: TxHash,
    pub outpoint_index: u32,
    pub script: Vec<u8>,
    pub sequence: u32,
}

/// An output owned by its transaction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TxOutRecord {
    pub value: u64,
    pub script: Vec<u8>,
    /// Set when the output pays one of the vault's signing scripts.
    pub signing_script: Option<ScriptId>,
    /// The stored input spending this output, if any.
    pub spent_by: Option<InPoint>,
    pub receiving_account: Option<AccountId>,
    /// Hint recorded on outgoing payments to foreign scripts.
    pub sending_account: Option<AccountId>,
    pub status: OutputStatus,
}

/// A transaction touching the vault.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TxRecord {
    pub id: TxId,
    pub version: u32,
    pub locktime: u32,
    /// When the vault first saw or built this transaction.
    pub timestamp: Timestamp,
    pub status: TxStatus,
    /// input total − output total; defined only when every outpoint is
    /// known locally.
    pub fee: Option<u64>,
    /// Link to the confirming block header.
    pub header: Option<HeaderId>,
    /// Index within the merkle block; the `0xffff_ffff` sentinel when
    /// unknown.
    pub block_tx_index: u32,
    /// Hash of the transaction with unsigned input scripts. Always defined.
    pub unsigned_hash: TxHash,
    /// Hash of the fully signed transaction; absent while signatures are
    /// missing.
    pub hash: Option<TxHash>,
    pub inputs: Vec<TxInRecord>,
    pub outputs: Vec<TxOutRecord>,
}

impl TxRecord {
    /// The hash this transaction is known by: the signed hash once fully
    /// signed, the unsigned hash before that.
    pub fn lookup_hash(&self) -> TxHash {
        self.hash.unwrap_or(self.unsigned_hash)
    }
}
