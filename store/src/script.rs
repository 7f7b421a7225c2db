//! Signing script and key records.

use serde::{Deserialize, Serialize};

use vault_types::ScriptStatus;

use crate::{BinId, KeyId, KeychainId, ScriptId};

/// A prepared output/input script pair at one derivation index of a bin.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScriptRecord {
    pub id: ScriptId,
    pub bin: BinId,
    /// Dense, strictly increasing within the bin.
    pub index: u32,
    pub label: String,
    pub status: ScriptStatus,
    /// Unsigned multisig input script (edit form), ready for signing.
    pub txin_template: Vec<u8>,
    /// The output script that pays this script.
    pub txout_script: Vec<u8>,
    /// One key per constituent keychain.
    pub keys: Vec<KeyId>,
}

/// One derived public key of a signing script.
///
/// Private scalars are never stored here; signing re-derives them from the
/// unlocked root keychain along `derivation_path`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KeyRecord {
    pub id: KeyId,
    pub script: ScriptId,
    pub root_keychain: KeychainId,
    /// Child indices walked from the root keychain to this key.
    pub derivation_path: Vec<u32>,
    /// Compressed secp256k1 public key.
    pub pubkey: Vec<u8>,
    /// Whether the root keychain holds private material for this key.
    pub is_private: bool,
}
