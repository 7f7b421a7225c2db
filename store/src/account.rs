//! Account and account-bin records.

use serde::{Deserialize, Serialize};

use vault_types::Hash160;

use crate::{AccountId, BinId, KeychainId};

/// A multisignature account: an m-of-n policy over a set of keychains.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub id: AccountId,
    /// Unique display name.
    pub name: String,
    /// Content hash: HASH160(min_sigs ‖ sorted keychain hashes).
    pub hash: Hash160,
    /// Signature threshold.
    pub min_sigs: u32,
    /// Constituent keychains, in creation order.
    pub keychains: Vec<KeychainId>,
    /// Minimum number of unused scripts each bin keeps pooled.
    pub unused_pool_size: u32,
    /// Unix time the account was created; bounds block ingestion.
    pub time_created: u32,
}

/// The index of the change bin every account is born with.
pub const CHANGE_BIN_INDEX: u32 = 0;
/// The index of the default receive bin every account is born with.
pub const DEFAULT_BIN_INDEX: u32 = 1;

/// A named bucket of signing scripts within an account.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BinRecord {
    pub id: BinId,
    pub account: AccountId,
    /// Position within the account; 0 is the change bin.
    pub index: u32,
    /// Unique within the account.
    pub name: String,
    /// Derivation index the next created script will use.
    pub next_script_index: u32,
}

impl BinRecord {
    pub fn is_change(&self) -> bool {
        self.index == CHANGE_BIN_INDEX
    }
}
