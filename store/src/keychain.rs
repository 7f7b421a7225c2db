//! Keychain records.

use serde::{Deserialize, Serialize};

use vault_types::Hash160;

use crate::KeychainId;

/// A hierarchical deterministic keychain.
///
/// The chain code and (optionally) the master private key are stored
/// ciphertext-only; `hash` fingerprints the plaintext key material and is
/// computed once at creation, so re-encrypting under a different lock key
/// never changes identity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KeychainRecord {
    pub id: KeychainId,
    /// Unique display name.
    pub name: String,
    /// Content hash: HASH160(pubkey ‖ plaintext chain code).
    pub hash: Hash160,
    /// Derivation depth from the root (0 for roots).
    pub depth: u32,
    /// Root keychains have no parent.
    pub parent: Option<KeychainId>,
    /// Index this keychain was derived at under its parent.
    pub derivation_index: u32,
    /// Compressed secp256k1 public key.
    pub pubkey: Vec<u8>,
    pub chain_code_ciphertext: Vec<u8>,
    pub chain_code_salt: Vec<u8>,
    /// Present only for private keychains.
    pub privkey_ciphertext: Option<Vec<u8>>,
    pub privkey_salt: Vec<u8>,
}

impl KeychainRecord {
    /// Whether this keychain holds (encrypted) private key material.
    pub fn is_private(&self) -> bool {
        self.privkey_ciphertext.is_some()
    }

    /// Drop private key material, leaving a watch-only keychain.
    pub fn clear_privkey(&mut self) {
        self.privkey_ciphertext = None;
        self.privkey_salt.clear();
    }
}
