//! The process-scoped unlock cache.
//!
//! Two maps from keychain name to the secret that decrypts its chain code
//! and its master private key respectively. Lives inside the vault behind
//! the same mutex as everything else; secrets never persist and zeroize on
//! drop.

use std::collections::HashMap;

use vault_types::SecretBytes;

#[derive(Default)]
pub(crate) struct UnlockCache {
    chain_codes: HashMap<String, SecretBytes>,
    private_keys: HashMap<String, SecretBytes>,
}

impl UnlockCache {
    pub fn cache_chain_code(&mut self, name: &str, secret: SecretBytes) {
        self.chain_codes.insert(name.to_string(), secret);
    }

    pub fn chain_code_secret(&self, name: &str) -> Option<&SecretBytes> {
        self.chain_codes.get(name)
    }

    pub fn forget_chain_code(&mut self, name: &str) {
        self.chain_codes.remove(name);
    }

    pub fn clear_chain_codes(&mut self) {
        self.chain_codes.clear();
    }

    pub fn cache_private_key(&mut self, name: &str, secret: SecretBytes) {
        self.private_keys.insert(name.to_string(), secret);
    }

    pub fn private_key_secret(&self, name: &str) -> Option<&SecretBytes> {
        self.private_keys.get(name)
    }

    pub fn forget_private_key(&mut self, name: &str) {
        self.private_keys.remove(name);
    }

    pub fn clear_private_keys(&mut self) {
        self.private_keys.clear();
    }
}
