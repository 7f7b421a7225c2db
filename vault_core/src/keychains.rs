//! Keychain engine: creation, import/export, renaming and the unlock
//! machinery for chain codes and master private keys.

use std::collections::HashMap;
use std::path::Path;

use tracing::debug;

use vault_crypto::{decrypt_secret, encrypt_secret, hash160, master_from_entropy, pubkey_from_privkey};
use vault_store::{AccountRecord, KeychainId, KeychainRecord};
use vault_store_lmdb::WriteBatch;
use vault_types::{Hash160, SecretBytes};

use crate::error::VaultError;
use crate::portable;
use crate::unlock::UnlockCache;

/// Whether an import should carry private key material in.
#[derive(Clone, Copy, Debug)]
pub struct ImportKeychainRequest {
    pub import_privkeys: bool,
}

/// What an import actually did.
#[derive(Clone, Copy, Debug)]
pub struct ImportKeychainReport {
    pub privkeys_imported: bool,
}

/// Content hash of a keychain: HASH160 over the public key and the
/// plaintext chain code. Computed once at creation and invariant under
/// re-encryption.
pub(crate) fn keychain_content_hash(pubkey: &[u8], chain_code: &[u8]) -> Hash160 {
    let mut material = Vec::with_capacity(pubkey.len() + chain_code.len());
    material.extend_from_slice(pubkey);
    material.extend_from_slice(chain_code);
    Hash160::new(hash160(&material))
}

/// Derive a fresh root keychain from entropy and encrypt its secrets under
/// `lock_key` + `salt`.
pub(crate) fn create_keychain_record(
    name: &str,
    entropy: &SecretBytes,
    lock_key: &SecretBytes,
    salt: &[u8],
) -> Result<KeychainRecord, VaultError> {
    let (master_privkey, chain_code) = master_from_entropy(entropy.as_slice())?;
    let pubkey = pubkey_from_privkey(&master_privkey)?;

    let chain_code_ciphertext = encrypt_secret(&chain_code, lock_key, salt)?;
    let privkey_ciphertext = encrypt_secret(&master_privkey, lock_key, salt)?;

    Ok(KeychainRecord {
        id: 0,
        name: name.to_string(),
        hash: keychain_content_hash(&pubkey, &chain_code),
        depth: 0,
        parent: None,
        derivation_index: 0,
        pubkey,
        chain_code_ciphertext,
        chain_code_salt: salt.to_vec(),
        privkey_ciphertext: Some(privkey_ciphertext),
        privkey_salt: salt.to_vec(),
    })
}

pub(crate) fn get_keychain(batch: &WriteBatch, name: &str) -> Result<KeychainRecord, VaultError> {
    batch
        .keychain_by_name(name)?
        .ok_or_else(|| VaultError::KeychainNotFound(name.to_string()))
}

/// Suffix a name with 1, 2, … until it no longer collides.
pub(crate) fn unique_keychain_name(batch: &WriteBatch, base: &str) -> Result<String, VaultError> {
    if batch.keychain_by_name(base)?.is_none() {
        return Ok(base.to_string());
    }
    let mut append_num = 1u32;
    loop {
        let candidate = format!("{base}{append_num}");
        if batch.keychain_by_name(&candidate)?.is_none() {
            return Ok(candidate);
        }
        append_num += 1;
    }
}

/// Decrypt a keychain's chain code with an explicit secret.
pub(crate) fn decrypt_chain_code(
    keychain: &KeychainRecord,
    secret: &SecretBytes,
) -> Result<[u8; 32], VaultError> {
    let plaintext = decrypt_secret(&keychain.chain_code_ciphertext, secret, &keychain.chain_code_salt)
        .map_err(|_| VaultError::KeychainChainCodeUnlockFailed(keychain.name.clone()))?;
    plaintext
        .as_slice()
        .try_into()
        .map_err(|_| VaultError::KeychainChainCodeUnlockFailed(keychain.name.clone()))
}

/// Decrypt a keychain's master private key with an explicit secret.
pub(crate) fn decrypt_private_key(
    keychain: &KeychainRecord,
    secret: &SecretBytes,
) -> Result<[u8; 32], VaultError> {
    let ciphertext = keychain
        .privkey_ciphertext
        .as_deref()
        .ok_or_else(|| VaultError::KeychainIsNotPrivate(keychain.name.clone()))?;
    let plaintext = decrypt_secret(ciphertext, secret, &keychain.privkey_salt)
        .map_err(|_| VaultError::KeychainPrivateKeyUnlockFailed(keychain.name.clone()))?;
    plaintext
        .as_slice()
        .try_into()
        .map_err(|_| VaultError::KeychainPrivateKeyUnlockFailed(keychain.name.clone()))
}

/// Decrypt a chain code through the unlock cache. A cached secret that no
/// longer decrypts is evicted.
pub(crate) fn try_unlock_chain_code(
    unlock: &mut UnlockCache,
    keychain: &KeychainRecord,
) -> Option<[u8; 32]> {
    let secret = unlock.chain_code_secret(&keychain.name)?.clone();
    match decrypt_chain_code(keychain, &secret) {
        Ok(chain_code) => Some(chain_code),
        Err(_) => {
            unlock.forget_chain_code(&keychain.name);
            None
        }
    }
}

/// Decrypt a master private key through the unlock cache.
pub(crate) fn try_unlock_private_key(
    unlock: &mut UnlockCache,
    keychain: &KeychainRecord,
) -> Option<[u8; 32]> {
    let secret = unlock.private_key_secret(&keychain.name)?.clone();
    match decrypt_private_key(keychain, &secret) {
        Ok(privkey) => Some(privkey),
        Err(_) => {
            unlock.forget_private_key(&keychain.name);
            None
        }
    }
}

/// Unlock the chain code of every keychain of an account, collecting the
/// plaintexts by keychain id. Raises `AccountChainCodeLocked` naming the
/// keychains that could not be unlocked.
pub(crate) fn unlock_account_chain_codes(
    batch: &WriteBatch,
    unlock: &mut UnlockCache,
    account: &AccountRecord,
) -> Result<HashMap<KeychainId, [u8; 32]>, VaultError> {
    let mut chain_codes = HashMap::new();
    let mut failing = Vec::new();
    for &keychain_id in &account.keychains {
        let keychain = batch
            .keychain_by_id(keychain_id)?
            .ok_or_else(|| VaultError::Inconsistency(format!("missing keychain id {keychain_id}")))?;
        match try_unlock_chain_code(unlock, &keychain) {
            Some(chain_code) => {
                chain_codes.insert(keychain_id, chain_code);
            }
            None => failing.push(keychain.name),
        }
    }
    if !failing.is_empty() {
        return Err(VaultError::AccountChainCodeLocked {
            account: account.name.clone(),
            failing_keychains: failing,
        });
    }
    Ok(chain_codes)
}

/// Re-encrypt a keychain's chain code under a new lock key and salt. The
/// content hash is untouched.
pub(crate) fn relock_chain_code(
    keychain: &mut KeychainRecord,
    chain_code: &[u8; 32],
    new_lock_key: &SecretBytes,
    salt: &[u8],
) -> Result<(), VaultError> {
    keychain.chain_code_ciphertext = encrypt_secret(chain_code, new_lock_key, salt)?;
    keychain.chain_code_salt = salt.to_vec();
    Ok(())
}

/// Copy private key material from one keychain into another holding the
/// same key material (same content hash).
pub(crate) fn fold_private_material(stored: &mut KeychainRecord, from: &KeychainRecord) {
    stored.privkey_ciphertext = from.privkey_ciphertext.clone();
    stored.privkey_salt = from.privkey_salt.clone();
}

// ── Operations ──────────────────────────────────────────────────────────

pub(crate) fn new_keychain(
    batch: &mut WriteBatch,
    name: &str,
    entropy: &SecretBytes,
    lock_key: &SecretBytes,
    salt: &[u8],
) -> Result<KeychainRecord, VaultError> {
    if batch.keychain_by_name(name)?.is_some() {
        return Err(VaultError::KeychainAlreadyExists(name.to_string()));
    }
    let mut keychain = create_keychain_record(name, entropy, lock_key, salt)?;
    batch.insert_keychain(&mut keychain)?;
    Ok(keychain)
}

pub(crate) fn rename_keychain(
    batch: &mut WriteBatch,
    old_name: &str,
    new_name: &str,
) -> Result<(), VaultError> {
    let mut keychain = get_keychain(batch, old_name)?;
    if old_name == new_name {
        return Ok(());
    }
    if batch.keychain_by_name(new_name)?.is_some() {
        return Err(VaultError::KeychainAlreadyExists(new_name.to_string()));
    }
    keychain.name = new_name.to_string();
    batch.update_keychain(&keychain)?;
    Ok(())
}

pub(crate) fn export_keychain(
    batch: &WriteBatch,
    name: &str,
    path: &Path,
    with_privkeys: bool,
) -> Result<(), VaultError> {
    let mut keychain = get_keychain(batch, name)?;
    if with_privkeys && !keychain.is_private() {
        return Err(VaultError::KeychainIsNotPrivate(name.to_string()));
    }
    if !with_privkeys {
        keychain.clear_privkey();
    }
    portable::save_keychain_file(path, &keychain)
}

/// Deserialize a keychain file. A stored keychain with the same content
/// hash absorbs any new private material; otherwise the loaded keychain is
/// persisted under a conflict-free name.
pub(crate) fn import_keychain(
    batch: &mut WriteBatch,
    path: &Path,
    request: ImportKeychainRequest,
) -> Result<(KeychainRecord, ImportKeychainReport), VaultError> {
    let mut keychain = portable::load_keychain_file(path)?;

    let privkeys_imported = request.import_privkeys && keychain.is_private();
    if !privkeys_imported {
        keychain.clear_privkey();
    }

    if let Some(mut stored) = batch.keychain_by_hash(&keychain.hash)? {
        if keychain.is_private() && !stored.is_private() {
            debug!(name = %stored.name, "importing private key material into stored keychain");
            fold_private_material(&mut stored, &keychain);
            batch.update_keychain(&stored)?;
            return Ok((stored, ImportKeychainReport { privkeys_imported }));
        }
        return Err(VaultError::KeychainAlreadyExists(stored.name));
    }

    keychain.name = unique_keychain_name(batch, &keychain.name)?;
    batch.insert_keychain(&mut keychain)?;
    Ok((keychain, ImportKeychainReport { privkeys_imported }))
}
