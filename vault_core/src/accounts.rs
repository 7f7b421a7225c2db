//! Account engine: multisignature accounts and their bins.

use std::collections::HashMap;
use std::path::Path;

use tracing::debug;

use vault_crypto::hash160;
use vault_store::{AccountRecord, BinRecord, KeychainId, KeychainRecord};
use vault_store_lmdb::WriteBatch;
use vault_types::params::{CHANGE_BIN_NAME, DEFAULT_BIN_NAME};
use vault_types::{Hash160, ScriptStatus, SecretBytes};

use crate::error::VaultError;
use crate::keychains;
use crate::portable;
use crate::scripts;
use crate::unlock::UnlockCache;

/// Whether an account import should carry private key material in.
#[derive(Clone, Copy, Debug)]
pub struct ImportAccountRequest {
    pub import_privkeys: bool,
}

/// What an account import actually did.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImportAccountReport {
    /// Keychains whose private material was carried in.
    pub privkeys_imported: u32,
}

/// Content hash of an account: HASH160 over the threshold and the sorted
/// keychain content hashes, so identity is independent of keychain order
/// and naming.
pub(crate) fn account_content_hash(min_sigs: u32, keychain_hashes: &[Hash160]) -> Hash160 {
    let mut sorted: Vec<&Hash160> = keychain_hashes.iter().collect();
    sorted.sort();
    let mut material = Vec::with_capacity(4 + sorted.len() * 20);
    material.extend_from_slice(&min_sigs.to_le_bytes());
    for hash in sorted {
        material.extend_from_slice(hash.as_bytes());
    }
    Hash160::new(hash160(&material))
}

pub(crate) fn get_account(batch: &WriteBatch, name: &str) -> Result<AccountRecord, VaultError> {
    batch
        .account_by_name(name)?
        .ok_or_else(|| VaultError::AccountNotFound(name.to_string()))
}

pub(crate) fn get_account_bin(
    batch: &WriteBatch,
    account_name: &str,
    bin_name: &str,
) -> Result<(AccountRecord, BinRecord), VaultError> {
    let account = get_account(batch, account_name)?;
    let bin = batch
        .bin_by_name(account.id, bin_name)?
        .ok_or_else(|| VaultError::AccountBinNotFound {
            account: account_name.to_string(),
            bin: bin_name.to_string(),
        })?;
    Ok((account, bin))
}

fn unique_account_name(batch: &WriteBatch, base: &str) -> Result<String, VaultError> {
    if batch.account_by_name(base)?.is_none() {
        return Ok(base.to_string());
    }
    let mut append_num = 1u32;
    loop {
        let candidate = format!("{base}{append_num}");
        if batch.account_by_name(&candidate)?.is_none() {
            return Ok(candidate);
        }
        append_num += 1;
    }
}

fn load_account_keychains(
    batch: &WriteBatch,
    account: &AccountRecord,
) -> Result<Vec<KeychainRecord>, VaultError> {
    let mut records = Vec::with_capacity(account.keychains.len());
    for &keychain_id in &account.keychains {
        let keychain = batch.keychain_by_id(keychain_id)?.ok_or_else(|| {
            VaultError::Inconsistency(format!("missing keychain id {keychain_id}"))
        })?;
        records.push(keychain);
    }
    Ok(records)
}

// ── Operations ──────────────────────────────────────────────────────────

/// Create an account over existing keychains. Both birth bins (change at
/// index 0, default at index 1) are created and their pools filled, which
/// requires every constituent chain code to be unlockable.
pub(crate) fn new_account(
    batch: &mut WriteBatch,
    unlock: &mut UnlockCache,
    name: &str,
    min_sigs: u32,
    keychain_names: &[String],
    unused_pool_size: u32,
    time_created: u32,
) -> Result<AccountRecord, VaultError> {
    if batch.account_by_name(name)?.is_some() {
        return Err(VaultError::AccountAlreadyExists(name.to_string()));
    }

    let mut keychain_records = Vec::with_capacity(keychain_names.len());
    for keychain_name in keychain_names {
        keychain_records.push(keychains::get_keychain(batch, keychain_name)?);
    }
    let keychain_hashes: Vec<Hash160> = keychain_records.iter().map(|k| k.hash).collect();

    let mut account = AccountRecord {
        id: 0,
        name: name.to_string(),
        hash: account_content_hash(min_sigs, &keychain_hashes),
        min_sigs,
        keychains: keychain_records.iter().map(|k| k.id).collect(),
        unused_pool_size,
        time_created,
    };
    keychains::unlock_account_chain_codes(batch, unlock, &account)?;
    batch.insert_account(&mut account)?;

    // The first bin must be the change bin, the second the default bin.
    let mut change_bin = BinRecord {
        id: 0,
        account: account.id,
        index: 0,
        name: CHANGE_BIN_NAME.to_string(),
        next_script_index: 0,
    };
    batch.insert_bin(&mut change_bin)?;
    let mut default_bin = BinRecord {
        id: 0,
        account: account.id,
        index: 1,
        name: DEFAULT_BIN_NAME.to_string(),
        next_script_index: 0,
    };
    batch.insert_bin(&mut default_bin)?;

    scripts::refill_bin_pool(batch, unlock, &mut change_bin)?;
    scripts::refill_bin_pool(batch, unlock, &mut default_bin)?;
    Ok(account)
}

pub(crate) fn rename_account(
    batch: &mut WriteBatch,
    old_name: &str,
    new_name: &str,
) -> Result<(), VaultError> {
    let mut account = get_account(batch, old_name)?;
    if old_name == new_name {
        return Ok(());
    }
    if batch.account_by_name(new_name)?.is_some() {
        return Err(VaultError::AccountAlreadyExists(new_name.to_string()));
    }
    account.name = new_name.to_string();
    batch.update_account(&account)?;
    Ok(())
}

/// Add a named receive bin to an account and fill its pool. Names starting
/// with `@` are reserved for the birth bins and meta-selectors.
pub(crate) fn add_account_bin(
    batch: &mut WriteBatch,
    unlock: &mut UnlockCache,
    account_name: &str,
    bin_name: &str,
) -> Result<BinRecord, VaultError> {
    if bin_name.is_empty() || bin_name.starts_with('@') {
        return Err(VaultError::AccountBinInvalidName(bin_name.to_string()));
    }

    let account = get_account(batch, account_name)?;
    if batch.bin_by_name(account.id, bin_name)?.is_some() {
        return Err(VaultError::AccountBinAlreadyExists {
            account: account_name.to_string(),
            bin: bin_name.to_string(),
        });
    }
    keychains::unlock_account_chain_codes(batch, unlock, &account)?;

    let index = batch.bins_for_account(account.id)?.len() as u32;
    let mut bin = BinRecord {
        id: 0,
        account: account.id,
        index,
        name: bin_name.to_string(),
        next_script_index: 0,
    };
    batch.insert_bin(&mut bin)?;
    scripts::refill_bin_pool(batch, unlock, &mut bin)?;
    Ok(bin)
}

/// Refill the unused pool of every bin of an account.
pub(crate) fn refill_account_pool(
    batch: &mut WriteBatch,
    unlock: &mut UnlockCache,
    account_name: &str,
) -> Result<(), VaultError> {
    let account = get_account(batch, account_name)?;
    for mut bin in batch.bins_for_account(account.id)? {
        scripts::refill_bin_pool(batch, unlock, &mut bin)?;
    }
    Ok(())
}

/// Export an account with its keychains and bins. Chain codes are
/// re-encrypted under the supplied lock key + salt in the file only; the
/// stored keychains are untouched.
pub(crate) fn export_account(
    batch: &WriteBatch,
    unlock: &mut UnlockCache,
    account_name: &str,
    path: &Path,
    chain_code_lock_key: &SecretBytes,
    salt: &[u8],
    with_privkeys: bool,
) -> Result<(), VaultError> {
    let account = get_account(batch, account_name)?;
    let chain_codes = keychains::unlock_account_chain_codes(batch, unlock, &account)?;

    let mut portable_keychains = Vec::with_capacity(account.keychains.len());
    for mut keychain in load_account_keychains(batch, &account)? {
        let chain_code = chain_codes
            .get(&keychain.id)
            .ok_or_else(|| VaultError::Inconsistency("chain code missing after unlock".into()))?;
        keychains::relock_chain_code(&mut keychain, chain_code, chain_code_lock_key, salt)?;
        if !with_privkeys {
            keychain.clear_privkey();
        }
        portable_keychains.push(portable::portable_keychain(&keychain));
    }

    let bins = batch
        .bins_for_account(account.id)?
        .iter()
        .map(portable::portable_bin)
        .collect();

    let portable_account = portable::PortableAccount {
        name: account.name.clone(),
        hash: portable::hex_encode(account.hash.as_bytes()),
        min_sigs: account.min_sigs,
        unused_pool_size: account.unused_pool_size,
        time_created: account.time_created,
        keychains: portable_keychains,
        bins,
    };
    portable::save_account_file(path, &portable_account)
}

/// Import an account file.
///
/// Every keychain in the file must unlock with `chain_code_key`. Keychains
/// already stored (by content hash) absorb new private material and are
/// substituted into the account; as a deliberate side effect their stored
/// chain-code ciphertext is re-encrypted under `chain_code_key`. Bins are
/// recreated with their issued scripts materialized up to
/// `next_script_index`, then refilled.
pub(crate) fn import_account(
    batch: &mut WriteBatch,
    unlock: &mut UnlockCache,
    path: &Path,
    chain_code_key: &SecretBytes,
    request: ImportAccountRequest,
) -> Result<(AccountRecord, ImportAccountReport), VaultError> {
    let portable_account = portable::load_account_file(path)?;
    let mut report = ImportAccountReport::default();

    let file_hash_bytes = portable::hex_decode(&portable_account.hash)?;
    let file_hash = Hash160::from_slice(&file_hash_bytes)
        .ok_or_else(|| VaultError::FileFormat("account hash must be 20 bytes".into()))?;
    if let Some(stored) = batch.account_by_hash(&file_hash)? {
        return Err(VaultError::AccountAlreadyExists(stored.name));
    }

    let account_name = unique_account_name(batch, &portable_account.name)?;

    // Persist or merge the keychains, collecting plaintext chain codes for
    // script materialization below.
    let mut keychain_ids = Vec::with_capacity(portable_account.keychains.len());
    let mut keychain_records = Vec::with_capacity(portable_account.keychains.len());
    let mut chain_codes: HashMap<KeychainId, [u8; 32]> = HashMap::new();
    for portable_keychain in &portable_account.keychains {
        let mut keychain = portable::keychain_from_portable(portable_keychain)?;
        let chain_code = keychains::decrypt_chain_code(&keychain, chain_code_key)?;

        if request.import_privkeys {
            if keychain.is_private() {
                report.privkeys_imported += 1;
            }
        } else {
            keychain.clear_privkey();
        }

        let record = match batch.keychain_by_hash(&keychain.hash)? {
            Some(mut stored) => {
                // Stored chain codes are re-encrypted under the import
                // key; importers of a shared account end up with that key
                // as the chain-code unlock secret.
                let salt = stored.chain_code_salt.clone();
                keychains::relock_chain_code(&mut stored, &chain_code, chain_code_key, &salt)?;
                if keychain.is_private() && !stored.is_private() {
                    debug!(name = %stored.name, "importing private key material into stored keychain");
                    keychains::fold_private_material(&mut stored, &keychain);
                }
                batch.update_keychain(&stored)?;
                stored
            }
            None => {
                keychain.name = keychains::unique_keychain_name(batch, &keychain.name)?;
                batch.insert_keychain(&mut keychain)?;
                keychain
            }
        };
        chain_codes.insert(record.id, chain_code);
        keychain_ids.push(record.id);
        keychain_records.push(record);
    }

    let mut account = AccountRecord {
        id: 0,
        name: account_name,
        hash: file_hash,
        min_sigs: portable_account.min_sigs,
        keychains: keychain_ids,
        unused_pool_size: portable_account.unused_pool_size,
        time_created: portable_account.time_created,
    };
    batch.insert_account(&mut account)?;

    let mut portable_bins = portable_account.bins.clone();
    portable_bins.sort_by_key(|bin| bin.index);
    for portable_bin in &portable_bins {
        let mut bin = BinRecord {
            id: 0,
            account: account.id,
            index: portable_bin.index,
            name: portable_bin.name.clone(),
            next_script_index: 0,
        };
        batch.insert_bin(&mut bin)?;

        // Scripts below next_script_index were handed out (or used for
        // change) before export; rematerialize them in that state, then
        // refill the unused pool behind them.
        let status = if bin.is_change() {
            ScriptStatus::Change
        } else {
            ScriptStatus::Issued
        };
        for _ in 0..portable_bin.next_script_index {
            scripts::create_signing_script(
                batch,
                &account,
                &mut bin,
                &keychain_records,
                &chain_codes,
                status,
                "",
            )?;
        }
        for _ in 0..account.unused_pool_size {
            scripts::create_signing_script(
                batch,
                &account,
                &mut bin,
                &keychain_records,
                &chain_codes,
                ScriptStatus::Unused,
                "",
            )?;
        }
        batch.update_bin(&bin)?;
    }

    Ok((account, report))
}
