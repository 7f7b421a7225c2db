//! Script pool manager: derive signing scripts into bins and issue them.

use std::collections::HashMap;

use tracing::debug;

use vault_crypto::derive_child_pubkey;
use vault_script::{InputScriptMode, MultisigTemplate};
use vault_store::{AccountRecord, BinRecord, KeyRecord, KeychainId, KeychainRecord, ScriptRecord};
use vault_store_lmdb::WriteBatch;
use vault_types::ScriptStatus;

use crate::error::VaultError;
use crate::keychains;
use crate::unlock::UnlockCache;

/// Derive and persist the signing script at the bin's next index.
///
/// Each constituent keychain contributes one child public key derived along
/// `[bin.index, script_index]`; the keys are combined into the account's
/// m-of-n template. Advances `next_script_index` on the in-memory bin; the
/// caller persists the bin.
pub(crate) fn create_signing_script(
    batch: &mut WriteBatch,
    account: &AccountRecord,
    bin: &mut BinRecord,
    keychains: &[KeychainRecord],
    chain_codes: &HashMap<KeychainId, [u8; 32]>,
    status: ScriptStatus,
    label: &str,
) -> Result<ScriptRecord, VaultError> {
    let script_index = bin.next_script_index;

    let mut derived = Vec::with_capacity(keychains.len());
    for keychain in keychains {
        let chain_code = chain_codes.get(&keychain.id).ok_or_else(|| {
            VaultError::Inconsistency(format!("no unlocked chain code for {}", keychain.name))
        })?;
        let (bin_pubkey, bin_chain_code) =
            derive_child_pubkey(&keychain.pubkey, chain_code, bin.index)?;
        let (script_pubkey, _) =
            derive_child_pubkey(&bin_pubkey, &bin_chain_code, script_index)?;
        derived.push((keychain.id, keychain.is_private(), script_pubkey));
    }

    let pubkeys = derived.iter().map(|(_, _, key)| key.clone()).collect();
    let template = MultisigTemplate::new(account.min_sigs as usize, pubkeys)?;

    let mut script = ScriptRecord {
        id: 0,
        bin: bin.id,
        index: script_index,
        label: label.to_string(),
        status,
        txin_template: template.input_script(InputScriptMode::Edit),
        txout_script: template.output_script(),
        keys: Vec::new(),
    };
    batch.insert_script(&mut script)?;

    for (keychain_id, is_private, pubkey) in derived {
        let mut key = KeyRecord {
            id: 0,
            script: script.id,
            root_keychain: keychain_id,
            derivation_path: vec![bin.index, script_index],
            pubkey,
            is_private,
        };
        batch.insert_key(&mut key)?;
        script.keys.push(key.id);
    }
    batch.update_script(&script)?;

    bin.next_script_index += 1;
    Ok(script)
}

/// Top the bin's unused pool back up to the account's pool size. Requires
/// every chain code of the account to be unlockable.
pub(crate) fn refill_bin_pool(
    batch: &mut WriteBatch,
    unlock: &mut UnlockCache,
    bin: &mut BinRecord,
) -> Result<(), VaultError> {
    let account = batch
        .account_by_id(bin.account)?
        .ok_or_else(|| VaultError::Inconsistency(format!("missing account id {}", bin.account)))?;
    let chain_codes = keychains::unlock_account_chain_codes(batch, unlock, &account)?;

    let mut account_keychains = Vec::with_capacity(account.keychains.len());
    for &keychain_id in &account.keychains {
        let keychain = batch.keychain_by_id(keychain_id)?.ok_or_else(|| {
            VaultError::Inconsistency(format!("missing keychain id {keychain_id}"))
        })?;
        account_keychains.push(keychain);
    }

    let unused = batch
        .scripts_for_bin(bin.id)?
        .iter()
        .filter(|script| script.status == ScriptStatus::Unused)
        .count() as u32;

    for _ in unused..account.unused_pool_size {
        create_signing_script(
            batch,
            &account,
            bin,
            &account_keychains,
            &chain_codes,
            ScriptStatus::Unused,
            "",
        )?;
    }
    batch.update_bin(bin)?;
    Ok(())
}

/// Issue the lowest-index unused script of a bin.
///
/// The public path refuses the change bin; transaction construction issues
/// change scripts through `allow_change`. The pool is refilled around the
/// issuance, best-effort: locked chain codes only mean the pool cannot
/// grow right now.
pub(crate) fn issue_bin_script(
    batch: &mut WriteBatch,
    unlock: &mut UnlockCache,
    bin: &mut BinRecord,
    label: &str,
    allow_change: bool,
) -> Result<ScriptRecord, VaultError> {
    let account = batch
        .account_by_id(bin.account)?
        .ok_or_else(|| VaultError::Inconsistency(format!("missing account id {}", bin.account)))?;

    if bin.is_change() && !allow_change {
        return Err(VaultError::AccountCannotIssueChangeScript(account.name));
    }

    try_refill_bin_pool(batch, unlock, bin, &account.name)?;

    let mut script = batch
        .scripts_for_bin(bin.id)?
        .into_iter()
        .find(|script| script.status == ScriptStatus::Unused)
        .ok_or_else(|| VaultError::AccountBinOutOfScripts {
            account: account.name.clone(),
            bin: bin.name.clone(),
        })?;

    script.label = label.to_string();
    script.status = ScriptStatus::Issued;
    batch.update_script(&script)?;

    // Issuance consumed one unused script; top the pool back up so it
    // holds the full count again.
    try_refill_bin_pool(batch, unlock, bin, &account.name)?;
    batch.update_bin(bin)?;
    Ok(script)
}

fn try_refill_bin_pool(
    batch: &mut WriteBatch,
    unlock: &mut UnlockCache,
    bin: &mut BinRecord,
    account_name: &str,
) -> Result<(), VaultError> {
    match refill_bin_pool(batch, unlock, bin) {
        Ok(()) => Ok(()),
        Err(VaultError::AccountChainCodeLocked { .. }) => {
            debug!(account = account_name, bin = %bin.name, "chain code locked, pool not replenished");
            Ok(())
        }
        Err(e) => Err(e),
    }
}
