//! Query layer: aggregate read-only views over the store.

use vault_script::{payee_element, InputScriptMode, MultisigTemplate};
use vault_store::{AccountId, AccountRecord, TxRecord};
use vault_store_lmdb::WriteBatch;
use vault_types::params::ALL_SELECTOR;
use vault_types::{Hash160, OutputStatus, ScriptStatus, Timestamp, TxHash, TxStatus};

use crate::bloom::BloomFilter;
use crate::chain;
use crate::error::VaultError;

/// Summary of an account.
#[derive(Clone, Debug)]
pub struct AccountInfo {
    pub id: AccountId,
    pub name: String,
    pub hash: Hash160,
    pub min_sigs: u32,
    pub keychain_names: Vec<String>,
    pub unused_pool_size: u32,
    pub time_created: u32,
    pub bin_names: Vec<String>,
}

/// One signing script with its owning account and bin.
#[derive(Clone, Debug)]
pub struct SigningScriptView {
    pub account_name: String,
    pub bin_name: String,
    pub index: u32,
    pub label: String,
    pub status: ScriptStatus,
    pub txin_template: Vec<u8>,
    pub txout_script: Vec<u8>,
}

/// One transaction output with account attribution and confirmation state.
#[derive(Clone, Debug)]
pub struct TxOutView {
    pub tx_hash: TxHash,
    pub tx_unsigned_hash: TxHash,
    pub out_index: u32,
    pub value: u64,
    pub output_status: OutputStatus,
    pub tx_status: TxStatus,
    pub height: Option<u32>,
    pub receiving_account: Option<String>,
    pub sending_account: Option<String>,
    pub bin_name: Option<String>,
}

/// A spendable output of an account, ready to become an input.
#[derive(Clone, Debug)]
pub(crate) struct UtxoView {
    pub tx_hash: TxHash,
    pub out_index: u32,
    pub value: u64,
    pub txin_template: Vec<u8>,
}

pub(crate) fn account_info(
    batch: &WriteBatch,
    account: &AccountRecord,
) -> Result<AccountInfo, VaultError> {
    let mut keychain_names = Vec::with_capacity(account.keychains.len());
    for &keychain_id in &account.keychains {
        let keychain = batch.keychain_by_id(keychain_id)?.ok_or_else(|| {
            VaultError::Inconsistency(format!("missing keychain id {keychain_id}"))
        })?;
        keychain_names.push(keychain.name);
    }
    let bin_names = batch
        .bins_for_account(account.id)?
        .into_iter()
        .map(|bin| bin.name)
        .collect();
    Ok(AccountInfo {
        id: account.id,
        name: account.name.clone(),
        hash: account.hash,
        min_sigs: account.min_sigs,
        keychain_names,
        unused_pool_size: account.unused_pool_size,
        time_created: account.time_created,
        bin_names,
    })
}

/// Signing scripts filtered by account, bin and status flags. The `@all`
/// selector matches every account or bin. Ordered by account, bin, status
/// (descending flag) and index, as wallet UIs expect.
pub(crate) fn signing_script_views(
    batch: &WriteBatch,
    account_selector: &str,
    bin_selector: &str,
    status_flags: u32,
) -> Result<Vec<SigningScriptView>, VaultError> {
    let mut views = Vec::new();
    for script in batch.iter_scripts()? {
        if status_flags & script.status.flag() == 0 {
            continue;
        }
        let bin = batch
            .bin_by_id(script.bin)?
            .ok_or_else(|| VaultError::Inconsistency(format!("missing bin id {}", script.bin)))?;
        if bin_selector != ALL_SELECTOR && bin.name != bin_selector {
            continue;
        }
        let account = batch
            .account_by_id(bin.account)?
            .ok_or_else(|| VaultError::Inconsistency(format!("missing account id {}", bin.account)))?;
        if account_selector != ALL_SELECTOR && account.name != account_selector {
            continue;
        }
        views.push(SigningScriptView {
            account_name: account.name,
            bin_name: bin.name,
            index: script.index,
            label: script.label,
            status: script.status,
            txin_template: script.txin_template,
            txout_script: script.txout_script,
        });
    }
    views.sort_by(|a, b| {
        a.account_name
            .cmp(&b.account_name)
            .then(a.bin_name.cmp(&b.bin_name))
            .then(b.status.flag().cmp(&a.status.flag()))
            .then(a.index.cmp(&b.index))
    });
    Ok(views)
}

/// Outputs involving the vault, filtered by account/bin selectors and
/// status flags, newest first.
pub(crate) fn txout_views(
    batch: &WriteBatch,
    account_selector: &str,
    bin_selector: &str,
    txout_status_flags: u32,
    tx_status_flags: u32,
) -> Result<Vec<TxOutView>, VaultError> {
    let mut entries: Vec<(u32, Timestamp, u64, TxOutView)> = Vec::new();
    for tx in batch.iter_txs()? {
        if tx_status_flags & tx.status.flag() == 0 {
            continue;
        }
        let height = match tx.header {
            Some(header_id) => batch.header_by_id(header_id)?.map(|h| h.height),
            None => None,
        };
        for (j, output) in tx.outputs.iter().enumerate() {
            if output.receiving_account.is_none() && output.sending_account.is_none() {
                continue;
            }
            if txout_status_flags & output.status.flag() == 0 {
                continue;
            }
            let receiving_account = match output.receiving_account {
                Some(id) => batch.account_by_id(id)?.map(|a| a.name),
                None => None,
            };
            let sending_account = match output.sending_account {
                Some(id) => batch.account_by_id(id)?.map(|a| a.name),
                None => None,
            };
            let bin_name = match output.signing_script {
                Some(script_id) => {
                    let script = batch.script_by_id(script_id)?.ok_or_else(|| {
                        VaultError::Inconsistency(format!("missing script id {script_id}"))
                    })?;
                    batch.bin_by_id(script.bin)?.map(|bin| bin.name)
                }
                None => None,
            };

            if account_selector != ALL_SELECTOR
                && receiving_account.as_deref() != Some(account_selector)
                && sending_account.as_deref() != Some(account_selector)
            {
                continue;
            }
            if bin_selector != ALL_SELECTOR && bin_name.as_deref() != Some(bin_selector) {
                continue;
            }

            entries.push((
                height.unwrap_or(0),
                tx.timestamp,
                tx.id,
                TxOutView {
                    tx_hash: tx.lookup_hash(),
                    tx_unsigned_hash: tx.unsigned_hash,
                    out_index: j as u32,
                    value: output.value,
                    output_status: output.status,
                    tx_status: tx.status,
                    height,
                    receiving_account,
                    sending_account,
                    bin_name,
                },
            ));
        }
    }
    entries.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)).then(b.2.cmp(&a.2)));
    Ok(entries.into_iter().map(|(_, _, _, view)| view).collect())
}

/// Sum of unspent output values for an account, filtered by transaction
/// status flags and a minimum confirmation depth.
pub(crate) fn account_balance(
    batch: &WriteBatch,
    account_name: &str,
    min_confirmations: u32,
    tx_status_flags: u32,
) -> Result<u64, VaultError> {
    let account = crate::accounts::get_account(batch, account_name)?;

    let mut max_height = None;
    if min_confirmations > 0 {
        let best_height = chain::best_height(batch)?;
        if min_confirmations > best_height {
            return Ok(0);
        }
        max_height = Some(best_height + 1 - min_confirmations);
    }

    let mut balance = 0u64;
    for tx in batch.iter_txs()? {
        if tx_status_flags & tx.status.flag() == 0 {
            continue;
        }
        if let Some(max_height) = max_height {
            let height = match tx.header {
                Some(header_id) => batch.header_by_id(header_id)?.map(|h| h.height),
                None => None,
            };
            match height {
                Some(height) if height <= max_height => {}
                _ => continue,
            }
        }
        for output in &tx.outputs {
            if output.receiving_account == Some(account.id)
                && output.status == OutputStatus::Unspent
            {
                balance += output.value;
            }
        }
    }
    Ok(balance)
}

/// The spendable outputs of an account.
pub(crate) fn utxos_for_account(
    batch: &WriteBatch,
    account: AccountId,
) -> Result<Vec<UtxoView>, VaultError> {
    let mut utxos = Vec::new();
    for tx in batch.iter_txs()? {
        for (j, output) in tx.outputs.iter().enumerate() {
            if output.receiving_account != Some(account)
                || output.status != OutputStatus::Unspent
                || output.spent_by.is_some()
            {
                continue;
            }
            let Some(script_id) = output.signing_script else {
                continue;
            };
            let script = batch.script_by_id(script_id)?.ok_or_else(|| {
                VaultError::Inconsistency(format!("missing script id {script_id}"))
            })?;
            utxos.push(UtxoView {
                tx_hash: tx.lookup_hash(),
                out_index: j as u32,
                value: output.value,
                txin_template: script.txin_template,
            });
        }
    }
    Ok(utxos)
}

/// Bloom filter material: every signing script contributes its input-script
/// signing element and its output-script payee element.
pub(crate) fn bloom_filter(
    batch: &WriteBatch,
    false_positive_rate: f64,
    tweak: u32,
    flags: u8,
) -> Result<BloomFilter, VaultError> {
    let mut elements = Vec::new();
    for script in batch.iter_scripts()? {
        if let Ok(template) = MultisigTemplate::parse_input_script(&script.txin_template) {
            elements.push(template.input_script(InputScriptMode::Sign));
        }
        if let Some(payee) = payee_element(&script.txout_script) {
            elements.push(payee);
        }
    }
    if elements.is_empty() {
        return Ok(BloomFilter::empty());
    }
    let mut filter = BloomFilter::new(elements.len(), false_positive_rate, tweak, flags);
    for element in &elements {
        filter.insert(element);
    }
    Ok(filter)
}

/// Resolve a transaction by signed or unsigned hash.
pub(crate) fn get_tx(batch: &WriteBatch, hash: &TxHash) -> Result<TxRecord, VaultError> {
    batch
        .tx_by_any_hash(hash)?
        .ok_or(VaultError::TxNotFound(*hash))
}
