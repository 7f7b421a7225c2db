//! Transaction engine: ingestion with duplicate resolution, signature
//! merging and double-spend detection; construction via UTXO selection;
//! signing with unlocked keys; cascading deletion.

use std::collections::{BTreeSet, HashMap};

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use tracing::debug;

use vault_crypto::{derive_child_privkey, pubkey_from_privkey, sign_hash};
use vault_script::{InputScriptMode, MultisigTemplate};
use vault_store::{AccountId, InPoint, TxId, TxInRecord, TxOutRecord, TxRecord};
use vault_store_lmdb::WriteBatch;
use vault_types::params::{BLOCK_TX_INDEX_UNKNOWN, CHANGE_BIN_NAME, SIGHASH_ALL};
use vault_types::{
    Hash160, OutputStatus, RawTransaction, RawTxIn, RawTxOut, ScriptStatus, Timestamp, TxHash,
    TxStatus,
};

use crate::error::VaultError;
use crate::unlock::UnlockCache;
use crate::{accounts, chain, keychains, scripts, views};

/// What an unsigned transaction still needs, and who can provide it.
#[derive(Clone, Debug)]
pub struct SigningRequest {
    pub sigs_needed: u32,
    /// Root keychains (name, content hash) holding any missing key.
    pub keychains: BTreeSet<(String, Hash160)>,
    pub raw_tx: Option<Vec<u8>>,
}

// ── Record / wire conversion ────────────────────────────────────────────

pub(crate) fn raw_from_record(tx: &TxRecord) -> RawTransaction {
    RawTransaction {
        version: tx.version,
        inputs: tx
            .inputs
            .iter()
            .map(|input| RawTxIn {
                prev_hash: input.outpoint_hash,
                prev_index: input.outpoint_index,
                script: input.script.clone(),
                sequence: input.sequence,
            })
            .collect(),
        outputs: tx
            .outputs
            .iter()
            .map(|output| RawTxOut {
                value: output.value,
                script: output.script.clone(),
            })
            .collect(),
        locktime: tx.locktime,
    }
}

/// Build a storable record from a wire transaction. Status and hashes are
/// recomputed from the input scripts.
pub(crate) fn record_from_raw(raw: &RawTransaction, timestamp: Timestamp) -> TxRecord {
    let inputs = raw
        .inputs
        .iter()
        .map(|input| TxInRecord {
            outpoint_hash: input.prev_hash,
            outpoint_index: input.prev_index,
            script: input.script.clone(),
            sequence: input.sequence,
        })
        .collect();
    let outputs = raw
        .outputs
        .iter()
        .map(|output| TxOutRecord {
            value: output.value,
            script: output.script.clone(),
            signing_script: None,
            spent_by: None,
            receiving_account: None,
            sending_account: None,
            status: OutputStatus::Unspent,
        })
        .collect();
    let mut tx = TxRecord {
        id: 0,
        version: raw.version,
        locktime: raw.locktime,
        timestamp,
        status: TxStatus::Unsigned,
        fee: None,
        header: None,
        block_tx_index: BLOCK_TX_INDEX_UNKNOWN,
        unsigned_hash: TxHash::ZERO,
        hash: None,
        inputs,
        outputs,
    };
    tx.unsigned_hash = unsigned_txid(&tx);
    recompute_status(&mut tx);
    tx
}

/// The signature-independent transaction id: each input script that parses
/// as one of the vault's multisig templates is normalized to its unsigned
/// form; foreign scripts hash as-is.
pub(crate) fn unsigned_txid(tx: &TxRecord) -> TxHash {
    let mut raw = raw_from_record(tx);
    for input in &mut raw.inputs {
        input.script = unsigned_input_script(&input.script);
    }
    raw.txid()
}

fn unsigned_input_script(script: &[u8]) -> Vec<u8> {
    match MultisigTemplate::parse_input_script(script) {
        Ok(template) => {
            // Rebuilding from the key set drops every signature.
            match MultisigTemplate::new(template.min_sigs(), template.pubkeys().to_vec()) {
                Ok(cleared) => cleared.input_script(InputScriptMode::Edit),
                Err(_) => script.to_vec(),
            }
        }
        Err(_) => script.to_vec(),
    }
}

fn input_sigs_needed(script: &[u8]) -> usize {
    MultisigTemplate::parse_input_script(script)
        .map(|template| template.sigs_needed())
        .unwrap_or(0)
}

/// Recompute status and signed hash from the input scripts: unsigned while
/// any vault input misses signatures, otherwise at least Unsent with the
/// final txid.
pub(crate) fn recompute_status(tx: &mut TxRecord) {
    let missing: usize = tx
        .inputs
        .iter()
        .map(|input| input_sigs_needed(&input.script))
        .sum();
    if missing > 0 {
        tx.status = TxStatus::Unsigned;
        tx.hash = None;
    } else {
        if tx.status == TxStatus::Unsigned {
            tx.status = TxStatus::Unsent;
        }
        tx.hash = Some(raw_from_record(tx).txid());
    }
}

// ── Insertion ───────────────────────────────────────────────────────────

/// Insert or merge a transaction. Returns the stored record when the vault
/// kept anything, `None` when the transaction is irrelevant or added
/// nothing new — in which case the caller must not commit.
pub(crate) fn insert_tx(
    batch: &mut WriteBatch,
    unlock: &mut UnlockCache,
    mut tx: TxRecord,
) -> Result<Option<TxRecord>, VaultError> {
    recompute_status(&mut tx);

    if let Some(stored) = batch.tx_by_unsigned_hash(&tx.unsigned_hash)? {
        debug!(unsigned_hash = %tx.unsigned_hash, "duplicate unsigned hash");
        return merge_duplicate(batch, stored, tx);
    }

    // Never seen before: work out whether it touches the vault.
    let mut conflicts: BTreeSet<TxId> = BTreeSet::new();
    let mut outpoint_txs: HashMap<TxId, TxRecord> = HashMap::new();
    let mut touched: BTreeSet<TxId> = BTreeSet::new();
    let mut pending_spends: Vec<(TxId, usize, u32)> = Vec::new();

    let mut sent_from_vault = false;
    let mut have_all_outpoints = true;
    let mut input_total: u64 = 0;
    let mut sending_account: Option<AccountId> = None;

    for (i, input) in tx.inputs.iter().enumerate() {
        let Some(found) = batch.tx_by_any_hash(&input.outpoint_hash)? else {
            have_all_outpoints = false;
            continue;
        };
        let spent_tx = outpoint_txs.entry(found.id).or_insert(found);
        let out_index = input.outpoint_index as usize;
        if out_index >= spent_tx.outputs.len() {
            return Err(VaultError::Inconsistency(format!(
                "outpoint {}:{} out of range",
                input.outpoint_hash, input.outpoint_index
            )));
        }
        let outpoint = &spent_tx.outputs[out_index];

        if let Some(existing) = outpoint.spent_by {
            debug!(conflicting_tx = existing.tx, "double spend discovered");
            conflicts.insert(existing.tx);
        }
        input_total += outpoint.value;
        pending_spends.push((spent_tx.id, out_index, i as u32));

        if let Some(script) = batch.script_by_output_script(&outpoint.script)? {
            sent_from_vault = true;
            if sending_account.is_none() {
                // All inputs are assumed to come from one account; the
                // first match decides.
                let bin = batch.bin_by_id(script.bin)?.ok_or_else(|| {
                    VaultError::Inconsistency(format!("missing bin id {}", script.bin))
                })?;
                sending_account = Some(bin.account);
            }
        }
    }

    let mut sent_to_vault = false;
    let mut output_total: u64 = 0;
    let lookup_hash = tx.lookup_hash();

    for j in 0..tx.outputs.len() {
        output_total += tx.outputs[j].value;

        let Some(mut script) = batch.script_by_output_script(&tx.outputs[j].script)? else {
            if let Some(account_id) = sending_account {
                tx.outputs[j].sending_account = Some(account_id);
            }
            continue;
        };

        sent_to_vault = true;
        let mut bin = batch
            .bin_by_id(script.bin)?
            .ok_or_else(|| VaultError::Inconsistency(format!("missing bin id {}", script.bin)))?;
        tx.outputs[j].signing_script = Some(script.id);
        tx.outputs[j].receiving_account = Some(bin.account);

        match script.status {
            ScriptStatus::Unused => {
                script.status = if sent_from_vault && bin.is_change() {
                    ScriptStatus::Change
                } else {
                    ScriptStatus::Used
                };
                batch.update_script(&script)?;
                match scripts::refill_bin_pool(batch, unlock, &mut bin) {
                    Ok(()) => {}
                    Err(VaultError::AccountChainCodeLocked { .. }) => {
                        debug!("chain code locked, pool not replenished");
                    }
                    Err(e) => return Err(e),
                }
            }
            ScriptStatus::Issued => {
                script.status = ScriptStatus::Used;
                batch.update_script(&script)?;
            }
            ScriptStatus::Change | ScriptStatus::Used => {}
        }

        // Out-of-order insertion: a stored input may already spend this
        // output.
        if let Some(spender) = batch.spender_of(&lookup_hash, j as u32)? {
            tx.outputs[j].spent_by = Some(spender);
            tx.outputs[j].status = OutputStatus::Spent;
        }
    }

    if !conflicts.is_empty() {
        tx.status = TxStatus::Conflicting;
        for &conflict_id in &conflicts {
            if let Some(cached) = outpoint_txs.get_mut(&conflict_id) {
                if cached.status != TxStatus::Confirmed {
                    cached.status = TxStatus::Conflicting;
                    touched.insert(conflict_id);
                }
                continue;
            }
            let Some(mut conflict_tx) = batch.tx_by_id(conflict_id)? else {
                continue;
            };
            if conflict_tx.status != TxStatus::Confirmed {
                conflict_tx.status = TxStatus::Conflicting;
                batch.update_tx(&conflict_tx)?;
            }
        }
    }

    if !(sent_from_vault || sent_to_vault) {
        debug!("transaction not inserted");
        return Ok(None);
    }

    debug!(hash = %lookup_hash, unsigned_hash = %tx.unsigned_hash, "inserting new transaction");
    if have_all_outpoints {
        tx.fee = input_total.checked_sub(output_total);
    }
    batch.insert_tx(&mut tx)?;

    for (spent_tx_id, out_index, input_index) in pending_spends {
        let spent_tx = outpoint_txs.get_mut(&spent_tx_id).ok_or_else(|| {
            VaultError::Inconsistency(format!("outpoint tx {spent_tx_id} not loaded"))
        })?;
        spent_tx.outputs[out_index].spent_by = Some(InPoint {
            tx: tx.id,
            input: input_index,
        });
        spent_tx.outputs[out_index].status = OutputStatus::Spent;
        touched.insert(spent_tx_id);
    }
    for id in touched {
        if let Some(record) = outpoint_txs.get(&id) {
            batch.update_tx(record)?;
        }
    }

    if tx.status.rank() >= TxStatus::Sent.rank() {
        chain::update_confirmations_for(batch, &mut tx)?;
    }
    Ok(Some(tx))
}

/// Duplicate resolution for a transaction whose unsigned hash is already
/// stored.
fn merge_duplicate(
    batch: &mut WriteBatch,
    mut stored: TxRecord,
    tx: TxRecord,
) -> Result<Option<TxRecord>, VaultError> {
    if stored.status == TxStatus::Unsigned {
        if tx.status != TxStatus::Unsigned {
            // The incoming transaction is a signed version of the stored
            // one: take its input scripts wholesale.
            debug!(hash = ?tx.hash, "replacing unsigned transaction with signed version");
            if stored.inputs.len() != tx.inputs.len() {
                return Err(VaultError::Inconsistency(
                    "same unsigned hash, different input count".into(),
                ));
            }
            for (stored_input, new_input) in stored.inputs.iter_mut().zip(&tx.inputs) {
                stored_input.script = new_input.script.clone();
            }
            stored.status = tx.status;
            stored.hash = tx.hash;
            batch.update_tx(&stored)?;
            return Ok(Some(stored));
        }

        // Both unsigned: take the union of signature sets, input by input.
        let mut updated = false;
        for (i, stored_input) in stored.inputs.iter_mut().enumerate() {
            let Ok(mut stored_template) = MultisigTemplate::parse_input_script(&stored_input.script)
            else {
                continue;
            };
            let Some(new_input) = tx.inputs.get(i) else {
                continue;
            };
            let Ok(new_template) = MultisigTemplate::parse_input_script(&new_input.script) else {
                continue;
            };
            let added = stored_template.merge_signatures(&new_template);
            if added > 0 {
                debug!(input = i, added, "merged new signatures");
                stored_input.script = stored_template.input_script(InputScriptMode::Edit);
                updated = true;
            }
        }
        if updated {
            batch.update_tx(&stored)?;
            return Ok(Some(stored));
        }
        return Ok(None);
    }

    // Stored copy is fully signed: at most a status upgrade.
    if tx.status != TxStatus::Unsigned && tx.status.rank() > stored.status.rank() {
        debug!(from = %stored.status, to = %tx.status, "upgrading transaction status");
        stored.status = tx.status;
        batch.update_tx(&stored)?;
        return Ok(Some(stored));
    }
    debug!("transaction not updated");
    Ok(None)
}

// ── Construction ────────────────────────────────────────────────────────

/// Build an unsigned spend from an account's UTXOs.
///
/// Inputs are drawn in pseudo-random order until the requested total plus
/// fee is covered; change goes to a freshly issued script from the change
/// bin, and output order is shuffled to hide the change position.
#[allow(clippy::too_many_arguments)]
pub(crate) fn create_tx(
    batch: &mut WriteBatch,
    unlock: &mut UnlockCache,
    account_name: &str,
    version: u32,
    locktime: u32,
    mut outputs: Vec<(Vec<u8>, u64)>,
    fee: u64,
    _max_change_outs: u32,
    seed: Option<u64>,
) -> Result<TxRecord, VaultError> {
    let mut desired_total = fee;
    for (_, value) in &outputs {
        desired_total = desired_total
            .checked_add(*value)
            .ok_or_else(|| VaultError::Inconsistency("output total overflow".into()))?;
    }

    let account = accounts::get_account(batch, account_name)?;
    let mut utxos = views::utxos_for_account(batch, account.id)?;

    let mut rng = match seed {
        Some(seed) => ChaCha20Rng::seed_from_u64(seed),
        None => ChaCha20Rng::from_entropy(),
    };
    utxos.shuffle(&mut rng);

    let mut total = 0u64;
    let mut selected = Vec::new();
    for utxo in utxos {
        total += utxo.value;
        selected.push(utxo);
        if total >= desired_total {
            break;
        }
    }
    if total < desired_total {
        return Err(VaultError::AccountInsufficientFunds(account_name.to_string()));
    }

    let change = total - desired_total;
    if change > 0 {
        let (_, mut change_bin) = accounts::get_account_bin(batch, account_name, CHANGE_BIN_NAME)?;
        let change_script = scripts::issue_bin_script(batch, unlock, &mut change_bin, "", true)?;
        outputs.push((change_script.txout_script, change));
    }
    outputs.shuffle(&mut rng);

    let inputs = selected
        .into_iter()
        .map(|utxo| TxInRecord {
            outpoint_hash: utxo.tx_hash,
            outpoint_index: utxo.out_index,
            script: utxo.txin_template,
            sequence: 0xffff_ffff,
        })
        .collect();
    let outputs = outputs
        .into_iter()
        .map(|(script, value)| TxOutRecord {
            value,
            script,
            signing_script: None,
            spent_by: None,
            receiving_account: None,
            sending_account: None,
            status: OutputStatus::Unspent,
        })
        .collect();

    let mut tx = TxRecord {
        id: 0,
        version,
        locktime,
        timestamp: Timestamp::now(),
        status: TxStatus::Unsigned,
        fee: None,
        header: None,
        block_tx_index: BLOCK_TX_INDEX_UNKNOWN,
        unsigned_hash: TxHash::ZERO,
        hash: None,
        inputs,
        outputs,
    };
    tx.unsigned_hash = unsigned_txid(&tx);
    recompute_status(&mut tx);
    Ok(tx)
}

// ── Signing ─────────────────────────────────────────────────────────────

/// Add every signature the unlocked keychains can contribute. Returns the
/// transaction and whether anything was added; with nothing added the
/// caller must not commit.
pub(crate) fn sign_tx(
    batch: &mut WriteBatch,
    unlock: &mut UnlockCache,
    unsigned_hash: &TxHash,
) -> Result<(bool, TxRecord), VaultError> {
    let mut tx = batch
        .tx_by_unsigned_hash(unsigned_hash)?
        .ok_or(VaultError::TxNotFound(*unsigned_hash))?;

    let mut sigs_added = 0u32;
    for i in 0..tx.inputs.len() {
        let Ok(mut template) = MultisigTemplate::parse_input_script(&tx.inputs[i].script) else {
            continue;
        };
        let mut sigs_needed = template.sigs_needed();
        if sigs_needed == 0 {
            continue;
        }

        // The digest covers the transaction with only this input carrying
        // its script (in signing form), all others empty.
        let mut preimage = raw_from_record(&tx);
        for (j, input) in preimage.inputs.iter_mut().enumerate() {
            input.script = if j == i {
                template.input_script(InputScriptMode::Sign)
            } else {
                Vec::new()
            };
        }
        let digest = preimage.hash_with_appended_code(SIGHASH_ALL as u32);
        debug!(input = i, digest = %digest, "computed signing hash");

        for pubkey in template.missing_sig_pubkeys() {
            let Some(key) = batch.key_by_pubkey(&pubkey)? else {
                continue;
            };
            if !key.is_private {
                continue;
            }
            let root = batch.keychain_by_id(key.root_keychain)?.ok_or_else(|| {
                VaultError::Inconsistency(format!("missing keychain id {}", key.root_keychain))
            })?;

            let Some(master_privkey) = keychains::try_unlock_private_key(unlock, &root) else {
                debug!(keychain = %root.name, "private key locked");
                continue;
            };
            let Some(mut chain_code) = keychains::try_unlock_chain_code(unlock, &root) else {
                debug!(keychain = %root.name, "chain code locked");
                continue;
            };

            let mut privkey = master_privkey;
            for &index in &key.derivation_path {
                let (child_privkey, child_chain_code) =
                    derive_child_privkey(&privkey, &chain_code, index)?;
                privkey = child_privkey;
                chain_code = child_chain_code;
            }
            if pubkey_from_privkey(&privkey)? != key.pubkey {
                return Err(VaultError::KeychainInvalidPrivateKey(root.name));
            }

            debug!(input = i, keychain = %root.name, "signing input");
            let mut signature = sign_hash(&privkey, digest.as_bytes())?;
            signature.push(SIGHASH_ALL);
            template.add_signature(&pubkey, signature)?;
            sigs_added += 1;
            sigs_needed -= 1;
            if sigs_needed == 0 {
                break;
            }
        }

        tx.inputs[i].script = template.input_script(if sigs_needed > 0 {
            InputScriptMode::Edit
        } else {
            InputScriptMode::Broadcast
        });
    }

    if sigs_added == 0 {
        return Ok((false, tx));
    }
    recompute_status(&mut tx);
    Ok((true, tx))
}

// ── Deletion ────────────────────────────────────────────────────────────

/// Delete a transaction by signed or unsigned hash, first unspending its
/// outpoints and recursively deleting any transaction spending its
/// outputs. Signing script statuses are not rolled back: once marked used,
/// they stay used.
pub(crate) fn delete_tx(batch: &mut WriteBatch, hash: &TxHash) -> Result<(), VaultError> {
    let tx = batch
        .tx_by_any_hash(hash)?
        .ok_or(VaultError::TxNotFound(*hash))?;
    delete_tx_record(batch, tx)
}

fn delete_tx_record(batch: &mut WriteBatch, tx: TxRecord) -> Result<(), VaultError> {
    for (i, input) in tx.inputs.iter().enumerate() {
        let Some(mut spent_tx) = batch.tx_by_any_hash(&input.outpoint_hash)? else {
            continue;
        };
        let out_index = input.outpoint_index as usize;
        let this_input = InPoint {
            tx: tx.id,
            input: i as u32,
        };
        if let Some(outpoint) = spent_tx.outputs.get_mut(out_index) {
            if outpoint.spent_by == Some(this_input) {
                outpoint.spent_by = None;
                outpoint.status = OutputStatus::Unspent;
                batch.update_tx(&spent_tx)?;
            }
        }
    }

    for output in &tx.outputs {
        let Some(spender) = output.spent_by else {
            continue;
        };
        if spender.tx == tx.id {
            continue;
        }
        if let Some(dependent) = batch.tx_by_id(spender.tx)? {
            delete_tx_record(batch, dependent)?;
        }
    }

    batch.erase_tx(tx.id)?;
    Ok(())
}

// ── Signing requests ────────────────────────────────────────────────────

pub(crate) fn signing_request(
    batch: &WriteBatch,
    unsigned_hash: &TxHash,
    include_raw_tx: bool,
) -> Result<SigningRequest, VaultError> {
    let tx = batch
        .tx_by_unsigned_hash(unsigned_hash)?
        .ok_or(VaultError::TxNotFound(*unsigned_hash))?;

    let mut sigs_needed = 0u32;
    let mut missing_pubkeys = Vec::new();
    for input in &tx.inputs {
        if let Ok(template) = MultisigTemplate::parse_input_script(&input.script) {
            sigs_needed += template.sigs_needed() as u32;
            missing_pubkeys.extend(template.missing_sig_pubkeys());
        }
    }

    let mut keychain_info = BTreeSet::new();
    for pubkey in missing_pubkeys {
        if let Some(key) = batch.key_by_pubkey(&pubkey)? {
            let root = batch.keychain_by_id(key.root_keychain)?.ok_or_else(|| {
                VaultError::Inconsistency(format!("missing keychain id {}", key.root_keychain))
            })?;
            keychain_info.insert((root.name, root.hash));
        }
    }

    let raw_tx = include_raw_tx.then(|| raw_from_record(&tx).to_bytes());
    Ok(SigningRequest {
        sigs_needed,
        keychains: keychain_info,
        raw_tx,
    })
}
