//! The vault façade.
//!
//! One process-wide mutex serializes every public operation; each operation
//! opens a single store write batch, delegates to the engine functions and
//! commits only on success, so any error leaves the store at its pre-call
//! state. The unlock cache lives behind the same mutex.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use tracing::trace;

use vault_store::{AccountRecord, BinRecord, KeychainRecord, ScriptRecord, TxRecord};
use vault_store_lmdb::VaultEnvironment;
use vault_types::{
    BlockHash, Hash160, MerkleBlockData, RawTransaction, SecretBytes, Timestamp, TxHash,
};

use crate::accounts::{self, ImportAccountReport, ImportAccountRequest};
use crate::bloom::BloomFilter;
use crate::chain;
use crate::error::VaultError;
use crate::keychains::{self, ImportKeychainReport, ImportKeychainRequest};
use crate::scripts;
use crate::txs::{self, SigningRequest};
use crate::unlock::UnlockCache;
use crate::views::{self, AccountInfo, SigningScriptView, TxOutView};

const DEFAULT_MAP_SIZE: usize = 256 * 1024 * 1024;

struct VaultInner {
    env: VaultEnvironment,
    unlock: UnlockCache,
    coin_selection_seed: Option<u64>,
}

/// The persistent transactional core of a multisignature wallet.
///
/// Thread-safe: callers may share a `Vault` across threads; operations are
/// linearized by an internal mutex held for the full operation including
/// the store transaction.
pub struct Vault {
    inner: Mutex<VaultInner>,
}

impl Vault {
    /// Open or create a vault store at the given directory.
    pub fn open(path: &Path) -> Result<Self, VaultError> {
        Self::open_with_map_size(path, DEFAULT_MAP_SIZE)
    }

    pub fn open_with_map_size(path: &Path, map_size: usize) -> Result<Self, VaultError> {
        trace!(path = %path.display(), "opening vault");
        let env = VaultEnvironment::open(path, map_size)
            .map_err(|e| VaultError::Store(e.into()))?;
        Ok(Self {
            inner: Mutex::new(VaultInner {
                env,
                unlock: UnlockCache::default(),
                coin_selection_seed: None,
            }),
        })
    }

    /// Fix the coin-selection shuffle seed. Tests inject a seed for
    /// deterministic replay; `None` restores entropy-seeded selection.
    pub fn set_coin_selection_seed(&self, seed: Option<u64>) {
        self.lock().coin_selection_seed = seed;
    }

    fn lock(&self) -> MutexGuard<'_, VaultInner> {
        self.inner.lock().expect("vault mutex poisoned")
    }

    // ── Global queries ──────────────────────────────────────────────────

    /// The earliest account creation time; `0xffff_ffff` with no accounts.
    pub fn horizon_timestamp(&self) -> Result<u32, VaultError> {
        trace!("horizon_timestamp");
        let inner = self.lock();
        let batch = inner.env.write_batch()?;
        chain::horizon_timestamp(&batch)
    }

    pub fn best_height(&self) -> Result<u32, VaultError> {
        trace!("best_height");
        let inner = self.lock();
        let batch = inner.env.write_batch()?;
        chain::best_height(&batch)
    }

    /// Sparse block-hash locator for peer synchronization.
    pub fn locator_hashes(&self) -> Result<Vec<BlockHash>, VaultError> {
        trace!("locator_hashes");
        let inner = self.lock();
        let batch = inner.env.write_batch()?;
        chain::locator_hashes(&batch)
    }

    /// Bloom filter covering every signing script's input and output
    /// elements.
    pub fn bloom_filter(
        &self,
        false_positive_rate: f64,
        tweak: u32,
        flags: u8,
    ) -> Result<BloomFilter, VaultError> {
        trace!(false_positive_rate, tweak, flags, "bloom_filter");
        let inner = self.lock();
        let batch = inner.env.write_batch()?;
        views::bloom_filter(&batch, false_positive_rate, tweak, flags)
    }

    // ── Keychain operations ─────────────────────────────────────────────

    /// Create a fresh root keychain from entropy, its secrets encrypted
    /// under `lock_key` + `salt`.
    pub fn new_keychain(
        &self,
        name: &str,
        entropy: &SecretBytes,
        lock_key: &SecretBytes,
        salt: &[u8],
    ) -> Result<KeychainRecord, VaultError> {
        trace!(name, "new_keychain");
        let inner = self.lock();
        let mut batch = inner.env.write_batch()?;
        let keychain = keychains::new_keychain(&mut batch, name, entropy, lock_key, salt)?;
        batch.commit()?;
        Ok(keychain)
    }

    pub fn keychain_exists(&self, name: &str) -> Result<bool, VaultError> {
        trace!(name, "keychain_exists");
        let inner = self.lock();
        let batch = inner.env.write_batch()?;
        Ok(batch.keychain_by_name(name)?.is_some())
    }

    pub fn keychain_hash_exists(&self, hash: &Hash160) -> Result<bool, VaultError> {
        trace!(%hash, "keychain_hash_exists");
        let inner = self.lock();
        let batch = inner.env.write_batch()?;
        Ok(batch.keychain_by_hash(hash)?.is_some())
    }

    pub fn get_keychain(&self, name: &str) -> Result<KeychainRecord, VaultError> {
        trace!(name, "get_keychain");
        let inner = self.lock();
        let batch = inner.env.write_batch()?;
        keychains::get_keychain(&batch, name)
    }

    pub fn all_keychains(&self, root_only: bool) -> Result<Vec<KeychainRecord>, VaultError> {
        trace!(root_only, "all_keychains");
        let inner = self.lock();
        let batch = inner.env.write_batch()?;
        let mut records = batch.iter_keychains()?;
        if root_only {
            records.retain(|keychain| keychain.parent.is_none());
        }
        Ok(records)
    }

    pub fn rename_keychain(&self, old_name: &str, new_name: &str) -> Result<(), VaultError> {
        trace!(old_name, new_name, "rename_keychain");
        let inner = self.lock();
        let mut batch = inner.env.write_batch()?;
        keychains::rename_keychain(&mut batch, old_name, new_name)?;
        batch.commit()?;
        Ok(())
    }

    /// Serialize a keychain to a portable file; `with_privkeys` requires a
    /// private keychain.
    pub fn export_keychain(
        &self,
        name: &str,
        path: &Path,
        with_privkeys: bool,
    ) -> Result<(), VaultError> {
        trace!(name, path = %path.display(), with_privkeys, "export_keychain");
        let inner = self.lock();
        let batch = inner.env.write_batch()?;
        keychains::export_keychain(&batch, name, path, with_privkeys)
    }

    /// Deserialize a keychain file, folding private material into a stored
    /// keychain with the same content hash when possible.
    pub fn import_keychain(
        &self,
        path: &Path,
        request: ImportKeychainRequest,
    ) -> Result<(KeychainRecord, ImportKeychainReport), VaultError> {
        trace!(path = %path.display(), "import_keychain");
        let inner = self.lock();
        let mut batch = inner.env.write_batch()?;
        let result = keychains::import_keychain(&mut batch, path, request)?;
        batch.commit()?;
        Ok(result)
    }

    /// Attempt to unlock a keychain's chain code; the secret is cached on
    /// success.
    pub fn unlock_keychain_chain_code(
        &self,
        name: &str,
        secret: &SecretBytes,
    ) -> Result<bool, VaultError> {
        trace!(name, "unlock_keychain_chain_code");
        let mut inner = self.lock();
        let inner = &mut *inner;
        let batch = inner.env.write_batch()?;
        let keychain = keychains::get_keychain(&batch, name)?;
        match keychains::decrypt_chain_code(&keychain, secret) {
            Ok(_) => {
                inner.unlock.cache_chain_code(name, secret.clone());
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    }

    /// Attempt to unlock a keychain's master private key; the secret is
    /// cached on success.
    pub fn unlock_keychain_private_key(
        &self,
        name: &str,
        secret: &SecretBytes,
    ) -> Result<bool, VaultError> {
        trace!(name, "unlock_keychain_private_key");
        let mut inner = self.lock();
        let inner = &mut *inner;
        let batch = inner.env.write_batch()?;
        let keychain = keychains::get_keychain(&batch, name)?;
        match keychains::decrypt_private_key(&keychain, secret) {
            Ok(_) => {
                inner.unlock.cache_private_key(name, secret.clone());
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    }

    pub fn lock_keychain_chain_code(&self, name: &str) {
        trace!(name, "lock_keychain_chain_code");
        self.lock().unlock.forget_chain_code(name);
    }

    pub fn lock_keychain_private_key(&self, name: &str) {
        trace!(name, "lock_keychain_private_key");
        self.lock().unlock.forget_private_key(name);
    }

    pub fn lock_all_chain_codes(&self) {
        trace!("lock_all_chain_codes");
        self.lock().unlock.clear_chain_codes();
    }

    pub fn lock_all_private_keys(&self) {
        trace!("lock_all_private_keys");
        self.lock().unlock.clear_private_keys();
    }

    // ── Account operations ──────────────────────────────────────────────

    /// Create a multisignature account over existing keychains, with its
    /// change and default bins filled.
    pub fn new_account(
        &self,
        name: &str,
        min_sigs: u32,
        keychain_names: &[String],
        unused_pool_size: u32,
        time_created: u32,
    ) -> Result<AccountRecord, VaultError> {
        trace!(name, min_sigs, unused_pool_size, time_created, "new_account");
        let mut inner = self.lock();
        let VaultInner { env, unlock, .. } = &mut *inner;
        let mut batch = env.write_batch()?;
        let account = accounts::new_account(
            &mut batch,
            unlock,
            name,
            min_sigs,
            keychain_names,
            unused_pool_size,
            time_created,
        )?;
        batch.commit()?;
        Ok(account)
    }

    pub fn account_exists(&self, name: &str) -> Result<bool, VaultError> {
        trace!(name, "account_exists");
        let inner = self.lock();
        let batch = inner.env.write_batch()?;
        Ok(batch.account_by_name(name)?.is_some())
    }

    pub fn get_account(&self, name: &str) -> Result<AccountRecord, VaultError> {
        trace!(name, "get_account");
        let inner = self.lock();
        let batch = inner.env.write_batch()?;
        accounts::get_account(&batch, name)
    }

    pub fn rename_account(&self, old_name: &str, new_name: &str) -> Result<(), VaultError> {
        trace!(old_name, new_name, "rename_account");
        let inner = self.lock();
        let mut batch = inner.env.write_batch()?;
        accounts::rename_account(&mut batch, old_name, new_name)?;
        batch.commit()?;
        Ok(())
    }

    pub fn account_info(&self, name: &str) -> Result<AccountInfo, VaultError> {
        trace!(name, "account_info");
        let inner = self.lock();
        let batch = inner.env.write_batch()?;
        let account = accounts::get_account(&batch, name)?;
        views::account_info(&batch, &account)
    }

    pub fn all_account_info(&self) -> Result<Vec<AccountInfo>, VaultError> {
        trace!("all_account_info");
        let inner = self.lock();
        let batch = inner.env.write_batch()?;
        let mut infos = Vec::new();
        for account in batch.iter_accounts()? {
            infos.push(views::account_info(&batch, &account)?);
        }
        Ok(infos)
    }

    /// Sum of unspent outputs for an account, filtered by transaction
    /// status flags and minimum confirmations.
    pub fn account_balance(
        &self,
        name: &str,
        min_confirmations: u32,
        tx_status_flags: u32,
    ) -> Result<u64, VaultError> {
        trace!(name, min_confirmations, "account_balance");
        let inner = self.lock();
        let batch = inner.env.write_batch()?;
        views::account_balance(&batch, name, min_confirmations, tx_status_flags)
    }

    /// Add a named receive bin to an account.
    pub fn add_account_bin(
        &self,
        account_name: &str,
        bin_name: &str,
    ) -> Result<BinRecord, VaultError> {
        trace!(account_name, bin_name, "add_account_bin");
        let mut inner = self.lock();
        let VaultInner { env, unlock, .. } = &mut *inner;
        let mut batch = env.write_batch()?;
        let bin = accounts::add_account_bin(&mut batch, unlock, account_name, bin_name)?;
        batch.commit()?;
        Ok(bin)
    }

    pub fn get_account_bin(
        &self,
        account_name: &str,
        bin_name: &str,
    ) -> Result<BinRecord, VaultError> {
        trace!(account_name, bin_name, "get_account_bin");
        let inner = self.lock();
        let batch = inner.env.write_batch()?;
        let (_, bin) = accounts::get_account_bin(&batch, account_name, bin_name)?;
        Ok(bin)
    }

    /// Refill the unused script pool of every bin of an account.
    pub fn refill_account_pool(&self, account_name: &str) -> Result<(), VaultError> {
        trace!(account_name, "refill_account_pool");
        let mut inner = self.lock();
        let VaultInner { env, unlock, .. } = &mut *inner;
        let mut batch = env.write_batch()?;
        accounts::refill_account_pool(&mut batch, unlock, account_name)?;
        batch.commit()?;
        Ok(())
    }

    /// Export an account with its keychains and bins, chain codes
    /// re-encrypted under `chain_code_lock_key` + `salt`.
    pub fn export_account(
        &self,
        account_name: &str,
        path: &Path,
        chain_code_lock_key: &SecretBytes,
        salt: &[u8],
        with_privkeys: bool,
    ) -> Result<(), VaultError> {
        trace!(account_name, path = %path.display(), with_privkeys, "export_account");
        let mut inner = self.lock();
        let VaultInner { env, unlock, .. } = &mut *inner;
        let batch = env.write_batch()?;
        accounts::export_account(
            &batch,
            unlock,
            account_name,
            path,
            chain_code_lock_key,
            salt,
            with_privkeys,
        )
    }

    /// Import an account file; every keychain in it must unlock with
    /// `chain_code_key`.
    pub fn import_account(
        &self,
        path: &Path,
        chain_code_key: &SecretBytes,
        request: ImportAccountRequest,
    ) -> Result<(AccountRecord, ImportAccountReport), VaultError> {
        trace!(path = %path.display(), "import_account");
        let mut inner = self.lock();
        let VaultInner { env, unlock, .. } = &mut *inner;
        let mut batch = env.write_batch()?;
        let result = accounts::import_account(&mut batch, unlock, path, chain_code_key, request)?;
        batch.commit()?;
        Ok(result)
    }

    // ── Signing scripts ─────────────────────────────────────────────────

    /// Issue the next unused script from a receive bin.
    pub fn issue_script(
        &self,
        account_name: &str,
        bin_name: &str,
        label: &str,
    ) -> Result<ScriptRecord, VaultError> {
        trace!(account_name, bin_name, label, "issue_script");
        let mut inner = self.lock();
        let VaultInner { env, unlock, .. } = &mut *inner;
        let mut batch = env.write_batch()?;
        let (_, mut bin) = accounts::get_account_bin(&batch, account_name, bin_name)?;
        let script = scripts::issue_bin_script(&mut batch, unlock, &mut bin, label, false)?;
        batch.commit()?;
        Ok(script)
    }

    /// Signing scripts filtered by `@all`-capable selectors and status
    /// flags.
    pub fn signing_script_views(
        &self,
        account_selector: &str,
        bin_selector: &str,
        status_flags: u32,
    ) -> Result<Vec<SigningScriptView>, VaultError> {
        trace!(account_selector, bin_selector, status_flags, "signing_script_views");
        let inner = self.lock();
        let batch = inner.env.write_batch()?;
        views::signing_script_views(&batch, account_selector, bin_selector, status_flags)
    }

    /// Outputs involving the vault, filtered and newest-first.
    pub fn txout_views(
        &self,
        account_selector: &str,
        bin_selector: &str,
        txout_status_flags: u32,
        tx_status_flags: u32,
    ) -> Result<Vec<TxOutView>, VaultError> {
        trace!(account_selector, bin_selector, "txout_views");
        let inner = self.lock();
        let batch = inner.env.write_batch()?;
        views::txout_views(
            &batch,
            account_selector,
            bin_selector,
            txout_status_flags,
            tx_status_flags,
        )
    }

    // ── Transaction operations ──────────────────────────────────────────

    /// Resolve a transaction by signed or unsigned hash.
    pub fn get_tx(&self, hash: &TxHash) -> Result<TxRecord, VaultError> {
        trace!(%hash, "get_tx");
        let inner = self.lock();
        let batch = inner.env.write_batch()?;
        views::get_tx(&batch, hash)
    }

    /// Ingest a raw transaction. Returns the stored record when the vault
    /// kept anything; `None` leaves the store untouched.
    pub fn insert_tx(&self, raw: &RawTransaction) -> Result<Option<TxRecord>, VaultError> {
        trace!(txid = %raw.txid(), "insert_tx");
        let mut inner = self.lock();
        let VaultInner { env, unlock, .. } = &mut *inner;
        let mut batch = env.write_batch()?;
        let record = txs::record_from_raw(raw, Timestamp::now());
        let inserted = txs::insert_tx(&mut batch, unlock, record)?;
        if inserted.is_some() {
            batch.commit()?;
        }
        Ok(inserted)
    }

    /// Build a spend from an account's UTXOs. With `insert` the result
    /// runs through transaction ingestion and is committed; without it the
    /// unsigned transaction is returned and nothing persists (including the
    /// change script issued for it).
    #[allow(clippy::too_many_arguments)]
    pub fn create_tx(
        &self,
        account_name: &str,
        version: u32,
        locktime: u32,
        outputs: Vec<(Vec<u8>, u64)>,
        fee: u64,
        max_change_outs: u32,
        insert: bool,
    ) -> Result<Option<TxRecord>, VaultError> {
        trace!(account_name, fee, insert, "create_tx");
        let mut inner = self.lock();
        let VaultInner {
            env,
            unlock,
            coin_selection_seed,
        } = &mut *inner;
        let mut batch = env.write_batch()?;
        let tx = txs::create_tx(
            &mut batch,
            unlock,
            account_name,
            version,
            locktime,
            outputs,
            fee,
            max_change_outs,
            *coin_selection_seed,
        )?;
        if !insert {
            return Ok(Some(tx));
        }
        let inserted = txs::insert_tx(&mut batch, unlock, tx)?;
        if inserted.is_some() {
            batch.commit()?;
        }
        Ok(inserted)
    }

    /// Add every signature the unlocked keychains can provide. Returns
    /// whether any signature was added; with `update` the signed
    /// transaction is persisted.
    pub fn sign_tx(&self, unsigned_hash: &TxHash, update: bool) -> Result<bool, VaultError> {
        trace!(%unsigned_hash, update, "sign_tx");
        let mut inner = self.lock();
        let VaultInner { env, unlock, .. } = &mut *inner;
        let mut batch = env.write_batch()?;
        let (sigs_added, tx) = txs::sign_tx(&mut batch, unlock, unsigned_hash)?;
        if sigs_added && update {
            batch.update_tx(&tx)?;
            batch.commit()?;
        }
        Ok(sigs_added)
    }

    /// Delete a transaction and, recursively, everything spending its
    /// outputs.
    pub fn delete_tx(&self, hash: &TxHash) -> Result<(), VaultError> {
        trace!(%hash, "delete_tx");
        let inner = self.lock();
        let mut batch = inner.env.write_batch()?;
        txs::delete_tx(&mut batch, hash)?;
        batch.commit()?;
        Ok(())
    }

    /// What an unsigned transaction still needs and which root keychains
    /// can provide it.
    pub fn signing_request(
        &self,
        unsigned_hash: &TxHash,
        include_raw_tx: bool,
    ) -> Result<SigningRequest, VaultError> {
        trace!(%unsigned_hash, "signing_request");
        let inner = self.lock();
        let batch = inner.env.write_batch()?;
        txs::signing_request(&batch, unsigned_hash, include_raw_tx)
    }

    // ── Blockchain operations ───────────────────────────────────────────

    /// Ingest a merkle block, handling reorganization and confirmation
    /// linking. Returns whether the block was attached.
    pub fn insert_merkle_block(&self, merkle_block: &MerkleBlockData) -> Result<bool, VaultError> {
        trace!(hash = %merkle_block.header.hash(), height = merkle_block.header.height, "insert_merkle_block");
        let inner = self.lock();
        let mut batch = inner.env.write_batch()?;
        let inserted = chain::insert_merkle_block(&mut batch, merkle_block)?;
        if inserted {
            batch.commit()?;
        }
        Ok(inserted)
    }
}
