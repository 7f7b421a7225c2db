//! Write batching — every vault operation runs inside exactly one
//! [`WriteBatch`], a single LMDB write transaction over all entity
//! databases and their indexes.
//!
//! If the batch is dropped without calling [`WriteBatch::commit`], all
//! operations are rolled back (the underlying LMDB transaction is aborted).
//! Read-only operations simply never commit.

use std::ops::Bound;

use heed::RwTxn;
use serde::de::DeserializeOwned;
use serde::Serialize;

use vault_store::{
    AccountId, AccountRecord, BinId, BinRecord, HeaderId, HeaderRecord, InPoint, KeyRecord,
    KeychainId, KeychainRecord, MerkleBlockRecord, ScriptId, ScriptRecord, StoreError, TxId,
    TxRecord,
};
use vault_types::{BlockHash, Hash160, TxHash};

use crate::environment::VaultEnvironment;
use crate::LmdbError;

/// A write batch holding the one LMDB write transaction of a vault
/// operation.
pub struct WriteBatch<'a> {
    txn: RwTxn<'a>,
    env: &'a VaultEnvironment,
}

fn id_key(id: u64) -> [u8; 8] {
    id.to_be_bytes()
}

fn composite_key(owner: u64, index: u32) -> [u8; 12] {
    let mut key = [0u8; 12];
    key[..8].copy_from_slice(&owner.to_be_bytes());
    key[8..].copy_from_slice(&index.to_be_bytes());
    key
}

fn owner_name_key(owner: u64, name: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(8 + name.len());
    key.extend_from_slice(&owner.to_be_bytes());
    key.extend_from_slice(name.as_bytes());
    key
}

fn outpoint_key(hash: &TxHash, index: u32) -> [u8; 36] {
    let mut key = [0u8; 36];
    key[..32].copy_from_slice(hash.as_bytes());
    key[32..].copy_from_slice(&index.to_be_bytes());
    key
}

fn inpoint_value(inpoint: InPoint) -> [u8; 12] {
    composite_key(inpoint.tx, inpoint.input)
}

fn parse_inpoint(bytes: &[u8]) -> Option<InPoint> {
    if bytes.len() != 12 {
        return None;
    }
    Some(InPoint {
        tx: u64::from_be_bytes(bytes[..8].try_into().unwrap()),
        input: u32::from_be_bytes(bytes[8..].try_into().unwrap()),
    })
}

fn parse_id(bytes: &[u8]) -> Option<u64> {
    bytes.try_into().ok().map(u64::from_be_bytes)
}

/// Smallest byte string strictly greater than every string with `prefix`.
/// Clears the prefix when none exists (all 0xff), meaning "unbounded".
fn increment_prefix(prefix: &mut Vec<u8>) {
    for i in (0..prefix.len()).rev() {
        if prefix[i] != 0xff {
            prefix[i] += 1;
            prefix.truncate(i + 1);
            return;
        }
    }
    prefix.clear();
}

impl<'a> WriteBatch<'a> {
    pub(crate) fn new(env: &'a VaultEnvironment) -> Result<Self, StoreError> {
        let txn = env.env().write_txn().map_err(LmdbError::from)?;
        Ok(Self { txn, env })
    }

    /// Commit all batched operations in a single write transaction.
    pub fn commit(self) -> Result<(), StoreError> {
        self.txn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    // ── Generic helpers ─────────────────────────────────────────────────

    fn get_record<T: DeserializeOwned>(
        &self,
        db: heed::Database<heed::types::Bytes, heed::types::Bytes>,
        key: &[u8],
    ) -> Result<Option<T>, StoreError> {
        match db.get(&self.txn, key).map_err(LmdbError::from)? {
            Some(bytes) => Ok(Some(
                bincode::deserialize(bytes).map_err(LmdbError::from)?,
            )),
            None => Ok(None),
        }
    }

    fn put_record<T: Serialize>(
        &mut self,
        db: heed::Database<heed::types::Bytes, heed::types::Bytes>,
        key: &[u8],
        record: &T,
    ) -> Result<(), StoreError> {
        let bytes = bincode::serialize(record).map_err(LmdbError::from)?;
        db.put(&mut self.txn, key, &bytes).map_err(LmdbError::from)?;
        Ok(())
    }

    fn get_id(
        &self,
        db: heed::Database<heed::types::Bytes, heed::types::Bytes>,
        key: &[u8],
    ) -> Result<Option<u64>, StoreError> {
        Ok(db
            .get(&self.txn, key)
            .map_err(LmdbError::from)?
            .and_then(parse_id))
    }

    /// Ids of records under a composite-key prefix, in key order.
    fn ids_with_prefix(
        &self,
        db: heed::Database<heed::types::Bytes, heed::types::Bytes>,
        prefix: &[u8],
    ) -> Result<Vec<u64>, StoreError> {
        let mut upper = prefix.to_vec();
        increment_prefix(&mut upper);
        let upper_bound = if upper.is_empty() {
            Bound::Unbounded
        } else {
            Bound::Excluded(upper.as_slice())
        };
        let bounds = (Bound::Included(prefix), upper_bound);
        let iter = db.range(&self.txn, &bounds).map_err(LmdbError::from)?;
        let mut ids = Vec::new();
        for result in iter {
            let (_, value) = result.map_err(LmdbError::from)?;
            if let Some(id) = parse_id(value) {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    fn collect_all<T: DeserializeOwned>(
        &self,
        db: heed::Database<heed::types::Bytes, heed::types::Bytes>,
    ) -> Result<Vec<T>, StoreError> {
        let iter = db.iter(&self.txn).map_err(LmdbError::from)?;
        let mut records = Vec::new();
        for result in iter {
            let (_, value) = result.map_err(LmdbError::from)?;
            records.push(bincode::deserialize(value).map_err(LmdbError::from)?);
        }
        Ok(records)
    }

    /// Allocate the next id from a named sequence. Zero is never issued.
    fn next_id(&mut self, sequence: &str) -> Result<u64, StoreError> {
        let key = format!("seq:{sequence}");
        let current = self
            .env
            .meta_db
            .get(&self.txn, key.as_bytes())
            .map_err(LmdbError::from)?
            .and_then(parse_id)
            .unwrap_or(0);
        let next = current + 1;
        self.env
            .meta_db
            .put(&mut self.txn, key.as_bytes(), &next.to_be_bytes())
            .map_err(LmdbError::from)?;
        Ok(next)
    }

    // ── Keychains ───────────────────────────────────────────────────────

    /// Persist a new keychain, allocating its id.
    pub fn insert_keychain(&mut self, keychain: &mut KeychainRecord) -> Result<(), StoreError> {
        keychain.id = self.next_id("keychain")?;
        self.put_record(self.env.keychains_db, &id_key(keychain.id), keychain)?;
        self.env
            .keychain_name_db
            .put(&mut self.txn, keychain.name.as_bytes(), &id_key(keychain.id))
            .map_err(LmdbError::from)?;
        self.env
            .keychain_hash_db
            .put(&mut self.txn, keychain.hash.as_bytes(), &id_key(keychain.id))
            .map_err(LmdbError::from)?;
        Ok(())
    }

    /// Rewrite a stored keychain, maintaining the name index on rename.
    pub fn update_keychain(&mut self, keychain: &KeychainRecord) -> Result<(), StoreError> {
        let old: KeychainRecord = self
            .get_record(self.env.keychains_db, &id_key(keychain.id))?
            .ok_or_else(|| StoreError::NotFound(format!("keychain id {}", keychain.id)))?;
        if old.name != keychain.name {
            self.env
                .keychain_name_db
                .delete(&mut self.txn, old.name.as_bytes())
                .map_err(LmdbError::from)?;
            self.env
                .keychain_name_db
                .put(&mut self.txn, keychain.name.as_bytes(), &id_key(keychain.id))
                .map_err(LmdbError::from)?;
        }
        self.put_record(self.env.keychains_db, &id_key(keychain.id), keychain)
    }

    pub fn keychain_by_id(&self, id: KeychainId) -> Result<Option<KeychainRecord>, StoreError> {
        self.get_record(self.env.keychains_db, &id_key(id))
    }

    pub fn keychain_by_name(&self, name: &str) -> Result<Option<KeychainRecord>, StoreError> {
        match self.get_id(self.env.keychain_name_db, name.as_bytes())? {
            Some(id) => self.keychain_by_id(id),
            None => Ok(None),
        }
    }

    pub fn keychain_by_hash(&self, hash: &Hash160) -> Result<Option<KeychainRecord>, StoreError> {
        match self.get_id(self.env.keychain_hash_db, hash.as_bytes())? {
            Some(id) => self.keychain_by_id(id),
            None => Ok(None),
        }
    }

    pub fn iter_keychains(&self) -> Result<Vec<KeychainRecord>, StoreError> {
        self.collect_all(self.env.keychains_db)
    }

    // ── Accounts ────────────────────────────────────────────────────────

    pub fn insert_account(&mut self, account: &mut AccountRecord) -> Result<(), StoreError> {
        account.id = self.next_id("account")?;
        self.put_record(self.env.accounts_db, &id_key(account.id), account)?;
        self.env
            .account_name_db
            .put(&mut self.txn, account.name.as_bytes(), &id_key(account.id))
            .map_err(LmdbError::from)?;
        self.env
            .account_hash_db
            .put(&mut self.txn, account.hash.as_bytes(), &id_key(account.id))
            .map_err(LmdbError::from)?;
        Ok(())
    }

    pub fn update_account(&mut self, account: &AccountRecord) -> Result<(), StoreError> {
        let old: AccountRecord = self
            .get_record(self.env.accounts_db, &id_key(account.id))?
            .ok_or_else(|| StoreError::NotFound(format!("account id {}", account.id)))?;
        if old.name != account.name {
            self.env
                .account_name_db
                .delete(&mut self.txn, old.name.as_bytes())
                .map_err(LmdbError::from)?;
            self.env
                .account_name_db
                .put(&mut self.txn, account.name.as_bytes(), &id_key(account.id))
                .map_err(LmdbError::from)?;
        }
        self.put_record(self.env.accounts_db, &id_key(account.id), account)
    }

    pub fn account_by_id(&self, id: AccountId) -> Result<Option<AccountRecord>, StoreError> {
        self.get_record(self.env.accounts_db, &id_key(id))
    }

    pub fn account_by_name(&self, name: &str) -> Result<Option<AccountRecord>, StoreError> {
        match self.get_id(self.env.account_name_db, name.as_bytes())? {
            Some(id) => self.account_by_id(id),
            None => Ok(None),
        }
    }

    pub fn account_by_hash(&self, hash: &Hash160) -> Result<Option<AccountRecord>, StoreError> {
        match self.get_id(self.env.account_hash_db, hash.as_bytes())? {
            Some(id) => self.account_by_id(id),
            None => Ok(None),
        }
    }

    pub fn iter_accounts(&self) -> Result<Vec<AccountRecord>, StoreError> {
        self.collect_all(self.env.accounts_db)
    }

    // ── Account bins ────────────────────────────────────────────────────

    pub fn insert_bin(&mut self, bin: &mut BinRecord) -> Result<(), StoreError> {
        bin.id = self.next_id("bin")?;
        self.put_record(self.env.bins_db, &id_key(bin.id), bin)?;
        self.env
            .bin_order_db
            .put(
                &mut self.txn,
                &composite_key(bin.account, bin.index),
                &id_key(bin.id),
            )
            .map_err(LmdbError::from)?;
        self.env
            .bin_name_db
            .put(
                &mut self.txn,
                &owner_name_key(bin.account, &bin.name),
                &id_key(bin.id),
            )
            .map_err(LmdbError::from)?;
        Ok(())
    }

    pub fn update_bin(&mut self, bin: &BinRecord) -> Result<(), StoreError> {
        self.put_record(self.env.bins_db, &id_key(bin.id), bin)
    }

    pub fn bin_by_id(&self, id: BinId) -> Result<Option<BinRecord>, StoreError> {
        self.get_record(self.env.bins_db, &id_key(id))
    }

    pub fn bin_by_name(
        &self,
        account: AccountId,
        name: &str,
    ) -> Result<Option<BinRecord>, StoreError> {
        match self.get_id(self.env.bin_name_db, &owner_name_key(account, name))? {
            Some(id) => self.bin_by_id(id),
            None => Ok(None),
        }
    }

    /// All bins of an account, ordered by bin index.
    pub fn bins_for_account(&self, account: AccountId) -> Result<Vec<BinRecord>, StoreError> {
        let ids = self.ids_with_prefix(self.env.bin_order_db, &id_key(account))?;
        let mut bins = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(bin) = self.bin_by_id(id)? {
                bins.push(bin);
            }
        }
        Ok(bins)
    }

    // ── Signing scripts ─────────────────────────────────────────────────

    pub fn insert_script(&mut self, script: &mut ScriptRecord) -> Result<(), StoreError> {
        script.id = self.next_id("script")?;
        self.put_record(self.env.scripts_db, &id_key(script.id), script)?;
        self.env
            .script_order_db
            .put(
                &mut self.txn,
                &composite_key(script.bin, script.index),
                &id_key(script.id),
            )
            .map_err(LmdbError::from)?;
        self.env
            .script_out_db
            .put(&mut self.txn, &script.txout_script, &id_key(script.id))
            .map_err(LmdbError::from)?;
        Ok(())
    }

    pub fn update_script(&mut self, script: &ScriptRecord) -> Result<(), StoreError> {
        self.put_record(self.env.scripts_db, &id_key(script.id), script)
    }

    pub fn script_by_id(&self, id: ScriptId) -> Result<Option<ScriptRecord>, StoreError> {
        self.get_record(self.env.scripts_db, &id_key(id))
    }

    /// Look up the signing script paid by an output script, if any.
    pub fn script_by_output_script(
        &self,
        txout_script: &[u8],
    ) -> Result<Option<ScriptRecord>, StoreError> {
        match self.get_id(self.env.script_out_db, txout_script)? {
            Some(id) => self.script_by_id(id),
            None => Ok(None),
        }
    }

    /// All scripts of a bin, ordered by script index.
    pub fn scripts_for_bin(&self, bin: BinId) -> Result<Vec<ScriptRecord>, StoreError> {
        let ids = self.ids_with_prefix(self.env.script_order_db, &id_key(bin))?;
        let mut scripts = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(script) = self.script_by_id(id)? {
                scripts.push(script);
            }
        }
        Ok(scripts)
    }

    pub fn iter_scripts(&self) -> Result<Vec<ScriptRecord>, StoreError> {
        self.collect_all(self.env.scripts_db)
    }

    // ── Keys ────────────────────────────────────────────────────────────

    pub fn insert_key(&mut self, key: &mut KeyRecord) -> Result<(), StoreError> {
        key.id = self.next_id("key")?;
        self.put_record(self.env.keys_db, &id_key(key.id), key)?;
        self.env
            .key_pubkey_db
            .put(&mut self.txn, &key.pubkey, &id_key(key.id))
            .map_err(LmdbError::from)?;
        Ok(())
    }

    pub fn key_by_pubkey(&self, pubkey: &[u8]) -> Result<Option<KeyRecord>, StoreError> {
        match self.get_id(self.env.key_pubkey_db, pubkey)? {
            Some(id) => self.get_record(self.env.keys_db, &id_key(id)),
            None => Ok(None),
        }
    }

    // ── Transactions ────────────────────────────────────────────────────

    /// Persist a new transaction: record, hash indexes and one spender
    /// entry per input.
    pub fn insert_tx(&mut self, tx: &mut TxRecord) -> Result<(), StoreError> {
        tx.id = self.next_id("tx")?;
        self.put_record(self.env.txs_db, &id_key(tx.id), tx)?;
        self.env
            .tx_unsigned_db
            .put(
                &mut self.txn,
                tx.unsigned_hash.as_bytes(),
                &id_key(tx.id),
            )
            .map_err(LmdbError::from)?;
        if let Some(hash) = tx.hash {
            self.env
                .tx_hash_db
                .put(&mut self.txn, hash.as_bytes(), &id_key(tx.id))
                .map_err(LmdbError::from)?;
        }
        for (i, input) in tx.inputs.iter().enumerate() {
            let key = outpoint_key(&input.outpoint_hash, input.outpoint_index);
            let value = inpoint_value(InPoint {
                tx: tx.id,
                input: i as u32,
            });
            self.env
                .spender_db
                .put(&mut self.txn, &key, &value)
                .map_err(LmdbError::from)?;
        }
        Ok(())
    }

    /// Rewrite a stored transaction, maintaining the signed-hash index when
    /// the transaction gains or changes its signed hash.
    pub fn update_tx(&mut self, tx: &TxRecord) -> Result<(), StoreError> {
        let old: TxRecord = self
            .get_record(self.env.txs_db, &id_key(tx.id))?
            .ok_or_else(|| StoreError::NotFound(format!("tx id {}", tx.id)))?;
        if old.hash != tx.hash {
            if let Some(old_hash) = old.hash {
                self.env
                    .tx_hash_db
                    .delete(&mut self.txn, old_hash.as_bytes())
                    .map_err(LmdbError::from)?;
            }
            if let Some(new_hash) = tx.hash {
                self.env
                    .tx_hash_db
                    .put(&mut self.txn, new_hash.as_bytes(), &id_key(tx.id))
                    .map_err(LmdbError::from)?;
            }
        }
        self.put_record(self.env.txs_db, &id_key(tx.id), tx)
    }

    /// Erase a transaction with its hash indexes and spender entries.
    pub fn erase_tx(&mut self, id: TxId) -> Result<(), StoreError> {
        let tx: TxRecord = self
            .get_record(self.env.txs_db, &id_key(id))?
            .ok_or_else(|| StoreError::NotFound(format!("tx id {id}")))?;
        self.env
            .tx_unsigned_db
            .delete(&mut self.txn, tx.unsigned_hash.as_bytes())
            .map_err(LmdbError::from)?;
        if let Some(hash) = tx.hash {
            self.env
                .tx_hash_db
                .delete(&mut self.txn, hash.as_bytes())
                .map_err(LmdbError::from)?;
        }
        for (i, input) in tx.inputs.iter().enumerate() {
            let key = outpoint_key(&input.outpoint_hash, input.outpoint_index);
            // A conflicting spender may have overwritten the entry; only
            // remove it while it still names this transaction.
            let current = self
                .env
                .spender_db
                .get(&self.txn, &key)
                .map_err(LmdbError::from)?
                .and_then(parse_inpoint);
            if current == Some(InPoint { tx: id, input: i as u32 }) {
                self.env
                    .spender_db
                    .delete(&mut self.txn, &key)
                    .map_err(LmdbError::from)?;
            }
        }
        self.env
            .txs_db
            .delete(&mut self.txn, &id_key(id))
            .map_err(LmdbError::from)?;
        Ok(())
    }

    pub fn tx_by_id(&self, id: TxId) -> Result<Option<TxRecord>, StoreError> {
        self.get_record(self.env.txs_db, &id_key(id))
    }

    /// Look up by signed hash only.
    pub fn tx_by_hash(&self, hash: &TxHash) -> Result<Option<TxRecord>, StoreError> {
        match self.get_id(self.env.tx_hash_db, hash.as_bytes())? {
            Some(id) => self.tx_by_id(id),
            None => Ok(None),
        }
    }

    pub fn tx_by_unsigned_hash(&self, hash: &TxHash) -> Result<Option<TxRecord>, StoreError> {
        match self.get_id(self.env.tx_unsigned_db, hash.as_bytes())? {
            Some(id) => self.tx_by_id(id),
            None => Ok(None),
        }
    }

    /// Look up by signed hash, falling back to the unsigned hash.
    pub fn tx_by_any_hash(&self, hash: &TxHash) -> Result<Option<TxRecord>, StoreError> {
        if let Some(tx) = self.tx_by_hash(hash)? {
            return Ok(Some(tx));
        }
        self.tx_by_unsigned_hash(hash)
    }

    /// The stored input spending an outpoint, if any.
    pub fn spender_of(
        &self,
        hash: &TxHash,
        index: u32,
    ) -> Result<Option<InPoint>, StoreError> {
        Ok(self
            .env
            .spender_db
            .get(&self.txn, &outpoint_key(hash, index))
            .map_err(LmdbError::from)?
            .and_then(parse_inpoint))
    }

    pub fn iter_txs(&self) -> Result<Vec<TxRecord>, StoreError> {
        self.collect_all(self.env.txs_db)
    }

    // ── Block headers ───────────────────────────────────────────────────

    pub fn insert_header(&mut self, header: &mut HeaderRecord) -> Result<(), StoreError> {
        header.id = self.next_id("header")?;
        self.put_record(self.env.headers_db, &id_key(header.id), header)?;
        self.env
            .header_hash_db
            .put(&mut self.txn, header.hash.as_bytes(), &id_key(header.id))
            .map_err(LmdbError::from)?;
        self.env
            .header_height_db
            .put(
                &mut self.txn,
                &header.height.to_be_bytes(),
                &id_key(header.id),
            )
            .map_err(LmdbError::from)?;
        Ok(())
    }

    pub fn erase_header(&mut self, id: HeaderId) -> Result<(), StoreError> {
        let header: HeaderRecord = self
            .get_record(self.env.headers_db, &id_key(id))?
            .ok_or_else(|| StoreError::NotFound(format!("header id {id}")))?;
        self.env
            .header_hash_db
            .delete(&mut self.txn, header.hash.as_bytes())
            .map_err(LmdbError::from)?;
        self.env
            .header_height_db
            .delete(&mut self.txn, &header.height.to_be_bytes())
            .map_err(LmdbError::from)?;
        self.env
            .headers_db
            .delete(&mut self.txn, &id_key(id))
            .map_err(LmdbError::from)?;
        Ok(())
    }

    pub fn header_by_id(&self, id: HeaderId) -> Result<Option<HeaderRecord>, StoreError> {
        self.get_record(self.env.headers_db, &id_key(id))
    }

    pub fn header_by_hash(&self, hash: &BlockHash) -> Result<Option<HeaderRecord>, StoreError> {
        match self.get_id(self.env.header_hash_db, hash.as_bytes())? {
            Some(id) => self.header_by_id(id),
            None => Ok(None),
        }
    }

    pub fn header_at_height(&self, height: u32) -> Result<Option<HeaderRecord>, StoreError> {
        match self.get_id(self.env.header_height_db, &height.to_be_bytes())? {
            Some(id) => self.header_by_id(id),
            None => Ok(None),
        }
    }

    /// Headers at or above a height, ascending.
    pub fn headers_at_or_above(&self, height: u32) -> Result<Vec<HeaderRecord>, StoreError> {
        let lower = height.to_be_bytes();
        let bounds = (Bound::Included(lower.as_slice()), Bound::Unbounded);
        let iter = self
            .env
            .header_height_db
            .range(&self.txn, &bounds)
            .map_err(LmdbError::from)?;
        let mut ids = Vec::new();
        for result in iter {
            let (_, value) = result.map_err(LmdbError::from)?;
            if let Some(id) = parse_id(value) {
                ids.push(id);
            }
        }
        let mut headers = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(header) = self.header_by_id(id)? {
                headers.push(header);
            }
        }
        Ok(headers)
    }

    /// The highest stored header height, if any header exists.
    pub fn best_height(&self) -> Result<Option<u32>, StoreError> {
        Ok(self
            .env
            .header_height_db
            .last(&self.txn)
            .map_err(LmdbError::from)?
            .and_then(|(key, _)| key.try_into().ok().map(u32::from_be_bytes)))
    }

    // ── Merkle blocks ───────────────────────────────────────────────────

    /// Persist a merkle block and index its contained transaction hashes.
    pub fn insert_merkle_block(&mut self, merkle: &MerkleBlockRecord) -> Result<(), StoreError> {
        self.put_record(self.env.merkle_db, &id_key(merkle.header), merkle)?;
        for hash in &merkle.hashes {
            self.env
                .merkle_hash_db
                .put(&mut self.txn, hash.as_bytes(), &id_key(merkle.header))
                .map_err(LmdbError::from)?;
        }
        Ok(())
    }

    /// Erase the merkle block attached to a header, with its hash index
    /// entries.
    pub fn erase_merkle_for_header(&mut self, header: HeaderId) -> Result<(), StoreError> {
        let merkle: Option<MerkleBlockRecord> =
            self.get_record(self.env.merkle_db, &id_key(header))?;
        if let Some(merkle) = merkle {
            for hash in &merkle.hashes {
                let current = self.get_id(self.env.merkle_hash_db, hash.as_bytes())?;
                if current == Some(header) {
                    self.env
                        .merkle_hash_db
                        .delete(&mut self.txn, hash.as_bytes())
                        .map_err(LmdbError::from)?;
                }
            }
            self.env
                .merkle_db
                .delete(&mut self.txn, &id_key(header))
                .map_err(LmdbError::from)?;
        }
        Ok(())
    }

    pub fn merkle_for_header(
        &self,
        header: HeaderId,
    ) -> Result<Option<MerkleBlockRecord>, StoreError> {
        self.get_record(self.env.merkle_db, &id_key(header))
    }

    /// The header whose merkle block lists a transaction hash, if any.
    pub fn header_for_merkle_hash(&self, hash: &TxHash) -> Result<Option<HeaderId>, StoreError> {
        self.get_id(self.env.merkle_hash_db, hash.as_bytes())
    }
}
