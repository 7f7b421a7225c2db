//! LMDB environment setup.

use std::path::Path;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use vault_store::StoreError;

use crate::batch::WriteBatch;
use crate::LmdbError;

/// Wraps the LMDB environment and all database handles.
pub struct VaultEnvironment {
    env: Env,

    // Sequence counters and miscellaneous metadata.
    pub(crate) meta_db: Database<Bytes, Bytes>,

    // Keychains: record by id, plus name and content-hash indexes.
    pub(crate) keychains_db: Database<Bytes, Bytes>,
    pub(crate) keychain_name_db: Database<Bytes, Bytes>,
    pub(crate) keychain_hash_db: Database<Bytes, Bytes>,

    // Accounts.
    pub(crate) accounts_db: Database<Bytes, Bytes>,
    pub(crate) account_name_db: Database<Bytes, Bytes>,
    pub(crate) account_hash_db: Database<Bytes, Bytes>,

    // Account bins: record by id, (account, index) ordering index and
    // (account, name) lookup index.
    pub(crate) bins_db: Database<Bytes, Bytes>,
    pub(crate) bin_order_db: Database<Bytes, Bytes>,
    pub(crate) bin_name_db: Database<Bytes, Bytes>,

    // Signing scripts: record by id, (bin, index) ordering index and the
    // output-script lookup used by transaction ingestion.
    pub(crate) scripts_db: Database<Bytes, Bytes>,
    pub(crate) script_order_db: Database<Bytes, Bytes>,
    pub(crate) script_out_db: Database<Bytes, Bytes>,

    // Keys: record by id plus pubkey lookup for signing.
    pub(crate) keys_db: Database<Bytes, Bytes>,
    pub(crate) key_pubkey_db: Database<Bytes, Bytes>,

    // Transactions: record by id, hash indexes, and the outpoint→spender
    // index used for double-spend detection and out-of-order linking.
    pub(crate) txs_db: Database<Bytes, Bytes>,
    pub(crate) tx_hash_db: Database<Bytes, Bytes>,
    pub(crate) tx_unsigned_db: Database<Bytes, Bytes>,
    pub(crate) spender_db: Database<Bytes, Bytes>,

    // Block headers: record by id, hash index, height index (one per
    // height).
    pub(crate) headers_db: Database<Bytes, Bytes>,
    pub(crate) header_hash_db: Database<Bytes, Bytes>,
    pub(crate) header_height_db: Database<Bytes, Bytes>,

    // Merkle blocks keyed by header id, plus the contained-hash index that
    // links transactions to their confirming header.
    pub(crate) merkle_db: Database<Bytes, Bytes>,
    pub(crate) merkle_hash_db: Database<Bytes, Bytes>,
}

impl VaultEnvironment {
    /// Open or create an LMDB environment at the given path.
    pub fn open(path: &Path, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)
            .map_err(|e| LmdbError::Heed(format!("failed to create directory: {e}")))?;

        let env = unsafe {
            EnvOpenOptions::new()
                .max_dbs(32)
                .map_size(map_size)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;

        let meta_db = env.create_database(&mut wtxn, Some("meta"))?;
        let keychains_db = env.create_database(&mut wtxn, Some("keychains"))?;
        let keychain_name_db = env.create_database(&mut wtxn, Some("keychain_names"))?;
        let keychain_hash_db = env.create_database(&mut wtxn, Some("keychain_hashes"))?;
        let accounts_db = env.create_database(&mut wtxn, Some("accounts"))?;
        let account_name_db = env.create_database(&mut wtxn, Some("account_names"))?;
        let account_hash_db = env.create_database(&mut wtxn, Some("account_hashes"))?;
        let bins_db = env.create_database(&mut wtxn, Some("bins"))?;
        let bin_order_db = env.create_database(&mut wtxn, Some("bin_order"))?;
        let bin_name_db = env.create_database(&mut wtxn, Some("bin_names"))?;
        let scripts_db = env.create_database(&mut wtxn, Some("scripts"))?;
        let script_order_db = env.create_database(&mut wtxn, Some("script_order"))?;
        let script_out_db = env.create_database(&mut wtxn, Some("script_outputs"))?;
        let keys_db = env.create_database(&mut wtxn, Some("keys"))?;
        let key_pubkey_db = env.create_database(&mut wtxn, Some("key_pubkeys"))?;
        let txs_db = env.create_database(&mut wtxn, Some("txs"))?;
        let tx_hash_db = env.create_database(&mut wtxn, Some("tx_hashes"))?;
        let tx_unsigned_db = env.create_database(&mut wtxn, Some("tx_unsigned_hashes"))?;
        let spender_db = env.create_database(&mut wtxn, Some("spenders"))?;
        let headers_db = env.create_database(&mut wtxn, Some("headers"))?;
        let header_hash_db = env.create_database(&mut wtxn, Some("header_hashes"))?;
        let header_height_db = env.create_database(&mut wtxn, Some("header_heights"))?;
        let merkle_db = env.create_database(&mut wtxn, Some("merkle_blocks"))?;
        let merkle_hash_db = env.create_database(&mut wtxn, Some("merkle_hashes"))?;

        wtxn.commit()?;

        Ok(Self {
            env,
            meta_db,
            keychains_db,
            keychain_name_db,
            keychain_hash_db,
            accounts_db,
            account_name_db,
            account_hash_db,
            bins_db,
            bin_order_db,
            bin_name_db,
            scripts_db,
            script_order_db,
            script_out_db,
            keys_db,
            key_pubkey_db,
            txs_db,
            tx_hash_db,
            tx_unsigned_db,
            spender_db,
            headers_db,
            header_hash_db,
            header_height_db,
            merkle_db,
            merkle_hash_db,
        })
    }

    /// Get a reference to the underlying heed environment.
    pub fn env(&self) -> &Env {
        &self.env
    }

    /// Begin a write batch: one LMDB write transaction covering every store
    /// the operation touches. Dropping the batch without committing rolls
    /// everything back.
    pub fn write_batch(&self) -> Result<WriteBatch<'_>, StoreError> {
        WriteBatch::new(self)
    }
}
