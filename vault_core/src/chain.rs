//! Blockchain engine: merkle-block ingestion, reorganization, confirmation
//! linking and chain queries.

use tracing::debug;

use vault_store::{HeaderRecord, MerkleBlockRecord, TxRecord};
use vault_store_lmdb::WriteBatch;
use vault_types::params::{BLOCK_TX_INDEX_UNKNOWN, HORIZON_NONE, TIME_HORIZON_WINDOW};
use vault_types::{BlockHash, MerkleBlockData, TxStatus};

use crate::error::VaultError;

/// The earliest account creation time, bounding how far back block
/// ingestion is meaningful. `0xffff_ffff` when no account exists.
pub(crate) fn horizon_timestamp(batch: &WriteBatch) -> Result<u32, VaultError> {
    let accounts = batch.iter_accounts()?;
    Ok(accounts
        .iter()
        .map(|account| account.time_created)
        .min()
        .unwrap_or(HORIZON_NONE))
}

pub(crate) fn best_height(batch: &WriteBatch) -> Result<u32, VaultError> {
    Ok(batch.best_height()?.unwrap_or(0))
}

/// Block hashes sampled descending from the best height: unit steps for
/// the first ten, doubling afterwards. Used by peers to find a common
/// ancestor.
pub(crate) fn locator_hashes(batch: &WriteBatch) -> Result<Vec<BlockHash>, VaultError> {
    let mut hashes = Vec::new();
    let mut height = best_height(batch)?;
    if height == 0 {
        return Ok(hashes);
    }

    let mut heights = vec![height];
    let mut n = 1u32;
    let mut step = 1u32;
    while step <= height {
        height -= step;
        n += 1;
        if n > 10 {
            step *= 2;
        }
        heights.push(height);
    }

    for height in heights {
        if let Some(header) = batch.header_at_height(height)? {
            hashes.push(header.hash);
        }
    }
    Ok(hashes)
}

/// Ingest a merkle block.
///
/// Returns false without effect when the parent is unknown and the block
/// is still newer than the horizon window, or when the header is already
/// stored. A header at an occupied height triggers a reorganization: every
/// header at or above it is erased together with its merkle block, and the
/// transactions it confirmed revert to pending.
pub(crate) fn insert_merkle_block(
    batch: &mut WriteBatch,
    merkle_block: &MerkleBlockData,
) -> Result<bool, VaultError> {
    let data = &merkle_block.header;
    let hash = data.hash();

    // Fetching must reach back past the horizon before blocks can attach
    // to an unknown parent.
    if batch.header_by_hash(&data.prev_hash)?.is_none()
        && data.timestamp.saturating_add(TIME_HORIZON_WINDOW) > horizon_timestamp(batch)?
    {
        return Ok(false);
    }

    if let Some(existing) = batch.header_by_hash(&hash)? {
        debug!(%hash, height = existing.height, "already have block");
        return Ok(false);
    }

    let sidechain = batch.headers_at_or_above(data.height)?;
    if !sidechain.is_empty() {
        debug!(%hash, height = data.height, "reorganization");
        for side_header in sidechain {
            batch.erase_merkle_for_header(side_header.id)?;
            for mut tx in batch.iter_txs()? {
                if tx.header == Some(side_header.id) {
                    tx.header = None;
                    tx.block_tx_index = BLOCK_TX_INDEX_UNKNOWN;
                    if tx.status == TxStatus::Confirmed {
                        tx.status = TxStatus::Propagated;
                    }
                    batch.update_tx(&tx)?;
                }
            }
            batch.erase_header(side_header.id)?;
        }
    }

    debug!(%hash, height = data.height, "inserting new merkle block");
    let mut header = HeaderRecord {
        id: 0,
        hash,
        height: data.height,
        version: data.version,
        prev_hash: data.prev_hash,
        merkle_root: data.merkle_root,
        timestamp: data.timestamp,
        bits: data.bits,
        nonce: data.nonce,
    };
    batch.insert_header(&mut header)?;
    batch.insert_merkle_block(&MerkleBlockRecord {
        header: header.id,
        tx_count: merkle_block.tx_count,
        hashes: merkle_block.hashes.clone(),
        flags: merkle_block.flags.clone(),
    })?;

    for tx_hash in &merkle_block.hashes {
        if let Some(mut tx) = batch.tx_by_hash(tx_hash)? {
            if tx.header.is_none() {
                debug!(tx = %tx_hash, "linking transaction to block");
                link_to_header(&mut tx, header.id);
                batch.update_tx(&tx)?;
            }
        }
    }

    let count = update_confirmations(batch)?;
    debug!(count, "transactions confirmed");
    Ok(true)
}

fn link_to_header(tx: &mut TxRecord, header: vault_store::HeaderId) {
    tx.header = Some(header);
    // The true in-block index is not recovered; the sentinel is preserved
    // for wire compatibility.
    tx.block_tx_index = BLOCK_TX_INDEX_UNKNOWN;
    tx.status = TxStatus::Confirmed;
}

/// Link every unconfirmed transaction whose hash appears in a stored
/// merkle block. Returns how many were linked.
pub(crate) fn update_confirmations(batch: &mut WriteBatch) -> Result<u32, VaultError> {
    let mut count = 0;
    for mut tx in batch.iter_txs()? {
        if tx.header.is_some() {
            continue;
        }
        if let Some(header_id) = batch.header_for_merkle_hash(&tx.lookup_hash())? {
            link_to_header(&mut tx, header_id);
            batch.update_tx(&tx)?;
            count += 1;
            debug!(tx = %tx.lookup_hash(), "transaction confirmed");
        }
    }
    Ok(count)
}

/// Confirmation check for a single already-persisted transaction.
pub(crate) fn update_confirmations_for(
    batch: &mut WriteBatch,
    tx: &mut TxRecord,
) -> Result<bool, VaultError> {
    if tx.header.is_some() {
        return Ok(false);
    }
    let Some(header_id) = batch.header_for_merkle_hash(&tx.lookup_hash())? else {
        return Ok(false);
    };
    link_to_header(tx, header_id);
    batch.update_tx(tx)?;
    Ok(true)
}
