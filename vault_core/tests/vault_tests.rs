//! End-to-end vault tests against a temporary store: keychain and account
//! lifecycle, script pools, transaction ingestion/construction/signing,
//! confirmation and reorganization, and portable file round trips.

use tempfile::TempDir;

use vault_core::{ImportAccountRequest, ImportKeychainRequest, Vault, VaultError};
use vault_store::TxRecord;
use vault_types::params::{CHANGE_BIN_NAME, DEFAULT_BIN_NAME};
use vault_types::{
    BlockHash, BlockHeaderData, MerkleBlockData, RawTransaction, RawTxIn, RawTxOut, ScriptStatus,
    SecretBytes, TxHash, TxStatus,
};

const POOL_SIZE: u32 = 5;
const TIME_CREATED: u32 = 1_700_000_000;

fn open_vault() -> (TempDir, Vault) {
    let dir = tempfile::tempdir().expect("tempdir");
    let vault = Vault::open_with_map_size(dir.path(), 32 * 1024 * 1024).expect("open vault");
    vault.set_coin_selection_seed(Some(7));
    (dir, vault)
}

fn lock_key() -> SecretBytes {
    SecretBytes::from("correct horse battery staple")
}

/// Create keychain `name` and leave its chain code and private key
/// unlocked.
fn setup_keychain(vault: &Vault, name: &str) {
    let entropy = SecretBytes::new(format!("entropy for {name} keychain").into_bytes());
    vault
        .new_keychain(name, &entropy, &lock_key(), b"salt")
        .expect("new_keychain");
    assert!(vault
        .unlock_keychain_chain_code(name, &lock_key())
        .expect("unlock chain code"));
    assert!(vault
        .unlock_keychain_private_key(name, &lock_key())
        .expect("unlock private key"));
}

fn setup_account(vault: &Vault, account: &str, keychain_names: &[&str], min_sigs: u32) {
    for name in keychain_names {
        setup_keychain(vault, name);
    }
    let names: Vec<String> = keychain_names.iter().map(|n| n.to_string()).collect();
    vault
        .new_account(account, min_sigs, &names, POOL_SIZE, TIME_CREATED)
        .expect("new_account");
}

/// A transaction from outside the vault paying `value` to `script`.
fn funding_tx(script: &[u8], value: u64, marker: u8) -> RawTransaction {
    RawTransaction {
        version: 1,
        inputs: vec![RawTxIn {
            prev_hash: TxHash::new([marker; 32]),
            prev_index: 0,
            script: vec![0x51],
            sequence: 0xffff_ffff,
        }],
        outputs: vec![RawTxOut {
            value,
            script: script.to_vec(),
        }],
        locktime: 0,
    }
}

fn raw_from_record(tx: &TxRecord) -> RawTransaction {
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

/// Issue a script and fund it from outside, returning the stored funding
/// transaction.
fn fund_account(vault: &Vault, account: &str, value: u64, marker: u8) -> TxRecord {
    let script = vault
        .issue_script(account, DEFAULT_BIN_NAME, "funding")
        .expect("issue_script");
    vault
        .insert_tx(&funding_tx(&script.txout_script, value, marker))
        .expect("insert_tx")
        .expect("funding tx should be relevant")
}

fn merkle_block_at(height: u32, prev_hash: BlockHash, nonce: u32, hashes: Vec<TxHash>) -> MerkleBlockData {
    MerkleBlockData {
        header: BlockHeaderData {
            version: 2,
            prev_hash,
            merkle_root: TxHash::new([nonce as u8; 32]),
            timestamp: 1_600_000_000,
            bits: 0x1d00_ffff,
            nonce,
            height,
        },
        tx_count: hashes.len().max(1) as u32,
        hashes,
        flags: vec![0xff],
    }
}

// ── Keychains ───────────────────────────────────────────────────────────

#[test]
fn new_keychain_persists_and_rejects_duplicates() {
    let (_dir, vault) = open_vault();
    setup_keychain(&vault, "alice");
    assert!(vault.keychain_exists("alice").unwrap());
    assert!(!vault.keychain_exists("bob").unwrap());

    let entropy = SecretBytes::from("other entropy");
    let result = vault.new_keychain("alice", &entropy, &lock_key(), b"salt");
    assert!(matches!(result, Err(VaultError::KeychainAlreadyExists(n)) if n == "alice"));
}

#[test]
fn rename_keychain_checks_names() {
    let (_dir, vault) = open_vault();
    setup_keychain(&vault, "alice");
    setup_keychain(&vault, "bob");

    assert!(matches!(
        vault.rename_keychain("carol", "dave"),
        Err(VaultError::KeychainNotFound(_))
    ));
    assert!(matches!(
        vault.rename_keychain("alice", "bob"),
        Err(VaultError::KeychainAlreadyExists(_))
    ));
    vault.rename_keychain("alice", "alice").unwrap();
    vault.rename_keychain("alice", "alicia").unwrap();
    assert!(vault.keychain_exists("alicia").unwrap());
    assert!(!vault.keychain_exists("alice").unwrap());
}

#[test]
fn keychain_file_roundtrip_preserves_hash_and_privacy() {
    let (_dir, vault) = open_vault();
    let dir = tempfile::tempdir().unwrap();
    setup_keychain(&vault, "alice");
    let stored = vault.get_keychain("alice").unwrap();

    // Private export into a fresh vault.
    let private_path = dir.path().join("alice.private");
    vault.export_keychain("alice", &private_path, true).unwrap();

    let (_dir2, other) = open_vault();
    let (imported, report) = other
        .import_keychain(
            &private_path,
            ImportKeychainRequest {
                import_privkeys: true,
            },
        )
        .unwrap();
    assert!(report.privkeys_imported);
    assert_eq!(imported.hash, stored.hash);
    assert_eq!(imported.pubkey, stored.pubkey);
    assert!(imported.is_private());

    // The original lock key still opens the imported chain code.
    assert!(other
        .unlock_keychain_chain_code("alice", &lock_key())
        .unwrap());

    // Re-importing the same material is rejected.
    assert!(matches!(
        other.import_keychain(
            &private_path,
            ImportKeychainRequest {
                import_privkeys: true
            }
        ),
        Err(VaultError::KeychainAlreadyExists(_))
    ));
}

#[test]
fn watch_only_import_upgraded_by_private_import() {
    let (_dir, vault) = open_vault();
    let dir = tempfile::tempdir().unwrap();
    setup_keychain(&vault, "alice");

    let public_path = dir.path().join("alice.public");
    let private_path = dir.path().join("alice.private");
    vault.export_keychain("alice", &public_path, false).unwrap();
    vault.export_keychain("alice", &private_path, true).unwrap();

    let (_dir2, other) = open_vault();
    let (watch_only, report) = other
        .import_keychain(
            &public_path,
            ImportKeychainRequest {
                import_privkeys: true,
            },
        )
        .unwrap();
    assert!(!report.privkeys_imported);
    assert!(!watch_only.is_private());

    // A later private import folds key material into the stored keychain.
    let (upgraded, report) = other
        .import_keychain(
            &private_path,
            ImportKeychainRequest {
                import_privkeys: true,
            },
        )
        .unwrap();
    assert!(report.privkeys_imported);
    assert_eq!(upgraded.id, watch_only.id);
    assert!(upgraded.is_private());
}

#[test]
fn export_privkeys_from_watch_only_fails() {
    let (_dir, vault) = open_vault();
    let dir = tempfile::tempdir().unwrap();
    setup_keychain(&vault, "alice");

    let public_path = dir.path().join("alice.public");
    vault.export_keychain("alice", &public_path, false).unwrap();

    let (_dir2, other) = open_vault();
    other
        .import_keychain(
            &public_path,
            ImportKeychainRequest {
                import_privkeys: false,
            },
        )
        .unwrap();
    assert!(matches!(
        other.export_keychain("alice", &dir.path().join("out"), true),
        Err(VaultError::KeychainIsNotPrivate(_))
    ));
}

// ── Accounts and script pools ───────────────────────────────────────────

#[test]
fn new_account_creates_birth_bins_with_full_pools() {
    let (_dir, vault) = open_vault();
    setup_account(&vault, "acct", &["alice"], 1);

    let info = vault.account_info("acct").unwrap();
    assert_eq!(info.bin_names, vec![CHANGE_BIN_NAME, DEFAULT_BIN_NAME]);
    assert_eq!(info.min_sigs, 1);
    assert_eq!(info.keychain_names, vec!["alice"]);

    for bin in [CHANGE_BIN_NAME, DEFAULT_BIN_NAME] {
        let unused = vault
            .signing_script_views("acct", bin, ScriptStatus::Unused.flag())
            .unwrap();
        assert_eq!(unused.len(), POOL_SIZE as usize, "bin {bin}");
        let indices: Vec<u32> = unused.iter().map(|v| v.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
    }

    assert!(matches!(
        vault.new_account("acct", 1, &["alice".into()], POOL_SIZE, TIME_CREATED),
        Err(VaultError::AccountAlreadyExists(_))
    ));
}

#[test]
fn new_account_requires_unlocked_chain_codes() {
    let (_dir, vault) = open_vault();
    setup_keychain(&vault, "alice");
    vault.lock_all_chain_codes();

    let result = vault.new_account("acct", 1, &["alice".into()], POOL_SIZE, TIME_CREATED);
    match result {
        Err(VaultError::AccountChainCodeLocked {
            account,
            failing_keychains,
        }) => {
            assert_eq!(account, "acct");
            assert_eq!(failing_keychains, vec!["alice"]);
        }
        other => panic!("expected AccountChainCodeLocked, got {other:?}"),
    }
    // Nothing was committed.
    assert!(!vault.account_exists("acct").unwrap());
}

#[test]
fn issue_script_takes_lowest_index_and_refills() {
    let (_dir, vault) = open_vault();
    setup_account(&vault, "acct", &["alice"], 1);

    let script = vault.issue_script("acct", DEFAULT_BIN_NAME, "tip").unwrap();
    assert_eq!(script.status, ScriptStatus::Issued);
    assert_eq!(script.label, "tip");
    assert_eq!(script.index, 0);

    let unused = vault
        .signing_script_views("acct", DEFAULT_BIN_NAME, ScriptStatus::Unused.flag())
        .unwrap();
    assert_eq!(unused.len(), POOL_SIZE as usize, "pool refilled");
    let issued = vault
        .signing_script_views("acct", DEFAULT_BIN_NAME, ScriptStatus::Issued.flag())
        .unwrap();
    assert_eq!(issued.len(), 1);
    assert_eq!(issued[0].label, "tip");
}

#[test]
fn issuing_from_change_bin_fails() {
    let (_dir, vault) = open_vault();
    setup_account(&vault, "acct", &["alice"], 1);
    assert!(matches!(
        vault.issue_script("acct", CHANGE_BIN_NAME, "nope"),
        Err(VaultError::AccountCannotIssueChangeScript(a)) if a == "acct"
    ));
}

#[test]
fn issue_with_locked_chain_code_drains_pool_then_fails() {
    let (_dir, vault) = open_vault();
    setup_account(&vault, "acct", &["alice"], 1);
    vault.lock_all_chain_codes();

    // The pool cannot refill, but issuing keeps working until it drains.
    for _ in 0..POOL_SIZE {
        vault.issue_script("acct", DEFAULT_BIN_NAME, "").unwrap();
    }
    assert!(matches!(
        vault.issue_script("acct", DEFAULT_BIN_NAME, ""),
        Err(VaultError::AccountBinOutOfScripts { .. })
    ));
}

#[test]
fn add_account_bin_validates_and_fills() {
    let (_dir, vault) = open_vault();
    setup_account(&vault, "acct", &["alice"], 1);

    assert!(matches!(
        vault.add_account_bin("acct", "@reserved"),
        Err(VaultError::AccountBinInvalidName(_))
    ));

    let bin = vault.add_account_bin("acct", "savings").unwrap();
    assert_eq!(bin.index, 2);
    let unused = vault
        .signing_script_views("acct", "savings", ScriptStatus::Unused.flag())
        .unwrap();
    assert_eq!(unused.len(), POOL_SIZE as usize);

    assert!(matches!(
        vault.add_account_bin("acct", "savings"),
        Err(VaultError::AccountBinAlreadyExists { .. })
    ));

    vault.issue_script("acct", "savings", "rainy day").unwrap();
}

// ── Transactions ────────────────────────────────────────────────────────

#[test]
fn funding_marks_script_used_and_credits_balance() {
    let (_dir, vault) = open_vault();
    setup_account(&vault, "acct", &["alice"], 1);

    let funding = fund_account(&vault, "acct", 100, 0xf1);
    assert_eq!(funding.status, TxStatus::Unsent);
    assert!(funding.hash.is_some());
    // Outpoint of the foreign input is unknown, so no fee.
    assert_eq!(funding.fee, None);

    let used = vault
        .signing_script_views("acct", DEFAULT_BIN_NAME, ScriptStatus::Used.flag())
        .unwrap();
    assert_eq!(used.len(), 1);
    assert_eq!(
        vault
            .account_balance("acct", 0, TxStatus::ALL_FLAGS)
            .unwrap(),
        100
    );
}

#[test]
fn irrelevant_tx_is_ignored() {
    let (_dir, vault) = open_vault();
    setup_account(&vault, "acct", &["alice"], 1);

    let unrelated = funding_tx(&[0xa9, 0x14, 0x00], 55, 0x77);
    assert!(vault.insert_tx(&unrelated).unwrap().is_none());
    assert_eq!(
        vault
            .account_balance("acct", 0, TxStatus::ALL_FLAGS)
            .unwrap(),
        0
    );
}

#[test]
fn duplicate_signed_insert_is_a_noop() {
    let (_dir, vault) = open_vault();
    setup_account(&vault, "acct", &["alice"], 1);
    let funding = fund_account(&vault, "acct", 100, 0xf1);

    let again = vault.insert_tx(&raw_from_record(&funding)).unwrap();
    assert!(again.is_none());
    assert_eq!(
        vault
            .account_balance("acct", 0, TxStatus::ALL_FLAGS)
            .unwrap(),
        100
    );
}

#[test]
fn create_tx_selects_utxos_and_makes_change() {
    let (_dir, vault) = open_vault();
    setup_account(&vault, "acct", &["alice"], 1);
    fund_account(&vault, "acct", 100, 0xf1);

    let destination = vec![0xa9, 0x14, 0xee];
    let tx = vault
        .create_tx("acct", 1, 0, vec![(destination.clone(), 60)], 1, 1, true)
        .unwrap()
        .expect("tx should involve the vault");

    assert_eq!(tx.status, TxStatus::Unsigned);
    assert_eq!(tx.fee, Some(1));
    assert_eq!(tx.inputs.len(), 1);
    assert_eq!(tx.outputs.len(), 2);

    let change: Vec<u64> = tx
        .outputs
        .iter()
        .filter(|o| o.signing_script.is_some())
        .map(|o| o.value)
        .collect();
    assert_eq!(change, vec![39]);
    let foreign: Vec<u64> = tx
        .outputs
        .iter()
        .filter(|o| o.signing_script.is_none())
        .map(|o| o.value)
        .collect();
    assert_eq!(foreign, vec![60]);

    // The funding outpoint is consumed, so only the change remains.
    assert_eq!(
        vault
            .account_balance("acct", 0, TxStatus::ALL_FLAGS)
            .unwrap(),
        39
    );
}

#[test]
fn insufficient_funds_is_detected() {
    let (_dir, vault) = open_vault();
    setup_account(&vault, "acct", &["alice"], 1);
    fund_account(&vault, "acct", 100, 0xf1);

    assert!(matches!(
        vault.create_tx("acct", 1, 0, vec![(vec![0xa9], 100)], 1, 1, true),
        Err(VaultError::AccountInsufficientFunds(a)) if a == "acct"
    ));
}

#[test]
fn sign_tx_completes_single_sig_spend() {
    let (_dir, vault) = open_vault();
    setup_account(&vault, "acct", &["alice"], 1);
    fund_account(&vault, "acct", 100, 0xf1);

    let tx = vault
        .create_tx("acct", 1, 0, vec![(vec![0xa9, 0x14, 0xee], 60)], 1, 1, true)
        .unwrap()
        .unwrap();

    let request = vault.signing_request(&tx.unsigned_hash, true).unwrap();
    assert_eq!(request.sigs_needed, 1);
    assert_eq!(request.keychains.len(), 1);
    assert!(request.keychains.iter().any(|(name, _)| name == "alice"));
    assert!(request.raw_tx.is_some());

    assert!(vault.sign_tx(&tx.unsigned_hash, true).unwrap());
    let signed = vault.get_tx(&tx.unsigned_hash).unwrap();
    assert_eq!(signed.status, TxStatus::Unsent);
    assert!(signed.hash.is_some());
    assert_eq!(signed.fee, Some(1));

    // Nothing left to sign.
    let request = vault.signing_request(&tx.unsigned_hash, false).unwrap();
    assert_eq!(request.sigs_needed, 0);
}

#[test]
fn sign_tx_with_locked_keys_changes_nothing() {
    let (_dir, vault) = open_vault();
    setup_account(&vault, "acct", &["alice"], 1);
    fund_account(&vault, "acct", 100, 0xf1);

    let tx = vault
        .create_tx("acct", 1, 0, vec![(vec![0xa9, 0x14, 0xee], 60)], 1, 1, true)
        .unwrap()
        .unwrap();

    vault.lock_all_private_keys();
    vault.lock_all_chain_codes();
    assert!(!vault.sign_tx(&tx.unsigned_hash, true).unwrap());
    let stored = vault.get_tx(&tx.unsigned_hash).unwrap();
    assert_eq!(stored.status, TxStatus::Unsigned);
    assert!(stored.hash.is_none());
}

/// Clone an account into a second vault via a portable file and return the
/// cosigner vault with chain codes and private keys unlocked.
fn cosigner_vault(
    vault: &Vault,
    account: &str,
    keychain_names: &[&str],
) -> (TempDir, TempDir, Vault) {
    let file_dir = tempfile::tempdir().unwrap();
    let path = file_dir.path().join("cosigner.account");
    let export_key = SecretBytes::from("cosigner transfer key");
    vault
        .export_account(account, &path, &export_key, b"transfer-salt", true)
        .unwrap();

    let (dir, other) = open_vault();
    other
        .import_account(
            &path,
            &export_key,
            ImportAccountRequest {
                import_privkeys: true,
            },
        )
        .unwrap();
    for name in keychain_names {
        // Chain codes now answer to the export key; private keys kept
        // their original encryption.
        assert!(other
            .unlock_keychain_chain_code(name, &export_key)
            .unwrap());
        assert!(other
            .unlock_keychain_private_key(name, &lock_key())
            .unwrap());
    }
    (file_dir, dir, other)
}

#[test]
fn signed_variant_replaces_stored_unsigned_inputs() {
    let (_dir, vault) = open_vault();
    setup_account(&vault, "acct", &["alice"], 1);
    let (_fdir, _cdir, cosigner) = cosigner_vault(&vault, "acct", &["alice"]);

    // Both vaults see the same funding transaction.
    let script = vault
        .issue_script("acct", DEFAULT_BIN_NAME, "funding")
        .unwrap();
    let funding = funding_tx(&script.txout_script, 100, 0xf1);
    vault.insert_tx(&funding).unwrap().unwrap();
    cosigner.insert_tx(&funding).unwrap().unwrap();

    let tx = vault
        .create_tx("acct", 1, 0, vec![(vec![0xa9, 0x14, 0xee], 60)], 1, 1, true)
        .unwrap()
        .unwrap();

    // The cosigner receives the unsigned copy, signs it and sends the
    // signed variant back.
    cosigner
        .insert_tx(&raw_from_record(&tx))
        .unwrap()
        .expect("unsigned copy should be stored");
    assert!(cosigner.sign_tx(&tx.unsigned_hash, true).unwrap());
    let signed = cosigner.get_tx(&tx.unsigned_hash).unwrap();
    assert_eq!(signed.status, TxStatus::Unsent);

    let replaced = vault
        .insert_tx(&raw_from_record(&signed))
        .unwrap()
        .expect("replacement should be stored");
    assert_eq!(replaced.id, tx.id);
    assert_eq!(replaced.status, TxStatus::Unsent);
    assert_eq!(replaced.inputs[0].script, signed.inputs[0].script);
}

#[test]
fn partial_signatures_merge_by_insertion() {
    let (_dir, vault) = open_vault();
    setup_account(&vault, "shared", &["alice", "bob"], 2);
    let (_fdir, _cdir, cosigner) = cosigner_vault(&vault, "shared", &["alice", "bob"]);

    let script = vault
        .issue_script("shared", DEFAULT_BIN_NAME, "funding")
        .unwrap();
    let funding = funding_tx(&script.txout_script, 100, 0xf2);
    vault.insert_tx(&funding).unwrap().unwrap();
    cosigner.insert_tx(&funding).unwrap().unwrap();

    // Each side holds one of the two required keys.
    vault.lock_keychain_private_key("bob");
    cosigner.lock_keychain_private_key("alice");

    let tx = vault
        .create_tx("shared", 1, 0, vec![(vec![0xa9, 0x14, 0xee], 40)], 2, 1, true)
        .unwrap()
        .unwrap();
    cosigner
        .insert_tx(&raw_from_record(&tx))
        .unwrap()
        .expect("unsigned copy should be stored");

    // One signature each; both copies stay short of the threshold.
    assert!(vault.sign_tx(&tx.unsigned_hash, true).unwrap());
    assert!(cosigner.sign_tx(&tx.unsigned_hash, true).unwrap());
    let bob_partial = cosigner.get_tx(&tx.unsigned_hash).unwrap();
    assert_eq!(bob_partial.status, TxStatus::Unsigned);

    // Bob's copy arrives: his signature merges into the stored inputs.
    let merged = vault
        .insert_tx(&raw_from_record(&bob_partial))
        .unwrap()
        .expect("merge should update the stored tx");
    assert_eq!(merged.id, tx.id);

    // The same copy again contributes nothing.
    assert!(vault
        .insert_tx(&raw_from_record(&bob_partial))
        .unwrap()
        .is_none());

    // The merged input now carries both signatures; the finalized variant
    // replaces the stored unsigned transaction on arrival.
    let raw_final = raw_from_record(&merged);
    let finalized = vault
        .insert_tx(&raw_final)
        .unwrap()
        .expect("finalized variant should be stored");
    assert_eq!(finalized.id, tx.id);
    assert_eq!(finalized.status, TxStatus::Unsent);
}

#[test]
fn delete_tx_cascades_and_restores_outpoints() {
    let (_dir, vault) = open_vault();
    setup_account(&vault, "acct", &["alice"], 1);
    let funding = fund_account(&vault, "acct", 100, 0xf1);

    let spend = vault
        .create_tx("acct", 1, 0, vec![(vec![0xa9, 0x14, 0xee], 60)], 1, 1, true)
        .unwrap()
        .unwrap();

    // Deleting the funding transaction takes the dependent spend with it.
    vault.delete_tx(&funding.lookup_hash()).unwrap();
    assert!(matches!(
        vault.get_tx(&funding.lookup_hash()),
        Err(VaultError::TxNotFound(_))
    ));
    assert!(matches!(
        vault.get_tx(&spend.unsigned_hash),
        Err(VaultError::TxNotFound(_))
    ));
    assert_eq!(
        vault
            .account_balance("acct", 0, TxStatus::ALL_FLAGS)
            .unwrap(),
        0
    );

    // Scripts stay used: once received, always received.
    let used = vault
        .signing_script_views("acct", "@all", ScriptStatus::Used.flag())
        .unwrap();
    assert!(!used.is_empty());
}

#[test]
fn deleting_spend_alone_unspends_the_outpoint() {
    let (_dir, vault) = open_vault();
    setup_account(&vault, "acct", &["alice"], 1);
    fund_account(&vault, "acct", 100, 0xf1);

    let spend = vault
        .create_tx("acct", 1, 0, vec![(vec![0xa9, 0x14, 0xee], 60)], 1, 1, true)
        .unwrap()
        .unwrap();
    assert_eq!(
        vault
            .account_balance("acct", 0, TxStatus::ALL_FLAGS)
            .unwrap(),
        39
    );

    vault.delete_tx(&spend.unsigned_hash).unwrap();
    // The funding outpoint is spendable again.
    assert_eq!(
        vault
            .account_balance("acct", 0, TxStatus::ALL_FLAGS)
            .unwrap(),
        100
    );
}

// ── Blockchain ──────────────────────────────────────────────────────────

#[test]
fn merkle_block_confirms_listed_transactions() {
    let (_dir, vault) = open_vault();
    setup_account(&vault, "acct", &["alice"], 1);
    let funding = fund_account(&vault, "acct", 100, 0xf1);
    let funding_hash = funding.hash.expect("funding is signed");

    assert_eq!(vault.horizon_timestamp().unwrap(), TIME_CREATED);

    let block = merkle_block_at(100, BlockHash::new([0xaa; 32]), 1, vec![funding_hash]);
    assert!(vault.insert_merkle_block(&block).unwrap());
    assert_eq!(vault.best_height().unwrap(), 100);

    let confirmed = vault.get_tx(&funding_hash).unwrap();
    assert_eq!(confirmed.status, TxStatus::Confirmed);
    assert!(confirmed.header.is_some());
    assert_eq!(confirmed.block_tx_index, 0xffff_ffff);

    // One confirmation at the tip.
    assert_eq!(
        vault
            .account_balance("acct", 1, TxStatus::ALL_FLAGS)
            .unwrap(),
        100
    );
    assert_eq!(
        vault
            .account_balance("acct", 2, TxStatus::ALL_FLAGS)
            .unwrap(),
        0
    );

    // Same header again: rejected without effect.
    assert!(!vault.insert_merkle_block(&block).unwrap());
}

#[test]
fn competing_header_at_same_height_reorganizes() {
    let (_dir, vault) = open_vault();
    setup_account(&vault, "acct", &["alice"], 1);
    let funding = fund_account(&vault, "acct", 100, 0xf1);
    let funding_hash = funding.hash.unwrap();

    let block = merkle_block_at(100, BlockHash::new([0xaa; 32]), 1, vec![funding_hash]);
    assert!(vault.insert_merkle_block(&block).unwrap());

    // A different block claims height 100: the old header goes away and
    // the transaction detaches.
    let rival = merkle_block_at(100, BlockHash::new([0xbb; 32]), 2, vec![]);
    assert!(vault.insert_merkle_block(&rival).unwrap());

    assert_eq!(vault.best_height().unwrap(), 100);
    let detached = vault.get_tx(&funding_hash).unwrap();
    assert!(detached.header.is_none());
    assert_ne!(detached.status, TxStatus::Confirmed);
    assert_eq!(
        vault
            .account_balance("acct", 1, TxStatus::ALL_FLAGS)
            .unwrap(),
        0
    );

    let locator = vault.locator_hashes().unwrap();
    assert_eq!(locator.first(), Some(&rival.header.hash()));
}

#[test]
fn chain_extends_and_locator_samples_backwards() {
    let (_dir, vault) = open_vault();
    setup_account(&vault, "acct", &["alice"], 1);

    let genesis = merkle_block_at(1, BlockHash::new([0x01; 32]), 0, vec![]);
    assert!(vault.insert_merkle_block(&genesis).unwrap());
    let mut prev = genesis.header.hash();
    for height in 2..=15 {
        let block = merkle_block_at(height, prev, height, vec![]);
        assert!(vault.insert_merkle_block(&block).unwrap());
        prev = block.header.hash();
    }

    assert_eq!(vault.best_height().unwrap(), 15);
    let locator = vault.locator_hashes().unwrap();
    assert_eq!(locator.first(), Some(&prev));
    // Unit steps for ten entries, then doubling down to the genesis.
    assert!(locator.len() < 15);
}

#[test]
fn unattached_future_block_is_deferred() {
    let (_dir, vault) = open_vault();
    setup_account(&vault, "acct", &["alice"], 1);

    // Parent unknown and timestamp after the horizon window: not yet.
    let mut block = merkle_block_at(500, BlockHash::new([0xcc; 32]), 9, vec![]);
    block.header.timestamp = TIME_CREATED + 10;
    assert!(!vault.insert_merkle_block(&block).unwrap());
    assert_eq!(vault.best_height().unwrap(), 0);
}

// ── Portable account files ──────────────────────────────────────────────

#[test]
fn account_file_roundtrip_restores_structure() {
    let (_dir, vault) = open_vault();
    let dir = tempfile::tempdir().unwrap();
    setup_account(&vault, "shared", &["alice", "bob"], 2);
    vault.issue_script("shared", DEFAULT_BIN_NAME, "tip").unwrap();
    let original = vault.get_account("shared").unwrap();

    let path = dir.path().join("shared.account");
    let export_key = SecretBytes::from("portable lock key");
    vault
        .export_account("shared", &path, &export_key, b"export-salt", true)
        .unwrap();

    let (_dir2, other) = open_vault();
    let (imported, report) = other
        .import_account(
            &path,
            &export_key,
            ImportAccountRequest {
                import_privkeys: true,
            },
        )
        .unwrap();
    assert_eq!(report.privkeys_imported, 2);
    assert_eq!(imported.hash, original.hash);
    assert_eq!(imported.min_sigs, 2);
    assert_eq!(imported.time_created, TIME_CREATED);

    let info = other.account_info("shared").unwrap();
    assert_eq!(info.bin_names, vec![CHANGE_BIN_NAME, DEFAULT_BIN_NAME]);
    assert_eq!(info.keychain_names.len(), 2);

    // The whole pre-export prefix (pool of five plus one issued) is
    // rematerialized as issued, with a fresh pool behind it.
    let issued = other
        .signing_script_views("shared", DEFAULT_BIN_NAME, ScriptStatus::Issued.flag())
        .unwrap();
    assert_eq!(issued.len(), POOL_SIZE as usize + 1);
    let unused = other
        .signing_script_views("shared", DEFAULT_BIN_NAME, ScriptStatus::Unused.flag())
        .unwrap();
    assert_eq!(unused.len(), POOL_SIZE as usize);
    let change_scripts = other
        .signing_script_views("shared", CHANGE_BIN_NAME, ScriptStatus::Change.flag())
        .unwrap();
    assert_eq!(change_scripts.len(), POOL_SIZE as usize);

    // Imported keychains answer to the export key now.
    assert!(other
        .unlock_keychain_chain_code("alice", &export_key)
        .unwrap());

    // Same content hash cannot be imported twice.
    assert!(matches!(
        other.import_account(
            &path,
            &export_key,
            ImportAccountRequest {
                import_privkeys: true
            }
        ),
        Err(VaultError::AccountAlreadyExists(_))
    ));
}

#[test]
fn imported_account_scripts_match_origin() {
    let (_dir, vault) = open_vault();
    let dir = tempfile::tempdir().unwrap();
    setup_account(&vault, "shared", &["alice", "bob"], 2);

    let path = dir.path().join("shared.account");
    let export_key = SecretBytes::from("portable lock key");
    vault
        .export_account("shared", &path, &export_key, b"export-salt", false)
        .unwrap();

    let (_dir2, other) = open_vault();
    other
        .import_account(
            &path,
            &export_key,
            ImportAccountRequest {
                import_privkeys: false,
            },
        )
        .unwrap();

    // Identical key material derives identical output scripts, so both
    // vaults watch the same addresses.
    let ours = vault
        .signing_script_views("shared", DEFAULT_BIN_NAME, ScriptStatus::ALL_FLAGS)
        .unwrap();
    let theirs = other
        .signing_script_views("shared", DEFAULT_BIN_NAME, ScriptStatus::ALL_FLAGS)
        .unwrap();
    let our_scripts: Vec<&Vec<u8>> = ours.iter().map(|v| &v.txout_script).collect();
    let their_scripts: Vec<&Vec<u8>> = theirs.iter().map(|v| &v.txout_script).collect();
    for script in &our_scripts {
        assert!(their_scripts.contains(script));
    }
}

// ── Bloom filter material ───────────────────────────────────────────────

#[test]
fn bloom_filter_covers_signing_scripts() {
    let (_dir, vault) = open_vault();

    // No scripts yet: the filter is empty.
    assert!(vault.bloom_filter(0.001, 0, 0).unwrap().is_empty());

    setup_account(&vault, "acct", &["alice"], 1);
    let script = vault.issue_script("acct", DEFAULT_BIN_NAME, "").unwrap();

    let filter = vault.bloom_filter(0.001, 0, 0).unwrap();
    assert!(!filter.is_empty());
    // The P2SH payee element of an issued script is matched.
    let payee = vault_script::payee_element(&script.txout_script).unwrap();
    assert!(filter.contains(&payee));
}
