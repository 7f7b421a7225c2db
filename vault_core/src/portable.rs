//! Portable keychain and account files.
//!
//! Versioned JSON documents with hex-encoded byte fields. Chain codes and
//! private keys are ciphertext-only; account export re-encrypts chain codes
//! under a caller-supplied lock key so the file is self-contained. Content
//! hashes carried in the file are the canonical identity on re-import.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use vault_store::{BinRecord, KeychainRecord};
use vault_types::Hash160;

use crate::error::VaultError;

pub(crate) const PORTABLE_VERSION: u32 = 1;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PortableKeychain {
    pub name: String,
    /// Hex-encoded content hash.
    pub hash: String,
    pub depth: u32,
    pub derivation_index: u32,
    /// Hex-encoded compressed public key.
    pub pubkey: String,
    pub chain_code_ciphertext: String,
    pub chain_code_salt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privkey_ciphertext: Option<String>,
    #[serde(default)]
    pub privkey_salt: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KeychainFile {
    pub version: u32,
    pub keychain: PortableKeychain,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PortableBin {
    pub name: String,
    pub index: u32,
    pub next_script_index: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PortableAccount {
    pub name: String,
    /// Hex-encoded content hash.
    pub hash: String,
    pub min_sigs: u32,
    pub unused_pool_size: u32,
    pub time_created: u32,
    pub keychains: Vec<PortableKeychain>,
    pub bins: Vec<PortableBin>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccountFile {
    pub version: u32,
    pub account: PortableAccount,
}

pub(crate) fn portable_keychain(keychain: &KeychainRecord) -> PortableKeychain {
    PortableKeychain {
        name: keychain.name.clone(),
        hash: hex_encode(keychain.hash.as_bytes()),
        depth: keychain.depth,
        derivation_index: keychain.derivation_index,
        pubkey: hex_encode(&keychain.pubkey),
        chain_code_ciphertext: hex_encode(&keychain.chain_code_ciphertext),
        chain_code_salt: hex_encode(&keychain.chain_code_salt),
        privkey_ciphertext: keychain
            .privkey_ciphertext
            .as_deref()
            .map(hex_encode),
        privkey_salt: hex_encode(&keychain.privkey_salt),
    }
}

pub(crate) fn keychain_from_portable(
    portable: &PortableKeychain,
) -> Result<KeychainRecord, VaultError> {
    let hash_bytes = hex_decode(&portable.hash)?;
    let hash = Hash160::from_slice(&hash_bytes)
        .ok_or_else(|| VaultError::FileFormat("keychain hash must be 20 bytes".into()))?;
    Ok(KeychainRecord {
        id: 0,
        name: portable.name.clone(),
        hash,
        depth: portable.depth,
        parent: None,
        derivation_index: portable.derivation_index,
        pubkey: hex_decode(&portable.pubkey)?,
        chain_code_ciphertext: hex_decode(&portable.chain_code_ciphertext)?,
        chain_code_salt: hex_decode(&portable.chain_code_salt)?,
        privkey_ciphertext: portable
            .privkey_ciphertext
            .as_deref()
            .map(hex_decode)
            .transpose()?,
        privkey_salt: hex_decode(&portable.privkey_salt)?,
    })
}

pub(crate) fn portable_bin(bin: &BinRecord) -> PortableBin {
    PortableBin {
        name: bin.name.clone(),
        index: bin.index,
        next_script_index: bin.next_script_index,
    }
}

pub(crate) fn save_keychain_file(path: &Path, keychain: &KeychainRecord) -> Result<(), VaultError> {
    let file = KeychainFile {
        version: PORTABLE_VERSION,
        keychain: portable_keychain(keychain),
    };
    let json = serde_json::to_string_pretty(&file)
        .map_err(|e| VaultError::FileFormat(format!("serialization failed: {e}")))?;
    fs::write(path, json)?;
    Ok(())
}

pub(crate) fn load_keychain_file(path: &Path) -> Result<KeychainRecord, VaultError> {
    let json = fs::read_to_string(path)?;
    let file: KeychainFile =
        serde_json::from_str(&json).map_err(|e| VaultError::FileFormat(format!("invalid keychain file: {e}")))?;
    check_version(file.version)?;
    keychain_from_portable(&file.keychain)
}

pub(crate) fn save_account_file(path: &Path, account: &PortableAccount) -> Result<(), VaultError> {
    let file = AccountFile {
        version: PORTABLE_VERSION,
        account: account.clone(),
    };
    let json = serde_json::to_string_pretty(&file)
        .map_err(|e| VaultError::FileFormat(format!("serialization failed: {e}")))?;
    fs::write(path, json)?;
    Ok(())
}

pub(crate) fn load_account_file(path: &Path) -> Result<PortableAccount, VaultError> {
    let json = fs::read_to_string(path)?;
    let file: AccountFile =
        serde_json::from_str(&json).map_err(|e| VaultError::FileFormat(format!("invalid account file: {e}")))?;
    check_version(file.version)?;
    Ok(file.account)
}

fn check_version(version: u32) -> Result<(), VaultError> {
    if version != PORTABLE_VERSION {
        return Err(VaultError::FileFormat(format!(
            "unsupported file version: {version}"
        )));
    }
    Ok(())
}

pub(crate) fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

pub(crate) fn hex_decode(s: &str) -> Result<Vec<u8>, VaultError> {
    if s.len() % 2 != 0 {
        return Err(VaultError::FileFormat("odd-length hex string".into()));
    }
    (0..s.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&s[i..i + 2], 16)
                .map_err(|e| VaultError::FileFormat(format!("invalid hex at position {i}: {e}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> KeychainRecord {
        KeychainRecord {
            id: 9,
            name: "alice".into(),
            hash: Hash160::new([0xaa; 20]),
            depth: 0,
            parent: None,
            derivation_index: 0,
            pubkey: vec![0x02; 33],
            chain_code_ciphertext: vec![1, 2, 3, 4],
            chain_code_salt: vec![5, 6],
            privkey_ciphertext: Some(vec![7, 8, 9]),
            privkey_salt: vec![10],
        }
    }

    #[test]
    fn keychain_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alice.keychain");
        let record = sample_record();
        save_keychain_file(&path, &record).unwrap();
        let loaded = load_keychain_file(&path).unwrap();

        // Ids are storage-local and not part of the portable form.
        assert_eq!(loaded.id, 0);
        assert_eq!(loaded.name, record.name);
        assert_eq!(loaded.hash, record.hash);
        assert_eq!(loaded.pubkey, record.pubkey);
        assert_eq!(loaded.chain_code_ciphertext, record.chain_code_ciphertext);
        assert_eq!(loaded.privkey_ciphertext, record.privkey_ciphertext);
    }

    #[test]
    fn watch_only_file_omits_private_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watch.keychain");
        let mut record = sample_record();
        record.clear_privkey();
        save_keychain_file(&path, &record).unwrap();

        let json = std::fs::read_to_string(&path).unwrap();
        assert!(!json.contains("privkey_ciphertext"));
        let loaded = load_keychain_file(&path).unwrap();
        assert!(!loaded.is_private());
    }

    #[test]
    fn version_mismatch_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.keychain");
        let mut file = KeychainFile {
            version: PORTABLE_VERSION,
            keychain: portable_keychain(&sample_record()),
        };
        file.version = 99;
        std::fs::write(&path, serde_json::to_string(&file).unwrap()).unwrap();
        assert!(matches!(
            load_keychain_file(&path),
            Err(VaultError::FileFormat(_))
        ));
    }

    #[test]
    fn hex_roundtrip() {
        let bytes = vec![0x00, 0x0f, 0xf0, 0xff];
        assert_eq!(hex_decode(&hex_encode(&bytes)).unwrap(), bytes);
        assert!(hex_decode("abc").is_err());
        assert!(hex_decode("zz").is_err());
    }
}
