//! Encryption at rest for chain codes and master private keys.
//!
//! A lock key (caller-chosen secret) and a per-keychain salt run through
//! PBKDF2-HMAC-SHA256 to produce the AES-256-GCM key; the ciphertext layout
//! is `nonce(12) || aead_ciphertext`. GCM authentication doubles as the
//! wrong-key check used by the unlock operations.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;

use vault_types::SecretBytes;

use crate::error::CryptoError;

/// PBKDF2 rounds. Unlock attempts run on every pool refill, so the count
/// favors interactivity over brute-force margin; the lock key itself is
/// expected to be high-entropy.
const PBKDF2_ROUNDS: u32 = 4096;

const NONCE_LEN: usize = 12;

/// Encrypt a secret under a lock key + salt.
pub fn encrypt_secret(
    plaintext: &[u8],
    lock_key: &SecretBytes,
    salt: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = cipher_for(lock_key, salt)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CryptoError::Cipher("encryption failed".into()))?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt a secret; fails when the lock key or salt is wrong or the
/// ciphertext was tampered with.
pub fn decrypt_secret(
    ciphertext: &[u8],
    lock_key: &SecretBytes,
    salt: &[u8],
) -> Result<SecretBytes, CryptoError> {
    if ciphertext.len() < NONCE_LEN {
        return Err(CryptoError::Cipher("ciphertext too short".into()));
    }
    let cipher = cipher_for(lock_key, salt)?;
    let nonce = Nonce::from_slice(&ciphertext[..NONCE_LEN]);
    let plaintext = cipher
        .decrypt(nonce, &ciphertext[NONCE_LEN..])
        .map_err(|_| CryptoError::Cipher("authentication failed".into()))?;
    Ok(SecretBytes::new(plaintext))
}

fn cipher_for(lock_key: &SecretBytes, salt: &[u8]) -> Result<Aes256Gcm, CryptoError> {
    let mut key = [0u8; 32];
    pbkdf2_hmac::<Sha256>(lock_key.as_slice(), salt, PBKDF2_ROUNDS, &mut key);
    Aes256Gcm::new_from_slice(&key).map_err(|_| CryptoError::Cipher("key init failed".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let secret = b"a 32-byte chain code goes here!!";
        let key = SecretBytes::from("lock-key");
        let encrypted = encrypt_secret(secret, &key, b"salt-1").unwrap();
        let decrypted = decrypt_secret(&encrypted, &key, b"salt-1").unwrap();
        assert_eq!(decrypted.as_slice(), secret);
    }

    #[test]
    fn wrong_key_fails() {
        let key = SecretBytes::from("correct");
        let encrypted = encrypt_secret(b"payload", &key, b"salt").unwrap();
        assert!(decrypt_secret(&encrypted, &SecretBytes::from("wrong"), b"salt").is_err());
    }

    #[test]
    fn wrong_salt_fails() {
        let key = SecretBytes::from("key");
        let encrypted = encrypt_secret(b"payload", &key, b"salt-a").unwrap();
        assert!(decrypt_secret(&encrypted, &key, b"salt-b").is_err());
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let key = SecretBytes::from("key");
        let mut encrypted = encrypt_secret(b"payload", &key, b"salt").unwrap();
        let last = encrypted.len() - 1;
        encrypted[last] ^= 0xff;
        assert!(decrypt_secret(&encrypted, &key, b"salt").is_err());
    }

    #[test]
    fn fresh_nonce_per_encryption() {
        let key = SecretBytes::from("key");
        let a = encrypt_secret(b"payload", &key, b"salt").unwrap();
        let b = encrypt_secret(b"payload", &key, b"salt").unwrap();
        assert_ne!(a, b);
    }
}
