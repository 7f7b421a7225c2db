//! Cryptography for the vault.
//!
//! ECDSA over secp256k1, the hash primitives the wire formats and content
//! hashes need, BIP32-style child key derivation, and the PBKDF2 +
//! AES-256-GCM scheme that encrypts chain codes and master private keys at
//! rest.

pub mod cipher;
pub mod ecdsa;
pub mod error;
pub mod hash;
pub mod hd;

pub use cipher::{decrypt_secret, encrypt_secret};
pub use ecdsa::{pubkey_from_privkey, sign_hash, verify_hash};
pub use error::CryptoError;
pub use hash::{hash160, hmac_sha512, sha256, sha256d};
pub use hd::{derive_child_privkey, derive_child_pubkey, master_from_entropy};
