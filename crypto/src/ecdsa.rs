//! ECDSA signing over secp256k1.

use once_cell::sync::Lazy;
use secp256k1::ecdsa::Signature;
use secp256k1::{All, Message, PublicKey, Secp256k1, SecretKey};

use crate::error::CryptoError;

static SECP: Lazy<Secp256k1<All>> = Lazy::new(Secp256k1::new);

/// Derive the 33-byte compressed public key for a private scalar.
pub fn pubkey_from_privkey(privkey: &[u8; 32]) -> Result<Vec<u8>, CryptoError> {
    let sk = SecretKey::from_slice(privkey).map_err(|_| CryptoError::InvalidPrivateKey)?;
    Ok(PublicKey::from_secret_key(&SECP, &sk).serialize().to_vec())
}

/// Produce a DER-encoded ECDSA signature over a 32-byte digest.
pub fn sign_hash(privkey: &[u8; 32], digest: &[u8; 32]) -> Result<Vec<u8>, CryptoError> {
    let sk = SecretKey::from_slice(privkey).map_err(|_| CryptoError::InvalidPrivateKey)?;
    let msg = Message::from_digest(*digest);
    Ok(SECP.sign_ecdsa(&msg, &sk).serialize_der().to_vec())
}

/// Verify a DER-encoded ECDSA signature over a 32-byte digest.
pub fn verify_hash(pubkey: &[u8], digest: &[u8; 32], sig_der: &[u8]) -> Result<bool, CryptoError> {
    let pk = PublicKey::from_slice(pubkey).map_err(|_| CryptoError::InvalidPublicKey)?;
    let sig = Signature::from_der(sig_der).map_err(|_| CryptoError::InvalidSignature)?;
    let msg = Message::from_digest(*digest);
    Ok(SECP.verify_ecdsa(&msg, &sig, &pk).is_ok())
}

pub(crate) fn secp() -> &'static Secp256k1<All> {
    &SECP
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify() {
        let privkey = [0x11u8; 32];
        let digest = [0x22u8; 32];
        let pubkey = pubkey_from_privkey(&privkey).unwrap();
        assert_eq!(pubkey.len(), 33);

        let sig = sign_hash(&privkey, &digest).unwrap();
        assert!(verify_hash(&pubkey, &digest, &sig).unwrap());

        let other_digest = [0x23u8; 32];
        assert!(!verify_hash(&pubkey, &other_digest, &sig).unwrap());
    }

    #[test]
    fn signing_is_deterministic() {
        // RFC 6979 nonces: same key + digest, same signature.
        let privkey = [0x42u8; 32];
        let digest = [0x01u8; 32];
        assert_eq!(
            sign_hash(&privkey, &digest).unwrap(),
            sign_hash(&privkey, &digest).unwrap()
        );
    }

    #[test]
    fn zero_privkey_rejected() {
        assert!(pubkey_from_privkey(&[0u8; 32]).is_err());
    }
}
