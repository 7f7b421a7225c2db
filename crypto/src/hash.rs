//! Hash primitives: SHA-256, double SHA-256, HASH160, HMAC-SHA-512.

use hmac::{Hmac, Mac};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256, Sha512};

pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

pub fn sha256d(data: &[u8]) -> [u8; 32] {
    Sha256::digest(Sha256::digest(data)).into()
}

/// RIPEMD160(SHA256(data)) — the 20-byte content / payee hash.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    Ripemd160::digest(Sha256::digest(data)).into()
}

pub fn hmac_sha512(key: &[u8], data: &[u8]) -> [u8; 64] {
    let mut mac = Hmac::<Sha512>::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_vector() {
        // SHA-256("abc")
        let digest = sha256(b"abc");
        assert_eq!(
            digest[..4],
            [0xba, 0x78, 0x16, 0xbf],
            "first bytes of SHA-256(\"abc\")"
        );
    }

    #[test]
    fn hash160_length_and_stability() {
        let a = hash160(b"payload");
        let b = hash160(b"payload");
        assert_eq!(a, b);
        assert_ne!(a, hash160(b"payloae"));
    }

    #[test]
    fn hmac_sha512_key_sensitivity() {
        let a = hmac_sha512(b"key-1", b"msg");
        let b = hmac_sha512(b"key-2", b"msg");
        assert_ne!(a[..], b[..]);
    }
}
