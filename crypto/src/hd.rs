//! Hierarchical child key derivation.
//!
//! Non-hardened BIP32-style derivation: `I = HMAC-SHA512(chain_code,
//! compressed_parent_pubkey || index_be)`, left half tweaks the key, right
//! half becomes the child chain code. Keeping derivation non-hardened lets
//! watch-only holders of a public key + chain code derive the same child
//! public keys the private holder derives.

use secp256k1::{PublicKey, Scalar, SecretKey};

use crate::ecdsa::secp;
use crate::error::CryptoError;
use crate::hash::hmac_sha512;

/// Derive a master private key and chain code from entropy.
pub fn master_from_entropy(entropy: &[u8]) -> Result<([u8; 32], [u8; 32]), CryptoError> {
    let i = hmac_sha512(b"Bitcoin seed", entropy);
    let (il, ir) = split_i(&i);
    // Reject the (astronomically unlikely) zero / out-of-range scalar.
    SecretKey::from_slice(&il).map_err(|_| CryptoError::InvalidPrivateKey)?;
    Ok((il, ir))
}

/// Derive the child public key and chain code at `index` from a parent
/// public key and chain code. No private material required.
pub fn derive_child_pubkey(
    parent_pubkey: &[u8],
    chain_code: &[u8; 32],
    index: u32,
) -> Result<(Vec<u8>, [u8; 32]), CryptoError> {
    let parent = PublicKey::from_slice(parent_pubkey).map_err(|_| CryptoError::InvalidPublicKey)?;
    let i = hmac_sha512(chain_code, &derivation_data(&parent.serialize(), index));
    let (il, ir) = split_i(&i);

    let tweak =
        Scalar::from_be_bytes(il).map_err(|_| CryptoError::DerivationOverflow(index))?;
    let child = parent
        .add_exp_tweak(secp(), &tweak)
        .map_err(|_| CryptoError::DerivationOverflow(index))?;
    Ok((child.serialize().to_vec(), ir))
}

/// Derive the child private key and chain code at `index` from a parent
/// private key and chain code. Mirrors [`derive_child_pubkey`]: the derived
/// private key's public point equals the publicly derived child key.
pub fn derive_child_privkey(
    parent_privkey: &[u8; 32],
    chain_code: &[u8; 32],
    index: u32,
) -> Result<([u8; 32], [u8; 32]), CryptoError> {
    let parent = SecretKey::from_slice(parent_privkey).map_err(|_| CryptoError::InvalidPrivateKey)?;
    let parent_pub = PublicKey::from_secret_key(secp(), &parent);
    let i = hmac_sha512(chain_code, &derivation_data(&parent_pub.serialize(), index));
    let (il, ir) = split_i(&i);

    let tweak =
        Scalar::from_be_bytes(il).map_err(|_| CryptoError::DerivationOverflow(index))?;
    let child = parent
        .add_tweak(&tweak)
        .map_err(|_| CryptoError::DerivationOverflow(index))?;
    Ok((child.secret_bytes(), ir))
}

fn derivation_data(compressed_pubkey: &[u8; 33], index: u32) -> [u8; 37] {
    let mut data = [0u8; 37];
    data[..33].copy_from_slice(compressed_pubkey);
    data[33..].copy_from_slice(&index.to_be_bytes());
    data
}

fn split_i(i: &[u8; 64]) -> ([u8; 32], [u8; 32]) {
    let mut il = [0u8; 32];
    let mut ir = [0u8; 32];
    il.copy_from_slice(&i[..32]);
    ir.copy_from_slice(&i[32..]);
    (il, ir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecdsa::pubkey_from_privkey;

    #[test]
    fn public_and_private_derivation_agree() {
        let (master_priv, master_cc) = master_from_entropy(b"test entropy 0123456789").unwrap();
        let master_pub = pubkey_from_privkey(&master_priv).unwrap();

        for index in [0u32, 1, 7, 1000] {
            let (child_pub, cc_pub) =
                derive_child_pubkey(&master_pub, &master_cc, index).unwrap();
            let (child_priv, cc_priv) =
                derive_child_privkey(&master_priv, &master_cc, index).unwrap();
            assert_eq!(cc_pub, cc_priv);
            assert_eq!(pubkey_from_privkey(&child_priv).unwrap(), child_pub);
        }
    }

    #[test]
    fn two_level_derivation_agrees() {
        let (master_priv, master_cc) = master_from_entropy(b"another seed").unwrap();
        let master_pub = pubkey_from_privkey(&master_priv).unwrap();

        let (bin_pub, bin_cc) = derive_child_pubkey(&master_pub, &master_cc, 1).unwrap();
        let (script_pub, _) = derive_child_pubkey(&bin_pub, &bin_cc, 5).unwrap();

        let (bin_priv, bin_cc_p) = derive_child_privkey(&master_priv, &master_cc, 1).unwrap();
        let (script_priv, _) = derive_child_privkey(&bin_priv, &bin_cc_p, 5).unwrap();

        assert_eq!(pubkey_from_privkey(&script_priv).unwrap(), script_pub);
    }

    #[test]
    fn different_entropy_different_master() {
        let a = master_from_entropy(b"entropy-a").unwrap();
        let b = master_from_entropy(b"entropy-b").unwrap();
        assert_ne!(a.0, b.0);
        assert_ne!(a.1, b.1);
    }
}
