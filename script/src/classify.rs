//! Output script classification.

use crate::opcodes::{OP_CHECKSIG, OP_DUP, OP_EQUAL, OP_EQUALVERIFY, OP_HASH160};
use crate::parse::{tokenize, Item};

/// The payee a standard output script pays to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputClass {
    /// `OP_HASH160 <20 bytes> OP_EQUAL`
    ScriptHash([u8; 20]),
    /// `OP_DUP OP_HASH160 <20 bytes> OP_EQUALVERIFY OP_CHECKSIG`
    PubkeyHash([u8; 20]),
    /// `<pubkey> OP_CHECKSIG`
    Pubkey(Vec<u8>),
    NonStandard,
}

pub fn classify_output(script: &[u8]) -> OutputClass {
    let Ok(items) = tokenize(script) else {
        return OutputClass::NonStandard;
    };
    match items.as_slice() {
        [Item::Op(OP_HASH160), Item::Push(hash), Item::Op(OP_EQUAL)] if hash.len() == 20 => {
            OutputClass::ScriptHash(hash.as_slice().try_into().unwrap())
        }
        [Item::Op(OP_DUP), Item::Op(OP_HASH160), Item::Push(hash), Item::Op(OP_EQUALVERIFY), Item::Op(OP_CHECKSIG)]
            if hash.len() == 20 =>
        {
            OutputClass::PubkeyHash(hash.as_slice().try_into().unwrap())
        }
        [Item::Push(key), Item::Op(OP_CHECKSIG)] if key.len() == 33 || key.len() == 65 => {
            OutputClass::Pubkey(key.clone())
        }
        _ => OutputClass::NonStandard,
    }
}

/// The element identifying the payee: the script hash, pubkey hash or
/// pubkey. This is what goes into bloom filters.
pub fn payee_element(script: &[u8]) -> Option<Vec<u8>> {
    match classify_output(script) {
        OutputClass::ScriptHash(hash) | OutputClass::PubkeyHash(hash) => Some(hash.to_vec()),
        OutputClass::Pubkey(key) => Some(key),
        OutputClass::NonStandard => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multisig::MultisigTemplate;

    #[test]
    fn classifies_own_output_scripts() {
        let keys = (0..2u8)
            .map(|i| {
                let mut k = vec![0x02; 33];
                k[32] = i;
                k
            })
            .collect();
        let template = MultisigTemplate::new(2, keys).unwrap();
        let script = template.output_script();
        assert!(matches!(classify_output(&script), OutputClass::ScriptHash(_)));
        assert_eq!(payee_element(&script).unwrap().len(), 20);
    }

    #[test]
    fn classifies_pubkey_hash() {
        let mut script = vec![OP_DUP, OP_HASH160, 20];
        script.extend_from_slice(&[0xab; 20]);
        script.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIG]);
        assert_eq!(
            classify_output(&script),
            OutputClass::PubkeyHash([0xab; 20])
        );
    }

    #[test]
    fn garbage_is_nonstandard() {
        assert_eq!(classify_output(&[0xff, 0xfe]), OutputClass::NonStandard);
        assert_eq!(payee_element(&[0xff, 0xfe]), None);
        assert_eq!(classify_output(&[]), OutputClass::NonStandard);
    }
}
