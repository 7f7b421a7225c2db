//! The m-of-n multisig template behind every signing script.

use vault_crypto::hash160;

use crate::opcodes::{decode_small_num, small_num, OP_0, OP_CHECKMULTISIG, OP_EQUAL, OP_HASH160};
use crate::parse::{tokenize, write_push, Item};
use crate::ScriptError;

/// Which form of the input script to emit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputScriptMode {
    /// The signature-hash preimage form: a single push of the redeem script.
    Sign,
    /// Partially-signed persistence form: a placeholder per unsigned slot so
    /// signatures stay attributed to their public keys across merges.
    Edit,
    /// Final form: only the collected signatures, threshold met.
    Broadcast,
}

/// An m-of-n multisig script with its (possibly partial) signature set.
///
/// Signatures are kept slot-aligned with the redeem script's public keys.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MultisigTemplate {
    min_sigs: usize,
    pubkeys: Vec<Vec<u8>>,
    sigs: Vec<Option<Vec<u8>>>,
}

impl MultisigTemplate {
    /// Build a fresh unsigned template. Public keys are sorted so the same
    /// key set always yields the same scripts.
    pub fn new(min_sigs: usize, mut pubkeys: Vec<Vec<u8>>) -> Result<Self, ScriptError> {
        if min_sigs == 0 || min_sigs > pubkeys.len() || pubkeys.len() > 16 {
            return Err(ScriptError::InvalidThreshold {
                required: min_sigs,
                total: pubkeys.len(),
            });
        }
        pubkeys.sort();
        let sigs = vec![None; pubkeys.len()];
        Ok(Self {
            min_sigs,
            pubkeys,
            sigs,
        })
    }

    /// Parse an input script in Sign, Edit or Broadcast form.
    pub fn parse_input_script(script: &[u8]) -> Result<Self, ScriptError> {
        let items = tokenize(script)?;

        // Sign form: a single push of the redeem script.
        if let [Item::Push(redeem)] = items.as_slice() {
            return Self::parse_redeem_script(redeem);
        }

        // Edit / Broadcast form: OP_0, signature slots, redeem script push.
        let [Item::Op(OP_0), middle @ .., Item::Push(redeem)] = items.as_slice() else {
            return Err(ScriptError::NotMultisigInput);
        };
        let mut template = Self::parse_redeem_script(redeem)?;

        if middle.len() == template.pubkeys.len() {
            // Edit form: slot-aligned, OP_0 marks a missing signature.
            for (slot, item) in middle.iter().enumerate() {
                match item {
                    Item::Op(OP_0) => {}
                    Item::Push(sig) => template.sigs[slot] = Some(sig.clone()),
                    Item::Op(_) => return Err(ScriptError::NotMultisigInput),
                }
            }
        } else {
            // Broadcast form: attribution is gone, fill slots in order.
            let mut slot = 0;
            for item in middle {
                match item {
                    Item::Push(sig) => {
                        if slot >= template.sigs.len() {
                            return Err(ScriptError::NotMultisigInput);
                        }
                        template.sigs[slot] = Some(sig.clone());
                        slot += 1;
                    }
                    Item::Op(OP_0) => {}
                    Item::Op(_) => return Err(ScriptError::NotMultisigInput),
                }
            }
        }
        Ok(template)
    }

    fn parse_redeem_script(redeem: &[u8]) -> Result<Self, ScriptError> {
        let items = tokenize(redeem)?;
        let [Item::Op(m_op), keys @ .., Item::Op(n_op), Item::Op(OP_CHECKMULTISIG)] =
            items.as_slice()
        else {
            return Err(ScriptError::NotMultisigRedeem);
        };
        let min_sigs = decode_small_num(*m_op).ok_or(ScriptError::NotMultisigRedeem)?;
        let total = decode_small_num(*n_op).ok_or(ScriptError::NotMultisigRedeem)?;
        if keys.len() != total || min_sigs > total {
            return Err(ScriptError::NotMultisigRedeem);
        }
        let mut pubkeys = Vec::with_capacity(total);
        for item in keys {
            let Item::Push(key) = item else {
                return Err(ScriptError::NotMultisigRedeem);
            };
            pubkeys.push(key.clone());
        }
        let sigs = vec![None; pubkeys.len()];
        Ok(Self {
            min_sigs,
            pubkeys,
            sigs,
        })
    }

    pub fn min_sigs(&self) -> usize {
        self.min_sigs
    }

    pub fn pubkeys(&self) -> &[Vec<u8>] {
        &self.pubkeys
    }

    pub fn redeem_script(&self) -> Vec<u8> {
        let mut out = vec![small_num(self.min_sigs)];
        for key in &self.pubkeys {
            write_push(&mut out, key);
        }
        out.push(small_num(self.pubkeys.len()));
        out.push(OP_CHECKMULTISIG);
        out
    }

    /// The pay-to-script-hash output script for this key set.
    pub fn output_script(&self) -> Vec<u8> {
        let hash = hash160(&self.redeem_script());
        let mut out = vec![OP_HASH160];
        write_push(&mut out, &hash);
        out.push(OP_EQUAL);
        out
    }

    /// Emit the input script in the requested form.
    pub fn input_script(&self, mode: InputScriptMode) -> Vec<u8> {
        let mut out = Vec::new();
        match mode {
            InputScriptMode::Sign => {}
            InputScriptMode::Edit => {
                out.push(OP_0);
                for sig in &self.sigs {
                    match sig {
                        Some(sig) => write_push(&mut out, sig),
                        None => out.push(OP_0),
                    }
                }
            }
            InputScriptMode::Broadcast => {
                out.push(OP_0);
                for sig in self.sigs.iter().flatten() {
                    write_push(&mut out, sig);
                }
            }
        }
        write_push(&mut out, &self.redeem_script());
        out
    }

    /// How many more signatures the threshold still needs.
    pub fn sigs_needed(&self) -> usize {
        self.min_sigs.saturating_sub(self.sig_count())
    }

    pub fn sig_count(&self) -> usize {
        self.sigs.iter().flatten().count()
    }

    /// Public keys that have not signed yet.
    pub fn missing_sig_pubkeys(&self) -> Vec<Vec<u8>> {
        self.pubkeys
            .iter()
            .zip(&self.sigs)
            .filter(|(_, sig)| sig.is_none())
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Attach a signature for `pubkey`. Errors when the key is not part of
    /// this script; returns false when the slot was already signed.
    pub fn add_signature(&mut self, pubkey: &[u8], sig: Vec<u8>) -> Result<bool, ScriptError> {
        let slot = self
            .pubkeys
            .iter()
            .position(|k| k == pubkey)
            .ok_or(ScriptError::UnknownPubkey)?;
        if self.sigs[slot].is_some() {
            return Ok(false);
        }
        self.sigs[slot] = Some(sig);
        Ok(true)
    }

    /// Fold the other template's signatures into this one; returns how many
    /// new signatures were added. Key sets must match.
    pub fn merge_signatures(&mut self, other: &Self) -> usize {
        if self.pubkeys != other.pubkeys {
            return 0;
        }
        let mut added = 0;
        for (slot, sig) in other.sigs.iter().enumerate() {
            if let Some(sig) = sig {
                if self.sigs[slot].is_none() {
                    self.sigs[slot] = Some(sig.clone());
                    added += 1;
                }
            }
        }
        added
    }
}
