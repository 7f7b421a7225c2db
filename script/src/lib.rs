//! Script handling for multisignature accounts.
//!
//! The vault spends and receives through m-of-n multisig locked behind
//! pay-to-script-hash. This crate builds the redeem script and output script
//! for a set of public keys, emits the input script in its three forms
//! (signing preimage, partially-signed persistence, final broadcast), merges
//! signature sets from independently signed copies, and classifies output
//! scripts down to their payee element.

pub mod classify;
pub mod multisig;
pub mod opcodes;
mod parse;

pub use classify::{classify_output, payee_element, OutputClass};
pub use multisig::{InputScriptMode, MultisigTemplate};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("truncated script at byte {0}")]
    Truncated(usize),

    #[error("not a multisig input script")]
    NotMultisigInput,

    #[error("not a multisig redeem script")]
    NotMultisigRedeem,

    #[error("invalid signature threshold {required} of {total}")]
    InvalidThreshold { required: usize, total: usize },

    #[error("unknown public key for signature")]
    UnknownPubkey,
}
