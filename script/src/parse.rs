//! Minimal script tokenizer: opcodes and pushdata.

use crate::opcodes::{OP_PUSHDATA1, OP_PUSHDATA2, OP_PUSHDATA4};
use crate::ScriptError;

/// One parsed script element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    Op(u8),
    Push(Vec<u8>),
}

/// Tokenize a script into opcodes and pushes.
pub fn tokenize(script: &[u8]) -> Result<Vec<Item>, ScriptError> {
    let mut items = Vec::new();
    let mut pos = 0usize;
    while pos < script.len() {
        let op = script[pos];
        pos += 1;
        let push_len = match op {
            1..=0x4b => Some(op as usize),
            OP_PUSHDATA1 => {
                let len = *script.get(pos).ok_or(ScriptError::Truncated(pos))? as usize;
                pos += 1;
                Some(len)
            }
            OP_PUSHDATA2 => {
                let bytes = script
                    .get(pos..pos + 2)
                    .ok_or(ScriptError::Truncated(pos))?;
                pos += 2;
                Some(u16::from_le_bytes(bytes.try_into().unwrap()) as usize)
            }
            OP_PUSHDATA4 => {
                let bytes = script
                    .get(pos..pos + 4)
                    .ok_or(ScriptError::Truncated(pos))?;
                pos += 4;
                Some(u32::from_le_bytes(bytes.try_into().unwrap()) as usize)
            }
            _ => None,
        };
        match push_len {
            Some(len) => {
                let data = script
                    .get(pos..pos + len)
                    .ok_or(ScriptError::Truncated(pos))?;
                pos += len;
                items.push(Item::Push(data.to_vec()));
            }
            None => items.push(Item::Op(op)),
        }
    }
    Ok(items)
}

/// Append a minimally encoded data push.
pub fn write_push(out: &mut Vec<u8>, data: &[u8]) {
    match data.len() {
        0..=0x4b => out.push(data.len() as u8),
        0x4c..=0xff => {
            out.push(OP_PUSHDATA1);
            out.push(data.len() as u8);
        }
        0x100..=0xffff => {
            out.push(OP_PUSHDATA2);
            out.extend_from_slice(&(data.len() as u16).to_le_bytes());
        }
        _ => {
            out.push(OP_PUSHDATA4);
            out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        }
    }
    out.extend_from_slice(data);
}
