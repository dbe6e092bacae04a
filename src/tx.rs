//! Settlement transaction assembly.
//!
//! The transaction is a pure function of the revealed component list and
//! the session hash: replaying the same components always yields the same
//! unsigned transaction, so every participant independently assembles an
//! identical one and signs only their own inputs.

use crate::error::FusionError;
use crate::message::{Component, ComponentPayload};
use crate::types::{push_prefixed, sha256};
use serde::{Deserialize, Serialize};

pub const TX_VERSION: u32 = 1;
pub const TX_LOCK_TIME: u32 = 0;
pub const SEQUENCE_FINAL: u32 = 0xffff_ffff;

/// ALL | FORKID.
pub const SIGHASH_ALL: u32 = 0x41;

/// Marker pushed after OP_RETURN: "FUZ\0".
const OP_RETURN_TAG: [u8; 4] = [0x46, 0x55, 0x5a, 0x00];

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TxInput {
    pub prev_txid: [u8; 32],
    pub prev_index: u32,
    /// Key that owns the spent output; whoever holds it signs this input.
    pub pubkey: Vec<u8>,
    /// Empty until the owner's signature is attached.
    pub script_sig: Vec<u8>,
    pub sequence: u32,
    pub amount: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TxOutput {
    pub value: u64,
    pub script_pubkey: Vec<u8>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub lock_time: u32,
}

/// The unspendable protocol-marker script: OP_RETURN, tag, session hash.
pub fn op_return_script(session_hash: &[u8; 32]) -> Vec<u8> {
    let mut script = Vec::with_capacity(2 + OP_RETURN_TAG.len() + 1 + 32);
    script.push(0x6a);
    script.push(OP_RETURN_TAG.len() as u8);
    script.extend_from_slice(&OP_RETURN_TAG);
    script.push(32);
    script.extend_from_slice(session_hash);
    script
}

/// Assemble the settlement transaction from the revealed component list.
///
/// Components are replayed in the order the server shared them: one input
/// per Input component, one output per Output component, blanks skipped.
/// The leading zero-value output carries the session hash.
pub fn construct_transaction(
    components: &[Vec<u8>],
    session_hash: &[u8; 32],
) -> Result<Transaction, FusionError> {
    let mut tx = Transaction {
        version: TX_VERSION,
        inputs: Vec::new(),
        outputs: vec![TxOutput {
            value: 0,
            script_pubkey: op_return_script(session_hash),
        }],
        lock_time: TX_LOCK_TIME,
    };

    for comp_ser in components {
        match Component::deserialize(comp_ser)?.payload {
            ComponentPayload::Input {
                prev_txid,
                prev_index,
                pubkey,
                amount,
            } => tx.inputs.push(TxInput {
                prev_txid,
                prev_index,
                pubkey,
                script_sig: Vec::new(),
                sequence: SEQUENCE_FINAL,
                amount,
            }),
            ComponentPayload::Output {
                scriptpubkey,
                amount,
            } => tx.outputs.push(TxOutput {
                value: amount,
                script_pubkey: scriptpubkey,
            }),
            ComponentPayload::Blank => {}
        }
    }

    Ok(tx)
}

impl Transaction {
    /// Signature digest for one input, committing to every outpoint and
    /// output plus the spent script, amount, and sighash flags.
    pub fn sighash(
        &self,
        input_index: usize,
        script_pubkey: &[u8],
        amount: u64,
        sighash_flags: u32,
    ) -> [u8; 32] {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"CashFusion sighash");
        buf.extend_from_slice(&self.version.to_be_bytes());

        buf.extend_from_slice(&(self.inputs.len() as u32).to_be_bytes());
        for input in &self.inputs {
            buf.extend_from_slice(&input.prev_txid);
            buf.extend_from_slice(&input.prev_index.to_be_bytes());
            buf.extend_from_slice(&input.amount.to_be_bytes());
            buf.extend_from_slice(&input.sequence.to_be_bytes());
        }

        buf.extend_from_slice(&(input_index as u32).to_be_bytes());
        push_prefixed(&mut buf, script_pubkey);
        buf.extend_from_slice(&amount.to_be_bytes());

        buf.extend_from_slice(&(self.outputs.len() as u32).to_be_bytes());
        for output in &self.outputs {
            buf.extend_from_slice(&output.value.to_be_bytes());
            push_prefixed(&mut buf, &output.script_pubkey);
        }

        buf.extend_from_slice(&self.lock_time.to_be_bytes());
        buf.extend_from_slice(&sighash_flags.to_be_bytes());
        sha256(&sha256(&buf))
    }

    pub fn txid(&self) -> [u8; 32] {
        sha256(&sha256(
            &bincode::serialize(self).expect("Serialization failed"),
        ))
    }

    /// Total input value minus total output value.
    pub fn fee(&self) -> u64 {
        let in_sum: u64 = self.inputs.iter().map(|i| i.amount).sum();
        let out_sum: u64 = self.outputs.iter().map(|o| o.value).sum();
        in_sum.saturating_sub(out_sum)
    }
}
