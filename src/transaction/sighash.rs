//! BCH signature hashing (`SIGHASH_ALL | SIGHASH_FORKID`).
//!
//! The preimage follows the BIP143 layout with the fork id in the hash type.
//! When the spent output carries tokens, its token prefix is inserted right
//! before the script code.

use super::token_prefix::encode_token_prefix;
use crate::error::{VaultError, VaultResult};
use crate::utxo::Utxo;
use bitcoin::{
    consensus::encode::serialize,
    hashes::{sha256d, Hash},
    ScriptBuf, Transaction,
};

pub const SIGHASH_ALL: u32 = 0x01;
pub const SIGHASH_FORKID: u32 = 0x40;

/// Hash type appended to every signature this crate produces
pub const SIGHASH_ALL_FORKID: u32 = SIGHASH_ALL | SIGHASH_FORKID;

/// Digest signed for input `input_index` spending `spent` under `script_code`
pub fn signature_hash(
    tx: &Transaction,
    input_index: usize,
    spent: &Utxo,
    script_code: &ScriptBuf,
) -> VaultResult<[u8; 32]> {
    let input = tx.input.get(input_index).ok_or_else(|| {
        VaultError::transaction(format!(
            "input index {} out of range for {} inputs",
            input_index,
            tx.input.len()
        ))
    })?;

    let mut prevouts = Vec::with_capacity(tx.input.len() * 36);
    let mut sequences = Vec::with_capacity(tx.input.len() * 4);
    for txin in &tx.input {
        prevouts.extend(serialize(&txin.previous_output));
        sequences.extend(serialize(&txin.sequence));
    }
    let mut outputs = Vec::new();
    for txout in &tx.output {
        outputs.extend(serialize(txout));
    }

    let mut preimage = Vec::new();
    preimage.extend(serialize(&tx.version));
    preimage.extend_from_slice(sha256d::Hash::hash(&prevouts).as_byte_array());
    preimage.extend_from_slice(sha256d::Hash::hash(&sequences).as_byte_array());
    preimage.extend(serialize(&input.previous_output));
    if let Some(token) = &spent.token {
        preimage.extend(encode_token_prefix(token)?);
    }
    preimage.extend(serialize(script_code));
    preimage.extend(serialize(&spent.satoshis));
    preimage.extend(serialize(&input.sequence));
    preimage.extend_from_slice(sha256d::Hash::hash(&outputs).as_byte_array());
    preimage.extend(serialize(&tx.lock_time));
    preimage.extend(serialize(&SIGHASH_ALL_FORKID));

    Ok(sha256d::Hash::hash(&preimage).to_byte_array())
}
