//! CashTokens output prefix.
//!
//! Token data is carried in front of an output's locking bytecode:
//!
//! ```text
//! PREFIX_TOKEN | category (32, internal order) | bitfield | [commitment] | [amount]
//! ```
//!
//! Both the commitment length and the amount are compact-size integers.

use crate::error::{VaultError, VaultResult};
use crate::utxo::TokenData;
use bitcoin::{
    consensus::encode::{serialize, VarInt},
    hashes::Hash,
    Txid,
};
use std::str::FromStr;

pub const PREFIX_TOKEN: u8 = 0xef;

const HAS_AMOUNT: u8 = 0x10;
const HAS_NFT: u8 = 0x20;
const HAS_COMMITMENT_LENGTH: u8 = 0x40;

/// Upper bound the ledger accepts for fungible amounts
pub const MAX_TOKEN_AMOUNT: u64 = i64::MAX as u64;

/// Largest commitment the ledger accepts
pub const MAX_COMMITMENT_LEN: usize = 40;

/// Serialize the token prefix for `token`
pub fn encode_token_prefix(token: &TokenData) -> VaultResult<Vec<u8>> {
    let category = Txid::from_str(&token.category).map_err(|e| {
        VaultError::transaction(format!("invalid token category {}: {}", token.category, e))
    })?;
    if token.amount > MAX_TOKEN_AMOUNT {
        return Err(VaultError::transaction(format!(
            "token amount {} exceeds the maximum of {}",
            token.amount, MAX_TOKEN_AMOUNT
        )));
    }
    if token.amount == 0 && token.nft.is_none() {
        return Err(VaultError::transaction(
            "a token output needs a fungible amount, an NFT, or both",
        ));
    }

    let mut bitfield = 0u8;
    let mut commitment = Vec::new();
    if let Some(nft) = &token.nft {
        bitfield |= HAS_NFT | nft.capability.bits();
        commitment = hex::decode(&nft.commitment).map_err(|e| {
            VaultError::transaction(format!("invalid NFT commitment {:?}: {}", nft.commitment, e))
        })?;
        if commitment.len() > MAX_COMMITMENT_LEN {
            return Err(VaultError::transaction(format!(
                "NFT commitment of {} bytes exceeds {} bytes",
                commitment.len(),
                MAX_COMMITMENT_LEN
            )));
        }
        if !commitment.is_empty() {
            bitfield |= HAS_COMMITMENT_LENGTH;
        }
    }
    if token.amount > 0 {
        bitfield |= HAS_AMOUNT;
    }

    let mut prefix = Vec::with_capacity(1 + 32 + 1 + 1 + commitment.len() + 9);
    prefix.push(PREFIX_TOKEN);
    prefix.extend_from_slice(category.as_byte_array());
    prefix.push(bitfield);
    if !commitment.is_empty() {
        prefix.extend(serialize(&VarInt(commitment.len() as u64)));
        prefix.extend(commitment);
    }
    if token.amount > 0 {
        prefix.extend(serialize(&VarInt(token.amount)));
    }
    Ok(prefix)
}

/// Locking bytecode with the token prefix (if any) in front
pub fn prefixed_locking_bytecode(
    token: Option<&TokenData>,
    locking_bytecode: &[u8],
) -> VaultResult<Vec<u8>> {
    let mut script = match token {
        Some(token) => encode_token_prefix(token)?,
        None => Vec::new(),
    };
    script.extend_from_slice(locking_bytecode);
    Ok(script)
}
