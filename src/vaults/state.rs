//! # Vault State Commitment
//!
//! The release schedule lives on chain as the 24-byte commitment of an
//! immutable NFT held by the release covenant:
//!
//! ```text
//! ┌──────────────────┬──────────────────┬──────────────────┐
//! │  release height  │  halving height  │      reward      │
//! │   u64 LE (8 B)   │   u64 LE (8 B)   │   u64 LE (8 B)   │
//! └──────────────────┴──────────────────┴──────────────────┘
//! ```
//!
//! The covenant reads the same bytes, so the layout here is fixed.

use crate::error::{VaultError, VaultResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Hex characters in one encoded field
pub const FIELD_HEX_LEN: usize = 16;

/// Hex characters in a full commitment
pub const COMMITMENT_HEX_LEN: usize = FIELD_HEX_LEN * 3;

/// Decoded fields at or above this value are rejected
const SIGN_BIT: u64 = 1 << 63;

/// Encode an integer as 8 little-endian bytes in hex (16 characters).
///
/// Accepts any integer type; negative values and values above `u64::MAX` fail.
pub fn encode_u64_le<T>(value: T) -> VaultResult<String>
where
    T: TryInto<u64> + Copy + fmt::Display,
{
    let value: u64 = value.try_into().map_err(|_| {
        VaultError::encoding(format!(
            "{} is outside the unsigned 64-bit range [0, {}]",
            value,
            u64::MAX
        ))
    })?;
    Ok(hex::encode(value.to_le_bytes()))
}

/// Decode `0x`-prefixed little-endian hex into an integer.
///
/// Values with the top bit set are rejected so a field can never be read back
/// as a negative script number.
pub fn decode_u64_le(hex_with_prefix: &str) -> VaultResult<u64> {
    let hex_le = hex_with_prefix.strip_prefix("0x").ok_or_else(|| {
        VaultError::encoding(format!(
            "expected a 0x-prefixed hex string, got {:?}",
            hex_with_prefix
        ))
    })?;
    if hex_le.len() != FIELD_HEX_LEN {
        return Err(VaultError::encoding(format!(
            "expected an eight byte value ({} hex characters), got {} characters",
            FIELD_HEX_LEN,
            hex_le.len()
        )));
    }

    let mut bytes = [0u8; 8];
    hex::decode_to_slice(hex_le, &mut bytes)
        .map_err(|e| VaultError::encoding(format!("invalid hex {:?}: {}", hex_le, e)))?;
    let value = u64::from_le_bytes(bytes);
    if value & SIGN_BIT != 0 {
        return Err(VaultError::encoding(format!(
            "value 0x{} has bit 63 set and would be read as negative",
            hex_le
        )));
    }
    Ok(value)
}

/// Schedule state of a release vault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultState {
    /// Last height tokens were released up to
    pub release_height: u64,
    /// Height the current reward regime started at
    pub halving_height: u64,
    /// Tokens released per block in the current regime
    pub reward: u64,
}

impl VaultState {
    /// State written when a vault is first funded
    pub fn genesis(start_height: u64, reward: u64) -> Self {
        Self {
            release_height: start_height,
            halving_height: start_height,
            reward,
        }
    }

    pub fn to_commitment(&self) -> String {
        encode_commitment(self)
    }

    pub fn from_commitment(commitment: &str) -> VaultResult<Self> {
        decode_commitment(commitment)
    }

    /// Raw commitment bytes as placed in the token prefix
    pub fn commitment_bytes(&self) -> [u8; 24] {
        let mut bytes = [0u8; 24];
        bytes[0..8].copy_from_slice(&self.release_height.to_le_bytes());
        bytes[8..16].copy_from_slice(&self.halving_height.to_le_bytes());
        bytes[16..24].copy_from_slice(&self.reward.to_le_bytes());
        bytes
    }
}

impl fmt::Display for VaultState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "release height {}, halving height {}, reward {}",
            self.release_height, self.halving_height, self.reward
        )
    }
}

/// Concatenate the three fields in `(release, halving, reward)` order
pub fn encode_commitment(state: &VaultState) -> String {
    hex::encode(state.commitment_bytes())
}

pub fn decode_commitment(commitment: &str) -> VaultResult<VaultState> {
    if commitment.len() != COMMITMENT_HEX_LEN {
        return Err(VaultError::encoding(format!(
            "commitment must be {} hex characters, got {}",
            COMMITMENT_HEX_LEN,
            commitment.len()
        )));
    }
    let field = |index: usize| {
        let start = index * FIELD_HEX_LEN;
        let slice = commitment
            .get(start..start + FIELD_HEX_LEN)
            .ok_or_else(|| VaultError::encoding("commitment is not ASCII hex"))?;
        decode_u64_le(&format!("0x{}", slice))
    };

    Ok(VaultState {
        release_height: field(0)?,
        halving_height: field(1)?,
        reward: field(2)?,
    })
}
