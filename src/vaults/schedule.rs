//! # Halving Release Schedule
//!
//! Computes how many tokens a release may take out of the vault and the state
//! the covenant expects to see written back. The release covenant enforces the
//! same arithmetic on chain, so every step below mirrors it exactly:
//!
//! 1. Release `target - release_height + 1` blocks at the current reward.
//! 2. If `target - halving_height + 1 >= halving_length` the release stops at
//!    the halving boundary and the reward halves (never below one).
//! 3. If the release would drain the vault, it takes exactly what is left and
//!    no successor state is written.
//!
//! A single call never spans two reward regimes; the next call continues from
//! the boundary at the halved reward.

use super::state::VaultState;
use crate::error::{VaultError, VaultResult};

/// The reward never halves below this
pub const MINIMUM_REWARD: u64 = 1;

/// Outcome of a release computation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Release {
    /// Tokens paid out to the funding wallet
    pub release_amount: u64,
    /// State to commit in the successor NFT (unused at end of life)
    pub next_state: VaultState,
    /// Vault is drained; no successor token or state outputs
    pub end_of_life: bool,
    /// Release stopped at a halving boundary
    pub halved: bool,
}

impl Release {
    /// Tokens that stay locked after this release
    pub fn remaining(&self, locked_amount: u64) -> u64 {
        locked_amount.saturating_sub(self.release_amount)
    }
}

/// Compute the release up to `target_height` for a vault holding `locked_amount`.
///
/// The caller is responsible for checking `target_height` against the chain tip.
pub fn compute_release(
    prev: &VaultState,
    locked_amount: u64,
    target_height: u64,
    halving_length: u64,
) -> VaultResult<Release> {
    if halving_length == 0 {
        return Err(VaultError::schedule("halving length must be at least one block"));
    }
    if target_height < prev.release_height {
        return Err(VaultError::schedule(format!(
            "target height {} is before the last release height {}",
            target_height, prev.release_height
        )));
    }

    let target = i128::from(target_height);
    let release_height = i128::from(prev.release_height);
    let halving_height = i128::from(prev.halving_height);
    let reward = i128::from(prev.reward);
    let halving_length = i128::from(halving_length);

    let blocks_since_release = target - release_height + 1;
    let mut release_amount = blocks_since_release.checked_mul(reward);
    let mut next_state = VaultState {
        release_height: target_height,
        halving_height: prev.halving_height,
        reward: prev.reward,
    };

    let blocks_since_halving = target - halving_height + 1;
    let halved = blocks_since_halving >= halving_length;
    if halved {
        let boundary = halving_height + halving_length;
        if boundary < release_height {
            return Err(VaultError::schedule(format!(
                "halving boundary {} lies before the last release height {}; vault state has drifted",
                boundary, prev.release_height
            )));
        }
        let boundary_height = u64::try_from(boundary).map_err(|_| {
            VaultError::schedule(format!("halving boundary {} overflows a block height", boundary))
        })?;

        next_state = VaultState {
            release_height: boundary_height,
            halving_height: boundary_height,
            reward: (prev.reward / 2).max(MINIMUM_REWARD),
        };
        release_amount = (boundary - release_height).checked_mul(reward);
    }

    // A product beyond i128 is far beyond any u64 balance
    let locked = i128::from(locked_amount);
    let (release_amount, end_of_life) = match release_amount {
        Some(amount) if locked - amount > 0 => (amount, false),
        _ => (locked, true),
    };

    let release_amount = u64::try_from(release_amount).map_err(|_| {
        VaultError::schedule(format!("release amount {} is out of range", release_amount))
    })?;

    Ok(Release {
        release_amount,
        next_state,
        end_of_life,
        halved,
    })
}
