//! # Vaults Module
//!
//! Token release vault logic.
//!
//! ## Components
//!
//! - **State**: fixed-width codec for the state carried in the vault's NFT commitment
//! - **Schedule**: halving release arithmetic mirrored from the release covenant
//! - **Selection**: UTXO shape checks for each operation
//! - **Operations**: the mint, lock, release, send and status flows

pub mod operations;
pub mod schedule;
pub mod selection;
pub mod state;

#[cfg(test)]
mod tests;

pub use operations::{MintParams, OperationReceipt, TokenVault, VaultStatus};
pub use schedule::{compute_release, Release};
pub use state::{decode_commitment, decode_u64_le, encode_commitment, encode_u64_le, VaultState};
