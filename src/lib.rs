//! # Token Vault: CashTokens Release Vault Library
//!
//! Off-chain driver for a token vault on Bitcoin Cash. Tokens are locked in a
//! release covenant and paid out over time on a halving schedule; the schedule
//! state lives in the commitment of an NFT held next to the locked tokens.
//!
//! The library encodes that state, computes releases exactly as the covenant
//! checks them, selects the UTXOs each operation spends and sizes fees with a
//! two-pass build.

pub mod config;
pub mod contract;
pub mod error;
pub mod operator;
pub mod services;
pub mod transaction;
pub mod utils;
pub mod utxo;
pub mod vaults;
pub mod wallet;

// Re-export commonly used types
pub use config::VaultConfig;
pub use error::{VaultError, VaultResult};
pub use services::{ChainProvider, ElectrumClient};
pub use utxo::{TokenData, Utxo};
pub use vaults::{TokenVault, VaultState};
pub use wallet::{Identity, WalletKey};
