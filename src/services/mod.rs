//! # Services Module
//!
//! Chain access for the vault operations.
//!
//! ## Components
//!
//! - **ChainProvider**: the narrow interface operations read and write the chain through
//! - **Electrum Client**: Fulcrum JSON-RPC implementation of [`ChainProvider`]

pub mod electrum_client;

pub use electrum_client::ElectrumClient;

use crate::error::VaultResult;
use crate::utxo::Utxo;
use async_trait::async_trait;
use bitcoin::{Script, Transaction};

#[async_trait]
pub trait ChainProvider: Send + Sync {
    /// Current chain tip height
    async fn get_block_height(&self) -> VaultResult<u64>;

    /// Unspent outputs locked by `locking_bytecode`, token data included
    async fn get_utxos(&self, locking_bytecode: &Script) -> VaultResult<Vec<Utxo>>;

    /// Broadcast a finalized transaction and return its txid
    async fn broadcast(&self, transaction: &Transaction) -> VaultResult<String>;
}
