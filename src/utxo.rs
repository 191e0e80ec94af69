//! Observed unspent outputs and their CashTokens payloads.

use crate::error::{VaultError, VaultResult};
use bitcoin::{OutPoint, Txid};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// NFT capability as reported by the indexer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NftCapability {
    None,
    Mutable,
    Minting,
}

impl NftCapability {
    /// Low nibble of the token prefix bitfield
    pub fn bits(&self) -> u8 {
        match self {
            NftCapability::None => 0x00,
            NftCapability::Mutable => 0x01,
            NftCapability::Minting => 0x02,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftData {
    pub capability: NftCapability,
    /// Commitment bytes, hex encoded
    pub commitment: String,
}

/// Token payload carried by an output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenData {
    /// Fungible amount; zero for pure NFT outputs
    pub amount: u64,
    /// Category id in display (txid) byte order, hex encoded
    pub category: String,
    pub nft: Option<NftData>,
}

impl TokenData {
    pub fn fungible(category: impl Into<String>, amount: u64) -> Self {
        Self {
            amount,
            category: category.into(),
            nft: None,
        }
    }

    /// Zero-amount immutable NFT carrying `commitment`
    pub fn state_nft(category: impl Into<String>, commitment: impl Into<String>) -> Self {
        Self {
            amount: 0,
            category: category.into(),
            nft: Some(NftData {
                capability: NftCapability::None,
                commitment: commitment.into(),
            }),
        }
    }
}

/// An unspent transaction output as observed on chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    pub txid: String,
    pub vout: u32,
    pub satoshis: u64,
    pub token: Option<TokenData>,
}

impl Utxo {
    pub fn outpoint(&self) -> VaultResult<OutPoint> {
        let txid = Txid::from_str(&self.txid)
            .map_err(|e| VaultError::transaction(format!("invalid txid {}: {}", self.txid, e)))?;
        Ok(OutPoint {
            txid,
            vout: self.vout,
        })
    }

    pub fn is_token_free(&self) -> bool {
        self.token.is_none()
    }

    /// Carries a fungible amount and no NFT
    pub fn is_fungible_only(&self) -> bool {
        matches!(&self.token, Some(token) if token.amount > 0 && token.nft.is_none())
    }

    pub fn nft(&self) -> Option<&NftData> {
        self.token.as_ref().and_then(|token| token.nft.as_ref())
    }

    pub fn token_amount(&self) -> u64 {
        self.token.as_ref().map(|token| token.amount).unwrap_or(0)
    }
}

impl fmt::Display for Utxo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} ({} sats", self.txid, self.vout, self.satoshis)?;
        if let Some(token) = &self.token {
            write!(f, ", {} tokens of {}", token.amount, token.category)?;
            if let Some(nft) = &token.nft {
                write!(f, ", nft {:?} [{}]", nft.capability, nft.commitment)?;
            }
        }
        write!(f, ")")
    }
}

/// Total satoshis held by a set of outputs
pub fn balance(utxos: &[Utxo]) -> u64 {
    utxos.iter().map(|utxo| utxo.satoshis).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TXID: &str = "1234567890abcdef1234567890abcdef1234567890abcdef1234567890abcdef";

    #[test]
    fn test_token_shapes() {
        let plain = Utxo {
            txid: TXID.to_string(),
            vout: 0,
            satoshis: 5_000,
            token: None,
        };
        assert!(plain.is_token_free());
        assert!(!plain.is_fungible_only());
        assert_eq!(plain.token_amount(), 0);

        let fungible = Utxo {
            token: Some(TokenData::fungible(TXID, 42)),
            ..plain.clone()
        };
        assert!(fungible.is_fungible_only());
        assert!(fungible.nft().is_none());

        let state = Utxo {
            token: Some(TokenData::state_nft(TXID, "00")),
            ..plain
        };
        assert!(!state.is_fungible_only());
        assert_eq!(state.nft().unwrap().capability, NftCapability::None);
    }

    #[test]
    fn test_outpoint_parsing() {
        let utxo = Utxo {
            txid: TXID.to_string(),
            vout: 3,
            satoshis: 1,
            token: None,
        };
        let outpoint = utxo.outpoint().unwrap();
        assert_eq!(outpoint.vout, 3);
        assert_eq!(outpoint.txid.to_string(), TXID);

        let bad = Utxo {
            txid: "nothex".to_string(),
            ..utxo
        };
        assert!(bad.outpoint().is_err());
    }

    #[test]
    fn test_capability_serde() {
        let nft: NftData =
            serde_json::from_str(r#"{"capability":"minting","commitment":"ab"}"#).unwrap();
        assert_eq!(nft.capability, NftCapability::Minting);
        assert_eq!(nft.capability.bits(), 0x02);
    }
}
