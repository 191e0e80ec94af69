//! # Configuration
//!
//! Constants used across the vault plus the per-invocation [`VaultConfig`].
//! The configuration is loaded once, validated, and then passed by reference
//! into every operation; nothing in the crate keeps it in a global.

use crate::error::{VaultError, VaultResult};
use serde::{Deserialize, Serialize};
use std::{
    env as std_env,
    fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

/// Network and Electrum configuration
pub mod network {
    use std::time::Duration;

    /// Default Fulcrum server for mainnet (plain TCP)
    pub const DEFAULT_MAINNET_ELECTRUM: &str = "bch.imaginary.cash:50001";

    /// Default Fulcrum server for chipnet (plain TCP)
    pub const DEFAULT_CHIPNET_ELECTRUM: &str = "chipnet.imaginary.cash:50001";

    /// Default Fulcrum server for testnet4 (plain TCP)
    pub const DEFAULT_TESTNET4_ELECTRUM: &str = "testnet4.imaginary.cash:62001";

    /// Default local Fulcrum for regtest
    pub const DEFAULT_REGTEST_ELECTRUM: &str = "127.0.0.1:60401";

    /// Electrum protocol version that reports `token_data` on UTXOs
    pub const ELECTRUM_PROTOCOL_VERSION: &str = "1.5";

    /// Client name sent during `server.version` negotiation
    pub const CLIENT_NAME: &str = "token-vault";

    /// Request timeout for network operations
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
}

/// Vault operation constants
///
/// The release covenant is compiled with its halving length as a constructor
/// argument, so the configured value must match the deployed bytecode.
pub mod vault {
    /// Blocks between reward halvings
    pub const DEFAULT_HALVING_LENGTH: u64 = 210_000;

    /// Satoshis carried by every token output and the minimum change value
    pub const DEFAULT_DUST: u64 = 1_000;

    /// Satoshis per serialized byte
    pub const DEFAULT_FEE_RATE: u64 = 1;

    /// Minimum satoshis for a token-free UTXO to qualify as the fee-paying input.
    ///
    /// Both minting and locking use this single threshold.
    pub const DEFAULT_MIN_FUNDING_SATS: u64 = 10_000;

    /// Default total supply offered when minting
    pub const DEFAULT_TOKEN_SUPPLY: u64 = 96_934_680_000_000_000;

    /// Default share of the supply locked in the vault when minting
    pub const DEFAULT_LOCK_AMOUNT: u64 = 76_934_680_000_000_000;

    /// Default per-block reward before the first halving
    pub const DEFAULT_INITIAL_REWARD: u64 = 250_000_000_000;

    /// Default first release height
    pub const DEFAULT_START_HEIGHT: u64 = 0;
}

/// File paths and names
pub mod files {
    /// Configuration file looked up in the working directory
    pub const DEFAULT_CONFIG_FILE: &str = "config.json";

    /// Wallet file holding the funding key
    pub const DEFAULT_WALLET_FILE: &str = "wallet.json";

    /// Directory under the platform config dir
    pub const CONFIG_DIR: &str = "token-vault";
}

/// Display formatting
pub mod ui {
    /// Characters kept at the start of a shortened txid
    pub const TXID_DISPLAY_PREFIX: usize = 8;

    /// Characters kept at the end of a shortened txid
    pub const TXID_DISPLAY_SUFFIX: usize = 8;

    /// Satoshis per coin
    pub const SATS_PER_COIN: u64 = 100_000_000;
}

/// Environment variable names
pub mod env {
    /// Network override (mainnet, chipnet, testnet4, regtest)
    pub const NETWORK: &str = "VAULT_NETWORK";

    /// Electrum server override (host:port)
    pub const ELECTRUM_SERVER: &str = "ELECTRUM_SERVER";

    /// Fee rate override in sat/byte
    pub const FEE_RATE: &str = "VAULT_FEE_RATE";

    /// Dust threshold override
    pub const DUST: &str = "VAULT_DUST";

    /// Halving length override
    pub const HALVING_LENGTH: &str = "VAULT_HALVING_LENGTH";

    /// Wallet file override
    pub const WALLET_FILE: &str = "VAULT_WALLET_FILE";
}

/// Ledger network the vault lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Chipnet,
    Testnet4,
    Regtest,
}

impl Network {
    pub fn default_electrum_server(&self) -> &'static str {
        match self {
            Network::Mainnet => network::DEFAULT_MAINNET_ELECTRUM,
            Network::Chipnet => network::DEFAULT_CHIPNET_ELECTRUM,
            Network::Testnet4 => network::DEFAULT_TESTNET4_ELECTRUM,
            Network::Regtest => network::DEFAULT_REGTEST_ELECTRUM,
        }
    }
}

impl FromStr for Network {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "chipnet" => Ok(Network::Chipnet),
            "testnet4" => Ok(Network::Testnet4),
            "regtest" => Ok(Network::Regtest),
            other => Err(VaultError::config(format!("unknown network: {}", other))),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Chipnet => write!(f, "chipnet"),
            Network::Testnet4 => write!(f, "testnet4"),
            Network::Regtest => write!(f, "regtest"),
        }
    }
}

/// How contract locking bytecode commits to the redeem script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressType {
    /// `OP_HASH160 <20 bytes> OP_EQUAL`
    P2sh20,
    /// `OP_HASH256 <32 bytes> OP_EQUAL`
    P2sh32,
}

/// Per-invocation vault configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    pub network: Network,
    /// `host:port` of a Fulcrum server; defaults per network when absent
    pub electrum_server: Option<String>,
    pub halving_length: u64,
    pub dust: u64,
    pub fee_rate: u64,
    pub address_type: AddressType,
    pub min_funding_sats: u64,
    /// Hex redeem bytecode of the mint covenant, constructor arguments applied
    pub mint_contract_bytecode: Option<String>,
    /// Hex redeem bytecode of the release covenant, constructor arguments applied
    pub release_contract_bytecode: Option<String>,
    pub wallet_file: PathBuf,
    pub request_timeout_secs: u64,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            network: Network::Chipnet,
            electrum_server: None,
            halving_length: vault::DEFAULT_HALVING_LENGTH,
            dust: vault::DEFAULT_DUST,
            fee_rate: vault::DEFAULT_FEE_RATE,
            address_type: AddressType::P2sh32,
            min_funding_sats: vault::DEFAULT_MIN_FUNDING_SATS,
            mint_contract_bytecode: None,
            release_contract_bytecode: None,
            wallet_file: PathBuf::from(files::DEFAULT_WALLET_FILE),
            request_timeout_secs: network::REQUEST_TIMEOUT.as_secs(),
        }
    }
}

impl VaultConfig {
    /// Resolve, load, apply environment overrides and validate.
    ///
    /// Lookup order: `explicit` path, `./config.json`, then
    /// `<config dir>/token-vault/config.json`. With no file the defaults are used.
    pub fn load(explicit: Option<&Path>) -> VaultResult<Self> {
        dotenv::dotenv().ok();

        let mut config = match Self::resolve_path(explicit)? {
            Some(path) => {
                log::debug!("loading configuration from {}", path.display());
                Self::from_file(&path)?
            }
            None => {
                log::debug!("no configuration file found, using defaults");
                Self::default()
            }
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    fn resolve_path(explicit: Option<&Path>) -> VaultResult<Option<PathBuf>> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(VaultError::config(format!(
                    "configuration file {} does not exist",
                    path.display()
                )));
            }
            return Ok(Some(path.to_path_buf()));
        }

        let local = PathBuf::from(files::DEFAULT_CONFIG_FILE);
        if local.exists() {
            return Ok(Some(local));
        }

        Ok(dirs::config_dir()
            .map(|dir| dir.join(files::CONFIG_DIR).join(files::DEFAULT_CONFIG_FILE))
            .filter(|path| path.exists()))
    }

    /// Parse a configuration file without overrides or validation
    pub fn from_file(path: &Path) -> VaultResult<Self> {
        let json = fs::read_to_string(path)?;
        let config: VaultConfig = serde_json::from_str(&json)?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> VaultResult<()> {
        if let Ok(value) = std_env::var(env::NETWORK) {
            self.network = value.parse()?;
        }
        if let Ok(value) = std_env::var(env::ELECTRUM_SERVER) {
            self.electrum_server = Some(value);
        }
        if let Ok(value) = std_env::var(env::FEE_RATE) {
            self.fee_rate = parse_env_u64(env::FEE_RATE, &value)?;
        }
        if let Ok(value) = std_env::var(env::DUST) {
            self.dust = parse_env_u64(env::DUST, &value)?;
        }
        if let Ok(value) = std_env::var(env::HALVING_LENGTH) {
            self.halving_length = parse_env_u64(env::HALVING_LENGTH, &value)?;
        }
        if let Ok(value) = std_env::var(env::WALLET_FILE) {
            self.wallet_file = PathBuf::from(value);
        }
        Ok(())
    }

    pub fn validate(&self) -> VaultResult<()> {
        if self.halving_length == 0 {
            return Err(VaultError::config("halving_length must be at least one block"));
        }
        if self.dust == 0 {
            return Err(VaultError::config("dust must be positive"));
        }
        if self.fee_rate == 0 {
            return Err(VaultError::config("fee_rate must be positive"));
        }
        if self.request_timeout_secs == 0 {
            return Err(VaultError::config("request_timeout_secs must be positive"));
        }
        for (name, bytecode) in [
            ("mint_contract_bytecode", &self.mint_contract_bytecode),
            ("release_contract_bytecode", &self.release_contract_bytecode),
        ] {
            if let Some(hex_str) = bytecode {
                if hex_str.is_empty() || hex::decode(hex_str).is_err() {
                    return Err(VaultError::config(format!("{} is not valid hex", name)));
                }
            }
        }
        Ok(())
    }

    pub fn electrum_server(&self) -> &str {
        self.electrum_server
            .as_deref()
            .unwrap_or_else(|| self.network.default_electrum_server())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn mint_bytecode(&self) -> VaultResult<&str> {
        self.mint_contract_bytecode
            .as_deref()
            .ok_or_else(|| VaultError::config("mint_contract_bytecode is not configured"))
    }

    pub fn release_bytecode(&self) -> VaultResult<&str> {
        self.release_contract_bytecode
            .as_deref()
            .ok_or_else(|| VaultError::config("release_contract_bytecode is not configured"))
    }
}

fn parse_env_u64(name: &str, value: &str) -> VaultResult<u64> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|e| VaultError::config(format!("{} is not a valid integer: {}", name, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = VaultConfig::default();
        config.validate().unwrap();
        assert_eq!(config.electrum_server(), network::DEFAULT_CHIPNET_ELECTRUM);
        assert_eq!(config.min_funding_sats, 10_000);
    }

    #[test]
    fn test_from_file_fills_missing_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"network": "mainnet", "halving_length": 100, "address_type": "p2sh20", "release_contract_bytecode": "51"}}"#
        )
        .unwrap();

        let config = VaultConfig::from_file(file.path()).unwrap();
        assert_eq!(config.network, Network::Mainnet);
        assert_eq!(config.halving_length, 100);
        assert_eq!(config.address_type, AddressType::P2sh20);
        assert_eq!(config.dust, vault::DEFAULT_DUST);
        assert_eq!(config.release_bytecode().unwrap(), "51");
        assert!(config.mint_bytecode().is_err());
        assert_eq!(config.electrum_server(), network::DEFAULT_MAINNET_ELECTRUM);
    }

    #[test]
    fn test_explicit_missing_path_is_rejected() {
        let err = VaultConfig::load(Some(Path::new("/definitely/not/here.json"))).unwrap_err();
        assert!(matches!(err, VaultError::Configuration { .. }));
    }

    #[test]
    fn test_validation_rejects_zero_values() {
        let config = VaultConfig {
            halving_length: 0,
            ..VaultConfig::default()
        };
        assert!(config.validate().is_err());

        let config = VaultConfig {
            fee_rate: 0,
            ..VaultConfig::default()
        };
        assert!(config.validate().is_err());

        let config = VaultConfig {
            mint_contract_bytecode: Some("zz".to_string()),
            ..VaultConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_network_parsing() {
        assert_eq!("ChipNet".parse::<Network>().unwrap(), Network::Chipnet);
        assert!("bitcoin".parse::<Network>().is_err());
        assert_eq!(Network::Testnet4.to_string(), "testnet4");
    }
}
