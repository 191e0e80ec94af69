//! # Error Types for the Token Vault
//!
//! Every failure a vault operation can hit is a [`VaultError`]. Input problems
//! (bad selection shape, declined confirmation, schedule violations) are kept
//! apart from infrastructure failures so the CLI can tell the operator what to
//! correct before re-running.

use std::fmt;
use thiserror::Error;

/// The operation a selection or build failure belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Mint,
    Lock,
    Release,
    Send,
    Status,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Mint => write!(f, "mint"),
            Operation::Lock => write!(f, "lock"),
            Operation::Release => write!(f, "release"),
            Operation::Send => write!(f, "send"),
            Operation::Status => write!(f, "status"),
        }
    }
}

/// Main error type for all vault-related operations
#[derive(Debug, Error)]
pub enum VaultError {
    /// Fixed-width state encoding or decoding failed
    #[error("Encoding error: {message}")]
    Encoding { message: String },

    /// The observed UTXO set does not match the shape an operation needs
    #[error("UTXO selection failed for {operation}: {message}")]
    Selection { operation: Operation, message: String },

    /// Post-fee change would fall below the dust threshold
    #[error("Insufficient value: change of {change} sats is below the dust threshold of {dust} sats")]
    InsufficientValue { change: i128, dust: u64 },

    /// The operator declined a confirmation
    #[error("Aborted by operator: {message}")]
    UserAborted { message: String },

    /// Requested release height is not allowed by the schedule or chain tip
    #[error("Schedule violation: {message}")]
    ScheduleViolation { message: String },

    /// Configuration errors during setup
    #[error("Vault configuration error: {message}")]
    Configuration { message: String },

    /// Operator-supplied values that cannot be used
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// Errors during transaction construction
    #[error("Transaction error: {message}")]
    Transaction { message: String },

    /// Key handling or signing failures
    #[error("Cryptographic operation failed: {message}")]
    Cryptography { message: String },

    /// Chain provider failures
    #[error("Network request failed: {message}")]
    Network { message: String },

    /// File I/O operations
    #[error("File operation failed: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization errors
    #[error("JSON processing error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
}

/// Result type alias for vault operations
pub type VaultResult<T> = Result<T, VaultError>;

impl VaultError {
    pub fn encoding(message: impl Into<String>) -> Self {
        Self::Encoding {
            message: message.into(),
        }
    }

    pub fn selection(operation: Operation, message: impl Into<String>) -> Self {
        Self::Selection {
            operation,
            message: message.into(),
        }
    }

    pub fn aborted(message: impl Into<String>) -> Self {
        Self::UserAborted {
            message: message.into(),
        }
    }

    pub fn schedule(message: impl Into<String>) -> Self {
        Self::ScheduleViolation {
            message: message.into(),
        }
    }

    /// Release height above the current chain tip
    pub fn beyond_tip(requested: u64, tip: u64) -> Self {
        Self::schedule(format!(
            "unable to release up to height {} beyond the current block height {}",
            requested, tip
        ))
    }

    /// Create a configuration error with a message
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn transaction(message: impl Into<String>) -> Self {
        Self::Transaction {
            message: message.into(),
        }
    }

    /// Create a cryptography error with a message
    pub fn crypto(message: impl Into<String>) -> Self {
        Self::Cryptography {
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Operator declined; nothing went wrong
    pub fn is_operator_abort(&self) -> bool {
        matches!(self, VaultError::UserAborted { .. })
    }

    /// Check if this error is fixed by re-running with different input
    /// (funding a UTXO, choosing another height, answering prompts differently)
    pub fn is_input_problem(&self) -> bool {
        matches!(
            self,
            VaultError::Selection { .. }
                | VaultError::InsufficientValue { .. }
                | VaultError::UserAborted { .. }
                | VaultError::ScheduleViolation { .. }
                | VaultError::InvalidInput { .. }
        )
    }
}
