//! # Utility Functions
//!
//! Display helpers shared by the operations and the CLI.

use crate::error::{VaultError, VaultResult};

/// Transaction ID formatting utilities
pub mod txid {
    use super::*;
    use crate::config::ui::{TXID_DISPLAY_PREFIX, TXID_DISPLAY_SUFFIX};

    /// Format a transaction ID for display
    pub fn format_short(txid: &str) -> String {
        if txid.len() <= TXID_DISPLAY_PREFIX + TXID_DISPLAY_SUFFIX + 3 {
            txid.to_string()
        } else {
            format!(
                "{}...{}",
                &txid[..TXID_DISPLAY_PREFIX],
                &txid[txid.len() - TXID_DISPLAY_SUFFIX..]
            )
        }
    }

    /// Validate transaction ID format (64 hex characters)
    pub fn validate(txid: &str) -> VaultResult<()> {
        if txid.len() != 64 {
            return Err(VaultError::network(format!(
                "transaction ID must be 64 characters, got {}",
                txid.len()
            )));
        }

        if !txid.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(VaultError::network(
                "transaction ID must contain only hexadecimal characters",
            ));
        }

        Ok(())
    }
}

/// Amount formatting utilities
pub mod amount {
    use crate::config::ui::SATS_PER_COIN;

    /// Group digits in threes: `76,934,680,000,000,000`
    pub fn format_tokens(amount: u64) -> String {
        let digits = amount.to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (index, digit) in digits.chars().enumerate() {
            if index > 0 && (digits.len() - index) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(digit);
        }
        grouped
    }

    /// Satoshis with the coin value alongside
    pub fn format_sats(sats: u64) -> String {
        format!(
            "{} sats ({}.{:08} BCH)",
            sats,
            sats / SATS_PER_COIN,
            sats % SATS_PER_COIN
        )
    }
}
