//! # Two-Pass Fee Sizing
//!
//! Fees are paid per serialized byte, but the size is only known once the
//! transaction is built and signed. Every operation therefore builds twice:
//!
//! 1. Build with a placeholder fee of twice the dust threshold.
//! 2. Measure the serialized length of that build.
//! 3. `fee = fee_rate * length + 1`; the extra unit absorbs signature length
//!    jitter between passes.
//! 4. Rebuild from scratch with the real fee.
//!
//! Only the second build leaves this module.

use super::plan::TransactionPlan;
use crate::config::VaultConfig;
use crate::error::{VaultError, VaultResult};
use crate::wallet::Identity;
use bitcoin::{
    consensus::encode::{serialize, serialize_hex},
    Transaction,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeePolicy {
    /// Satoshis per byte
    pub fee_rate: u64,
    pub dust: u64,
}

impl FeePolicy {
    pub fn from_config(config: &VaultConfig) -> Self {
        Self {
            fee_rate: config.fee_rate,
            dust: config.dust,
        }
    }

    /// Fee used for the sizing pass
    pub fn placeholder_fee(&self) -> VaultResult<u64> {
        self.dust.checked_mul(2).ok_or_else(|| {
            VaultError::transaction(format!("placeholder fee for dust {} overflows", self.dust))
        })
    }

    pub fn fee_for_size(&self, byte_length: usize) -> VaultResult<u64> {
        u64::try_from(byte_length)
            .ok()
            .and_then(|length| self.fee_rate.checked_mul(length))
            .and_then(|fee| fee.checked_add(1))
            .ok_or_else(|| {
                VaultError::transaction(format!(
                    "fee for {} bytes at {} sat/byte overflows",
                    byte_length, self.fee_rate
                ))
            })
    }
}

/// Final build of a two-pass construction
#[derive(Debug, Clone)]
pub struct SizedTransaction {
    pub transaction: Transaction,
    pub fee: u64,
    /// Serialized length of the sizing pass the fee was computed from
    pub estimate_size: usize,
}

impl SizedTransaction {
    pub fn size(&self) -> usize {
        serialize(&self.transaction).len()
    }

    pub fn to_hex(&self) -> String {
        serialize_hex(&self.transaction)
    }

    pub fn txid(&self) -> String {
        self.transaction.compute_txid().to_string()
    }
}

/// Run the two-pass protocol over `build`, which must construct the
/// transaction from scratch for the fee it is given.
pub fn build_with_exact_fee<F>(policy: &FeePolicy, mut build: F) -> VaultResult<SizedTransaction>
where
    F: FnMut(u64) -> VaultResult<Transaction>,
{
    let estimate = build(policy.placeholder_fee()?)?;
    let estimate_size = serialize(&estimate).len();
    let fee = policy.fee_for_size(estimate_size)?;
    log::debug!(
        "sizing pass: {} bytes at {} sat/byte -> fee {} sats",
        estimate_size,
        policy.fee_rate,
        fee
    );

    let transaction = build(fee)?;
    Ok(SizedTransaction {
        transaction,
        fee,
        estimate_size,
    })
}

/// Two-pass build of a plan signed by `identity`
pub fn build_plan(
    plan: &TransactionPlan,
    policy: &FeePolicy,
    identity: &dyn Identity,
) -> VaultResult<SizedTransaction> {
    build_with_exact_fee(policy, |fee| plan.build(fee, identity))
}
