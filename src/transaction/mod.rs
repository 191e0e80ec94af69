//! # Transaction Construction
//!
//! - **Plan**: ordered inputs bound to unlocking methods, ordered outputs, one change slot
//! - **Fee**: two-pass exact fee sizing
//! - **Token prefix**: CashTokens output prefix encoding
//! - **Sighash**: BCH fork-id signature hashing

pub mod fee;
pub mod plan;
pub mod sighash;
pub mod token_prefix;

pub use fee::{build_plan, build_with_exact_fee, FeePolicy, SizedTransaction};
pub use plan::{OutputValue, PlannedInput, PlannedOutput, TransactionPlan, UnlockMethod};
