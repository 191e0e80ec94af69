//! Builder-side transaction.
//!
//! A [`TransactionPlan`] fixes the inputs, their unlocking methods and the
//! outputs of an operation. Exactly one output is the change slot; its value is
//! whatever is left after the fixed outputs and the fee. The same plan is
//! built once per fee pass, so passes can only differ in the change value.

use super::{sighash::signature_hash, token_prefix::prefixed_locking_bytecode};
use crate::contract::ContractCall;
use crate::error::{VaultError, VaultResult};
use crate::utxo::{TokenData, Utxo};
use crate::wallet::Identity;
use bitcoin::{
    absolute::LockTime, script::Builder, script::PushBytesBuf, transaction::Version, Amount,
    ScriptBuf, Sequence, Transaction, TxIn, TxOut, Witness,
};

/// How an input proves it may be spent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnlockMethod {
    /// `<sig> <pubkey>` from the funding identity
    P2pkh,
    /// Covenant function call
    Contract(ContractCall),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedInput {
    pub utxo: Utxo,
    pub unlock: UnlockMethod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputValue {
    Fixed(u64),
    /// Inputs minus fixed outputs minus fee
    Change,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedOutput {
    pub locking_bytecode: ScriptBuf,
    pub value: OutputValue,
    pub token: Option<TokenData>,
}

#[derive(Debug, Clone)]
pub struct TransactionPlan {
    inputs: Vec<PlannedInput>,
    outputs: Vec<PlannedOutput>,
    lock_time: LockTime,
    dust: u64,
}

impl TransactionPlan {
    /// Start a plan locked to `lock_height` (normally the chain tip)
    pub fn new(lock_height: u64, dust: u64) -> VaultResult<Self> {
        let height = u32::try_from(lock_height)
            .map_err(|_| VaultError::transaction(format!("lock height {} out of range", lock_height)))?;
        let lock_time = LockTime::from_height(height)
            .map_err(|e| VaultError::transaction(format!("invalid lock height {}: {}", height, e)))?;
        Ok(Self {
            inputs: Vec::new(),
            outputs: Vec::new(),
            lock_time,
            dust,
        })
    }

    pub fn input(mut self, utxo: Utxo, unlock: UnlockMethod) -> Self {
        self.inputs.push(PlannedInput { utxo, unlock });
        self
    }

    pub fn output(mut self, locking_bytecode: ScriptBuf, satoshis: u64, token: Option<TokenData>) -> Self {
        self.outputs.push(PlannedOutput {
            locking_bytecode,
            value: OutputValue::Fixed(satoshis),
            token,
        });
        self
    }

    /// Change slot at the current output position
    pub fn change(mut self, locking_bytecode: ScriptBuf, token: Option<TokenData>) -> Self {
        self.outputs.push(PlannedOutput {
            locking_bytecode,
            value: OutputValue::Change,
            token,
        });
        self
    }

    /// Change left for `fee`; fails when it would fall below dust
    pub fn change_value(&self, fee: u64) -> VaultResult<u64> {
        let change_slots = self
            .outputs
            .iter()
            .filter(|output| output.value == OutputValue::Change)
            .count();
        if change_slots != 1 {
            return Err(VaultError::transaction(format!(
                "a plan needs exactly one change output, found {}",
                change_slots
            )));
        }

        let inputs: i128 = self.inputs.iter().map(|input| i128::from(input.utxo.satoshis)).sum();
        let fixed: i128 = self
            .outputs
            .iter()
            .filter_map(|output| match output.value {
                OutputValue::Fixed(satoshis) => Some(i128::from(satoshis)),
                OutputValue::Change => None,
            })
            .sum();
        let change = inputs - fixed - i128::from(fee);
        if change < i128::from(self.dust) {
            return Err(VaultError::InsufficientValue {
                change,
                dust: self.dust,
            });
        }
        u64::try_from(change)
            .map_err(|_| VaultError::transaction(format!("change value {} out of range", change)))
    }

    /// Unsigned transaction paying `fee`
    pub fn assemble(&self, fee: u64) -> VaultResult<Transaction> {
        if self.inputs.is_empty() {
            return Err(VaultError::transaction("a plan needs at least one input"));
        }
        let change = self.change_value(fee)?;

        let mut input = Vec::with_capacity(self.inputs.len());
        for planned in &self.inputs {
            input.push(TxIn {
                previous_output: planned.utxo.outpoint()?,
                script_sig: ScriptBuf::new(),
                sequence: Sequence::ENABLE_LOCKTIME_NO_RBF,
                witness: Witness::new(),
            });
        }

        let mut output = Vec::with_capacity(self.outputs.len());
        for planned in &self.outputs {
            let satoshis = match planned.value {
                OutputValue::Fixed(satoshis) => {
                    if satoshis < self.dust {
                        return Err(VaultError::transaction(format!(
                            "output of {} sats is below the dust threshold of {} sats",
                            satoshis, self.dust
                        )));
                    }
                    satoshis
                }
                OutputValue::Change => change,
            };
            let script = prefixed_locking_bytecode(
                planned.token.as_ref(),
                planned.locking_bytecode.as_bytes(),
            )?;
            output.push(TxOut {
                value: Amount::from_sat(satoshis),
                script_pubkey: ScriptBuf::from_bytes(script),
            });
        }

        Ok(Transaction {
            version: Version::TWO,
            lock_time: self.lock_time,
            input,
            output,
        })
    }

    /// Assemble and sign every input with `identity`
    pub fn build(&self, fee: u64, identity: &dyn Identity) -> VaultResult<Transaction> {
        let mut tx = self.assemble(fee)?;
        let p2pkh_code = identity.locking_bytecode();

        let mut script_sigs = Vec::with_capacity(self.inputs.len());
        for (index, planned) in self.inputs.iter().enumerate() {
            let script_code = match &planned.unlock {
                UnlockMethod::P2pkh => &p2pkh_code,
                UnlockMethod::Contract(call) => {
                    log::trace!("input {} unlocks via {}", index, call.function);
                    &call.redeem_script
                }
            };
            let digest = signature_hash(&tx, index, &planned.utxo, script_code)?;
            let signature = identity.sign(digest)?;
            let script_sig = match &planned.unlock {
                UnlockMethod::P2pkh => {
                    let signature = PushBytesBuf::try_from(signature)
                        .map_err(|e| VaultError::crypto(format!("signature push failed: {}", e)))?;
                    Builder::new()
                        .push_slice(signature)
                        .push_key(&identity.public_key())
                        .into_script()
                }
                UnlockMethod::Contract(call) => call.unlocking_bytecode(&signature)?,
            };
            script_sigs.push(script_sig);
        }

        for (txin, script_sig) in tx.input.iter_mut().zip(script_sigs) {
            txin.script_sig = script_sig;
        }
        Ok(tx)
    }
}
