//! # Covenant Contracts
//!
//! The mint and release covenants are compiled elsewhere and deployed as-is.
//! This module only needs their redeem bytecode (constructor arguments already
//! applied) to derive the P2SH locking bytecode and to build the unlocking
//! bytecode for a function call:
//!
//! ```text
//! <argN> ... <arg1> <redeem bytecode>
//! ```
//!
//! Arguments are pushed in reverse so the first parameter ends up on top of
//! the stack. Both covenants expose a single function, so no selector is
//! pushed.

use crate::config::AddressType;
use crate::error::{VaultError, VaultResult};
use bitcoin::{
    hashes::{sha256d, Hash},
    opcodes::all::{OP_EQUAL, OP_HASH256},
    script::{Builder, PushBytesBuf},
    ScriptBuf,
};

/// One argument of a covenant function call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractArg {
    /// Filled with the funding identity's signature for the spending input
    Signature,
    /// Script number
    Int(i64),
}

/// A covenant function call bound to a specific input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCall {
    pub function: &'static str,
    pub redeem_script: ScriptBuf,
    pub args: Vec<ContractArg>,
}

impl ContractCall {
    /// Unlocking bytecode with `signature` substituted for every signature argument
    pub fn unlocking_bytecode(&self, signature: &[u8]) -> VaultResult<ScriptBuf> {
        let mut builder = Builder::new();
        for arg in self.args.iter().rev() {
            builder = match arg {
                ContractArg::Signature => builder.push_slice(push_bytes(signature.to_vec())?),
                ContractArg::Int(value) => builder.push_int(*value),
            };
        }
        builder = builder.push_slice(push_bytes(self.redeem_script.to_bytes())?);
        Ok(builder.into_script())
    }
}

/// A deployed covenant identified by its redeem bytecode
#[derive(Debug, Clone)]
pub struct ScriptContract {
    name: String,
    redeem_script: ScriptBuf,
    address_type: AddressType,
}

impl ScriptContract {
    pub fn new(name: impl Into<String>, redeem_script: ScriptBuf, address_type: AddressType) -> Self {
        Self {
            name: name.into(),
            redeem_script,
            address_type,
        }
    }

    pub fn from_hex(
        name: impl Into<String>,
        bytecode_hex: &str,
        address_type: AddressType,
    ) -> VaultResult<Self> {
        let name = name.into();
        let bytes = hex::decode(bytecode_hex.trim()).map_err(|e| {
            VaultError::config(format!("{} contract bytecode is not valid hex: {}", name, e))
        })?;
        if bytes.is_empty() {
            return Err(VaultError::config(format!("{} contract bytecode is empty", name)));
        }
        Ok(Self::new(name, ScriptBuf::from_bytes(bytes), address_type))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Locking bytecode of the contract; token-aware and plain addresses share it
    pub fn locking_bytecode(&self) -> ScriptBuf {
        match self.address_type {
            AddressType::P2sh20 => ScriptBuf::new_p2sh(&self.redeem_script.script_hash()),
            AddressType::P2sh32 => {
                let hash = sha256d::Hash::hash(self.redeem_script.as_bytes()).to_byte_array();
                Builder::new()
                    .push_opcode(OP_HASH256)
                    .push_slice(hash)
                    .push_opcode(OP_EQUAL)
                    .into_script()
            }
        }
    }

    /// `mint(sig, amount, lockAmount, height, reward)` on the mint covenant
    pub fn mint(
        &self,
        token_amount: u64,
        lock_amount: u64,
        start_height: u64,
        reward: u64,
    ) -> VaultResult<ContractCall> {
        Ok(ContractCall {
            function: "mint",
            redeem_script: self.redeem_script.clone(),
            args: vec![
                ContractArg::Signature,
                script_int("amount", token_amount)?,
                script_int("lockAmount", lock_amount)?,
                script_int("height", start_height)?,
                script_int("reward", reward)?,
            ],
        })
    }

    /// `release(sig, height)` on the release covenant
    pub fn release(&self, height: u64) -> VaultResult<ContractCall> {
        Ok(ContractCall {
            function: "release",
            redeem_script: self.redeem_script.clone(),
            args: vec![ContractArg::Signature, script_int("height", height)?],
        })
    }
}

fn script_int(name: &str, value: u64) -> VaultResult<ContractArg> {
    i64::try_from(value)
        .map(ContractArg::Int)
        .map_err(|_| VaultError::invalid_input(format!("{} {} exceeds the script number range", name, value)))
}

fn push_bytes(bytes: Vec<u8>) -> VaultResult<PushBytesBuf> {
    PushBytesBuf::try_from(bytes)
        .map_err(|e| VaultError::transaction(format!("push exceeds the script limit: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::script::Instruction;

    fn contract(address_type: AddressType) -> ScriptContract {
        ScriptContract::from_hex("release", "5187", address_type).unwrap()
    }

    #[test]
    fn test_locking_bytecode_shapes() {
        let p2sh20 = contract(AddressType::P2sh20).locking_bytecode();
        assert!(p2sh20.is_p2sh());
        assert_eq!(p2sh20.len(), 23);

        let p2sh32 = contract(AddressType::P2sh32).locking_bytecode();
        assert_eq!(p2sh32.len(), 35);
        assert_eq!(p2sh32.as_bytes()[0], 0xaa);
        assert_eq!(p2sh32.as_bytes()[1], 0x20);
        assert_eq!(p2sh32.as_bytes()[34], 0x87);
    }

    #[test]
    fn test_release_unlocking_order() {
        let call = contract(AddressType::P2sh32).release(1_000).unwrap();
        let script = call.unlocking_bytecode(&[0xaa; 71]).unwrap();
        let pushes: Vec<Vec<u8>> = script
            .instructions()
            .map(|ins| match ins.unwrap() {
                Instruction::PushBytes(bytes) => bytes.as_bytes().to_vec(),
                Instruction::Op(op) => vec![op.to_u8()],
            })
            .collect();

        assert_eq!(pushes.len(), 3);
        // height 1000 as a little-endian script number
        assert_eq!(pushes[0], vec![0xe8, 0x03]);
        assert_eq!(pushes[1], vec![0xaa; 71]);
        assert_eq!(pushes[2], vec![0x51, 0x87]);
    }

    #[test]
    fn test_mint_arguments() {
        let call = contract(AddressType::P2sh20).mint(100, 60, 0, 5).unwrap();
        assert_eq!(call.function, "mint");
        assert_eq!(
            call.args,
            vec![
                ContractArg::Signature,
                ContractArg::Int(100),
                ContractArg::Int(60),
                ContractArg::Int(0),
                ContractArg::Int(5),
            ]
        );
        assert!(contract(AddressType::P2sh20).mint(u64::MAX, 0, 0, 1).is_err());
    }

    #[test]
    fn test_invalid_bytecode() {
        assert!(ScriptContract::from_hex("mint", "xyz", AddressType::P2sh32).is_err());
        assert!(ScriptContract::from_hex("mint", "", AddressType::P2sh32).is_err());
    }
}
