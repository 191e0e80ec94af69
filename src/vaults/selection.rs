//! # UTXO Selection
//!
//! Each operation spends a fixed shape of outputs. The selectors here check
//! the observed UTXO sets against that shape and either return the exact
//! inputs or fail with a [`VaultError::Selection`] naming what is wrong.
//! When more than one output qualifies, the operator picks by index.
//!
//! Token genesis only works when the genesis input spends output index 0,
//! so every input that becomes a new token category must satisfy
//! [`require_genesis_input`].

use crate::error::{Operation, VaultError, VaultResult};
use crate::operator::Operator;
use crate::utxo::{balance, Utxo};

/// Inputs of a lock transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockInputs {
    /// Fungible tokens moved into the vault
    pub token_input: Utxo,
    /// Token-free funding; its txid becomes the state NFT category
    pub fee_input: Utxo,
}

/// Inputs of a release transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseInputs {
    /// Locked fungible tokens held by the release contract
    pub token_input: Utxo,
    /// State NFT held by the release contract
    pub state_input: Utxo,
    /// Token-free funding from the wallet
    pub fund_input: Utxo,
}

/// Fail unless `utxo` can start a new token category
pub fn require_genesis_input(operation: Operation, utxo: &Utxo, hint: &str) -> VaultResult<()> {
    if utxo.vout != 0 {
        return Err(VaultError::selection(
            operation,
            format!(
                "{}:{} cannot create a token category, genesis inputs must spend output 0; {}",
                utxo.txid, utxo.vout, hint
            ),
        ));
    }
    Ok(())
}

/// Pick the mint input among the mint contract's UTXOs
pub fn select_mint(
    contract_utxos: &[Utxo],
    min_funding_sats: u64,
    operator: &dyn Operator,
) -> VaultResult<Utxo> {
    if balance(contract_utxos) == 0 {
        return Err(VaultError::selection(
            Operation::Mint,
            "the mint contract does not hold a balance, fund it first",
        ));
    }

    let candidates: Vec<Utxo> = contract_utxos
        .iter()
        .filter(|utxo| utxo.is_token_free() && utxo.satoshis >= min_funding_sats && utxo.vout == 0)
        .cloned()
        .collect();
    log::debug!(
        "mint: {} of {} contract UTXOs qualify",
        candidates.len(),
        contract_utxos.len()
    );

    if candidates.is_empty() {
        return Err(VaultError::selection(
            Operation::Mint,
            format!(
                "no token-free contract UTXO at output 0 holds at least {} sats",
                min_funding_sats
            ),
        ));
    }
    choose_one(Operation::Mint, "Which input should be used?", candidates, operator)
}

/// Split the funding address's UTXOs into the token and fee inputs of a lock
pub fn select_lock(fund_utxos: &[Utxo], min_funding_sats: u64) -> VaultResult<LockInputs> {
    let (first, second) = match fund_utxos {
        [] => {
            return Err(VaultError::selection(
                Operation::Lock,
                "the funding address holds no UTXOs, it needs one token UTXO and one funding UTXO",
            ))
        }
        [only] => {
            return Err(VaultError::selection(
                Operation::Lock,
                format!(
                    "the funding address holds a single UTXO ({}), it needs one token UTXO and one funding UTXO",
                    only
                ),
            ))
        }
        [first, second] => (first, second),
        more => {
            return Err(VaultError::selection(
                Operation::Lock,
                format!(
                    "the funding address holds {} UTXOs, consolidate down to one token UTXO and one funding UTXO",
                    more.len()
                ),
            ))
        }
    };

    let (token_input, fee_input) = if first.is_fungible_only() && second.is_token_free() {
        (first, second)
    } else if second.is_fungible_only() && first.is_token_free() {
        (second, first)
    } else {
        return Err(VaultError::selection(
            Operation::Lock,
            format!(
                "expected one fungible token UTXO and one token-free UTXO, found {} and {}",
                first, second
            ),
        ));
    };

    if fee_input.satoshis < min_funding_sats {
        return Err(VaultError::selection(
            Operation::Lock,
            format!(
                "funding UTXO holds {} sats, at least {} are needed",
                fee_input.satoshis, min_funding_sats
            ),
        ));
    }
    require_genesis_input(
        Operation::Lock,
        fee_input,
        "send the funding UTXO to yourself first",
    )?;

    Ok(LockInputs {
        token_input: token_input.clone(),
        fee_input: fee_input.clone(),
    })
}

/// Token and state UTXOs held by the release contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultPair {
    pub token_input: Utxo,
    pub state_input: Utxo,
}

/// Identify the locked token and state NFT among the release contract's UTXOs
pub fn select_vault(operation: Operation, contract_utxos: &[Utxo]) -> VaultResult<VaultPair> {
    let (first, second) = match contract_utxos {
        [] => {
            return Err(VaultError::selection(
                operation,
                "the release contract holds no UTXOs, nothing is locked",
            ))
        }
        [first, second] => (first, second),
        other => {
            return Err(VaultError::selection(
                operation,
                format!(
                    "the release contract holds {} UTXOs, expected the token and state pair",
                    other.len()
                ),
            ))
        }
    };

    if first.txid != second.txid {
        return Err(VaultError::selection(
            operation,
            format!(
                "vault UTXOs come from different transactions ({} and {})",
                first.txid, second.txid
            ),
        ));
    }

    let is_state = |utxo: &Utxo| utxo.nft().is_some();
    let (token_input, state_input) = if first.is_fungible_only() && is_state(second) {
        (first, second)
    } else if second.is_fungible_only() && is_state(first) {
        (second, first)
    } else {
        return Err(VaultError::selection(
            operation,
            format!(
                "expected a locked token UTXO and a state NFT UTXO, found {} and {}",
                first, second
            ),
        ));
    };

    Ok(VaultPair {
        token_input: token_input.clone(),
        state_input: state_input.clone(),
    })
}

/// Identify the vault's token and state UTXOs plus the wallet's funding UTXO
pub fn select_release(contract_utxos: &[Utxo], fund_utxos: &[Utxo]) -> VaultResult<ReleaseInputs> {
    let VaultPair {
        token_input,
        state_input,
    } = select_vault(Operation::Release, contract_utxos)?;

    let funding: Vec<&Utxo> = fund_utxos.iter().filter(|utxo| utxo.is_token_free()).collect();
    let fund_input = match funding.as_slice() {
        [only] => (*only).clone(),
        [] => {
            return Err(VaultError::selection(
                Operation::Release,
                "the funding address holds no token-free UTXO to pay the fee",
            ))
        }
        many => {
            return Err(VaultError::selection(
                Operation::Release,
                format!(
                    "the funding address holds {} token-free UTXOs, consolidate them into one",
                    many.len()
                ),
            ))
        }
    };

    Ok(ReleaseInputs {
        token_input,
        state_input,
        fund_input,
    })
}

/// Pick the single UTXO a send spends
pub fn select_send(fund_utxos: &[Utxo], operator: &dyn Operator) -> VaultResult<Utxo> {
    if fund_utxos.is_empty() {
        return Err(VaultError::selection(
            Operation::Send,
            "the funding address holds no UTXOs",
        ));
    }
    choose_one(
        Operation::Send,
        "Which input should be sent?",
        fund_utxos.to_vec(),
        operator,
    )
}

fn choose_one(
    operation: Operation,
    question: &str,
    mut candidates: Vec<Utxo>,
    operator: &dyn Operator,
) -> VaultResult<Utxo> {
    if candidates.len() == 1 {
        return Ok(candidates.remove(0));
    }

    let options: Vec<String> = candidates.iter().map(|utxo| utxo.to_string()).collect();
    let index = operator.choose(question, &options)?;
    if index >= candidates.len() {
        return Err(VaultError::selection(
            operation,
            format!(
                "choice {} is out of range, {} candidates were offered",
                index,
                candidates.len()
            ),
        ));
    }
    Ok(candidates.swap_remove(index))
}
