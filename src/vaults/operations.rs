//! # Vault Operations
//!
//! The `mint`, `lock`, `release`, `send` and `status` flows. Every
//! transaction-producing flow follows the same order:
//!
//! ```text
//! observe UTXOs -> select -> (schedule) -> encode state -> size fee
//!               -> operator confirmation -> broadcast
//! ```
//!
//! Nothing is broadcast without the operator's confirmation, and nothing is
//! retried.

use super::schedule::{compute_release, Release};
use super::selection::{
    require_genesis_input, select_lock, select_mint, select_release, select_send, select_vault,
    LockInputs, ReleaseInputs, VaultPair,
};
use super::state::VaultState;
use crate::config::{vault as defaults, VaultConfig};
use crate::contract::ScriptContract;
use crate::error::{Operation, VaultError, VaultResult};
use crate::operator::Operator;
use crate::services::ChainProvider;
use crate::transaction::{build_plan, FeePolicy, SizedTransaction, TransactionPlan, UnlockMethod};
use crate::utils::amount;
use crate::utxo::{TokenData, Utxo};
use crate::wallet::Identity;
use bitcoin::ScriptBuf;

/// Result of a broadcast operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationReceipt {
    pub operation: Operation,
    pub txid: String,
    pub fee: u64,
    pub size: usize,
    pub tx_hex: String,
}

/// Read-only snapshot of a locked vault
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultStatus {
    pub height: u64,
    pub state: VaultState,
    pub locked_amount: u64,
    pub token_category: String,
    pub locking_bytecode: ScriptBuf,
    /// Release available at the current tip; `None` before the release height
    pub available: Option<Release>,
}

/// Token issuance parameters gathered for a mint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MintParams {
    pub token_amount: u64,
    pub lock_amount: u64,
    pub start_height: u64,
    pub reward: u64,
}

impl MintParams {
    pub fn validate(&self) -> VaultResult<()> {
        if self.lock_amount == 0 {
            return Err(VaultError::invalid_input("lock amount must be at least 1 token"));
        }
        if self.lock_amount > self.token_amount {
            return Err(VaultError::invalid_input(format!(
                "cannot lock {} tokens out of an issuance of {}",
                self.lock_amount, self.token_amount
            )));
        }
        validate_reward(self.reward)
    }

    /// Issued tokens that go back to the wallet
    pub fn change_amount(&self) -> u64 {
        self.token_amount - self.lock_amount
    }
}

fn validate_reward(reward: u64) -> VaultResult<()> {
    if reward == 0 {
        return Err(VaultError::invalid_input("reward must be at least 1 token per block"));
    }
    Ok(())
}

/// Drives vault operations against a chain provider
pub struct TokenVault<'a> {
    config: &'a VaultConfig,
    chain: Box<dyn ChainProvider>,
    identity: Box<dyn Identity>,
    operator: Box<dyn Operator>,
    policy: FeePolicy,
}

impl<'a> TokenVault<'a> {
    pub fn new(
        config: &'a VaultConfig,
        chain: Box<dyn ChainProvider>,
        identity: Box<dyn Identity>,
        operator: Box<dyn Operator>,
    ) -> Self {
        Self {
            config,
            chain,
            identity,
            operator,
            policy: FeePolicy::from_config(config),
        }
    }

    pub fn mint_contract(&self) -> VaultResult<ScriptContract> {
        ScriptContract::from_hex("mint", self.config.mint_bytecode()?, self.config.address_type)
    }

    pub fn release_contract(&self) -> VaultResult<ScriptContract> {
        ScriptContract::from_hex(
            "release",
            self.config.release_bytecode()?,
            self.config.address_type,
        )
    }

    async fn tip(&self) -> VaultResult<u64> {
        let height = self.chain.get_block_height().await?;
        log::info!("network: {} height: {}", self.config.network, height);
        Ok(height)
    }

    /// Issue a new token from the mint contract and lock part of it
    pub async fn mint(&self) -> VaultResult<OperationReceipt> {
        let height = self.tip().await?;
        let mint_contract = self.mint_contract()?;
        let release_contract = self.release_contract()?;

        let mint_locking = mint_contract.locking_bytecode();
        log::debug!("{} contract: {}", mint_contract.name(), mint_locking.to_hex_string());
        let contract_utxos = self.chain.get_utxos(&mint_locking).await?;
        let input = select_mint(
            &contract_utxos,
            self.config.min_funding_sats,
            self.operator.as_ref(),
        )?;
        log::info!("mint input: {}", input);

        let params = MintParams {
            token_amount: self
                .operator
                .prompt_int("How many tokens to issue?", defaults::DEFAULT_TOKEN_SUPPLY)?,
            lock_amount: self
                .operator
                .prompt_int("How many tokens to lock?", defaults::DEFAULT_LOCK_AMOUNT)?,
            start_height: self
                .operator
                .prompt_int("Start releasing tokens at block?", defaults::DEFAULT_START_HEIGHT)?,
            reward: self
                .operator
                .prompt_int("Initial reward?", defaults::DEFAULT_INITIAL_REWARD)?,
        };
        params.validate()?;

        self.confirm_data(&[
            ("Halving length", self.config.halving_length.to_string()),
            ("Token amount", amount::format_tokens(params.token_amount)),
            ("Lock amount", amount::format_tokens(params.lock_amount)),
            ("Release block height", params.start_height.to_string()),
            ("Release reward", amount::format_tokens(params.reward)),
        ])?;

        let category = input.txid.clone();
        let genesis = VaultState::genesis(params.start_height, params.reward);
        let change_token = match params.change_amount() {
            0 => None,
            change => Some(TokenData::fungible(category.clone(), change)),
        };
        let call = mint_contract.mint(
            params.token_amount,
            params.lock_amount,
            params.start_height,
            params.reward,
        )?;

        let vault_locking = release_contract.locking_bytecode();
        let plan = TransactionPlan::new(height, self.config.dust)?
            .input(input, UnlockMethod::Contract(call))
            .output(
                vault_locking.clone(),
                self.config.dust,
                Some(TokenData::fungible(category.clone(), params.lock_amount)),
            )
            .output(
                vault_locking,
                self.config.dust,
                Some(TokenData::state_nft(category, genesis.to_commitment())),
            )
            .change(self.identity.locking_bytecode(), change_token);

        let sized = build_plan(&plan, &self.policy, self.identity.as_ref())?;
        self.confirm_and_broadcast(Operation::Mint, sized).await
    }

    /// Move an existing fungible token balance into the release contract
    pub async fn lock(&self) -> VaultResult<OperationReceipt> {
        let height = self.tip().await?;
        let release_contract = self.release_contract()?;

        let fund_utxos = self
            .chain
            .get_utxos(&self.identity.locking_bytecode())
            .await?;
        let LockInputs {
            token_input,
            fee_input,
        } = select_lock(&fund_utxos, self.config.min_funding_sats)?;
        log::info!("token input: {}", token_input);
        log::info!("fee input: {}", fee_input);

        let token = token_input
            .token
            .clone()
            .ok_or_else(|| VaultError::selection(Operation::Lock, "token input lost its token"))?;

        let start_height = self
            .operator
            .prompt_int("Start releasing tokens at block?", defaults::DEFAULT_START_HEIGHT)?;
        let reward = self
            .operator
            .prompt_int("Initial reward?", defaults::DEFAULT_INITIAL_REWARD)?;
        validate_reward(reward)?;

        self.confirm_data(&[
            ("Halving length", self.config.halving_length.to_string()),
            ("Token category", token.category.clone()),
            ("Lock amount", amount::format_tokens(token.amount)),
            ("Release block height", start_height.to_string()),
            ("Release reward", amount::format_tokens(reward)),
        ])?;

        let genesis = VaultState::genesis(start_height, reward);
        let state_category = fee_input.txid.clone();
        let vault_locking = release_contract.locking_bytecode();

        // the genesis input has to come first
        let plan = TransactionPlan::new(height, self.config.dust)?
            .input(fee_input, UnlockMethod::P2pkh)
            .input(token_input, UnlockMethod::P2pkh)
            .output(
                vault_locking.clone(),
                self.config.dust,
                Some(TokenData::fungible(token.category, token.amount)),
            )
            .output(
                vault_locking,
                self.config.dust,
                Some(TokenData::state_nft(state_category, genesis.to_commitment())),
            )
            .change(self.identity.locking_bytecode(), None);

        let sized = build_plan(&plan, &self.policy, self.identity.as_ref())?;
        self.confirm_and_broadcast(Operation::Lock, sized).await
    }

    /// Release the tokens accrued up to an operator-chosen height
    pub async fn release(&self) -> VaultResult<OperationReceipt> {
        let height = self.tip().await?;
        let release_contract = self.release_contract()?;
        let vault_locking = release_contract.locking_bytecode();
        log::debug!("{} contract: {}", release_contract.name(), vault_locking.to_hex_string());

        let contract_utxos = self.chain.get_utxos(&vault_locking).await?;
        let fund_utxos = self
            .chain
            .get_utxos(&self.identity.locking_bytecode())
            .await?;
        let ReleaseInputs {
            token_input,
            state_input,
            fund_input,
        } = select_release(&contract_utxos, &fund_utxos)?;
        log::info!("token input: {}", token_input);
        log::info!("state input: {}", state_input);
        log::info!("fund input: {}", fund_input);

        let (locked, category) = locked_token(Operation::Release, &token_input)?;
        let previous = decode_state(Operation::Release, &state_input)?;

        let target = self
            .operator
            .prompt_int("Block height to release up to?", height)?;
        if target > height {
            return Err(VaultError::beyond_tip(target, height));
        }

        let release = compute_release(&previous, locked, target, self.config.halving_length)?;
        if release.halved {
            log::warn!(
                "A halving event was found! Stopping the release at height {}. To continue releasing, run this again.",
                release.next_state.release_height
            );
        }
        log::debug!("previous state: {}", previous);
        log::debug!("next state: {}", release.next_state);
        log::info!(
            "releasing {} tokens, {} stay locked",
            amount::format_tokens(release.release_amount),
            amount::format_tokens(release.remaining(locked))
        );
        if release.end_of_life {
            log::info!("end of life: the vault is drained and its state is extinguished");
        } else {
            require_genesis_input(
                Operation::Release,
                &fund_input,
                "consolidate the funding UTXO with `token-vault send` first",
            )?;
        }

        let call = release_contract.release(target)?;
        let state_category = fund_input.txid.clone();
        let mut plan = TransactionPlan::new(height, self.config.dust)?
            .input(token_input, UnlockMethod::Contract(call.clone()))
            .input(state_input, UnlockMethod::Contract(call))
            .input(fund_input, UnlockMethod::P2pkh)
            .change(
                self.identity.locking_bytecode(),
                Some(TokenData::fungible(category.clone(), release.release_amount)),
            );
        if !release.end_of_life {
            plan = plan
                .output(
                    vault_locking.clone(),
                    self.config.dust,
                    Some(TokenData::fungible(category, release.remaining(locked))),
                )
                .output(
                    vault_locking,
                    self.config.dust,
                    Some(TokenData::state_nft(
                        state_category,
                        release.next_state.to_commitment(),
                    )),
                );
        }

        let sized = build_plan(&plan, &self.policy, self.identity.as_ref())?;
        self.confirm_and_broadcast(Operation::Release, sized).await
    }

    /// Send one wallet UTXO, token included, to `destination`
    pub async fn send(&self, destination: Option<ScriptBuf>) -> VaultResult<OperationReceipt> {
        let height = self.tip().await?;
        let fund_utxos = self
            .chain
            .get_utxos(&self.identity.locking_bytecode())
            .await?;
        let input = select_send(&fund_utxos, self.operator.as_ref())?;
        log::info!("sending {}", input);

        let destination = match destination {
            Some(script) => script,
            None => parse_locking_bytecode(
                &self
                    .operator
                    .prompt_string("Send input to (locking bytecode hex)?", None)?,
            )?,
        };
        log::debug!("sending to {}", destination.to_hex_string());

        let token = input.token.clone();
        let plan = TransactionPlan::new(height, self.config.dust)?
            .input(input, UnlockMethod::P2pkh)
            .change(destination, token);

        let sized = build_plan(&plan, &self.policy, self.identity.as_ref())?;
        self.confirm_and_broadcast(Operation::Send, sized).await
    }

    /// Decode the vault's state and preview the release available at the tip
    pub async fn status(&self) -> VaultResult<VaultStatus> {
        let height = self.tip().await?;
        let locking_bytecode = self.release_contract()?.locking_bytecode();

        let contract_utxos = self.chain.get_utxos(&locking_bytecode).await?;
        let VaultPair {
            token_input,
            state_input,
        } = select_vault(Operation::Status, &contract_utxos)?;
        let (locked_amount, token_category) = locked_token(Operation::Status, &token_input)?;
        let state = decode_state(Operation::Status, &state_input)?;

        let available = match compute_release(
            &state,
            locked_amount,
            height,
            self.config.halving_length,
        ) {
            Ok(release) => Some(release),
            Err(VaultError::ScheduleViolation { message }) => {
                log::debug!("nothing to release at {}: {}", height, message);
                None
            }
            Err(e) => return Err(e),
        };

        Ok(VaultStatus {
            height,
            state,
            locked_amount,
            token_category,
            locking_bytecode,
            available,
        })
    }

    fn confirm_data(&self, fields: &[(&str, String)]) -> VaultResult<()> {
        println!();
        for (label, value) in fields {
            println!("{:<22} {}", format!("{}:", label), value);
        }
        if !self
            .operator
            .prompt_bool("Confirm token and contract data?", false)?
        {
            return Err(VaultError::aborted("input values were not confirmed"));
        }
        Ok(())
    }

    async fn confirm_and_broadcast(
        &self,
        operation: Operation,
        sized: SizedTransaction,
    ) -> VaultResult<OperationReceipt> {
        let size = sized.size();
        let tx_hex = sized.to_hex();
        let expected_txid = sized.txid();
        log::info!(
            "{} transaction {}: {} bytes, fee {} sats ({} inputs, {} outputs)",
            operation,
            expected_txid,
            size,
            sized.fee,
            sized.transaction.input.len(),
            sized.transaction.output.len()
        );

        if !self.operator.prompt_bool("Send transaction?", false)? {
            log::info!("skipping broadcasting transaction...");
            log::info!("transaction hex: {}", tx_hex);
            return Err(VaultError::aborted("transaction was not sent"));
        }

        log::debug!("broadcasting transaction...");
        let txid = self.chain.broadcast(&sized.transaction).await?;
        log::info!("broadcast {} transaction {}", operation, txid);
        if txid != expected_txid {
            log::warn!("server reported txid {}, expected {}", txid, expected_txid);
        }

        Ok(OperationReceipt {
            operation,
            txid,
            fee: sized.fee,
            size,
            tx_hex,
        })
    }
}

fn locked_token(operation: Operation, utxo: &Utxo) -> VaultResult<(u64, String)> {
    match &utxo.token {
        Some(token) => Ok((token.amount, token.category.clone())),
        None => Err(VaultError::selection(operation, format!("{} carries no token", utxo))),
    }
}

fn decode_state(operation: Operation, utxo: &Utxo) -> VaultResult<VaultState> {
    let nft = utxo
        .nft()
        .ok_or_else(|| VaultError::selection(operation, format!("{} carries no state NFT", utxo)))?;
    VaultState::from_commitment(&nft.commitment)
}

/// Parse an operator-supplied locking bytecode
pub fn parse_locking_bytecode(hex_script: &str) -> VaultResult<ScriptBuf> {
    let bytes = hex::decode(hex_script.trim()).map_err(|e| {
        VaultError::invalid_input(format!("{:?} is not hex locking bytecode: {}", hex_script, e))
    })?;
    if bytes.is_empty() {
        return Err(VaultError::invalid_input("locking bytecode is empty"));
    }
    Ok(ScriptBuf::from_bytes(bytes))
}
