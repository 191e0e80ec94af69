//! End-to-end operation tests against an in-memory chain.

use super::operations::{TokenVault, VaultStatus};
use super::state::VaultState;
use crate::config::VaultConfig;
use crate::error::{Operation, VaultError, VaultResult};
use crate::operator::{Answer, ScriptedOperator};
use crate::services::ChainProvider;
use crate::transaction::token_prefix::prefixed_locking_bytecode;
use crate::utxo::{TokenData, Utxo};
use crate::wallet::{tests::test_wallet, Identity};
use async_trait::async_trait;
use bitcoin::{Amount, Script, ScriptBuf, Transaction, TxOut};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

const TX_A: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
const TX_B: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
const TX_C: &str = "cccccccccccccccccccccccccccccccccccccccccccccccccccccccccccccccc";
const TX_D: &str = "dddddddddddddddddddddddddddddddddddddddddddddddddddddddddddddddd";
const CATEGORY: &str = "1111111111111111111111111111111111111111111111111111111111111111";
const DUST: u64 = 1_000;

#[derive(Default)]
struct MockState {
    height: u64,
    utxos: HashMap<ScriptBuf, Vec<Utxo>>,
    broadcasts: Vec<Transaction>,
}

/// Chain double shared between the vault under test and the assertions
#[derive(Clone, Default)]
struct MockChain {
    state: Arc<Mutex<MockState>>,
}

impl MockChain {
    fn at_height(height: u64) -> Self {
        let chain = Self::default();
        chain.state.lock().unwrap().height = height;
        chain
    }

    fn fund(&self, locking_bytecode: &ScriptBuf, utxos: Vec<Utxo>) {
        self.state
            .lock()
            .unwrap()
            .utxos
            .insert(locking_bytecode.clone(), utxos);
    }

    fn broadcasts(&self) -> Vec<Transaction> {
        self.state.lock().unwrap().broadcasts.clone()
    }
}

#[async_trait]
impl ChainProvider for MockChain {
    async fn get_block_height(&self) -> VaultResult<u64> {
        Ok(self.state.lock().unwrap().height)
    }

    async fn get_utxos(&self, locking_bytecode: &Script) -> VaultResult<Vec<Utxo>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .utxos
            .get(locking_bytecode)
            .cloned()
            .unwrap_or_default())
    }

    async fn broadcast(&self, transaction: &Transaction) -> VaultResult<String> {
        self.state
            .lock()
            .unwrap()
            .broadcasts
            .push(transaction.clone());
        Ok(transaction.compute_txid().to_string())
    }
}

fn test_config() -> VaultConfig {
    VaultConfig {
        halving_length: 100,
        dust: DUST,
        fee_rate: 1,
        min_funding_sats: 10_000,
        mint_contract_bytecode: Some("5175".to_string()),
        release_contract_bytecode: Some("5187".to_string()),
        ..VaultConfig::default()
    }
}

fn vault<'a>(config: &'a VaultConfig, chain: &MockChain, answers: Vec<Answer>) -> TokenVault<'a> {
    TokenVault::new(
        config,
        Box::new(chain.clone()),
        Box::new(test_wallet()),
        Box::new(ScriptedOperator::new(answers)),
    )
}

fn wallet_locking() -> ScriptBuf {
    test_wallet().locking_bytecode()
}

fn plain(txid: &str, vout: u32, satoshis: u64) -> Utxo {
    Utxo {
        txid: txid.to_string(),
        vout,
        satoshis,
        token: None,
    }
}

fn with_token(utxo: Utxo, token: TokenData) -> Utxo {
    Utxo {
        token: Some(token),
        ..utxo
    }
}

fn expected_output(locking: &ScriptBuf, satoshis: u64, token: Option<TokenData>) -> TxOut {
    TxOut {
        value: Amount::from_sat(satoshis),
        script_pubkey: ScriptBuf::from_bytes(
            prefixed_locking_bytecode(token.as_ref(), locking.as_bytes()).unwrap(),
        ),
    }
}

fn implied_fee(spent: u64, tx: &Transaction) -> u64 {
    spent - tx.output.iter().map(|out| out.value.to_sat()).sum::<u64>()
}

/// Release contract holding `locked` tokens and `state`
fn lock_vault(chain: &MockChain, config: &VaultConfig, locked: u64, state: VaultState) -> ScriptBuf {
    let locking = vault(config, chain, vec![])
        .release_contract()
        .unwrap()
        .locking_bytecode();
    chain.fund(
        &locking,
        vec![
            with_token(plain(TX_C, 0, DUST), TokenData::fungible(CATEGORY, locked)),
            with_token(
                plain(TX_C, 1, DUST),
                TokenData::state_nft(TX_A, state.to_commitment()),
            ),
        ],
    );
    locking
}

#[tokio::test]
async fn test_mint_issues_locks_and_returns_change() {
    let config = test_config();
    let chain = MockChain::at_height(500);
    let probe = vault(&config, &chain, vec![]);
    let mint_locking = probe.mint_contract().unwrap().locking_bytecode();
    let vault_locking = probe.release_contract().unwrap().locking_bytecode();
    chain.fund(&mint_locking, vec![plain(TX_A, 0, 50_000), plain(TX_B, 1, 90_000)]);

    let answers = vec![
        Answer::Int(1_000),
        Answer::Int(600),
        Answer::Int(100),
        Answer::Int(5),
        Answer::Bool(true),
        Answer::Bool(true),
    ];
    let receipt = vault(&config, &chain, answers).mint().await.unwrap();

    let sent = chain.broadcasts();
    assert_eq!(sent.len(), 1);
    let tx = &sent[0];
    assert_eq!(receipt.operation, Operation::Mint);
    assert_eq!(receipt.txid, tx.compute_txid().to_string());
    assert_eq!(tx.input.len(), 1);
    assert_eq!(tx.input[0].previous_output.vout, 0);
    assert_eq!(tx.lock_time.to_consensus_u32(), 500);

    let genesis = VaultState::genesis(100, 5);
    assert_eq!(tx.output.len(), 3);
    assert_eq!(
        tx.output[0],
        expected_output(&vault_locking, DUST, Some(TokenData::fungible(TX_A, 600)))
    );
    assert_eq!(
        tx.output[1],
        expected_output(
            &vault_locking,
            DUST,
            Some(TokenData::state_nft(TX_A, genesis.to_commitment()))
        )
    );
    assert_eq!(
        tx.output[2],
        expected_output(
            &wallet_locking(),
            50_000 - 2 * DUST - receipt.fee,
            Some(TokenData::fungible(TX_A, 400))
        )
    );
    assert_eq!(implied_fee(50_000, tx), receipt.fee);
    assert_eq!(receipt.size, receipt.tx_hex.len() / 2);
}

#[tokio::test]
async fn test_mint_without_token_change_and_declined_data() {
    let config = test_config();
    let chain = MockChain::at_height(10);
    let mint_locking = vault(&config, &chain, vec![])
        .mint_contract()
        .unwrap()
        .locking_bytecode();
    chain.fund(&mint_locking, vec![plain(TX_A, 0, 50_000)]);

    let declined = vec![
        Answer::Int(1_000),
        Answer::Int(1_000),
        Answer::Int(0),
        Answer::Int(5),
        Answer::Bool(false),
    ];
    let err = vault(&config, &chain, declined).mint().await.unwrap_err();
    assert!(err.is_operator_abort());
    assert!(chain.broadcasts().is_empty());

    let accepted = vec![
        Answer::Int(1_000),
        Answer::Int(1_000),
        Answer::Int(0),
        Answer::Int(5),
        Answer::Bool(true),
        Answer::Bool(true),
    ];
    vault(&config, &chain, accepted).mint().await.unwrap();
    let sent = chain.broadcasts();
    let tx = &sent[0];
    assert_eq!(tx.output[2].script_pubkey, wallet_locking());
}

#[tokio::test]
async fn test_mint_rejects_over_lock_and_thin_input() {
    let config = test_config();
    let chain = MockChain::at_height(10);
    let mint_locking = vault(&config, &chain, vec![])
        .mint_contract()
        .unwrap()
        .locking_bytecode();
    chain.fund(&mint_locking, vec![plain(TX_A, 0, 50_000)]);

    let over_lock = vec![Answer::Int(100), Answer::Int(101)];
    let err = vault(&config, &chain, over_lock).mint().await.unwrap_err();
    assert!(matches!(err, VaultError::InvalidInput { .. }));

    let thin_config = VaultConfig {
        min_funding_sats: 1_000,
        ..test_config()
    };
    chain.fund(&mint_locking, vec![plain(TX_A, 0, 3_500)]);
    let answers = vec![
        Answer::Int(100),
        Answer::Int(60),
        Answer::Int(0),
        Answer::Int(1),
        Answer::Bool(true),
    ];
    let err = vault(&thin_config, &chain, answers).mint().await.unwrap_err();
    assert!(matches!(err, VaultError::InsufficientValue { change: -500, dust: DUST }));
    assert!(chain.broadcasts().is_empty());
}

#[tokio::test]
async fn test_lock_spends_genesis_input_first() {
    let config = test_config();
    let chain = MockChain::at_height(700);
    let vault_locking = vault(&config, &chain, vec![])
        .release_contract()
        .unwrap()
        .locking_bytecode();
    chain.fund(
        &wallet_locking(),
        vec![
            with_token(plain(TX_B, 1, DUST), TokenData::fungible(CATEGORY, 500)),
            plain(TX_A, 0, 20_000),
        ],
    );

    let answers = vec![Answer::Int(10), Answer::Int(5), Answer::Bool(true), Answer::Bool(true)];
    let receipt = vault(&config, &chain, answers).lock().await.unwrap();

    let sent = chain.broadcasts();
    let tx = &sent[0];
    assert_eq!(tx.input.len(), 2);
    assert_eq!(tx.input[0].previous_output.txid.to_string(), TX_A);
    assert_eq!(tx.input[0].previous_output.vout, 0);
    assert_eq!(tx.input[1].previous_output.txid.to_string(), TX_B);

    assert_eq!(
        tx.output[0],
        expected_output(&vault_locking, DUST, Some(TokenData::fungible(CATEGORY, 500)))
    );
    assert_eq!(
        tx.output[1],
        expected_output(
            &vault_locking,
            DUST,
            Some(TokenData::state_nft(TX_A, VaultState::genesis(10, 5).to_commitment()))
        )
    );
    assert_eq!(
        tx.output[2],
        expected_output(&wallet_locking(), 21_000 - 2 * DUST - receipt.fee, None)
    );
}

#[tokio::test]
async fn test_lock_rejects_single_utxo() {
    let config = test_config();
    let chain = MockChain::at_height(700);
    chain.fund(&wallet_locking(), vec![plain(TX_A, 0, 20_000)]);

    let err = vault(&config, &chain, vec![]).lock().await.unwrap_err();
    assert!(matches!(err, VaultError::Selection { operation: Operation::Lock, .. }));
}

#[tokio::test]
async fn test_release_pays_out_and_rewrites_state() {
    let config = test_config();
    let chain = MockChain::at_height(50);
    let previous = VaultState::genesis(0, 1_000);
    let vault_locking = lock_vault(&chain, &config, 1_000_000, previous);
    chain.fund(
        &wallet_locking(),
        vec![
            plain(TX_D, 0, 50_000),
            with_token(plain(TX_B, 0, DUST), TokenData::fungible(CATEGORY, 7)),
        ],
    );

    // tip is the default target
    let answers = vec![Answer::Default, Answer::Bool(true)];
    let receipt = vault(&config, &chain, answers).release().await.unwrap();

    let sent = chain.broadcasts();
    let tx = &sent[0];
    assert_eq!(tx.input.len(), 3);
    assert_eq!(tx.input[2].previous_output.txid.to_string(), TX_D);
    assert_eq!(tx.output.len(), 3);

    let next = VaultState {
        release_height: 50,
        halving_height: 0,
        reward: 1_000,
    };
    assert_eq!(
        tx.output[0],
        expected_output(
            &wallet_locking(),
            50_000 - receipt.fee,
            Some(TokenData::fungible(CATEGORY, 51_000))
        )
    );
    assert_eq!(
        tx.output[1],
        expected_output(&vault_locking, DUST, Some(TokenData::fungible(CATEGORY, 949_000)))
    );
    assert_eq!(
        tx.output[2],
        expected_output(
            &vault_locking,
            DUST,
            Some(TokenData::state_nft(TX_D, next.to_commitment()))
        )
    );
    assert_eq!(implied_fee(52_000, tx), receipt.fee);
}

#[tokio::test]
async fn test_release_stops_at_halving_boundary() {
    let config = test_config();
    let chain = MockChain::at_height(200);
    let vault_locking = lock_vault(&chain, &config, 1_000_000, VaultState::genesis(0, 1_000));
    chain.fund(&wallet_locking(), vec![plain(TX_D, 0, 50_000)]);

    let answers = vec![Answer::Int(150), Answer::Bool(true)];
    vault(&config, &chain, answers).release().await.unwrap();

    let sent = chain.broadcasts();
    let tx = &sent[0];
    assert_eq!(tx.lock_time.to_consensus_u32(), 200);
    let halved = VaultState {
        release_height: 100,
        halving_height: 100,
        reward: 500,
    };
    assert_eq!(
        tx.output[1],
        expected_output(&vault_locking, DUST, Some(TokenData::fungible(CATEGORY, 900_000)))
    );
    assert_eq!(
        tx.output[2],
        expected_output(
            &vault_locking,
            DUST,
            Some(TokenData::state_nft(TX_D, halved.to_commitment()))
        )
    );
}

#[tokio::test]
async fn test_release_end_of_life_drains_vault() {
    let config = test_config();
    let chain = MockChain::at_height(50);
    lock_vault(&chain, &config, 1_000, VaultState::genesis(0, 1_000));
    // not at output 0: fine when no successor state is created
    chain.fund(&wallet_locking(), vec![plain(TX_D, 3, 50_000)]);

    let answers = vec![Answer::Default, Answer::Bool(true)];
    let receipt = vault(&config, &chain, answers).release().await.unwrap();

    let sent = chain.broadcasts();
    let tx = &sent[0];
    assert_eq!(tx.output.len(), 1);
    assert_eq!(
        tx.output[0],
        expected_output(
            &wallet_locking(),
            52_000 - receipt.fee,
            Some(TokenData::fungible(CATEGORY, 1_000))
        )
    );
}

#[tokio::test]
async fn test_release_input_problems() {
    let config = test_config();
    let chain = MockChain::at_height(50);
    lock_vault(&chain, &config, 1_000_000, VaultState::genesis(0, 1_000));

    chain.fund(&wallet_locking(), vec![plain(TX_D, 0, 50_000)]);
    let err = vault(&config, &chain, vec![Answer::Int(51)])
        .release()
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::ScheduleViolation { .. }));

    chain.fund(&wallet_locking(), vec![plain(TX_D, 2, 50_000)]);
    let err = vault(&config, &chain, vec![Answer::Default])
        .release()
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::Selection { operation: Operation::Release, .. }));

    chain.fund(&wallet_locking(), vec![plain(TX_D, 0, 50_000)]);
    let err = vault(&config, &chain, vec![Answer::Default, Answer::Bool(false)])
        .release()
        .await
        .unwrap_err();
    assert!(err.is_operator_abort());
    assert!(chain.broadcasts().is_empty());
}

#[tokio::test]
async fn test_send_forwards_token() {
    let config = test_config();
    let chain = MockChain::at_height(10);
    let token = TokenData::fungible(CATEGORY, 42);
    chain.fund(
        &wallet_locking(),
        vec![plain(TX_A, 0, 30_000), with_token(plain(TX_B, 4, 20_000), token.clone())],
    );
    let destination = ScriptBuf::from_bytes(
        hex::decode("76a914000000000000000000000000000000000000000088ac").unwrap(),
    );

    let answers = vec![Answer::Choice(1), Answer::Bool(true)];
    let receipt = vault(&config, &chain, answers)
        .send(Some(destination.clone()))
        .await
        .unwrap();

    let sent = chain.broadcasts();
    let tx = &sent[0];
    assert_eq!(tx.input.len(), 1);
    assert_eq!(tx.input[0].previous_output.vout, 4);
    assert_eq!(
        tx.output,
        vec![expected_output(&destination, 20_000 - receipt.fee, Some(token))]
    );
}

#[tokio::test]
async fn test_send_prompts_for_destination_and_can_be_declined() {
    let config = test_config();
    let chain = MockChain::at_height(10);
    chain.fund(&wallet_locking(), vec![plain(TX_A, 0, 30_000)]);

    let answers = vec![
        Answer::Text("51".to_string()),
        Answer::Bool(false),
    ];
    let err = vault(&config, &chain, answers).send(None).await.unwrap_err();
    assert!(matches!(err, VaultError::UserAborted { .. }));
    assert!(chain.broadcasts().is_empty());

    let answers = vec![Answer::Text("not hex".to_string())];
    let err = vault(&config, &chain, answers).send(None).await.unwrap_err();
    assert!(matches!(err, VaultError::InvalidInput { .. }));
}

#[tokio::test]
async fn test_status_previews_release_at_tip() {
    let config = test_config();
    let chain = MockChain::at_height(50);
    let state = VaultState::genesis(0, 1_000);
    let locking = lock_vault(&chain, &config, 1_000_000, state);

    let status: VaultStatus = vault(&config, &chain, vec![]).status().await.unwrap();
    assert_eq!(status.height, 50);
    assert_eq!(status.state, state);
    assert_eq!(status.locked_amount, 1_000_000);
    assert_eq!(status.token_category, CATEGORY);
    assert_eq!(status.locking_bytecode, locking);
    assert_eq!(status.available.unwrap().release_amount, 51_000);
    assert!(chain.broadcasts().is_empty());

    lock_vault(&chain, &config, 1_000_000, VaultState::genesis(60, 1_000));
    let status = vault(&config, &chain, vec![]).status().await.unwrap();
    assert!(status.available.is_none());
}

#[tokio::test]
async fn test_missing_contract_bytecode_is_a_config_error() {
    let config = VaultConfig {
        release_contract_bytecode: None,
        ..test_config()
    };
    let chain = MockChain::at_height(1);
    let err = vault(&config, &chain, vec![]).status().await.unwrap_err();
    assert!(matches!(err, VaultError::Configuration { .. }));
}
