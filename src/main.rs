//! # token-vault: CashTokens Release Vault CLI
//!
//! Drives a token vault whose tokens are released on a halving schedule.
//!
//! ## Vault Flow
//!
//! ```text
//! ┌─────────────┐   mint / lock   ┌─────────────────────┐   release   ┌─────────────┐
//! │   Wallet    │  ─────────────> │  Release contract   │  ────────>  │   Wallet    │
//! │  (tokens)   │                 │  tokens + state NFT │             │  (reward)   │
//! └─────────────┘                 └─────────────────────┘             └─────────────┘
//!                                           │  ▲
//!                                           └──┘ successor tokens + state
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Issue a token from the mint contract and lock part of it
//! token-vault mint
//!
//! # Lock an existing fungible token balance
//! token-vault lock
//!
//! # Release accrued tokens up to a height
//! token-vault release
//!
//! # Inspect the vault without spending anything
//! token-vault status
//!
//! # Move a wallet UTXO (e.g. to consolidate funding)
//! token-vault send --to 76a914...88ac
//! ```
//!
//! Configuration comes from `config.json` (see [`token_vault::config`]) and
//! the `VAULT_*` environment variables; the funding key from `wallet.json`.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use token_vault::{
    operator::TerminalOperator,
    utils::{amount, txid},
    vaults::operations::{parse_locking_bytecode, OperationReceipt, VaultStatus},
    ElectrumClient, TokenVault, VaultConfig, VaultError, WalletKey,
};

#[derive(Parser)]
#[command(name = "token-vault")]
#[command(about = "Lock CashTokens in a covenant vault and release them on a halving schedule")]
struct Cli {
    /// Configuration file (defaults to ./config.json, then the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Wallet file holding the funding key
    #[arg(short, long, global = true)]
    wallet: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Issue a new token from the mint contract and lock part of it in the vault
    Mint,
    /// Lock the wallet's fungible tokens in the vault
    Lock,
    /// Release tokens accrued since the last release
    Release,
    /// Send one wallet UTXO, with its tokens, to another locking bytecode
    Send {
        /// Destination locking bytecode (hex); prompted for when omitted
        #[arg(long)]
        to: Option<String>,
    },
    /// Show the vault state and the release available at the tip
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        match err.downcast_ref::<VaultError>() {
            Some(vault_err) if vault_err.is_operator_abort() => log::warn!("{}", vault_err),
            Some(vault_err) if vault_err.is_input_problem() => {
                log::error!("{}", vault_err);
                log::info!("nothing was broadcast; correct the input and run again");
            }
            _ => log::error!("error: {:#}", err),
        }
        std::process::exit(1);
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = VaultConfig::load(cli.config.as_deref())?;
    if let Some(wallet_file) = cli.wallet {
        config.wallet_file = wallet_file;
    }

    let wallet = WalletKey::load_from_file(&config.wallet_file)
        .with_context(|| format!("loading wallet {}", config.wallet_file.display()))?;
    let client = ElectrumClient::connect(config.electrum_server(), config.request_timeout())
        .await
        .with_context(|| format!("connecting to {}", config.electrum_server()))?;

    let vault = TokenVault::new(
        &config,
        Box::new(client),
        Box::new(wallet),
        Box::new(TerminalOperator),
    );

    match cli.command {
        Commands::Mint => print_receipt(&vault.mint().await?),
        Commands::Lock => print_receipt(&vault.lock().await?),
        Commands::Release => print_receipt(&vault.release().await?),
        Commands::Send { to } => {
            let destination = to.as_deref().map(parse_locking_bytecode).transpose()?;
            print_receipt(&vault.send(destination).await?)
        }
        Commands::Status => print_status(&vault.status().await?),
    }
    Ok(())
}

fn print_receipt(receipt: &OperationReceipt) {
    println!("\n✅ {} transaction broadcast", receipt.operation);
    println!("TXID: {}", receipt.txid);
    println!("Size: {} bytes", receipt.size);
    println!("Fee:  {}", amount::format_sats(receipt.fee));
    if txid::validate(&receipt.txid).is_err() {
        log::warn!("server returned an unexpected txid: {}", receipt.txid);
    }
}

fn print_status(status: &VaultStatus) {
    println!("\n🏦 Token Vault");
    println!("Locking bytecode: {}", status.locking_bytecode.to_hex_string());
    println!("Token category:   {}", txid::format_short(&status.token_category));
    println!("Locked:           {}", amount::format_tokens(status.locked_amount));
    println!("Tip height:       {}", status.height);

    println!("\n📋 State:");
    println!("Release height:   {}", status.state.release_height);
    println!("Halving height:   {}", status.state.halving_height);
    println!("Reward:           {}", amount::format_tokens(status.state.reward));

    match &status.available {
        Some(release) => {
            println!("\n⏳ Releasable at tip:");
            println!("Amount:           {}", amount::format_tokens(release.release_amount));
            println!("Next state:       {}", release.next_state);
            if release.halved {
                println!("Stops at the halving boundary {}", release.next_state.release_height);
            }
            if release.end_of_life {
                println!("Drains the vault");
            }
        }
        None => println!(
            "\nNothing releasable before height {}",
            status.state.release_height
        ),
    }
}
