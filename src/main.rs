//! `ledger-wallet`: command-line front end for the wallet core.
//!
//! Every command prints one JSON document on success. Errors print the
//! user-facing message and exit non-zero.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};

use ledger_wallet_core::config::load_config;
use ledger_wallet_core::ledger::{EnvelopeSummary, KeyAlgorithm, Keypair, SubmissionHandle};
use ledger_wallet_core::lifecycle::{spawn_interrupt_handler, Shutdown};
use ledger_wallet_core::observability;
use ledger_wallet_core::vault::AccountIndex;
use ledger_wallet_core::{AppContext, WalletError, WalletResult};

#[derive(Parser)]
#[command(name = "ledger-wallet")]
#[command(about = "Ledger wallet: vault, signing and resilient submission", long_about = None)]
struct Cli {
    /// Config file (missing file means defaults).
    #[arg(short, long, env = "WALLET_CONFIG", default_value = "wallet.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Password {
    /// Vault password.
    #[arg(long, env = "WALLET_PASSWORD", hide_env_values = true)]
    password: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty vault
    Init(Password),
    /// Import an existing ed25519 or secp256k1 key pair
    AddAccount {
        #[arg(long)]
        public_key: String,
        #[arg(long, env = "WALLET_PRIVATE_KEY", hide_env_values = true)]
        private_key: String,
        #[command(flatten)]
        auth: Password,
    },
    /// Generate and store a fresh key pair
    GenerateAccount {
        #[arg(long, default_value = "ed25519")]
        algorithm: KeyAlgorithm,
        #[command(flatten)]
        auth: Password,
    },
    /// Generate an account from a new 12-word recovery phrase
    GenerateMnemonic(Password),
    /// Restore the account behind a recovery phrase
    Recover {
        #[arg(long, env = "WALLET_MNEMONIC", hide_env_values = true)]
        phrase: String,
        #[command(flatten)]
        auth: Password,
    },
    /// List stored accounts
    Accounts,
    /// Make another account active
    Switch { index: u32 },
    /// Remove an account
    Remove {
        index: u32,
        #[command(flatten)]
        auth: Password,
    },
    /// Drop incomplete vault records
    Repair,
    /// Add modern tokens to legacy entries
    Migrate(Password),
    /// Change the vault password, re-encrypting every entry
    ChangePassword {
        #[command(flatten)]
        auth: Password,
        #[arg(long, env = "WALLET_NEW_PASSWORD", hide_env_values = true)]
        new_password: String,
    },
    /// Endpoint pool, server and reserve status
    Status,
    /// Clear endpoint health and probe every endpoint
    Reconnect,
    /// Send XRP
    SendXrp {
        destination: String,
        /// Amount in XRP, e.g. 12.5
        amount: String,
        #[arg(long)]
        tag: Option<u32>,
        #[command(flatten)]
        auth: Password,
    },
    /// Send an issued token
    SendToken {
        destination: String,
        value: String,
        currency: String,
        issuer: String,
        #[arg(long)]
        tag: Option<u32>,
        #[command(flatten)]
        auth: Password,
    },
    /// Create or update a trust line
    TrustSet {
        currency: String,
        issuer: String,
        limit: String,
        #[command(flatten)]
        auth: Password,
    },
    /// Trust lines of an account (default: active)
    Lines { address: Option<String> },
    /// Recent transactions of an account (default: active)
    History {
        address: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Run admissions against a configured rate limiter
    CheckRate {
        resource: String,
        #[arg(long, default_value_t = 1)]
        count: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = load_config(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    observability::init(&config.observability);

    let app = AppContext::from_config(config).context("failed to initialise wallet")?;

    match run(&app, cli.command).await {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Err(e) => {
            tracing::debug!(error = %e, "Command failed");
            anyhow::bail!(e.user_message())
        }
    }
}

async fn run(app: &AppContext, command: Commands) -> WalletResult<Value> {
    let vault = &app.vault;
    match command {
        Commands::Init(auth) => {
            vault.create(&auth.password).await?;
            Ok(json!({ "created": true }))
        }
        Commands::AddAccount {
            public_key,
            private_key,
            auth,
        } => {
            let index = vault
                .add_account(&public_key, &private_key, &auth.password)
                .await?;
            Ok(json!({ "index": index }))
        }
        Commands::GenerateAccount { algorithm, auth } => {
            let pair = Keypair::generate_with(algorithm);
            let index = vault
                .add_account(&pair.public_key, &pair.private_key, &auth.password)
                .await?;
            Ok(json!({ "index": index, "address": pair.address()?, "algorithm": algorithm }))
        }
        Commands::GenerateMnemonic(auth) => {
            let (account, phrase) = vault.generate_account_with_mnemonic(&auth.password).await?;
            eprintln!("write down this recovery phrase; it is not stored:");
            eprintln!("{}", phrase.as_str());
            to_json(&account)
        }
        Commands::Recover { phrase, auth } => {
            to_json(&vault.recover_from_mnemonic(&phrase, &auth.password).await?)
        }
        Commands::Accounts => to_json(&vault.list_accounts().await?),
        Commands::Switch { index } => {
            vault.switch_account(AccountIndex(index)).await?;
            to_json(&vault.active_account().await?)
        }
        Commands::Remove { index, auth } => {
            vault
                .remove_account(AccountIndex(index), &auth.password)
                .await?;
            Ok(json!({ "removed": index }))
        }
        Commands::Repair => to_json(&vault.repair().await?),
        Commands::Migrate(auth) => {
            let migrated = vault.migrate_legacy(&auth.password).await?;
            Ok(json!({ "migrated": migrated }))
        }
        Commands::ChangePassword { auth, new_password } => {
            vault.change_password(&auth.password, &new_password).await?;
            Ok(json!({ "changed": true }))
        }
        Commands::Status => {
            let server = app.client.server_info().await.ok();
            Ok(json!({
                "endpoints": app.manager.get_status(),
                "server": server,
                "reserve": app.reserve_requirements().await,
            }))
        }
        Commands::Reconnect => {
            let connected = app.manager.force_reconnect().await;
            Ok(json!({ "connected": connected, "endpoints": app.manager.get_status() }))
        }
        Commands::SendXrp {
            destination,
            amount,
            tag,
            auth,
        } => {
            let handle = app
                .send_xrp(&destination, &amount, tag, &auth.password)
                .await?;
            follow(handle).await
        }
        Commands::SendToken {
            destination,
            value,
            currency,
            issuer,
            tag,
            auth,
        } => {
            let handle = app
                .send_token(&destination, &value, &currency, &issuer, tag, &auth.password)
                .await?;
            follow(handle).await
        }
        Commands::TrustSet {
            currency,
            issuer,
            limit,
            auth,
        } => {
            let handle = app
                .trust_set(&currency, &issuer, &limit, &auth.password)
                .await?;
            follow(handle).await
        }
        Commands::Lines { address } => to_json(&app.account_lines(address.as_deref()).await?),
        Commands::History { address, limit } => {
            to_json(&app.account_history(address.as_deref(), limit).await?)
        }
        Commands::CheckRate { resource, count } => {
            let decisions: Vec<Value> = (0..count)
                .map(|_| {
                    let d = app.limiter.check(&resource);
                    json!({ "allowed": d.allowed, "retry_after_secs": d.retry_after_secs })
                })
                .collect();
            let usage = app.limiter.usage(&resource).map(|u| {
                json!({ "used": u.used, "max_events": u.max_events, "window_secs": u.window_secs })
            });
            Ok(json!({ "resource": resource, "decisions": decisions, "usage": usage }))
        }
    }
}

/// Print progress to stderr until the submission finishes. Ctrl-C stops polling only.
async fn follow(mut handle: SubmissionHandle) -> WalletResult<Value> {
    let shutdown = Arc::new(Shutdown::new());
    let interrupt = spawn_interrupt_handler(Arc::clone(&shutdown));
    let mut token = shutdown.token();
    let cancel = handle.cancel_token();
    let mut cancelled = false;

    eprintln!("submitted {}", handle.hash());
    loop {
        tokio::select! {
            event = handle.progress.recv() => match event {
                Some(event) => eprintln!("{}", serde_json::to_string(&event)?),
                None => break,
            },
            changed = token.changed(), if !cancelled => {
                cancelled = true;
                if changed.is_ok() {
                    eprintln!("cancelling; the transaction may still be applied");
                    cancel.send_replace(true);
                }
            }
        }
    }
    interrupt.abort();

    let report = handle.join().await?;
    let outcome = report.result?;
    Ok(json!({
        "transaction": EnvelopeSummary::from(&report.envelope),
        "outcome": outcome,
        "message": outcome.status_message(),
    }))
}

fn to_json<T: serde::Serialize>(value: &T) -> WalletResult<Value> {
    serde_json::to_value(value).map_err(|e| WalletError::Internal(e.to_string()))
}
