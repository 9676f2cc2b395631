// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Wallet Connector CLI
//!
//! Entry point for the `wallet-connector` binary: a thin front-end over the
//! connector library for managing local wallets from a terminal.
//!
//! - `create` / `import`: add a local wallet
//! - `list` / `status`: inspect connections and the selection
//! - `select`: change the selected connection
//! - `unlock` / `sign`: use a wallet's key
//! - `delete`: remove a wallet for good
//!
//! There is no browser here, so only local wallets are ever registered.

mod cli;
mod logging;

use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;

use wallet_connector::config::local_wallet_type;
use wallet_connector::crypto::normalize_address;
use wallet_connector::storage::SledStore;
use wallet_connector::wallet::{is_local_wallet, wallet_name, LocalWallet, Wallet};
use wallet_connector::Connector;

use cli::{Commands, WalletCli};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = WalletCli::parse();
    logging::init_logging(&cli.global.log_level, cli.global.log_format)?;

    let connector = open_connector(&cli.global.data_dir)?;

    match cli.command {
        Commands::Create(args) => {
            let wallet = connector
                .create_local_wallet(&args.password)
                .await
                .context("failed to create wallet")?;
            println!("{}", wallet.connection_type());
        }
        Commands::Import(args) => {
            let wallet = connector
                .import_local_wallet(&args.secret, &args.password.password)
                .await
                .context("failed to import wallet")?;
            println!("{}", wallet.connection_type());
        }
        Commands::List => list(&connector),
        Commands::Delete(args) => {
            let ty = identity(&args.connection)?;
            if !connector.delete_local_wallet(&ty)? {
                bail!("no local wallet {ty}");
            }
            println!("deleted {ty}");
        }
        Commands::Unlock(args) => {
            let wallet = local_wallet(&connector, args.connection.as_deref())?;
            wallet
                .unlock(&args.password.password)
                .await
                .context("unlock failed")?;
            println!("unlocked {}", wallet.owner());
        }
        Commands::Sign(args) => {
            let wallet = local_wallet(&connector, args.wallet.as_deref())?;
            wallet
                .unlock(&args.password.password)
                .await
                .context("unlock failed")?;
            let signature = wallet.personal_sign_message(&args.message).await?;
            println!("{signature}");
        }
        Commands::Select(args) => {
            let ty = identity(&args.connection)?;
            if connector.connection(&ty).is_none() {
                bail!("unknown connection {ty}");
            }
            connector.select_connection(&ty).await?;
            println!("selected {ty}");
        }
        Commands::Status => status(&connector),
    }

    connector.shutdown();
    Ok(())
}

fn open_connector(data_dir: &Path) -> Result<Arc<Connector>> {
    let db_path = data_dir.join("db");
    std::fs::create_dir_all(&db_path)
        .with_context(|| format!("failed to create store directory: {}", db_path.display()))?;
    let store = SledStore::open(&db_path)
        .with_context(|| format!("failed to open store at {}", db_path.display()))?;
    tracing::debug!(path = %db_path.display(), "store opened");

    Connector::builder(Arc::new(store))
        .build()
        .context("wallet discovery failed")
}

/// Accept a full identity or a bare address.
fn identity(arg: &str) -> Result<String> {
    if arg.starts_with("0x") || arg.starts_with("0X") {
        Ok(local_wallet_type(&normalize_address(arg)?))
    } else {
        Ok(arg.to_string())
    }
}

fn local_wallet(connector: &Connector, target: Option<&str>) -> Result<Arc<LocalWallet>> {
    let ty = match target {
        Some(target) => identity(target)?,
        None => connector
            .selected_type()
            .ok_or_else(|| anyhow!("no wallets; run `create` or `import` first"))?,
    };
    let connection = connector
        .connection(&ty)
        .ok_or_else(|| anyhow!("unknown connection {ty}"))?;
    connection
        .as_local()
        .cloned()
        .ok_or_else(|| anyhow!("{ty} is not a local wallet"))
}

fn list(connector: &Connector) {
    let selected = connector.selected_type();
    for ty in connector.supported_types() {
        let marker = if selected.as_deref() == Some(ty.as_str()) {
            "*"
        } else {
            " "
        };
        println!("{marker} {ty}  ({})", wallet_name(&ty));
    }
}

fn status(connector: &Connector) {
    let Some(connection) = connector.selected_connection() else {
        println!("no connection selected");
        return;
    };
    let ty = connection.connection_type();
    println!("selected: {ty}");
    println!("wallet:   {}", connection.wallet_name());
    println!(
        "address:  {}",
        connection.address().unwrap_or_else(|| "-".to_string())
    );
    if is_local_wallet(&ty) {
        println!("locked:   {}", connection.is_locked());
    }
    println!("node:     {}", connector.locals().node_endpoint());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_addresses_become_local_identities() {
        let address = "0xABCDEF0123456789ABCDEF0123456789ABCDEF01";
        assert_eq!(
            identity(address).unwrap(),
            format!("Local-Wallet:{}", address.to_lowercase())
        );
        assert_eq!(identity("EXTENSION").unwrap(), "EXTENSION");
        assert!(identity("0xABC").is_err());
    }

    #[tokio::test]
    async fn created_wallet_is_found_from_a_fresh_connector() {
        let dir = tempfile::tempdir().unwrap();
        let ty = {
            let connector = open_connector(dir.path()).unwrap();
            let wallet = connector.create_local_wallet("pw").await.unwrap();
            wallet.connection_type()
        };

        let connector = open_connector(dir.path()).unwrap();
        assert_eq!(connector.selected_type(), Some(ty.clone()));
        let wallet = local_wallet(&connector, None).unwrap();
        assert!(wallet.unlock("pw").await.is_ok());
        assert!(local_wallet(&connector, Some("EXTENSION")).is_err());
    }
}
