//! # CLI Interface
//!
//! Argument structure for the `wallet-connector` binary, via `clap` derive.
//! Every command opens the same on-disk store, so wallets and the last
//! selection carry over between invocations. Unlocking only lasts for the
//! command that does it.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::logging::LogFormat;

/// Manage local wallets and the active connection.
#[derive(Parser, Debug)]
#[command(
    name = "wallet-connector",
    about = "Local wallet management for the wallet connector",
    version,
    propagate_version = true
)]
pub struct WalletCli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Directory holding the wallet store. Created on first use.
    #[arg(
        long,
        short = 'd',
        global = true,
        env = "WALLET_CONNECTOR_DATA_DIR",
        default_value = ".wallet-connector"
    )]
    pub data_dir: PathBuf,

    /// Diagnostic output format on stderr.
    #[arg(
        long,
        global = true,
        env = "WALLET_CONNECTOR_LOG_FORMAT",
        value_enum,
        ignore_case = true,
        default_value_t = LogFormat::Pretty
    )]
    pub log_format: LogFormat,

    /// Default log level when RUST_LOG is unset.
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a new local wallet encrypted under a password.
    Create(PasswordArgs),
    /// Import a hex secret key as a local wallet.
    Import(ImportArgs),
    /// List every connection, marking the selected one.
    List,
    /// Permanently delete a local wallet.
    Delete(TargetArgs),
    /// Check a password against a local wallet.
    Unlock(UnlockArgs),
    /// Unlock a local wallet and sign a message with it.
    Sign(SignArgs),
    /// Make a connection the selected one.
    Select(TargetArgs),
    /// Show the selected connection and its cached state.
    Status,
}

#[derive(Args, Debug)]
pub struct PasswordArgs {
    /// Password for the wallet record.
    #[arg(long, short = 'p', env = "WALLET_CONNECTOR_PASSWORD")]
    pub password: String,
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Hex-encoded 32-byte secret key, with or without 0x.
    #[arg(long)]
    pub secret: String,

    #[command(flatten)]
    pub password: PasswordArgs,
}

#[derive(Args, Debug)]
pub struct TargetArgs {
    /// Connection identity, e.g. `Local-Wallet:0x...`, or a bare address.
    pub connection: String,
}

#[derive(Args, Debug)]
pub struct UnlockArgs {
    /// Wallet to unlock. Defaults to the selected connection.
    pub connection: Option<String>,

    #[command(flatten)]
    pub password: PasswordArgs,
}

#[derive(Args, Debug)]
pub struct SignArgs {
    /// Message to sign.
    #[arg(long, short = 'm')]
    pub message: String,

    /// Wallet to sign with. Defaults to the selected connection.
    #[arg(long, short = 'w')]
    pub wallet: Option<String>,

    #[command(flatten)]
    pub password: PasswordArgs,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        WalletCli::command().debug_assert();
    }

    #[test]
    fn sign_parses_with_defaults() {
        let cli = WalletCli::try_parse_from([
            "wallet-connector",
            "sign",
            "-m",
            "hello",
            "-p",
            "pw",
        ])
        .unwrap();
        let Commands::Sign(args) = cli.command else {
            panic!("expected sign");
        };
        assert_eq!(args.message, "hello");
        assert!(args.wallet.is_none());
        assert_eq!(cli.global.log_level, "warn");
        assert_eq!(cli.global.log_format, LogFormat::Pretty);
    }

    #[test]
    fn log_format_is_a_global_flag() {
        let cli =
            WalletCli::try_parse_from(["wallet-connector", "list", "--log-format", "Json"]).unwrap();
        assert_eq!(cli.global.log_format, LogFormat::Json);
        assert!(
            WalletCli::try_parse_from(["wallet-connector", "list", "--log-format", "xml"]).is_err()
        );
    }
}
