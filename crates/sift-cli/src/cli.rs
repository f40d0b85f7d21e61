//! CLI argument definitions using clap
//!
//! This module contains the clap structs and enums for parsing CLI arguments.
//! The command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Sift - Find and remove duplicate ledger transactions
#[derive(Parser)]
#[command(name = "sift")]
#[command(about = "Duplicate finder for bookkeeping ledger bank accounts", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config file (defaults to ~/.config/sift/config.toml, then built-in defaults)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Ledger API token
    ///
    /// SEVDESK_API_TOKEN is also honoured when neither this flag nor
    /// SIFT_API_TOKEN is set.
    #[arg(long, env = "SIFT_API_TOKEN", hide_env_values = true, global = true)]
    pub api_token: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Find duplicate transactions in one bank account and delete them
    Dedup {
        /// Account identifier (IBAN or account number) and currency,
        /// e.g. --account "BE00 0000 0000 0000" EUR
        #[arg(long, num_args = 2, value_names = ["IDENT", "CURRENCY"], required = true)]
        account: Vec<String>,

        /// Only report what would be deleted
        #[arg(long)]
        dry_run: bool,

        /// Delete without asking for confirmation
        #[arg(short, long, conflicts_with = "dry_run")]
        yes: bool,
    },

    /// Import a Wise statement CSV into the ledger
    Import {
        /// Statement CSV file
        file: PathBuf,

        /// Account identifier for a currency, repeatable,
        /// e.g. --add-account "BE00 0000 0000 0000" EUR
        #[arg(long, num_args = 2, value_names = ["IDENT", "CURRENCY"], action = clap::ArgAction::Append)]
        add_account: Vec<String>,

        /// File remembering already imported transactions
        #[arg(long, default_value = "import-state.json")]
        import_state_file: PathBuf,

        /// Do not import anything, just print what would be done
        #[arg(long)]
        dry_run: bool,
    },

    /// List the ledger's bank accounts
    Accounts,
}
