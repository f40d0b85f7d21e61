//! Sift CLI - Ledger duplicate finder
//!
//! Usage:
//!   sift dedup --account IDENT CURRENCY [--dry-run]   Find and delete duplicates
//!   sift import FILE --add-account IDENT CURRENCY     Import a Wise statement
//!   sift accounts                                     List bank accounts

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use sift_core::gate::{ConsolePrompt, FixedAnswer, RunMode};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .init();

    let config = commands::load_config(cli.config.as_deref())?;
    let ledger = commands::open_ledger(&config, cli.api_token.as_deref())?;

    match cli.command {
        Commands::Dedup {
            account,
            dry_run,
            yes,
        } => {
            let (identifier, currency) = commands::account_pair(&account)?;
            let mode = if dry_run {
                RunMode::Simulate
            } else {
                RunMode::Execute
            };
            if yes {
                commands::cmd_dedup(
                    &config,
                    &ledger,
                    identifier,
                    currency,
                    mode,
                    &mut FixedAnswer::yes(),
                )?;
            } else {
                commands::cmd_dedup(
                    &config,
                    &ledger,
                    identifier,
                    currency,
                    mode,
                    &mut ConsolePrompt::stdio(),
                )?;
            }
            Ok(())
        }
        Commands::Import {
            file,
            add_account,
            import_state_file,
            dry_run,
        } => {
            commands::cmd_import(
                &config,
                &ledger,
                &file,
                &add_account,
                &import_state_file,
                dry_run,
            )?;
            Ok(())
        }
        Commands::Accounts => {
            commands::cmd_accounts(&ledger)?;
            Ok(())
        }
    }
}
