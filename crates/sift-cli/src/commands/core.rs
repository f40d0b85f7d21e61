//! Shared command utilities
//!
//! - `load_config` - Resolve and parse the config file
//! - `resolve_token` - Pick the API token from flag or environment
//! - `open_ledger` - Build the ledger REST client
//! - `account_pair` / `currency_accounts` - Turn account arguments into pairs

use std::path::Path;

use anyhow::{bail, Context, Result};
use sift_core::config::Config;
use sift_core::import::CurrencyAccounts;
use sift_core::ledger::LedgerClient;

/// Environment variable read when neither `--api-token` nor `SIFT_API_TOKEN` is set
pub const LEGACY_TOKEN_VAR: &str = "SEVDESK_API_TOKEN";

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    Config::load(path).context("Failed to load config")
}

/// Token from the flag (or `SIFT_API_TOKEN`, via clap), else the legacy variable
pub fn resolve_token(flag: Option<&str>) -> Result<String> {
    let token = flag
        .map(str::to_string)
        .or_else(|| std::env::var(LEGACY_TOKEN_VAR).ok())
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    match token {
        Some(token) => Ok(token),
        None => bail!("No API token: pass --api-token or set SIFT_API_TOKEN"),
    }
}

pub fn open_ledger(config: &Config, token: Option<&str>) -> Result<LedgerClient> {
    let token = resolve_token(token)?;
    LedgerClient::new(&config.ledger, &token).context("Failed to create ledger client")
}

/// Split `--account IDENT CURRENCY` into its two values
pub fn account_pair(values: &[String]) -> Result<(&str, &str)> {
    match values {
        [identifier, currency] => Ok((identifier.as_str(), currency.as_str())),
        _ => bail!("--account takes exactly two values: IDENT CURRENCY"),
    }
}

/// Build the currency table from repeated `--add-account IDENT CURRENCY`
pub fn currency_accounts(values: &[String]) -> Result<CurrencyAccounts> {
    if values.is_empty() {
        bail!("No accounts specified, use --add-account");
    }
    if values.len() % 2 != 0 {
        bail!("--add-account takes exactly two values: IDENT CURRENCY");
    }

    let mut accounts = CurrencyAccounts::new();
    for pair in values.chunks_exact(2) {
        accounts
            .add(&pair[0], &pair[1])
            .context("Invalid --add-account")?;
    }
    Ok(accounts)
}
