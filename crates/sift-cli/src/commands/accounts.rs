//! Account listing command

use anyhow::{Context, Result};
use sift_core::ledger::AccountDirectory;
use sift_core::models::LedgerAccount;

/// Print the ledger's bank accounts; cash registers are left out
pub fn cmd_accounts<L: AccountDirectory>(ledger: &L) -> Result<Vec<LedgerAccount>> {
    let accounts: Vec<LedgerAccount> = ledger
        .list_accounts()
        .context("Failed to list accounts")?
        .into_iter()
        .filter(|a| !a.is_register())
        .collect();

    if accounts.is_empty() {
        println!("No bank accounts found");
        return Ok(accounts);
    }

    println!("🏦 Accounts:");
    for account in &accounts {
        println!(
            "   {:>10}  {:<40} {}",
            account.account_id().to_string(),
            account.name.as_deref().unwrap_or("(unnamed)"),
            account.currency.as_deref().unwrap_or("")
        );
    }

    Ok(accounts)
}
