//! Statement import command implementation

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use sift_core::{
    accounts::AccountResolver,
    config::Config,
    import::{ImportState, ImportStats, StatementImporter},
    ledger::{AccountDirectory, TransactionSink},
};

use tracing::info;

use super::{currency_accounts, truncate};

pub fn cmd_import<L>(
    config: &Config,
    ledger: &L,
    file: &Path,
    add_account: &[String],
    state_file: &Path,
    dry_run: bool,
) -> Result<ImportStats>
where
    L: AccountDirectory + TransactionSink,
{
    let accounts = currency_accounts(add_account)?;

    let csv_file =
        File::open(file).with_context(|| format!("Failed to open file: {}", file.display()))?;
    let state = ImportState::load(state_file).with_context(|| {
        format!("Failed to read import state: {}", state_file.display())
    })?;

    if dry_run {
        println!("📥 Importing {} (dry run)...", file.display());
    } else {
        println!("📥 Importing {}...", file.display());
    }
    println!("   {} transactions imported previously", state.len());

    let mut resolver = AccountResolver::new(ledger, &config.accounts);
    if dry_run {
        resolver = resolver.without_creation();
    }

    info!(
        "Importing {} with state file {}",
        file.display(),
        state_file.display()
    );
    let stats = StatementImporter::new(&accounts, resolver, ledger, state)
        .dry_run(dry_run)
        .import(csv_file)
        .context("Import aborted")?;

    if dry_run {
        for row in &stats.imported {
            let tx = &row.transaction;
            println!(
                "   {} entry_date={} value_date={} amount={} payee={} purpose={}",
                row.marker,
                tx.entry_date,
                tx.value_date,
                tx.amount,
                tx.payee_payer_name,
                truncate(&tx.purpose, 60)
            );
        }
        println!();
    }

    println!("✅ Import complete!");
    if dry_run {
        println!("   Would import: {}", stats.imported.len());
    } else {
        println!("   Imported: {}", stats.imported.len());
    }
    println!("   Skipped (already imported): {}", stats.skipped_already);
    println!("   Skipped (refunded): {}", stats.skipped_refunded);
    println!("   Skipped (internal transfers): {}", stats.skipped_internal);
    if stats.failed > 0 {
        println!("   ⚠️  Failed: {} (see log)", stats.failed);
    }

    Ok(stats)
}
