//! Dedup command implementation

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use sift_core::{
    accounts::AccountResolver,
    classify::Classifier,
    config::Config,
    gate::{Confirmation, DeletionSummary, ExecutionGate, GateOutcome, RunMode},
    ledger::{AccountDirectory, DeletionSink, TransactionSource},
    models::Transaction,
    plan::{find_duplicates, DedupReport},
};

use tracing::info;

use super::truncate;

const PURPOSE_WIDTH: usize = 60;

/// Find duplicates in one account and hand the plan to the execution gate.
///
/// Only setup problems (account, fetch, config) are errors. Failed deletions
/// are reported in the summary and still return `Ok`.
pub fn cmd_dedup<L, C>(
    config: &Config,
    ledger: &L,
    identifier: &str,
    currency: &str,
    mode: RunMode,
    confirmation: &mut C,
) -> Result<GateOutcome>
where
    L: TransactionSource + AccountDirectory + DeletionSink,
    C: Confirmation + ?Sized,
{
    let mut resolver = AccountResolver::new(ledger, &config.accounts);
    if mode == RunMode::Simulate {
        resolver = resolver.without_creation();
    }
    let account = resolver
        .resolve_or_create(identifier, currency)
        .with_context(|| format!("Failed to resolve account {} ({})", identifier, currency))?;

    info!("Resolved account {} ({}) to ledger ID {}", identifier, currency, account);

    println!("🔍 Fetching transactions for account {}...", account);
    let records = ledger
        .fetch_all(&account)
        .with_context(|| format!("Failed to fetch transactions for account {}", account))?;
    println!("   Found {} transactions", records.len());

    let classifier =
        Classifier::from_config(&config.classifier).context("Invalid classifier config")?;
    let report = find_duplicates(&records, &classifier);

    print_report(&report);

    let mut gate = ExecutionGate::new(mode);
    let outcome = gate
        .run(&report.plan, confirmation, ledger)
        .context("Failed to read confirmation")?;

    info!("Execution gate finished: {:?}", gate.state());

    match &outcome {
        GateOutcome::NothingToDo => {
            println!("✅ No duplicates found");
        }
        GateOutcome::Simulated { planned } => {
            println!(
                "ℹ️  Dry run: {} transaction(s) would be deleted, nothing was changed",
                planned
            );
        }
        GateOutcome::Declined { .. } => {
            println!("Cancelled, no transactions were deleted");
        }
        GateOutcome::Executed(summary) => print_summary(summary),
    }

    Ok(outcome)
}

fn print_report(report: &DedupReport) {
    println!();
    if report.plan.is_empty() {
        println!(
            "   {} groups share date and amount, none are duplicates",
            report.candidate_groups
        );
    } else {
        println!("📋 Duplicates:");
        for entry in &report.plan.entries {
            println!("   [ORIGINAL]  {}", describe(&entry.canonical));
            println!(
                "   [DUPLICATE] {}  ({})",
                describe(&entry.duplicate),
                entry.reason
            );
            println!();
        }

        let total: Decimal = report.plan.entries.iter().map(|e| e.duplicate.amount).sum();
        println!(
            "   {} duplicate(s) in {} group(s), total amount {}",
            report.plan.len(),
            report.candidate_groups,
            total
        );
    }

    if !report.skipped.is_empty() {
        println!(
            "   ⚠️  Skipped {} transaction(s) that could not be grouped:",
            report.skipped.len()
        );
        for skipped in &report.skipped {
            println!("      - {}: {}", skipped.id, skipped.reason);
        }
    }
    println!();
}

fn describe(tx: &Transaction) -> String {
    let created = tx
        .created_at
        .map(|c| c.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "unknown".to_string());
    format!(
        "ID: {}, Date: {}, Amount: {}, Created: {}, Purpose: {}",
        tx.id,
        tx.entry_date,
        tx.amount,
        created,
        truncate(&tx.purpose, PURPOSE_WIDTH)
    )
}

fn print_summary(summary: &DeletionSummary) {
    if summary.failed() == 0 {
        println!("✅ Deletion complete!");
    } else {
        println!("⚠️  Deletion finished with errors");
    }
    println!("   Attempted: {}", summary.attempted);
    println!("   Deleted: {}", summary.succeeded());
    println!("   Failed: {}", summary.failed());
    for failure in &summary.failures {
        println!("      - {}: {}", failure.id, failure.error);
    }
}
