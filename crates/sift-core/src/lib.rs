//! Sift Core Library
//!
//! Duplicate detection and reconciliation for a remote bookkeeping ledger:
//! - Grouping of transactions by entry date and exact amount
//! - Canonical record selection (earliest created)
//! - Pluggable duplicate rules (card settlement, exact purpose)
//! - Reconciliation planning and the confirm-then-delete execution gate
//! - Blocking REST client for the ledger
//! - Account resolution and bank statement import

pub mod accounts;
pub mod classify;
pub mod config;
pub mod error;
pub mod gate;
pub mod group;
pub mod import;
pub mod ledger;
pub mod models;
pub mod plan;

/// Test utilities including an in-memory ledger
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use accounts::AccountResolver;
pub use classify::{CardSettlementRule, Classifier, DuplicateRule, ExactPurposeRule, MatchReason};
pub use config::Config;
pub use error::{Error, Result};
pub use gate::{
    Confirmation, ConsolePrompt, DeletionSummary, ExecutionGate, FixedAnswer, GateOutcome,
    RunMode,
};
pub use group::{group_records, DuplicateGroup, GroupKey, Grouping};
pub use import::{CurrencyAccounts, ImportState, ImportStats, StatementImporter};
pub use ledger::{AccountDirectory, DeletionSink, LedgerClient, TransactionSink, TransactionSource};
pub use models::{AccountId, LedgerRecord, Transaction, TransactionId};
pub use plan::{build_plan, find_duplicates, DedupReport, PlanEntry, ReconciliationPlan};
