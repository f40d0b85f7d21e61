//! Remote ledger access
//!
//! The dedup engine only sees the ledger through these traits:
//!
//! - `TransactionSource`: all transactions of one account, already paginated
//! - `AccountDirectory`: list and create check accounts
//! - `DeletionSink`: delete one transaction
//! - `TransactionSink`: create one transaction (statement import)
//!
//! `LedgerClient` implements all of them against the ledger's REST API.
//! With the `test-utils` feature, `crate::test_utils::InMemoryLedger` does too.

mod client;

pub use client::{LedgerClient, USER_AGENT};

use crate::error::Result;
use crate::models::{
    AccountId, LedgerAccount, LedgerRecord, NewAccount, NewLedgerTransaction, TransactionId,
};

/// Supplies every transaction of one account.
///
/// An unreachable ledger is an error (`Error::Unreachable`), never an empty
/// result.
pub trait TransactionSource {
    fn fetch_all(&self, account: &AccountId) -> Result<Vec<LedgerRecord>>;
}

/// Check account lookup and creation
pub trait AccountDirectory {
    fn list_accounts(&self) -> Result<Vec<LedgerAccount>>;

    fn create_account(&self, account: &NewAccount) -> Result<LedgerAccount>;
}

/// Deletes single transactions. Any error is a per-item failure.
pub trait DeletionSink {
    fn delete(&self, id: &TransactionId) -> Result<()>;
}

/// Creates single transactions
pub trait TransactionSink {
    fn create_transaction(&self, transaction: &NewLedgerTransaction) -> Result<TransactionId>;
}
