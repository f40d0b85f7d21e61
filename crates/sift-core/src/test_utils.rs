//! Test utilities for sift-core
//!
//! `InMemoryLedger` stands in for the remote ledger in unit, integration and
//! CLI tests. It implements every ledger trait and records what was asked of
//! it.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use crate::error::{Error, Result};
use crate::ledger::{AccountDirectory, DeletionSink, TransactionSink, TransactionSource};
use crate::models::{
    AccountId, LedgerAccount, LedgerRecord, NewAccount, NewLedgerTransaction, RawScalar,
    TransactionId,
};

#[derive(Default)]
struct State {
    accounts: Vec<LedgerAccount>,
    records: HashMap<AccountId, Vec<LedgerRecord>>,
    failing_deletes: HashSet<TransactionId>,
    delete_calls: Vec<TransactionId>,
    created: Vec<NewLedgerTransaction>,
    unreachable: bool,
    next_id: u64,
}

/// A ledger held in memory
#[derive(Default)]
pub struct InMemoryLedger {
    state: RefCell<State>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an account and return its id
    pub fn add_account(&self, name: &str, kind: &str, currency: &str) -> AccountId {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        let id = format!("acc-{}", state.next_id);
        state.accounts.push(LedgerAccount {
            id: RawScalar::from(id.as_str()),
            name: Some(name.to_string()),
            kind: Some(kind.to_string()),
            currency: Some(currency.to_string()),
        });
        AccountId(id)
    }

    /// Append records to an account
    pub fn add_records(&self, account: &AccountId, records: impl IntoIterator<Item = LedgerRecord>) {
        self.state
            .borrow_mut()
            .records
            .entry(account.clone())
            .or_default()
            .extend(records);
    }

    /// Make deleting `id` fail with an API error
    pub fn fail_delete(&self, id: &str) {
        self.state
            .borrow_mut()
            .failing_deletes
            .insert(TransactionId::from(id));
    }

    /// Every call fails as if the ledger could not be reached
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.borrow_mut().unreachable = unreachable;
    }

    pub fn accounts(&self) -> Vec<LedgerAccount> {
        self.state.borrow().accounts.clone()
    }

    /// Ids passed to `delete`, in call order, failed ones included
    pub fn delete_calls(&self) -> Vec<TransactionId> {
        self.state.borrow().delete_calls.clone()
    }

    /// Ids still present in an account
    pub fn record_ids(&self, account: &AccountId) -> Vec<String> {
        self.state
            .borrow()
            .records
            .get(account)
            .map(|records| records.iter().map(LedgerRecord::display_id).collect())
            .unwrap_or_default()
    }

    pub fn created_transactions(&self) -> Vec<NewLedgerTransaction> {
        self.state.borrow().created.clone()
    }

    fn check_reachable(&self) -> Result<()> {
        if self.state.borrow().unreachable {
            return Err(Error::InvalidData("in-memory ledger set unreachable".into()));
        }
        Ok(())
    }
}

impl TransactionSource for InMemoryLedger {
    fn fetch_all(&self, account: &AccountId) -> Result<Vec<LedgerRecord>> {
        self.check_reachable()?;
        Ok(self
            .state
            .borrow()
            .records
            .get(account)
            .cloned()
            .unwrap_or_default())
    }
}

impl AccountDirectory for InMemoryLedger {
    fn list_accounts(&self) -> Result<Vec<LedgerAccount>> {
        self.check_reachable()?;
        Ok(self.accounts())
    }

    fn create_account(&self, account: &NewAccount) -> Result<LedgerAccount> {
        self.check_reachable()?;
        let id = self.add_account(&account.name, "online", &account.currency);
        let state = self.state.borrow();
        state
            .accounts
            .iter()
            .find(|a| a.account_id() == id)
            .cloned()
            .ok_or_else(|| Error::AccountCreation {
                name: account.name.clone(),
                reason: "account vanished after insert".into(),
            })
    }
}

impl DeletionSink for InMemoryLedger {
    fn delete(&self, id: &TransactionId) -> Result<()> {
        self.check_reachable()?;
        let mut state = self.state.borrow_mut();
        state.delete_calls.push(id.clone());
        if state.failing_deletes.contains(id) {
            return Err(Error::Api {
                status: 500,
                message: format!("cannot delete {}", id),
            });
        }

        let mut found = false;
        for records in state.records.values_mut() {
            let before = records.len();
            records.retain(|r| r.display_id() != id.as_str());
            found |= records.len() != before;
        }
        if !found {
            return Err(Error::NotFound(format!("transaction {}", id)));
        }
        Ok(())
    }
}

impl TransactionSink for InMemoryLedger {
    fn create_transaction(&self, transaction: &NewLedgerTransaction) -> Result<TransactionId> {
        self.check_reachable()?;
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        let id = format!("tx-{}", state.next_id);
        let record = LedgerRecord::new(
            &id,
            &transaction.entry_date.date().to_string(),
            &transaction.amount.to_string(),
            &transaction.entry_date.format("%Y-%m-%dT%H:%M:%S").to_string(),
            &transaction.purpose,
        );
        state
            .records
            .entry(transaction.account_id.clone())
            .or_default()
            .push(record);
        state.created.push(transaction.clone());
        Ok(TransactionId(id))
    }
}
