//! Duplicate grouping
//!
//! Partitions fetched transactions into groups sharing the same entry date
//! and exact amount, and picks the canonical ("original") record of each
//! group. Records that cannot be parsed are set aside and reported instead
//! of aborting the run.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::models::{LedgerRecord, SkipReason, SkippedRecord, Transaction, TransactionId};

/// Grouping key: posting date plus exact amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupKey {
    pub entry_date: NaiveDate,
    /// Normalized so `-42.0` and `-42.00` produce the same key
    pub amount: Decimal,
}

impl GroupKey {
    pub fn of(tx: &Transaction) -> Self {
        Self {
            entry_date: tx.entry_date,
            amount: tx.amount.normalize(),
        }
    }
}

/// Transactions sharing one [`GroupKey`], in input order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    pub key: GroupKey,
    pub members: Vec<Transaction>,
}

impl DuplicateGroup {
    /// Only groups with two or more members can contain duplicates
    pub fn is_candidate(&self) -> bool {
        self.members.len() >= 2
    }

    /// Index of the canonical member, see [`select_canonical`]
    pub fn canonical_index(&self) -> Option<usize> {
        select_canonical(&self.members)
    }

    pub fn canonical(&self) -> Option<&Transaction> {
        self.canonical_index().map(|i| &self.members[i])
    }
}

/// Result of grouping one fetched transaction set
#[derive(Debug, Clone, Default)]
pub struct Grouping {
    /// All groups, in order of first appearance of their key
    pub groups: Vec<DuplicateGroup>,
    /// Records excluded because date or amount was missing or unparsable,
    /// or because their id appeared earlier in the fetch
    pub skipped: Vec<SkippedRecord>,
}

impl Grouping {
    /// Groups with at least two members
    pub fn candidates(&self) -> impl Iterator<Item = &DuplicateGroup> {
        self.groups.iter().filter(|g| g.is_candidate())
    }

    pub fn candidate_count(&self) -> usize {
        self.candidates().count()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    /// Number of transactions that took part in grouping
    pub fn grouped_count(&self) -> usize {
        self.groups.iter().map(|g| g.members.len()).sum()
    }
}

/// Parse and group raw ledger records.
///
/// Unparsable records are logged with their id and counted in
/// [`Grouping::skipped`]; they never abort grouping. A record whose id was
/// already seen in the same fetch is set aside the same way, so one ledger
/// row can never be both canonical and duplicate.
pub fn group_records(records: &[LedgerRecord]) -> Grouping {
    let mut transactions = Vec::with_capacity(records.len());
    let mut skipped = Vec::new();
    let mut seen: HashSet<TransactionId> = HashSet::new();

    for record in records {
        match Transaction::from_record(record) {
            Ok(tx) if !seen.insert(tx.id.clone()) => {
                warn!("Ignoring repeated transaction ID {} in fetch", tx.id);
                skipped.push(SkippedRecord {
                    id: tx.id.to_string(),
                    reason: SkipReason::RepeatedId,
                });
            }
            Ok(tx) => {
                let unreadable = record
                    .created_at
                    .as_deref()
                    .filter(|s| !s.trim().is_empty() && tx.created_at.is_none());
                if let Some(raw) = unreadable {
                    warn!(
                        "Transaction ID {} has unreadable creation time '{}', ranking it last",
                        tx.id, raw
                    );
                }
                transactions.push(tx);
            }
            Err(reason) => {
                let id = record.display_id();
                warn!("Skipping transaction ID {}: {}", id, reason);
                skipped.push(SkippedRecord { id, reason });
            }
        }
    }

    let mut grouping = group_transactions(transactions);
    grouping.skipped = skipped;
    grouping
}

/// Group already-parsed transactions by (entry date, amount).
///
/// Group order follows the first appearance of each key; member order
/// follows input order.
pub fn group_transactions<I>(transactions: I) -> Grouping
where
    I: IntoIterator<Item = Transaction>,
{
    let mut index: HashMap<GroupKey, usize> = HashMap::new();
    let mut groups: Vec<DuplicateGroup> = Vec::new();

    for tx in transactions {
        let key = GroupKey::of(&tx);
        match index.get(&key) {
            Some(&i) => groups[i].members.push(tx),
            None => {
                index.insert(key, groups.len());
                groups.push(DuplicateGroup {
                    key,
                    members: vec![tx],
                });
            }
        }
    }

    let grouping = Grouping {
        groups,
        skipped: Vec::new(),
    };
    debug!(
        "Grouped {} transactions into {} groups ({} duplicate candidates)",
        grouping.grouped_count(),
        grouping.groups.len(),
        grouping.candidate_count()
    );
    grouping
}

/// Pick the canonical member: the earliest `created_at`.
///
/// Ties go to the member seen first. Members without a creation timestamp
/// rank after every member that has one.
pub fn select_canonical(members: &[Transaction]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, tx) in members.iter().enumerate() {
        let replace = match best {
            None => true,
            Some(b) => match (tx.created_at, members[b].created_at) {
                (Some(candidate), Some(current)) => candidate < current,
                (Some(_), None) => true,
                _ => false,
            },
        };
        if replace {
            best = Some(i);
        }
    }
    best
}
