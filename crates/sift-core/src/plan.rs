//! Reconciliation planning
//!
//! Walks every candidate group, classifies each non-canonical member against
//! the group's canonical record, and collects the duplicates into a deletion
//! plan. The plan is rebuilt on every run and never persisted.

use tracing::{debug, info};

use crate::classify::{Classifier, MatchReason};
use crate::group::{group_records, Grouping};
use crate::models::{LedgerRecord, SkippedRecord, Transaction, TransactionId};

/// One duplicate slated for deletion, with the record it duplicates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    pub canonical: Transaction,
    pub duplicate: Transaction,
    pub reason: MatchReason,
}

/// Duplicates found in one run, in discovery order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationPlan {
    pub entries: Vec<PlanEntry>,
}

impl ReconciliationPlan {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Ids to delete, in the order deletions must be attempted
    pub fn duplicates(&self) -> Vec<TransactionId> {
        self.entries.iter().map(|e| e.duplicate.id.clone()).collect()
    }
}

/// Build the deletion plan from grouped transactions.
///
/// Groups are visited in grouping order and members in input order, so the
/// same fetch always yields the same plan.
pub fn build_plan(grouping: &Grouping, classifier: &Classifier) -> ReconciliationPlan {
    let mut entries = Vec::new();

    for group in grouping.candidates() {
        let Some(canonical_index) = group.canonical_index() else {
            continue;
        };
        let canonical = &group.members[canonical_index];

        for (i, member) in group.members.iter().enumerate() {
            if i == canonical_index || member.id == canonical.id {
                continue;
            }
            match classifier.classify(member, canonical) {
                Some(reason) => {
                    debug!(
                        "Transaction {} duplicates {} ({})",
                        member.id, canonical.id, reason
                    );
                    entries.push(PlanEntry {
                        canonical: canonical.clone(),
                        duplicate: member.clone(),
                        reason,
                    });
                }
                None => debug!(
                    "Transaction {} shares date/amount with {} but is not a duplicate",
                    member.id, canonical.id
                ),
            }
        }
    }

    ReconciliationPlan { entries }
}

/// Everything a dedup run learned about one fetched transaction set
#[derive(Debug, Clone, Default)]
pub struct DedupReport {
    pub fetched: usize,
    /// Number of (date, amount) groups with two or more members
    pub candidate_groups: usize,
    pub skipped: Vec<SkippedRecord>,
    pub plan: ReconciliationPlan,
}

/// Group, classify and plan in one step
pub fn find_duplicates(records: &[LedgerRecord], classifier: &Classifier) -> DedupReport {
    let grouping = group_records(records);
    let plan = build_plan(&grouping, classifier);

    info!(
        "Analyzed {} transactions: {} groups with the same date and amount, {} duplicates, {} skipped",
        records.len(),
        grouping.candidate_count(),
        plan.len(),
        grouping.skipped_count()
    );

    DedupReport {
        fetched: records.len(),
        candidate_groups: grouping.candidate_count(),
        skipped: grouping.skipped,
        plan,
    }
}
