//! Bank statement import
//!
//! Reads a Wise statement export and creates one ledger transaction per row.
//! Rows already imported by an earlier run are recognised through a marker
//! file (a sorted JSON array of marker keys).
//!
//! Outgoing card payments without a reference get the purpose
//! `Card transaction of <amount> (<currency>)`, which is the text the
//! card-settlement rule in [`crate::classify`] recognises.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use csv::ReaderBuilder;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::accounts::AccountResolver;
use crate::error::{Error, Result};
use crate::ledger::{AccountDirectory, TransactionSink};
use crate::models::{parse_amount, AccountId, NewLedgerTransaction};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Record id prefixes renamed when the export format changed
const ID_ALIASES: &[(&str, &str)] = &[
    ("CARD_TRANSACTION", "CARD"),
    ("DIRECT_DEBIT_TRANSACTION", "DIRECT_DEBIT"),
];

/// One row of the statement export
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatementRow {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Status", default)]
    pub status: String,
    #[serde(rename = "Direction", default)]
    pub direction: String,
    #[serde(rename = "Created on", default)]
    pub created_on: String,
    #[serde(rename = "Finished on", default)]
    pub finished_on: String,
    #[serde(rename = "Source fee amount", default)]
    pub source_fee: String,
    #[serde(rename = "Source amount (after fees)", default)]
    pub source_amount: String,
    #[serde(rename = "Source currency", default)]
    pub source_currency: String,
    #[serde(rename = "Source name", default)]
    pub source_name: String,
    #[serde(rename = "Target amount (after fees)", default)]
    pub target_amount: String,
    #[serde(rename = "Target currency", default)]
    pub target_currency: String,
    #[serde(rename = "Target name", default)]
    pub target_name: String,
    #[serde(rename = "Reference", default)]
    pub reference: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    In,
    Out,
    /// Transfer between own balances
    Neutral,
}

impl Direction {
    fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "IN" => Some(Self::In),
            "OUT" => Some(Self::Out),
            "NEUTRAL" => Some(Self::Neutral),
            _ => None,
        }
    }
}

/// Currency to account identifier table built from `--add-account`
#[derive(Debug, Clone, Default)]
pub struct CurrencyAccounts {
    by_currency: HashMap<String, String>,
}

impl CurrencyAccounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the account identifier used for `currency`
    pub fn add(&mut self, identifier: &str, currency: &str) -> Result<()> {
        let currency = currency.trim().to_uppercase();
        if self.by_currency.contains_key(&currency) {
            return Err(Error::InvalidData(format!("Duplicate currency {}", currency)));
        }
        self.by_currency.insert(currency, identifier.to_string());
        Ok(())
    }

    pub fn identifier(&self, currency: &str) -> Result<&str> {
        self.by_currency
            .get(&currency.trim().to_uppercase())
            .map(String::as_str)
            .ok_or_else(|| {
                Error::InvalidData(format!("Missing account id for currency {}", currency))
            })
    }

    pub fn is_empty(&self) -> bool {
        self.by_currency.is_empty()
    }
}

/// Marker keys of rows imported by earlier runs
#[derive(Debug)]
pub struct ImportState {
    path: PathBuf,
    seen: BTreeSet<String>,
}

impl ImportState {
    /// Load the marker file; a missing file is an empty state
    pub fn load(path: &Path) -> Result<Self> {
        let seen = if path.exists() {
            let content = fs::read_to_string(path)?;
            serde_json::from_str::<Vec<String>>(&content)?
                .into_iter()
                .collect()
        } else {
            BTreeSet::new()
        };
        debug!("Loaded {} import markers from {}", seen.len(), path.display());
        Ok(Self {
            path: path.to_path_buf(),
            seen,
        })
    }

    pub fn contains(&self, marker: &str) -> bool {
        self.seen.contains(marker)
    }

    pub fn insert(&mut self, marker: String) -> bool {
        self.seen.insert(marker)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Rewrite the marker file atomically
    pub fn save(&self) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(&mut tmp, &self.seen)?;
        tmp.write_all(b"\n")?;
        tmp.persist(&self.path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }
}

/// A row turned into a ledger transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedRow {
    pub marker: String,
    pub transaction: NewLedgerTransaction,
}

/// What happened to the rows of one statement
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportStats {
    /// Created in the ledger (or, in a dry run, would have been)
    pub imported: Vec<ImportedRow>,
    pub skipped_refunded: usize,
    pub skipped_internal: usize,
    pub skipped_already: usize,
    /// Rows that could not be read or created
    pub failed: usize,
}

/// Account id shown for accounts a dry run would create
const PENDING_ACCOUNT: &str = "(new)";

/// Imports statement rows into the ledger
pub struct StatementImporter<'a, D: AccountDirectory + ?Sized, S: TransactionSink + ?Sized> {
    accounts: &'a CurrencyAccounts,
    resolver: AccountResolver<'a, D>,
    sink: &'a S,
    state: ImportState,
    dry_run: bool,
}

impl<'a, D, S> StatementImporter<'a, D, S>
where
    D: AccountDirectory + ?Sized,
    S: TransactionSink + ?Sized,
{
    pub fn new(
        accounts: &'a CurrencyAccounts,
        resolver: AccountResolver<'a, D>,
        sink: &'a S,
        state: ImportState,
    ) -> Self {
        Self {
            accounts,
            resolver,
            sink,
            state,
            dry_run: false,
        }
    }

    /// Create nothing and leave the marker file untouched
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn state(&self) -> &ImportState {
        &self.state
    }

    /// Import every row of a statement.
    ///
    /// Row-level problems are logged and counted. Missing currency mappings
    /// and account creation failures abort the import.
    pub fn import<R: Read>(&mut self, reader: R) -> Result<ImportStats> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let mut stats = ImportStats::default();

        for result in rdr.deserialize::<StatementRow>() {
            let row = match result {
                Ok(row) => row,
                Err(e) => {
                    warn!("Skipping unreadable statement row: {}", e);
                    stats.failed += 1;
                    continue;
                }
            };
            self.import_row(&row, &mut stats)?;
        }

        info!(
            "Import finished: {} imported, {} already imported, {} refunded, {} internal, {} failed",
            stats.imported.len(),
            stats.skipped_already,
            stats.skipped_refunded,
            stats.skipped_internal,
            stats.failed
        );
        Ok(stats)
    }

    fn import_row(&mut self, row: &StatementRow, stats: &mut ImportStats) -> Result<()> {
        if row.status.trim() == "REFUNDED" {
            info!("Skipping refunded transaction {}", row.id);
            stats.skipped_refunded += 1;
            return Ok(());
        }

        let direction = match Direction::parse(&row.direction) {
            Some(Direction::Neutral) => {
                info!("Skipping internal transfer {}", row.id);
                stats.skipped_internal += 1;
                return Ok(());
            }
            Some(d) => d,
            None => {
                warn!("Unknown direction '{}' for {}, skipping", row.direction, row.id);
                stats.failed += 1;
                return Ok(());
            }
        };

        let (currency, payee, amount) = match row_amount(row, direction) {
            Ok(parts) => parts,
            Err(e) => {
                warn!("Skipping transaction {}: {}", row.id, e);
                stats.failed += 1;
                return Ok(());
            }
        };

        let account = self.account_for(&currency)?;
        let marker = format!("{}-{}-{}", currency, account, alias_record_id(&row.id));

        if self.state.contains(&marker) {
            info!("Skipping already imported transaction {}", marker);
            stats.skipped_already += 1;
            return Ok(());
        }

        let (entry_date, value_date) = match (
            NaiveDateTime::parse_from_str(row.created_on.trim(), TIMESTAMP_FORMAT),
            NaiveDateTime::parse_from_str(row.finished_on.trim(), TIMESTAMP_FORMAT),
        ) {
            (Ok(created), Ok(finished)) => (created, finished),
            _ => {
                warn!(
                    "Skipping transaction {}: unparsable dates '{}' / '{}'",
                    marker, row.created_on, row.finished_on
                );
                stats.failed += 1;
                return Ok(());
            }
        };
        if entry_date > value_date {
            warn!("Transaction {} was created after it finished", marker);
        }

        let transaction = NewLedgerTransaction {
            account_id: account,
            entry_date,
            value_date,
            amount,
            payee_payer_name: payee,
            purpose: row_purpose(row, direction),
        };

        if self.dry_run {
            info!(
                "Would import {} ({} {}, {})",
                marker, transaction.amount, currency, transaction.purpose
            );
            self.state.insert(marker.clone());
        } else {
            match self.sink.create_transaction(&transaction) {
                Ok(id) => {
                    debug!("Created transaction {} for {}", id, marker);
                    self.state.insert(marker.clone());
                    self.state.save()?;
                }
                Err(e) => {
                    warn!("Failed to import transaction {}: {}", marker, e);
                    stats.failed += 1;
                    return Ok(());
                }
            }
        }

        stats.imported.push(ImportedRow {
            marker,
            transaction,
        });
        Ok(())
    }

    fn account_for(&mut self, currency: &str) -> Result<AccountId> {
        let identifier = self.accounts.identifier(currency)?;
        match self.resolver.resolve_or_create(identifier, currency) {
            Err(Error::NotFound(_)) if self.dry_run => Ok(AccountId::from(PENDING_ACCOUNT)),
            other => other,
        }
    }
}

/// Currency, counterparty and signed amount of a row
fn row_amount(row: &StatementRow, direction: Direction) -> Result<(String, String, Decimal)> {
    match direction {
        Direction::In => Ok((
            row.target_currency.trim().to_string(),
            row.source_name.clone(),
            parse_field("Target amount (after fees)", &row.target_amount)?,
        )),
        Direction::Out => {
            let fee = if row.source_fee.trim().is_empty() {
                Decimal::ZERO
            } else {
                parse_field("Source fee amount", &row.source_fee)?
            };
            let amount = parse_field("Source amount (after fees)", &row.source_amount)?;
            Ok((
                row.source_currency.trim().to_string(),
                row.target_name.clone(),
                -amount - fee,
            ))
        }
        Direction::Neutral => Err(Error::Import("internal transfers carry no amount".into())),
    }
}

fn parse_field(column: &str, value: &str) -> Result<Decimal> {
    parse_amount(value)
        .ok_or_else(|| Error::Import(format!("invalid {} '{}'", column, value)))
}

fn row_purpose(row: &StatementRow, direction: Direction) -> String {
    if direction == Direction::Out
        && row.id.contains("CARD_TRANSACTION")
        && row.reference.is_empty()
    {
        return format!(
            "Card transaction of {} ({})",
            row.target_amount.trim(),
            row.target_currency.trim()
        );
    }
    row.reference.clone()
}

fn alias_record_id(id: &str) -> String {
    ID_ALIASES
        .iter()
        .fold(id.to_string(), |id, (from, to)| id.replace(from, to))
}
