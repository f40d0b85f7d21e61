//! Domain models for sift

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Identifier of a transaction in the remote ledger
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub String);

impl TransactionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TransactionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a check account in the remote ledger
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub String);

impl AccountId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A scalar the ledger sends either as a JSON string or as a JSON number
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawScalar {
    Text(String),
    Number(serde_json::Number),
}

impl RawScalar {
    pub fn to_text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Number(n) => n.to_string(),
        }
    }
}

impl From<&str> for RawScalar {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

/// A transaction exactly as fetched from the ledger.
///
/// Every field is optional on the wire; [`Transaction::from_record`] decides
/// whether the record can take part in duplicate grouping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerRecord {
    #[serde(default)]
    pub id: Option<RawScalar>,
    #[serde(rename = "entryDate", default)]
    pub entry_date: Option<String>,
    #[serde(default)]
    pub amount: Option<RawScalar>,
    /// Creation timestamp of the record in the ledger
    #[serde(rename = "create", default)]
    pub created_at: Option<String>,
    #[serde(rename = "paymtPurpose", default)]
    pub purpose: Option<String>,
}

impl LedgerRecord {
    pub fn new(
        id: &str,
        entry_date: &str,
        amount: &str,
        created_at: &str,
        purpose: &str,
    ) -> Self {
        Self {
            id: Some(RawScalar::from(id)),
            entry_date: Some(entry_date.to_string()),
            amount: Some(RawScalar::from(amount)),
            created_at: Some(created_at.to_string()),
            purpose: Some(purpose.to_string()),
        }
    }

    /// Id as text, or "N/A" for records the ledger sent without one
    pub fn display_id(&self) -> String {
        self.id
            .as_ref()
            .map(RawScalar::to_text)
            .unwrap_or_else(|| "N/A".to_string())
    }
}

/// A ledger entry that can take part in duplicate grouping.
///
/// Date and amount are parsed once here; grouping never goes back to the
/// wire strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub entry_date: NaiveDate,
    pub amount: Decimal,
    /// `None` when the ledger sent no (or an unreadable) creation timestamp;
    /// grouping logs the unreadable case
    pub created_at: Option<DateTime<Utc>>,
    pub purpose: String,
}

impl Transaction {
    /// Parse a fetched record, reporting why it cannot be grouped
    pub fn from_record(record: &LedgerRecord) -> std::result::Result<Self, SkipReason> {
        let id = match &record.id {
            Some(raw) => TransactionId(raw.to_text()),
            None => return Err(SkipReason::MissingId),
        };

        let entry_date = match record.entry_date.as_deref().map(str::trim) {
            None | Some("") => return Err(SkipReason::MissingDate),
            Some(s) => parse_entry_date(s).ok_or_else(|| SkipReason::InvalidDate(s.to_string()))?,
        };

        let amount = match record.amount.as_ref().map(RawScalar::to_text) {
            None => return Err(SkipReason::MissingAmount),
            Some(s) if s.trim().is_empty() => return Err(SkipReason::MissingAmount),
            Some(s) => parse_amount(&s).ok_or(SkipReason::InvalidAmount(s))?,
        };

        let created_at = record.created_at.as_deref().and_then(parse_timestamp);

        Ok(Self {
            id,
            entry_date,
            amount,
            created_at,
            purpose: record.purpose.clone().unwrap_or_default(),
        })
    }
}

/// Why a fetched record was left out of grouping
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    MissingId,
    MissingDate,
    MissingAmount,
    InvalidDate(String),
    InvalidAmount(String),
    /// Same id already seen earlier in the fetch
    RepeatedId,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingId => write!(f, "missing id"),
            Self::MissingDate => write!(f, "missing entry date"),
            Self::MissingAmount => write!(f, "missing amount"),
            Self::InvalidDate(s) => write!(f, "unparsable entry date '{}'", s),
            Self::InvalidAmount(s) => write!(f, "unparsable amount '{}'", s),
            Self::RepeatedId => write!(f, "repeated id in fetch"),
        }
    }
}

/// A record excluded from grouping, kept so it can be reported
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRecord {
    /// Ledger id as text ("N/A" when absent)
    pub id: String,
    pub reason: SkipReason,
}

/// A check account in the remote ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerAccount {
    pub id: RawScalar,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
}

impl LedgerAccount {
    pub fn account_id(&self) -> AccountId {
        AccountId(self.id.to_text())
    }

    /// Cash registers ("Kasse") are never used as bank accounts
    pub fn is_register(&self) -> bool {
        self.kind
            .as_deref()
            .map(|k| k.eq_ignore_ascii_case("register"))
            .unwrap_or(false)
    }
}

/// Parameters for creating a check account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub name: String,
    pub currency: String,
    /// IBAN, account number or free-form identifier
    pub account_number: String,
}

/// A transaction to be created in the ledger (statement import)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewLedgerTransaction {
    pub account_id: AccountId,
    pub entry_date: NaiveDateTime,
    pub value_date: NaiveDateTime,
    pub amount: Decimal,
    pub payee_payer_name: String,
    pub purpose: String,
}

/// Parse an entry date.
///
/// Accepts a plain `YYYY-MM-DD` date or an ISO 8601 timestamp; the time part
/// and offset are dropped and the date is taken as written.
pub fn parse_entry_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    parse_naive_datetime(s).map(|dt| dt.date())
}

/// Parse a creation timestamp, normalized to UTC.
///
/// Timestamps without an offset are taken as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    parse_naive_datetime(s).map(|dt| dt.and_utc())
}

fn parse_naive_datetime(s: &str) -> Option<NaiveDateTime> {
    const FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

/// Parse an amount as an exact decimal (`"-42.00"`, `"1e3"`)
pub fn parse_amount(s: &str) -> Option<Decimal> {
    let s = s.trim();
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_entry_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(parse_entry_date("2024-03-01"), Some(expected));
        assert_eq!(parse_entry_date("2024-03-01T00:00:00+01:00"), Some(expected));
        assert_eq!(parse_entry_date("2024-03-01T23:30:00-05:00"), Some(expected));
        assert_eq!(parse_entry_date("2024-03-01 12:00:00"), Some(expected));
        assert_eq!(parse_entry_date("01/03/2024"), None);
        assert_eq!(parse_entry_date(""), None);
    }

    #[test]
    fn test_parse_amount_is_exact() {
        let a = parse_amount("-42.00").unwrap();
        let b = parse_amount("-42.0").unwrap();
        assert_eq!(a, b);
        assert_eq!(parse_amount("0.1").unwrap() + parse_amount("0.2").unwrap(), parse_amount("0.3").unwrap());
        assert_eq!(parse_amount("1e2"), Some(Decimal::from(100)));
        assert_eq!(parse_amount("abc"), None);
    }

    #[test]
    fn test_parse_timestamp_normalizes_offset() {
        let a = parse_timestamp("2024-03-01T10:00:00+01:00").unwrap();
        let b = parse_timestamp("2024-03-01 09:00:00").unwrap();
        assert_eq!(a, b);
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_from_record_reports_missing_fields() {
        let mut record = LedgerRecord::new("7", "2024-03-01", "-42.00", "2024-03-01T10:00:00Z", "Rent");
        assert!(Transaction::from_record(&record).is_ok());

        record.entry_date = None;
        assert_eq!(Transaction::from_record(&record), Err(SkipReason::MissingDate));

        record.entry_date = Some("not a date".into());
        assert_eq!(
            Transaction::from_record(&record),
            Err(SkipReason::InvalidDate("not a date".into()))
        );

        record.entry_date = Some("2024-03-01".into());
        record.amount = Some(RawScalar::from("12,50"));
        assert_eq!(
            Transaction::from_record(&record),
            Err(SkipReason::InvalidAmount("12,50".into()))
        );

        record.amount = None;
        assert_eq!(Transaction::from_record(&record), Err(SkipReason::MissingAmount));
    }

    #[test]
    fn test_record_deserializes_ledger_json() {
        let json = r#"{
            "id": "1234",
            "objectName": "CheckAccountTransaction",
            "create": "2024-03-01T10:00:00+01:00",
            "entryDate": "2024-03-01T00:00:00+01:00",
            "amount": "-42.5",
            "paymtPurpose": "Coffee"
        }"#;
        let record: LedgerRecord = serde_json::from_str(json).unwrap();
        let tx = Transaction::from_record(&record).unwrap();
        assert_eq!(tx.id, TransactionId::from("1234"));
        assert_eq!(tx.amount, parse_amount("-42.50").unwrap());
        assert_eq!(tx.purpose, "Coffee");
        assert!(tx.created_at.is_some());
    }

    #[test]
    fn test_numeric_id_and_amount() {
        let json = r#"{"id": 99, "entryDate": "2024-03-01", "amount": 12.5, "paymtPurpose": null}"#;
        let record: LedgerRecord = serde_json::from_str(json).unwrap();
        let tx = Transaction::from_record(&record).unwrap();
        assert_eq!(tx.id.as_str(), "99");
        assert_eq!(tx.amount, parse_amount("12.50").unwrap());
        assert_eq!(tx.purpose, "");
        assert_eq!(tx.created_at, None);
    }

    #[test]
    fn test_register_accounts_detected() {
        let json = r#"{"id": "5", "name": "Kasse", "type": "register", "currency": "EUR"}"#;
        let account: LedgerAccount = serde_json::from_str(json).unwrap();
        assert!(account.is_register());
        assert_eq!(account.account_id(), AccountId::from("5"));
    }
}
