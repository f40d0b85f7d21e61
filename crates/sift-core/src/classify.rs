//! Duplicate classification
//!
//! Same date and amount alone is not enough to call two transactions
//! duplicates. Each non-canonical group member is checked against the
//! canonical record with an ordered list of rules; the first rule that
//! matches decides.
//!
//! Default rules:
//! 1. Card settlement: the member's purpose looks like a generated card
//!    settlement text ("Card transaction of 12.34 (USD)"). The canonical
//!    purpose is not consulted, since card rails re-post settlements with a
//!    description that differs from the original authorization.
//! 2. Exact purpose: both purposes are identical (both empty counts).
//!
//! The card-settlement pattern is a heuristic tied to one payment
//! provider's wording. It misses settlements described any other way and
//! flags any transaction whose memo happens to contain the phrase, so it is
//! kept as its own rule and its pattern is configurable.

use std::sync::LazyLock;

use regex::Regex;

use crate::config::ClassifierConfig;
use crate::error::Result;
use crate::models::Transaction;

/// Default card-settlement pattern: description, decimal amount and a
/// three-letter currency code in parentheses
pub const CARD_SETTLEMENT_PATTERN: &str = r"Card transaction of \d+\.\d+ \([A-Z]{3}\)";

static DEFAULT_CARD_SETTLEMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(CARD_SETTLEMENT_PATTERN).expect("valid regex"));

/// Why a member was classified as a duplicate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchReason {
    CardSettlement,
    ExactPurpose,
    /// A caller-supplied rule, identified by its name
    Rule(&'static str),
}

impl MatchReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CardSettlement => "card settlement",
            Self::ExactPurpose => "identical purpose",
            Self::Rule(name) => *name,
        }
    }
}

impl std::fmt::Display for MatchReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One duplicate heuristic.
///
/// Implementations must be pure functions of the two transactions.
pub trait DuplicateRule: Send + Sync {
    fn reason(&self) -> MatchReason;

    fn matches(&self, member: &Transaction, canonical: &Transaction) -> bool;
}

/// Member purpose looks like a re-posted card settlement
#[derive(Debug, Clone)]
pub struct CardSettlementRule {
    pattern: Regex,
}

impl CardSettlementRule {
    pub fn new() -> Self {
        Self {
            pattern: DEFAULT_CARD_SETTLEMENT.clone(),
        }
    }

    /// Use a custom pattern (searched anywhere in the purpose)
    pub fn with_pattern(pattern: &str) -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
        })
    }

    pub fn is_settlement_text(&self, purpose: &str) -> bool {
        self.pattern.is_match(purpose)
    }
}

impl Default for CardSettlementRule {
    fn default() -> Self {
        Self::new()
    }
}

impl DuplicateRule for CardSettlementRule {
    fn reason(&self) -> MatchReason {
        MatchReason::CardSettlement
    }

    fn matches(&self, member: &Transaction, _canonical: &Transaction) -> bool {
        self.is_settlement_text(&member.purpose)
    }
}

/// Purposes are byte-for-byte identical
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactPurposeRule;

impl DuplicateRule for ExactPurposeRule {
    fn reason(&self) -> MatchReason {
        MatchReason::ExactPurpose
    }

    fn matches(&self, member: &Transaction, canonical: &Transaction) -> bool {
        member.purpose == canonical.purpose
    }
}

/// Ordered rule list deciding whether a member duplicates its canonical record
pub struct Classifier {
    rules: Vec<Box<dyn DuplicateRule>>,
}

impl Classifier {
    /// Classifier with no rules; nothing is ever a duplicate
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Card-settlement rule followed by exact-purpose rule
    pub fn new() -> Self {
        Self::empty()
            .with_rule(CardSettlementRule::new())
            .with_rule(ExactPurposeRule)
    }

    pub fn from_config(config: &ClassifierConfig) -> Result<Self> {
        let card = match config.card_settlement_pattern.as_deref() {
            Some(pattern) => CardSettlementRule::with_pattern(pattern)?,
            None => CardSettlementRule::new(),
        };
        let mut classifier = Self::empty().with_rule(card);
        if config.exact_purpose {
            classifier = classifier.with_rule(ExactPurposeRule);
        }
        Ok(classifier)
    }

    /// Append a rule; rules are evaluated in insertion order
    pub fn with_rule<R: DuplicateRule + 'static>(mut self, rule: R) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Reason of the first matching rule, or `None` when the member is not
    /// a duplicate
    pub fn classify(&self, member: &Transaction, canonical: &Transaction) -> Option<MatchReason> {
        self.rules
            .iter()
            .find(|rule| rule.matches(member, canonical))
            .map(|rule| rule.reason())
    }

    pub fn is_duplicate(&self, member: &Transaction, canonical: &Transaction) -> bool {
        self.classify(member, canonical).is_some()
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{parse_amount, TransactionId};
    use chrono::NaiveDate;

    fn tx(id: &str, purpose: &str) -> Transaction {
        Transaction {
            id: TransactionId::from(id),
            entry_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            amount: parse_amount("-42.00").unwrap(),
            created_at: None,
            purpose: purpose.to_string(),
        }
    }

    #[test]
    fn test_card_settlement_ignores_canonical_purpose() {
        let classifier = Classifier::new();
        let canonical = tx("1", "Rent");
        let member = tx("2", "Card transaction of 42.00 (EUR)");
        assert_eq!(
            classifier.classify(&member, &canonical),
            Some(MatchReason::CardSettlement)
        );
    }

    #[test]
    fn test_card_settlement_pattern_found_inside_longer_text() {
        let rule = CardSettlementRule::new();
        assert!(rule.is_settlement_text("Ref 77: Card transaction of 12.34 (USD) - shop"));
        assert!(!rule.is_settlement_text("Card transaction of 12 (USD)"));
        assert!(!rule.is_settlement_text("Card transaction of 12.34 (usd)"));
        assert!(!rule.is_settlement_text("Card transaction of 12.34 (US)"));
        assert!(!rule.is_settlement_text("card transaction of 12.34 (USD)"));
    }

    #[test]
    fn test_exact_purpose_match() {
        let classifier = Classifier::new();
        assert_eq!(
            classifier.classify(&tx("2", "Coffee"), &tx("1", "Coffee")),
            Some(MatchReason::ExactPurpose)
        );
        assert_eq!(
            classifier.classify(&tx("2", ""), &tx("1", "")),
            Some(MatchReason::ExactPurpose)
        );
    }

    #[test]
    fn test_different_purposes_are_not_duplicates() {
        let classifier = Classifier::new();
        assert!(!classifier.is_duplicate(&tx("2", "Utilities"), &tx("1", "Rent")));
        assert!(!classifier.is_duplicate(&tx("2", "coffee"), &tx("1", "Coffee")));
    }

    #[test]
    fn test_canonical_card_text_alone_is_not_enough() {
        let classifier = Classifier::new();
        let canonical = tx("1", "Card transaction of 42.00 (EUR)");
        assert!(!classifier.is_duplicate(&tx("2", "Rent"), &canonical));
    }

    #[test]
    fn test_pattern_fragments_do_not_panic() {
        let classifier = Classifier::new();
        for purpose in ["", "(EUR)", "(", "Card transaction of", "42.00 (EUR)", "\u{0}"] {
            let _ = classifier.classify(&tx("2", purpose), &tx("1", "(EUR)"));
        }
    }

    #[test]
    fn test_from_config_custom_pattern() {
        let config = ClassifierConfig {
            card_settlement_pattern: Some(r"^CARD \d+$".to_string()),
            exact_purpose: false,
        };
        let classifier = Classifier::from_config(&config).unwrap();
        assert_eq!(classifier.rule_count(), 1);
        assert!(classifier.is_duplicate(&tx("2", "CARD 12"), &tx("1", "x")));
        // exact purpose disabled
        assert!(!classifier.is_duplicate(&tx("2", "x"), &tx("1", "x")));
    }

    #[test]
    fn test_from_config_rejects_bad_pattern() {
        let config = ClassifierConfig {
            card_settlement_pattern: Some("(".to_string()),
            exact_purpose: true,
        };
        assert!(Classifier::from_config(&config).is_err());
    }

    #[test]
    fn test_custom_rule() {
        struct SameSign;
        impl DuplicateRule for SameSign {
            fn reason(&self) -> MatchReason {
                MatchReason::Rule("same sign")
            }
            fn matches(&self, member: &Transaction, canonical: &Transaction) -> bool {
                member.amount.is_sign_negative() == canonical.amount.is_sign_negative()
            }
        }

        let classifier = Classifier::empty().with_rule(SameSign);
        assert_eq!(
            classifier.classify(&tx("2", "a"), &tx("1", "b")),
            Some(MatchReason::Rule("same sign"))
        );
        assert_eq!(MatchReason::Rule("same sign").to_string(), "same sign");
    }

    #[test]
    fn test_empty_classifier_never_matches() {
        assert!(!Classifier::empty().is_duplicate(&tx("2", "x"), &tx("1", "x")));
    }
}
