// src/extractors/strategy.rs
//! Ordered pattern strategies for pulling one field out of free text.
//!
//! A field is described by a [`FieldRule`]: a list of strategies from most to
//! least specific plus a validator. Resolution stops at the first strategy
//! whose capture passes validation, so a loose pattern can never override a
//! stricter one that already produced a valid value.

use regex::Regex;
use serde::Serialize;

/// How much a resolved value can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    /// Generic trailing-number capture. Flagged for review.
    Fallback,
    /// Label text matched, item number absent.
    Labelled,
    /// Item number and label matched together.
    Anchored,
}

pub struct Strategy {
    pub name: &'static str,
    pub confidence: Confidence,
    pattern: Regex,
}

impl Strategy {
    /// Builds a strategy from a constant pattern. The first capture group is
    /// the candidate value.
    pub fn new(name: &'static str, confidence: Confidence, pattern: &str) -> Self {
        Self {
            name,
            confidence,
            pattern: Regex::new(pattern).expect("Failed to compile strategy pattern"),
        }
    }

    fn capture<'t>(&self, text: &'t str) -> Option<&'t str> {
        self.pattern.captures(text)?.get(1).map(|m| m.as_str())
    }
}

pub type Validator<T> = fn(&str) -> Option<T>;

pub struct FieldRule<T> {
    pub field: &'static str,
    strategies: Vec<Strategy>,
    validate: Validator<T>,
}

/// A resolved value and the strategy that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMatch<T> {
    pub value: T,
    pub strategy: &'static str,
    pub confidence: Confidence,
    /// 1-based position of the winning strategy.
    pub attempts: usize,
}

impl<T> FieldRule<T> {
    pub fn new(field: &'static str, strategies: Vec<Strategy>, validate: Validator<T>) -> Self {
        Self {
            field,
            strategies,
            validate,
        }
    }

    pub fn resolve(&self, text: &str) -> Option<FieldMatch<T>> {
        for (index, strategy) in self.strategies.iter().enumerate() {
            let Some(raw) = strategy.capture(text) else {
                continue;
            };
            match (self.validate)(raw) {
                Some(value) => {
                    return Some(FieldMatch {
                        value,
                        strategy: strategy.name,
                        confidence: strategy.confidence,
                        attempts: index + 1,
                    })
                }
                None => tracing::trace!("{}: '{}' from {} failed validation", self.field, raw, strategy.name),
            }
        }
        None
    }
}

/// Accepts 0..=100, with or without a trailing percent sign.
pub fn percent(raw: &str) -> Option<f64> {
    let value: f64 = raw.trim().trim_end_matches('%').trim().parse().ok()?;
    (value.is_finite() && (0.0..=100.0).contains(&value)).then_some(value)
}

/// Accepts a non-negative integer once grouping commas are removed.
pub fn share_count(raw: &str) -> Option<u64> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    cleaned.parse().ok()
}

const FUND_SOURCES: &[&str] = &["BK", "AF", "WC", "PF", "OO", "SC"];

/// Accepts one of the cover-page source-of-funds codes.
pub fn fund_source(raw: &str) -> Option<String> {
    let code = raw.trim().to_ascii_uppercase();
    FUND_SOURCES.contains(&code.as_str()).then_some(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule() -> FieldRule<f64> {
        FieldRule::new(
            "percent",
            vec![
                Strategy::new("strict", Confidence::Anchored, r"STRICT\s+(\d+(?:\.\d+)?)"),
                Strategy::new("loose", Confidence::Fallback, r"(\d+(?:\.\d+)?)\s*$"),
            ],
            percent,
        )
    }

    #[test]
    fn first_valid_strategy_wins() {
        let found = rule().resolve("STRICT 5.4 ... 12").unwrap();
        assert_eq!(found.value, 5.4);
        assert_eq!(found.strategy, "strict");
        assert_eq!(found.attempts, 1);
    }

    #[test]
    fn invalid_capture_falls_through() {
        let found = rule().resolve("STRICT 150 ... 12").unwrap();
        assert_eq!(found.value, 12.0);
        assert_eq!(found.confidence, Confidence::Fallback);
        assert_eq!(found.attempts, 2);

        assert!(rule().resolve("STRICT 150 ... 120").is_none());
    }

    #[test]
    fn validators() {
        assert_eq!(percent("5.4%"), Some(5.4));
        assert_eq!(percent("100"), Some(100.0));
        assert_eq!(percent("100.1"), None);
        assert_eq!(share_count("1,234,567"), Some(1_234_567));
        assert_eq!(share_count("1.5"), None);
        assert_eq!(share_count("N/A"), None);
        assert_eq!(fund_source("wc").as_deref(), Some("WC"));
        assert_eq!(fund_source("XX"), None);
    }

    #[test]
    fn confidence_orders_weakest_first() {
        assert!(Confidence::Fallback < Confidence::Labelled);
        assert!(Confidence::Labelled < Confidence::Anchored);
    }
}
