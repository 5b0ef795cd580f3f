// src/aggregate.rs
//! Merging, de-duplication and ordering of extracted rows.

use std::collections::HashSet;

use chrono::NaiveDate;

use crate::records::{HoldingRecord, OwnershipRecord, TransactionRecord};

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y%m%d", "%m/%d/%Y"];

/// Parses the date formats EDGAR uses in feeds, pages and manifests.
/// A trailing time component ("2024-02-14 16:05:12") is ignored.
pub fn parse_filing_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let date_part = raw.split_whitespace().next().unwrap_or(raw);
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
}

/// Row types the aggregator knows how to merge.
pub trait Record: Clone {
    fn filing_date(&self) -> NaiveDate;
    /// Name used as the secondary sort key.
    fn display_name(&self) -> &str;
    /// Size used by [`SortKey::MagnitudeDesc`].
    fn magnitude(&self) -> f64;
    /// Two rows with equal keys are the same fact reported twice.
    fn dedup_key(&self) -> String;
}

impl Record for HoldingRecord {
    fn filing_date(&self) -> NaiveDate {
        self.filing_date
    }

    fn display_name(&self) -> &str {
        &self.issuer_name
    }

    fn magnitude(&self) -> f64 {
        self.value as f64
    }

    fn dedup_key(&self) -> String {
        format!("{}|{}|{}", self.accession_number, self.issuer_name, self.value)
    }
}

impl Record for OwnershipRecord {
    fn filing_date(&self) -> NaiveDate {
        self.filing_date
    }

    fn display_name(&self) -> &str {
        &self.investor_name
    }

    fn magnitude(&self) -> f64 {
        self.shares_owned.map(|s| s as f64).unwrap_or(0.0)
    }

    fn dedup_key(&self) -> String {
        format!("{}|{}|{}", self.investor_name, self.subject_ticker, self.filing_date)
    }
}

impl Record for TransactionRecord {
    fn filing_date(&self) -> NaiveDate {
        self.filing_date
    }

    fn display_name(&self) -> &str {
        &self.owner_name
    }

    fn magnitude(&self) -> f64 {
        self.shares.unwrap_or(0.0)
    }

    fn dedup_key(&self) -> String {
        format!(
            "{}|{}|{}|{:?}|{}|{:?}|{}",
            self.accession_number,
            self.owner_name,
            self.security_title,
            self.transaction_date,
            self.transaction_code,
            self.shares,
            self.is_derivative
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    /// Filing date newest first, then name ascending.
    #[default]
    Canonical,
    /// Filing date oldest first, then name ascending.
    FilingDateAsc,
    /// Name ascending, then filing date newest first.
    Name,
    /// Largest value / share count first.
    MagnitudeDesc,
}

/// Returns a new de-duplicated, ordered collection. The first occurrence of
/// a duplicate is kept; the sort is stable.
pub fn normalize<R: Record>(records: &[R], key: SortKey) -> Vec<R> {
    let mut seen = HashSet::new();
    let mut out: Vec<R> = records
        .iter()
        .filter(|record| seen.insert(record.dedup_key()))
        .cloned()
        .collect();

    let dropped = records.len() - out.len();
    if dropped > 0 {
        tracing::debug!("Dropped {} duplicate rows", dropped);
    }

    match key {
        SortKey::Canonical => out.sort_by(|a, b| {
            b.filing_date()
                .cmp(&a.filing_date())
                .then_with(|| a.display_name().cmp(b.display_name()))
        }),
        SortKey::FilingDateAsc => out.sort_by(|a, b| {
            a.filing_date()
                .cmp(&b.filing_date())
                .then_with(|| a.display_name().cmp(b.display_name()))
        }),
        SortKey::Name => out.sort_by(|a, b| {
            a.display_name()
                .cmp(b.display_name())
                .then_with(|| b.filing_date().cmp(&a.filing_date()))
        }),
        SortKey::MagnitudeDesc => out.sort_by(|a, b| b.magnitude().total_cmp(&a.magnitude())),
    }
    out
}

/// Concatenates per-filing batches, then normalizes.
pub fn merge_batches<R: Record>(batches: &[Vec<R>], key: SortKey) -> Vec<R> {
    let all: Vec<R> = batches.iter().flatten().cloned().collect();
    normalize(&all, key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edgar::filing::Cik;

    fn ownership(name: &str, date: &str) -> OwnershipRecord {
        OwnershipRecord {
            investor_name: name.to_string(),
            subject_ticker: "RGTI".to_string(),
            form_type: "SC 13G".to_string(),
            filing_date: parse_filing_date(date).unwrap(),
            accession_number: "0001193125-21-034455".parse().unwrap(),
            source_of_funds: None,
            ownership_percent: Some(5.4),
            shares_owned: Some(1_000),
            sole_voting_power: None,
            shared_voting_power: None,
            document_url: String::new(),
            review_flags: Vec::new(),
        }
    }

    fn holding(acc: &str, issuer: &str, value: i64) -> HoldingRecord {
        HoldingRecord {
            filer_cik: Cik::new(1067983),
            accession_number: acc.parse().unwrap(),
            filing_date: parse_filing_date("2024-02-14").unwrap(),
            issuer_name: issuer.to_string(),
            class_title: "COM".to_string(),
            cusip: "037833100".to_string(),
            value,
            shares: 10,
            share_type: "SH".to_string(),
            investment_discretion: "DFND".to_string(),
            portfolio_percent: 0.0,
        }
    }

    #[test]
    fn parses_feed_page_and_manifest_dates() {
        let expected = NaiveDate::from_ymd_opt(2024, 2, 14).unwrap();
        assert_eq!(parse_filing_date("2024-02-14"), Some(expected));
        assert_eq!(parse_filing_date("20240214"), Some(expected));
        assert_eq!(parse_filing_date("02/14/2024"), Some(expected));
        assert_eq!(parse_filing_date("2024-02-14 16:05:12"), Some(expected));
        assert_eq!(parse_filing_date("Feb 14"), None);
    }

    #[test]
    fn canonical_order_is_date_desc_then_name() {
        let rows = vec![
            ownership("VANGUARD GROUP INC", "2023-02-09"),
            ownership("BERYL CAPITAL MANAGEMENT LLC", "2024-02-14"),
            ownership("ALPHA FUND LP", "2024-02-14"),
        ];
        let out = normalize(&rows, SortKey::Canonical);
        let names: Vec<&str> = out.iter().map(|r| r.investor_name.as_str()).collect();
        assert_eq!(names, vec!["ALPHA FUND LP", "BERYL CAPITAL MANAGEMENT LLC", "VANGUARD GROUP INC"]);
        // Inputs untouched.
        assert_eq!(rows[0].investor_name, "VANGUARD GROUP INC");
    }

    #[test]
    fn ownership_duplicates_collapse_on_investor_ticker_date() {
        let mut later_copy = ownership("ALPHA FUND LP", "2024-02-14");
        later_copy.ownership_percent = Some(9.9);
        let rows = vec![ownership("ALPHA FUND LP", "2024-02-14"), later_copy];
        let out = normalize(&rows, SortKey::Canonical);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].ownership_percent, Some(5.4));
    }

    #[test]
    fn holdings_dedup_uses_accession_issuer_value() {
        let batches = vec![
            vec![holding("0000950123-24-011775", "APPLE INC", 100), holding("0000950123-24-011775", "APPLE INC", 100)],
            vec![holding("0000950123-23-005555", "APPLE INC", 100)],
        ];
        let out = merge_batches(&batches, SortKey::MagnitudeDesc);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn magnitude_sort_puts_largest_first() {
        let rows = vec![
            holding("0000950123-24-011775", "SMALL", 5),
            holding("0000950123-24-011775", "LARGE", 500),
            holding("0000950123-24-011775", "MID", 50),
        ];
        let out = normalize(&rows, SortKey::MagnitudeDesc);
        let names: Vec<&str> = out.iter().map(|r| r.issuer_name.as_str()).collect();
        assert_eq!(names, vec!["LARGE", "MID", "SMALL"]);
    }
}
