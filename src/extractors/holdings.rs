// src/extractors/holdings.rs
use roxmltree::{Document, Node};

use crate::edgar::filing::FilingReference;
use crate::extractors::xml::{parse_integer, NsScope};
use crate::records::{HoldingRecord, NOT_REPORTED};
use crate::utils::error::ExtractError;

const ROOT: &str = "informationTable";
const ENTRY: &str = "infoTable";

/// Reads every `infoTable` entry of a 13F-HR information table and computes
/// each position's share of the filing total.
///
/// Records come back ordered by value, largest first.
pub fn extract_holdings(xml: &str, filing: &FilingReference) -> Result<Vec<HoldingRecord>, ExtractError> {
    let doc = Document::parse(xml)?;
    let scope = NsScope::of_root(&doc);
    let root = doc.root_element();

    if root.tag_name().name() != ROOT && !scope.descendants(root, ENTRY).any(|_| true) {
        return Err(ExtractError::Parse(format!(
            "expected <{}> root, found <{}>",
            ROOT,
            root.tag_name().name()
        )));
    }

    let mut records: Vec<HoldingRecord> = scope
        .descendants(root, ENTRY)
        .map(|entry| holding_from_entry(&scope, entry, filing))
        .collect();

    if records.is_empty() {
        return Err(ExtractError::NoRecords("info table entries"));
    }

    let total: i64 = records.iter().map(|r| r.value).sum();
    for record in records.iter_mut() {
        record.portfolio_percent = portfolio_percent(record.value, total);
    }
    records.sort_by(|a, b| b.value.cmp(&a.value));

    tracing::debug!(
        "Extracted {} holdings from {} (total value {})",
        records.len(),
        filing.accession_number,
        total
    );
    Ok(records)
}

fn holding_from_entry(scope: &NsScope, entry: Node, filing: &FilingReference) -> HoldingRecord {
    let text = |path: &[&str]| scope.text(entry, path).unwrap_or_else(|| NOT_REPORTED.to_string());
    let number = |path: &[&str]| scope.text(entry, path).and_then(|raw| parse_integer(&raw)).unwrap_or(0);

    HoldingRecord {
        filer_cik: filing.cik,
        accession_number: filing.accession_number.clone(),
        filing_date: filing.filing_date,
        issuer_name: text(&["nameOfIssuer"]),
        class_title: text(&["titleOfClass"]),
        cusip: text(&["cusip"]),
        value: number(&["value"]),
        shares: number(&["shrsOrPrnAmt", "sshPrnamt"]),
        share_type: text(&["shrsOrPrnAmt", "sshPrnamtType"]),
        investment_discretion: text(&["investmentDiscretion"]),
        portfolio_percent: 0.0,
    }
}

fn portfolio_percent(value: i64, total: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let pct = value as f64 / total as f64 * 100.0;
    (pct * 10_000.0).round() / 10_000.0
}
