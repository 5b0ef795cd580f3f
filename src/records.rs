// src/records.rs
//! Normalized rows produced by the extractors. All of them are plain,
//! serializable values; a run never mutates one after creation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::edgar::filing::{AccessionNumber, Cik};

/// Placeholder for text fields a filing leaves out.
pub const NOT_REPORTED: &str = "N/A";

/// One info-table row of a 13F-HR filing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingRecord {
    pub filer_cik: Cik,
    pub accession_number: AccessionNumber,
    pub filing_date: NaiveDate,
    pub issuer_name: String,
    pub class_title: String,
    pub cusip: String,
    /// Reported market value, in the filing's reporting currency.
    pub value: i64,
    pub shares: i64,
    pub share_type: String,
    pub investment_discretion: String,
    /// value / filing total × 100, rounded to 4 decimals.
    pub portfolio_percent: f64,
}

/// Form 4 transaction codes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TransactionCode {
    /// P: open market or private purchase
    Purchase,
    /// S: open market or private sale
    Sale,
    /// A: grant or award
    Award,
    /// D: disposition to the issuer
    DispositionToIssuer,
    /// F: payment of exercise price or tax by delivering securities
    TaxWithholding,
    /// M: exercise or conversion of a derivative exempted under 16b-3
    OptionExercise,
    /// C: conversion of a derivative security
    Conversion,
    /// X: exercise of an in-the-money or at-the-money derivative
    InTheMoneyExercise,
    /// G: bona fide gift
    Gift,
    /// J: other acquisition or disposition
    Other,
    /// Any code not listed above, kept verbatim.
    Unrecognized(String),
    /// The filing omitted the code.
    Missing,
}

impl TransactionCode {
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_ascii_uppercase().as_str() {
            "" => TransactionCode::Missing,
            "P" => TransactionCode::Purchase,
            "S" => TransactionCode::Sale,
            "A" => TransactionCode::Award,
            "D" => TransactionCode::DispositionToIssuer,
            "F" => TransactionCode::TaxWithholding,
            "M" => TransactionCode::OptionExercise,
            "C" => TransactionCode::Conversion,
            "X" => TransactionCode::InTheMoneyExercise,
            "G" => TransactionCode::Gift,
            "J" => TransactionCode::Other,
            other => TransactionCode::Unrecognized(other.to_string()),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            TransactionCode::Purchase => "P",
            TransactionCode::Sale => "S",
            TransactionCode::Award => "A",
            TransactionCode::DispositionToIssuer => "D",
            TransactionCode::TaxWithholding => "F",
            TransactionCode::OptionExercise => "M",
            TransactionCode::Conversion => "C",
            TransactionCode::InTheMoneyExercise => "X",
            TransactionCode::Gift => "G",
            TransactionCode::Other => "J",
            TransactionCode::Unrecognized(code) => code,
            TransactionCode::Missing => NOT_REPORTED,
        }
    }
}

impl fmt::Display for TransactionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl Serialize for TransactionCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

impl<'de> Deserialize<'de> for TransactionCode {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw == NOT_REPORTED {
            return Ok(TransactionCode::Missing);
        }
        Ok(TransactionCode::from_code(&raw))
    }
}

/// One Form 4 transaction row, non-derivative or derivative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub accession_number: AccessionNumber,
    pub filing_date: NaiveDate,
    pub issuer_cik: String,
    pub issuer_ticker: String,
    pub owner_name: String,
    pub security_title: String,
    pub transaction_date: Option<NaiveDate>,
    pub transaction_code: TransactionCode,
    pub shares: Option<f64>,
    pub price_per_share: Option<f64>,
    /// "A" acquired or "D" disposed.
    pub acquired_disposed_code: String,
    pub shares_owned_after: Option<f64>,
    /// "D" direct or "I" indirect.
    pub ownership_type: String,
    pub is_derivative: bool,
    pub exercise_price: Option<f64>,
    pub expiration_date: Option<NaiveDate>,
    pub underlying_security_title: Option<String>,
    pub underlying_shares: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issuer {
    pub cik: String,
    pub name: String,
    pub ticker: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportingOwner {
    pub cik: String,
    pub name: String,
    pub is_director: bool,
    pub is_officer: bool,
    pub is_ten_percent_owner: bool,
    pub is_other: bool,
    pub officer_title: Option<String>,
}

/// Everything read from one ownership document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsiderReport {
    pub issuer: Issuer,
    pub owners: Vec<ReportingOwner>,
    pub transactions: Vec<TransactionRecord>,
}

/// Issuer and reporting owners of one Form 4, without its transaction rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsiderFiling {
    pub accession_number: AccessionNumber,
    pub filing_date: NaiveDate,
    pub issuer: Issuer,
    pub owners: Vec<ReportingOwner>,
}

/// One reporting person's stake from a 13D/13G cover page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnershipRecord {
    pub investor_name: String,
    pub subject_ticker: String,
    pub form_type: String,
    pub filing_date: NaiveDate,
    pub accession_number: AccessionNumber,
    pub source_of_funds: Option<String>,
    pub ownership_percent: Option<f64>,
    pub shares_owned: Option<u64>,
    pub sole_voting_power: Option<u64>,
    pub shared_voting_power: Option<u64>,
    pub document_url: String,
    /// Fields resolved only by the generic trailing-number strategy.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub review_flags: Vec<String>,
}

/// One point of a filer's shares-outstanding series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharesOutstandingPoint {
    pub end_date: NaiveDate,
    pub value: u64,
    pub form: Option<String>,
    pub filed_date: Option<NaiveDate>,
    pub fiscal_year: Option<i32>,
    pub fiscal_period: Option<String>,
    pub accession_number: Option<String>,
}

/// Latest reported value of each key us-gaap concept. A concept the filer
/// never reported stays `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialSnapshot {
    pub entity_name: String,
    pub total_assets: Option<f64>,
    pub total_liabilities: Option<f64>,
    pub stockholders_equity: Option<f64>,
    pub revenue: Option<f64>,
    pub net_income: Option<f64>,
    pub operating_income: Option<f64>,
    pub gross_profit: Option<f64>,
    pub ebit: Option<f64>,
    pub ebitda: Option<f64>,
    pub eps_basic: Option<f64>,
    pub eps_diluted: Option<f64>,
    pub operating_cash_flow: Option<f64>,
    pub capital_expenditures: Option<f64>,
    /// Operating cash flow less capital expenditures, when both are known.
    pub free_cash_flow: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_code_keeps_unknown_letters() {
        assert_eq!(TransactionCode::from_code("s"), TransactionCode::Sale);
        assert_eq!(TransactionCode::from_code("W"), TransactionCode::Unrecognized("W".into()));
        assert_eq!(TransactionCode::from_code("  "), TransactionCode::Missing);
        assert_eq!(TransactionCode::Missing.to_string(), NOT_REPORTED);
    }

    #[test]
    fn transaction_code_serializes_as_letter() {
        let json = serde_json::to_string(&TransactionCode::OptionExercise).unwrap();
        assert_eq!(json, "\"M\"");
        let back: TransactionCode = serde_json::from_str("\"N/A\"").unwrap();
        assert_eq!(back, TransactionCode::Missing);
    }
}
