// src/edgar/filing.rs
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::utils::error::EdgarError;

static ACCESSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{10})-(\d{2})-(\d{6})$").expect("Failed to compile ACCESSION_RE"));

static COMPACT_ACCESSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{10})(\d{2})(\d{6})$").expect("Failed to compile COMPACT_ACCESSION_RE"));

/// Central Index Key. Displayed zero-padded to 10 digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Cik(u64);

impl Cik {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// Archive paths use the unpadded number.
    pub fn archive_segment(&self) -> String {
        self.0.to_string()
    }
}

impl fmt::Display for Cik {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:010}", self.0)
    }
}

impl FromStr for Cik {
    type Err = EdgarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches("CIK");
        if trimmed.is_empty() || trimmed.len() > 10 || !trimmed.chars().all(|c| c.is_ascii_digit()) {
            return Err(EdgarError::InvalidCik(s.to_string()));
        }
        trimmed
            .parse::<u64>()
            .map(Cik)
            .map_err(|_| EdgarError::InvalidCik(s.to_string()))
    }
}

impl From<Cik> for String {
    fn from(cik: Cik) -> Self {
        cik.to_string()
    }
}

impl TryFrom<String> for Cik {
    type Error = EdgarError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Accession number in its dashed form, e.g. `0000950123-24-011775`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct AccessionNumber(String);

impl AccessionNumber {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Dash-stripped form used in archive URLs.
    pub fn compact(&self) -> String {
        self.0.replace('-', "")
    }

    /// Filing year encoded in the middle segment.
    pub fn year(&self) -> i32 {
        let yy: i32 = self.0[11..13].parse().unwrap_or(0);
        // Two-digit years before 1993 do not occur on EDGAR.
        if yy >= 93 {
            1900 + yy
        } else {
            2000 + yy
        }
    }

    /// Accepts either the dashed form or the 18-digit archive folder name.
    pub fn parse_lenient(s: &str) -> Result<Self, EdgarError> {
        let s = s.trim();
        if ACCESSION_RE.is_match(s) {
            return Ok(Self(s.to_string()));
        }
        if let Some(caps) = COMPACT_ACCESSION_RE.captures(s) {
            return Ok(Self(format!("{}-{}-{}", &caps[1], &caps[2], &caps[3])));
        }
        Err(EdgarError::InvalidAccession(s.to_string()))
    }
}

impl fmt::Display for AccessionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AccessionNumber {
    type Err = EdgarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if ACCESSION_RE.is_match(s.trim()) {
            Ok(Self(s.trim().to_string()))
        } else {
            Err(EdgarError::InvalidAccession(s.to_string()))
        }
    }
}

impl From<AccessionNumber> for String {
    fn from(acc: AccessionNumber) -> Self {
        acc.0
    }
}

impl TryFrom<String> for AccessionNumber {
    type Error = EdgarError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A single filing we want to process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilingReference {
    pub cik: Cik,
    pub form_type: String,
    pub accession_number: AccessionNumber,
    pub filing_date: NaiveDate,
    pub primary_document: String,
}

impl FilingReference {
    pub fn year(&self) -> i32 {
        self.filing_date.year()
    }
}

/// Inclusive range of calendar years.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearRange {
    pub start: i32,
    pub end: i32,
}

impl YearRange {
    pub fn new(start: i32, end: i32) -> Result<Self, EdgarError> {
        if start > end {
            return Err(EdgarError::Config(format!("year range {}..={} is empty", start, end)));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, year: i32) -> bool {
        (self.start..=self.end).contains(&year)
    }
}

/// The three disclosure families this crate extracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormFamily {
    /// 13F-HR institutional holdings
    Holdings,
    /// Form 4 insider transactions
    Insider,
    /// Schedule 13D / 13G beneficial ownership
    Ownership,
}

impl FormFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormFamily::Holdings => "holdings",
            FormFamily::Insider => "insider",
            FormFamily::Ownership => "ownership",
        }
    }

    fn forms(&self) -> &'static [&'static str] {
        match self {
            FormFamily::Holdings => &["13F-HR", "13F-HR/A"],
            FormFamily::Insider => &["4", "4/A"],
            FormFamily::Ownership => &[
                "SC 13D",
                "SC 13D/A",
                "SC 13G",
                "SC 13G/A",
                "SCHEDULE 13D",
                "SCHEDULE 13D/A",
                "SCHEDULE 13G",
                "SCHEDULE 13G/A",
            ],
        }
    }

    fn markers(&self) -> &'static [&'static str] {
        match self {
            FormFamily::Holdings => &["13F-HR"],
            // A bare "4" would match nearly any cell.
            FormFamily::Insider => &[],
            FormFamily::Ownership => &["13D", "13G"],
        }
    }
}

impl FromStr for FormFamily {
    type Err = EdgarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "holdings" | "13f" | "13f-hr" => Ok(FormFamily::Holdings),
            "insider" | "4" | "form4" | "form-4" => Ok(FormFamily::Insider),
            "ownership" | "13d" | "13g" | "13d/g" => Ok(FormFamily::Ownership),
            other => Err(EdgarError::Config(format!("unknown form family '{}'", other))),
        }
    }
}

/// Allow-set of form types plus the substrings used to classify rendered
/// archive pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormFilter {
    forms: BTreeSet<String>,
    markers: Vec<String>,
}

impl FormFilter {
    pub fn family(family: FormFamily) -> Self {
        Self {
            forms: family.forms().iter().map(|f| f.to_string()).collect(),
            markers: family.markers().iter().map(|m| m.to_string()).collect(),
        }
    }

    /// Explicit allow-set, matched exactly on both the feed and page text.
    pub fn exact<I, S>(forms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let forms: BTreeSet<String> = forms.into_iter().map(|f| f.into().trim().to_uppercase()).collect();
        Self { markers: Vec::new(), forms }
    }

    /// Exact membership, used on the live feed.
    pub fn allows(&self, form_type: &str) -> bool {
        self.forms.contains(form_type.trim())
    }

    /// Classifies free text scraped from an archive page. Returns the form type
    /// to record, or `None` if the text names no form of interest.
    pub fn classify(&self, text: &str) -> Option<String> {
        let upper = text.trim().to_uppercase();
        if upper.is_empty() {
            return None;
        }
        if self.forms.contains(&upper) {
            return Some(upper);
        }
        if self.markers.iter().any(|m| upper.contains(m.as_str())) {
            return Some(upper);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cik_pads_to_ten_digits() {
        let cik: Cik = "1067983".parse().unwrap();
        assert_eq!(cik.to_string(), "0001067983");
        assert_eq!(cik.archive_segment(), "1067983");
        assert_eq!("0001067983".parse::<Cik>().unwrap(), cik);
        assert!("BRK".parse::<Cik>().is_err());
        assert!("".parse::<Cik>().is_err());
    }

    #[test]
    fn accession_number_forms() {
        let acc: AccessionNumber = "0000950123-24-011775".parse().unwrap();
        assert_eq!(acc.compact(), "000095012324011775");
        assert_eq!(acc.year(), 2024);
        assert!("0000950123-24-01177".parse::<AccessionNumber>().is_err());
        assert!("000095012324011775".parse::<AccessionNumber>().is_err());

        let from_folder = AccessionNumber::parse_lenient("000095012324011775").unwrap();
        assert_eq!(from_folder, acc);
        assert_eq!(AccessionNumber::parse_lenient("0000950123-98-000001").unwrap().year(), 1998);
    }

    #[test]
    fn family_filter_is_exact_on_feed_forms() {
        let filter = FormFilter::family(FormFamily::Holdings);
        assert!(filter.allows("13F-HR"));
        assert!(filter.allows("13F-HR/A"));
        assert!(!filter.allows("13F-NT"));

        let insider = FormFilter::family(FormFamily::Insider);
        assert!(insider.allows("4"));
        assert!(!insider.allows("424B2"));
    }

    #[test]
    fn classify_uses_markers_for_page_text() {
        let ownership = FormFilter::family(FormFamily::Ownership);
        assert_eq!(ownership.classify("sc 13g/a").as_deref(), Some("SC 13G/A"));
        assert_eq!(ownership.classify("SC 13D"), Some("SC 13D".to_string()));
        assert!(ownership.classify("10-K").is_none());

        let insider = FormFilter::family(FormFamily::Insider);
        assert_eq!(insider.classify(" 4 ").as_deref(), Some("4"));
        assert!(insider.classify("424B2").is_none());
    }

    #[test]
    fn year_range_rejects_inverted_bounds() {
        assert!(YearRange::new(2024, 2020).is_err());
        let range = YearRange::new(2020, 2022).unwrap();
        assert!(range.contains(2021));
        assert!(!range.contains(2023));
        assert!(range.contains(2020) && range.contains(2022));
    }
}
