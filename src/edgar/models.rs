// src/edgar/models.rs
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

/// One row of the filer directory.
/// Example: https://www.sec.gov/files/company_tickers.json
#[derive(Debug, Clone, Deserialize)]
pub struct TickerEntry {
    pub cik_str: u64,
    pub ticker: String,
    pub title: String,
}

/// Structure representing the EDGAR company submission index.
/// Only the fields the locator reads are kept.
/// Example: https://data.sec.gov/submissions/CIK0001067983.json
#[derive(Debug, Deserialize)]
pub struct CompanySubmission {
    #[serde(default)]
    pub cik: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tickers: Vec<String>,
    pub filings: Filings,
}

#[derive(Debug, Deserialize)]
pub struct Filings {
    pub recent: FilingsList,
    #[serde(default)]
    pub files: Vec<FilingFile>,
}

/// Older pages of the feed; not followed, the archive crawl covers history.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilingFile {
    pub name: String,
    #[serde(default)]
    pub filing_count: u32,
    #[serde(default)]
    pub filing_from: String,
    #[serde(default)]
    pub filing_to: String,
}

/// Column-oriented listing; index `i` of every vector describes one filing.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilingsList {
    #[serde(default)]
    pub accession_number: Vec<String>,
    #[serde(default)]
    pub filing_date: Vec<String>,
    #[serde(default)]
    pub report_date: Vec<String>,
    #[serde(default)]
    pub form: Vec<String>,
    #[serde(default)]
    pub primary_document: Vec<String>,
}

/// Per-filing manifest.
/// Example: https://www.sec.gov/Archives/edgar/data/1067983/000095012324011775/index.json
#[derive(Debug, Deserialize)]
pub struct FilingManifest {
    pub directory: ManifestDirectory,
}

#[derive(Debug, Deserialize)]
pub struct ManifestDirectory {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub item: Vec<ManifestItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestItem {
    pub name: String,
    #[serde(rename = "last-modified", default)]
    pub last_modified: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

impl ManifestItem {
    pub fn is_xml(&self) -> bool {
        self.name.to_ascii_lowercase().ends_with(".xml")
    }
}

/// Aggregated XBRL facts for one filer.
/// Example: https://data.sec.gov/api/xbrl/companyfacts/CIK0001838359.json
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyFacts {
    #[serde(default)]
    pub entity_name: String,
    #[serde(default)]
    pub facts: HashMap<String, HashMap<String, Concept>>,
}

#[derive(Debug, Deserialize)]
pub struct Concept {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub units: BTreeMap<String, Vec<FactPoint>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FactPoint {
    pub end: String,
    pub val: f64,
    #[serde(default)]
    pub accn: Option<String>,
    #[serde(default)]
    pub fy: Option<i32>,
    #[serde(default)]
    pub fp: Option<String>,
    #[serde(default)]
    pub form: Option<String>,
    #[serde(default)]
    pub filed: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submission_tolerates_missing_columns() {
        let json = r#"{
            "cik": "1067983",
            "name": "BERKSHIRE HATHAWAY INC",
            "filings": {
                "recent": {
                    "accessionNumber": ["0000950123-24-011775"],
                    "filingDate": ["2024-02-14"],
                    "form": ["13F-HR"],
                    "primaryDocument": ["xslForm13F_X02/primary_doc.xml"]
                }
            }
        }"#;
        let submission: CompanySubmission = serde_json::from_str(json).unwrap();
        assert_eq!(submission.filings.recent.form, vec!["13F-HR"]);
        assert!(submission.filings.recent.report_date.is_empty());
        assert!(submission.filings.files.is_empty());
    }

    #[test]
    fn manifest_reads_hyphenated_fields() {
        let json = r#"{"directory": {"name": "/Archives/edgar/data/1067983/000095012324011775",
            "item": [
                {"last-modified": "2024-02-14 16:05:12", "name": "infotable.xml", "type": "text.gif", "size": "3011"},
                {"last-modified": "2024-02-14 16:05:12", "name": "0000950123-24-011775-index.htm", "type": "text.gif", "size": ""}
            ]}}"#;
        let manifest: FilingManifest = serde_json::from_str(json).unwrap();
        assert_eq!(manifest.directory.item.len(), 2);
        assert!(manifest.directory.item[0].is_xml());
        assert!(!manifest.directory.item[1].is_xml());
        assert_eq!(manifest.directory.item[0].last_modified, "2024-02-14 16:05:12");
    }
}
