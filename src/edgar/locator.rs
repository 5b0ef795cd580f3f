// src/edgar/locator.rs
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Datelike;
use futures::stream::{self, StreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use tokio_util::sync::CancellationToken;

use crate::aggregate::parse_filing_date;
use crate::edgar::client::EdgarClient;
use crate::edgar::filing::{AccessionNumber, Cik, FilingReference, FormFilter, YearRange};
use crate::edgar::models::CompanySubmission;
use crate::utils::error::EdgarError;

// --- CSS Selectors (Lazy Static) ---
static LINK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("Failed to compile LINK_SELECTOR"));

static FORM_NAME_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("#formName").expect("Failed to compile FORM_NAME_SELECTOR"));

static CELL_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("td").expect("Failed to compile CELL_SELECTOR"));

// --- Regex Patterns (Lazy Static) ---
// "Form SC 13G/A - Statement of acquisition ..." -> "SC 13G/A"
static FORM_HEADER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^FORM\s+(.+?)(?:\s+-\s|\s*$)").expect("Failed to compile FORM_HEADER_RE"));

static FILING_DATE_LABEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"FILING DATE\s*:?\s*(\d{4}-\d{2}-\d{2})").expect("Failed to compile FILING_DATE_LABEL_RE")
});

static BARE_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("Failed to compile BARE_DATE_RE"));

// Longest cell text still treated as a form-type cell.
const MAX_FORM_CELL_LEN: usize = 32;

/// A way of enumerating a filer's filings. The locator merges several.
#[async_trait]
pub trait FilingSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn list_filings(
        &self,
        cik: Cik,
        filter: &FormFilter,
        years: Option<YearRange>,
        cancel: &CancellationToken,
    ) -> Result<Vec<FilingReference>, EdgarError>;
}

/// Recent filings from the submissions feed. Bounded to a rolling window.
pub struct LiveFeed {
    client: Arc<EdgarClient>,
}

impl LiveFeed {
    pub fn new(client: Arc<EdgarClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FilingSource for LiveFeed {
    fn name(&self) -> &'static str {
        "live feed"
    }

    async fn list_filings(
        &self,
        cik: Cik,
        filter: &FormFilter,
        years: Option<YearRange>,
        _cancel: &CancellationToken,
    ) -> Result<Vec<FilingReference>, EdgarError> {
        let url = self.client.submissions_url(cik)?;
        let submission: CompanySubmission = self.client.get_json(&url).await?;
        let recent = &submission.filings.recent;

        let mut filings = Vec::new();
        for (i, form) in recent.form.iter().enumerate() {
            if !filter.allows(form) {
                continue;
            }
            let (Some(raw_acc), Some(raw_date)) = (recent.accession_number.get(i), recent.filing_date.get(i)) else {
                tracing::warn!("Submissions feed for {} is missing columns at row {}", cik, i);
                continue;
            };
            let accession_number = match raw_acc.parse::<AccessionNumber>() {
                Ok(acc) => acc,
                Err(e) => {
                    tracing::warn!("Skipping feed row {}: {}", i, e);
                    continue;
                }
            };
            let Some(filing_date) = parse_filing_date(raw_date) else {
                tracing::warn!("Skipping {}: unparseable filing date '{}'", accession_number, raw_date);
                continue;
            };
            if years.is_some_and(|range| !range.contains(filing_date.year())) {
                continue;
            }

            filings.push(FilingReference {
                cik,
                form_type: form.trim().to_string(),
                accession_number,
                filing_date,
                primary_document: recent.primary_document.get(i).cloned().unwrap_or_default(),
            });
        }

        tracing::info!("Live feed lists {} matching filings for {} ({})", filings.len(), cik, submission.name);
        Ok(filings)
    }
}

/// Walks the filer's archive folder and reads each candidate's index page.
/// Only runs when a year range is given.
pub struct ArchiveCrawler {
    client: Arc<EdgarClient>,
}

impl ArchiveCrawler {
    pub fn new(client: Arc<EdgarClient>) -> Self {
        Self { client }
    }

    async fn inspect(
        &self,
        cik: Cik,
        accession: AccessionNumber,
        filter: &FormFilter,
        cancel: &CancellationToken,
    ) -> Result<Option<FilingReference>, EdgarError> {
        if cancel.is_cancelled() {
            return Ok(None);
        }
        let url = self.client.index_page_url(cik, &accession)?;
        let page = self.client.get_text(&url).await?;
        Ok(parse_index_page(&page, cik, accession, filter))
    }
}

#[async_trait]
impl FilingSource for ArchiveCrawler {
    fn name(&self) -> &'static str {
        "archive crawl"
    }

    async fn list_filings(
        &self,
        cik: Cik,
        filter: &FormFilter,
        years: Option<YearRange>,
        cancel: &CancellationToken,
    ) -> Result<Vec<FilingReference>, EdgarError> {
        let Some(years) = years else {
            return Ok(Vec::new());
        };

        let listing = self.client.get_text(&self.client.archive_dir_url(cik)?).await?;

        // Bucket candidates by the filing year encoded in the accession number.
        let mut periods: BTreeMap<i32, Vec<AccessionNumber>> = BTreeMap::new();
        for accession in parse_directory_listing(&listing) {
            if years.contains(accession.year()) {
                periods.entry(accession.year()).or_default().push(accession);
            }
        }

        let workers = self.client.config().crawl_concurrency.max(1);
        let mut filings = Vec::new();

        for (year, candidates) in periods.into_iter().rev() {
            if cancel.is_cancelled() {
                tracing::info!("Archive crawl cancelled before {}", year);
                break;
            }
            tracing::info!("Crawling {} archive candidates for {} in {}", candidates.len(), cik, year);

            let results: Vec<_> = stream::iter(candidates)
                .map(|accession| self.inspect(cik, accession, filter, cancel))
                .buffer_unordered(workers)
                .collect()
                .await;

            for result in results {
                match result {
                    Ok(Some(filing)) if years.contains(filing.year()) => filings.push(filing),
                    Ok(_) => {}
                    Err(e) if e.is_access_denied() => return Err(e),
                    Err(e) => tracing::warn!("Skipping archive candidate: {}", e),
                }
            }
        }

        tracing::info!("Archive crawl found {} matching filings for {}", filings.len(), cik);
        Ok(filings)
    }
}

/// Accession folders linked from an archive directory listing, in page order.
pub fn parse_directory_listing(html: &str) -> Vec<AccessionNumber> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut found = Vec::new();

    for link in document.select(&LINK_SELECTOR) {
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let segment = href.trim_end_matches('/').rsplit('/').next().unwrap_or_default();
        if let Ok(accession) = AccessionNumber::parse_lenient(segment) {
            if seen.insert(accession.clone()) {
                found.push(accession);
            }
        }
    }
    found
}

/// Reads form type, filing date and primary document from a filing's
/// `-index.htm` page. Returns `None` when the page names no form of interest
/// or carries no filing date.
pub fn parse_index_page(
    html: &str,
    cik: Cik,
    accession: AccessionNumber,
    filter: &FormFilter,
) -> Option<FilingReference> {
    let document = Html::parse_document(html);

    let from_header = document.select(&FORM_NAME_SELECTOR).next().and_then(|el| {
        let text = collapse(&el.text().collect::<Vec<_>>().join(" ")).to_uppercase();
        FORM_HEADER_RE
            .captures(&text)
            .and_then(|caps| filter.classify(&caps[1]))
    });

    let cells: Vec<String> = document
        .select(&CELL_SELECTOR)
        .map(|cell| collapse(&cell.text().collect::<Vec<_>>().join(" ")))
        .collect();

    let form_type = from_header.or_else(|| {
        cells
            .iter()
            .filter(|text| text.len() <= MAX_FORM_CELL_LEN)
            .find_map(|text| filter.classify(text))
    })?;

    let page_text = collapse(&document.root_element().text().collect::<Vec<_>>().join(" ")).to_uppercase();
    let filing_date = FILING_DATE_LABEL_RE
        .captures(&page_text)
        .and_then(|caps| parse_filing_date(&caps[1]))
        .or_else(|| {
            cells
                .iter()
                .find(|text| BARE_DATE_RE.is_match(text))
                .and_then(|text| parse_filing_date(text))
        })?;

    let folder = format!("/{}/", accession.compact());
    let primary_document = document
        .select(&LINK_SELECTOR)
        .filter_map(|link| link.value().attr("href"))
        .map(|href| href.split("doc=").last().unwrap_or(href))
        .filter(|href| {
            let lower = href.to_ascii_lowercase();
            let is_document = [".htm", ".html", ".xml", ".txt"].iter().any(|ext| lower.ends_with(ext));
            is_document && !lower.ends_with("-index.htm") && !lower.ends_with("-index.html")
        })
        .map(|href| match href.find(&folder) {
            Some(pos) => href[pos + folder.len()..].to_string(),
            None => href.rsplit('/').next().unwrap_or(href).to_string(),
        })
        .next()
        .unwrap_or_default();

    tracing::debug!("Archive page {} classified as {} filed {}", accession, form_type, filing_date);

    Some(FilingReference {
        cik,
        form_type,
        accession_number: accession,
        filing_date,
        primary_document,
    })
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Unions two listings by accession number. The live feed's entry wins on
/// conflict. Output is ordered by filing date, newest first.
pub fn merge_filings(live: Vec<FilingReference>, crawled: Vec<FilingReference>) -> Vec<FilingReference> {
    let mut by_accession: BTreeMap<AccessionNumber, FilingReference> = BTreeMap::new();
    for filing in crawled {
        by_accession.entry(filing.accession_number.clone()).or_insert(filing);
    }
    for filing in live {
        if let Some(previous) = by_accession.get(&filing.accession_number) {
            if previous.form_type != filing.form_type {
                tracing::debug!(
                    "{}: live feed form '{}' overrides archive form '{}'",
                    filing.accession_number,
                    filing.form_type,
                    previous.form_type
                );
            }
        }
        by_accession.insert(filing.accession_number.clone(), filing);
    }

    let mut merged: Vec<FilingReference> = by_accession.into_values().collect();
    merged.sort_by(|a, b| {
        b.filing_date
            .cmp(&a.filing_date)
            .then_with(|| b.accession_number.cmp(&a.accession_number))
    });
    merged
}

/// A source that failed without taking the whole listing down.
#[derive(Debug, Clone)]
pub struct SourceFailure {
    pub source: &'static str,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct Located {
    pub filings: Vec<FilingReference>,
    pub failures: Vec<SourceFailure>,
}

/// Enumerates filings of a form family for one filer.
pub struct FilingLocator {
    live: Box<dyn FilingSource>,
    archive: Box<dyn FilingSource>,
}

impl FilingLocator {
    pub fn new(client: Arc<EdgarClient>) -> Self {
        Self {
            live: Box::new(LiveFeed::new(Arc::clone(&client))),
            archive: Box::new(ArchiveCrawler::new(client)),
        }
    }

    pub fn with_sources(live: Box<dyn FilingSource>, archive: Box<dyn FilingSource>) -> Self {
        Self { live, archive }
    }

    /// Access denial is returned as an error; any other source failure is
    /// recorded and the remaining source still contributes.
    pub async fn locate(
        &self,
        cik: Cik,
        filter: &FormFilter,
        years: Option<YearRange>,
        cancel: &CancellationToken,
    ) -> Result<Located, EdgarError> {
        let mut failures = Vec::new();

        let live = Self::collect(self.live.as_ref(), cik, filter, years, cancel, &mut failures).await?;
        let crawled = if years.is_some() && !cancel.is_cancelled() {
            Self::collect(self.archive.as_ref(), cik, filter, years, cancel, &mut failures).await?
        } else {
            Vec::new()
        };

        let filings = merge_filings(live, crawled);
        tracing::info!("Located {} filings for {}", filings.len(), cik);
        Ok(Located { filings, failures })
    }

    async fn collect(
        source: &dyn FilingSource,
        cik: Cik,
        filter: &FormFilter,
        years: Option<YearRange>,
        cancel: &CancellationToken,
        failures: &mut Vec<SourceFailure>,
    ) -> Result<Vec<FilingReference>, EdgarError> {
        match source.list_filings(cik, filter, years, cancel).await {
            Ok(filings) => Ok(filings),
            Err(e) if e.is_access_denied() => Err(e),
            Err(e) => {
                tracing::warn!("{} failed for {}: {}", source.name(), cik, e);
                failures.push(SourceFailure {
                    source: source.name(),
                    reason: e.to_string(),
                });
                Ok(Vec::new())
            }
        }
    }
}
