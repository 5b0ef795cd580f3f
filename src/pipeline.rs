// src/pipeline.rs
//! Resolve, locate, fetch, extract, aggregate.
//!
//! One [`Pipeline`] owns a shared client and the components built on it. A run
//! processes one filing at a time; a failing filing is recorded in the
//! [`RunSummary`] and the run moves on. Only access denial stops a run early.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::aggregate::{merge_batches, SortKey};
use crate::edgar::cik::CikResolver;
use crate::edgar::client::{ClientConfig, EdgarClient};
use crate::edgar::fetcher::{DocumentFetcher, FetchedDocument};
use crate::edgar::filing::{AccessionNumber, Cik, FilingReference, FormFamily, FormFilter, YearRange};
use crate::edgar::locator::FilingLocator;
use crate::extractors::{extract_holdings, extract_insider, CoverPageExtractor, OwnershipContext};
use crate::records::{HoldingRecord, InsiderFiling, OwnershipRecord, TransactionRecord};
use crate::utils::error::{EdgarError, ExtractError};

/// Who to extract for: a CIK, or a ticker / company-name query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilerQuery {
    Cik(Cik),
    Lookup(String),
}

impl FromStr for FilerQuery {
    type Err = EdgarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(EdgarError::Config("filer query is empty".to_string()));
        }
        Ok(match trimmed.parse::<Cik>() {
            Ok(cik) => FilerQuery::Cik(cik),
            Err(_) => FilerQuery::Lookup(trimmed.to_string()),
        })
    }
}

impl fmt::Display for FilerQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilerQuery::Cik(cik) => write!(f, "CIK {}", cik),
            FilerQuery::Lookup(query) => f.write_str(query),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub filer: FilerQuery,
    pub family: FormFamily,
    /// Explicit allow-set replacing the family's default forms.
    pub forms: Option<FormFilter>,
    pub years: Option<YearRange>,
    /// Maximum number of filings to process, newest first.
    pub limit: Option<usize>,
    /// Case-insensitive substring filter on investor names (ownership only).
    pub investor_filter: Option<String>,
    pub sort: SortKey,
}

impl ExtractionRequest {
    pub fn new(filer: FilerQuery, family: FormFamily) -> Self {
        Self {
            filer,
            family,
            forms: None,
            years: None,
            limit: None,
            investor_filter: None,
            sort: SortKey::default(),
        }
    }

    pub fn with_forms(mut self, forms: FormFilter) -> Self {
        self.forms = Some(forms);
        self
    }

    pub fn with_years(mut self, years: YearRange) -> Self {
        self.years = Some(years);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_investor(mut self, investor: impl Into<String>) -> Self {
        self.investor_filter = Some(investor.into());
        self
    }

    pub fn with_sort(mut self, sort: SortKey) -> Self {
        self.sort = sort;
        self
    }

    fn filter(&self) -> FormFilter {
        self.forms.clone().unwrap_or_else(|| FormFilter::family(self.family))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Locate,
    Fetch,
    Parse,
}

/// A unit of work that produced nothing, and why.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedUnit {
    pub accession_number: Option<AccessionNumber>,
    pub stage: Stage,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub filings_located: usize,
    pub filings_processed: usize,
    pub skipped: Vec<SkippedUnit>,
    pub cancelled: bool,
    /// Set when EDGAR refused access and the run stopped early.
    pub aborted: Option<String>,
}

impl RunSummary {
    pub fn failure_count(&self) -> usize {
        self.skipped.len()
    }

    fn skip(&mut self, accession_number: Option<&AccessionNumber>, stage: Stage, reason: impl fmt::Display) {
        self.skipped.push(SkippedUnit {
            accession_number: accession_number.cloned(),
            stage,
            reason: reason.to_string(),
        });
    }
}

/// Everything one request produced.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionRun {
    pub cik: Cik,
    pub company_name: Option<String>,
    pub family: FormFamily,
    pub holdings: Vec<HoldingRecord>,
    pub transactions: Vec<TransactionRecord>,
    pub insider_filings: Vec<InsiderFiling>,
    pub ownership: Vec<OwnershipRecord>,
    pub summary: RunSummary,
}

impl ExtractionRun {
    fn empty(filer: &ResolvedFiler, family: FormFamily) -> Self {
        Self {
            cik: filer.cik,
            company_name: filer.name.clone(),
            family,
            holdings: Vec::new(),
            transactions: Vec::new(),
            insider_filings: Vec::new(),
            ownership: Vec::new(),
            summary: RunSummary::default(),
        }
    }

    pub fn record_count(&self) -> usize {
        self.holdings.len() + self.transactions.len() + self.ownership.len()
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedFiler {
    pub cik: Cik,
    pub name: Option<String>,
    pub ticker: Option<String>,
}

/// Per-filing batches collected during a run, merged once at the end.
#[derive(Default)]
struct Collected {
    holdings: Vec<Vec<HoldingRecord>>,
    transactions: Vec<Vec<TransactionRecord>>,
    insider_filings: Vec<InsiderFiling>,
    ownership: Vec<Vec<OwnershipRecord>>,
}

pub struct Pipeline {
    client: Arc<EdgarClient>,
    resolver: CikResolver,
    locator: FilingLocator,
    fetcher: DocumentFetcher,
    covers: CoverPageExtractor,
}

impl Pipeline {
    pub fn new(client: Arc<EdgarClient>) -> Self {
        Self {
            resolver: CikResolver::new(Arc::clone(&client)),
            locator: FilingLocator::new(Arc::clone(&client)),
            fetcher: DocumentFetcher::new(Arc::clone(&client)),
            covers: CoverPageExtractor::new(),
            client,
        }
    }

    pub fn from_config(config: ClientConfig) -> Result<Self, EdgarError> {
        Ok(Self::new(Arc::new(EdgarClient::new(config)?)))
    }

    pub fn with_locator(mut self, locator: FilingLocator) -> Self {
        self.locator = locator;
        self
    }

    pub fn client(&self) -> &Arc<EdgarClient> {
        &self.client
    }

    pub async fn resolve(&self, query: &FilerQuery) -> Result<ResolvedFiler, EdgarError> {
        match query {
            FilerQuery::Cik(cik) => Ok(ResolvedFiler {
                cik: *cik,
                name: None,
                ticker: None,
            }),
            FilerQuery::Lookup(text) => {
                let entry = self.resolver.resolve(text).await?;
                Ok(ResolvedFiler {
                    cik: entry.cik,
                    name: Some(entry.name),
                    ticker: Some(entry.ticker),
                })
            }
        }
    }

    /// Runs one request. Resolution failures are returned as errors; every
    /// later failure is recorded in the run's summary.
    pub async fn run(&self, request: &ExtractionRequest, cancel: &CancellationToken) -> Result<ExtractionRun, EdgarError> {
        let filer = self.resolve(&request.filer).await?;
        let mut run = ExtractionRun::empty(&filer, request.family);

        if cancel.is_cancelled() {
            tracing::info!("Run for {} cancelled before start", filer.cik);
            run.summary.cancelled = true;
            return Ok(run);
        }

        tracing::info!("Locating {} filings for {}", request.family.as_str(), filer.cik);
        let located = match self.locator.locate(filer.cik, &request.filter(), request.years, cancel).await {
            Ok(located) => located,
            Err(e) if e.is_access_denied() => {
                tracing::error!("Aborting run for {}: {}", filer.cik, e);
                run.summary.aborted = Some(e.to_string());
                return Ok(run);
            }
            Err(e) => return Err(e),
        };
        for failure in &located.failures {
            run.summary
                .skip(None, Stage::Locate, format!("{}: {}", failure.source, failure.reason));
        }
        run.summary.filings_located = located.filings.len();

        let mut filings = located.filings;
        if let Some(limit) = request.limit {
            filings.truncate(limit);
        }

        let subject_ticker = match request.family {
            FormFamily::Ownership => self.subject_ticker(&filer).await,
            _ => String::new(),
        };

        let mut collected = Collected::default();
        for filing in &filings {
            if cancel.is_cancelled() {
                tracing::info!("Run for {} cancelled after {} filings", filer.cik, run.summary.filings_processed);
                run.summary.cancelled = true;
                break;
            }

            let document = match self.fetcher.fetch(filing, request.family).await {
                Ok(document) => document,
                Err(e) if e.is_access_denied() => {
                    tracing::error!("Aborting run for {}: {}", filer.cik, e);
                    run.summary.aborted = Some(e.to_string());
                    break;
                }
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", filing.accession_number, e);
                    run.summary.skip(Some(&filing.accession_number), Stage::Fetch, e);
                    continue;
                }
            };

            match self.extract_document(filing, &document, request, &subject_ticker, &mut collected) {
                Ok(count) => {
                    tracing::info!(
                        "{} {} ({}): {} records",
                        filing.form_type,
                        filing.accession_number,
                        filing.filing_date,
                        count
                    );
                    run.summary.filings_processed += 1;
                }
                Err(e) => {
                    tracing::warn!("Could not parse {} in {}: {}", document.file_name, filing.accession_number, e);
                    run.summary.skip(Some(&filing.accession_number), Stage::Parse, e);
                }
            }
        }

        run.holdings = merge_batches(&collected.holdings, request.sort);
        run.transactions = merge_batches(&collected.transactions, request.sort);
        run.ownership = merge_batches(&collected.ownership, request.sort);
        run.insider_filings = collected.insider_filings;

        tracing::info!(
            "Finished {}: {} filings processed, {} skipped, {} records",
            filer.cik,
            run.summary.filings_processed,
            run.summary.failure_count(),
            run.record_count()
        );
        Ok(run)
    }

    /// Runs requests in order. A failed resolution fails only its own entry;
    /// access denial ends the batch.
    pub async fn run_batch(
        &self,
        requests: &[ExtractionRequest],
        cancel: &CancellationToken,
    ) -> Vec<Result<ExtractionRun, EdgarError>> {
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            let result = self.run(request, cancel).await;
            let denied = match &result {
                Ok(run) => run.summary.aborted.is_some(),
                Err(e) => {
                    tracing::warn!("Request for {} failed: {}", request.filer, e);
                    e.is_access_denied()
                }
            };
            results.push(result);
            if denied {
                tracing::error!("Access denied, skipping {} remaining requests", requests.len() - results.len());
                break;
            }
        }
        results
    }

    fn extract_document(
        &self,
        filing: &FilingReference,
        document: &FetchedDocument,
        request: &ExtractionRequest,
        subject_ticker: &str,
        collected: &mut Collected,
    ) -> Result<usize, ExtractError> {
        match request.family {
            FormFamily::Holdings => {
                let records = extract_holdings(&document.content, filing)?;
                let count = records.len();
                collected.holdings.push(records);
                Ok(count)
            }
            FormFamily::Insider => {
                let report = extract_insider(&document.content, filing)?;
                let count = report.transactions.len();
                collected.insider_filings.push(InsiderFiling {
                    accession_number: filing.accession_number.clone(),
                    filing_date: filing.filing_date,
                    issuer: report.issuer,
                    owners: report.owners,
                });
                collected.transactions.push(report.transactions);
                Ok(count)
            }
            FormFamily::Ownership => {
                let ctx = OwnershipContext {
                    filing,
                    subject_ticker,
                    document_url: &document.url,
                };
                let mut records = self.covers.extract(&document.content, &ctx);
                if let Some(investor) = &request.investor_filter {
                    let needle = investor.trim().to_uppercase();
                    records.retain(|r| r.investor_name.contains(&needle));
                }
                if records.is_empty() {
                    tracing::debug!("No cover-page records in {}", filing.accession_number);
                }
                let count = records.len();
                collected.ownership.push(records);
                Ok(count)
            }
        }
    }

    /// Ticker stamped on ownership records. A CIK-only request looks the
    /// ticker up in the directory and falls back to the CIK itself.
    async fn subject_ticker(&self, filer: &ResolvedFiler) -> String {
        if let Some(ticker) = &filer.ticker {
            return ticker.clone();
        }
        match self.resolver.directory().await {
            Ok(directory) => directory
                .by_cik(filer.cik)
                .map(|entry| entry.ticker.clone())
                .unwrap_or_else(|| filer.cik.to_string()),
            Err(e) => {
                tracing::warn!("Ticker lookup for {} failed: {}", filer.cik, e);
                filer.cik.to_string()
            }
        }
    }
}
