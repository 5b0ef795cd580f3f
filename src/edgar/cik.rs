// src/edgar/cik.rs
use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::OnceCell;

use crate::edgar::client::EdgarClient;
use crate::edgar::filing::Cik;
use crate::edgar::models::TickerEntry;
use crate::utils::error::EdgarError;

/// A resolved filer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompanyEntry {
    pub cik: Cik,
    pub ticker: String,
    pub name: String,
}

/// Ticker directory in file order.
#[derive(Debug, Default)]
pub struct CompanyDirectory {
    entries: Vec<CompanyEntry>,
}

impl CompanyDirectory {
    /// Builds the directory from the raw `company_tickers.json` object, whose
    /// keys are row numbers ("0", "1", ...).
    pub fn from_raw(raw: HashMap<String, TickerEntry>) -> Self {
        let mut rows: Vec<(u64, TickerEntry)> = raw
            .into_iter()
            .map(|(key, entry)| (key.parse::<u64>().unwrap_or(u64::MAX), entry))
            .collect();
        rows.sort_by_key(|(row, _)| *row);

        let entries = rows
            .into_iter()
            .map(|(_, entry)| CompanyEntry {
                cik: Cik::new(entry.cik_str),
                ticker: entry.ticker,
                name: entry.title,
            })
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Case-insensitive exact ticker match.
    pub fn by_ticker(&self, ticker: &str) -> Option<&CompanyEntry> {
        let ticker = ticker.trim();
        self.entries.iter().find(|e| e.ticker.eq_ignore_ascii_case(ticker))
    }

    pub fn by_cik(&self, cik: Cik) -> Option<&CompanyEntry> {
        self.entries.iter().find(|e| e.cik == cik)
    }

    /// Case-insensitive substring match on the company name. Returns the first
    /// hit in directory order; ambiguous fragments are not disambiguated.
    pub fn by_name(&self, fragment: &str) -> Option<&CompanyEntry> {
        let needle = fragment.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }
        self.entries.iter().find(|e| e.name.to_lowercase().contains(&needle))
    }
}

/// Maps tickers and name fragments to CIKs. The directory is downloaded on
/// first use and cached for the lifetime of the resolver.
pub struct CikResolver {
    client: Arc<EdgarClient>,
    directory: OnceCell<CompanyDirectory>,
}

impl CikResolver {
    pub fn new(client: Arc<EdgarClient>) -> Self {
        Self {
            client,
            directory: OnceCell::new(),
        }
    }

    pub async fn directory(&self) -> Result<&CompanyDirectory, EdgarError> {
        self.directory
            .get_or_try_init(|| async {
                let url = self.client.tickers_url()?;
                let raw: HashMap<String, TickerEntry> = self.client.get_json(&url).await?;
                let directory = CompanyDirectory::from_raw(raw);
                tracing::info!("Loaded filer directory ({} entries)", directory.len());
                Ok::<_, EdgarError>(directory)
            })
            .await
    }

    pub async fn resolve_ticker(&self, ticker: &str) -> Result<CompanyEntry, EdgarError> {
        self.directory()
            .await?
            .by_ticker(ticker)
            .cloned()
            .ok_or_else(|| EdgarError::CikNotFound(ticker.to_string()))
    }

    pub async fn resolve_name(&self, fragment: &str) -> Result<CompanyEntry, EdgarError> {
        self.directory()
            .await?
            .by_name(fragment)
            .cloned()
            .ok_or_else(|| EdgarError::CikNotFound(fragment.to_string()))
    }

    /// Ticker first, then name fragment.
    pub async fn resolve(&self, query: &str) -> Result<CompanyEntry, EdgarError> {
        let directory = self.directory().await?;
        let found = directory.by_ticker(query).or_else(|| directory.by_name(query));
        match found {
            Some(entry) => {
                tracing::debug!("Resolved '{}' to {} ({})", query, entry.cik, entry.name);
                Ok(entry.clone())
            }
            None => Err(EdgarError::CikNotFound(query.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edgar::client::ClientConfig;
    use httpmock::{Method::GET, MockServer};
    use std::time::Duration;

    const TICKERS: &str = r#"{
        "0": {"cik_str": 320193, "ticker": "AAPL", "title": "Apple Inc."},
        "1": {"cik_str": 1067983, "ticker": "BRK-B", "title": "BERKSHIRE HATHAWAY INC"},
        "2": {"cik_str": 1838359, "ticker": "RGTI", "title": "Rigetti Computing, Inc."},
        "10": {"cik_str": 1067984, "ticker": "BRKX", "title": "Berkshire Holdings Two"}
    }"#;

    fn directory() -> CompanyDirectory {
        CompanyDirectory::from_raw(serde_json::from_str(TICKERS).unwrap())
    }

    #[test]
    fn ticker_match_is_case_insensitive_exact() {
        let dir = directory();
        assert_eq!(dir.by_ticker("brk-b").unwrap().cik.to_string(), "0001067983");
        assert!(dir.by_ticker("BRK").is_none());
        assert_eq!(dir.by_cik(Cik::new(1838359)).unwrap().ticker, "RGTI");
    }

    #[test]
    fn name_match_returns_first_in_file_order() {
        let dir = directory();
        let hit = dir.by_name("berkshire").unwrap();
        assert_eq!(hit.ticker, "BRK-B");
        assert!(dir.by_name("").is_none());
        assert!(dir.by_name("nonexistent fund").is_none());
    }

    #[tokio::test]
    async fn directory_is_fetched_once() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/files/company_tickers.json");
            then.status(200)
                .header("content-type", "application/json")
                .body(TICKERS);
        });

        let config = ClientConfig::new("Test test@example.com")
            .with_min_request_interval(Duration::ZERO)
            .with_base_url(&server.base_url())
            .unwrap();
        let resolver = CikResolver::new(Arc::new(EdgarClient::new(config).unwrap()));

        assert_eq!(resolver.resolve("aapl").await.unwrap().cik, Cik::new(320193));
        assert_eq!(resolver.resolve("rigetti").await.unwrap().ticker, "RGTI");
        assert_eq!(resolver.resolve_ticker("RGTI").await.unwrap().cik, Cik::new(1838359));
        assert!(matches!(
            resolver.resolve_name("Vanguard").await,
            Err(EdgarError::CikNotFound(_))
        ));

        mock.assert_calls(1);
    }
}
