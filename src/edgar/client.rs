// src/edgar/client.rs
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::header;
use serde::de::DeserializeOwned;
use url::Url;

use crate::edgar::filing::{AccessionNumber, Cik};
use crate::utils::error::EdgarError;

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

pub const USER_AGENT_ENV: &str = "EDGAR_USER_AGENT";
pub const REQUEST_DELAY_ENV: &str = "EDGAR_REQUEST_DELAY_MS";
pub const TIMEOUT_ENV: &str = "EDGAR_TIMEOUT_SECS";
pub const CRAWL_CONCURRENCY_ENV: &str = "EDGAR_CRAWL_CONCURRENCY";

// SEC asks for 10 requests/second max. Be conservative. >100ms delay.
const DEFAULT_REQUEST_DELAY_MS: u64 = 150;
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CRAWL_CONCURRENCY: usize = 4;
const DEFAULT_WWW_BASE: &str = "https://www.sec.gov/";
const DEFAULT_DATA_BASE: &str = "https://data.sec.gov/";

/// Everything a component needs to talk to EDGAR. Built once by the caller
/// and handed to [`EdgarClient::new`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Contact string sent as `User-Agent`, e.g. "Acme Research ops@acme.test".
    pub user_agent: String,
    pub timeout: Duration,
    /// Minimum spacing between any two outbound requests. Zero disables throttling.
    pub min_request_interval: Duration,
    /// Worker count for the archive crawl.
    pub crawl_concurrency: usize,
    pub www_base: Url,
    pub data_base: Url,
}

impl ClientConfig {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            min_request_interval: Duration::from_millis(DEFAULT_REQUEST_DELAY_MS),
            crawl_concurrency: DEFAULT_CRAWL_CONCURRENCY,
            www_base: Url::parse(DEFAULT_WWW_BASE).expect("DEFAULT_WWW_BASE is a valid URL"),
            data_base: Url::parse(DEFAULT_DATA_BASE).expect("DEFAULT_DATA_BASE is a valid URL"),
        }
    }

    /// Reads `EDGAR_USER_AGENT`, `EDGAR_REQUEST_DELAY_MS`, `EDGAR_TIMEOUT_SECS`
    /// and `EDGAR_CRAWL_CONCURRENCY`. Unset numeric variables keep their defaults.
    pub fn from_env() -> Result<Self, EdgarError> {
        let mut config = Self::new(std::env::var(USER_AGENT_ENV).unwrap_or_default());
        if let Some(ms) = env_number::<u64>(REQUEST_DELAY_ENV)? {
            config.min_request_interval = Duration::from_millis(ms);
        }
        if let Some(secs) = env_number::<u64>(TIMEOUT_ENV)? {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(workers) = env_number::<usize>(CRAWL_CONCURRENCY_ENV)? {
            config.crawl_concurrency = workers;
        }
        Ok(config)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_min_request_interval(mut self, interval: Duration) -> Self {
        self.min_request_interval = interval;
        self
    }

    pub fn with_crawl_concurrency(mut self, workers: usize) -> Self {
        self.crawl_concurrency = workers;
        self
    }

    /// Points both hosts at one origin (used against mock servers).
    pub fn with_base_url(self, base: &str) -> Result<Self, EdgarError> {
        let base = parse_base(base)?;
        Ok(Self {
            www_base: base.clone(),
            data_base: base,
            ..self
        })
    }
}

fn env_number<T: std::str::FromStr>(key: &str) -> Result<Option<T>, EdgarError> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| EdgarError::Config(format!("{} must be a number, got '{}'", key, raw))),
        _ => Ok(None),
    }
}

fn parse_base(raw: &str) -> Result<Url, EdgarError> {
    // Url::join drops the last path segment unless the base ends with '/'.
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{}/", raw)
    };
    Url::parse(&normalized).map_err(|e| EdgarError::Config(format!("invalid base URL '{}': {}", raw, e)))
}

/// Rate-limited EDGAR HTTP client. Cheap to share behind an `Arc`; every
/// clone of that `Arc` draws from the same limiter.
pub struct EdgarClient {
    http: reqwest::Client,
    config: ClientConfig,
    limiter: Option<SharedRateLimiter>,
}

impl EdgarClient {
    /// Creates a reqwest client configured for EDGAR interaction.
    pub fn new(config: ClientConfig) -> Result<Self, EdgarError> {
        if config.user_agent.trim().is_empty() {
            return Err(EdgarError::MissingUserAgent);
        }

        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone()) // Set the required User-Agent
            .timeout(config.timeout)
            .build()?;

        // Burst of one: consecutive requests are spaced by the full interval.
        let limiter = Quota::with_period(config.min_request_interval)
            .map(|quota| Arc::new(RateLimiter::direct(quota.allow_burst(NonZeroU32::MIN))));

        tracing::debug!(
            "EDGAR client ready (timeout {:?}, min interval {:?})",
            config.timeout,
            config.min_request_interval
        );

        Ok(Self { http, config, limiter })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    async fn throttle(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }

    /// Downloads a URL as text.
    /// Includes mandatory User-Agent and the shared rate limit.
    pub async fn get_text(&self, url: &Url) -> Result<String, EdgarError> {
        self.throttle().await;
        tracing::debug!("GET {}", url);

        let response = self
            .http
            .get(url.clone())
            // SEC uses various content types, but often text/html for filings
            .header(header::ACCEPT, "application/json,application/xml,text/html,text/plain,*/*")
            .send()
            .await?; // Propagates reqwest::Error as EdgarError::Network

        // Check if the request was successful (status code 2xx)
        let status = response.status();
        if !status.is_success() {
            if status == reqwest::StatusCode::FORBIDDEN {
                tracing::error!("Received 403 Forbidden for {} - check User-Agent and rate limits.", url);
                return Err(EdgarError::AccessDenied(url.to_string()));
            }
            tracing::warn!("HTTP error status: {} for URL: {}", status, url);
            return Err(EdgarError::Http {
                status,
                url: url.to_string(),
            });
        }

        let body = response.text().await?;
        tracing::debug!("Downloaded {} bytes from {}", body.len(), url);
        Ok(body)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T, EdgarError> {
        let body = self.get_text(url).await?;
        serde_json::from_str(&body).map_err(|e| EdgarError::Parse(format!("{}: {}", url, e)))
    }

    fn www(&self, path: &str) -> Result<Url, EdgarError> {
        self.config
            .www_base
            .join(path)
            .map_err(|e| EdgarError::Config(format!("bad path '{}': {}", path, e)))
    }

    fn data(&self, path: &str) -> Result<Url, EdgarError> {
        self.config
            .data_base
            .join(path)
            .map_err(|e| EdgarError::Config(format!("bad path '{}': {}", path, e)))
    }

    pub fn tickers_url(&self) -> Result<Url, EdgarError> {
        self.www("files/company_tickers.json")
    }

    pub fn submissions_url(&self, cik: Cik) -> Result<Url, EdgarError> {
        self.data(&format!("submissions/CIK{}.json", cik))
    }

    pub fn company_facts_url(&self, cik: Cik) -> Result<Url, EdgarError> {
        self.data(&format!("api/xbrl/companyfacts/CIK{}.json", cik))
    }

    pub fn archive_dir_url(&self, cik: Cik) -> Result<Url, EdgarError> {
        self.www(&format!("Archives/edgar/data/{}/", cik.archive_segment()))
    }

    pub fn filing_dir_url(&self, cik: Cik, accession: &AccessionNumber) -> Result<Url, EdgarError> {
        self.www(&format!(
            "Archives/edgar/data/{}/{}/",
            cik.archive_segment(),
            accession.compact()
        ))
    }

    pub fn manifest_url(&self, cik: Cik, accession: &AccessionNumber) -> Result<Url, EdgarError> {
        self.document_url(cik, accession, "index.json")
    }

    pub fn index_page_url(&self, cik: Cik, accession: &AccessionNumber) -> Result<Url, EdgarError> {
        self.document_url(cik, accession, &format!("{}-index.htm", accession))
    }

    /// Constructs the URL of a file inside a filing's folder.
    pub fn document_url(&self, cik: Cik, accession: &AccessionNumber, name: &str) -> Result<Url, EdgarError> {
        self.filing_dir_url(cik, accession)?
            .join(name.trim_start_matches('/'))
            .map_err(|e| EdgarError::Config(format!("bad document name '{}': {}", name, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::GET, MockServer};
    use std::time::Instant;

    fn test_config(server: &MockServer) -> ClientConfig {
        ClientConfig::new("Test Harness test@example.com")
            .with_min_request_interval(Duration::ZERO)
            .with_base_url(&server.base_url())
            .unwrap()
    }

    #[test]
    fn rejects_empty_user_agent() {
        let result = EdgarClient::new(ClientConfig::new("   "));
        assert!(matches!(result, Err(EdgarError::MissingUserAgent)));
    }

    #[test]
    fn builds_archive_urls() {
        let client = EdgarClient::new(ClientConfig::new("Test test@example.com")).unwrap();
        let cik = Cik::new(1067983);
        let acc: AccessionNumber = "0000950123-24-011775".parse().unwrap();

        assert_eq!(
            client.submissions_url(cik).unwrap().as_str(),
            "https://data.sec.gov/submissions/CIK0001067983.json"
        );
        assert_eq!(
            client.manifest_url(cik, &acc).unwrap().as_str(),
            "https://www.sec.gov/Archives/edgar/data/1067983/000095012324011775/index.json"
        );
        assert_eq!(
            client.index_page_url(cik, &acc).unwrap().as_str(),
            "https://www.sec.gov/Archives/edgar/data/1067983/000095012324011775/0000950123-24-011775-index.htm"
        );
        assert_eq!(
            client.document_url(cik, &acc, "xslForm13F_X02/primary_doc.xml").unwrap().as_str(),
            "https://www.sec.gov/Archives/edgar/data/1067983/000095012324011775/xslForm13F_X02/primary_doc.xml"
        );
        assert_eq!(
            client.company_facts_url(cik).unwrap().as_str(),
            "https://data.sec.gov/api/xbrl/companyfacts/CIK0001067983.json"
        );
    }

    #[tokio::test]
    async fn sends_user_agent_header() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/files/company_tickers.json")
                .header("user-agent", "Test Harness test@example.com");
            then.status(200).body("{}");
        });

        let client = EdgarClient::new(test_config(&server)).unwrap();
        let body = client.get_text(&client.tickers_url().unwrap()).await;

        mock.assert();
        tokio_test::assert_ok!(body);
    }

    #[tokio::test]
    async fn maps_forbidden_to_access_denied() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/files/company_tickers.json");
            then.status(403).body("Undeclared Automated Tool");
        });

        let client = EdgarClient::new(test_config(&server)).unwrap();
        let err = client.get_text(&client.tickers_url().unwrap()).await.unwrap_err();
        assert!(err.is_access_denied(), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn maps_other_statuses_to_http_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/submissions/CIK0000000001.json");
            then.status(404);
        });

        let client = EdgarClient::new(test_config(&server)).unwrap();
        let err = client
            .get_json::<serde_json::Value>(&client.submissions_url(Cik::new(1)).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, EdgarError::Http { status, .. } if status == reqwest::StatusCode::NOT_FOUND));
    }

    #[tokio::test]
    async fn malformed_json_is_a_parse_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/files/company_tickers.json");
            then.status(200).body("<html>not json</html>");
        });

        let client = EdgarClient::new(test_config(&server)).unwrap();
        let err = client
            .get_json::<serde_json::Value>(&client.tickers_url().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, EdgarError::Parse(_)));
    }

    #[tokio::test]
    async fn spaces_requests_by_min_interval() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/files/company_tickers.json");
            then.status(200).body("{}");
        });

        let config = test_config(&server).with_min_request_interval(Duration::from_millis(60));
        let client = Arc::new(EdgarClient::new(config).unwrap());
        let url = client.tickers_url().unwrap();

        let started = Instant::now();
        let tasks: Vec<_> = (0..3)
            .map(|_| {
                let client = Arc::clone(&client);
                let url = url.clone();
                tokio::spawn(async move { client.get_text(&url).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        // First request is free, the next two wait one interval each.
        assert!(started.elapsed() >= Duration::from_millis(110));
    }
}
