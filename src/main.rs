// src/main.rs
use std::sync::Arc;
use std::time::Duration;

use chrono::Datelike;
use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;

use edgar_holdings::edgar::FormFilter;
use edgar_holdings::utils::logging::setup_logging;
use edgar_holdings::{
    AppError, ClientConfig, ExtractionRequest, FactsClient, FilerQuery, FormFamily, Pipeline, SortKey,
    StorageManager, YearRange,
};

/// Command Line Interface for EDGAR holdings, insider and ownership extraction
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Contact string sent as User-Agent (overrides EDGAR_USER_AGENT)
    #[arg(long, global = true)]
    user_agent: Option<String>,

    /// Minimum delay between requests in milliseconds (overrides EDGAR_REQUEST_DELAY_MS)
    #[arg(long, global = true)]
    delay_ms: Option<u64>,

    /// Debug logging for this crate (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract records of one form family for one or more filers
    Extract {
        /// CIK, ticker or company-name fragment; repeat for a batch
        #[arg(short, long = "filer", required = true)]
        filers: Vec<String>,

        /// holdings (13F-HR), insider (Form 4) or ownership (13D/13G)
        #[arg(long, default_value = "holdings")]
        family: FormFamily,

        /// Explicit form types, replacing the family's defaults
        #[arg(long, value_delimiter = ',')]
        forms: Vec<String>,

        /// First year to include; enables the archive crawl
        #[arg(long)]
        start_year: Option<i32>,

        /// Last year to include (defaults to the current year)
        #[arg(long)]
        end_year: Option<i32>,

        /// Maximum number of filings to process per filer
        #[arg(long)]
        limit: Option<usize>,

        /// Keep only ownership records whose investor name contains this
        #[arg(long)]
        investor: Option<String>,

        #[arg(long, value_enum, default_value_t = SortArg::Canonical)]
        sort: SortArg,

        /// Output directory for extracted records
        #[arg(short, long, default_value = "./output")]
        output_dir: String,
    },
    /// Shares-outstanding series from the XBRL company facts
    Shares {
        /// CIK, ticker or company-name fragment
        #[arg(short, long)]
        filer: String,

        /// Only log the most recent point
        #[arg(long)]
        latest: bool,

        /// Output directory for the series
        #[arg(short, long, default_value = "./output")]
        output_dir: String,
    },
    /// Latest key financials (assets, income, cash flow) from the XBRL company facts
    Financials {
        /// CIK, ticker or company-name fragment
        #[arg(short, long)]
        filer: String,

        /// Output directory for the snapshot
        #[arg(short, long, default_value = "./output")]
        output_dir: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SortArg {
    Canonical,
    DateAsc,
    Name,
    Magnitude,
}

impl From<SortArg> for SortKey {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Canonical => SortKey::Canonical,
            SortArg::DateAsc => SortKey::FilingDateAsc,
            SortArg::Name => SortKey::Name,
            SortArg::Magnitude => SortKey::MagnitudeDesc,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // 1. Parse CLI Arguments, then set up logging (reads RUST_LOG env var)
    let args = Args::parse();
    setup_logging(args.verbose);
    tracing::debug!("Starting with args: {:?}", args);

    // 2. Client configuration: environment first, flags on top
    let mut config = ClientConfig::from_env()?;
    if let Some(user_agent) = args.user_agent {
        config.user_agent = user_agent;
    }
    if let Some(ms) = args.delay_ms {
        config = config.with_min_request_interval(Duration::from_millis(ms));
    }
    let pipeline = Pipeline::from_config(config)?;

    // 3. Ctrl-C stops the run between filings; partial results are still saved
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current filing");
            token.cancel();
        }
    });

    match args.command {
        Command::Extract {
            filers,
            family,
            forms,
            start_year,
            end_year,
            limit,
            investor,
            sort,
            output_dir,
        } => {
            let years = year_range(start_year, end_year)?;
            let mut requests = Vec::with_capacity(filers.len());
            for filer in &filers {
                let mut request = ExtractionRequest::new(filer.parse::<FilerQuery>()?, family).with_sort(sort.into());
                if !forms.is_empty() {
                    request = request.with_forms(FormFilter::exact(forms.iter().cloned()));
                }
                if let Some(years) = years {
                    request = request.with_years(years);
                }
                if let Some(limit) = limit {
                    request = request.with_limit(limit);
                }
                if let Some(investor) = &investor {
                    request = request.with_investor(investor.clone());
                }
                requests.push(request);
            }
            run_extract(&pipeline, &requests, &output_dir, &cancel).await
        }
        Command::Shares {
            filer,
            latest,
            output_dir,
        } => run_shares(&pipeline, &filer, latest, &output_dir).await,
        Command::Financials { filer, output_dir } => run_financials(&pipeline, &filer, &output_dir).await,
    }
}

fn year_range(start: Option<i32>, end: Option<i32>) -> Result<Option<YearRange>, AppError> {
    let current = chrono::Utc::now().year();
    let range = match (start, end) {
        (None, None) => return Ok(None),
        (Some(start), end) => YearRange::new(start, end.unwrap_or(current)),
        (None, Some(end)) => YearRange::new(end, end),
    };
    Ok(Some(range?))
}

async fn run_extract(
    pipeline: &Pipeline,
    requests: &[ExtractionRequest],
    output_dir: &str,
    cancel: &CancellationToken,
) -> Result<(), AppError> {
    let storage = StorageManager::new(output_dir)?;
    let results = pipeline.run_batch(requests, cancel).await;

    let mut success_count = 0;
    let mut failure_count = 0;
    let mut aborted = None;

    for (request, result) in requests.iter().zip(results.iter()) {
        match result {
            Ok(run) => {
                match storage.save_run(run) {
                    Ok(path) => tracing::info!("Saved {} results to: {}", request.filer, path.display()),
                    Err(e) => tracing::error!("Failed to save results for {}: {}", request.filer, e),
                }
                if let Some(reason) = &run.summary.aborted {
                    aborted = Some(reason.clone());
                }
                success_count += 1;
            }
            Err(e) => {
                tracing::error!("Failed to process {}: {}", request.filer, e);
                failure_count += 1;
            }
        }
    }

    tracing::info!("Processing finished. Success: {}, Failures: {}", success_count, failure_count);

    if let Some(reason) = aborted {
        return Err(AppError::Processing(format!("Run aborted: {}", reason)));
    }
    if success_count == 0 && failure_count > 0 {
        return Err(AppError::Processing(format!("All {} filer requests failed", failure_count)));
    }
    Ok(())
}

async fn run_shares(pipeline: &Pipeline, filer: &str, latest: bool, output_dir: &str) -> Result<(), AppError> {
    let resolved = pipeline.resolve(&filer.parse::<FilerQuery>()?).await?;
    let facts = FactsClient::new(Arc::clone(pipeline.client()));

    if latest {
        match facts.latest_shares_outstanding(resolved.cik).await? {
            Some(point) => tracing::info!(
                "{}: {} shares outstanding as of {} ({})",
                resolved.cik,
                point.value,
                point.end_date,
                point.form.as_deref().unwrap_or("unknown form")
            ),
            None => tracing::warn!("No shares-outstanding points for {}", resolved.cik),
        }
        return Ok(());
    }

    let series = facts.shares_outstanding(resolved.cik).await?;
    let storage = StorageManager::new(output_dir)?;
    let path = storage.save_shares_outstanding(resolved.cik, &series)?;
    tracing::info!("Saved {} points to: {}", series.len(), path.display());
    Ok(())
}

async fn run_financials(pipeline: &Pipeline, filer: &str, output_dir: &str) -> Result<(), AppError> {
    let resolved = pipeline.resolve(&filer.parse::<FilerQuery>()?).await?;
    let facts = FactsClient::new(Arc::clone(pipeline.client()));

    let snapshot = facts.key_financials(resolved.cik).await?;
    let storage = StorageManager::new(output_dir)?;
    let path = storage.save_financials(resolved.cik, &snapshot)?;
    tracing::info!("Saved key financials for {} to: {}", snapshot.entity_name, path.display());
    Ok(())
}
