// src/storage/mod.rs
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::edgar::filing::Cik;
use crate::pipeline::ExtractionRun;
use crate::records::{FinancialSnapshot, SharesOutstandingPoint};
use crate::utils::error::StorageError;

pub struct StorageManager {
    base_dir: PathBuf,
}

impl StorageManager {
    /// Creates a new StorageManager with the specified base directory
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self, StorageError> {
        let base_path = base_dir.as_ref().to_path_buf();

        // Create the base directory if it doesn't exist
        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(StorageError::IoError)?;
        }

        Ok(Self { base_dir: base_path })
    }

    /// Writes the run's records and a metadata file to `<base>/<CIK>/<family>/`.
    /// Returns the path of the records file.
    pub fn save_run(&self, run: &ExtractionRun) -> Result<PathBuf, StorageError> {
        let target_dir = self.target_dir(run.cik, run.family.as_str())?;

        let records_path = target_dir.join("records.json");
        write_json(&records_path, run)?;
        tracing::info!("Saved {} records to {}", run.record_count(), records_path.display());

        let metadata = serde_json::json!({
            "cik": run.cik,
            "company_name": run.company_name,
            "family": run.family,
            "holdings": run.holdings.len(),
            "transactions": run.transactions.len(),
            "ownership": run.ownership.len(),
            "filings_located": run.summary.filings_located,
            "filings_processed": run.summary.filings_processed,
            "skipped": run.summary.failure_count(),
            "cancelled": run.summary.cancelled,
            "aborted": run.summary.aborted,
            "extraction_timestamp": chrono::Utc::now().to_rfc3339(),
        });
        let metadata_path = target_dir.join("records_meta.json");
        write_json(&metadata_path, &metadata)?;
        tracing::info!("Saved metadata to {}", metadata_path.display());

        Ok(records_path)
    }

    pub fn save_shares_outstanding(&self, cik: Cik, series: &[SharesOutstandingPoint]) -> Result<PathBuf, StorageError> {
        let target_dir = self.target_dir(cik, "facts")?;
        let path = target_dir.join("shares_outstanding.json");
        write_json(&path, &series)?;
        tracing::info!("Saved {} shares-outstanding points to {}", series.len(), path.display());
        Ok(path)
    }

    pub fn save_financials(&self, cik: Cik, snapshot: &FinancialSnapshot) -> Result<PathBuf, StorageError> {
        let target_dir = self.target_dir(cik, "facts")?;
        let path = target_dir.join("key_financials.json");
        write_json(&path, snapshot)?;
        tracing::info!("Saved key financials to {}", path.display());
        Ok(path)
    }

    fn target_dir(&self, cik: Cik, family: &str) -> Result<PathBuf, StorageError> {
        let target_dir = self.base_dir.join(cik.to_string()).join(family);
        if !target_dir.exists() {
            fs::create_dir_all(&target_dir).map_err(StorageError::IoError)?;
        }
        Ok(target_dir)
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StorageError> {
    let body = serde_json::to_string_pretty(value).map_err(|e| StorageError::SerializationError(e.to_string()))?;
    fs::write(path, body).map_err(StorageError::IoError)
}
