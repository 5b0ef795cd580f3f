// src/lib.rs
//! Filing discovery and disclosure extraction for SEC EDGAR.
//!
//! Institutional holdings (13F-HR), insider transactions (Form 4) and
//! beneficial-ownership stakes (Schedule 13D/13G) are located through the
//! submissions feed and the archive, fetched under a shared rate limit, and
//! turned into plain serializable records.

pub mod aggregate;
pub mod edgar;
pub mod extractors;
pub mod pipeline;
pub mod records;
pub mod storage;
pub mod utils;

pub use aggregate::SortKey;
pub use edgar::{ClientConfig, EdgarClient, FactsClient, FormFamily, YearRange};
pub use pipeline::{ExtractionRequest, ExtractionRun, FilerQuery, Pipeline, RunSummary};
pub use records::{FinancialSnapshot, HoldingRecord, OwnershipRecord, SharesOutstandingPoint, TransactionRecord};
pub use storage::StorageManager;
pub use utils::{AppError, EdgarError, ExtractError, StorageError};
