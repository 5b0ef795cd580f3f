// src/edgar/mod.rs
pub mod cik;
pub mod client;
pub mod facts;
pub mod fetcher;
pub mod filing;
pub mod locator;
pub mod models;

pub use cik::{CikResolver, CompanyEntry};
pub use client::{ClientConfig, EdgarClient};
pub use facts::FactsClient;
pub use fetcher::{DocumentFetcher, FetchedDocument};
pub use filing::{AccessionNumber, Cik, FilingReference, FormFamily, FormFilter, YearRange};
pub use locator::{FilingLocator, FilingSource, Located};
