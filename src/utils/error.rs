// src/utils/error.rs
use thiserror::Error;

// Define specific error types for different parts of the application
#[derive(Error, Debug)]
pub enum EdgarError {
    #[error("Network request failed: {0}")]
    Network(#[from] reqwest::Error), // Timeouts, connection resets, undecodable bodies

    #[error("HTTP error {status} for {url}")]
    Http { status: reqwest::StatusCode, url: String },

    #[error("Access denied by EDGAR for {0} (check the User-Agent contact header and request rate)")]
    AccessDenied(String),

    #[error("A User-Agent contact string is required for EDGAR requests")]
    MissingUserAgent,

    #[error("No filer found matching '{0}'")]
    CikNotFound(String),

    #[error("No qualifying document in filing {0}")]
    DocumentNotFound(String),

    #[error("Invalid accession number: {0}")]
    InvalidAccession(String),

    #[error("Invalid CIK: {0}")]
    InvalidCik(String),

    #[error("Failed to parse EDGAR response: {0}")]
    Parse(String),

    #[error("Invalid client configuration: {0}")]
    Config(String),
}

impl EdgarError {
    /// Errors that will repeat for every further request in the run.
    pub fn is_access_denied(&self) -> bool {
        matches!(self, EdgarError::AccessDenied(_) | EdgarError::MissingUserAgent)
    }
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Malformed XML: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("Unexpected document structure: {0}")]
    Parse(String),

    #[error("No {0} found in document")]
    NoRecords(&'static str),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("EDGAR interaction failed: {0}")]
    Edgar(#[from] EdgarError), // Automatically convert Edgar errors

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Data processing failed: {0}")]
    Processing(String),
}
