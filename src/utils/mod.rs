pub mod error;
pub mod logging;

pub use error::{AppError, EdgarError, ExtractError, StorageError}; // Re-export error types for convenience
