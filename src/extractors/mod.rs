// src/extractors/mod.rs
pub mod holdings;
pub mod insider;
pub mod ownership;
pub mod strategy;
pub mod text;
pub mod xml;

// Re-export key extraction types for convenience
pub use holdings::extract_holdings;
pub use insider::extract_insider;
pub use ownership::{CoverFields, CoverPageExtractor, OwnershipContext};
pub use strategy::{Confidence, FieldMatch, FieldRule, Strategy};
