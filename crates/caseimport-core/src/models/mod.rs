//! Data models for imported cases and configuration.

pub mod case;
pub mod config;

pub use case::{Assistant, CaseRecord, Doctor, ImportMetadata, Patient, ResourceItem, Visit};
pub use config::{BatchConfig, ConversionConfig, ExtractionConfig, ImportConfig, ImportSettings};
