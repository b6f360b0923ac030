//! Core library for importing medical cases from filled-in document forms.
//!
//! This crate provides:
//! - Document reading (word-processing containers, embedded images, legacy
//!   binary detection and conversion)
//! - Extraction of nested tables into a positional root table
//! - Declarative templates mapping case fields to root-table paths
//! - A rule engine deciding which template a document was written with
//! - Provider selection, coverage statistics and the import service

pub mod docx;
pub mod error;
pub mod models;
pub mod provider;
pub mod selection;
pub mod table;
pub mod template;
pub mod validation;

pub use docx::{DocumentReader, DocxReader, EmbeddedImage, MarkupNode};
pub use error::{CaseImportError, ImportError, Result};
pub use models::{CaseRecord, ImportConfig, ResourceItem};
pub use provider::{CaseDataProvider, TemplateProvider};
pub use selection::{
    CaseGenerator, CaseImporter, DryCaseGenerator, ImportLog, MemoryImportLog,
    ProviderStatistics, all_fitting, select_fitting,
};
pub use table::{ExtractedTables, TableExtractor, TableNode, TablePath, TableTags};
pub use template::{Field, TemplateDefinition, TemplateMap};
pub use validation::{FieldValue, Rule, RuleSet};
