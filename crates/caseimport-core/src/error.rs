//! Error types for the caseimport-core library.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::table::TablePath;
use crate::template::Field;

/// Main error type for the caseimport library.
#[derive(Error, Debug)]
pub enum CaseImportError {
    /// Document reading error.
    #[error("document error: {0}")]
    Document(#[from] DocumentError),

    /// Template definition error.
    #[error("template error: {0}")]
    Template(#[from] TemplateError),

    /// A field was read that the document does not have.
    #[error("field error: {0}")]
    Resolve(#[from] ResolveError),

    /// Provider selection error.
    #[error("selection error: {0}")]
    Selection(#[from] SelectionError),

    /// Case creation error reported by the generator.
    #[error("generator error: {0}")]
    Generator(#[from] GeneratorError),

    /// A provider was queried before `init`.
    #[error("provider {0:?} has no document, call init first")]
    NotInitialized(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors related to reading a document container.
#[derive(Error, Debug)]
pub enum DocumentError {
    /// The container could not be opened (not a zip archive, truncated, ...).
    #[error("corrupt document {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// The container opened, but the markup entry is absent.
    #[error("document {path} has no {entry} entry")]
    MissingEntry { path: PathBuf, entry: String },

    /// The markup entry is not well-formed XML.
    #[error("malformed markup in {path}: {reason}")]
    Xml { path: PathBuf, reason: String },

    /// A `.doc` file without the OLE2 signature.
    #[error("{0} is not recognised as a legacy binary document")]
    NotLegacyDocument(PathBuf),

    /// The external converter failed.
    #[error("failed to convert {path}: {reason}")]
    Conversion { path: PathBuf, reason: String },

    /// I/O error while reading.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DocumentError {
    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Corrupt {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// A template map path that does not resolve in the current document.
///
/// Expected during provider matching: the rule engine converts it into a
/// failed-rule diagnostic instead of surfacing it to the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// Walking `path` failed at position `depth`.
    #[error("can not load data from the root table for the path {path}: {reason} at step {depth}")]
    PathNotFound {
        path: TablePath,
        depth: usize,
        reason: PathFailure,
    },

    /// The resolved node does not have the shape the field coercion expects.
    #[error("{field} expects {expected} at {path}")]
    UnexpectedShape {
        field: Field,
        path: TablePath,
        expected: &'static str,
    },

    /// A field value could not be parsed.
    #[error("failed to parse {field}: {value:?}")]
    Parse { field: Field, value: String },

    /// The document has no template text marker at the expected place.
    #[error("{0}")]
    Mismatch(String),
}

/// Why a path step failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathFailure {
    /// Tried to index into a leaf string.
    NotAList,
    /// The index is out of bounds.
    MissingIndex,
}

impl std::fmt::Display for PathFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathFailure::NotAList => f.write_str("value is a string, not a table"),
            PathFailure::MissingIndex => f.write_str("index does not exist"),
        }
    }
}

/// Errors in a template definition itself.
///
/// These indicate a bug in the template, not a bad document, and are never
/// swallowed as an "unfit" verdict.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// A rule or accessor reads a field that the template does not map.
    #[error("template {template:?}: field {field} is not defined in the field map")]
    UnmappedField { template: String, field: Field },

    /// A checkpoint rule is declared but the template has no checkpoints.
    #[error("template {template:?}: checkpoints are not set")]
    NoCheckpoints { template: String },

    /// A text-marker rule is declared but the template has no markers.
    #[error("template {template:?}: text markers are not set")]
    NoTextMarkers { template: String },

    /// The field is read with an accessor of the wrong kind.
    #[error("template {template:?}: field {field} can not be read as {requested}")]
    WrongAccessor {
        template: String,
        field: Field,
        requested: &'static str,
    },

    /// The template file could not be parsed.
    #[error("invalid template definition {source_name}: {reason}")]
    Invalid { source_name: String, reason: String },
}

/// Errors raised while choosing a provider for a document.
#[derive(Error, Debug)]
pub enum SelectionError {
    /// None of the registered providers fits the document.
    #[error("{} can not be imported by any provider ({} diagnostic(s))", path.display(), diagnostics.len())]
    NoFittingProvider {
        path: PathBuf,
        diagnostics: Vec<ImportError>,
    },

    /// The import log already has this file.
    #[error("{0} has already been imported")]
    AlreadyImported(PathBuf),

    /// The registry is empty.
    #[error("no import providers configured")]
    NoProviders,
}

/// Error reported by a case generator collaborator.
#[derive(Error, Debug)]
pub enum GeneratorError {
    /// The same internal reference number was already used.
    #[error("referral number {0:?} already used")]
    Duplicate(String),

    /// Anything the collaborator rejects.
    #[error("{0}")]
    Rejected(String),
}

/// One failed rule or unmet checkpoint, recorded when error storing is on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportError {
    /// Provider (template) name.
    pub source: String,
    /// `accessor !== rule`.
    pub cause: String,
    /// Message of the failure, empty when the value just did not match.
    pub detail: String,
}

/// Result type for the caseimport library.
pub type Result<T> = std::result::Result<T, CaseImportError>;
