//! Rule engine deciding whether a document fits a template.

pub mod amounts;
pub mod dates;
pub mod patterns;
mod rules;

pub use amounts::{parse_amount, parse_price};
pub use dates::{is_date, parse_date, parse_lenient};
pub use rules::{Accessor, Rule, RuleEntry, RuleSet};

use serde::Serialize;

use crate::error::ResolveError;
use crate::models::ResourceItem;

/// Value produced by an accessor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// An optional cell that is not in the document.
    Missing,
    Bool(bool),
    Text(String),
    Number(f64),
    Items(Vec<ResourceItem>),
    Strings(Vec<String>),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, FieldValue::Missing)
    }
}

/// Outcome of reading one field: a value, or the reason the document
/// does not have it.
pub type FieldResult = Result<FieldValue, ResolveError>;
