//! Tabular view of a document: tables → rows → cells as nested lists.

mod extractor;
mod resolver;

pub use extractor::{TableExtractor, TableTags};
pub use resolver::{exists_at, flatten_to_string, resolve};

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ResolveError;

/// A node of the extracted table structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TableNode {
    /// Leaf string (a cell without nested tables).
    Text(String),
    /// Ordered sequence: tables, rows, cells or the parts of a cell.
    List(Vec<TableNode>),
}

impl TableNode {
    /// Leaf string, if this is a leaf.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            TableNode::Text(text) => Some(text),
            TableNode::List(_) => None,
        }
    }

    /// Items, if this is a sequence.
    pub fn as_list(&self) -> Option<&[TableNode]> {
        match self {
            TableNode::List(items) => Some(items),
            TableNode::Text(_) => None,
        }
    }

    /// Number of items (0 for leaves).
    pub fn len(&self) -> usize {
        self.as_list().map_or(0, <[TableNode]>::len)
    }

    /// Whether the node is an empty sequence or an empty string.
    pub fn is_empty(&self) -> bool {
        match self {
            TableNode::Text(text) => text.is_empty(),
            TableNode::List(items) => items.is_empty(),
        }
    }
}

impl From<&str> for TableNode {
    fn from(value: &str) -> Self {
        TableNode::Text(value.to_string())
    }
}

impl<T: Into<TableNode>> From<Vec<T>> for TableNode {
    fn from(items: Vec<T>) -> Self {
        TableNode::List(items.into_iter().map(Into::into).collect())
    }
}

/// Positional address into the root table, e.g. `[0, 2, 1]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TablePath(pub Vec<usize>);

impl TablePath {
    /// Create a path from indices.
    pub fn new(indices: impl Into<Vec<usize>>) -> Self {
        Self(indices.into())
    }

    /// Path steps.
    pub fn steps(&self) -> &[usize] {
        &self.0
    }
}

impl<const N: usize> From<[usize; N]> for TablePath {
    fn from(indices: [usize; N]) -> Self {
        Self(indices.to_vec())
    }
}

impl fmt::Display for TablePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let steps: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "[{}]", steps.join(","))
    }
}

/// Root table of one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedTables {
    /// Top-level tables in document order.
    pub tables: TableNode,
}

impl ExtractedTables {
    /// Number of top-level tables.
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// Resolve a path against the root table.
    pub fn resolve(&self, path: &TablePath) -> Result<&TableNode, ResolveError> {
        resolve(&self.tables, path)
    }

    /// Probe a path without failing.
    pub fn exists_at(&self, path: &TablePath) -> bool {
        exists_at(&self.tables, path)
    }
}
