//! Declarative mapping from fields to root-table paths.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::Field;
use crate::table::TablePath;

/// A `(path, expected value)` pair that must hold for a document to fit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub path: TablePath,
    pub value: String,
}

/// How a resolved sub-tree becomes a field value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Coercion {
    /// The cell text as extracted. A nested sub-table is an error.
    #[default]
    Verbatim,
    /// The sub-tree flattened into one space-joined string.
    Flatten,
    /// Each child row becomes a `{title, description, code}` item.
    Rows,
}

/// Where a field's value comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldSpec {
    /// Read from the root table.
    Path {
        path: TablePath,
        #[serde(default)]
        coercion: Coercion,
        /// A missing path yields an absent value instead of an error.
        #[serde(default, skip_serializing_if = "is_false")]
        optional: bool,
    },
    /// Fixed for every document of the template.
    Constant { value: String },
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Layout of one document template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateMap {
    /// All must match for a document to fit.
    #[serde(default)]
    pub checkpoints: Vec<Checkpoint>,
    #[serde(default)]
    pub fields: BTreeMap<Field, FieldSpec>,
    /// Strings expected in the plain text, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub text_markers: Vec<String>,
}

impl TemplateMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn checkpoint(mut self, path: impl Into<TablePath>, value: impl Into<String>) -> Self {
        self.checkpoints.push(Checkpoint {
            path: path.into(),
            value: value.into(),
        });
        self
    }

    /// Map a field to a verbatim cell.
    pub fn field(self, field: Field, path: impl Into<TablePath>) -> Self {
        self.field_with(field, path, Coercion::Verbatim)
    }

    pub fn field_with(
        mut self,
        field: Field,
        path: impl Into<TablePath>,
        coercion: Coercion,
    ) -> Self {
        self.fields.insert(
            field,
            FieldSpec::Path {
                path: path.into(),
                coercion,
                optional: false,
            },
        );
        self
    }

    /// Map a field to a cell that may be absent.
    pub fn optional_field(mut self, field: Field, path: impl Into<TablePath>) -> Self {
        self.fields.insert(
            field,
            FieldSpec::Path {
                path: path.into(),
                coercion: Coercion::Verbatim,
                optional: true,
            },
        );
        self
    }

    pub fn constant(mut self, field: Field, value: impl Into<String>) -> Self {
        self.fields.insert(
            field,
            FieldSpec::Constant {
                value: value.into(),
            },
        );
        self
    }

    pub fn text_marker(mut self, marker: impl Into<String>) -> Self {
        self.text_markers.push(marker.into());
        self
    }

    pub fn spec(&self, field: Field) -> Option<&FieldSpec> {
        self.fields.get(&field)
    }

    /// Text markers with duplicates removed, first occurrence kept.
    pub fn unique_text_markers(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for marker in &self.text_markers {
            if !seen.contains(&marker.as_str()) {
                seen.push(marker.as_str());
            }
        }
        seen
    }
}
