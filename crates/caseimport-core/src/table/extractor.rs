//! Collapses a markup tree into nested table sequences.

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::{ExtractedTables, TableNode};
use crate::docx::{MarkupNode, NodeContent};

/// Node tags marking table boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableTags {
    /// Table element, e.g. `w:tbl`.
    pub table: String,
    /// Row element, e.g. `w:tr`.
    pub row: String,
    /// Cell element, e.g. `w:tc`.
    pub cell: String,
    /// Paragraph element; paragraphs inside a cell are separated by a space.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paragraph: Option<String>,
}

impl TableTags {
    /// Tags of the word-processing markup.
    pub fn docx() -> Self {
        Self {
            table: "w:tbl".to_string(),
            row: "w:tr".to_string(),
            cell: "w:tc".to_string(),
            paragraph: Some("w:p".to_string()),
        }
    }

    /// Custom tags without paragraph separation.
    pub fn new(table: impl Into<String>, row: impl Into<String>, cell: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            row: row.into(),
            cell: cell.into(),
            paragraph: None,
        }
    }

    fn is_paragraph(&self, tag: &str) -> bool {
        self.paragraph.as_deref() == Some(tag)
    }
}

impl Default for TableTags {
    fn default() -> Self {
        Self::docx()
    }
}

/// Tree-to-table extractor.
#[derive(Debug, Clone)]
pub struct TableExtractor {
    tags: TableTags,
    normalize_whitespace: bool,
}

impl Default for TableExtractor {
    fn default() -> Self {
        Self::new(TableTags::docx())
    }
}

impl TableExtractor {
    /// Create an extractor for the given tags.
    pub fn new(tags: TableTags) -> Self {
        Self {
            tags,
            normalize_whitespace: true,
        }
    }

    /// Collapse whitespace runs in cell text and trim it.
    pub fn normalize_whitespace(mut self, normalize: bool) -> Self {
        self.normalize_whitespace = normalize;
        self
    }

    /// Extract every table of the tree. No tables yields an empty sequence.
    pub fn extract(&self, root: &MarkupNode) -> ExtractedTables {
        let mut tables = Vec::new();
        self.collect_tables(root, &mut tables);
        trace!("Extracted {} root table(s)", tables.len());

        ExtractedTables {
            tables: TableNode::List(tables),
        }
    }

    fn collect_tables(&self, node: &MarkupNode, tables: &mut Vec<TableNode>) {
        if node.tag == self.tags.table {
            tables.push(self.build_table(node));
            return;
        }
        for child in node.children() {
            self.collect_tables(child, tables);
        }
    }

    fn build_table(&self, table: &MarkupNode) -> TableNode {
        let mut rows = Vec::new();
        self.collect_rows(table, &mut rows);
        TableNode::List(rows)
    }

    fn collect_rows(&self, node: &MarkupNode, rows: &mut Vec<TableNode>) {
        for child in node.children() {
            if child.tag == self.tags.row {
                rows.push(self.build_row(child));
            } else if child.tag != self.tags.table {
                self.collect_rows(child, rows);
            }
        }
    }

    fn build_row(&self, row: &MarkupNode) -> TableNode {
        let mut cells = Vec::new();
        self.collect_cells(row, &mut cells);
        TableNode::List(cells)
    }

    fn collect_cells(&self, node: &MarkupNode, cells: &mut Vec<TableNode>) {
        for child in node.children() {
            if child.tag == self.tags.cell {
                cells.push(self.build_cell(child));
            } else if child.tag != self.tags.table && child.tag != self.tags.row {
                self.collect_cells(child, cells);
            }
        }
    }

    fn build_cell(&self, cell: &MarkupNode) -> TableNode {
        let mut builder = CellBuilder::default();
        match &cell.content {
            NodeContent::Text(text) => builder.text.push_str(text),
            NodeContent::Children(children) => {
                for child in children {
                    self.walk_cell(child, &mut builder);
                }
            }
        }
        builder.finish(self.normalize_whitespace)
    }

    fn walk_cell(&self, node: &MarkupNode, builder: &mut CellBuilder) {
        if node.tag == self.tags.table {
            builder.push_table(self.build_table(node), self.normalize_whitespace);
            return;
        }
        if self.tags.is_paragraph(&node.tag) {
            builder.separate();
        }
        match &node.content {
            NodeContent::Text(text) => builder.text.push_str(text),
            NodeContent::Children(children) => {
                for child in children {
                    self.walk_cell(child, builder);
                }
            }
        }
    }
}

/// Accumulates the value of one cell.
#[derive(Default)]
struct CellBuilder {
    parts: Vec<TableNode>,
    text: String,
    has_table: bool,
}

impl CellBuilder {
    fn separate(&mut self) {
        if !self.text.is_empty() && !self.text.ends_with(char::is_whitespace) {
            self.text.push(' ');
        }
    }

    fn flush_text(&mut self, normalize: bool) {
        let text = clean(&std::mem::take(&mut self.text), normalize);
        if !text.trim().is_empty() {
            self.parts.push(TableNode::Text(text));
        }
    }

    fn push_table(&mut self, table: TableNode, normalize: bool) {
        self.flush_text(normalize);
        self.parts.push(table);
        self.has_table = true;
    }

    fn finish(mut self, normalize: bool) -> TableNode {
        if !self.has_table {
            return TableNode::Text(clean(&self.text, normalize));
        }
        self.flush_text(normalize);
        TableNode::List(self.parts)
    }
}

fn clean(text: &str, normalize: bool) -> String {
    if normalize {
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    } else {
        text.to_string()
    }
}
