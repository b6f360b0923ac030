//! Document reading module.

mod legacy;
mod reader;

pub use legacy::{
    is_legacy_document, CommandConverter, ConvertedDocument, DocumentConverter, OLE_SIGNATURE,
};
pub use reader::{DocxReader, DOCUMENT_ENTRY};

use std::path::Path;

use image::ImageFormat;
use serde::Serialize;

use crate::error::DocumentError;

/// Result type for document operations.
pub type Result<T> = std::result::Result<T, DocumentError>;

/// A node of the markup tree read from a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupNode {
    /// Qualified element name, e.g. `w:tbl`.
    pub tag: String,
    /// Children or leaf text.
    pub content: NodeContent,
}

/// Content of a markup node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeContent {
    /// Child elements in document order.
    Children(Vec<MarkupNode>),
    /// Leaf text.
    Text(String),
}

impl MarkupNode {
    /// Create a container node.
    pub fn element(tag: impl Into<String>, children: Vec<MarkupNode>) -> Self {
        Self {
            tag: tag.into(),
            content: NodeContent::Children(children),
        }
    }

    /// Create a leaf node.
    pub fn text(tag: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            content: NodeContent::Text(value.into()),
        }
    }

    /// Child nodes, empty for leaves.
    pub fn children(&self) -> &[MarkupNode] {
        match &self.content {
            NodeContent::Children(children) => children,
            NodeContent::Text(_) => &[],
        }
    }

    /// All leaf text in document order, without separators.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match &self.content {
            NodeContent::Text(text) => out.push_str(text),
            NodeContent::Children(children) => {
                for child in children {
                    child.collect_text(out);
                }
            }
        }
    }
}

/// An image stored inside a document container.
#[derive(Debug, Clone, Serialize)]
pub struct EmbeddedImage {
    /// Entry name inside the container, e.g. `word/media/image1.png`.
    pub name: String,
    /// Lowercase file extension.
    pub extension: String,
    /// Raw bytes.
    #[serde(skip)]
    pub content: Vec<u8>,
}

impl EmbeddedImage {
    /// Hex blake3 hash of the content, used to exclude known images.
    pub fn fingerprint(&self) -> String {
        blake3::hash(&self.content).to_hex().to_string()
    }

    /// Image format sniffed from the content, falling back to the extension.
    pub fn format(&self) -> Option<ImageFormat> {
        image::guess_format(&self.content)
            .ok()
            .or_else(|| ImageFormat::from_extension(&self.extension))
    }
}

/// Trait for document container readers.
pub trait DocumentReader: Send + Sync {
    /// Read the markup tree of the document.
    fn open(&self, path: &Path) -> Result<MarkupNode>;

    /// Read the embedded images of the document.
    fn images(&self, path: &Path) -> Result<Vec<EmbeddedImage>>;

    /// Document text with every tag stripped.
    fn plain_text(&self, path: &Path) -> Result<String> {
        Ok(self.open(path)?.text_content())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_content_is_document_order() {
        let tree = MarkupNode::element(
            "w:body",
            vec![
                MarkupNode::element("w:p", vec![MarkupNode::text("w:t", "Patient")]),
                MarkupNode::element("w:p", vec![MarkupNode::text("w:t", "Doctor")]),
            ],
        );
        assert_eq!(tree.text_content(), "PatientDoctor");
        assert!(tree.children()[0].children()[0].children().is_empty());
    }

    #[test]
    fn test_image_format_falls_back_to_extension() {
        let image = EmbeddedImage {
            name: "word/media/image1.png".to_string(),
            extension: "png".to_string(),
            content: vec![0, 1, 2],
        };
        assert_eq!(image.format(), Some(ImageFormat::Png));
        assert_eq!(image.fingerprint().len(), 64);
    }
}
