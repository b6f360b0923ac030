//! Zipped-XML (`.docx`) reader using zip and quick-xml.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use lazy_static::lazy_static;
use quick_xml::Reader;
use quick_xml::events::Event;
use regex::Regex;
use tracing::{debug, trace};
use zip::ZipArchive;

use super::{DocumentReader, EmbeddedImage, MarkupNode, NodeContent, Result};
use crate::error::DocumentError;

/// Main document part of a word-processing container.
pub const DOCUMENT_ENTRY: &str = "word/document.xml";

/// Tag given to text found next to child elements (mixed content).
const MIXED_TEXT_TAG: &str = "#text";

lazy_static! {
    static ref IMAGE_ENTRY: Regex = Regex::new(r"(?i)\.(jpg|gif|png|jpeg|bmp|wmf)$").unwrap();
}

/// Reader for `.docx` containers.
#[derive(Debug, Clone, Default)]
pub struct DocxReader {
    /// Content fingerprints or entry names of images that are never content
    /// (letterheads, logos).
    excluded_images: HashSet<String>,
}

impl DocxReader {
    /// Create a new reader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip images whose blake3 fingerprint or entry name is listed.
    pub fn with_excluded_images<I, S>(mut self, excluded: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_images = excluded.into_iter().map(Into::into).collect();
        self
    }

    fn archive(&self, path: &Path) -> Result<ZipArchive<BufReader<File>>> {
        let file = File::open(path)?;
        ZipArchive::new(BufReader::new(file)).map_err(|e| DocumentError::corrupt(path, e))
    }

    fn read_entry<R: Read + Seek>(
        archive: &mut ZipArchive<R>,
        path: &Path,
        entry: &str,
    ) -> Result<String> {
        let mut file = archive.by_name(entry).map_err(|_| DocumentError::MissingEntry {
            path: path.to_path_buf(),
            entry: entry.to_string(),
        })?;

        let mut xml = String::new();
        file.read_to_string(&mut xml)
            .map_err(|e| DocumentError::corrupt(path, e))?;
        Ok(xml)
    }

    fn is_excluded(&self, image: &EmbeddedImage) -> bool {
        self.excluded_images.contains(&image.name)
            || self.excluded_images.contains(&image.fingerprint())
    }
}

impl DocumentReader for DocxReader {
    fn open(&self, path: &Path) -> Result<MarkupNode> {
        let mut archive = self.archive(path)?;
        let xml = Self::read_entry(&mut archive, path, DOCUMENT_ENTRY)?;
        let tree = parse_markup(&xml).map_err(|reason| DocumentError::Xml {
            path: path.to_path_buf(),
            reason,
        })?;

        debug!("Read markup tree from {}", path.display());
        Ok(tree)
    }

    fn images(&self, path: &Path) -> Result<Vec<EmbeddedImage>> {
        let mut archive = self.archive(path)?;
        let mut images = Vec::new();

        for index in 0..archive.len() {
            let mut entry = archive
                .by_index(index)
                .map_err(|e| DocumentError::corrupt(path, e))?;

            let name = entry.name().trim().to_string();
            if entry.size() == 0 || !IMAGE_ENTRY.is_match(&name) {
                continue;
            }

            let mut content = Vec::new();
            entry
                .read_to_end(&mut content)
                .map_err(|e| DocumentError::corrupt(path, e))?;

            let extension = name
                .rsplit('.')
                .next()
                .unwrap_or_default()
                .to_lowercase();
            let image = EmbeddedImage {
                name,
                extension,
                content,
            };

            if self.is_excluded(&image) {
                trace!("Skipping excluded image {}", image.name);
                continue;
            }
            images.push(image);
        }

        debug!("Found {} image(s) in {}", images.len(), path.display());
        Ok(images)
    }
}

/// Element being built while reading.
struct OpenElement {
    tag: String,
    children: Vec<MarkupNode>,
    text: String,
}

impl OpenElement {
    fn new(tag: String) -> Self {
        Self {
            tag,
            children: Vec::new(),
            text: String::new(),
        }
    }

    /// Add a child, keeping the text read before it in front of it.
    fn push_child(&mut self, node: MarkupNode) {
        self.flush_text();
        self.children.push(node);
    }

    fn flush_text(&mut self) {
        let text = std::mem::take(&mut self.text);
        if !text.trim().is_empty() {
            self.children.push(MarkupNode::text(MIXED_TEXT_TAG, text.trim()));
        }
    }

    fn close(mut self) -> MarkupNode {
        if self.children.is_empty() {
            if self.text.is_empty() {
                return MarkupNode::element(self.tag, Vec::new());
            }
            return MarkupNode::text(self.tag, self.text);
        }

        self.flush_text();
        MarkupNode {
            tag: self.tag,
            content: NodeContent::Children(self.children),
        }
    }
}

/// Self-closing elements that stand for whitespace in running text.
fn empty_element(tag: String) -> MarkupNode {
    match tag.as_str() {
        "w:tab" | "w:br" | "w:cr" => MarkupNode::text(tag, " "),
        _ => MarkupNode::element(tag, Vec::new()),
    }
}

/// Parse XML into a markup tree, dropping attributes.
pub(crate) fn parse_markup(xml: &str) -> std::result::Result<MarkupNode, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut stack: Vec<OpenElement> = Vec::new();
    let mut root: Option<MarkupNode> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                stack.push(OpenElement::new(tag));
            }
            Ok(Event::Empty(e)) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                let node = empty_element(tag);
                match stack.last_mut() {
                    Some(parent) => parent.push_child(node),
                    None => root = Some(node),
                }
            }
            Ok(Event::Text(e)) => {
                if let Some(current) = stack.last_mut() {
                    let text = e.unescape().map_err(|e| e.to_string())?;
                    current.text.push_str(&text);
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Ok(Event::End(_)) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| "unbalanced closing tag".to_string())?;
                let node = element.close();
                match stack.last_mut() {
                    Some(parent) => parent.push_child(node),
                    None => root = Some(node),
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(format!(
                    "error at position {}: {}",
                    reader.error_position(),
                    e
                ));
            }
        }
    }

    if !stack.is_empty() {
        return Err(format!("{} element(s) left open", stack.len()));
    }
    root.ok_or_else(|| "document has no root element".to_string())
}
