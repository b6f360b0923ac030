//! Configuration structures for the import pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::docx::DocxReader;
use crate::table::{TableExtractor, TableTags};

/// Main configuration for the case importer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Provider selection settings.
    pub import: ImportSettings,

    /// Table extraction settings.
    pub extraction: ExtractionConfig,

    /// Batch processing settings.
    pub batch: BatchConfig,

    /// Legacy `.doc` conversion settings.
    pub conversion: ConversionConfig,
}

/// Provider selection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportSettings {
    /// Record every failed rule so unmatched files can be explained.
    pub store_errors: bool,

    /// Directory with template definition files.
    pub template_dir: PathBuf,

    /// Blake3 fingerprints or entry names of images that are never imported.
    pub excluded_images: Vec<String>,

    /// Import log file; already listed files are refused.
    pub import_log: Option<PathBuf>,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            store_errors: true,
            template_dir: PathBuf::from("templates"),
            excluded_images: Vec::new(),
            import_log: None,
        }
    }
}

/// Table extraction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Element names of tables, rows and cells.
    pub tags: TableTags,

    /// Collapse whitespace runs in cell text.
    pub normalize_whitespace: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            tags: TableTags::docx(),
            normalize_whitespace: true,
        }
    }
}

/// Batch processing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Files processed concurrently.
    pub jobs: usize,

    /// Per-file time limit in seconds (0 = unlimited).
    pub file_timeout_secs: u64,

    /// Keep going after a file fails.
    pub continue_on_error: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            jobs: 4,
            file_timeout_secs: 60,
            continue_on_error: true,
        }
    }
}

/// Legacy `.doc` conversion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// Converter command line; `{input}` and `{outdir}` are substituted.
    pub command: Vec<String>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            command: [
                "soffice",
                "--headless",
                "--convert-to",
                "docx",
                "--outdir",
                "{outdir}",
                "{input}",
            ]
            .iter()
            .map(ToString::to_string)
            .collect(),
        }
    }
}

impl ImportConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        std::fs::write(path, content)
    }

    /// Document reader honoring the excluded images.
    pub fn reader(&self) -> DocxReader {
        DocxReader::default().with_excluded_images(self.import.excluded_images.iter().cloned())
    }

    /// Table extractor for the configured tags.
    pub fn extractor(&self) -> TableExtractor {
        TableExtractor::new(self.extraction.tags.clone())
            .normalize_whitespace(self.extraction.normalize_whitespace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: ImportConfig =
            serde_json::from_str(r#"{"batch": {"jobs": 8}, "import": {"store_errors": false}}"#)
                .unwrap();
        assert_eq!(config.batch.jobs, 8);
        assert_eq!(config.batch.file_timeout_secs, 60);
        assert!(!config.import.store_errors);
        assert_eq!(config.extraction.tags, TableTags::docx());
        assert_eq!(config.conversion.command[0], "soffice");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = ImportConfig::default();
        config.import.excluded_images.push("abc".to_string());
        config.save(&path).unwrap();

        let loaded = ImportConfig::from_file(&path).unwrap();
        assert_eq!(loaded.import.excluded_images, vec!["abc"]);
    }
}
