//! CLI subcommands and the helpers they share.

pub mod batch;
pub mod config;
pub mod import;
pub mod inspect;
pub mod stats;
pub mod templates;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Args;
use glob::{Pattern, glob};
use tracing::{debug, info};

use caseimport_core::docx::{CommandConverter, ConvertedDocument, DocumentConverter, is_legacy_document};
use caseimport_core::{
    CaseDataProvider, DocumentReader, ImportConfig, TableExtractor, TemplateDefinition,
    TemplateProvider,
};

/// Extension of binary documents that are converted before reading.
pub const LEGACY_EXTENSION: &str = "doc";

/// Default location of the configuration file.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("caseimport")
        .join("config.json")
}

/// Load the configuration from `--config`, the default location, or defaults.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<ImportConfig> {
    if let Some(path) = config_path {
        return Ok(ImportConfig::from_file(Path::new(path))?);
    }
    let default_path = default_config_path();
    if default_path.exists() {
        debug!("Using config {}", default_path.display());
        Ok(ImportConfig::from_file(&default_path)?)
    } else {
        Ok(ImportConfig::default())
    }
}

/// Where template definitions are read from.
#[derive(Args, Clone)]
pub struct TemplateSource {
    /// Template directory (default: `import.template_dir` from the config)
    #[arg(short, long)]
    pub templates: Option<PathBuf>,
}

/// Loaded template definitions and everything needed to build providers.
#[derive(Clone)]
pub struct Registry {
    definitions: Vec<Arc<TemplateDefinition>>,
    reader: Arc<dyn DocumentReader>,
    extractor: TableExtractor,
    store_errors: bool,
}

impl Registry {
    /// Load every definition of the template directory.
    pub fn load(config: &ImportConfig, source: &TemplateSource) -> anyhow::Result<Self> {
        let dir = source
            .templates
            .clone()
            .unwrap_or_else(|| config.import.template_dir.clone());
        let definitions = TemplateDefinition::load_dir(&dir)?;
        if definitions.is_empty() {
            anyhow::bail!("No template definitions found in {}", dir.display());
        }
        debug!("Loaded {} templates from {}", definitions.len(), dir.display());

        Ok(Self {
            definitions: definitions.into_iter().map(Arc::new).collect(),
            reader: Arc::new(config.reader()),
            extractor: config.extractor(),
            store_errors: config.import.store_errors,
        })
    }

    pub fn definitions(&self) -> &[Arc<TemplateDefinition>] {
        &self.definitions
    }

    pub fn reader(&self) -> Arc<dyn DocumentReader> {
        Arc::clone(&self.reader)
    }

    pub fn store_errors(&self) -> bool {
        self.store_errors
    }

    /// Fresh providers in registry order.
    pub fn providers(&self) -> Vec<Box<dyn CaseDataProvider>> {
        self.definitions
            .iter()
            .map(|definition| self.provider(definition))
            .collect()
    }

    /// Fresh provider for one definition.
    pub fn provider(&self, definition: &Arc<TemplateDefinition>) -> Box<dyn CaseDataProvider> {
        let mut provider =
            TemplateProvider::from_shared(Arc::clone(definition), Arc::clone(&self.reader))
                .with_extractor(self.extractor.clone());
        provider.set_store_errors(self.store_errors);
        Box::new(provider)
    }

    /// Extensions accepted by any template.
    pub fn extensions(&self) -> Vec<String> {
        let mut extensions: Vec<String> = Vec::new();
        for extension in self.definitions.iter().flat_map(|d| d.extensions.iter()) {
            let extension = extension.to_lowercase();
            if !extensions.contains(&extension) {
                extensions.push(extension);
            }
        }
        extensions
    }

    /// File name patterns excluded by any template.
    pub fn exclude_patterns(&self) -> anyhow::Result<Vec<Pattern>> {
        let mut patterns = Vec::new();
        for raw in self.definitions.iter().flat_map(|d| d.exclude_patterns.iter()) {
            patterns.push(Pattern::new(raw)?);
        }
        Ok(patterns)
    }
}

/// Expand a directory or glob pattern into the importable files it names.
pub fn collect_files(input: &str, registry: &Registry) -> anyhow::Result<Vec<PathBuf>> {
    let pattern = if Path::new(input).is_dir() {
        Path::new(input).join("**").join("*").to_string_lossy().into_owned()
    } else {
        input.to_string()
    };

    let extensions = registry.extensions();
    let excluded = registry.exclude_patterns()?;

    let mut files: Vec<PathBuf> = glob(&pattern)?
        .filter_map(|r| r.ok())
        .filter(|p| p.is_file())
        .filter(|p| {
            let ext = p.extension().and_then(|e| e.to_str()).unwrap_or("");
            let ext = ext.to_lowercase();
            ext == LEGACY_EXTENSION || extensions.contains(&ext)
        })
        .filter(|p| {
            let name = p.file_name().and_then(|n| n.to_str()).unwrap_or("");
            !excluded.iter().any(|pattern| pattern.matches(name))
        })
        .collect();
    files.sort();
    Ok(files)
}

/// A document ready for the providers; legacy files are converted first.
pub struct PreparedDocument {
    source: PathBuf,
    converted: Option<ConvertedDocument>,
}

impl PreparedDocument {
    pub fn prepare(path: &Path, config: &ImportConfig) -> anyhow::Result<Self> {
        if !path.exists() {
            anyhow::bail!("Input file not found: {}", path.display());
        }

        let converted = if is_legacy_document(path)? {
            info!("Converting legacy document {}", path.display());
            let converter = CommandConverter::new(config.conversion.command.clone())?;
            Some(converter.convert(path)?)
        } else {
            None
        };

        Ok(Self {
            source: path.to_path_buf(),
            converted,
        })
    }

    /// The file the user named.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// The file the providers read.
    pub fn document(&self) -> &Path {
        self.converted
            .as_ref()
            .map(ConvertedDocument::path)
            .unwrap_or(self.source.as_path())
    }
}
