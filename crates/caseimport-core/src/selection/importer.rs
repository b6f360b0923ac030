//! Import service: select a provider and hand the case to a generator.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::select_fitting;
use crate::Result;
use crate::error::{CaseImportError, GeneratorError, ImportError, SelectionError};
use crate::models::CaseRecord;
use crate::provider::CaseDataProvider;
use crate::template::Field;

/// Turns a fitting provider into a stored case.
pub trait CaseGenerator: Send {
    fn create_case(&mut self, provider: &mut dyn CaseDataProvider) -> Result<CaseRecord>;
}

/// Generator that only collects records in memory.
#[derive(Debug, Default)]
pub struct DryCaseGenerator {
    records: Vec<CaseRecord>,
    ref_numbers: HashSet<String>,
}

impl DryCaseGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[CaseRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<CaseRecord> {
        self.records
    }
}

impl CaseGenerator for DryCaseGenerator {
    fn create_case(&mut self, provider: &mut dyn CaseDataProvider) -> Result<CaseRecord> {
        let record = CaseRecord::collect(provider)?;
        if !self.ref_numbers.insert(record.internal_ref_number.clone()) {
            return Err(GeneratorError::Duplicate(record.internal_ref_number).into());
        }
        self.records.push(record.clone());
        Ok(record)
    }
}

/// Outcome stored in the import log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStatus {
    Imported,
    Failed,
}

/// One import log line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportLogEntry {
    pub filename: PathBuf,
    pub provider: String,
    #[serde(default)]
    pub internal_ref_num: String,
    #[serde(default)]
    pub external_ref_num: String,
    pub status: ImportStatus,
    pub logged_at: DateTime<Utc>,
}

impl ImportLogEntry {
    /// Entry for a provider bound to `filename`; reference numbers are read
    /// when the provider has them.
    pub fn for_provider(
        filename: &Path,
        provider: &mut dyn CaseDataProvider,
        status: ImportStatus,
    ) -> Self {
        Self {
            filename: filename.to_path_buf(),
            provider: provider.name().to_string(),
            internal_ref_num: provider.text(Field::InternalRefNumber).unwrap_or_default(),
            external_ref_num: provider.text(Field::ExternalRefNumber).unwrap_or_default(),
            status,
            logged_at: Utc::now(),
        }
    }
}

/// Record of already imported files.
pub trait ImportLog: Send + Sync {
    /// Whether `path` was imported successfully before.
    fn is_imported(&self, path: &Path) -> Result<bool>;

    fn record(&self, entry: ImportLogEntry) -> Result<()>;
}

/// In-memory import log.
#[derive(Debug, Default)]
pub struct MemoryImportLog {
    entries: Mutex<Vec<ImportLogEntry>>,
}

impl MemoryImportLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<ImportLogEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }
}

impl ImportLog for MemoryImportLog {
    fn is_imported(&self, path: &Path) -> Result<bool> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| CaseImportError::Config("import log lock poisoned".to_string()))?;
        Ok(entries
            .iter()
            .any(|e| e.filename == path && e.status == ImportStatus::Imported))
    }

    fn record(&self, entry: ImportLogEntry) -> Result<()> {
        self.entries
            .lock()
            .map_err(|_| CaseImportError::Config("import log lock poisoned".to_string()))?
            .push(entry);
        Ok(())
    }
}

/// A case created from a document.
#[derive(Debug, Clone, Serialize)]
pub struct ImportedCase {
    pub provider: String,
    pub record: CaseRecord,
}

/// Imports documents through the first fitting provider.
pub struct CaseImporter {
    providers: Vec<Box<dyn CaseDataProvider>>,
    generator: Box<dyn CaseGenerator>,
    log: Arc<dyn ImportLog>,
    store_errors: bool,
    errors: Vec<ImportError>,
}

impl CaseImporter {
    pub fn new(providers: Vec<Box<dyn CaseDataProvider>>, generator: Box<dyn CaseGenerator>) -> Self {
        Self {
            providers,
            generator,
            log: Arc::new(MemoryImportLog::new()),
            store_errors: false,
            errors: Vec::new(),
        }
    }

    pub fn with_log(mut self, log: Arc<dyn ImportLog>) -> Self {
        self.log = log;
        self
    }

    /// Ask every provider to record its failed rules.
    pub fn store_errors(mut self, store: bool) -> Self {
        self.store_errors = store;
        self
    }

    pub fn providers(&self) -> &[Box<dyn CaseDataProvider>] {
        &self.providers
    }

    /// Diagnostics of every file that was not imported.
    pub fn errors(&self) -> &[ImportError] {
        &self.errors
    }

    /// Import one document.
    pub fn import(&mut self, path: &Path) -> Result<ImportedCase> {
        self.import_from(path, path)
    }

    /// Import `document` on behalf of `source`.
    ///
    /// Used for converted legacy files: the import log and diagnostics refer
    /// to `source` while the providers read `document`. The source is logged
    /// under its canonical path, so aliases of one file are imported once.
    pub fn import_from(&mut self, source: &Path, document: &Path) -> Result<ImportedCase> {
        if self.providers.is_empty() {
            return Err(SelectionError::NoProviders.into());
        }
        let canonical = canonical_path(source);
        let source = canonical.as_path();
        if self.log.is_imported(source)? {
            return Err(SelectionError::AlreadyImported(source.to_path_buf()).into());
        }

        if self.store_errors {
            for provider in &mut self.providers {
                provider.set_store_errors(true);
            }
        }

        let Some(index) = select_fitting(document, &mut self.providers)? else {
            let diagnostics: Vec<ImportError> = self
                .providers
                .iter()
                .flat_map(|provider| provider.errors().iter().cloned())
                .collect();
            error!("File not being imported: {}", source.display());
            self.errors.extend(diagnostics.iter().cloned());
            return Err(SelectionError::NoFittingProvider {
                path: source.to_path_buf(),
                diagnostics,
            }
            .into());
        };

        let provider = self.providers[index].as_mut();
        match self.generator.create_case(provider) {
            Ok(record) => {
                self.log
                    .record(ImportLogEntry::for_provider(source, provider, ImportStatus::Imported))?;
                info!(
                    "Imported {} with {} as {}",
                    source.display(),
                    provider.name(),
                    record.internal_ref_number
                );
                Ok(ImportedCase {
                    provider: provider.name().to_string(),
                    record,
                })
            }
            Err(e) => {
                warn!("{} fits {} but was rejected: {}", source.display(), provider.name(), e);
                self.log
                    .record(ImportLogEntry::for_provider(source, provider, ImportStatus::Failed))?;
                Err(e)
            }
        }
    }

    /// Extensions accepted by any provider, first occurrence order.
    pub fn importable_extensions(&self) -> Vec<String> {
        unique(self.providers.iter().flat_map(|p| p.file_extensions().iter()))
    }

    /// Exclude patterns of every provider, first occurrence order.
    pub fn exclude_patterns(&self) -> Vec<String> {
        unique(self.providers.iter().flat_map(|p| p.exclude_patterns().iter()))
    }
}

/// Resolved absolute path, or `path` itself when it cannot be resolved.
fn canonical_path(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn unique<'a>(values: impl Iterator<Item = &'a String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for value in values {
        if seen.insert(value.as_str()) {
            out.push(value.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CaseImportError;
    use crate::selection::tests::StubProvider;

    /// Accepts everything, returns a record built from the provider name.
    struct NameGenerator;

    impl CaseGenerator for NameGenerator {
        fn create_case(&mut self, provider: &mut dyn CaseDataProvider) -> Result<CaseRecord> {
            let json = serde_json::json!({
                "internal_ref_number": provider.text(Field::InternalRefNumber)?,
                "external_ref_number": "",
                "assistant": {"title": ""},
                "patient": {"name": "", "symptoms": ""},
                "visit": {},
                "doctor": {"name": "", "gender": "", "investigation": "", "recommendation": ""},
                "caseable_type": "doctor",
                "reappointment": false,
                "metadata": {
                    "provider": provider.name(),
                    "source_file": "x.docx",
                    "imported_at": "2019-11-20T08:04:44Z"
                }
            });
            serde_json::from_value(json).map_err(|e| GeneratorError::Rejected(e.to_string()).into())
        }
    }

    fn importer(providers: Vec<Box<dyn CaseDataProvider>>) -> CaseImporter {
        CaseImporter::new(providers, Box::new(NameGenerator)).store_errors(true)
    }

    #[test]
    fn test_import_uses_first_fit() {
        let mut importer = importer(vec![
            StubProvider::boxed("a", &["other"]),
            StubProvider::boxed("b", &["case"]),
        ]);
        let imported = importer.import(Path::new("case.docx")).unwrap();
        assert_eq!(imported.provider, "b");
        assert_eq!(imported.record.internal_ref_number, "b-REF");
    }

    #[test]
    fn test_second_import_is_refused() {
        let log = Arc::new(MemoryImportLog::new());
        let mut importer =
            importer(vec![StubProvider::boxed("a", &["case"])]).with_log(log.clone());

        importer.import(Path::new("case.docx")).unwrap();
        let err = importer.import(Path::new("case.docx")).unwrap_err();
        assert!(matches!(
            err,
            CaseImportError::Selection(SelectionError::AlreadyImported(_))
        ));
        assert_eq!(log.entries().len(), 1);
        assert_eq!(log.entries()[0].internal_ref_num, "a-REF");
    }

    #[test]
    fn test_aliased_path_is_imported_once() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("case.docx"), b"x").unwrap();

        let log = Arc::new(MemoryImportLog::new());
        let mut importer =
            importer(vec![StubProvider::boxed("a", &["case"])]).with_log(log.clone());

        importer.import(&dir.path().join("case.docx")).unwrap();
        let alias = dir.path().join("sub").join("..").join("case.docx");
        assert!(matches!(
            importer.import(&alias),
            Err(CaseImportError::Selection(SelectionError::AlreadyImported(_)))
        ));
        assert_eq!(log.entries().len(), 1);
        assert_eq!(
            log.entries()[0].filename,
            std::fs::canonicalize(dir.path().join("case.docx")).unwrap()
        );
    }

    #[test]
    fn test_no_fit_collects_diagnostics() {
        let mut importer = importer(vec![
            StubProvider::boxed("a", &["other"]),
            StubProvider::boxed("b", &["letter"]),
        ]);
        let err = importer.import(Path::new("case.docx")).unwrap_err();
        match err {
            CaseImportError::Selection(SelectionError::NoFittingProvider { diagnostics, .. }) => {
                let sources: Vec<_> = diagnostics.iter().map(|d| d.source.as_str()).collect();
                assert_eq!(sources, vec!["a", "b"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(importer.errors().len(), 2);
    }

    #[test]
    fn test_import_from_logs_the_source() {
        let log = Arc::new(MemoryImportLog::new());
        let mut importer =
            importer(vec![StubProvider::boxed("a", &["converted"])]).with_log(log.clone());

        importer
            .import_from(Path::new("old.doc"), Path::new("/tmp/converted.docx"))
            .unwrap();
        assert_eq!(log.entries()[0].filename, PathBuf::from("old.doc"));
        assert!(matches!(
            importer.import_from(Path::new("old.doc"), Path::new("/tmp/converted.docx")),
            Err(CaseImportError::Selection(SelectionError::AlreadyImported(_)))
        ));
    }

    #[test]
    fn test_empty_registry() {
        let mut importer = importer(Vec::new());
        assert!(matches!(
            importer.import(Path::new("case.docx")),
            Err(CaseImportError::Selection(SelectionError::NoProviders))
        ));
    }

    #[test]
    fn test_extension_and_pattern_unions() {
        let mut a = StubProvider::new("a", &[]);
        a.extensions = vec!["docx".to_string(), "doc".to_string()];
        let b = StubProvider::new("b", &[]);
        let importer = importer(vec![Box::new(a), Box::new(b)]);
        assert_eq!(importer.importable_extensions(), vec!["docx", "doc"]);
        assert!(importer.exclude_patterns().is_empty());
    }
}
