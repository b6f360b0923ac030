//! Import log stored as one JSON object per line.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::warn;

use caseimport_core::selection::{ImportLog, ImportLogEntry, ImportStatus};
use caseimport_core::{CaseImportError, Result};

/// Append-only JSON-lines import log.
pub struct FileImportLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileImportLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Every readable entry, in the order they were written.
    pub fn entries(&self) -> Result<Vec<ImportLogEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)?;
        let mut entries = Vec::new();
        for (number, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ImportLogEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(
                    "Skipping line {} of {}: {}",
                    number + 1,
                    self.path.display(),
                    e
                ),
            }
        }
        Ok(entries)
    }
}

impl ImportLog for FileImportLog {
    fn is_imported(&self, path: &Path) -> Result<bool> {
        Ok(self
            .entries()?
            .iter()
            .any(|e| e.filename == path && e.status == ImportStatus::Imported))
    }

    fn record(&self, entry: ImportLogEntry) -> Result<()> {
        let line = serde_json::to_string(&entry)
            .map_err(|e| CaseImportError::Config(format!("cannot serialize log entry: {e}")))?;

        let _guard = self
            .lock
            .lock()
            .map_err(|_| CaseImportError::Config("import log lock poisoned".to_string()))?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn entry(filename: &str, status: ImportStatus) -> ImportLogEntry {
        ImportLogEntry {
            filename: PathBuf::from(filename),
            provider: "clinic-report".to_string(),
            internal_ref_num: "REF001".to_string(),
            external_ref_num: String::new(),
            status,
            logged_at: Utc::now(),
        }
    }

    #[test]
    fn test_only_successful_imports_count() {
        let dir = tempfile::tempdir().unwrap();
        let log = FileImportLog::new(dir.path().join("logs").join("imports.jsonl"));

        assert!(!log.is_imported(Path::new("a.docx")).unwrap());
        log.record(entry("a.docx", ImportStatus::Imported)).unwrap();
        log.record(entry("b.docx", ImportStatus::Failed)).unwrap();

        assert!(log.is_imported(Path::new("a.docx")).unwrap());
        assert!(!log.is_imported(Path::new("b.docx")).unwrap());
        assert_eq!(log.entries().unwrap().len(), 2);
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("imports.jsonl");
        fs::write(&path, "not json\n\n").unwrap();

        let log = FileImportLog::new(&path);
        log.record(entry("a.docx", ImportStatus::Imported)).unwrap();
        assert_eq!(log.entries().unwrap().len(), 1);
    }
}
