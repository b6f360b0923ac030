//! Legacy binary (`.doc`) documents.
//!
//! Conversion is delegated to an external program; the pipeline only ever
//! reads the zipped-XML result.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;
use tracing::{debug, warn};

use super::Result;
use crate::error::DocumentError;

/// OLE2 compound file signature.
pub const OLE_SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Check whether the file starts with the OLE2 signature.
pub fn is_legacy_document(path: &Path) -> Result<bool> {
    let mut header = [0u8; 8];
    let mut file = File::open(path)?;
    match file.read_exact(&mut header) {
        Ok(()) => Ok(header == OLE_SIGNATURE),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Converts legacy documents to the zipped-XML format.
pub trait DocumentConverter: Send + Sync {
    /// Convert `path`, returning the converted file. The returned guard keeps
    /// the output alive; dropping it removes the converted file.
    fn convert(&self, path: &Path) -> Result<ConvertedDocument>;
}

/// A converted document living in a temporary directory.
#[derive(Debug)]
pub struct ConvertedDocument {
    path: PathBuf,
    _dir: TempDir,
}

impl ConvertedDocument {
    /// Path of the converted file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Runs an external command to convert documents.
///
/// The argument template may contain `{input}` and `{outdir}` placeholders,
/// e.g. `["soffice", "--headless", "--convert-to", "docx", "--outdir", "{outdir}", "{input}"]`.
#[derive(Debug, Clone)]
pub struct CommandConverter {
    argv: Vec<String>,
}

impl CommandConverter {
    /// Create a converter from an argument template.
    pub fn new(argv: Vec<String>) -> Result<Self> {
        if argv.is_empty() {
            return Err(DocumentError::Conversion {
                path: PathBuf::new(),
                reason: "converter command is empty".to_string(),
            });
        }
        Ok(Self { argv })
    }

    fn expand(&self, input: &Path, outdir: &Path) -> Vec<String> {
        self.argv
            .iter()
            .map(|arg| {
                arg.replace("{input}", &input.to_string_lossy())
                    .replace("{outdir}", &outdir.to_string_lossy())
            })
            .collect()
    }
}

impl DocumentConverter for CommandConverter {
    fn convert(&self, path: &Path) -> Result<ConvertedDocument> {
        if !is_legacy_document(path)? {
            return Err(DocumentError::NotLegacyDocument(path.to_path_buf()));
        }

        let dir = tempfile::tempdir()?;
        let args = self.expand(path, dir.path());
        debug!("Converting {} with {:?}", path.display(), args);

        let output = Command::new(&args[0])
            .args(&args[1..])
            .output()
            .map_err(|e| DocumentError::Conversion {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("Converter failed for {}: {}", path.display(), stderr.trim());
            return Err(DocumentError::Conversion {
                path: path.to_path_buf(),
                reason: format!("converter exited with {}", output.status),
            });
        }

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        let converted = dir.path().join(format!("{stem}.docx"));
        if !converted.exists() {
            return Err(DocumentError::Conversion {
                path: path.to_path_buf(),
                reason: format!("converter produced no {}", converted.display()),
            });
        }

        Ok(ConvertedDocument {
            path: converted,
            _dir: dir,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_detects_ole_signature() {
        let dir = tempfile::tempdir().unwrap();

        let legacy = dir.path().join("case.doc");
        let mut file = File::create(&legacy).unwrap();
        file.write_all(&OLE_SIGNATURE).unwrap();
        file.write_all(b"rest of the file").unwrap();
        assert!(is_legacy_document(&legacy).unwrap());

        let lock_file = dir.path().join("~$case.doc");
        std::fs::write(&lock_file, b"tmp").unwrap();
        assert!(!is_legacy_document(&lock_file).unwrap());
    }

    #[test]
    fn test_rejects_non_legacy_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.doc");
        std::fs::write(&path, b"PK\x03\x04 not ole").unwrap();

        let converter = CommandConverter::new(vec!["true".to_string()]).unwrap();
        let err = converter.convert(&path).unwrap_err();
        assert!(matches!(err, DocumentError::NotLegacyDocument(_)));
    }

    #[test]
    fn test_expands_placeholders() {
        let converter = CommandConverter::new(vec![
            "soffice".to_string(),
            "--outdir".to_string(),
            "{outdir}".to_string(),
            "{input}".to_string(),
        ])
        .unwrap();
        let args = converter.expand(Path::new("/in/a.doc"), Path::new("/tmp/x"));
        assert_eq!(args, vec!["soffice", "--outdir", "/tmp/x", "/in/a.doc"]);
        assert!(CommandConverter::new(Vec::new()).is_err());
    }
}
