//! Provider selection: find the template a document was written with.

mod importer;
mod statistics;

pub use importer::{
    CaseGenerator, CaseImporter, DryCaseGenerator, ImportLog, ImportLogEntry, ImportStatus,
    ImportedCase, MemoryImportLog,
};
pub use statistics::{Overlap, ProviderCount, ProviderStatistics};

use std::path::Path;

use tracing::debug;

use crate::Result;
use crate::provider::CaseDataProvider;

/// Index of the first provider, in registry order, that fits `path`.
///
/// Providers after the first fit are not evaluated.
pub fn select_fitting(
    path: &Path,
    providers: &mut [Box<dyn CaseDataProvider>],
) -> Result<Option<usize>> {
    for (index, provider) in providers.iter_mut().enumerate() {
        provider.init(path);
        if provider.is_fit()? {
            debug!("{} fits {}", provider.name(), path.display());
            return Ok(Some(index));
        }
    }
    Ok(None)
}

/// Indices of every provider that fits `path`.
pub fn all_fitting(
    path: &Path,
    providers: &mut [Box<dyn CaseDataProvider>],
) -> Result<Vec<usize>> {
    let mut fitted = Vec::new();
    for (index, provider) in providers.iter_mut().enumerate() {
        provider.init(path);
        if provider.is_fit()? {
            fitted.push(index);
        }
    }
    Ok(fitted)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::docx::EmbeddedImage;
    use crate::error::ImportError;
    use crate::template::Field;
    use crate::validation::{FieldResult, FieldValue};
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Provider fitting the files whose stem is one of `accepts`.
    pub(crate) struct StubProvider {
        pub name: String,
        pub accepts: Vec<String>,
        pub evaluations: Arc<AtomicUsize>,
        pub extensions: Vec<String>,
        path: Option<PathBuf>,
        store_errors: bool,
        errors: Vec<ImportError>,
    }

    impl StubProvider {
        pub(crate) fn new(name: &str, accepts: &[&str]) -> Self {
            Self {
                name: name.to_string(),
                accepts: accepts.iter().map(ToString::to_string).collect(),
                evaluations: Arc::new(AtomicUsize::new(0)),
                extensions: vec!["docx".to_string()],
                path: None,
                store_errors: false,
                errors: Vec::new(),
            }
        }

        pub(crate) fn boxed(name: &str, accepts: &[&str]) -> Box<dyn CaseDataProvider> {
            Box::new(Self::new(name, accepts))
        }
    }

    impl CaseDataProvider for StubProvider {
        fn name(&self) -> &str {
            &self.name
        }

        fn file_extensions(&self) -> &[String] {
            &self.extensions
        }

        fn exclude_patterns(&self) -> &[String] {
            &[]
        }

        fn set_store_errors(&mut self, store: bool) {
            self.store_errors = store;
        }

        fn is_store_errors(&self) -> bool {
            self.store_errors
        }

        fn init(&mut self, path: &Path) {
            self.path = Some(path.to_path_buf());
            self.errors.clear();
        }

        fn path(&self) -> Option<&Path> {
            self.path.as_deref()
        }

        fn is_fit(&mut self) -> Result<bool> {
            self.evaluations.fetch_add(1, Ordering::SeqCst);
            let stem = self
                .path
                .as_deref()
                .and_then(Path::file_stem)
                .and_then(|s| s.to_str())
                .unwrap_or_default();
            let fit = self.accepts.iter().any(|a| a == stem);
            if !fit && self.store_errors {
                self.errors.push(ImportError {
                    source: self.name.clone(),
                    cause: "checkpoints !== is_true".to_string(),
                    detail: String::new(),
                });
            }
            Ok(fit)
        }

        fn errors(&self) -> &[ImportError] {
            &self.errors
        }

        fn field(&mut self, field: Field) -> Result<FieldResult> {
            let value = match field {
                Field::InternalRefNumber => format!("{}-REF", self.name),
                _ => String::new(),
            };
            Ok(Ok(FieldValue::Text(value)))
        }

        fn images(&mut self) -> Result<Vec<EmbeddedImage>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_first_fit_wins_and_short_circuits() {
        let third = StubProvider::new("c", &["case"]);
        let third_evaluations = Arc::clone(&third.evaluations);
        let mut providers: Vec<Box<dyn CaseDataProvider>> = vec![
            StubProvider::boxed("a", &["other"]),
            StubProvider::boxed("b", &["case"]),
            Box::new(third),
        ];

        let selected = select_fitting(Path::new("case.docx"), &mut providers).unwrap();
        assert_eq!(selected, Some(1));
        assert_eq!(third_evaluations.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_selection_follows_registry_order() {
        let mut providers: Vec<Box<dyn CaseDataProvider>> = vec![
            StubProvider::boxed("a", &["case"]),
            StubProvider::boxed("b", &["case"]),
        ];
        assert_eq!(
            select_fitting(Path::new("case.docx"), &mut providers).unwrap(),
            Some(0)
        );

        providers.reverse();
        let selected = select_fitting(Path::new("case.docx"), &mut providers).unwrap();
        assert_eq!(providers[selected.unwrap()].name(), "b");
    }

    #[test]
    fn test_no_fit() {
        let mut providers: Vec<Box<dyn CaseDataProvider>> =
            vec![StubProvider::boxed("a", &["other"]), StubProvider::boxed("b", &["letter"])];
        assert_eq!(select_fitting(Path::new("case.docx"), &mut providers).unwrap(), None);
        assert!(all_fitting(Path::new("case.docx"), &mut providers).unwrap().is_empty());
    }

    #[test]
    fn test_all_fitting_evaluates_everything() {
        let mut providers: Vec<Box<dyn CaseDataProvider>> = vec![
            StubProvider::boxed("a", &["case"]),
            StubProvider::boxed("b", &["nope"]),
            StubProvider::boxed("c", &["case"]),
        ];
        assert_eq!(
            all_fitting(Path::new("case.docx"), &mut providers).unwrap(),
            vec![0, 2]
        );
    }
}
