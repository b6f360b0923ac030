//! Coverage statistics of a provider registry over a set of files.

use std::path::{Path, PathBuf};

use serde::Serialize;

use super::all_fitting;
use crate::Result;
use crate::provider::CaseDataProvider;

/// Files a provider was the first fit for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderCount {
    pub name: String,
    pub fitted: usize,
}

/// A file that more than one provider fits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Overlap {
    pub path: PathBuf,
    pub providers: Vec<String>,
}

/// Per-provider first-fit counts, unmatched files and overlaps.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProviderStatistics {
    pub providers: Vec<ProviderCount>,
    pub total_files: usize,
    pub unmatched: Vec<PathBuf>,
    pub overlaps: Vec<Overlap>,
    /// Files that could not be evaluated, with the reason.
    pub failures: Vec<(PathBuf, String)>,
}

impl ProviderStatistics {
    /// Statistics for providers with these names, in registry order.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            providers: names
                .into_iter()
                .map(|name| ProviderCount {
                    name: name.into(),
                    fitted: 0,
                })
                .collect(),
            ..Self::default()
        }
    }

    /// Statistics for a registry.
    pub fn for_providers(providers: &[Box<dyn CaseDataProvider>]) -> Self {
        Self::new(providers.iter().map(|p| p.name().to_string()))
    }

    /// Evaluate every provider against `path` and record the outcome.
    pub fn evaluate(
        &mut self,
        path: &Path,
        providers: &mut [Box<dyn CaseDataProvider>],
    ) -> Result<Vec<usize>> {
        let fitted = all_fitting(path, providers)?;
        self.record(path, &fitted);
        Ok(fitted)
    }

    /// Record the indices of the providers that fit `path`.
    pub fn record(&mut self, path: &Path, fitted: &[usize]) {
        self.total_files += 1;

        let Some(&first) = fitted.first() else {
            self.unmatched.push(path.to_path_buf());
            return;
        };
        if let Some(count) = self.providers.get_mut(first) {
            count.fitted += 1;
        }
        if fitted.len() > 1 {
            self.overlaps.push(Overlap {
                path: path.to_path_buf(),
                providers: fitted
                    .iter()
                    .filter_map(|&index| self.providers.get(index))
                    .map(|count| count.name.clone())
                    .collect(),
            });
        }
    }

    /// Record a file that failed to evaluate.
    pub fn record_failure(&mut self, path: &Path, reason: impl ToString) {
        self.total_files += 1;
        self.failures.push((path.to_path_buf(), reason.to_string()));
    }

    /// Files with at least one fitting provider.
    pub fn importable(&self) -> usize {
        self.providers.iter().map(|count| count.fitted).sum()
    }

    /// Share of importable files, in percent.
    pub fn percent(&self) -> f64 {
        if self.total_files == 0 {
            return 0.0;
        }
        (self.importable() as f64 * 100.0) / self.total_files as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::tests::StubProvider;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_counts_first_fit_only() {
        let mut providers: Vec<Box<dyn CaseDataProvider>> = vec![
            StubProvider::boxed("a", &["alpha", "both"]),
            StubProvider::boxed("b", &["beta", "both"]),
        ];
        let mut stats = ProviderStatistics::for_providers(&providers);

        for file in ["alpha.docx", "beta.docx", "both.docx", "none.docx"] {
            stats.evaluate(Path::new(file), &mut providers).unwrap();
        }
        stats.record_failure(Path::new("broken.docx"), "corrupt document");

        assert_eq!(
            stats.providers,
            vec![
                ProviderCount { name: "a".to_string(), fitted: 2 },
                ProviderCount { name: "b".to_string(), fitted: 1 },
            ]
        );
        assert_eq!(stats.total_files, 5);
        assert_eq!(stats.importable(), 3);
        assert_eq!(stats.unmatched, vec![PathBuf::from("none.docx")]);
        assert_eq!(
            stats.overlaps,
            vec![Overlap {
                path: PathBuf::from("both.docx"),
                providers: vec!["a".to_string(), "b".to_string()],
            }]
        );
        assert!((stats.percent() - 60.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_statistics() {
        let stats = ProviderStatistics::new(["a"]);
        assert_eq!(stats.percent(), 0.0);
        assert_eq!(stats.importable(), 0);
    }
}
