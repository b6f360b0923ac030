//! Case data providers: one per document template.
//!
//! A provider is bound to one document at a time. `init` binds it, `is_fit`
//! runs the template's rules, and the typed getters read fields once the
//! document is known to fit.

mod template;

pub use template::TemplateProvider;

use std::path::Path;

use crate::Result;
use crate::docx::EmbeddedImage;
use crate::error::{CaseImportError, ImportError, TemplateError};
use crate::models::ResourceItem;
use crate::template::Field;
use crate::validation::{FieldResult, FieldValue};

/// Marker key in the parent-accident markers that flags a reappointment.
pub const REAPPOINTMENT_MARKER: &str = "internal_ref_num";

/// Trait for template-backed document readers.
pub trait CaseDataProvider: Send {
    /// Provider name.
    fn name(&self) -> &str;

    /// Accepted file extensions, lowercase.
    fn file_extensions(&self) -> &[String];

    /// Glob patterns of files to skip.
    fn exclude_patterns(&self) -> &[String];

    /// Record failed rules in `errors()`.
    fn set_store_errors(&mut self, store: bool);

    fn is_store_errors(&self) -> bool;

    /// Bind the provider to a document, dropping everything cached for the
    /// previous one.
    fn init(&mut self, path: &Path);

    /// The bound document.
    fn path(&self) -> Option<&Path>;

    /// Run every rule of the template against the bound document.
    ///
    /// Rule failures and unresolvable paths make the document unfit.
    /// Template defects and unreadable documents are errors.
    fn is_fit(&mut self) -> Result<bool>;

    /// Failures recorded by the last `is_fit` when error storing is on.
    fn errors(&self) -> &[ImportError];

    /// Read one field. The outer result carries fatal errors, the inner one
    /// whether the document has the value.
    fn field(&mut self, field: Field) -> Result<FieldResult>;

    /// Embedded images of the bound document.
    fn images(&mut self) -> Result<Vec<EmbeddedImage>>;

    /// A text field. An absent optional value is empty.
    fn text(&mut self, field: Field) -> Result<String> {
        match self.field(field)?? {
            FieldValue::Text(text) => Ok(text),
            FieldValue::Missing => Ok(String::new()),
            _ => Err(wrong_accessor(self.name(), field, "string")),
        }
    }

    /// A text field the template may leave unmapped.
    fn optional_text(&mut self, field: Field) -> Result<Option<String>> {
        match self.field(field) {
            Err(CaseImportError::Template(TemplateError::UnmappedField { .. })) => Ok(None),
            Err(e) => Err(e),
            Ok(result) => match result? {
                FieldValue::Text(text) if !text.is_empty() => Ok(Some(text)),
                FieldValue::Text(_) | FieldValue::Missing => Ok(None),
                _ => Err(wrong_accessor(self.name(), field, "string")),
            },
        }
    }

    /// A list field. An unmapped or absent value is empty.
    fn items(&mut self, field: Field) -> Result<Vec<ResourceItem>> {
        match self.field(field) {
            Err(CaseImportError::Template(TemplateError::UnmappedField { .. })) => Ok(Vec::new()),
            Err(e) => Err(e),
            Ok(result) => match result? {
                FieldValue::Items(items) => Ok(items),
                FieldValue::Missing => Ok(Vec::new()),
                _ => Err(wrong_accessor(self.name(), field, "array")),
            },
        }
    }

    /// The income price. An unmapped or absent value is `None`.
    fn income_price(&mut self) -> Result<Option<f64>> {
        match self.field(Field::IncomePrice) {
            Err(CaseImportError::Template(TemplateError::UnmappedField { .. })) => Ok(None),
            Err(e) => Err(e),
            Ok(result) => match result? {
                FieldValue::Number(price) => Ok(Some(price)),
                FieldValue::Missing => Ok(None),
                _ => Err(wrong_accessor(self.name(), Field::IncomePrice, "number")),
            },
        }
    }

    /// The doctor's investigation split into sentences, each capitalized
    /// and terminated with a period.
    fn doctor_surveys(&mut self) -> Result<Vec<String>> {
        let investigation = self.text(Field::DoctorInvestigation)?;
        Ok(split_sentences(&investigation))
    }

    /// Whether the markers point at a parent case.
    fn is_reappointment(&mut self) -> Result<bool> {
        let markers = self.items(Field::ParentAccidentMarkers)?;
        Ok(markers.iter().any(|item| item.title == REAPPOINTMENT_MARKER))
    }
}

fn wrong_accessor(template: &str, field: Field, requested: &'static str) -> CaseImportError {
    TemplateError::WrongAccessor {
        template: template.to_string(),
        field,
        requested,
    }
    .into()
}

pub(crate) fn split_sentences(text: &str) -> Vec<String> {
    text.split('.')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            let mut sentence: String = match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            };
            sentence.push('.');
            sentence
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_sentences() {
        assert_eq!(
            split_sentences("blood test. x-ray of the chest.  ecg"),
            vec!["Blood test.", "X-ray of the chest.", "Ecg."]
        );
        assert!(split_sentences(" . ..").is_empty());
        assert_eq!(split_sentences("ómg"), vec!["Ómg."]);
    }
}
