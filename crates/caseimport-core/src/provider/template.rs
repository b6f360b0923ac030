//! Provider driven by a declarative template definition.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, trace};

use super::CaseDataProvider;
use crate::Result;
use crate::docx::{DocumentReader, EmbeddedImage};
use crate::error::{CaseImportError, ImportError, ResolveError, TemplateError};
use crate::models::ResourceItem;
use crate::table::{ExtractedTables, TableExtractor, TableNode, TablePath, flatten_to_string};
use crate::template::{Coercion, Field, FieldKind, FieldSpec, TemplateDefinition};
use crate::validation::{Accessor, FieldResult, FieldValue, RuleSet, parse_price};

#[derive(Debug, Clone, PartialEq)]
enum ProviderState {
    Uninitialized,
    Initialized { path: PathBuf },
    Evaluated { path: PathBuf, fit: bool },
}

/// Everything derived from the bound document.
#[derive(Default)]
struct DocumentCache {
    tables: Option<Arc<ExtractedTables>>,
    plain_text: Option<Arc<str>>,
    images: Option<Vec<EmbeddedImage>>,
    fields: HashMap<Field, FieldResult>,
    errors: Vec<ImportError>,
}

/// Provider for one template.
pub struct TemplateProvider {
    definition: Arc<TemplateDefinition>,
    rules: RuleSet,
    reader: Arc<dyn DocumentReader>,
    extractor: TableExtractor,
    store_errors: bool,
    state: ProviderState,
    cache: DocumentCache,
}

impl TemplateProvider {
    /// Create a provider reading documents with `reader`.
    pub fn new(definition: TemplateDefinition, reader: Arc<dyn DocumentReader>) -> Self {
        Self::from_shared(Arc::new(definition), reader)
    }

    /// Create a provider sharing a loaded definition.
    pub fn from_shared(definition: Arc<TemplateDefinition>, reader: Arc<dyn DocumentReader>) -> Self {
        let rules = definition.effective_rules();
        Self {
            definition,
            rules,
            reader,
            extractor: TableExtractor::default(),
            store_errors: false,
            state: ProviderState::Uninitialized,
            cache: DocumentCache::default(),
        }
    }

    /// Replace the table extractor.
    pub fn with_extractor(mut self, extractor: TableExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn definition(&self) -> &TemplateDefinition {
        &self.definition
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Root table of the bound document, extracted once.
    pub fn tables(&mut self) -> Result<Arc<ExtractedTables>> {
        if let Some(tables) = &self.cache.tables {
            return Ok(Arc::clone(tables));
        }
        let path = self.bound_path()?;
        let tree = self.reader.open(&path)?;
        let tables = Arc::new(self.extractor.extract(&tree));
        trace!(
            "{}: {} root table(s) in {}",
            self.definition.name,
            tables.table_count(),
            path.display()
        );
        self.cache.tables = Some(Arc::clone(&tables));
        Ok(tables)
    }

    /// Plain text of the bound document, read once.
    pub fn plain_text(&mut self) -> Result<Arc<str>> {
        if let Some(text) = &self.cache.plain_text {
            return Ok(Arc::clone(text));
        }
        let path = self.bound_path()?;
        let text: Arc<str> = self.reader.plain_text(&path)?.into();
        self.cache.plain_text = Some(Arc::clone(&text));
        Ok(text)
    }

    fn bound_path(&self) -> Result<PathBuf> {
        self.path()
            .map(Path::to_path_buf)
            .ok_or_else(|| CaseImportError::NotInitialized(self.definition.name.clone()))
    }

    fn template_name(&self) -> String {
        self.definition.name.clone()
    }

    fn load_images(&mut self) -> Result<&[EmbeddedImage]> {
        if self.cache.images.is_none() {
            let path = self.bound_path()?;
            self.cache.images = Some(self.reader.images(&path)?);
        }
        Ok(self.cache.images.as_deref().unwrap_or_default())
    }

    fn evaluate(&mut self) -> Result<bool> {
        let rules = self.rules.clone();
        let mut fit = true;
        self.cache.errors.clear();

        for entry in rules.entries() {
            let value = self.accessor_value(entry.accessor)?;
            for rule in &entry.rules {
                if value.as_ref().is_ok_and(|v| rule.check(v)) {
                    continue;
                }
                fit = false;
                let detail = value
                    .as_ref()
                    .err()
                    .map(ToString::to_string)
                    .unwrap_or_default();
                debug!(
                    "{}: {} !== {} {}",
                    self.definition.name, entry.accessor, rule, detail
                );
                if self.store_errors {
                    self.cache.errors.push(ImportError {
                        source: self.template_name(),
                        cause: format!("{} !== {}", entry.accessor, rule),
                        detail,
                    });
                }
            }
        }
        Ok(fit)
    }

    fn accessor_value(&mut self, accessor: Accessor) -> Result<FieldResult> {
        match accessor {
            Accessor::Field(field) => self.field_value(field),
            Accessor::FileExtensions => {
                Ok(Ok(FieldValue::Strings(self.definition.extensions.clone())))
            }
            Accessor::FileValid => {
                let path = self.bound_path()?;
                let valid = path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| self.definition.accepts_extension(ext));
                Ok(Ok(FieldValue::Bool(valid)))
            }
            Accessor::Images => {
                let names = self.load_images()?.iter().map(|i| i.name.clone()).collect();
                Ok(Ok(FieldValue::Strings(names)))
            }
            Accessor::Checkpoints => self.check_checkpoints(),
            Accessor::TextMarkers => self.check_text_markers(),
        }
    }

    fn check_checkpoints(&mut self) -> Result<FieldResult> {
        let definition = Arc::clone(&self.definition);
        if definition.map.checkpoints.is_empty() {
            return Err(TemplateError::NoCheckpoints {
                template: self.template_name(),
            }
            .into());
        }

        let tables = self.tables()?;
        for checkpoint in &definition.map.checkpoints {
            let node = match tables.resolve(&checkpoint.path) {
                Ok(node) => node,
                Err(e) => return Ok(Err(e)),
            };
            if node.as_text() != Some(checkpoint.value.as_str()) {
                return Ok(Err(ResolveError::Mismatch(format!(
                    "checkpoint {} expects {:?}, found {:?}",
                    checkpoint.path,
                    checkpoint.value,
                    flatten_to_string(node)
                ))));
            }
        }
        Ok(Ok(FieldValue::Bool(true)))
    }

    fn check_text_markers(&mut self) -> Result<FieldResult> {
        let definition = Arc::clone(&self.definition);
        let markers = definition.map.unique_text_markers();
        if markers.is_empty() {
            return Err(TemplateError::NoTextMarkers {
                template: self.template_name(),
            }
            .into());
        }

        let text = self.plain_text()?;
        if let Some(missing) = markers.iter().find(|marker| !text.contains(*marker)) {
            return Ok(Err(ResolveError::Mismatch(format!(
                "text marker {missing:?} has not been found"
            ))));
        }

        let mut offset = 0;
        for marker in &markers {
            match text[offset..].find(marker) {
                Some(pos) => offset += pos + marker.len(),
                None => {
                    return Ok(Err(ResolveError::Mismatch(format!(
                        "text marker {marker:?} is not in the order"
                    ))));
                }
            }
        }
        Ok(Ok(FieldValue::Bool(true)))
    }

    fn field_value(&mut self, field: Field) -> Result<FieldResult> {
        if let Some(cached) = self.cache.fields.get(&field) {
            return Ok(cached.clone());
        }

        let definition = Arc::clone(&self.definition);
        let spec = definition
            .map
            .spec(field)
            .ok_or_else(|| TemplateError::UnmappedField {
                template: self.template_name(),
                field,
            })?;

        let value = match spec {
            FieldSpec::Constant { value } => {
                if field.kind() == FieldKind::Items {
                    return Err(self.wrong_accessor(field, "a constant"));
                }
                finish_text(field, value.clone())
            }
            FieldSpec::Path {
                path,
                coercion,
                optional,
            } => {
                match (field.kind(), coercion) {
                    (FieldKind::Items, Coercion::Rows) => {}
                    (FieldKind::Items, _) => return Err(self.wrong_accessor(field, "a string")),
                    (_, Coercion::Rows) => return Err(self.wrong_accessor(field, "rows")),
                    _ => {}
                }
                let tables = self.tables()?;
                match tables.resolve(path) {
                    Ok(node) => coerce(field, node, *coercion, path),
                    Err(ResolveError::PathNotFound { .. }) if *optional => {
                        Ok(match field.kind() {
                            FieldKind::Items => FieldValue::Items(Vec::new()),
                            _ => FieldValue::Missing,
                        })
                    }
                    Err(e) => Err(e),
                }
            }
        };

        self.cache.fields.insert(field, value.clone());
        Ok(value)
    }

    fn wrong_accessor(&self, field: Field, requested: &'static str) -> CaseImportError {
        TemplateError::WrongAccessor {
            template: self.template_name(),
            field,
            requested,
        }
        .into()
    }
}

fn coerce(field: Field, node: &TableNode, coercion: Coercion, path: &TablePath) -> FieldResult {
    match coercion {
        Coercion::Verbatim => match node.as_text() {
            Some(text) => finish_text(field, text.to_string()),
            None => Err(ResolveError::UnexpectedShape {
                field,
                path: path.clone(),
                expected: "a cell value",
            }),
        },
        Coercion::Flatten => finish_text(field, flatten_to_string(node)),
        Coercion::Rows => {
            let rows = node.as_list().ok_or_else(|| ResolveError::UnexpectedShape {
                field,
                path: path.clone(),
                expected: "a table",
            })?;
            Ok(FieldValue::Items(rows.iter().filter_map(row_to_item).collect()))
        }
    }
}

fn row_to_item(row: &TableNode) -> Option<ResourceItem> {
    let cell = |index: usize| -> String {
        row.as_list()
            .and_then(|cells| cells.get(index))
            .map(|cell| flatten_to_string(cell).trim().to_string())
            .unwrap_or_default()
    };
    let title = match row {
        TableNode::Text(text) => text.trim().to_string(),
        TableNode::List(_) => cell(0),
    };
    if title.is_empty() {
        return None;
    }
    Some(ResourceItem {
        title,
        description: cell(1),
        code: cell(2),
    })
}

fn finish_text(field: Field, text: String) -> FieldResult {
    let text = if field.strips_spaces() {
        text.split_whitespace().collect()
    } else {
        text
    };
    match field.kind() {
        FieldKind::Number => parse_price(&text)
            .map(FieldValue::Number)
            .ok_or(ResolveError::Parse { field, value: text }),
        _ => Ok(FieldValue::Text(text)),
    }
}

impl CaseDataProvider for TemplateProvider {
    fn name(&self) -> &str {
        &self.definition.name
    }

    fn file_extensions(&self) -> &[String] {
        &self.definition.extensions
    }

    fn exclude_patterns(&self) -> &[String] {
        &self.definition.exclude_patterns
    }

    fn set_store_errors(&mut self, store: bool) {
        self.store_errors = store;
    }

    fn is_store_errors(&self) -> bool {
        self.store_errors
    }

    fn init(&mut self, path: &Path) {
        self.state = ProviderState::Initialized {
            path: path.to_path_buf(),
        };
        self.cache = DocumentCache::default();
    }

    fn path(&self) -> Option<&Path> {
        match &self.state {
            ProviderState::Uninitialized => None,
            ProviderState::Initialized { path } | ProviderState::Evaluated { path, .. } => {
                Some(path)
            }
        }
    }

    fn is_fit(&mut self) -> Result<bool> {
        let path = match &self.state {
            ProviderState::Uninitialized => {
                return Err(CaseImportError::NotInitialized(self.template_name()));
            }
            ProviderState::Evaluated { fit, .. } => return Ok(*fit),
            ProviderState::Initialized { path } => path.clone(),
        };

        let fit = self.evaluate()?;
        debug!(
            "{}: {} {}",
            self.definition.name,
            path.display(),
            if fit { "fits" } else { "does not fit" }
        );
        self.state = ProviderState::Evaluated { path, fit };
        Ok(fit)
    }

    fn errors(&self) -> &[ImportError] {
        &self.cache.errors
    }

    fn field(&mut self, field: Field) -> Result<FieldResult> {
        self.bound_path()?;
        self.field_value(field)
    }

    fn images(&mut self) -> Result<Vec<EmbeddedImage>> {
        Ok(self.load_images()?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::MarkupNode;
    use crate::template::TemplateMap;
    use crate::validation::Rule;
    use pretty_assertions::assert_eq;

    /// Serves one fixed tree for any path.
    struct FixedReader {
        tree: MarkupNode,
    }

    impl DocumentReader for FixedReader {
        fn open(&self, _path: &Path) -> crate::docx::Result<MarkupNode> {
            Ok(self.tree.clone())
        }

        fn images(&self, _path: &Path) -> crate::docx::Result<Vec<EmbeddedImage>> {
            Ok(Vec::new())
        }
    }

    fn cell(text: &str) -> MarkupNode {
        MarkupNode::element("w:tc", vec![MarkupNode::text("w:t", text)])
    }

    fn row(cells: &[&str]) -> MarkupNode {
        MarkupNode::element("w:tr", cells.iter().map(|text| cell(text)).collect())
    }

    /// Root table `[[["REF-001"], ["John Doe", <birthday>]]]`.
    fn reader(birthday: &str) -> Arc<dyn DocumentReader> {
        let table = MarkupNode::element("w:tbl", vec![row(&["REF-001"]), row(&["John Doe", birthday])]);
        Arc::new(FixedReader {
            tree: MarkupNode::element("w:body", vec![table]),
        })
    }

    fn definition(rules: RuleSet) -> TemplateDefinition {
        let map = TemplateMap::new()
            .checkpoint([0, 0, 0], "REF-001")
            .field(Field::InternalRefNumber, [0, 0, 0])
            .field(Field::PatientName, [0, 1, 0])
            .field(Field::PatientBirthday, [0, 1, 1]);
        TemplateDefinition::new("clinic", map).with_rules(rules)
    }

    fn name_and_birthday() -> RuleSet {
        RuleSet::new()
            .with(Field::PatientName, [Rule::IsString, Rule::Required])
            .with(Field::PatientBirthday, [Rule::IsDate])
    }

    fn provider(birthday: &str, rules: RuleSet) -> TemplateProvider {
        let mut provider = TemplateProvider::new(definition(rules), reader(birthday));
        provider.set_store_errors(true);
        provider.init(Path::new("case.docx"));
        provider
    }

    #[test]
    fn test_fitting_document() {
        let mut provider = provider("1990-01-01", name_and_birthday());
        assert!(provider.is_fit().unwrap());
        assert!(provider.errors().is_empty());
        assert_eq!(provider.text(Field::PatientName).unwrap(), "John Doe");
        assert_eq!(provider.text(Field::InternalRefNumber).unwrap(), "REF-001");
    }

    #[test]
    fn test_bad_date_records_one_error() {
        let mut provider = provider("not-a-date", name_and_birthday());
        assert!(!provider.is_fit().unwrap());
        assert_eq!(
            provider.errors(),
            &[ImportError {
                source: "clinic".to_string(),
                cause: "patient_birthday !== is_date".to_string(),
                detail: String::new(),
            }]
        );
    }

    #[test]
    fn test_errors_are_not_stored_when_disabled() {
        let mut provider = provider("not-a-date", name_and_birthday());
        provider.set_store_errors(false);
        assert!(!provider.is_fit().unwrap());
        assert!(provider.errors().is_empty());
    }

    #[test]
    fn test_missing_path_is_a_failed_rule() {
        let map = TemplateMap::new().field(Field::PatientName, [5, 5]);
        let rules = RuleSet::new().with(Field::PatientName, [Rule::IsString]);
        let mut provider =
            TemplateProvider::new(TemplateDefinition::new("t", map).with_rules(rules), reader(""));
        provider.set_store_errors(true);
        provider.init(Path::new("case.docx"));

        assert!(!provider.is_fit().unwrap());
        let errors = provider.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].cause, "patient_name !== is_string");
        assert!(errors[0].detail.contains("[5,5]"));
    }

    #[test]
    fn test_rules_do_not_short_circuit() {
        let rules = RuleSet::new()
            .with(Field::PatientName, [Rule::IsArray])
            .with(Field::PatientBirthday, [Rule::IsDate]);
        let mut provider = provider("not-a-date", rules);
        assert!(!provider.is_fit().unwrap());
        assert_eq!(provider.errors().len(), 2);
    }

    #[test]
    fn test_is_fit_is_memoized() {
        let mut provider = provider("not-a-date", name_and_birthday());
        assert!(!provider.is_fit().unwrap());
        assert!(!provider.is_fit().unwrap());
        assert_eq!(provider.errors().len(), 1);
    }

    #[test]
    fn test_failed_evaluation_does_not_accumulate_errors() {
        let rules = RuleSet::new()
            .with(Field::PatientBirthday, [Rule::IsDate])
            .with(Field::DoctorName, [Rule::IsString]);
        let mut provider = provider("not-a-date", rules);

        assert!(provider.is_fit().is_err());
        assert_eq!(provider.errors().len(), 1);
        assert!(provider.is_fit().is_err());
        assert_eq!(provider.errors().len(), 1);
    }

    #[test]
    fn test_fitness_is_repeatable_across_documents() {
        let mut provider = TemplateProvider::new(definition(name_and_birthday()), reader("not-a-date"));
        provider.set_store_errors(true);

        provider.init(Path::new("a.docx"));
        let first = provider.is_fit().unwrap();
        let first_errors = provider.errors().to_vec();
        assert_eq!(provider.is_fit().unwrap(), first);
        assert_eq!(provider.errors(), first_errors.as_slice());

        provider.init(Path::new("b.docx"));
        assert!(!provider.is_fit().unwrap());

        provider.init(Path::new("a.docx"));
        assert_eq!(provider.is_fit().unwrap(), first);
        assert_eq!(provider.errors(), first_errors.as_slice());
        assert!(!first);
        assert_eq!(first_errors.len(), 1);
    }

    #[test]
    fn test_getters_are_pure() {
        let mut provider = provider("1990-01-01", name_and_birthday());
        let first = provider.field(Field::PatientName).unwrap();
        let second = provider.field(Field::PatientName).unwrap();
        assert_eq!(first, second);
        assert!(provider.is_fit().unwrap());
        assert_eq!(provider.field(Field::PatientName).unwrap(), first);
    }

    #[test]
    fn test_unmapped_field_is_a_template_error() {
        let rules = RuleSet::new().with(Field::DoctorName, [Rule::IsString]);
        let mut provider = provider("1990-01-01", rules);
        let err = provider.is_fit().unwrap_err();
        assert!(matches!(
            err,
            CaseImportError::Template(TemplateError::UnmappedField {
                field: Field::DoctorName,
                ..
            })
        ));
    }

    #[test]
    fn test_checkpoint_mismatch_is_unfit() {
        let map = TemplateMap::new().checkpoint([0, 0, 0], "REF-002");
        let rules = RuleSet::new().with(Accessor::Checkpoints, [Rule::IsTrue]);
        let mut provider =
            TemplateProvider::new(TemplateDefinition::new("t", map).with_rules(rules), reader(""));
        provider.set_store_errors(true);
        provider.init(Path::new("case.docx"));

        assert!(!provider.is_fit().unwrap());
        assert!(provider.errors()[0].detail.contains("REF-002"));
    }

    #[test]
    fn test_missing_checkpoints_is_a_template_error() {
        let rules = RuleSet::new().with(Accessor::Checkpoints, [Rule::IsTrue]);
        let mut provider = TemplateProvider::new(
            TemplateDefinition::new("t", TemplateMap::new()).with_rules(rules),
            reader(""),
        );
        provider.init(Path::new("case.docx"));
        assert!(matches!(
            provider.is_fit(),
            Err(CaseImportError::Template(TemplateError::NoCheckpoints { .. }))
        ));
    }

    #[test]
    fn test_text_markers_in_order() {
        let rules = RuleSet::new().with(Accessor::TextMarkers, [Rule::IsTrue]);
        let check = |markers: &[&str]| {
            let map = markers
                .iter()
                .fold(TemplateMap::new(), |map, marker| map.text_marker(*marker));
            let mut provider = TemplateProvider::new(
                TemplateDefinition::new("t", map).with_rules(rules.clone()),
                reader("1990-01-01"),
            );
            provider.init(Path::new("case.docx"));
            provider.is_fit().unwrap()
        };
        assert!(check(&["REF-001", "John Doe"]));
        assert!(!check(&["John Doe", "REF-001"]));
        assert!(!check(&["Jane Roe"]));
    }

    #[test]
    fn test_file_extension_check() {
        let rules = RuleSet::new().with(Accessor::FileValid, [Rule::IsTrue]);
        let mut provider = provider("1990-01-01", rules);
        assert!(provider.is_fit().unwrap());

        provider.init(Path::new("case.pdf"));
        assert!(!provider.is_fit().unwrap());
    }

    #[test]
    fn test_query_before_init_fails() {
        let mut provider = TemplateProvider::new(definition(RuleSet::new()), reader(""));
        assert!(matches!(
            provider.is_fit(),
            Err(CaseImportError::NotInitialized(_))
        ));
        assert!(provider.text(Field::PatientName).is_err());
    }

    #[test]
    fn test_reference_numbers_lose_spaces() {
        let map = TemplateMap::new().constant(Field::ExternalRefNumber, " AB 12 34 ");
        let mut provider =
            TemplateProvider::new(TemplateDefinition::new("t", map), reader(""));
        provider.init(Path::new("case.docx"));
        assert_eq!(provider.text(Field::ExternalRefNumber).unwrap(), "AB1234");
    }
}
