//! Template definitions loaded from JSON files.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::TemplateMap;
use crate::error::TemplateError;
use crate::validation::{Accessor, RuleSet};

/// Everything that describes one provider: identity, accepted files,
/// field map and validation rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateDefinition {
    /// Provider name, used in diagnostics and statistics.
    pub name: String,

    /// Accepted file extensions, lowercase, without the dot.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Glob patterns of files the provider never reads.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_patterns: Vec<String>,

    #[serde(flatten)]
    pub map: TemplateMap,

    /// Full rule set. The standard rules apply when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<RuleSet>,

    /// Added or replaced rules.
    #[serde(default, skip_serializing_if = "RuleSet::is_empty")]
    pub extra_rules: RuleSet,

    /// Accessors whose rules are dropped.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skip_rules: Vec<Accessor>,
}

fn default_extensions() -> Vec<String> {
    vec!["docx".to_string()]
}

impl TemplateDefinition {
    pub fn new(name: impl Into<String>, map: TemplateMap) -> Self {
        Self {
            name: name.into(),
            extensions: default_extensions(),
            exclude_patterns: Vec::new(),
            map,
            rules: None,
            extra_rules: RuleSet::new(),
            skip_rules: Vec::new(),
        }
    }

    pub fn with_rules(mut self, rules: RuleSet) -> Self {
        self.rules = Some(rules);
        self
    }

    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|ext| ext.into().to_lowercase())
            .collect();
        self
    }

    /// Rules after applying overrides and skips.
    pub fn effective_rules(&self) -> RuleSet {
        let base = self.rules.clone().unwrap_or_else(RuleSet::standard);
        self.skip_rules
            .iter()
            .fold(base.merge(&self.extra_rules), |set, accessor| {
                set.without(*accessor)
            })
    }

    /// Problems that every document would hit: rules on unmapped fields,
    /// checkpoint or text-marker rules without anything to check.
    pub fn problems(&self) -> Vec<TemplateError> {
        let mut problems = Vec::new();
        for entry in self.effective_rules().entries() {
            match entry.accessor {
                Accessor::Field(field) if self.map.spec(field).is_none() => {
                    problems.push(TemplateError::UnmappedField {
                        template: self.name.clone(),
                        field,
                    });
                }
                Accessor::Checkpoints if self.map.checkpoints.is_empty() => {
                    problems.push(TemplateError::NoCheckpoints {
                        template: self.name.clone(),
                    });
                }
                Accessor::TextMarkers if self.map.text_markers.is_empty() => {
                    problems.push(TemplateError::NoTextMarkers {
                        template: self.name.clone(),
                    });
                }
                _ => {}
            }
        }
        problems
    }

    /// Whether `extension` is accepted, ignoring case.
    pub fn accepts_extension(&self, extension: &str) -> bool {
        self.extensions
            .iter()
            .any(|ext| ext.eq_ignore_ascii_case(extension))
    }

    /// Parse a definition from JSON text.
    pub fn from_json(source_name: &str, json: &str) -> Result<Self, TemplateError> {
        serde_json::from_str(json).map_err(|e| TemplateError::Invalid {
            source_name: source_name.to_string(),
            reason: e.to_string(),
        })
    }

    /// Load a definition from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, TemplateError> {
        let source_name = path.display().to_string();
        let content = std::fs::read_to_string(path).map_err(|e| TemplateError::Invalid {
            source_name: source_name.clone(),
            reason: e.to_string(),
        })?;
        Self::from_json(&source_name, &content)
    }

    /// Load every `*.json` definition of a directory, ordered by file name.
    ///
    /// The order is the registry order used by provider selection.
    pub fn load_dir(dir: &Path) -> Result<Vec<Self>, TemplateError> {
        let entries = std::fs::read_dir(dir).map_err(|e| TemplateError::Invalid {
            source_name: dir.display().to_string(),
            reason: e.to_string(),
        })?;

        let mut paths: Vec<_> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
            })
            .collect();
        paths.sort();

        let mut definitions = Vec::with_capacity(paths.len());
        for path in paths {
            let definition = Self::from_file(&path)?;
            if definitions
                .iter()
                .any(|d: &TemplateDefinition| d.name == definition.name)
            {
                warn!(
                    "Template name {:?} in {} is used more than once",
                    definition.name,
                    path.display()
                );
            }
            debug!("Loaded template {:?} from {}", definition.name, path.display());
            definitions.push(definition);
        }
        Ok(definitions)
    }
}
