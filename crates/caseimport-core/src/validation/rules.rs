//! Rules, accessors and rule sets.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::FieldValue;
use super::dates;
use crate::template::Field;

/// A single predicate over an accessor's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    IsArray,
    IsBoolean,
    IsString,
    /// Present. An empty string still passes.
    Required,
    IsTrue,
    /// A string the lenient date parser accepts.
    IsDate,
}

impl Rule {
    /// Evaluate against a successfully produced value.
    pub fn check(&self, value: &FieldValue) -> bool {
        match self {
            Rule::IsArray => matches!(value, FieldValue::Items(_) | FieldValue::Strings(_)),
            Rule::IsBoolean => matches!(value, FieldValue::Bool(_)),
            Rule::IsString => matches!(value, FieldValue::Text(_)),
            Rule::Required => !matches!(value, FieldValue::Missing),
            Rule::IsTrue => matches!(value, FieldValue::Bool(true)),
            Rule::IsDate => match value {
                FieldValue::Text(text) => dates::is_date(text),
                _ => false,
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Rule::IsArray => "is_array",
            Rule::IsBoolean => "is_boolean",
            Rule::IsString => "is_string",
            Rule::Required => "required",
            Rule::IsTrue => "is_true",
            Rule::IsDate => "is_date",
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a rule is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Accessor {
    /// A mapped template field.
    Field(Field),
    /// Extensions the provider accepts.
    FileExtensions,
    /// Whether the file's extension is accepted.
    FileValid,
    /// Names of the embedded images.
    Images,
    /// All template checkpoints hold.
    Checkpoints,
    /// All text markers appear in order.
    TextMarkers,
}

impl Accessor {
    pub fn name(&self) -> &'static str {
        match self {
            Accessor::Field(field) => field.name(),
            Accessor::FileExtensions => "file_extensions",
            Accessor::FileValid => "file_valid",
            Accessor::Images => "images",
            Accessor::Checkpoints => "checkpoints",
            Accessor::TextMarkers => "text_markers",
        }
    }
}

impl fmt::Display for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Accessor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file_extensions" => Ok(Accessor::FileExtensions),
            "file_valid" => Ok(Accessor::FileValid),
            "images" => Ok(Accessor::Images),
            "checkpoints" => Ok(Accessor::Checkpoints),
            "text_markers" => Ok(Accessor::TextMarkers),
            other => other
                .parse::<Field>()
                .map(Accessor::Field)
                .map_err(|_| format!("unknown accessor {other:?}")),
        }
    }
}

impl TryFrom<String> for Accessor {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Accessor> for String {
    fn from(accessor: Accessor) -> Self {
        accessor.name().to_string()
    }
}

impl From<Field> for Accessor {
    fn from(field: Field) -> Self {
        Accessor::Field(field)
    }
}

/// Rules bound to one accessor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleEntry {
    pub accessor: Accessor,
    pub rules: Vec<Rule>,
}

/// Ordered accessor → rules table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleSet(Vec<RuleEntry>);

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rules every case form must satisfy.
    pub fn standard() -> Self {
        use Field::*;
        use Rule::*;

        Self::new()
            .with(Accessor::FileExtensions, [IsArray, Required])
            .with(Accessor::FileValid, [IsTrue])
            .with(InternalRefNumber, [IsString, Required])
            .with(ExternalRefNumber, [IsString, Required])
            .with(AssistantTitle, [IsString, Required])
            .with(PatientContacts, [IsString])
            .with(PatientName, [IsString, Required])
            .with(PatientBirthday, [IsString, IsDate])
            .with(ParentAccidentMarkers, [IsArray])
            .with(VisitTime, [IsString, IsDate])
            .with(VisitDate, [IsString, Required, IsDate])
            .with(VisitCountry, [IsString])
            .with(VisitRegion, [IsString])
            .with(VisitCity, [IsString])
            .with(PatientSymptoms, [IsString, Required])
            .with(DoctorInvestigation, [IsString, Required])
            .with(DoctorRecommendation, [IsString, Required])
            .with(DoctorDiagnostics, [IsArray])
            .with(DoctorName, [IsString, Required])
            .with(DoctorMedicalBoardingNum, [IsString])
            .with(DoctorGender, [IsString, Required])
            .with(Accessor::Images, [IsArray])
            .with(CaseableType, [IsString, Required])
            .with(Accessor::Checkpoints, [IsTrue])
    }

    /// Add or replace the rules of an accessor, keeping its position.
    pub fn with(
        mut self,
        accessor: impl Into<Accessor>,
        rules: impl IntoIterator<Item = Rule>,
    ) -> Self {
        let accessor = accessor.into();
        let rules: Vec<Rule> = rules.into_iter().collect();
        match self.0.iter_mut().find(|entry| entry.accessor == accessor) {
            Some(entry) => entry.rules = rules,
            None => self.0.push(RuleEntry { accessor, rules }),
        }
        self
    }

    /// Drop an accessor.
    pub fn without(mut self, accessor: impl Into<Accessor>) -> Self {
        let accessor = accessor.into();
        self.0.retain(|entry| entry.accessor != accessor);
        self
    }

    /// Apply every entry of `other` as an override.
    pub fn merge(self, other: &RuleSet) -> Self {
        other
            .entries()
            .iter()
            .fold(self, |set, entry| set.with(entry.accessor, entry.rules.iter().copied()))
    }

    pub fn entries(&self) -> &[RuleEntry] {
        &self.0
    }

    pub fn rules_for(&self, accessor: impl Into<Accessor>) -> Option<&[Rule]> {
        let accessor = accessor.into();
        self.0
            .iter()
            .find(|entry| entry.accessor == accessor)
            .map(|entry| entry.rules.as_slice())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
