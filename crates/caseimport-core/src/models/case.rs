//! Case data collected from a fitting document.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::error::CaseImportError;
use crate::provider::CaseDataProvider;
use crate::template::Field;
use crate::validation::parse_date;

/// One row of a diagnostics, services or markers table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceItem {
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub code: String,
}

impl ResourceItem {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// A complete imported case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseRecord {
    /// Internal reference number, without spaces.
    pub internal_ref_number: String,

    /// Reference number of the assistance company, without spaces.
    pub external_ref_number: String,

    pub assistant: Assistant,
    pub patient: Patient,
    pub visit: Visit,
    pub doctor: Doctor,

    /// Price charged for the case.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub income_price: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub case_creation_date: Option<NaiveDate>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub accident_type: Option<String>,

    /// Kind of the case, e.g. `doctor` or `hospital`.
    pub caseable_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub hospital_title: Option<String>,

    /// Markers identifying a parent case.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parent_markers: BTreeMap<String, String>,

    /// The case continues an earlier one.
    pub reappointment: bool,

    /// Names of the embedded images.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,

    pub metadata: ImportMetadata,
}

/// Assistance company that sent the case.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Assistant {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Patient {
    pub name: String,
    /// Raw birthday text as written in the form.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birthday_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birthday: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contacts: Option<String>,
    pub symptoms: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Visit {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Doctor {
    pub name: String,
    pub gender: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medical_boarding_num: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    pub investigation: String,
    /// Investigation split into sentences.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub surveys: Vec<String>,
    pub recommendation: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<ResourceItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<ResourceItem>,
}

/// Where and how the record was produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportMetadata {
    /// Provider that accepted the document.
    pub provider: String,
    pub source_file: PathBuf,
    pub imported_at: DateTime<Utc>,
}

impl CaseRecord {
    /// Read every field from a provider whose document fits.
    pub fn collect(provider: &mut dyn CaseDataProvider) -> Result<Self> {
        let source_file = provider
            .path()
            .map(PathBuf::from)
            .ok_or_else(|| CaseImportError::NotInitialized(provider.name().to_string()))?;

        let birthday_text = provider.optional_text(Field::PatientBirthday)?;
        let visit_date = provider.text(Field::VisitDate)?;
        let parent_markers: BTreeMap<String, String> = provider
            .items(Field::ParentAccidentMarkers)?
            .into_iter()
            .map(|item| (item.title, item.description))
            .collect();

        Ok(Self {
            internal_ref_number: provider.text(Field::InternalRefNumber)?,
            external_ref_number: provider.text(Field::ExternalRefNumber)?,
            assistant: Assistant {
                title: provider.text(Field::AssistantTitle)?,
                address: provider.optional_text(Field::AssistantAddress)?,
            },
            patient: Patient {
                name: provider.text(Field::PatientName)?,
                birthday: birthday_text.as_deref().and_then(parse_date),
                birthday_text,
                contacts: provider.optional_text(Field::PatientContacts)?,
                symptoms: provider.text(Field::PatientSymptoms)?,
            },
            visit: Visit {
                date: parse_date(&visit_date),
                time: provider.optional_text(Field::VisitTime)?,
                country: provider.optional_text(Field::VisitCountry)?,
                region: provider.optional_text(Field::VisitRegion)?,
                city: provider.optional_text(Field::VisitCity)?,
            },
            doctor: Doctor {
                name: provider.text(Field::DoctorName)?,
                gender: provider.text(Field::DoctorGender)?,
                medical_boarding_num: provider.optional_text(Field::DoctorMedicalBoardingNum)?,
                city: provider.optional_text(Field::CityTitle)?,
                investigation: provider.text(Field::DoctorInvestigation)?,
                surveys: provider.doctor_surveys()?,
                recommendation: provider.text(Field::DoctorRecommendation)?,
                diagnostics: provider.items(Field::DoctorDiagnostics)?,
                services: provider.items(Field::DoctorServices)?,
            },
            income_price: provider.income_price()?,
            currency: provider.optional_text(Field::Currency)?,
            case_creation_date: provider
                .optional_text(Field::CaseCreationDate)?
                .as_deref()
                .and_then(parse_date),
            accident_type: provider.optional_text(Field::AccidentType)?,
            caseable_type: provider.text(Field::CaseableType)?,
            hospital_title: provider.optional_text(Field::HospitalTitle)?,
            reappointment: provider.is_reappointment()?,
            parent_markers,
            images: provider.images()?.into_iter().map(|image| image.name).collect(),
            metadata: ImportMetadata {
                provider: provider.name().to_string(),
                source_file,
                imported_at: Utc::now(),
            },
        })
    }
}
