//! Logical case fields a template can map.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How a field's value is shaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// A single string.
    Text,
    /// A list of `{title, description, code}` rows.
    Items,
    /// A decimal amount.
    Number,
}

/// A logical field of an imported case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    InternalRefNumber,
    ExternalRefNumber,
    AssistantTitle,
    AssistantAddress,
    PatientContacts,
    PatientName,
    PatientBirthday,
    PatientSymptoms,
    VisitDate,
    VisitTime,
    VisitCountry,
    VisitRegion,
    VisitCity,
    DoctorName,
    DoctorGender,
    DoctorMedicalBoardingNum,
    DoctorInvestigation,
    DoctorRecommendation,
    DoctorDiagnostics,
    DoctorServices,
    IncomePrice,
    Currency,
    CaseCreationDate,
    AccidentType,
    CaseableType,
    ParentAccidentMarkers,
    HospitalTitle,
    CityTitle,
}

impl Field {
    /// Every field, in declaration order.
    pub const ALL: [Field; 28] = [
        Field::InternalRefNumber,
        Field::ExternalRefNumber,
        Field::AssistantTitle,
        Field::AssistantAddress,
        Field::PatientContacts,
        Field::PatientName,
        Field::PatientBirthday,
        Field::PatientSymptoms,
        Field::VisitDate,
        Field::VisitTime,
        Field::VisitCountry,
        Field::VisitRegion,
        Field::VisitCity,
        Field::DoctorName,
        Field::DoctorGender,
        Field::DoctorMedicalBoardingNum,
        Field::DoctorInvestigation,
        Field::DoctorRecommendation,
        Field::DoctorDiagnostics,
        Field::DoctorServices,
        Field::IncomePrice,
        Field::Currency,
        Field::CaseCreationDate,
        Field::AccidentType,
        Field::CaseableType,
        Field::ParentAccidentMarkers,
        Field::HospitalTitle,
        Field::CityTitle,
    ];

    /// Name used in template files and diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Field::InternalRefNumber => "internal_ref_number",
            Field::ExternalRefNumber => "external_ref_number",
            Field::AssistantTitle => "assistant_title",
            Field::AssistantAddress => "assistant_address",
            Field::PatientContacts => "patient_contacts",
            Field::PatientName => "patient_name",
            Field::PatientBirthday => "patient_birthday",
            Field::PatientSymptoms => "patient_symptoms",
            Field::VisitDate => "visit_date",
            Field::VisitTime => "visit_time",
            Field::VisitCountry => "visit_country",
            Field::VisitRegion => "visit_region",
            Field::VisitCity => "visit_city",
            Field::DoctorName => "doctor_name",
            Field::DoctorGender => "doctor_gender",
            Field::DoctorMedicalBoardingNum => "doctor_medical_boarding_num",
            Field::DoctorInvestigation => "doctor_investigation",
            Field::DoctorRecommendation => "doctor_recommendation",
            Field::DoctorDiagnostics => "doctor_diagnostics",
            Field::DoctorServices => "doctor_services",
            Field::IncomePrice => "income_price",
            Field::Currency => "currency",
            Field::CaseCreationDate => "case_creation_date",
            Field::AccidentType => "accident_type",
            Field::CaseableType => "caseable_type",
            Field::ParentAccidentMarkers => "parent_accident_markers",
            Field::HospitalTitle => "hospital_title",
            Field::CityTitle => "city_title",
        }
    }

    /// Shape of the field's value.
    pub fn kind(&self) -> FieldKind {
        match self {
            Field::DoctorDiagnostics | Field::DoctorServices | Field::ParentAccidentMarkers => {
                FieldKind::Items
            }
            Field::IncomePrice => FieldKind::Number,
            _ => FieldKind::Text,
        }
    }

    /// Reference numbers are stored without spaces.
    pub(crate) fn strips_spaces(&self) -> bool {
        matches!(self, Field::InternalRefNumber | Field::ExternalRefNumber)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Field::ALL
            .iter()
            .copied()
            .find(|field| field.name() == s)
            .ok_or_else(|| format!("unknown field {s:?}"))
    }
}
