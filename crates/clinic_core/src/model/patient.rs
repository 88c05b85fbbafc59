//! Patient domain model.
//!
//! # Responsibility
//! - Define the canonical patient record: identity, demographics, medical
//!   history lists and the hygiene sub-record.
//! - Map field-table targets onto typed struct fields.
//!
//! # Invariants
//! - `identity_number` is stored normalized and is unique across patients.
//! - `first_name` is never blank.
//! - Body measurements are never negative.
//! - An absent hygiene record reads as [`DEFAULT_HYGIENE`].

use crate::model::field::{FieldError, FieldValue, PatientField};
use crate::model::ValidationError;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable patient identifier.
pub type PatientId = Uuid;

static IDENTITY_NOISE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\s.]+").expect("valid identity noise regex"));

/// Oral-hygiene habits recorded on the patient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct HygieneRecord {
    #[serde(default)]
    pub brushing_per_day: u32,
    #[serde(default)]
    pub uses_floss: bool,
    #[serde(default)]
    pub uses_mouthwash: bool,
    #[serde(default)]
    pub notes: String,
}

/// Hygiene record used wherever a patient has none on file.
pub const DEFAULT_HYGIENE: HygieneRecord = HygieneRecord {
    brushing_per_day: 0,
    uses_floss: false,
    uses_mouthwash: false,
    notes: String::new(),
};

impl HygieneRecord {
    pub fn to_field_value(&self) -> FieldValue {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => FieldValue::Object(map),
            _ => FieldValue::Null,
        }
    }
}

/// Intake data for a patient not yet on file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NewPatient {
    #[serde(rename = "rut")]
    pub identity_number: String,
    #[serde(rename = "nombre")]
    pub first_name: String,
    #[serde(rename = "apellidos", default)]
    pub last_name: String,
    #[serde(rename = "fechaNacimiento", default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(rename = "sexo", default)]
    pub sex: Option<String>,
    #[serde(rename = "telefono", default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(rename = "direccion", default)]
    pub address: Option<String>,
    #[serde(rename = "prevision", default)]
    pub health_plan: Option<String>,
}

/// Canonical patient record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Patient {
    pub id: PatientId,
    /// Normalized identity number (see [`normalize_identity_number`]).
    pub identity_number: String,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: Option<NaiveDate>,
    pub sex: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub health_plan: Option<String>,
    pub occupation: Option<String>,
    pub allergies: Vec<String>,
    pub medications: Vec<String>,
    pub conditions: Vec<String>,
    pub surgeries: Vec<String>,
    pub family_history: Vec<String>,
    pub weight_kg: Option<f64>,
    pub height_cm: Option<f64>,
    pub hygiene: Option<HygieneRecord>,
    /// Optimistic concurrency revision, bumped by every stored update.
    pub version: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Patient {
    /// Builds a first-version patient from intake data.
    ///
    /// The identity number is normalized here; callers look patients up by
    /// the same normalized key.
    pub fn from_new(new: NewPatient, now_ms: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            identity_number: normalize_identity_number(&new.identity_number),
            first_name: new.first_name.trim().to_string(),
            last_name: new.last_name.trim().to_string(),
            birth_date: new.birth_date,
            sex: non_blank(new.sex),
            phone: non_blank(new.phone),
            email: non_blank(new.email),
            address: non_blank(new.address),
            health_plan: non_blank(new.health_plan),
            occupation: None,
            allergies: Vec::new(),
            medications: Vec::new(),
            conditions: Vec::new(),
            surgeries: Vec::new(),
            family_history: Vec::new(),
            weight_kg: None,
            height_cm: None,
            hygiene: None,
            version: 1,
            created_at: now_ms,
            updated_at: now_ms,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.identity_number.is_empty() {
            return Err(ValidationError::EmptyIdentityNumber);
        }
        if self.first_name.trim().is_empty() {
            return Err(ValidationError::EmptyFirstName);
        }
        if self.weight_kg.is_some_and(|value| value < 0.0) {
            return Err(ValidationError::NegativeMeasurement("peso"));
        }
        if self.height_cm.is_some_and(|value| value < 0.0) {
            return Err(ValidationError::NegativeMeasurement("talla"));
        }
        Ok(())
    }

    /// Hygiene record on file, or the named default.
    pub fn hygiene_or_default(&self) -> HygieneRecord {
        self.hygiene.clone().unwrap_or(DEFAULT_HYGIENE)
    }

    /// Reads one field as a tagged value.
    pub fn field(&self, field: PatientField) -> FieldValue {
        match field {
            PatientField::FirstName => FieldValue::Text(self.first_name.clone()),
            PatientField::LastName => FieldValue::Text(self.last_name.clone()),
            PatientField::BirthDate => optional_text(
                self.birth_date
                    .map(|date| date.format("%Y-%m-%d").to_string()),
            ),
            PatientField::Sex => optional_text(self.sex.clone()),
            PatientField::Phone => optional_text(self.phone.clone()),
            PatientField::Email => optional_text(self.email.clone()),
            PatientField::Address => optional_text(self.address.clone()),
            PatientField::HealthPlan => optional_text(self.health_plan.clone()),
            PatientField::Occupation => optional_text(self.occupation.clone()),
            PatientField::Allergies => FieldValue::TextList(self.allergies.clone()),
            PatientField::Medications => FieldValue::TextList(self.medications.clone()),
            PatientField::Conditions => FieldValue::TextList(self.conditions.clone()),
            PatientField::Surgeries => FieldValue::TextList(self.surgeries.clone()),
            PatientField::FamilyHistory => FieldValue::TextList(self.family_history.clone()),
            PatientField::WeightKg => optional_number(self.weight_kg),
            PatientField::HeightCm => optional_number(self.height_cm),
            PatientField::Hygiene => self.hygiene_or_default().to_field_value(),
        }
    }

    /// Writes one field from a tagged value already shaped by the field table.
    pub fn put_field(
        &mut self,
        name: &str,
        field: PatientField,
        value: FieldValue,
    ) -> Result<(), FieldError> {
        match field {
            PatientField::FirstName => self.first_name = required_text(name, value)?,
            PatientField::LastName => self.last_name = required_text(name, value)?,
            PatientField::BirthDate => {
                self.birth_date = match nullable_text(name, value)? {
                    Some(raw) => Some(NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(
                        |_| FieldError::InvalidValue {
                            field: name.to_string(),
                            message: format!("`{raw}` is not a YYYY-MM-DD date"),
                        },
                    )?),
                    None => None,
                }
            }
            PatientField::Sex => self.sex = nullable_text(name, value)?,
            PatientField::Phone => self.phone = nullable_text(name, value)?,
            PatientField::Email => self.email = nullable_text(name, value)?,
            PatientField::Address => self.address = nullable_text(name, value)?,
            PatientField::HealthPlan => self.health_plan = nullable_text(name, value)?,
            PatientField::Occupation => self.occupation = nullable_text(name, value)?,
            PatientField::Allergies => self.allergies = text_list(name, value)?,
            PatientField::Medications => self.medications = text_list(name, value)?,
            PatientField::Conditions => self.conditions = text_list(name, value)?,
            PatientField::Surgeries => self.surgeries = text_list(name, value)?,
            PatientField::FamilyHistory => self.family_history = text_list(name, value)?,
            PatientField::WeightKg => self.weight_kg = nullable_number(name, value)?,
            PatientField::HeightCm => self.height_cm = nullable_number(name, value)?,
            PatientField::Hygiene => {
                self.hygiene = match value {
                    FieldValue::Object(map) => Some(
                        serde_json::from_value(serde_json::Value::Object(map)).map_err(|err| {
                            FieldError::InvalidValue {
                                field: name.to_string(),
                                message: err.to_string(),
                            }
                        })?,
                    ),
                    FieldValue::Null => None,
                    other => return Err(unexpected(name, "object", &other)),
                }
            }
        }
        Ok(())
    }
}

/// Normalizes an identity number for lookup: whitespace and dots removed,
/// check digit upper-cased. Does not validate the check digit.
pub fn normalize_identity_number(raw: &str) -> String {
    IDENTITY_NOISE_RE
        .replace_all(raw.trim(), "")
        .to_uppercase()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn optional_text(value: Option<String>) -> FieldValue {
    value.map_or(FieldValue::Null, FieldValue::Text)
}

fn optional_number(value: Option<f64>) -> FieldValue {
    value.map_or(FieldValue::Null, FieldValue::Number)
}

fn required_text(name: &str, value: FieldValue) -> Result<String, FieldError> {
    match value {
        FieldValue::Text(text) => Ok(text),
        other => Err(unexpected(name, "text", &other)),
    }
}

fn nullable_text(name: &str, value: FieldValue) -> Result<Option<String>, FieldError> {
    match value {
        FieldValue::Text(text) => Ok(non_blank(Some(text))),
        FieldValue::Null => Ok(None),
        other => Err(unexpected(name, "text", &other)),
    }
}

fn nullable_number(name: &str, value: FieldValue) -> Result<Option<f64>, FieldError> {
    match value {
        FieldValue::Number(number) => Ok(Some(number)),
        FieldValue::Null => Ok(None),
        other => Err(unexpected(name, "number", &other)),
    }
}

pub(crate) fn text_list(name: &str, value: FieldValue) -> Result<Vec<String>, FieldError> {
    match value {
        FieldValue::TextList(items) => Ok(items),
        FieldValue::Null => Ok(Vec::new()),
        other => Err(unexpected(name, "text_list", &other)),
    }
}

pub(crate) fn unexpected(name: &str, expected: &'static str, actual: &FieldValue) -> FieldError {
    FieldError::TypeMismatch {
        field: name.to_string(),
        expected,
        actual: actual.kind_label(),
    }
}
