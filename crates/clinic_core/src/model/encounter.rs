//! Encounter (per-day consultation record) model.
//!
//! # Responsibility
//! - Hold the mutable clinical narrative of one patient/professional/day.
//! - Carry treatment and exam history forward from a prior encounter.
//!
//! # Invariants
//! - `day` is a `YYYY-MM-DD` calendar key.
//! - Status only moves `open -> closed`; a closed encounter has `closed_at`.
//! - At most one open encounter per (patient, professional, day); enforced by
//!   storage.

use crate::model::field::{EncounterField, FieldError, FieldValue};
use crate::model::patient::{text_list, unexpected, PatientId};
use crate::model::professional::ProfessionalId;
use crate::model::ValidationError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type EncounterId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EncounterStatus {
    Open,
    Closed,
}

impl EncounterStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "open" => Some(Self::Open),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Encounter {
    pub id: EncounterId,
    pub patient_id: PatientId,
    /// `None` until a professional claims the encounter through assignment.
    pub professional_id: Option<ProfessionalId>,
    pub day: String,
    pub status: EncounterStatus,
    pub anamnesis: String,
    pub requested_exams: Vec<String>,
    pub instructions: String,
    pub prescriptions: Vec<String>,
    /// Carry-forward field (`tratamiento`).
    pub treatment: String,
    /// Carry-forward field (`examenes`).
    pub exams: Vec<String>,
    pub version: i64,
    pub created_at: i64,
    pub updated_at: i64,
    pub closed_at: Option<i64>,
}

/// Narrative fields copied into history snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncounterNarrative {
    pub encounter_id: EncounterId,
    pub day: String,
    pub anamnesis: String,
    pub requested_exams: Vec<String>,
    pub instructions: String,
    pub prescriptions: Vec<String>,
    pub treatment: String,
    pub exams: Vec<String>,
}

impl Encounter {
    /// Builds an open encounter with empty narrative fields.
    pub fn open(
        patient_id: PatientId,
        professional_id: Option<ProfessionalId>,
        day: impl Into<String>,
        now_ms: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            patient_id,
            professional_id,
            day: day.into(),
            status: EncounterStatus::Open,
            anamnesis: String::new(),
            requested_exams: Vec::new(),
            instructions: String::new(),
            prescriptions: Vec::new(),
            treatment: String::new(),
            exams: Vec::new(),
            version: 1,
            created_at: now_ms,
            updated_at: now_ms,
            closed_at: None,
        }
    }

    /// Copies treatment and exams from an earlier encounter.
    pub fn carry_forward_from(&mut self, prior: &Encounter) {
        self.treatment = prior.treatment.clone();
        self.exams = prior.exams.clone();
    }

    pub fn is_open(&self) -> bool {
        self.status == EncounterStatus::Open
    }

    /// Marks the encounter closed. Returns `false` when it already was.
    pub fn close(&mut self, now_ms: i64) -> bool {
        if !self.is_open() {
            return false;
        }
        self.status = EncounterStatus::Closed;
        self.closed_at = Some(now_ms);
        true
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if NaiveDate::parse_from_str(&self.day, "%Y-%m-%d").is_err() {
            return Err(ValidationError::InvalidDay(self.day.clone()));
        }
        Ok(())
    }

    pub fn field(&self, field: EncounterField) -> FieldValue {
        match field {
            EncounterField::Anamnesis => FieldValue::Text(self.anamnesis.clone()),
            EncounterField::RequestedExams => FieldValue::TextList(self.requested_exams.clone()),
            EncounterField::Instructions => FieldValue::Text(self.instructions.clone()),
            EncounterField::Prescriptions => FieldValue::TextList(self.prescriptions.clone()),
        }
    }

    pub fn put_field(
        &mut self,
        name: &str,
        field: EncounterField,
        value: FieldValue,
    ) -> Result<(), FieldError> {
        match field {
            EncounterField::Anamnesis => self.anamnesis = text_or_empty(name, value)?,
            EncounterField::RequestedExams => self.requested_exams = text_list(name, value)?,
            EncounterField::Instructions => self.instructions = text_or_empty(name, value)?,
            EncounterField::Prescriptions => self.prescriptions = text_list(name, value)?,
        }
        Ok(())
    }

    pub fn narrative(&self) -> EncounterNarrative {
        EncounterNarrative {
            encounter_id: self.id,
            day: self.day.clone(),
            anamnesis: self.anamnesis.clone(),
            requested_exams: self.requested_exams.clone(),
            instructions: self.instructions.clone(),
            prescriptions: self.prescriptions.clone(),
            treatment: self.treatment.clone(),
            exams: self.exams.clone(),
        }
    }
}

fn text_or_empty(name: &str, value: FieldValue) -> Result<String, FieldError> {
    match value {
        FieldValue::Text(text) => Ok(text),
        FieldValue::Null => Ok(String::new()),
        other => Err(unexpected(name, "text", &other)),
    }
}

#[cfg(test)]
mod tests {
    use super::{Encounter, EncounterStatus};
    use crate::model::field::{EncounterField, FieldValue};
    use uuid::Uuid;

    #[test]
    fn carry_forward_copies_only_treatment_and_exams() {
        let patient_id = Uuid::new_v4();
        let mut prior = Encounter::open(patient_id, None, "2026-01-02", 1);
        prior.treatment = "endodoncia".to_string();
        prior.exams = vec!["radiografia".to_string()];
        prior.anamnesis = "dolor".to_string();

        let mut next = Encounter::open(patient_id, None, "2026-01-03", 2);
        next.carry_forward_from(&prior);
        assert_eq!(next.treatment, "endodoncia");
        assert_eq!(next.exams, vec!["radiografia".to_string()]);
        assert!(next.anamnesis.is_empty());
    }

    #[test]
    fn close_is_one_way() {
        let mut encounter = Encounter::open(Uuid::new_v4(), None, "2026-01-02", 1);
        assert!(encounter.close(5));
        assert_eq!(encounter.status, EncounterStatus::Closed);
        assert_eq!(encounter.closed_at, Some(5));
        assert!(!encounter.close(6));
        assert_eq!(encounter.closed_at, Some(5));
    }

    #[test]
    fn rejects_malformed_day() {
        let encounter = Encounter::open(Uuid::new_v4(), None, "02/01/2026", 1);
        assert!(encounter.validate().is_err());
    }

    #[test]
    fn put_field_rejects_wrong_kind() {
        let mut encounter = Encounter::open(Uuid::new_v4(), None, "2026-01-02", 1);
        assert!(encounter
            .put_field(
                "anamnesis",
                EncounterField::Anamnesis,
                FieldValue::Number(1.0)
            )
            .is_err());
    }
}
