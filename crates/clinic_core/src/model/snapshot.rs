//! History snapshot (audit trail) model.
//!
//! # Responsibility
//! - Describe one immutable point-in-time copy of patient state, optionally
//!   with the narrative of one encounter.
//!
//! # Invariants
//! - Snapshots are value copies; nothing in this module mutates a stored one.
//! - `specialty` is [`UNASSIGNED_SPECIALTY`] when no professional is attached.
//! - `hygiene` is always present; absent patient hygiene copies as the default.

use crate::model::encounter::{EncounterId, EncounterNarrative};
use crate::model::patient::{HygieneRecord, Patient, PatientId};
use crate::model::professional::{Professional, ProfessionalId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type SnapshotId = Uuid;

/// Specialty label stamped when no professional is attached.
pub const UNASSIGNED_SPECIALTY: &str = "unassigned";

/// Why a snapshot was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotReason {
    Manual,
    Assignment,
    BatchUpdate,
    EncounterFinalized,
    Audit,
}

impl SnapshotReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Assignment => "assignment",
            Self::BatchUpdate => "batch_update",
            Self::EncounterFinalized => "encounter_finalized",
            Self::Audit => "audit",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "manual" => Some(Self::Manual),
            "assignment" => Some(Self::Assignment),
            "batch_update" => Some(Self::BatchUpdate),
            "encounter_finalized" => Some(Self::EncounterFinalized),
            "audit" => Some(Self::Audit),
            _ => None,
        }
    }
}

/// Identity and demographic fields copied from the patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientRecordCopy {
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
    pub weight_kg: Option<f64>,
    pub height_cm: Option<f64>,
}

/// Medical-history reference lists copied from the patient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicalHistoryCopy {
    pub allergies: Vec<String>,
    pub medications: Vec<String>,
    pub conditions: Vec<String>,
    pub surgeries: Vec<String>,
    pub family_history: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistorySnapshot {
    pub id: SnapshotId,
    pub patient_id: PatientId,
    pub encounter_id: Option<EncounterId>,
    pub actor_id: String,
    pub professional_id: Option<ProfessionalId>,
    pub specialty: String,
    pub reason: SnapshotReason,
    pub observations: String,
    pub patient_data: PatientRecordCopy,
    pub medical_history: MedicalHistoryCopy,
    pub hygiene: HygieneRecord,
    pub encounter_data: Option<EncounterNarrative>,
    /// Epoch milliseconds; strictly increasing across the whole table.
    pub created_at: i64,
}

impl HistorySnapshot {
    /// Copies the current patient state (and narrative, when given).
    ///
    /// `created_at` is the requested instant; storage may move it forward to
    /// keep timestamps strictly increasing.
    pub fn capture(
        patient: &Patient,
        encounter: Option<EncounterNarrative>,
        actor_id: impl Into<String>,
        professional: Option<&Professional>,
        reason: SnapshotReason,
        observations: impl Into<String>,
        now_ms: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            patient_id: patient.id,
            encounter_id: encounter.as_ref().map(|narrative| narrative.encounter_id),
            actor_id: actor_id.into(),
            professional_id: professional.map(|professional| professional.id),
            specialty: professional.map_or_else(
                || UNASSIGNED_SPECIALTY.to_string(),
                |professional| professional.specialty.clone(),
            ),
            reason,
            observations: observations.into(),
            patient_data: PatientRecordCopy {
                identity_number: patient.identity_number.clone(),
                first_name: patient.first_name.clone(),
                last_name: patient.last_name.clone(),
                birth_date: patient.birth_date,
                sex: patient.sex.clone(),
                phone: patient.phone.clone(),
                email: patient.email.clone(),
                address: patient.address.clone(),
                health_plan: patient.health_plan.clone(),
                occupation: patient.occupation.clone(),
                weight_kg: patient.weight_kg,
                height_cm: patient.height_cm,
            },
            medical_history: MedicalHistoryCopy {
                allergies: patient.allergies.clone(),
                medications: patient.medications.clone(),
                conditions: patient.conditions.clone(),
                surgeries: patient.surgeries.clone(),
                family_history: patient.family_history.clone(),
            },
            hygiene: patient.hygiene_or_default(),
            encounter_data: encounter,
            created_at: now_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{HistorySnapshot, SnapshotReason, UNASSIGNED_SPECIALTY};
    use crate::model::patient::{NewPatient, Patient, DEFAULT_HYGIENE};

    #[test]
    fn capture_without_professional_uses_unassigned_specialty() {
        let mut patient = Patient::from_new(
            NewPatient {
                identity_number: "1-9".to_string(),
                first_name: "Luis".to_string(),
                ..NewPatient::default()
            },
            1,
        );
        patient.allergies = vec!["polen".to_string()];

        let snapshot =
            HistorySnapshot::capture(&patient, None, "actor", None, SnapshotReason::Manual, "", 9);
        assert_eq!(snapshot.specialty, UNASSIGNED_SPECIALTY);
        assert_eq!(snapshot.hygiene, DEFAULT_HYGIENE);
        assert_eq!(snapshot.medical_history.allergies, vec!["polen".to_string()]);
        assert!(snapshot.encounter_id.is_none());
    }

    #[test]
    fn reason_round_trips_through_storage_label() {
        for reason in [
            SnapshotReason::Manual,
            SnapshotReason::Assignment,
            SnapshotReason::BatchUpdate,
            SnapshotReason::EncounterFinalized,
            SnapshotReason::Audit,
        ] {
            assert_eq!(SnapshotReason::parse(reason.as_str()), Some(reason));
        }
    }
}
