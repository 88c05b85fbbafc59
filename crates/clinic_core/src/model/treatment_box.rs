//! Treatment box (consultation room) model.
//!
//! # Invariants
//! - A box is either free (`occupancy == None`) or carries exactly one
//!   occupant triple: patient, professional, start instant.

use crate::model::patient::PatientId;
use crate::model::professional::ProfessionalId;
use crate::model::ValidationError;
use serde::Serialize;
use uuid::Uuid;

pub type BoxId = Uuid;

const MS_PER_MINUTE: i64 = 60_000;

/// Current occupant of a box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoxOccupancy {
    pub patient_id: PatientId,
    pub professional_id: ProfessionalId,
    /// Start of attention, epoch milliseconds.
    pub started_at: i64,
    pub estimated_minutes: u32,
}

impl BoxOccupancy {
    pub fn estimated_end(&self) -> i64 {
        self.started_at + i64::from(self.estimated_minutes) * MS_PER_MINUTE
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreatmentBox {
    pub id: BoxId,
    pub number: u32,
    pub label: String,
    pub occupancy: Option<BoxOccupancy>,
    pub version: i64,
    pub updated_at: i64,
}

impl TreatmentBox {
    /// Builds a free box; provisioning happens outside clinic workflows.
    pub fn new(number: u32, label: impl Into<String>, now_ms: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            number,
            label: label.into(),
            occupancy: None,
            version: 1,
            updated_at: now_ms,
        }
    }

    pub fn is_occupied(&self) -> bool {
        self.occupancy.is_some()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self
            .occupancy
            .as_ref()
            .is_some_and(|occupancy| occupancy.estimated_minutes == 0)
        {
            return Err(ValidationError::ZeroEstimatedMinutes);
        }
        Ok(())
    }
}

/// Box view returned by a successful assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoxAssignment {
    pub id: BoxId,
    #[serde(rename = "numero")]
    pub number: u32,
    #[serde(rename = "pacienteId")]
    pub patient_id: PatientId,
    #[serde(rename = "profesionalId")]
    pub professional_id: ProfessionalId,
    #[serde(rename = "inicio")]
    pub started_at: i64,
    #[serde(rename = "termino")]
    pub estimated_end: i64,
    #[serde(rename = "tiempoEstimado")]
    pub estimated_minutes: u32,
    #[serde(rename = "fichaId")]
    pub encounter_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::{BoxOccupancy, TreatmentBox};
    use uuid::Uuid;

    #[test]
    fn estimated_end_adds_minutes() {
        let occupancy = BoxOccupancy {
            patient_id: Uuid::new_v4(),
            professional_id: Uuid::new_v4(),
            started_at: 1_000,
            estimated_minutes: 30,
        };
        assert_eq!(occupancy.estimated_end(), 1_000 + 30 * 60_000);
    }

    #[test]
    fn new_box_is_free() {
        let treatment_box = TreatmentBox::new(3, "Box 3", 10);
        assert!(!treatment_box.is_occupied());
        assert!(treatment_box.validate().is_ok());
    }
}
