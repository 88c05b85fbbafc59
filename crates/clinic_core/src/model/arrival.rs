//! Arrival (presence-in-clinic) model.
//!
//! # Invariants
//! - An arrival is open while `closed_at` is `None`.
//! - `attended_at` and `professional_id` are stamped together by box
//!   assignment.

use crate::model::patient::PatientId;
use crate::model::professional::ProfessionalId;
use serde::Serialize;
use uuid::Uuid;

pub type ArrivalId = Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Arrival {
    pub id: ArrivalId,
    pub patient_id: PatientId,
    pub arrived_at: i64,
    pub professional_id: Option<ProfessionalId>,
    pub attended_at: Option<i64>,
    pub closed_at: Option<i64>,
}

impl Arrival {
    /// Builds an open, unattended arrival.
    pub fn open(patient_id: PatientId, now_ms: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            patient_id,
            arrived_at: now_ms,
            professional_id: None,
            attended_at: None,
            closed_at: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.closed_at.is_none()
    }

    pub fn is_waiting(&self) -> bool {
        self.is_open() && self.attended_at.is_none()
    }
}
