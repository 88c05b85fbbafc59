//! Box assignment coordinator.
//!
//! # Responsibility
//! - Seat a waiting patient in a box with the acting professional.
//! - Open or reuse today's encounter for the pair.
//!
//! # Invariants
//! - All steps run in one immediate transaction; any failure leaves boxes,
//!   encounters and arrivals untouched.
//! - Box occupancy is written by compare-and-swap on the box version read in
//!   the same transaction.

use crate::access::{authorize, ClinicOperation, Principal};
use crate::clock::{now_epoch_ms, today_key};
use crate::model::patient::PatientId;
use crate::model::treatment_box::{BoxAssignment, BoxId, BoxOccupancy};
use crate::model::{EntityKind, ValidationError};
use crate::repo::{
    ArrivalRepository, BoxRepository, EncounterRepository, PatientRepository,
    ProfessionalRepository, UnitOfWork,
};
use crate::service::encounter_service::open_or_reuse_today;
use crate::service::error::{ClinicError, ClinicResult};
use log::{error, info, warn};
use serde::Deserialize;
use std::cell::Cell;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct AssignBoxRequest {
    #[serde(rename = "boxId")]
    pub box_id: BoxId,
    #[serde(rename = "pacienteId")]
    pub patient_id: PatientId,
    #[serde(rename = "tiempoEstimado")]
    pub estimated_minutes: u32,
}

/// Step reached when an assignment fails; logged with the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AssignmentStage {
    ResolveProfessional,
    LoadBox,
    ResolveEncounter,
    OccupyBox,
    StampArrival,
}

impl AssignmentStage {
    fn as_str(self) -> &'static str {
        match self {
            Self::ResolveProfessional => "resolve_professional",
            Self::LoadBox => "load_box",
            Self::ResolveEncounter => "resolve_encounter",
            Self::OccupyBox => "occupy_box",
            Self::StampArrival => "stamp_arrival",
        }
    }
}

pub struct AssignmentService<S> {
    store: S,
}

impl<S> AssignmentService<S>
where
    S: PatientRepository
        + ProfessionalRepository
        + BoxRepository
        + EncounterRepository
        + ArrivalRepository
        + UnitOfWork,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn assign_box(
        &self,
        actor: &Principal,
        request: AssignBoxRequest,
    ) -> ClinicResult<BoxAssignment> {
        authorize(actor, ClinicOperation::AssignBox)?;
        if request.estimated_minutes == 0 {
            return Err(ValidationError::ZeroEstimatedMinutes.into());
        }

        let started_at = Instant::now();
        let stage = Cell::new(AssignmentStage::ResolveProfessional);

        let result = self.store.atomically(|| {
            let now = now_epoch_ms();
            let professional = self
                .store
                .find_professional_by_principal(&actor.id)?
                .ok_or_else(|| ClinicError::not_found(EntityKind::Professional, &actor.id))?;

            stage.set(AssignmentStage::LoadBox);
            let treatment_box = self
                .store
                .get_box(request.box_id)?
                .ok_or_else(|| ClinicError::not_found(EntityKind::Box, request.box_id))?;
            if self.store.get_patient(request.patient_id)?.is_none() {
                return Err(ClinicError::not_found(
                    EntityKind::Patient,
                    request.patient_id,
                ));
            }

            stage.set(AssignmentStage::ResolveEncounter);
            let encounter = open_or_reuse_today(
                &self.store,
                request.patient_id,
                Some(professional.id),
                &today_key(),
                now,
            )?;

            stage.set(AssignmentStage::OccupyBox);
            if let Some(previous) = treatment_box.occupancy.as_ref() {
                warn!(
                    "event=box_assign module=service status=warn box_id={} replaced_patient_id={}",
                    treatment_box.id, previous.patient_id
                );
            }
            let occupancy = BoxOccupancy {
                patient_id: request.patient_id,
                professional_id: professional.id,
                started_at: now,
                estimated_minutes: request.estimated_minutes,
            };
            let occupied =
                self.store
                    .occupy_box(treatment_box.id, treatment_box.version, &occupancy, now)?;

            stage.set(AssignmentStage::StampArrival);
            let arrival = self
                .store
                .find_open_arrival(request.patient_id)?
                .ok_or_else(|| ClinicError::not_found(EntityKind::Arrival, request.patient_id))?;
            self.store
                .mark_attended(arrival.id, professional.id, now)?;

            Ok(BoxAssignment {
                id: occupied.id,
                number: occupied.number,
                patient_id: occupancy.patient_id,
                professional_id: occupancy.professional_id,
                started_at: occupancy.started_at,
                estimated_end: occupancy.estimated_end(),
                estimated_minutes: occupancy.estimated_minutes,
                encounter_id: encounter.id,
            })
        });

        match &result {
            Ok(assignment) => info!(
                "event=box_assign module=service status=ok box_id={} patient_id={} encounter_id={} duration_ms={}",
                assignment.id,
                assignment.patient_id,
                assignment.encounter_id,
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=box_assign module=service status=error stage={} error_code={} duration_ms={}",
                stage.get().as_str(),
                err.error_code(),
                started_at.elapsed().as_millis()
            ),
        }
        result
    }
}
