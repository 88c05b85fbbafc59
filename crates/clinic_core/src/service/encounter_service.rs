//! Encounter store use-cases.
//!
//! # Responsibility
//! - Resolve today's encounter for a patient: reuse, adopt, or create with
//!   carry-forward.
//! - Finalize encounters (`open -> closed`) and archive them.
//!
//! # Invariants
//! - Resolution never creates a second open encounter for the same
//!   (patient, professional, day).
//! - Carry-forward reads the most recent earlier-day encounter across all
//!   professionals (`day DESC, created_at DESC`).

use crate::access::{authorize, ClinicOperation, Principal};
use crate::clock::{now_epoch_ms, today_key};
use crate::model::encounter::{Encounter, EncounterId};
use crate::model::patient::PatientId;
use crate::model::professional::ProfessionalId;
use crate::model::snapshot::{HistorySnapshot, SnapshotReason};
use crate::model::EntityKind;
use crate::repo::{
    EncounterRepository, PatientRepository, ProfessionalRepository, SnapshotRepository,
    UnitOfWork,
};
use crate::service::error::{ClinicError, ClinicResult};
use crate::service::snapshot_service::{archive, SnapshotRequest};
use log::{debug, info};

/// Returns today's open encounter for (patient, professional), creating it
/// when absent.
///
/// With a professional, an open professional-less encounter of the same day
/// is adopted before a new one is created. Without one, the patient's only
/// open encounter of the day is reused whoever owns it; a professional-less
/// encounter is used when there is none or several.
pub(crate) fn open_or_reuse_today<S>(
    store: &S,
    patient_id: PatientId,
    professional_id: Option<ProfessionalId>,
    day: &str,
    now_ms: i64,
) -> ClinicResult<Encounter>
where
    S: EncounterRepository,
{
    if professional_id.is_none() {
        let mut open = store.list_open_encounters_for_day(patient_id, day)?;
        if open.len() == 1 {
            return Ok(open.remove(0));
        }
    }

    if let Some(existing) = store.find_open_encounter(patient_id, professional_id, day)? {
        return Ok(existing);
    }

    if professional_id.is_some() {
        if let Some(mut unclaimed) = store.find_open_encounter(patient_id, None, day)? {
            unclaimed.professional_id = professional_id;
            let adopted = store.update_encounter(&unclaimed, now_ms)?;
            debug!(
                "event=encounter_adopt module=service status=ok encounter_id={}",
                adopted.id
            );
            return Ok(adopted);
        }
    }

    let mut encounter = Encounter::open(patient_id, professional_id, day, now_ms);
    let prior = store.find_latest_prior_encounter(patient_id, day)?;
    if let Some(prior) = prior.as_ref() {
        encounter.carry_forward_from(prior);
    }
    store.insert_encounter(&encounter)?;
    debug!(
        "event=encounter_create module=service status=ok encounter_id={} carried_forward={}",
        encounter.id,
        prior.is_some()
    );
    Ok(encounter)
}

pub struct EncounterService<S> {
    store: S,
    observation_format: String,
}

impl<S> EncounterService<S>
where
    S: PatientRepository
        + EncounterRepository
        + ProfessionalRepository
        + SnapshotRepository
        + UnitOfWork,
{
    pub fn new(store: S, observation_format: impl Into<String>) -> Self {
        Self {
            store,
            observation_format: observation_format.into(),
        }
    }

    /// Today's open encounter, if any; read-only.
    pub fn today_encounter(
        &self,
        actor: &Principal,
        patient_id: PatientId,
        professional_id: Option<ProfessionalId>,
    ) -> ClinicResult<Option<Encounter>> {
        authorize(actor, ClinicOperation::ReadEncounter)?;
        Ok(self
            .store
            .find_open_encounter(patient_id, professional_id, &today_key())?)
    }

    /// Closes an open encounter and archives a snapshot of it, atomically.
    pub fn finalize_encounter(
        &self,
        actor: &Principal,
        encounter_id: EncounterId,
        notes: Option<String>,
    ) -> ClinicResult<HistorySnapshot> {
        authorize(actor, ClinicOperation::FinalizeEncounter)?;

        let snapshot = self.store.atomically(|| -> ClinicResult<HistorySnapshot> {
            let now = now_epoch_ms();
            let mut encounter = self
                .store
                .get_encounter(encounter_id)?
                .ok_or_else(|| ClinicError::not_found(EntityKind::Encounter, encounter_id))?;
            if !encounter.close(now) {
                return Err(ClinicError::Conflict(format!(
                    "encounter {encounter_id} is already closed"
                )));
            }
            let closed = self.store.update_encounter(&encounter, now)?;

            archive(
                &self.store,
                &actor.id,
                &self.observation_format,
                SnapshotRequest {
                    patient_id: closed.patient_id,
                    professional_id: closed.professional_id,
                    encounter_id: Some(closed.id),
                    reason: SnapshotReason::EncounterFinalized,
                    notes,
                },
            )
        })?;

        info!(
            "event=encounter_finalize module=service status=ok encounter_id={encounter_id} snapshot_id={}",
            snapshot.id
        );
        Ok(snapshot)
    }
}
