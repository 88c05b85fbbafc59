//! Snapshot archiver use-cases.
//!
//! # Responsibility
//! - Sole writer of `history_snapshots`.
//! - Read the audit trail back, newest first.
//!
//! # Invariants
//! - A snapshot reflects patient state as committed before the call.
//! - Observations are never empty: absent notes become a local timestamp
//!   label.
//! - Every read or write failure propagates; nothing is swallowed.

use crate::access::{authorize, ClinicOperation, Principal};
use crate::clock::{local_timestamp_label, now_epoch_ms};
use crate::model::encounter::EncounterId;
use crate::model::patient::PatientId;
use crate::model::professional::ProfessionalId;
use crate::model::snapshot::{HistorySnapshot, SnapshotId, SnapshotReason};
use crate::model::EntityKind;
use crate::repo::{
    EncounterRepository, PatientRepository, ProfessionalRepository, SnapshotRepository,
    UnitOfWork,
};
use crate::service::error::{ClinicError, ClinicResult};
use log::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRequest {
    pub patient_id: PatientId,
    pub professional_id: Option<ProfessionalId>,
    pub encounter_id: Option<EncounterId>,
    pub reason: SnapshotReason,
    /// Free-text observations; blank means auto-generated.
    pub notes: Option<String>,
}

/// Writes one snapshot. Callers own authorization and transaction scope.
pub(crate) fn archive<S>(
    store: &S,
    actor_id: &str,
    observation_format: &str,
    request: SnapshotRequest,
) -> ClinicResult<HistorySnapshot>
where
    S: PatientRepository + EncounterRepository + ProfessionalRepository + SnapshotRepository,
{
    let now = now_epoch_ms();
    let patient = store
        .get_patient(request.patient_id)?
        .ok_or_else(|| ClinicError::not_found(EntityKind::Patient, request.patient_id))?;

    let professional = match request.professional_id {
        Some(id) => Some(
            store
                .get_professional(id)?
                .ok_or_else(|| ClinicError::not_found(EntityKind::Professional, id))?,
        ),
        None => None,
    };

    let narrative = match request.encounter_id {
        Some(id) => {
            let encounter = store
                .get_encounter(id)?
                .ok_or_else(|| ClinicError::not_found(EntityKind::Encounter, id))?;
            if encounter.patient_id != patient.id {
                return Err(ClinicError::Validation(format!(
                    "encounter {id} does not belong to patient {}",
                    patient.id
                )));
            }
            Some(encounter.narrative())
        }
        None => None,
    };

    let observations = request
        .notes
        .map(|notes| notes.trim().to_string())
        .filter(|notes| !notes.is_empty())
        .unwrap_or_else(|| local_timestamp_label(now, observation_format));

    let mut snapshot = HistorySnapshot::capture(
        &patient,
        narrative,
        actor_id,
        professional.as_ref(),
        request.reason,
        observations,
        now,
    );
    snapshot.created_at = store.append_snapshot(&snapshot)?;

    info!(
        "event=snapshot_append module=service status=ok snapshot_id={} patient_id={} reason={}",
        snapshot.id,
        snapshot.patient_id,
        snapshot.reason.as_str()
    );
    Ok(snapshot)
}

pub struct SnapshotService<S> {
    store: S,
    observation_format: String,
}

impl<S> SnapshotService<S>
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

    pub fn create_snapshot(
        &self,
        actor: &Principal,
        request: SnapshotRequest,
    ) -> ClinicResult<HistorySnapshot> {
        authorize(actor, ClinicOperation::CreateSnapshot)?;
        self.store.atomically(|| {
            archive(&self.store, &actor.id, &self.observation_format, request)
        })
    }

    /// Audit trail of one patient, newest first.
    pub fn list_snapshots(
        &self,
        actor: &Principal,
        patient_id: PatientId,
    ) -> ClinicResult<Vec<HistorySnapshot>> {
        authorize(actor, ClinicOperation::ReadHistory)?;
        if self.store.get_patient(patient_id)?.is_none() {
            return Err(ClinicError::not_found(EntityKind::Patient, patient_id));
        }
        Ok(self.store.list_snapshots(patient_id)?)
    }

    pub fn get_snapshot(
        &self,
        actor: &Principal,
        snapshot_id: SnapshotId,
    ) -> ClinicResult<HistorySnapshot> {
        authorize(actor, ClinicOperation::ReadHistory)?;
        self.store
            .get_snapshot(snapshot_id)?
            .ok_or_else(|| ClinicError::not_found(EntityKind::Snapshot, snapshot_id))
    }
}
