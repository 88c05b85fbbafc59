//! Arrival registry use-cases.
//!
//! # Responsibility
//! - Register a patient's presence, finding or creating the patient by
//!   identity number.
//! - Close (discharge) arrivals and list the waiting queue.
//!
//! # Invariants
//! - Never two patient rows for one normalized identity number.
//! - At most one open arrival per patient; a second registration is a
//!   Conflict, whether detected by lookup or by the storage index.

use crate::access::{authorize, ClinicOperation, Principal};
use crate::clock::now_epoch_ms;
use crate::model::arrival::Arrival;
use crate::model::patient::{normalize_identity_number, NewPatient, Patient, PatientId};
use crate::model::EntityKind;
use crate::repo::{ArrivalRepository, PatientRepository, RepoError, UnitOfWork};
use crate::service::error::{ClinicError, ClinicResult};
use log::{error, info};
use std::time::Instant;

const ALREADY_ARRIVED: &str = "patient already arrived";

/// Who is arriving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArrivalSubject {
    Existing(PatientId),
    /// Intake data; matched to an existing patient by identity number first.
    New(NewPatient),
}

pub struct ArrivalService<S> {
    store: S,
}

impl<S> ArrivalService<S>
where
    S: PatientRepository + ArrivalRepository + UnitOfWork,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn register_arrival(
        &self,
        actor: &Principal,
        subject: ArrivalSubject,
    ) -> ClinicResult<Arrival> {
        authorize(actor, ClinicOperation::RegisterArrival)?;
        let started_at = Instant::now();

        let result = self.store.atomically(|| {
            let now = now_epoch_ms();
            let patient_id = match subject {
                ArrivalSubject::Existing(id) => {
                    self.store
                        .get_patient(id)?
                        .ok_or_else(|| ClinicError::not_found(EntityKind::Patient, id))?
                        .id
                }
                ArrivalSubject::New(new_patient) => self.find_or_create_patient(new_patient, now)?,
            };

            if self.store.find_open_arrival(patient_id)?.is_some() {
                return Err(ClinicError::Conflict(ALREADY_ARRIVED.to_string()));
            }

            let arrival = Arrival::open(patient_id, now);
            self.store
                .insert_arrival(&arrival)
                .map_err(|err| match err {
                    RepoError::ConstraintViolation(_) => {
                        ClinicError::Conflict(ALREADY_ARRIVED.to_string())
                    }
                    other => other.into(),
                })?;
            Ok(arrival)
        });

        match &result {
            Ok(arrival) => info!(
                "event=arrival_register module=service status=ok arrival_id={} patient_id={} duration_ms={}",
                arrival.id,
                arrival.patient_id,
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=arrival_register module=service status=error error_code={} duration_ms={}",
                err.error_code(),
                started_at.elapsed().as_millis()
            ),
        }
        result
    }

    /// Stamps the termination timestamp on the patient's open arrival.
    pub fn close_arrival(&self, actor: &Principal, patient_id: PatientId) -> ClinicResult<Arrival> {
        authorize(actor, ClinicOperation::CloseArrival)?;
        self.store.atomically(|| {
            let mut arrival = self
                .store
                .find_open_arrival(patient_id)?
                .ok_or_else(|| ClinicError::not_found(EntityKind::Arrival, patient_id))?;
            let now = now_epoch_ms();
            self.store.close_arrival(arrival.id, now)?;
            arrival.closed_at = Some(now);
            info!(
                "event=arrival_close module=service status=ok arrival_id={}",
                arrival.id
            );
            Ok(arrival)
        })
    }

    /// Open, unattended arrivals, oldest first.
    pub fn list_waiting(&self, actor: &Principal) -> ClinicResult<Vec<Arrival>> {
        authorize(actor, ClinicOperation::ListWaitingArrivals)?;
        Ok(self.store.list_open_arrivals(true)?)
    }

    fn find_or_create_patient(&self, new_patient: NewPatient, now: i64) -> ClinicResult<PatientId> {
        let identity_number = normalize_identity_number(&new_patient.identity_number);
        if let Some(existing) = self.store.find_patient_by_identity(&identity_number)? {
            return Ok(existing.id);
        }

        let patient = Patient::from_new(new_patient, now);
        patient.validate()?;
        self.store.insert_patient(&patient)?;
        info!(
            "event=patient_create module=service status=ok patient_id={}",
            patient.id
        );
        Ok(patient.id)
    }
}
