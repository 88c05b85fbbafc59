//! Batch mutation engine.
//!
//! # Responsibility
//! - Apply an ordered list of field operations to one patient, routing each
//!   to the patient record or today's encounter via the field table.
//! - Report per-operation outcomes indexed by input position.
//!
//! # Invariants
//! - Operations run strictly in input order; each commits in its own
//!   transaction before the next starts.
//! - A failing operation is recorded and never aborts the remaining ones.
//! - Encounter-owned fields lazily open today's encounter for the acting
//!   professional (or an unclaimed one for non-professional actors).

use crate::access::{authorize, ClinicOperation, Principal};
use crate::clock::{now_epoch_ms, today_key};
use crate::model::field::{
    apply_field_op, field_spec, FieldError, FieldOp, FieldOwner, FieldSpec, FieldTarget,
    FieldValue,
};
use crate::model::patient::PatientId;
use crate::model::EntityKind;
use crate::repo::{
    EncounterRepository, PatientRepository, ProfessionalRepository, UnitOfWork,
};
use crate::service::encounter_service::open_or_reuse_today;
use crate::service::error::{ClinicError, ClinicResult};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// One field-level instruction.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FieldOperation {
    #[serde(rename = "operation")]
    pub op: String,
    pub field: String,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
    #[serde(rename = "arrayFilters", default)]
    pub filters: Vec<serde_json::Value>,
}

impl FieldOperation {
    pub fn new(op: &str, field: &str, value: Option<serde_json::Value>) -> Self {
        Self {
            op: op.to_string(),
            field: field.to_string(),
            value,
            filters: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationOutcome {
    pub index: usize,
    pub op: FieldOp,
    pub field: String,
    pub target: FieldOwner,
    /// Field value after the operation.
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationFailure {
    pub index: usize,
    pub op: String,
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    pub success: bool,
    pub processed: usize,
    pub successful: usize,
    pub failed: usize,
    pub results: Vec<OperationOutcome>,
    pub errors: Vec<OperationFailure>,
}

pub struct BatchService<S> {
    store: S,
}

impl<S> BatchService<S>
where
    S: PatientRepository + EncounterRepository + ProfessionalRepository + UnitOfWork,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Applies `operations` in order. Fails as a whole only when the caller
    /// is not allowed or the patient does not exist.
    pub fn apply_batch(
        &self,
        actor: &Principal,
        patient_id: PatientId,
        operations: &[FieldOperation],
    ) -> ClinicResult<BatchReport> {
        authorize(actor, ClinicOperation::ApplyBatch)?;
        if self.store.get_patient(patient_id)?.is_none() {
            return Err(ClinicError::not_found(EntityKind::Patient, patient_id));
        }

        let started_at = Instant::now();
        let mut results = Vec::new();
        let mut errors = Vec::new();

        for (index, operation) in operations.iter().enumerate() {
            match self.apply_one(actor, patient_id, index, operation) {
                Ok(outcome) => results.push(outcome),
                Err(err) => {
                    warn!(
                        "event=batch_op module=service status=error patient_id={patient_id} index={index} error_code={}",
                        err.error_code()
                    );
                    errors.push(OperationFailure {
                        index,
                        op: operation.op.clone(),
                        field: operation.field.clone(),
                        message: err.public_message(),
                    });
                }
            }
        }

        let report = BatchReport {
            success: errors.is_empty(),
            processed: operations.len(),
            successful: results.len(),
            failed: errors.len(),
            results,
            errors,
        };
        info!(
            "event=batch_apply module=service status=ok patient_id={patient_id} processed={} failed={} duration_ms={}",
            report.processed,
            report.failed,
            started_at.elapsed().as_millis()
        );
        Ok(report)
    }

    fn apply_one(
        &self,
        actor: &Principal,
        patient_id: PatientId,
        index: usize,
        operation: &FieldOperation,
    ) -> ClinicResult<OperationOutcome> {
        let op = FieldOp::parse(&operation.op)
            .ok_or_else(|| FieldError::UnsupportedOperation(operation.op.clone()))?;
        let spec = field_spec(&operation.field)
            .ok_or_else(|| FieldError::UnknownField(operation.field.clone()))?;
        let value = operation
            .value
            .clone()
            .map(|raw| FieldValue::from_json(spec.name, raw))
            .transpose()?;
        let filters = operation
            .filters
            .iter()
            .cloned()
            .map(|raw| FieldValue::from_json(spec.name, raw))
            .collect::<Result<Vec<_>, _>>()?;

        let next = self.store.atomically(|| -> ClinicResult<FieldValue> {
            let now = now_epoch_ms();
            match spec.target {
                FieldTarget::Patient(field) => {
                    let mut patient = self
                        .store
                        .get_patient(patient_id)?
                        .ok_or_else(|| ClinicError::not_found(EntityKind::Patient, patient_id))?;
                    let next = apply_field_op(spec, op, patient.field(field), value.as_ref(), &filters)?;
                    patient.put_field(spec.name, field, next.clone())?;
                    patient.validate()?;
                    self.store.update_patient(&patient, now)?;
                    Ok(next)
                }
                FieldTarget::Encounter(field) => {
                    let professional_id = self
                        .store
                        .find_professional_by_principal(&actor.id)?
                        .map(|professional| professional.id);
                    let mut encounter = open_or_reuse_today(
                        &self.store,
                        patient_id,
                        professional_id,
                        &today_key(),
                        now,
                    )?;
                    let next =
                        apply_field_op(spec, op, encounter.field(field), value.as_ref(), &filters)?;
                    encounter.put_field(spec.name, field, next.clone())?;
                    self.store.update_encounter(&encounter, now)?;
                    Ok(next)
                }
            }
        })?;

        Ok(outcome(index, op, spec, &next))
    }
}

fn outcome(index: usize, op: FieldOp, spec: &FieldSpec, next: &FieldValue) -> OperationOutcome {
    OperationOutcome {
        index,
        op,
        field: spec.name.to_string(),
        target: spec.owner(),
        value: next.to_json(),
    }
}
