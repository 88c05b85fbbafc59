//! JSON request/response adapter over clinic core use-cases.
//!
//! # Responsibility
//! - Authenticate every call through the access gate before reading the body.
//! - Decode request payloads and encode results as JSON envelopes.
//! - Map the error taxonomy onto HTTP-style status codes.
//!
//! # Invariants
//! - Calls never panic; every failure is an `ApiResponse` with `{"error": ..}`.
//! - Storage detail never leaks into a response body.
//! - Batch calls answer 200 with per-item failures inside the report.

use clinic_core::model::encounter::EncounterId;
use clinic_core::model::patient::PatientId;
use clinic_core::model::professional::ProfessionalId;
use clinic_core::{
    AccessGate, AdminService, ArrivalService, ArrivalSubject, AssignBoxRequest,
    AssignmentService, BatchService, ClinicConfig, ClinicError, ClinicResult, EncounterService,
    FieldOperation, NewPatient, PanoramicService, Principal, RepoError, RepoResult, RequestContext,
    SnapshotReason, SnapshotRequest, SnapshotService, SqliteStore,
};
use log::{error, info};
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Instant;

const STATUS_OK: u16 = 200;
const STATUS_CREATED: u16 = 201;

/// Status + JSON body returned by every endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    fn failure(err: &ClinicError) -> Self {
        Self {
            status: err.status_code(),
            body: json!({ "error": err.public_message() }),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Deserialize)]
struct RegisterArrivalBody {
    #[serde(rename = "pacienteId", default)]
    patient_id: Option<PatientId>,
    #[serde(rename = "paciente", default)]
    patient: Option<NewPatient>,
}

#[derive(Debug, Deserialize)]
struct PatientBody {
    #[serde(rename = "pacienteId")]
    patient_id: PatientId,
}

#[derive(Debug, Deserialize)]
struct TodayEncounterBody {
    #[serde(rename = "pacienteId")]
    patient_id: PatientId,
    #[serde(rename = "profesionalId", default)]
    professional_id: Option<ProfessionalId>,
}

#[derive(Debug, Deserialize)]
struct BatchBody {
    #[serde(rename = "pacienteId")]
    patient_id: PatientId,
    operations: Vec<FieldOperation>,
}

#[derive(Debug, Deserialize)]
struct SnapshotBody {
    #[serde(rename = "pacienteId")]
    patient_id: PatientId,
    #[serde(rename = "profesionalId", default)]
    professional_id: Option<ProfessionalId>,
    #[serde(rename = "fichaId", default)]
    encounter_id: Option<EncounterId>,
    #[serde(rename = "motivo", default = "default_reason")]
    reason: SnapshotReason,
    #[serde(rename = "observaciones", default)]
    notes: Option<String>,
}

fn default_reason() -> SnapshotReason {
    SnapshotReason::Manual
}

#[derive(Debug, Deserialize)]
struct FinalizeBody {
    #[serde(rename = "fichaId")]
    encounter_id: EncounterId,
    #[serde(rename = "observaciones", default)]
    notes: Option<String>,
}

/// Endpoint facade bound to one migrated connection and one access gate.
pub struct ClinicApi<'conn, G: AccessGate> {
    store: SqliteStore<'conn>,
    gate: G,
    observation_format: String,
}

impl<'conn, G: AccessGate> ClinicApi<'conn, G> {
    pub fn try_new(conn: &'conn Connection, gate: G, config: &ClinicConfig) -> RepoResult<Self> {
        Ok(Self {
            store: SqliteStore::try_new(conn)?,
            gate,
            observation_format: config.observation_format.clone(),
        })
    }

    /// Body: `{"pacienteId": ..}` or `{"paciente": {"rut": .., "nombre": ..}}`.
    pub fn register_arrival(&self, ctx: &RequestContext, payload: &str) -> ApiResponse {
        self.handle("register_arrival", ctx, STATUS_CREATED, |principal| {
            let body: RegisterArrivalBody = parse_body(payload)?;
            let subject = match (body.patient_id, body.patient) {
                (Some(id), None) => ArrivalSubject::Existing(id),
                (None, Some(new_patient)) => ArrivalSubject::New(new_patient),
                _ => {
                    return Err(ClinicError::Validation(
                        "exactly one of `pacienteId` or `paciente` is required".to_string(),
                    ))
                }
            };
            ArrivalService::new(self.store).register_arrival(principal, subject)
        })
    }

    pub fn close_arrival(&self, ctx: &RequestContext, payload: &str) -> ApiResponse {
        self.handle("close_arrival", ctx, STATUS_OK, |principal| {
            let body: PatientBody = parse_body(payload)?;
            ArrivalService::new(self.store).close_arrival(principal, body.patient_id)
        })
    }

    pub fn waiting_arrivals(&self, ctx: &RequestContext) -> ApiResponse {
        self.handle("waiting_arrivals", ctx, STATUS_OK, |principal| {
            ArrivalService::new(self.store).list_waiting(principal)
        })
    }

    /// Body: `{"boxId", "pacienteId", "tiempoEstimado"}`.
    pub fn assign_box(&self, ctx: &RequestContext, payload: &str) -> ApiResponse {
        self.handle("assign_box", ctx, STATUS_OK, |principal| {
            let request: AssignBoxRequest = parse_body(payload)?;
            AssignmentService::new(self.store).assign_box(principal, request)
        })
    }

    /// Body: `{"pacienteId", "operations": [{"operation", "field", "value", "arrayFilters"}]}`.
    pub fn apply_batch(&self, ctx: &RequestContext, payload: &str) -> ApiResponse {
        self.handle("apply_batch", ctx, STATUS_OK, |principal| {
            let body: BatchBody = parse_body(payload)?;
            BatchService::new(self.store).apply_batch(principal, body.patient_id, &body.operations)
        })
    }

    pub fn today_encounter(&self, ctx: &RequestContext, payload: &str) -> ApiResponse {
        self.handle("today_encounter", ctx, STATUS_OK, |principal| {
            let body: TodayEncounterBody = parse_body(payload)?;
            EncounterService::new(self.store, self.observation_format.as_str()).today_encounter(
                principal,
                body.patient_id,
                body.professional_id,
            )
        })
    }

    pub fn finalize_encounter(&self, ctx: &RequestContext, payload: &str) -> ApiResponse {
        self.handle("finalize_encounter", ctx, STATUS_OK, |principal| {
            let body: FinalizeBody = parse_body(payload)?;
            EncounterService::new(self.store, self.observation_format.as_str())
                .finalize_encounter(principal, body.encounter_id, body.notes)
        })
    }

    /// Body: `{"pacienteId", "profesionalId"?, "fichaId"?, "motivo"?, "observaciones"?}`.
    pub fn create_snapshot(&self, ctx: &RequestContext, payload: &str) -> ApiResponse {
        self.handle("create_snapshot", ctx, STATUS_CREATED, |principal| {
            let body: SnapshotBody = parse_body(payload)?;
            SnapshotService::new(self.store, self.observation_format.as_str()).create_snapshot(
                principal,
                SnapshotRequest {
                    patient_id: body.patient_id,
                    professional_id: body.professional_id,
                    encounter_id: body.encounter_id,
                    reason: body.reason,
                    notes: body.notes,
                },
            )
        })
    }

    pub fn patient_history(&self, ctx: &RequestContext, payload: &str) -> ApiResponse {
        self.handle("patient_history", ctx, STATUS_OK, |principal| {
            let body: PatientBody = parse_body(payload)?;
            SnapshotService::new(self.store, self.observation_format.as_str())
                .list_snapshots(principal, body.patient_id)
        })
    }

    pub fn panoramic(&self, ctx: &RequestContext) -> ApiResponse {
        self.handle("panoramic", ctx, STATUS_OK, |principal| {
            PanoramicService::new(self.store).panoramic(principal)
        })
    }

    pub fn reset_clinic_day(&self, ctx: &RequestContext) -> ApiResponse {
        self.handle("reset_clinic_day", ctx, STATUS_OK, |principal| {
            AdminService::new(self.store).reset_clinic_day(principal)
        })
    }

    fn handle<T: Serialize>(
        &self,
        endpoint: &'static str,
        ctx: &RequestContext,
        success_status: u16,
        call: impl FnOnce(&Principal) -> ClinicResult<T>,
    ) -> ApiResponse {
        let started_at = Instant::now();
        let result = self
            .gate
            .resolve(ctx)
            .map_err(ClinicError::from)
            .and_then(|principal| call(&principal))
            .and_then(|value| {
                serde_json::to_value(value).map_err(|err| {
                    ClinicError::Persistence(RepoError::InvalidData(format!(
                        "response encoding failed: {err}"
                    )))
                })
            });

        match result {
            Ok(body) => {
                info!(
                    "event=api_call module=api status=ok endpoint={endpoint} http_status={success_status} duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                ApiResponse {
                    status: success_status,
                    body,
                }
            }
            Err(err) => {
                error!(
                    "event=api_call module=api status=error endpoint={endpoint} http_status={} error_code={} duration_ms={}",
                    err.status_code(),
                    err.error_code(),
                    started_at.elapsed().as_millis()
                );
                ApiResponse::failure(&err)
            }
        }
    }
}

fn parse_body<T: DeserializeOwned>(payload: &str) -> ClinicResult<T> {
    serde_json::from_str(payload)
        .map_err(|err| ClinicError::Validation(format!("invalid request body: {err}")))
}

#[cfg(test)]
mod tests {
    use super::ClinicApi;
    use clinic_core::db::open_db_in_memory;
    use clinic_core::repo::{BoxRepository, ProfessionalRepository};
    use clinic_core::{
        ClinicConfig, Principal, Professional, RequestContext, Role, SqliteStore,
        StaticAccessGate, TreatmentBox,
    };
    use rusqlite::Connection;
    use serde_json::{json, Value};

    const DOCTOR: &str = "token-doctor";
    const FRONT: &str = "token-front";
    const ADMIN: &str = "token-admin";

    fn gate() -> StaticAccessGate {
        StaticAccessGate::new()
            .with_token(DOCTOR, Principal::new("dr-soto", Role::Professional))
            .with_token(FRONT, Principal::new("front-desk", Role::Receptionist))
            .with_token(ADMIN, Principal::new("ops", Role::Administrator))
    }

    fn seeded() -> (Connection, String) {
        let conn = open_db_in_memory().expect("db");
        let store = SqliteStore::try_new(&conn).expect("store");
        store
            .insert_professional(&Professional::new("dr-soto", "Dra. Soto", "endodoncia", 0))
            .expect("professional");
        let treatment_box = TreatmentBox::new(1, "Box 1", 0);
        store.insert_box(&treatment_box).expect("box");
        (conn, treatment_box.id.to_string())
    }

    fn register(api: &ClinicApi<'_, StaticAccessGate>) -> String {
        let response = api.register_arrival(
            &RequestContext::bearer(FRONT),
            r#"{"paciente": {"rut": "11.111.111-1", "nombre": "Ana", "apellidos": "Rojas"}}"#,
        );
        assert_eq!(response.status, 201, "{}", response.body);
        response.body["patient_id"]
            .as_str()
            .expect("patient id")
            .to_string()
    }

    #[test]
    fn missing_token_is_401_before_body_is_read() {
        let (conn, _) = seeded();
        let api = ClinicApi::try_new(&conn, gate(), &ClinicConfig::default()).expect("api");
        let response = api.register_arrival(&RequestContext::anonymous(), "not json");
        assert_eq!(response.status, 401);
        assert!(response.body["error"].is_string());
    }

    #[test]
    fn malformed_body_is_400() {
        let (conn, _) = seeded();
        let api = ClinicApi::try_new(&conn, gate(), &ClinicConfig::default()).expect("api");
        let response = api.assign_box(&RequestContext::bearer(DOCTOR), "{");
        assert_eq!(response.status, 400);
    }

    #[test]
    fn second_arrival_is_409() {
        let (conn, _) = seeded();
        let api = ClinicApi::try_new(&conn, gate(), &ClinicConfig::default()).expect("api");
        let patient_id = register(&api);
        let response = api.register_arrival(
            &RequestContext::bearer(FRONT),
            &json!({ "pacienteId": patient_id }).to_string(),
        );
        assert_eq!(response.status, 409);
    }

    #[test]
    fn receptionist_cannot_snapshot() {
        let (conn, _) = seeded();
        let api = ClinicApi::try_new(&conn, gate(), &ClinicConfig::default()).expect("api");
        let patient_id = register(&api);
        let response = api.create_snapshot(
            &RequestContext::bearer(FRONT),
            &json!({ "pacienteId": patient_id }).to_string(),
        );
        assert_eq!(response.status, 403);
    }

    #[test]
    fn assign_batch_and_snapshot_flow() {
        let (conn, box_id) = seeded();
        let api = ClinicApi::try_new(&conn, gate(), &ClinicConfig::default()).expect("api");
        let patient_id = register(&api);

        let assigned = api.assign_box(
            &RequestContext::bearer(DOCTOR),
            &json!({ "boxId": box_id, "pacienteId": patient_id, "tiempoEstimado": 30 })
                .to_string(),
        );
        assert_eq!(assigned.status, 200, "{}", assigned.body);
        let start = assigned.body["inicio"].as_i64().expect("inicio");
        assert_eq!(assigned.body["termino"].as_i64(), Some(start + 30 * 60_000));

        let batch = api.apply_batch(
            &RequestContext::bearer(DOCTOR),
            &json!({
                "pacienteId": patient_id,
                "operations": [
                    { "operation": "set", "field": "alergias", "value": ["polen"] },
                    { "operation": "rename", "field": "alergias", "value": "x" },
                    { "operation": "push", "field": "prescriptions", "value": "ibuprofeno" }
                ]
            })
            .to_string(),
        );
        assert_eq!(batch.status, 200);
        assert_eq!(batch.body["success"], Value::Bool(false));
        assert_eq!(batch.body["failed"], json!(1));
        assert_eq!(batch.body["errors"][0]["index"], json!(1));

        let snapshot = api.create_snapshot(
            &RequestContext::bearer(DOCTOR),
            &json!({ "pacienteId": patient_id, "fichaId": assigned.body["fichaId"] }).to_string(),
        );
        assert_eq!(snapshot.status, 201, "{}", snapshot.body);
        assert_eq!(
            snapshot.body["medical_history"]["allergies"],
            json!(["polen"])
        );
        assert_eq!(
            snapshot.body["encounter_data"]["prescriptions"],
            json!(["ibuprofeno"])
        );

        let board = api.panoramic(&RequestContext::bearer(ADMIN));
        assert_eq!(board.status, 200);
        assert_eq!(board.body["boxes"][0]["occupied"], Value::Bool(true));
        assert_eq!(board.body["boxes"][0]["patientName"], json!("Ana Rojas"));
    }

    #[test]
    fn reset_is_administrator_only() {
        let (conn, _) = seeded();
        let api = ClinicApi::try_new(&conn, gate(), &ClinicConfig::default()).expect("api");
        register(&api);
        assert_eq!(api.reset_clinic_day(&RequestContext::bearer(DOCTOR)).status, 403);

        let reset = api.reset_clinic_day(&RequestContext::bearer(ADMIN));
        assert_eq!(reset.status, 200);
        assert_eq!(reset.body["arrivalsClosed"], json!(1));
    }
}
