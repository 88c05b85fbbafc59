mod common;

use clinic_core::clock::{is_valid_timestamp_format, now_epoch_ms};
use clinic_core::model::snapshot::UNASSIGNED_SPECIALTY;
use clinic_core::repo::{EncounterRepository, SnapshotRepository};
use clinic_core::{
    BatchService, ClinicError, Encounter, EncounterService, EncounterStatus, FieldOperation,
    SnapshotReason, SnapshotRequest, SnapshotService,
};
use common::{
    count_rows, dentist, front_desk, migrated_conn, seed_patient, seed_professional, store,
    DENTIST_PRINCIPAL,
};
use serde_json::json;

const OBSERVATION_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

fn manual(patient_id: uuid::Uuid) -> SnapshotRequest {
    SnapshotRequest {
        patient_id,
        professional_id: None,
        encounter_id: None,
        reason: SnapshotReason::Manual,
        notes: None,
    }
}

#[test]
fn snapshot_after_batch_reflects_written_values() {
    let conn = migrated_conn();
    let store = store(&conn);
    let patient = seed_patient(&store, "12345678-5");

    BatchService::new(store)
        .apply_batch(
            &dentist(),
            patient.id,
            &[
                FieldOperation::new("set", "alergias", Some(json!(["polen"]))),
                FieldOperation::new("set", "ocupacion", Some(json!("profesora"))),
            ],
        )
        .unwrap();
    let snapshot = SnapshotService::new(store, OBSERVATION_FORMAT)
        .create_snapshot(&dentist(), manual(patient.id))
        .unwrap();

    assert_eq!(snapshot.medical_history.allergies, vec!["polen".to_string()]);
    assert_eq!(snapshot.patient_data.occupation.as_deref(), Some("profesora"));
    assert_eq!(snapshot.actor_id, DENTIST_PRINCIPAL);
    assert_eq!(snapshot.specialty, UNASSIGNED_SPECIALTY);
}

#[test]
fn two_snapshots_are_distinct_with_increasing_timestamps() {
    let conn = migrated_conn();
    let store = store(&conn);
    let patient = seed_patient(&store, "12345678-5");
    let service = SnapshotService::new(store, OBSERVATION_FORMAT);

    let first = service
        .create_snapshot(&dentist(), manual(patient.id))
        .unwrap();
    let second = service
        .create_snapshot(&dentist(), manual(patient.id))
        .unwrap();

    assert_ne!(first.id, second.id);
    assert!(second.created_at > first.created_at);

    let listed = service.list_snapshots(&dentist(), patient.id).unwrap();
    let ids: Vec<_> = listed.iter().map(|snapshot| snapshot.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);
    assert_eq!(service.get_snapshot(&dentist(), first.id).unwrap(), first);
    assert_eq!(service.get_snapshot(&dentist(), second.id).unwrap(), second);
}

#[test]
fn blank_notes_become_timestamp_observations() {
    let conn = migrated_conn();
    let store = store(&conn);
    let patient = seed_patient(&store, "12345678-5");

    let mut request = manual(patient.id);
    request.notes = Some("   ".to_string());
    let snapshot = SnapshotService::new(store, OBSERVATION_FORMAT)
        .create_snapshot(&dentist(), request)
        .unwrap();

    assert!(!snapshot.observations.trim().is_empty());
    assert!(is_valid_timestamp_format(OBSERVATION_FORMAT));
    assert_eq!(snapshot.observations.len(), "19/10/2026 09:30:00".len());
}

#[test]
fn professional_snapshot_records_specialty_and_encounter() {
    let conn = migrated_conn();
    let store = store(&conn);
    let professional = seed_professional(&store, DENTIST_PRINCIPAL);
    let patient = seed_patient(&store, "12345678-5");
    let mut encounter = Encounter::open(
        patient.id,
        Some(professional.id),
        "2026-10-19",
        now_epoch_ms(),
    );
    encounter.anamnesis = "sensibilidad".to_string();
    store.insert_encounter(&encounter).unwrap();

    let snapshot = SnapshotService::new(store, OBSERVATION_FORMAT)
        .create_snapshot(
            &dentist(),
            SnapshotRequest {
                patient_id: patient.id,
                professional_id: Some(professional.id),
                encounter_id: Some(encounter.id),
                reason: SnapshotReason::Audit,
                notes: Some("revision".to_string()),
            },
        )
        .unwrap();

    assert_eq!(snapshot.specialty, professional.specialty);
    assert_eq!(snapshot.observations, "revision");
    let narrative = snapshot.encounter_data.expect("narrative should be copied");
    assert_eq!(narrative.anamnesis, "sensibilidad");
}

#[test]
fn encounter_of_another_patient_is_rejected() {
    let conn = migrated_conn();
    let store = store(&conn);
    let owner = seed_patient(&store, "11111111-1");
    let other = seed_patient(&store, "22222222-2");
    let encounter = Encounter::open(owner.id, None, "2026-10-19", now_epoch_ms());
    store.insert_encounter(&encounter).unwrap();

    let mut request = manual(other.id);
    request.encounter_id = Some(encounter.id);
    let err = SnapshotService::new(store, OBSERVATION_FORMAT)
        .create_snapshot(&dentist(), request)
        .unwrap_err();

    assert_eq!(err.status_code(), 400);
    assert_eq!(count_rows(&conn, "history_snapshots"), 0);
}

#[test]
fn missing_references_are_not_found() {
    let conn = migrated_conn();
    let store = store(&conn);
    let patient = seed_patient(&store, "12345678-5");
    let service = SnapshotService::new(store, OBSERVATION_FORMAT);

    let err = service
        .create_snapshot(&dentist(), manual(uuid::Uuid::new_v4()))
        .unwrap_err();
    assert_eq!(err.status_code(), 404);

    let mut request = manual(patient.id);
    request.professional_id = Some(uuid::Uuid::new_v4());
    let err = service.create_snapshot(&dentist(), request).unwrap_err();
    assert_eq!(err.status_code(), 404);

    let err = service
        .list_snapshots(&dentist(), uuid::Uuid::new_v4())
        .unwrap_err();
    assert_eq!(err.status_code(), 404);
    assert_eq!(count_rows(&conn, "history_snapshots"), 0);
}

#[test]
fn receptionist_cannot_archive_or_read_history() {
    let conn = migrated_conn();
    let store = store(&conn);
    let patient = seed_patient(&store, "12345678-5");
    let service = SnapshotService::new(store, OBSERVATION_FORMAT);

    let err = service
        .create_snapshot(&front_desk(), manual(patient.id))
        .unwrap_err();
    assert!(matches!(err, ClinicError::Forbidden { .. }));
    let err = service.list_snapshots(&front_desk(), patient.id).unwrap_err();
    assert_eq!(err.status_code(), 403);
}

#[test]
fn finalize_closes_encounter_and_archives_it_once() {
    let conn = migrated_conn();
    let store = store(&conn);
    let professional = seed_professional(&store, DENTIST_PRINCIPAL);
    let patient = seed_patient(&store, "12345678-5");
    let encounter = Encounter::open(
        patient.id,
        Some(professional.id),
        "2026-10-19",
        now_epoch_ms(),
    );
    store.insert_encounter(&encounter).unwrap();
    let service = EncounterService::new(store, OBSERVATION_FORMAT);

    let snapshot = service
        .finalize_encounter(&dentist(), encounter.id, Some("alta".to_string()))
        .unwrap();

    assert_eq!(snapshot.reason, SnapshotReason::EncounterFinalized);
    assert_eq!(snapshot.encounter_id, Some(encounter.id));
    let stored = store.get_encounter(encounter.id).unwrap().unwrap();
    assert_eq!(stored.status, EncounterStatus::Closed);
    assert!(stored.closed_at.is_some());

    let err = service
        .finalize_encounter(&dentist(), encounter.id, None)
        .unwrap_err();
    assert_eq!(err.status_code(), 409);
    assert_eq!(store.list_snapshots(patient.id).unwrap().len(), 1);
}

#[test]
fn stored_snapshots_cannot_be_rewritten() {
    let conn = migrated_conn();
    let store = store(&conn);
    let patient = seed_patient(&store, "12345678-5");
    let snapshot = SnapshotService::new(store, OBSERVATION_FORMAT)
        .create_snapshot(&dentist(), manual(patient.id))
        .unwrap();

    let result = conn.execute(
        "UPDATE history_snapshots SET observations = 'edited' WHERE id = ?1;",
        [snapshot.id.to_string()],
    );

    assert!(result.is_err());
    assert_eq!(
        store.get_snapshot(snapshot.id).unwrap().unwrap().observations,
        snapshot.observations
    );
}

#[test]
fn malformed_observation_format_still_archives() {
    let conn = migrated_conn();
    let store = store(&conn);
    let patient = seed_patient(&store, "12345678-5");

    let snapshot = SnapshotService::new(store, "%Q")
        .create_snapshot(&dentist(), manual(patient.id))
        .unwrap();

    assert!(!snapshot.observations.trim().is_empty());
    assert_eq!(count_rows(&conn, "history_snapshots"), 1);
}
