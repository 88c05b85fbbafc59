#![allow(dead_code)]

use clinic_core::clock::now_epoch_ms;
use clinic_core::repo::{BoxRepository, PatientRepository, ProfessionalRepository};
use clinic_core::{
    open_db_in_memory, ArrivalService, ArrivalSubject, NewPatient, Patient, Principal,
    Professional, Role, SqliteStore, TreatmentBox,
};
use rusqlite::Connection;

pub const DENTIST_PRINCIPAL: &str = "dr-rojas";
pub const FRONT_DESK_PRINCIPAL: &str = "desk-1";
pub const ADMIN_PRINCIPAL: &str = "admin-1";

pub fn migrated_conn() -> Connection {
    open_db_in_memory().unwrap()
}

pub fn store(conn: &Connection) -> SqliteStore<'_> {
    SqliteStore::try_new(conn).unwrap()
}

pub fn dentist() -> Principal {
    Principal::new(DENTIST_PRINCIPAL, Role::Professional)
}

pub fn front_desk() -> Principal {
    Principal::new(FRONT_DESK_PRINCIPAL, Role::Receptionist)
}

pub fn admin() -> Principal {
    Principal::new(ADMIN_PRINCIPAL, Role::Administrator)
}

pub fn intake(identity_number: &str, first_name: &str) -> NewPatient {
    NewPatient {
        identity_number: identity_number.to_string(),
        first_name: first_name.to_string(),
        last_name: "Soto".to_string(),
        ..NewPatient::default()
    }
}

pub fn seed_professional(store: &SqliteStore<'_>, principal_id: &str) -> Professional {
    let professional = Professional::new(principal_id, "Camila Rojas", "odontologia", now_epoch_ms());
    store.insert_professional(&professional).unwrap();
    professional
}

pub fn seed_box(store: &SqliteStore<'_>, number: u32) -> TreatmentBox {
    let treatment_box = TreatmentBox::new(number, format!("Box {number}"), now_epoch_ms());
    store.insert_box(&treatment_box).unwrap();
    treatment_box
}

pub fn seed_patient(store: &SqliteStore<'_>, identity_number: &str) -> Patient {
    let patient = Patient::from_new(intake(identity_number, "Ana"), now_epoch_ms());
    store.insert_patient(&patient).unwrap();
    patient
}

/// Registers an arrival for a new patient and returns the stored patient.
pub fn arrived_patient(store: &SqliteStore<'_>, identity_number: &str) -> Patient {
    let arrival = ArrivalService::new(*store)
        .register_arrival(
            &front_desk(),
            ArrivalSubject::New(intake(identity_number, "Ana")),
        )
        .unwrap();
    store.get_patient(arrival.patient_id).unwrap().unwrap()
}

pub fn count_rows(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}
