//! Patient persistence.
//!
//! # Invariants
//! - `identity_number` is stored in normalized form and is unique.
//! - List-valued fields are JSON arrays of strings; hygiene is a JSON object
//!   or NULL.

use crate::model::patient::{HygieneRecord, Patient, PatientId};
use crate::model::EntityKind;
use crate::repo::{
    from_json_text, list_from_json, list_to_json, parse_uuid, to_json_text, RepoError,
    RepoResult, SqliteStore,
};
use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension, Row};

const PATIENT_SELECT_SQL: &str = "SELECT
    id,
    identity_number,
    first_name,
    last_name,
    birth_date,
    sex,
    phone,
    email,
    address,
    health_plan,
    occupation,
    allergies,
    medications,
    conditions,
    surgeries,
    family_history,
    weight_kg,
    height_cm,
    hygiene,
    version,
    created_at,
    updated_at
FROM patients";

pub trait PatientRepository {
    fn insert_patient(&self, patient: &Patient) -> RepoResult<()>;
    fn get_patient(&self, id: PatientId) -> RepoResult<Option<Patient>>;
    /// Looks up by an already-normalized identity number.
    fn find_patient_by_identity(&self, identity_number: &str) -> RepoResult<Option<Patient>>;
    /// Writes every mutable column when `patient.version` matches storage,
    /// then returns the stored row with its bumped version.
    fn update_patient(&self, patient: &Patient, now_ms: i64) -> RepoResult<Patient>;
}

impl PatientRepository for SqliteStore<'_> {
    fn insert_patient(&self, patient: &Patient) -> RepoResult<()> {
        patient.validate()?;
        let columns = EncodedLists::from_patient(patient)?;

        self.conn().execute(
            "INSERT INTO patients (
                id,
                identity_number,
                first_name,
                last_name,
                birth_date,
                sex,
                phone,
                email,
                address,
                health_plan,
                occupation,
                allergies,
                medications,
                conditions,
                surgeries,
                family_history,
                weight_kg,
                height_cm,
                hygiene,
                version,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22);",
            params![
                patient.id.to_string(),
                patient.identity_number.as_str(),
                patient.first_name.as_str(),
                patient.last_name.as_str(),
                birth_date_to_db(patient.birth_date),
                patient.sex.as_deref(),
                patient.phone.as_deref(),
                patient.email.as_deref(),
                patient.address.as_deref(),
                patient.health_plan.as_deref(),
                patient.occupation.as_deref(),
                columns.allergies,
                columns.medications,
                columns.conditions,
                columns.surgeries,
                columns.family_history,
                patient.weight_kg,
                patient.height_cm,
                columns.hygiene,
                patient.version,
                patient.created_at,
                patient.updated_at,
            ],
        )?;
        Ok(())
    }

    fn get_patient(&self, id: PatientId) -> RepoResult<Option<Patient>> {
        self.conn()
            .query_row(
                &format!("{PATIENT_SELECT_SQL} WHERE id = ?1;"),
                [id.to_string()],
                |row| Ok(parse_patient_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn find_patient_by_identity(&self, identity_number: &str) -> RepoResult<Option<Patient>> {
        self.conn()
            .query_row(
                &format!("{PATIENT_SELECT_SQL} WHERE identity_number = ?1;"),
                [identity_number],
                |row| Ok(parse_patient_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn update_patient(&self, patient: &Patient, now_ms: i64) -> RepoResult<Patient> {
        patient.validate()?;
        let columns = EncodedLists::from_patient(patient)?;

        let changed = self.conn().execute(
            "UPDATE patients
             SET
                first_name = ?1,
                last_name = ?2,
                birth_date = ?3,
                sex = ?4,
                phone = ?5,
                email = ?6,
                address = ?7,
                health_plan = ?8,
                occupation = ?9,
                allergies = ?10,
                medications = ?11,
                conditions = ?12,
                surgeries = ?13,
                family_history = ?14,
                weight_kg = ?15,
                height_cm = ?16,
                hygiene = ?17,
                version = version + 1,
                updated_at = ?18
             WHERE id = ?19 AND version = ?20;",
            params![
                patient.first_name.as_str(),
                patient.last_name.as_str(),
                birth_date_to_db(patient.birth_date),
                patient.sex.as_deref(),
                patient.phone.as_deref(),
                patient.email.as_deref(),
                patient.address.as_deref(),
                patient.health_plan.as_deref(),
                patient.occupation.as_deref(),
                columns.allergies,
                columns.medications,
                columns.conditions,
                columns.surgeries,
                columns.family_history,
                patient.weight_kg,
                patient.height_cm,
                columns.hygiene,
                now_ms,
                patient.id.to_string(),
                patient.version,
            ],
        )?;

        if changed == 0 {
            return Err(match self.get_patient(patient.id)? {
                Some(_) => RepoError::StaleWrite {
                    entity: EntityKind::Patient,
                    id: patient.id.to_string(),
                    expected_version: patient.version,
                },
                None => RepoError::not_found(EntityKind::Patient, patient.id),
            });
        }

        self.get_patient(patient.id)?
            .ok_or_else(|| RepoError::not_found(EntityKind::Patient, patient.id))
    }
}

struct EncodedLists {
    allergies: String,
    medications: String,
    conditions: String,
    surgeries: String,
    family_history: String,
    hygiene: Option<String>,
}

impl EncodedLists {
    fn from_patient(patient: &Patient) -> RepoResult<Self> {
        Ok(Self {
            allergies: list_to_json(&patient.allergies, "patients.allergies")?,
            medications: list_to_json(&patient.medications, "patients.medications")?,
            conditions: list_to_json(&patient.conditions, "patients.conditions")?,
            surgeries: list_to_json(&patient.surgeries, "patients.surgeries")?,
            family_history: list_to_json(&patient.family_history, "patients.family_history")?,
            hygiene: patient
                .hygiene
                .as_ref()
                .map(|hygiene| to_json_text(hygiene, "patients.hygiene"))
                .transpose()?,
        })
    }
}

fn birth_date_to_db(value: Option<NaiveDate>) -> Option<String> {
    value.map(|date| date.format("%Y-%m-%d").to_string())
}

fn parse_patient_row(row: &Row<'_>) -> RepoResult<Patient> {
    let id_text: String = row.get("id")?;
    let birth_date = match row.get::<_, Option<String>>("birth_date")? {
        Some(text) => Some(NaiveDate::parse_from_str(&text, "%Y-%m-%d").map_err(|_| {
            RepoError::InvalidData(format!("invalid date `{text}` in patients.birth_date"))
        })?),
        None => None,
    };
    let hygiene = match row.get::<_, Option<String>>("hygiene")? {
        Some(text) => Some(from_json_text::<HygieneRecord>(&text, "patients.hygiene")?),
        None => None,
    };

    let patient = Patient {
        id: parse_uuid(&id_text, "patients.id")?,
        identity_number: row.get("identity_number")?,
        first_name: row.get("first_name")?,
        last_name: row.get("last_name")?,
        birth_date,
        sex: row.get("sex")?,
        phone: row.get("phone")?,
        email: row.get("email")?,
        address: row.get("address")?,
        health_plan: row.get("health_plan")?,
        occupation: row.get("occupation")?,
        allergies: list_from_json(&row.get::<_, String>("allergies")?, "patients.allergies")?,
        medications: list_from_json(
            &row.get::<_, String>("medications")?,
            "patients.medications",
        )?,
        conditions: list_from_json(&row.get::<_, String>("conditions")?, "patients.conditions")?,
        surgeries: list_from_json(&row.get::<_, String>("surgeries")?, "patients.surgeries")?,
        family_history: list_from_json(
            &row.get::<_, String>("family_history")?,
            "patients.family_history",
        )?,
        weight_kg: row.get("weight_kg")?,
        height_cm: row.get("height_cm")?,
        hygiene,
        version: row.get("version")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    };
    patient.validate()?;
    Ok(patient)
}
