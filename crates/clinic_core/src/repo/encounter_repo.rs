//! Encounter persistence.
//!
//! # Invariants
//! - At most one open encounter per (patient, professional-or-none, day);
//!   a second insert fails with `ConstraintViolation`.
//! - "Latest prior" ordering is `day DESC, created_at DESC, id DESC`.

use crate::model::encounter::{Encounter, EncounterId, EncounterStatus};
use crate::model::patient::PatientId;
use crate::model::professional::ProfessionalId;
use crate::model::EntityKind;
use crate::repo::{
    list_from_json, list_to_json, parse_optional_uuid, parse_uuid, RepoError, RepoResult,
    SqliteStore,
};
use rusqlite::{params, OptionalExtension, Row};

const ENCOUNTER_SELECT_SQL: &str = "SELECT
    id,
    patient_id,
    professional_id,
    day,
    status,
    anamnesis,
    requested_exams,
    instructions,
    prescriptions,
    treatment,
    exams,
    version,
    created_at,
    updated_at,
    closed_at
FROM encounters";

pub trait EncounterRepository {
    fn insert_encounter(&self, encounter: &Encounter) -> RepoResult<()>;
    fn get_encounter(&self, id: EncounterId) -> RepoResult<Option<Encounter>>;
    /// Open encounter for the exact (patient, professional, day) key;
    /// `None` professional matches only professional-less encounters.
    fn find_open_encounter(
        &self,
        patient_id: PatientId,
        professional_id: Option<ProfessionalId>,
        day: &str,
    ) -> RepoResult<Option<Encounter>>;
    /// Every open encounter of the patient on `day`, whoever owns it,
    /// oldest first.
    fn list_open_encounters_for_day(
        &self,
        patient_id: PatientId,
        day: &str,
    ) -> RepoResult<Vec<Encounter>>;
    /// Most recent encounter of the patient dated strictly before `day`,
    /// across all professionals and statuses.
    fn find_latest_prior_encounter(
        &self,
        patient_id: PatientId,
        before_day: &str,
    ) -> RepoResult<Option<Encounter>>;
    /// Compare-and-swap update on `version`; returns the stored row.
    fn update_encounter(&self, encounter: &Encounter, now_ms: i64) -> RepoResult<Encounter>;
}

impl EncounterRepository for SqliteStore<'_> {
    fn insert_encounter(&self, encounter: &Encounter) -> RepoResult<()> {
        encounter.validate()?;

        self.conn().execute(
            "INSERT INTO encounters (
                id,
                patient_id,
                professional_id,
                day,
                status,
                anamnesis,
                requested_exams,
                instructions,
                prescriptions,
                treatment,
                exams,
                version,
                created_at,
                updated_at,
                closed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15);",
            params![
                encounter.id.to_string(),
                encounter.patient_id.to_string(),
                encounter.professional_id.map(|id| id.to_string()),
                encounter.day.as_str(),
                encounter.status.as_str(),
                encounter.anamnesis.as_str(),
                list_to_json(&encounter.requested_exams, "encounters.requested_exams")?,
                encounter.instructions.as_str(),
                list_to_json(&encounter.prescriptions, "encounters.prescriptions")?,
                encounter.treatment.as_str(),
                list_to_json(&encounter.exams, "encounters.exams")?,
                encounter.version,
                encounter.created_at,
                encounter.updated_at,
                encounter.closed_at,
            ],
        )?;
        Ok(())
    }

    fn get_encounter(&self, id: EncounterId) -> RepoResult<Option<Encounter>> {
        self.conn()
            .query_row(
                &format!("{ENCOUNTER_SELECT_SQL} WHERE id = ?1;"),
                [id.to_string()],
                |row| Ok(parse_encounter_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn find_open_encounter(
        &self,
        patient_id: PatientId,
        professional_id: Option<ProfessionalId>,
        day: &str,
    ) -> RepoResult<Option<Encounter>> {
        self.conn()
            .query_row(
                &format!(
                    "{ENCOUNTER_SELECT_SQL}
                     WHERE patient_id = ?1
                       AND IFNULL(professional_id, '') = ?2
                       AND day = ?3
                       AND status = 'open'
                     LIMIT 1;"
                ),
                params![
                    patient_id.to_string(),
                    professional_id.map(|id| id.to_string()).unwrap_or_default(),
                    day,
                ],
                |row| Ok(parse_encounter_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn list_open_encounters_for_day(
        &self,
        patient_id: PatientId,
        day: &str,
    ) -> RepoResult<Vec<Encounter>> {
        let mut stmt = self.conn().prepare(&format!(
            "{ENCOUNTER_SELECT_SQL}
             WHERE patient_id = ?1
               AND day = ?2
               AND status = 'open'
             ORDER BY created_at ASC, id ASC;"
        ))?;
        let mut rows = stmt.query(params![patient_id.to_string(), day])?;
        let mut encounters = Vec::new();
        while let Some(row) = rows.next()? {
            encounters.push(parse_encounter_row(row)?);
        }
        Ok(encounters)
    }

    fn find_latest_prior_encounter(
        &self,
        patient_id: PatientId,
        before_day: &str,
    ) -> RepoResult<Option<Encounter>> {
        self.conn()
            .query_row(
                &format!(
                    "{ENCOUNTER_SELECT_SQL}
                     WHERE patient_id = ?1
                       AND day < ?2
                     ORDER BY day DESC, created_at DESC, id DESC
                     LIMIT 1;"
                ),
                params![patient_id.to_string(), before_day],
                |row| Ok(parse_encounter_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn update_encounter(&self, encounter: &Encounter, now_ms: i64) -> RepoResult<Encounter> {
        encounter.validate()?;

        let changed = self.conn().execute(
            "UPDATE encounters
             SET
                professional_id = ?1,
                status = ?2,
                anamnesis = ?3,
                requested_exams = ?4,
                instructions = ?5,
                prescriptions = ?6,
                treatment = ?7,
                exams = ?8,
                closed_at = ?9,
                version = version + 1,
                updated_at = ?10
             WHERE id = ?11 AND version = ?12;",
            params![
                encounter.professional_id.map(|id| id.to_string()),
                encounter.status.as_str(),
                encounter.anamnesis.as_str(),
                list_to_json(&encounter.requested_exams, "encounters.requested_exams")?,
                encounter.instructions.as_str(),
                list_to_json(&encounter.prescriptions, "encounters.prescriptions")?,
                encounter.treatment.as_str(),
                list_to_json(&encounter.exams, "encounters.exams")?,
                encounter.closed_at,
                now_ms,
                encounter.id.to_string(),
                encounter.version,
            ],
        )?;

        if changed == 0 {
            return Err(match self.get_encounter(encounter.id)? {
                Some(_) => RepoError::StaleWrite {
                    entity: EntityKind::Encounter,
                    id: encounter.id.to_string(),
                    expected_version: encounter.version,
                },
                None => RepoError::not_found(EntityKind::Encounter, encounter.id),
            });
        }

        self.get_encounter(encounter.id)?
            .ok_or_else(|| RepoError::not_found(EntityKind::Encounter, encounter.id))
    }
}

fn parse_encounter_row(row: &Row<'_>) -> RepoResult<Encounter> {
    let id_text: String = row.get("id")?;
    let patient_text: String = row.get("patient_id")?;
    let status_text: String = row.get("status")?;
    let status = EncounterStatus::parse(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid status `{status_text}` in encounters.status"
        ))
    })?;

    let encounter = Encounter {
        id: parse_uuid(&id_text, "encounters.id")?,
        patient_id: parse_uuid(&patient_text, "encounters.patient_id")?,
        professional_id: parse_optional_uuid(
            row.get("professional_id")?,
            "encounters.professional_id",
        )?,
        day: row.get("day")?,
        status,
        anamnesis: row.get("anamnesis")?,
        requested_exams: list_from_json(
            &row.get::<_, String>("requested_exams")?,
            "encounters.requested_exams",
        )?,
        instructions: row.get("instructions")?,
        prescriptions: list_from_json(
            &row.get::<_, String>("prescriptions")?,
            "encounters.prescriptions",
        )?,
        treatment: row.get("treatment")?,
        exams: list_from_json(&row.get::<_, String>("exams")?, "encounters.exams")?,
        version: row.get("version")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        closed_at: row.get("closed_at")?,
    };
    encounter.validate()?;
    Ok(encounter)
}
