//! Append-only history snapshot persistence.
//!
//! # Invariants
//! - This module only inserts and reads; table triggers reject UPDATE and
//!   DELETE from any caller.
//! - `created_at` is strictly increasing across the table: the stored value
//!   is `max(requested, latest + 1)`.

use crate::model::encounter::EncounterNarrative;
use crate::model::patient::PatientId;
use crate::model::snapshot::{
    HistorySnapshot, MedicalHistoryCopy, PatientRecordCopy, SnapshotId, SnapshotReason,
};
use crate::repo::{
    from_json_text, parse_optional_uuid, parse_uuid, to_json_text, RepoError, RepoResult,
    SqliteStore,
};
use rusqlite::{params, OptionalExtension, Row};

const SNAPSHOT_SELECT_SQL: &str = "SELECT
    id,
    patient_id,
    encounter_id,
    actor_id,
    professional_id,
    specialty,
    reason,
    observations,
    patient_data,
    medical_history,
    hygiene,
    encounter_data,
    created_at
FROM history_snapshots";

pub trait SnapshotRepository {
    /// Appends one snapshot and returns the `created_at` actually stored.
    fn append_snapshot(&self, snapshot: &HistorySnapshot) -> RepoResult<i64>;
    fn get_snapshot(&self, id: SnapshotId) -> RepoResult<Option<HistorySnapshot>>;
    /// Snapshots of one patient, newest first.
    fn list_snapshots(&self, patient_id: PatientId) -> RepoResult<Vec<HistorySnapshot>>;
}

impl SnapshotRepository for SqliteStore<'_> {
    fn append_snapshot(&self, snapshot: &HistorySnapshot) -> RepoResult<i64> {
        let encounter_data = snapshot
            .encounter_data
            .as_ref()
            .map(|narrative| to_json_text(narrative, "history_snapshots.encounter_data"))
            .transpose()?;

        let created_at = self.conn().query_row(
            "INSERT INTO history_snapshots (
                id,
                patient_id,
                encounter_id,
                actor_id,
                professional_id,
                specialty,
                reason,
                observations,
                patient_data,
                medical_history,
                hygiene,
                encounter_data,
                created_at
            )
            SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                MAX(?13, IFNULL((SELECT MAX(created_at) FROM history_snapshots) + 1, ?13))
            RETURNING created_at;",
            params![
                snapshot.id.to_string(),
                snapshot.patient_id.to_string(),
                snapshot.encounter_id.map(|id| id.to_string()),
                snapshot.actor_id.as_str(),
                snapshot.professional_id.map(|id| id.to_string()),
                snapshot.specialty.as_str(),
                snapshot.reason.as_str(),
                snapshot.observations.as_str(),
                to_json_text(&snapshot.patient_data, "history_snapshots.patient_data")?,
                to_json_text(&snapshot.medical_history, "history_snapshots.medical_history")?,
                to_json_text(&snapshot.hygiene, "history_snapshots.hygiene")?,
                encounter_data,
                snapshot.created_at,
            ],
            |row| row.get::<_, i64>(0),
        )?;
        Ok(created_at)
    }

    fn get_snapshot(&self, id: SnapshotId) -> RepoResult<Option<HistorySnapshot>> {
        self.conn()
            .query_row(
                &format!("{SNAPSHOT_SELECT_SQL} WHERE id = ?1;"),
                [id.to_string()],
                |row| Ok(parse_snapshot_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn list_snapshots(&self, patient_id: PatientId) -> RepoResult<Vec<HistorySnapshot>> {
        let mut stmt = self.conn().prepare(&format!(
            "{SNAPSHOT_SELECT_SQL}
             WHERE patient_id = ?1
             ORDER BY created_at DESC;"
        ))?;
        let mut rows = stmt.query([patient_id.to_string()])?;
        let mut snapshots = Vec::new();
        while let Some(row) = rows.next()? {
            snapshots.push(parse_snapshot_row(row)?);
        }
        Ok(snapshots)
    }
}

fn parse_snapshot_row(row: &Row<'_>) -> RepoResult<HistorySnapshot> {
    let id_text: String = row.get("id")?;
    let patient_text: String = row.get("patient_id")?;
    let reason_text: String = row.get("reason")?;
    let reason = SnapshotReason::parse(&reason_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid reason `{reason_text}` in history_snapshots.reason"
        ))
    })?;
    let encounter_data = match row.get::<_, Option<String>>("encounter_data")? {
        Some(text) => Some(from_json_text::<EncounterNarrative>(
            &text,
            "history_snapshots.encounter_data",
        )?),
        None => None,
    };

    Ok(HistorySnapshot {
        id: parse_uuid(&id_text, "history_snapshots.id")?,
        patient_id: parse_uuid(&patient_text, "history_snapshots.patient_id")?,
        encounter_id: parse_optional_uuid(
            row.get("encounter_id")?,
            "history_snapshots.encounter_id",
        )?,
        actor_id: row.get("actor_id")?,
        professional_id: parse_optional_uuid(
            row.get("professional_id")?,
            "history_snapshots.professional_id",
        )?,
        specialty: row.get("specialty")?,
        reason,
        observations: row.get("observations")?,
        patient_data: from_json_text::<PatientRecordCopy>(
            &row.get::<_, String>("patient_data")?,
            "history_snapshots.patient_data",
        )?,
        medical_history: from_json_text::<MedicalHistoryCopy>(
            &row.get::<_, String>("medical_history")?,
            "history_snapshots.medical_history",
        )?,
        hygiene: from_json_text(
            &row.get::<_, String>("hygiene")?,
            "history_snapshots.hygiene",
        )?,
        encounter_data,
        created_at: row.get("created_at")?,
    })
}
