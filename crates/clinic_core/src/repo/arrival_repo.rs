//! Arrival persistence.
//!
//! # Invariants
//! - At most one open arrival (`closed_at IS NULL`) per patient; a second
//!   open insert fails with `ConstraintViolation`.
//! - The waiting queue is ordered oldest arrival first.

use crate::model::arrival::{Arrival, ArrivalId};
use crate::model::patient::PatientId;
use crate::model::professional::ProfessionalId;
use crate::model::EntityKind;
use crate::repo::{parse_optional_uuid, parse_uuid, RepoError, RepoResult, SqliteStore};
use rusqlite::{params, OptionalExtension, Row};

const ARRIVAL_SELECT_SQL: &str = "SELECT
    id,
    patient_id,
    arrived_at,
    professional_id,
    attended_at,
    closed_at
FROM arrivals";

pub trait ArrivalRepository {
    fn insert_arrival(&self, arrival: &Arrival) -> RepoResult<()>;
    fn find_open_arrival(&self, patient_id: PatientId) -> RepoResult<Option<Arrival>>;
    /// Stamps the attending professional and attention instant.
    fn mark_attended(
        &self,
        id: ArrivalId,
        professional_id: ProfessionalId,
        attended_at: i64,
    ) -> RepoResult<()>;
    fn close_arrival(&self, id: ArrivalId, closed_at: i64) -> RepoResult<()>;
    /// Open arrivals oldest first; `waiting_only` drops attended ones.
    fn list_open_arrivals(&self, waiting_only: bool) -> RepoResult<Vec<Arrival>>;
    /// Closes every open arrival; returns how many were open.
    fn close_all_open_arrivals(&self, closed_at: i64) -> RepoResult<usize>;
}

impl ArrivalRepository for SqliteStore<'_> {
    fn insert_arrival(&self, arrival: &Arrival) -> RepoResult<()> {
        self.conn().execute(
            "INSERT INTO arrivals (
                id,
                patient_id,
                arrived_at,
                professional_id,
                attended_at,
                closed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                arrival.id.to_string(),
                arrival.patient_id.to_string(),
                arrival.arrived_at,
                arrival.professional_id.map(|id| id.to_string()),
                arrival.attended_at,
                arrival.closed_at,
            ],
        )?;
        Ok(())
    }

    fn find_open_arrival(&self, patient_id: PatientId) -> RepoResult<Option<Arrival>> {
        self.conn()
            .query_row(
                &format!(
                    "{ARRIVAL_SELECT_SQL}
                     WHERE patient_id = ?1 AND closed_at IS NULL
                     LIMIT 1;"
                ),
                [patient_id.to_string()],
                |row| Ok(parse_arrival_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn mark_attended(
        &self,
        id: ArrivalId,
        professional_id: ProfessionalId,
        attended_at: i64,
    ) -> RepoResult<()> {
        let changed = self.conn().execute(
            "UPDATE arrivals
             SET professional_id = ?1, attended_at = ?2
             WHERE id = ?3 AND closed_at IS NULL;",
            params![professional_id.to_string(), attended_at, id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found(EntityKind::Arrival, id));
        }
        Ok(())
    }

    fn close_arrival(&self, id: ArrivalId, closed_at: i64) -> RepoResult<()> {
        let changed = self.conn().execute(
            "UPDATE arrivals
             SET closed_at = ?1
             WHERE id = ?2 AND closed_at IS NULL;",
            params![closed_at, id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found(EntityKind::Arrival, id));
        }
        Ok(())
    }

    fn list_open_arrivals(&self, waiting_only: bool) -> RepoResult<Vec<Arrival>> {
        let mut stmt = self.conn().prepare(&format!(
            "{ARRIVAL_SELECT_SQL}
             WHERE closed_at IS NULL
               AND (?1 = 0 OR attended_at IS NULL)
             ORDER BY arrived_at ASC, id ASC;"
        ))?;
        let mut rows = stmt.query([i64::from(waiting_only)])?;
        let mut arrivals = Vec::new();
        while let Some(row) = rows.next()? {
            arrivals.push(parse_arrival_row(row)?);
        }
        Ok(arrivals)
    }

    fn close_all_open_arrivals(&self, closed_at: i64) -> RepoResult<usize> {
        let changed = self.conn().execute(
            "UPDATE arrivals SET closed_at = ?1 WHERE closed_at IS NULL;",
            [closed_at],
        )?;
        Ok(changed)
    }
}

fn parse_arrival_row(row: &Row<'_>) -> RepoResult<Arrival> {
    let id_text: String = row.get("id")?;
    let patient_text: String = row.get("patient_id")?;
    Ok(Arrival {
        id: parse_uuid(&id_text, "arrivals.id")?,
        patient_id: parse_uuid(&patient_text, "arrivals.patient_id")?,
        arrived_at: row.get("arrived_at")?,
        professional_id: parse_optional_uuid(
            row.get("professional_id")?,
            "arrivals.professional_id",
        )?,
        attended_at: row.get("attended_at")?,
        closed_at: row.get("closed_at")?,
    })
}
