//! Treatment box persistence.
//!
//! # Invariants
//! - Occupant columns are written together with the `occupied` flag in a
//!   single statement; the table CHECK rejects half-set rows.
//! - Only `occupy_box` and `reset_all_boxes` write occupancy.

use crate::model::treatment_box::{BoxId, BoxOccupancy, TreatmentBox};
use crate::model::EntityKind;
use crate::repo::{parse_uuid, RepoError, RepoResult, SqliteStore};
use rusqlite::{params, OptionalExtension, Row};

const BOX_SELECT_SQL: &str = "SELECT
    id,
    number,
    label,
    occupied,
    patient_id,
    professional_id,
    started_at,
    estimated_minutes,
    version,
    updated_at
FROM boxes";

pub trait BoxRepository {
    /// Administrative provisioning seam.
    fn insert_box(&self, treatment_box: &TreatmentBox) -> RepoResult<()>;
    fn get_box(&self, id: BoxId) -> RepoResult<Option<TreatmentBox>>;
    /// All boxes ordered by number.
    fn list_boxes(&self) -> RepoResult<Vec<TreatmentBox>>;
    /// Sets the occupant when the stored version equals `expected_version`.
    fn occupy_box(
        &self,
        id: BoxId,
        expected_version: i64,
        occupancy: &BoxOccupancy,
        now_ms: i64,
    ) -> RepoResult<TreatmentBox>;
    /// Frees every occupied box; returns how many were occupied.
    fn reset_all_boxes(&self, now_ms: i64) -> RepoResult<usize>;
}

impl BoxRepository for SqliteStore<'_> {
    fn insert_box(&self, treatment_box: &TreatmentBox) -> RepoResult<()> {
        treatment_box.validate()?;
        let occupancy = treatment_box.occupancy.as_ref();

        self.conn().execute(
            "INSERT INTO boxes (
                id,
                number,
                label,
                occupied,
                patient_id,
                professional_id,
                started_at,
                estimated_minutes,
                version,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
            params![
                treatment_box.id.to_string(),
                treatment_box.number,
                treatment_box.label.as_str(),
                bool_to_int(occupancy.is_some()),
                occupancy.map(|value| value.patient_id.to_string()),
                occupancy.map(|value| value.professional_id.to_string()),
                occupancy.map(|value| value.started_at),
                occupancy.map(|value| value.estimated_minutes),
                treatment_box.version,
                treatment_box.updated_at,
            ],
        )?;
        Ok(())
    }

    fn get_box(&self, id: BoxId) -> RepoResult<Option<TreatmentBox>> {
        self.conn()
            .query_row(
                &format!("{BOX_SELECT_SQL} WHERE id = ?1;"),
                [id.to_string()],
                |row| Ok(parse_box_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn list_boxes(&self) -> RepoResult<Vec<TreatmentBox>> {
        let mut stmt = self
            .conn()
            .prepare(&format!("{BOX_SELECT_SQL} ORDER BY number ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut boxes = Vec::new();
        while let Some(row) = rows.next()? {
            boxes.push(parse_box_row(row)?);
        }
        Ok(boxes)
    }

    fn occupy_box(
        &self,
        id: BoxId,
        expected_version: i64,
        occupancy: &BoxOccupancy,
        now_ms: i64,
    ) -> RepoResult<TreatmentBox> {
        let changed = self.conn().execute(
            "UPDATE boxes
             SET
                occupied = 1,
                patient_id = ?1,
                professional_id = ?2,
                started_at = ?3,
                estimated_minutes = ?4,
                version = version + 1,
                updated_at = ?5
             WHERE id = ?6 AND version = ?7;",
            params![
                occupancy.patient_id.to_string(),
                occupancy.professional_id.to_string(),
                occupancy.started_at,
                occupancy.estimated_minutes,
                now_ms,
                id.to_string(),
                expected_version,
            ],
        )?;

        if changed == 0 {
            return Err(match self.get_box(id)? {
                Some(_) => RepoError::StaleWrite {
                    entity: EntityKind::Box,
                    id: id.to_string(),
                    expected_version,
                },
                None => RepoError::not_found(EntityKind::Box, id),
            });
        }

        self.get_box(id)?
            .ok_or_else(|| RepoError::not_found(EntityKind::Box, id))
    }

    fn reset_all_boxes(&self, now_ms: i64) -> RepoResult<usize> {
        let changed = self.conn().execute(
            "UPDATE boxes
             SET
                occupied = 0,
                patient_id = NULL,
                professional_id = NULL,
                started_at = NULL,
                estimated_minutes = NULL,
                version = version + 1,
                updated_at = ?1
             WHERE occupied = 1;",
            [now_ms],
        )?;
        Ok(changed)
    }
}

fn parse_box_row(row: &Row<'_>) -> RepoResult<TreatmentBox> {
    let id_text: String = row.get("id")?;
    let id = parse_uuid(&id_text, "boxes.id")?;

    let occupancy = match row.get::<_, i64>("occupied")? {
        0 => None,
        1 => {
            let patient_text: String = row.get("patient_id")?;
            let professional_text: String = row.get("professional_id")?;
            Some(BoxOccupancy {
                patient_id: parse_uuid(&patient_text, "boxes.patient_id")?,
                professional_id: parse_uuid(&professional_text, "boxes.professional_id")?,
                started_at: row.get("started_at")?,
                estimated_minutes: row.get("estimated_minutes")?,
            })
        }
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid occupied value `{other}` in boxes.occupied"
            )));
        }
    };

    let treatment_box = TreatmentBox {
        id,
        number: row.get("number")?,
        label: row.get("label")?,
        occupancy,
        version: row.get("version")?,
        updated_at: row.get("updated_at")?,
    };
    treatment_box.validate()?;
    Ok(treatment_box)
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
