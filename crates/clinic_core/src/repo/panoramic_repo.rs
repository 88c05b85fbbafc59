//! Read-only dashboard joins over boxes, arrivals, patients and
//! professionals.

use crate::repo::{parse_optional_uuid, parse_uuid, RepoResult, SqliteStore};
use serde::Serialize;
use uuid::Uuid;

/// One box with its current occupant, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoxBoardRow {
    pub box_id: Uuid,
    pub number: u32,
    pub label: String,
    pub occupied: bool,
    pub patient_id: Option<Uuid>,
    pub patient_name: Option<String>,
    pub professional_id: Option<Uuid>,
    pub professional_name: Option<String>,
    pub started_at: Option<i64>,
    pub estimated_end: Option<i64>,
}

/// One open, unattended arrival.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitingRow {
    pub arrival_id: Uuid,
    pub patient_id: Uuid,
    pub patient_name: String,
    pub arrived_at: i64,
}

pub trait PanoramicRepository {
    /// Boxes ordered by number.
    fn box_board(&self) -> RepoResult<Vec<BoxBoardRow>>;
    /// Waiting queue, oldest arrival first.
    fn waiting_queue(&self) -> RepoResult<Vec<WaitingRow>>;
}

impl PanoramicRepository for SqliteStore<'_> {
    fn box_board(&self) -> RepoResult<Vec<BoxBoardRow>> {
        let mut stmt = self.conn().prepare(
            "SELECT
                b.id,
                b.number,
                b.label,
                b.occupied,
                b.patient_id,
                TRIM(p.first_name || ' ' || p.last_name) AS patient_name,
                b.professional_id,
                pr.full_name AS professional_name,
                b.started_at,
                b.started_at + b.estimated_minutes * 60000 AS estimated_end
             FROM boxes b
             LEFT JOIN patients p ON p.id = b.patient_id
             LEFT JOIN professionals pr ON pr.id = b.professional_id
             ORDER BY b.number ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut board = Vec::new();
        while let Some(row) = rows.next()? {
            let id_text: String = row.get(0)?;
            board.push(BoxBoardRow {
                box_id: parse_uuid(&id_text, "boxes.id")?,
                number: row.get(1)?,
                label: row.get(2)?,
                occupied: row.get::<_, i64>(3)? == 1,
                patient_id: parse_optional_uuid(row.get(4)?, "boxes.patient_id")?,
                patient_name: row.get(5)?,
                professional_id: parse_optional_uuid(row.get(6)?, "boxes.professional_id")?,
                professional_name: row.get(7)?,
                started_at: row.get(8)?,
                estimated_end: row.get(9)?,
            });
        }
        Ok(board)
    }

    fn waiting_queue(&self) -> RepoResult<Vec<WaitingRow>> {
        let mut stmt = self.conn().prepare(
            "SELECT
                a.id,
                a.patient_id,
                TRIM(p.first_name || ' ' || p.last_name) AS patient_name,
                a.arrived_at
             FROM arrivals a
             JOIN patients p ON p.id = a.patient_id
             WHERE a.closed_at IS NULL AND a.attended_at IS NULL
             ORDER BY a.arrived_at ASC, a.id ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut queue = Vec::new();
        while let Some(row) = rows.next()? {
            let arrival_text: String = row.get(0)?;
            let patient_text: String = row.get(1)?;
            queue.push(WaitingRow {
                arrival_id: parse_uuid(&arrival_text, "arrivals.id")?,
                patient_id: parse_uuid(&patient_text, "arrivals.patient_id")?,
                patient_name: row.get(2)?,
                arrived_at: row.get(3)?,
            });
        }
        Ok(queue)
    }
}
