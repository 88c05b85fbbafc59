//! Professional profile persistence.

use crate::model::professional::{Professional, ProfessionalId};
use crate::repo::{parse_uuid, RepoResult, SqliteStore};
use rusqlite::{params, OptionalExtension, Row};

const PROFESSIONAL_SELECT_SQL: &str = "SELECT
    id,
    principal_id,
    full_name,
    specialty,
    created_at
FROM professionals";

pub trait ProfessionalRepository {
    fn insert_professional(&self, professional: &Professional) -> RepoResult<()>;
    fn get_professional(&self, id: ProfessionalId) -> RepoResult<Option<Professional>>;
    fn find_professional_by_principal(&self, principal_id: &str)
        -> RepoResult<Option<Professional>>;
}

impl ProfessionalRepository for SqliteStore<'_> {
    fn insert_professional(&self, professional: &Professional) -> RepoResult<()> {
        professional.validate()?;
        self.conn().execute(
            "INSERT INTO professionals (id, principal_id, full_name, specialty, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                professional.id.to_string(),
                professional.principal_id.as_str(),
                professional.full_name.as_str(),
                professional.specialty.as_str(),
                professional.created_at,
            ],
        )?;
        Ok(())
    }

    fn get_professional(&self, id: ProfessionalId) -> RepoResult<Option<Professional>> {
        self.conn()
            .query_row(
                &format!("{PROFESSIONAL_SELECT_SQL} WHERE id = ?1;"),
                [id.to_string()],
                |row| Ok(parse_professional_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn find_professional_by_principal(
        &self,
        principal_id: &str,
    ) -> RepoResult<Option<Professional>> {
        self.conn()
            .query_row(
                &format!("{PROFESSIONAL_SELECT_SQL} WHERE principal_id = ?1;"),
                [principal_id],
                |row| Ok(parse_professional_row(row)),
            )
            .optional()?
            .transpose()
    }
}

fn parse_professional_row(row: &Row<'_>) -> RepoResult<Professional> {
    let id_text: String = row.get("id")?;
    let professional = Professional {
        id: parse_uuid(&id_text, "professionals.id")?,
        principal_id: row.get("principal_id")?,
        full_name: row.get("full_name")?,
        specialty: row.get("specialty")?,
        created_at: row.get("created_at")?,
    };
    professional.validate()?;
    Ok(professional)
}
