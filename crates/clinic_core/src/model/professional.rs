//! Professional profile model.

use crate::model::ValidationError;
use serde::Serialize;
use uuid::Uuid;

pub type ProfessionalId = Uuid;

/// Clinical profile bound to an authenticated principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Professional {
    pub id: ProfessionalId,
    /// Principal id issued by the access gate.
    pub principal_id: String,
    pub full_name: String,
    pub specialty: String,
    pub created_at: i64,
}

impl Professional {
    pub fn new(
        principal_id: impl Into<String>,
        full_name: impl Into<String>,
        specialty: impl Into<String>,
        now_ms: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            principal_id: principal_id.into(),
            full_name: full_name.into(),
            specialty: specialty.into(),
            created_at: now_ms,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.principal_id.trim().is_empty() {
            return Err(ValidationError::BlankLabel("principal_id"));
        }
        if self.full_name.trim().is_empty() {
            return Err(ValidationError::BlankLabel("full_name"));
        }
        if self.specialty.trim().is_empty() {
            return Err(ValidationError::EmptySpecialty);
        }
        Ok(())
    }
}
