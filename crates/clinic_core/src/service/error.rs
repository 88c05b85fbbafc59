//! Service error taxonomy and status mapping.

use crate::access::{AccessError, ClinicOperation, Role};
use crate::model::field::FieldError;
use crate::model::{EntityKind, ValidationError};
use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ClinicResult<T> = Result<T, ClinicError>;

#[derive(Debug)]
pub enum ClinicError {
    Validation(String),
    Unauthenticated,
    Forbidden {
        role: Role,
        operation: ClinicOperation,
    },
    NotFound {
        entity: EntityKind,
        id: String,
    },
    Conflict(String),
    /// Batch-only: unknown operation verb.
    UnsupportedOperation(String),
    Persistence(RepoError),
}

impl ClinicError {
    pub fn not_found(entity: EntityKind, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// HTTP-style status for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) | Self::UnsupportedOperation(_) => 400,
            Self::Unauthenticated => 401,
            Self::Forbidden { .. } => 403,
            Self::NotFound { .. } => 404,
            Self::Conflict(_) => 409,
            Self::Persistence(_) => 500,
        }
    }

    /// Stable snake_case code for log lines.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Unauthenticated => "unauthenticated",
            Self::Forbidden { .. } => "forbidden",
            Self::NotFound { .. } => "not_found",
            Self::Conflict(_) => "conflict",
            Self::UnsupportedOperation(_) => "unsupported_operation",
            Self::Persistence(_) => "persistence",
        }
    }

    /// Message safe to return to callers; storage detail is withheld.
    pub fn public_message(&self) -> String {
        match self {
            Self::Persistence(_) => "internal storage error".to_string(),
            other => other.to_string(),
        }
    }
}

impl Display for ClinicError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(message) => write!(f, "{message}"),
            Self::Unauthenticated => write!(f, "authentication required"),
            Self::Forbidden { role, operation } => {
                write!(f, "role `{role}` may not perform `{operation}`")
            }
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Conflict(message) => write!(f, "{message}"),
            Self::UnsupportedOperation(op) => write!(f, "unsupported operation `{op}`"),
            Self::Persistence(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ClinicError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Persistence(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ClinicError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { entity, id } => Self::NotFound { entity, id },
            RepoError::StaleWrite { .. } | RepoError::ConstraintViolation(_) => {
                Self::Conflict(value.to_string())
            }
            RepoError::Validation(err) => Self::Validation(err.to_string()),
            other => Self::Persistence(other),
        }
    }
}

impl From<AccessError> for ClinicError {
    fn from(value: AccessError) -> Self {
        match value {
            AccessError::Unauthenticated => Self::Unauthenticated,
            AccessError::Forbidden { role, operation } => Self::Forbidden { role, operation },
        }
    }
}

impl From<FieldError> for ClinicError {
    fn from(value: FieldError) -> Self {
        match value {
            FieldError::UnsupportedOperation(op) => Self::UnsupportedOperation(op),
            other => Self::Validation(other.to_string()),
        }
    }
}

impl From<ValidationError> for ClinicError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::ClinicError;
    use crate::db::DbError;
    use crate::model::EntityKind;
    use crate::repo::RepoError;

    #[test]
    fn maps_repo_errors_onto_taxonomy() {
        let stale = ClinicError::from(RepoError::StaleWrite {
            entity: EntityKind::Box,
            id: "b".to_string(),
            expected_version: 1,
        });
        assert_eq!(stale.status_code(), 409);

        let missing = ClinicError::from(RepoError::not_found(EntityKind::Patient, "p"));
        assert_eq!(missing.status_code(), 404);

        let storage = ClinicError::from(RepoError::Db(DbError::UnsupportedSchemaVersion {
            db_version: 9,
            latest_supported: 2,
        }));
        assert_eq!(storage.status_code(), 500);
        assert_eq!(storage.public_message(), "internal storage error");
    }
}
