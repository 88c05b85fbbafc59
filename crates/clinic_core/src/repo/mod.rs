//! Repository layer contracts and the SQLite store implementing them.
//!
//! # Responsibility
//! - Define one repository trait per aggregate; services depend only on
//!   these traits plus [`UnitOfWork`].
//! - Isolate SQL from service orchestration.
//!
//! # Invariants
//! - Write paths call the model's `validate()` before SQL mutations.
//! - Updates by id are compare-and-swap on `version`; a mismatch is
//!   [`RepoError::StaleWrite`], a missing row is [`RepoError::NotFound`].
//! - Read paths reject invalid persisted state instead of masking it.
//! - SQLite constraint failures surface as
//!   [`RepoError::ConstraintViolation`].

use crate::db::migrations::{current_user_version, latest_version};
use crate::db::DbError;
use crate::model::{EntityKind, ValidationError};
use log::warn;
use rusqlite::{Connection, ErrorCode, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub mod arrival_repo;
pub mod box_repo;
pub mod encounter_repo;
pub mod panoramic_repo;
pub mod patient_repo;
pub mod professional_repo;
pub mod snapshot_repo;

pub use arrival_repo::ArrivalRepository;
pub use box_repo::BoxRepository;
pub use encounter_repo::EncounterRepository;
pub use panoramic_repo::{BoxBoardRow, PanoramicRepository, WaitingRow};
pub use patient_repo::PatientRepository;
pub use professional_repo::ProfessionalRepository;
pub use snapshot_repo::SnapshotRepository;

pub type RepoResult<T> = Result<T, RepoError>;

#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    NotFound {
        entity: EntityKind,
        id: String,
    },
    StaleWrite {
        entity: EntityKind,
        id: String,
        expected_version: i64,
    },
    ConstraintViolation(String),
    Validation(ValidationError),
    InvalidData(String),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
}

impl RepoError {
    pub fn not_found(entity: EntityKind, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::StaleWrite {
                entity,
                id,
                expected_version,
            } => write!(
                f,
                "{entity} {id} changed concurrently (expected version {expected_version})"
            ),
            Self::ConstraintViolation(message) => write!(f, "constraint violation: {message}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection schema version {actual_version} does not match required {expected_version}"
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        if value.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) {
            return Self::ConstraintViolation(value.to_string());
        }
        Self::Db(DbError::Sqlite(value))
    }
}

/// Runs a closure as one storage transaction.
pub trait UnitOfWork {
    /// Commits when `work` returns `Ok`, rolls back otherwise.
    ///
    /// Nested calls join the outer transaction.
    fn atomically<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<RepoError>;
}

/// SQLite-backed store implementing every repository trait.
///
/// Copyable handle over one migrated connection; all repository calls made
/// inside [`UnitOfWork::atomically`] share its transaction.
#[derive(Debug, Clone, Copy)]
pub struct SqliteStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteStore<'conn> {
    /// Wraps a connection after checking its schema is fully migrated.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        let actual_version = current_user_version(conn)?;
        let expected_version = latest_version();
        if actual_version != expected_version {
            return Err(RepoError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }
        Ok(Self { conn })
    }

    pub(crate) fn conn(&self) -> &'conn Connection {
        self.conn
    }
}

impl UnitOfWork for SqliteStore<'_> {
    fn atomically<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<RepoError>,
    {
        if !self.conn.is_autocommit() {
            return work();
        }

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)
            .map_err(RepoError::from)?;
        match work() {
            Ok(value) => {
                tx.commit().map_err(RepoError::from)?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback() {
                    warn!(
                        "event=tx_rollback module=repo status=error error={rollback_err}"
                    );
                }
                Err(err)
            }
        }
    }
}

pub(crate) fn parse_uuid(text: &str, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(text)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{text}` in {column}")))
}

pub(crate) fn parse_optional_uuid(text: Option<String>, column: &str) -> RepoResult<Option<Uuid>> {
    text.map(|value| parse_uuid(&value, column)).transpose()
}

pub(crate) fn list_to_json(items: &[String], column: &str) -> RepoResult<String> {
    serde_json::to_string(items)
        .map_err(|err| RepoError::InvalidData(format!("cannot encode {column}: {err}")))
}

pub(crate) fn list_from_json(text: &str, column: &str) -> RepoResult<Vec<String>> {
    serde_json::from_str(text)
        .map_err(|err| RepoError::InvalidData(format!("invalid list in {column}: {err}")))
}

pub(crate) fn to_json_text<T: serde::Serialize>(value: &T, column: &str) -> RepoResult<String> {
    serde_json::to_string(value)
        .map_err(|err| RepoError::InvalidData(format!("cannot encode {column}: {err}")))
}

pub(crate) fn from_json_text<T: serde::de::DeserializeOwned>(
    text: &str,
    column: &str,
) -> RepoResult<T> {
    serde_json::from_str(text)
        .map_err(|err| RepoError::InvalidData(format!("invalid json in {column}: {err}")))
}

#[cfg(test)]
mod tests {
    use super::{RepoError, SqliteStore, UnitOfWork};
    use crate::db::open_db_in_memory;
    use rusqlite::Connection;

    #[test]
    fn try_new_rejects_unmigrated_connection() {
        let conn = Connection::open_in_memory().expect("raw connection");
        assert!(matches!(
            SqliteStore::try_new(&conn),
            Err(RepoError::UninitializedConnection {
                actual_version: 0,
                ..
            })
        ));
    }

    #[test]
    fn atomically_rolls_back_on_error() {
        let conn = open_db_in_memory().expect("db");
        let store = SqliteStore::try_new(&conn).expect("store");

        let result: Result<(), RepoError> = store.atomically(|| {
            conn.execute(
                "INSERT INTO professionals (id, principal_id, full_name, specialty, created_at)
                 VALUES ('p', 'x', 'X', 'general', 0);",
                [],
            )?;
            Err(RepoError::InvalidData("boom".to_string()))
        });
        assert!(result.is_err());
        assert!(conn.is_autocommit());

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM professionals;", [], |row| row.get(0))
            .expect("count");
        assert_eq!(count, 0);
    }

    #[test]
    fn nested_atomically_joins_outer_transaction() {
        let conn = open_db_in_memory().expect("db");
        let store = SqliteStore::try_new(&conn).expect("store");

        let result: Result<(), RepoError> = store.atomically(|| {
            store.atomically(|| -> Result<(), RepoError> {
                conn.execute(
                    "INSERT INTO professionals (id, principal_id, full_name, specialty, created_at)
                     VALUES ('p', 'x', 'X', 'general', 0);",
                    [],
                )?;
                Ok(())
            })?;
            Err(RepoError::InvalidData("outer failure".to_string()))
        });
        assert!(result.is_err());

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM professionals;", [], |row| row.get(0))
            .expect("count");
        assert_eq!(count, 0);
    }

    #[test]
    fn unique_violation_maps_to_constraint_violation() {
        let conn = open_db_in_memory().expect("db");
        let insert = "INSERT INTO professionals (id, principal_id, full_name, specialty, created_at)
                      VALUES (?1, 'same', 'X', 'general', 0);";
        conn.execute(insert, ["a"]).expect("first insert");
        let err = RepoError::from(conn.execute(insert, ["b"]).expect_err("duplicate principal"));
        assert!(matches!(err, RepoError::ConstraintViolation(_)));
    }
}
