//! Core domain logic for the clinic encounter lifecycle.
//! This crate is the single source of truth for clinic invariants.

pub mod access;
pub mod clock;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use access::{
    authorize, AccessError, AccessGate, ClinicOperation, Principal, RequestContext, Role,
    StaticAccessGate,
};
pub use config::{ClinicConfig, ConfigError};
pub use db::{open_db, open_db_in_memory, DbError};
pub use logging::{
    default_log_level, init_logging, init_logging_from_config, logging_status, LoggingError,
};
pub use model::arrival::Arrival;
pub use model::encounter::{Encounter, EncounterStatus};
pub use model::field::{FieldOp, FieldValue};
pub use model::patient::{NewPatient, Patient};
pub use model::professional::Professional;
pub use model::snapshot::{HistorySnapshot, SnapshotReason};
pub use model::treatment_box::{BoxAssignment, TreatmentBox};
pub use repo::{RepoError, RepoResult, SqliteStore, UnitOfWork};
pub use service::admin_service::{AdminService, ResetReport};
pub use service::arrival_service::{ArrivalService, ArrivalSubject};
pub use service::assignment_service::{AssignBoxRequest, AssignmentService};
pub use service::batch_service::{BatchReport, BatchService, FieldOperation};
pub use service::encounter_service::EncounterService;
pub use service::error::{ClinicError, ClinicResult};
pub use service::panoramic_service::{PanoramicService, PanoramicView};
pub use service::snapshot_service::{SnapshotRequest, SnapshotService};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
