//! Clinic domain model.
//!
//! # Responsibility
//! - Define canonical records for patients, boxes, arrivals, encounters,
//!   professionals and history snapshots.
//! - Define the field table and tagged values used by batch mutation.
//!
//! # Invariants
//! - Every record is identified by a stable UUID.
//! - Box occupancy is modelled as one optional value, so occupant fields can
//!   never be half-set.
//! - History snapshots are value copies and carry no mutation API.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod arrival;
pub mod encounter;
pub mod field;
pub mod patient;
pub mod professional;
pub mod snapshot;
pub mod treatment_box;

/// Entity kinds referenced by not-found and conflict errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Patient,
    Box,
    Arrival,
    Encounter,
    Professional,
    Snapshot,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Patient => "patient",
            Self::Box => "box",
            Self::Arrival => "arrival",
            Self::Encounter => "encounter",
            Self::Professional => "professional",
            Self::Snapshot => "snapshot",
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record-level validation failures, checked before every write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    EmptyIdentityNumber,
    EmptyFirstName,
    NegativeMeasurement(&'static str),
    InvalidDay(String),
    EmptySpecialty,
    ZeroEstimatedMinutes,
    BlankLabel(&'static str),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyIdentityNumber => write!(f, "identity number must not be empty"),
            Self::EmptyFirstName => write!(f, "patient first name must not be empty"),
            Self::NegativeMeasurement(field) => write!(f, "`{field}` must not be negative"),
            Self::InvalidDay(value) => write!(f, "invalid encounter day `{value}`"),
            Self::EmptySpecialty => write!(f, "professional specialty must not be empty"),
            Self::ZeroEstimatedMinutes => write!(f, "estimated minutes must be greater than zero"),
            Self::BlankLabel(field) => write!(f, "`{field}` must not be blank"),
        }
    }
}

impl Error for ValidationError {}
