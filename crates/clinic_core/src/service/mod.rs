//! Clinic use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into authorized, transactional use-cases.
//! - Map storage and field failures onto [`error::ClinicError`].
//!
//! # Invariants
//! - Every public entry point authorizes its principal first.
//! - Services depend on repository traits and [`crate::repo::UnitOfWork`],
//!   never on SQL.

pub mod admin_service;
pub mod arrival_service;
pub mod assignment_service;
pub mod batch_service;
pub mod encounter_service;
pub mod error;
pub mod panoramic_service;
pub mod snapshot_service;
