//! Caller-facing JSON endpoints for the clinic core.

mod api;

pub use api::{ApiResponse, ClinicApi};
