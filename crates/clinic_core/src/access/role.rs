//! Role declarations and per-operation role requirements.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Role carried by an authenticated principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    Professional,
    Receptionist,
    Administrator,
}

/// Wire value for the professional role.
pub const ROLE_PROFESSIONAL: &str = "professional";
/// Wire value for the receptionist role.
pub const ROLE_RECEPTIONIST: &str = "receptionist";
/// Wire value for the administrator role.
pub const ROLE_ADMINISTRATOR: &str = "administrator";

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Professional => ROLE_PROFESSIONAL,
            Self::Receptionist => ROLE_RECEPTIONIST,
            Self::Administrator => ROLE_ADMINISTRATOR,
        }
    }

    /// Parses an exact lowercase role value.
    pub fn parse(value: &str) -> Result<Self, RoleParseError> {
        let normalized = value.trim();
        if normalized.is_empty() {
            return Err(RoleParseError::EmptyRole);
        }
        match normalized {
            ROLE_PROFESSIONAL => Ok(Self::Professional),
            ROLE_RECEPTIONIST => Ok(Self::Receptionist),
            ROLE_ADMINISTRATOR => Ok(Self::Administrator),
            other => Err(RoleParseError::UnsupportedRole(other.to_string())),
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleParseError {
    EmptyRole,
    UnsupportedRole(String),
}

impl Display for RoleParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyRole => write!(f, "role value must not be empty"),
            Self::UnsupportedRole(value) => write!(f, "role is unsupported: {value}"),
        }
    }
}

impl Error for RoleParseError {}

/// Operations guarded by the access gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClinicOperation {
    RegisterArrival,
    CloseArrival,
    ListWaitingArrivals,
    AssignBox,
    ApplyBatch,
    ReadEncounter,
    FinalizeEncounter,
    CreateSnapshot,
    ReadHistory,
    Panoramic,
    ResetClinicDay,
}

const FRONT_DESK: &[Role] = &[Role::Professional, Role::Receptionist];
const CLINICAL_AUDIT: &[Role] = &[Role::Professional, Role::Administrator];
const EVERYONE: &[Role] = &[Role::Professional, Role::Receptionist, Role::Administrator];
const ADMIN_ONLY: &[Role] = &[Role::Administrator];

impl ClinicOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RegisterArrival => "register_arrival",
            Self::CloseArrival => "close_arrival",
            Self::ListWaitingArrivals => "list_waiting_arrivals",
            Self::AssignBox => "assign_box",
            Self::ApplyBatch => "apply_batch",
            Self::ReadEncounter => "read_encounter",
            Self::FinalizeEncounter => "finalize_encounter",
            Self::CreateSnapshot => "create_snapshot",
            Self::ReadHistory => "read_history",
            Self::Panoramic => "panoramic",
            Self::ResetClinicDay => "reset_clinic_day",
        }
    }

    /// Roles allowed to invoke the operation. Anything absent is denied.
    pub fn allowed_roles(self) -> &'static [Role] {
        match self {
            Self::RegisterArrival
            | Self::CloseArrival
            | Self::ListWaitingArrivals
            | Self::AssignBox
            | Self::ApplyBatch
            | Self::ReadEncounter => FRONT_DESK,
            Self::FinalizeEncounter | Self::CreateSnapshot | Self::ReadHistory => CLINICAL_AUDIT,
            Self::Panoramic => EVERYONE,
            Self::ResetClinicDay => ADMIN_ONLY,
        }
    }
}

impl Display for ClinicOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
