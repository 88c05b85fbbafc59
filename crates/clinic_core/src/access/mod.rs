//! Access gate seam: principal resolution and role checks.
//!
//! # Responsibility
//! - Resolve an opaque request context into a principal and role.
//! - Authorize operations against their allowed-role table.
//!
//! # Invariants
//! - Authorization is deny-by-default: an operation not listing a role
//!   rejects it.
//! - Credential mechanics stay behind [`AccessGate`]; core never inspects
//!   tokens itself.

use log::warn;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod role;

pub use role::{
    ClinicOperation, Role, RoleParseError, ROLE_ADMINISTRATOR, ROLE_PROFESSIONAL,
    ROLE_RECEPTIONIST,
};

/// Authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: String,
    pub role: Role,
}

impl Principal {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }
}

/// Inbound request metadata consumed by the gate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub bearer_token: Option<String>,
}

impl RequestContext {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            bearer_token: Some(token.into()),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    Unauthenticated,
    Forbidden {
        role: Role,
        operation: ClinicOperation,
    },
}

impl Display for AccessError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unauthenticated => write!(f, "authentication required"),
            Self::Forbidden { role, operation } => {
                write!(f, "role `{role}` may not perform `{operation}`")
            }
        }
    }
}

impl Error for AccessError {}

/// Resolves principals from request contexts.
pub trait AccessGate {
    fn resolve(&self, ctx: &RequestContext) -> Result<Principal, AccessError>;
}

/// Token table gate for tooling and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticAccessGate {
    principals: BTreeMap<String, Principal>,
}

impl StaticAccessGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: impl Into<String>, principal: Principal) -> Self {
        self.principals.insert(token.into(), principal);
        self
    }
}

impl AccessGate for StaticAccessGate {
    fn resolve(&self, ctx: &RequestContext) -> Result<Principal, AccessError> {
        let token = ctx
            .bearer_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AccessError::Unauthenticated)?;
        self.principals
            .get(token)
            .cloned()
            .ok_or(AccessError::Unauthenticated)
    }
}

/// Checks a principal's role against the operation's allowed roles.
pub fn authorize(principal: &Principal, operation: ClinicOperation) -> Result<(), AccessError> {
    if operation.allowed_roles().contains(&principal.role) {
        return Ok(());
    }
    warn!(
        "event=access_denied module=access status=error operation={} role={} principal={}",
        operation.as_str(),
        principal.role.as_str(),
        principal.id
    );
    Err(AccessError::Forbidden {
        role: principal.role,
        operation,
    })
}

#[cfg(test)]
mod tests {
    use super::{
        authorize, AccessError, AccessGate, ClinicOperation, Principal, RequestContext, Role,
        StaticAccessGate,
    };

    #[test]
    fn static_gate_resolves_known_tokens_only() {
        let gate = StaticAccessGate::new()
            .with_token("t-1", Principal::new("dr-1", Role::Professional));
        assert_eq!(
            gate.resolve(&RequestContext::bearer("t-1"))
                .expect("known token")
                .id,
            "dr-1"
        );
        assert_eq!(
            gate.resolve(&RequestContext::bearer("nope")),
            Err(AccessError::Unauthenticated)
        );
        assert_eq!(
            gate.resolve(&RequestContext::anonymous()),
            Err(AccessError::Unauthenticated)
        );
    }

    #[test]
    fn authorize_denies_roles_outside_the_table() {
        let receptionist = Principal::new("front", Role::Receptionist);
        assert!(authorize(&receptionist, ClinicOperation::ApplyBatch).is_ok());
        assert!(matches!(
            authorize(&receptionist, ClinicOperation::CreateSnapshot),
            Err(AccessError::Forbidden { .. })
        ));
        let admin = Principal::new("root", Role::Administrator);
        assert!(authorize(&admin, ClinicOperation::ResetClinicDay).is_ok());
        assert!(authorize(&admin, ClinicOperation::RegisterArrival).is_err());
    }
}
