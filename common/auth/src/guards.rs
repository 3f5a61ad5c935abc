use axum::response::{IntoResponse, Response};
use common_http_errors::ApiError;
use thiserror::Error;
use tracing::warn;

use crate::claims::AccessClaims;
use crate::permissions::Permission;
use crate::roles::permissions_for_roles;
use crate::AuthContext;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardError {
    #[error("insufficient role; required one of: {}", .required.join(", "))]
    Forbidden { required: Vec<String> },
}

impl From<GuardError> for ApiError {
    fn from(value: GuardError) -> Self {
        match value {
            GuardError::Forbidden { required } => ApiError::Forbidden { required },
        }
    }
}

impl IntoResponse for GuardError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}

/// True when the two role sets share at least one exact name.
pub fn roles_intersect(held: &[String], allowed: &[&str]) -> bool {
    held.iter()
        .any(|role| allowed.iter().any(|required| role == required))
}

/// Role check for a possibly anonymous caller. Fails closed: missing claims
/// count as holding no roles, and an empty allowed set denies everyone.
pub fn authorize(claims: Option<&AccessClaims>, allowed: &[&str]) -> Result<(), GuardError> {
    let held = claims.map(|claims| claims.roles.as_slice()).unwrap_or_default();

    if roles_intersect(held, allowed) {
        return Ok(());
    }

    match claims {
        Some(claims) => warn!(
            subject = %claims.subject,
            held = ?claims.roles,
            required = ?allowed,
            "role check denied"
        ),
        None => warn!(required = ?allowed, "role check denied for anonymous caller"),
    }
    Err(GuardError::Forbidden {
        required: allowed.iter().map(|value| value.to_string()).collect(),
    })
}

pub fn ensure_role(auth: &AuthContext, allowed: &[&str]) -> Result<(), GuardError> {
    authorize(Some(&auth.claims), allowed)
}

/// Permission check over the role snapshot in the token. Roles expand to
/// the union of their grants; unknown role names grant nothing.
pub fn require_permission(
    claims: Option<&AccessClaims>,
    permission: Permission,
) -> Result<(), GuardError> {
    let held = claims.map(|claims| claims.roles.as_slice()).unwrap_or_default();

    if permissions_for_roles(held).contains(&permission) {
        return Ok(());
    }

    match claims {
        Some(claims) => warn!(
            subject = %claims.subject,
            held = ?claims.roles,
            permission = permission.name(),
            "permission check denied"
        ),
        None => warn!(permission = permission.name(), "permission check denied for anonymous caller"),
    }
    Err(GuardError::Forbidden {
        required: vec![permission.name().to_string()],
    })
}

pub fn ensure_permission(auth: &AuthContext, permission: Permission) -> Result<(), GuardError> {
    require_permission(Some(&auth.claims), permission)
}
