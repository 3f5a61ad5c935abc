use axum::extract::Path;
use common_auth::{AuthContext, Permission, Role};
use common_http_errors::{ApiError, SuccessBody};
use common_ids::{EntityKind, OpaqueId};
use serde::Serialize;

use crate::app::{decode_path_id, public_id};

#[derive(Debug, Serialize)]
pub struct RoleView {
    pub id: OpaqueId,
    pub name: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Serialize)]
pub struct PermissionView {
    pub id: OpaqueId,
    pub name: &'static str,
    pub description: &'static str,
}

fn role_view(role: Role) -> Result<RoleView, ApiError> {
    Ok(RoleView {
        id: public_id(u64::from(role.id()), EntityKind::Role)?,
        name: role.name(),
        description: role.description(),
    })
}

fn permission_view(permission: Permission) -> Result<PermissionView, ApiError> {
    Ok(PermissionView {
        id: public_id(u64::from(permission.id()), EntityKind::Permission)?,
        name: permission.name(),
        description: permission.description(),
    })
}

pub async fn list_roles(_auth: AuthContext) -> Result<SuccessBody<Vec<RoleView>>, ApiError> {
    let roles = Role::ALL
        .into_iter()
        .map(role_view)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(SuccessBody::new("success", "Roles retrieved successfully", roles))
}

pub async fn role_permissions(
    _auth: AuthContext,
    Path(raw_id): Path<String>,
) -> Result<SuccessBody<Vec<PermissionView>>, ApiError> {
    let role_id = decode_path_id(&raw_id, EntityKind::Role)?;
    let role = u32::try_from(role_id.local_id())
        .ok()
        .and_then(Role::from_id)
        .ok_or(ApiError::NotFound { code: "role_not_found" })?;

    let permissions = role
        .permissions()
        .iter()
        .copied()
        .map(permission_view)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(SuccessBody::new(
        "success",
        "Role permissions retrieved successfully",
        permissions,
    ))
}

pub async fn list_permissions(
    _auth: AuthContext,
) -> Result<SuccessBody<Vec<PermissionView>>, ApiError> {
    let permissions = Permission::ALL
        .into_iter()
        .map(permission_view)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(SuccessBody::new(
        "success",
        "Permissions retrieved successfully",
        permissions,
    ))
}
