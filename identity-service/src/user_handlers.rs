use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use common_auth::{
    ensure_permission, ensure_role, permissions_for_roles, AuthContext, Permission,
    ROLE_ADMIN, ROLE_SUPER_ADMIN,
};
use common_http_errors::{ApiError, SuccessBody};
use common_ids::{EntityKind, OpaqueId};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::app::decode_path_id;
use crate::service::PageRequest;
use crate::store::{Principal, PrincipalChanges};
use crate::AppState;

pub(crate) const USER_DELETE_ROLES: &[&str] = &[ROLE_SUPER_ADMIN, ROLE_ADMIN];
pub(crate) const USER_LIST_ROLES: &[&str] = &[ROLE_SUPER_ADMIN];

#[derive(Debug, Serialize)]
pub struct UserView {
    pub id: OpaqueId,
    pub full_name: String,
    pub email: String,
    pub roles: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl UserView {
    pub fn from_principal(principal: &Principal, roles: Vec<String>) -> Result<Self, ApiError> {
        Ok(Self {
            id: principal.opaque_id().map_err(ApiError::internal)?,
            full_name: principal.full_name.clone(),
            email: principal.email.clone(),
            roles,
            created_at: principal.created_at,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct CurrentUserView {
    #[serde(flatten)]
    pub user: UserView,
    pub permissions: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct UserPage {
    pub users: Vec<UserView>,
    pub page: u32,
    pub limit: u32,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListUsersQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Default, Deserialize)]
pub struct UpdateUserRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
}

#[derive(Deserialize)]
pub struct AssignRolesRequest {
    pub role_ids: Vec<String>,
}

/// Profile of the caller. Roles and permissions are the token snapshot.
pub async fn current_user(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<SuccessBody<CurrentUserView>, ApiError> {
    let principal = state.auth.find_user(&auth.claims.subject).await?;
    let permissions = permissions_for_roles(&auth.claims.roles)
        .into_iter()
        .map(Permission::name)
        .collect();
    let user = UserView::from_principal(&principal, auth.claims.roles)?;

    Ok(SuccessBody::new(
        "success",
        "Current user retrieved successfully",
        CurrentUserView { user, permissions },
    ))
}

pub async fn list_users(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<ListUsersQuery>,
) -> Result<SuccessBody<UserPage>, ApiError> {
    ensure_role(&auth, USER_LIST_ROLES)?;
    let page = PageRequest {
        page: query.page,
        limit: query.limit,
    };

    let principals = state.auth.list_users(page).await?;
    let mut users = Vec::with_capacity(principals.len());
    for principal in &principals {
        let roles = state.auth.current_roles(principal.id).await;
        users.push(UserView::from_principal(principal, roles)?);
    }

    Ok(SuccessBody::new(
        "success",
        "Users retrieved successfully",
        UserPage {
            users,
            page: page.page(),
            limit: page.limit(),
        },
    ))
}

pub async fn get_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(raw_id): Path<String>,
) -> Result<SuccessBody<UserView>, ApiError> {
    ensure_permission(&auth, Permission::ReadUser)?;
    let user_id = decode_path_id(&raw_id, EntityKind::User)?;

    let principal = state.auth.find_user(&user_id).await?;
    let roles = state.auth.current_roles(principal.id).await;
    Ok(SuccessBody::new(
        "success",
        "User retrieved successfully",
        UserView::from_principal(&principal, roles)?,
    ))
}

pub async fn update_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(raw_id): Path<String>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<SuccessBody<UserView>, ApiError> {
    ensure_permission(&auth, Permission::UpdateUser)?;
    let user_id = decode_path_id(&raw_id, EntityKind::User)?;

    let principal = state
        .auth
        .update_user(
            &user_id,
            PrincipalChanges {
                full_name: request.full_name,
                email: request.email,
            },
        )
        .await?;
    info!(actor = %auth.claims.subject, user_id = %user_id, "user updated");

    let roles = state.auth.current_roles(principal.id).await;
    Ok(SuccessBody::new(
        "success",
        "User updated successfully",
        UserView::from_principal(&principal, roles)?,
    ))
}

pub async fn assign_user_roles(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(raw_id): Path<String>,
    Json(request): Json<AssignRolesRequest>,
) -> Result<SuccessBody<Vec<String>>, ApiError> {
    ensure_permission(&auth, Permission::ManageRoles)?;
    let user_id = decode_path_id(&raw_id, EntityKind::User)?;

    let role_ids = request
        .role_ids
        .iter()
        .map(|raw| {
            OpaqueId::decode_as(raw, EntityKind::Role)
                .map_err(|err| ApiError::invalid_field("invalid_id", "role_ids", err.to_string()))
                .and_then(|id| {
                    u32::try_from(id.local_id())
                        .map_err(|_| ApiError::invalid_field("invalid_id", "role_ids", "unknown role"))
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let roles = state.auth.assign_roles(&user_id, &role_ids).await?;
    info!(
        actor = %auth.claims.subject,
        user_id = %user_id,
        roles = ?roles,
        "roles replaced"
    );
    Ok(SuccessBody::new("success", "Roles updated successfully", roles))
}

pub async fn delete_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(raw_id): Path<String>,
) -> Result<SuccessBody<()>, ApiError> {
    ensure_role(&auth, USER_DELETE_ROLES)?;
    let user_id = decode_path_id(&raw_id, EntityKind::User)?;

    state.auth.delete_user(&user_id).await?;
    info!(actor = %auth.claims.subject, user_id = %user_id, "user deleted");
    Ok(SuccessBody::new("success", "User deleted successfully", ()))
}
