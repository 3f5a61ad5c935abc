use std::sync::Arc;

use axum::extract::{FromRef, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{middleware, Router};
use common_auth::JwtVerifier;
use common_http_errors::ApiError;
use common_ids::{EntityKind, OpaqueId};
use common_observability::track_http_errors;
use tracing::warn;

use crate::auth_handlers::{login_user, refresh_session, register_user};
use crate::metrics::IdentityMetrics;
use crate::role_handlers::{list_permissions, list_roles, role_permissions};
use crate::service::AuthService;
use crate::user_handlers::{
    assign_user_roles, current_user, delete_user, get_user, list_users, update_user,
};

#[derive(Clone)]
pub struct AppState {
    pub auth: AuthService,
    pub jwt_verifier: Arc<JwtVerifier>,
    pub metrics: Arc<IdentityMetrics>,
}

impl AppState {
    pub fn new(auth: AuthService, metrics: Arc<IdentityMetrics>) -> Self {
        let jwt_verifier = auth.signer().access_verifier();
        Self {
            auth,
            jwt_verifier,
            metrics,
        }
    }

    pub fn record_login_metric(&self, outcome: &str) {
        self.metrics.login_attempt(outcome);
    }

    pub fn record_refresh_metric(&self, outcome: &str) {
        self.metrics.refresh_attempt(outcome);
    }
}

impl FromRef<AppState> for Arc<JwtVerifier> {
    fn from_ref(state: &AppState) -> Self {
        state.jwt_verifier.clone()
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn metrics_endpoint(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(response) => response,
        Err(err) => {
            warn!(error = %err, "failed to render metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Every route the service exposes, with the error counter attached.
pub fn build_router(state: AppState) -> Router {
    let error_metrics = state.metrics.http_errors().clone();

    Router::new()
        .route("/healthz", get(health))
        .route("/metrics", get(metrics_endpoint))
        .route("/api/v1/login", post(login_user))
        .route("/api/v1/refresh", post(refresh_session))
        .route("/api/v1/register", post(register_user))
        .route("/api/v1/me", get(current_user))
        .route("/api/v1/users", get(list_users))
        .route(
            "/api/v1/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/api/v1/users/:id/roles", put(assign_user_roles))
        .route("/api/v1/roles", get(list_roles))
        .route("/api/v1/roles/:id/permissions", get(role_permissions))
        .route("/api/v1/permissions", get(list_permissions))
        .with_state(state)
        .layer(middleware::from_fn_with_state(error_metrics, track_http_errors))
}

/// Decode a client-supplied identifier of the given kind. Any failure is a 400.
pub(crate) fn decode_path_id(raw: &str, kind: EntityKind) -> Result<OpaqueId, ApiError> {
    OpaqueId::decode_as(raw, kind)
        .map_err(|err| ApiError::invalid_field("invalid_id", "id", err.to_string()))
}

/// Public identifier for a catalog or store row.
pub(crate) fn public_id(local_id: u64, kind: EntityKind) -> Result<OpaqueId, ApiError> {
    OpaqueId::new(local_id, kind).map_err(ApiError::internal)
}
