use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::SecondsFormat;
use common_http_errors::{ApiError, SuccessBody};
use serde::{Deserialize, Serialize};

use crate::service::{RegisterRequest, ServiceError};
use crate::tokens::IssuedTokens;
use crate::user_handlers::UserView;
use crate::AppState;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Deserialize)]
pub struct RegisterBody {
    pub full_name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub refresh_expires_in: i64,
    pub access_token_expires_at: String,
    pub refresh_token_expires_at: String,
}

impl From<IssuedTokens> for TokenResponse {
    fn from(issued: IssuedTokens) -> Self {
        Self {
            access_token: issued.access_token,
            refresh_token: issued.refresh_token,
            token_type: issued.token_type,
            expires_in: issued.access_expires_in,
            refresh_expires_in: issued.refresh_expires_in,
            access_token_expires_at: issued
                .access_expires_at
                .to_rfc3339_opts(SecondsFormat::Secs, true),
            refresh_token_expires_at: issued
                .refresh_expires_at
                .to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

fn login_outcome(err: &ServiceError) -> &'static str {
    match err {
        ServiceError::InvalidCredentials { field: "email", .. } => "unknown_email",
        ServiceError::InvalidCredentials { .. } => "invalid_password",
        _ => "error",
    }
}

pub async fn login_user(
    State(state): State<AppState>,
    Json(login): Json<LoginRequest>,
) -> Result<SuccessBody<TokenResponse>, ApiError> {
    let LoginRequest { email, password } = login;

    match state.auth.login(email.trim(), &password).await {
        Ok(issued) => {
            state.record_login_metric("success");
            Ok(SuccessBody::new("success", "Login successful", issued.into()))
        }
        Err(err) => {
            state.record_login_metric(login_outcome(&err));
            Err(err.into())
        }
    }
}

pub async fn refresh_session(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> Result<SuccessBody<TokenResponse>, ApiError> {
    match state.auth.refresh(request.refresh_token.trim()).await {
        Ok(issued) => {
            state.record_refresh_metric("success");
            Ok(SuccessBody::new(
                "success",
                "Token refreshed successfully",
                issued.into(),
            ))
        }
        Err(err) => {
            let outcome = match err {
                ServiceError::Unauthorized(_) => "unauthorized",
                _ => "error",
            };
            state.record_refresh_metric(outcome);
            Err(err.into())
        }
    }
}

pub async fn register_user(
    State(state): State<AppState>,
    Json(body): Json<RegisterBody>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = state
        .auth
        .register(RegisterRequest {
            full_name: body.full_name,
            email: body.email,
            password: body.password,
        })
        .await?;

    let view = UserView::from_principal(&principal, Vec::new())?;
    Ok((
        StatusCode::CREATED,
        SuccessBody::new("success", "User registered successfully", view),
    ))
}
