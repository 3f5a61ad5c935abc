use axum::response::{IntoResponse, Response};
use common_http_errors::ApiError;
use thiserror::Error;
use tracing::debug;

pub type AuthResult<T> = Result<T, AuthError>;

/// Reasons a bearer token was not accepted. The detail is for logs only;
/// callers see a single opaque 401.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authorization header missing")]
    MissingAuthorization,
    #[error("authorization header malformed")]
    InvalidAuthorization,
    #[error("failed to decode token header: {0}")]
    InvalidHeader(String),
    #[error("token signed with unexpected algorithm {0}")]
    UnexpectedAlgorithm(String),
    #[error("token verification failed: {0}")]
    Verification(String),
    #[error("token expired")]
    Expired,
    #[error("invalid claim '{0}' with value '{1}'")]
    InvalidClaim(&'static str, String),
    #[error("malformed claim payload: {0}")]
    InvalidJson(String),
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(value: jsonwebtoken::errors::Error) -> Self {
        Self::Verification(value.to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(value: AuthError) -> Self {
        debug!(reason = %value, "rejecting bearer token");
        ApiError::Unauthorized
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}
