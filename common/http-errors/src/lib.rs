use axum::{http::{StatusCode, HeaderValue}, response::{IntoResponse, Response}, Json};
use serde::Serialize;

pub const ERROR_CODE_HEADER: &str = "X-Error-Code";

#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")] pub detail: Option<serde_json::Value>,
}

/// Success envelope shared by every JSON endpoint.
#[derive(Serialize, Debug)]
pub struct SuccessBody<T: Serialize> {
    pub key: &'static str,
    pub message: String,
    pub data: T,
}

impl<T: Serialize> SuccessBody<T> {
    pub fn new(key: &'static str, message: impl Into<String>, data: T) -> Self {
        Self { key, message: message.into(), data }
    }
}

impl<T: Serialize> IntoResponse for SuccessBody<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

#[derive(Debug)]
pub enum ApiError {
    /// Login/registration failure tagged with the offending input field.
    InvalidCredentials { field: &'static str, message: String },
    Unauthorized,
    Forbidden { required: Vec<String> },
    BadRequest { code: &'static str, message: String, detail: Option<serde_json::Value> },
    NotFound { code: &'static str },
    Internal,
}

impl ApiError {
    /// Logs the cause and returns the generic 500; the cause never reaches the client.
    pub fn internal<E: std::fmt::Display>(e: E) -> Self {
        tracing::error!(error = %e, "internal error");
        Self::Internal
    }

    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::BadRequest { code, message: message.into(), detail: None }
    }

    pub fn invalid_field(code: &'static str, field: &'static str, message: impl Into<String>) -> Self {
        let message = message.into();
        Self::BadRequest { code, detail: Some(serde_json::json!({ field: message.clone() })), message }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidCredentials { .. } | ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (body, error_code) = match self {
            ApiError::InvalidCredentials { field, message } => (
                ErrorBody { code: "invalid_credentials".into(), message: message.clone(), detail: Some(serde_json::json!({ field: message })) },
                "invalid_credentials"
            ),
            ApiError::Unauthorized => (
                ErrorBody { code: "unauthorized".into(), message: "Unauthorized".into(), detail: None },
                "unauthorized"
            ),
            ApiError::Forbidden { required } => (
                ErrorBody {
                    code: "forbidden".into(),
                    message: "Insufficient permissions".into(),
                    detail: (!required.is_empty()).then(|| serde_json::json!({ "required": required })),
                },
                "forbidden"
            ),
            ApiError::BadRequest { code, message, detail } => (
                ErrorBody { code: code.into(), message, detail },
                code
            ),
            ApiError::NotFound { code } => (
                ErrorBody { code: code.into(), message: "Not found".into(), detail: None },
                code
            ),
            ApiError::Internal => (
                ErrorBody { code: "internal_error".into(), message: "Internal server error".into(), detail: None },
                "internal_error"
            ),
        };
        let mut resp = (status, Json(body)).into_response();
        if let Ok(val) = HeaderValue::from_str(error_code) {
            resp.headers_mut().insert(ERROR_CODE_HEADER, val);
        }
        resp
    }
}
