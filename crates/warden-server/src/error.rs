//! Error types for the HTTP gateway

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Result type for gateway operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for gateway operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed request body or missing required field
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Authentication failed (invalid or missing token)
    #[error("authentication failed: {0}")]
    Unauthorized(String),

    /// Authenticated but not allowed (missing tenant claim or permission)
    #[error("authorization failed: {0}")]
    Forbidden(String),

    /// Requested entity does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Entity already exists
    #[error("conflict: {0}")]
    Conflict(String),

    /// Upstream directory or key endpoint failed
    #[error("upstream error: {0}")]
    BadGateway(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal server error
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::BadGateway(_) => StatusCode::BAD_GATEWAY,
            Error::Config(_) | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Internal details are logged, not returned.
        let message = match &self {
            Error::Config(_) | Error::Internal(_) => {
                tracing::error!(error = %self, "internal error");
                "internal error".to_string()
            }
            other => other.to_string(),
        };

        let body = serde_json::json!({
            "error": message,
            "code": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<warden_authz::Error> for Error {
    fn from(e: warden_authz::Error) -> Self {
        use warden_authz::Error as Authz;
        match &e {
            Authz::MissingTenant { .. } => Error::Forbidden(e.to_string()),
            Authz::Transport { .. } => Error::BadGateway(e.to_string()),
            Authz::NotFound { .. } => Error::NotFound(e.to_string()),
            Authz::Config { .. } => Error::Config(e.to_string()),
            _ if e.is_auth_failure() => Error::Unauthorized(e.to_string()),
            _ => Error::Internal(e.to_string()),
        }
    }
}

impl From<warden_directory::Error> for Error {
    fn from(e: warden_directory::Error) -> Self {
        use warden_directory::Error as Dir;
        match &e {
            Dir::NotFound(_) => Error::NotFound(e.to_string()),
            Dir::AlreadyExists(_) => Error::Conflict(e.to_string()),
            Dir::Backend(_) => Error::BadGateway(e.to_string()),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Internal(e.to_string())
    }
}
