// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::identity::IdentityError;

/// HTTP API error with appropriate status codes and client-friendly messages.
///
/// Every failure is terminal for the invocation: nothing local is mutated
/// before any failure point, so there is no rollback path.
#[derive(Debug)]
pub enum ApiError {
    // 405 Method Not Allowed
    MethodNotAllowed,

    // 500 Internal Server Error
    ConfigurationMissing,

    // 401 Unauthorized
    CredentialMissing,

    // 401 Unauthorized - identity provider rejected the caller's token.
    // `details` carries the upstream body text, read best-effort (empty
    // when the read itself failed).
    UpstreamAuthFailure { details: String },

    // 500 Internal Server Error - whoami response unparseable or without id
    IdentityResolutionFailure,

    // 500 Internal Server Error - admin delete call did not succeed
    DeletionFailure { details: String },

    // 502 Bad Gateway - outbound call never produced a status
    UpstreamUnavailable(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::ConfigurationMissing => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::CredentialMissing => StatusCode::UNAUTHORIZED,
            ApiError::UpstreamAuthFailure { .. } => StatusCode::UNAUTHORIZED,
            ApiError::IdentityResolutionFailure => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::DeletionFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &'static str {
        match self {
            ApiError::MethodNotAllowed => "Method not allowed",
            ApiError::ConfigurationMissing => {
                "Missing SUPABASE_URL or DELETE_ACCOUNT_SERVICE_ROLE_KEY"
            }
            ApiError::CredentialMissing => "Missing Authorization bearer token",
            ApiError::UpstreamAuthFailure { .. } => "Unauthorized",
            ApiError::IdentityResolutionFailure => "Could not determine user id",
            ApiError::DeletionFailure { .. } => "Failed to delete user",
            ApiError::UpstreamUnavailable(_) => "Identity provider unreachable",
        }
    }

    /// Convert to JSON response body: `{"error": ..., "details"?: ...}`.
    /// `details` is attached only where an upstream diagnostic exists; it
    /// may be an empty string when that diagnostic could not be read.
    pub fn to_json(&self) -> Value {
        match self {
            ApiError::UpstreamAuthFailure { details } | ApiError::DeletionFailure { details } => {
                json!({
                    "error": self.message(),
                    "details": details,
                })
            }
            _ => json!({ "error": self.message() }),
        }
    }
}

impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::Unauthorized { details } => ApiError::UpstreamAuthFailure { details },
            IdentityError::MissingUserId => ApiError::IdentityResolutionFailure,
            IdentityError::DeleteFailed { details } => ApiError::DeletionFailure { details },
            IdentityError::Transport(e) => {
                tracing::error!("identity provider request failed: {}", e);
                ApiError::UpstreamUnavailable(e.to_string())
            }
            IdentityError::InvalidBaseUrl(reason) => {
                tracing::error!("configured identity base url is unusable: {}", reason);
                ApiError::UpstreamUnavailable(reason)
            }
        }
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status_code(), Json(self.to_json())).into_response()
    }
}
