use axum::{
    http::{HeaderMap, StatusCode},
    response::Json,
};
use serde_json::{json, Value};

use crate::config;
use crate::error::ApiError;
use crate::identity::IdentityClient;
use crate::middleware::auth::extract_bearer;

/// POST / - Delete the calling user's own account
///
/// Verifies the caller's bearer token against the identity provider,
/// resolves their user id, then removes the account through the
/// provider's admin API using the service-role key. The two upstream
/// calls are strictly sequential; no step is retried.
///
/// Expected Output (Success):
/// ```json
/// { "ok": true }
/// ```
///
/// Expected Output (Failure):
/// ```json
/// { "error": "string", "details": "optional upstream diagnostic" }
/// ```
pub async fn delete_account(headers: HeaderMap) -> Result<Json<Value>, ApiError> {
    let (base_url, service_role_key) = config::config()
        .identity
        .resolved()
        .ok_or(ApiError::ConfigurationMissing)?;

    let token = extract_bearer(&headers).ok_or(ApiError::CredentialMissing)?;

    let identity = IdentityClient::new(base_url, service_role_key)?;

    let user_id = identity.current_user(&token).await.map_err(|e| {
        tracing::warn!("caller verification failed: {}", e);
        ApiError::from(e)
    })?;

    tracing::info!(user_id = %user_id, "account deletion requested");

    identity.delete_user(&user_id).await.map_err(|e| {
        tracing::warn!(user_id = %user_id, "account deletion failed: {}", e);
        ApiError::from(e)
    })?;

    tracing::info!(user_id = %user_id, "account deleted");

    Ok(Json(json!({ "ok": true })))
}

/// OPTIONS / - Browser preflight
///
/// Empty 204; the CORS headers come from the response layer.
pub async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// Any other method on / answers 405 with the standard error shape.
pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}
