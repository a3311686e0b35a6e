use axum::http::HeaderMap;

/// Extract the bearer token from the Authorization header.
///
/// The token is passed through to the identity provider as-is; validating
/// it is the provider's job. Anything other than a well-formed
/// `Bearer <token>` header yields `None`, which the handler reports as a
/// single 401 shape regardless of how the header was malformed.
pub fn extract_bearer(headers: &HeaderMap) -> Option<String> {
    let auth_str = headers.get("authorization")?.to_str().ok()?;
    let token = auth_str.strip_prefix("Bearer ")?;

    if token.is_empty() {
        return None;
    }
    Some(token.to_string())
}
