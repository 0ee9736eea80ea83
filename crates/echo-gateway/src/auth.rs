//! Bearer-token gate for the worker endpoints.
//!
//! The expected token is the configured worker secret, compared for exact
//! equality. A missing or blank secret means the endpoint is closed to
//! everyone — there is no "no auth configured, allow all" mode.

use axum::http::HeaderMap;

/// Verify a static bearer token in the `Authorization: Bearer <token>` header.
pub fn verify_bearer(headers: &HeaderMap, secret: Option<&str>) -> Result<(), String> {
    let expected = secret
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| "no worker secret configured".to_string())?;

    let auth_header = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| "missing Authorization header".to_string())?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| "Authorization header must use Bearer scheme".to_string())?;

    if token == expected {
        Ok(())
    } else {
        Err("bearer token mismatch".to_string())
    }
}
