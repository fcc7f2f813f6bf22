//! Enrollment authorization
//!
//! POST /enroll replaces the reference digest, so it can be guarded by a
//! static bearer token (`ENROLL_TOKEN`). Without one configured, enrollment is
//! open; the server warns about this at startup.

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::ApiError;
use crate::state::AppState;

/// Extract the Bearer token from the Authorization header
fn extract_bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    let auth_header = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(|| ApiError::unauthorized("Missing Authorization header"))?;

    let auth_value = auth_header
        .to_str()
        .map_err(|_| ApiError::unauthorized("Invalid Authorization header encoding"))?;

    auth_value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .ok_or_else(|| ApiError::unauthorized("Authorization header must use Bearer scheme"))
}

/// Marker extractor: the caller may enroll a reference image.
pub struct EnrollAuthorized;

impl FromRequestParts<AppState> for EnrollAuthorized {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.enroll_token.as_deref() else {
            return Ok(Self);
        };

        let token = extract_bearer_token(parts)?;
        if token != expected {
            return Err(ApiError::unauthorized("Invalid enrollment token"));
        }
        Ok(Self)
    }
}
