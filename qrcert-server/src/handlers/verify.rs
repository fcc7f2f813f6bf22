//! Certificate verification handler
//!
//! Handles POST /verify requests by running the upload through the pipeline.

use axum::{extract::Multipart, extract::State, Json};
use qrcert_core::Verdict;
use serde::Serialize;
use utoipa::ToSchema;

use crate::archive::archive_upload;
use crate::error::ApiError;
use crate::multipart::MultipartFields;
use crate::state::AppState;

/// Response for a conclusive verification
#[derive(Debug, Serialize, ToSchema)]
pub struct VerifyResponse {
    /// One of `tampered`, `real`, `fake`
    #[schema(example = "fake")]
    pub verdict: &'static str,
    /// Human-readable explanation of the verdict
    #[schema(example = "Fake Hospital URL")]
    pub message: &'static str,
    /// URL decoded from the QR code
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "https://bit.ly/xyz")]
    pub url: Option<String>,
    /// URL after following shortener redirects
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "https://fake-hospital.net/cert/1")]
    pub resolved_url: Option<String>,
}

impl From<Verdict> for VerifyResponse {
    fn from(verdict: Verdict) -> Self {
        Self {
            verdict: verdict.kind.as_str(),
            message: verdict.kind.description(),
            url: verdict.url,
            resolved_url: verdict.resolved_url,
        }
    }
}

/// Verify an uploaded certificate image
///
/// Accepts multipart/form-data with:
/// - **image** (required): The certificate image (`file` is also accepted)
///
/// Checks, in order, stopping at the first conclusive outcome:
/// - SHA-256 digest against the enrolled reference (`tampered`)
/// - QR code present and decodable (`no_qr_found`)
/// - Exact match against known-good URLs (`real`)
/// - Shortened URLs resolved with one bounded request (`resolution_failed`)
/// - Classifier over the URL's features (`real` / `fake`)
#[utoipa::path(
    post,
    path = "/verify",
    tag = "Verification",
    request_body(
        content_type = "multipart/form-data",
        description = "Certificate image to verify"
    ),
    responses(
        (status = 200, description = "Verdict reached: tampered, real or fake", body = VerifyResponse),
        (status = 400, description = "Invalid upload, or verdict no_qr_found / resolution_failed / unverifiable"),
        (status = 500, description = "Internal server error"),
        (status = 503, description = "Server shutting down or classifier unavailable")
    )
)]
pub async fn verify_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<VerifyResponse>, ApiError> {
    if state.shutdown.is_cancelled() {
        return Err(ApiError::service_unavailable("Server is shutting down"));
    }

    let file = MultipartFields::parse(&mut multipart, state.max_file_size)
        .await?
        .into_file()?;

    if let Some(dir) = &state.upload_dir {
        archive_upload(dir, &file).await;
    }

    let cancel = state.shutdown.child_token();
    let verdict = state.pipeline.verify(&file.data, &cancel).await?;

    if verdict.kind.is_conclusive() {
        Ok(Json(verdict.into()))
    } else {
        Err(ApiError::Inconclusive(verdict))
    }
}
