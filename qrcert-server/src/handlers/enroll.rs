//! Reference enrollment handler
//!
//! Handles POST /enroll requests that register the genuine certificate image.

use axum::{extract::Multipart, extract::State, http::StatusCode, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::archive::archive_upload;
use crate::auth::EnrollAuthorized;
use crate::error::ApiError;
use crate::multipart::MultipartFields;
use crate::state::AppState;

/// Response for a successful enrollment
#[derive(Serialize, ToSchema)]
pub struct EnrollResponse {
    /// Hex-encoded SHA-256 digest now used as the reference
    #[schema(example = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")]
    pub digest: String,
}

/// Enroll the reference certificate image
///
/// Accepts multipart/form-data with:
/// - **image** (required): The genuine certificate image (`file` is also accepted)
///
/// The image's SHA-256 digest replaces any previously enrolled reference.
/// Later uploads to `/verify` whose bytes differ are reported as tampered.
/// Requires `Authorization: Bearer <ENROLL_TOKEN>` when the server has a token configured.
#[utoipa::path(
    post,
    path = "/enroll",
    tag = "Enrollment",
    request_body(
        content_type = "multipart/form-data",
        description = "Reference certificate image"
    ),
    responses(
        (status = 201, description = "Reference enrolled", body = EnrollResponse),
        (status = 400, description = "Invalid request (missing image, unsupported type, too large)"),
        (status = 401, description = "Missing or invalid enrollment token"),
        (status = 500, description = "Reference could not be stored"),
        (status = 503, description = "Server shutting down")
    ),
    security(("bearer" = []))
)]
pub async fn enroll_handler(
    State(state): State<AppState>,
    _auth: EnrollAuthorized,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<EnrollResponse>), ApiError> {
    if state.shutdown.is_cancelled() {
        return Err(ApiError::service_unavailable("Server is shutting down"));
    }

    let file = MultipartFields::parse(&mut multipart, state.max_file_size)
        .await?
        .into_file()?;

    if let Some(dir) = &state.upload_dir {
        archive_upload(dir, &file).await;
    }

    let digest = qrcert_core::enroll(state.references().as_ref(), &file.data).await?;
    tracing::info!(digest = %digest, bytes = file.data.len(), "Reference image enrolled");

    Ok((
        StatusCode::CREATED,
        Json(EnrollResponse {
            digest: digest.to_hex(),
        }),
    ))
}
