//! Checks applied to an uploaded certificate image before it reaches the
//! pipeline. Magic bytes are not sniffed here; the QR decoder rejects
//! anything it cannot open.

use crate::error::ApiError;

const MIB: usize = 1024 * 1024;

/// `image/*` or raw binary. Media type parameters are ignored.
fn is_image_media_type(media_type: &str) -> bool {
    let essence = media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence.starts_with("image/") || essence == "application/octet-stream"
}

/// Reject a declared non-image part. Parts without a Content-Type pass.
pub fn validate_content_type(content_type: Option<&str>) -> Result<(), ApiError> {
    match content_type {
        Some(ct) if !is_image_media_type(ct) => Err(ApiError::bad_request(format!(
            "Unsupported Content-Type '{ct}': expected image/* or application/octet-stream"
        ))),
        _ => Ok(()),
    }
}

pub fn validate_file_size(size: usize, max_size: usize) -> Result<(), ApiError> {
    match size {
        0 => Err(ApiError::bad_request("Uploaded image is empty")),
        n if n > max_size => Err(ApiError::bad_request(format!(
            "Image is {:.1} MB, the limit is {} MB",
            n as f64 / MIB as f64,
            max_size / MIB
        ))),
        _ => Ok(()),
    }
}
