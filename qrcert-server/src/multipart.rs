//! Multipart form parsing helpers
//!
//! Both upload endpoints take a single image under `image` (or `file`, for
//! clients written against the generic form name).

use axum::extract::Multipart;

use crate::error::ApiError;
use crate::validation::{validate_content_type, validate_file_size};

/// Field names accepted for the uploaded image
pub const IMAGE_FIELDS: &[&str] = &["image", "file"];

/// Represents an image uploaded via multipart form
#[derive(Debug, Clone)]
pub struct FileField {
    /// File data bytes
    pub data: Vec<u8>,
    /// Content-Type from the multipart field (if provided)
    pub content_type: Option<String>,
    /// Original filename from the multipart field (if provided)
    pub file_name: Option<String>,
}

/// Parsed multipart form fields
#[derive(Debug, Default)]
pub struct MultipartFields {
    file: Option<FileField>,
}

impl MultipartFields {
    /// Parse the image field from a multipart request
    ///
    /// Content-Type and size are validated as the field is read. Unknown
    /// fields are drained and ignored; if several image fields are sent the
    /// first wins.
    pub async fn parse(multipart: &mut Multipart, max_file_size: usize) -> Result<Self, ApiError> {
        let mut file: Option<FileField> = None;

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to parse multipart: {}", e)))?
        {
            let name = field.name().unwrap_or("").to_string();
            if !IMAGE_FIELDS.contains(&name.as_str()) || file.is_some() {
                continue;
            }

            let content_type = field.content_type().map(|s| s.to_string());
            let file_name = field.file_name().map(|s| s.to_string());
            validate_content_type(content_type.as_deref())?;

            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(format!("Failed to read file: {}", e)))?
                .to_vec();
            validate_file_size(data.len(), max_file_size)?;

            file = Some(FileField {
                data,
                content_type,
                file_name,
            });
        }

        Ok(Self { file })
    }

    /// Consume the form, returning the image field
    pub fn into_file(self) -> Result<FileField, ApiError> {
        self.file.ok_or_else(missing_image)
    }
}

fn missing_image() -> ApiError {
    ApiError::bad_request("No image provided. Use 'image' field in multipart form.")
}
