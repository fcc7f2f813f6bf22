//! API error handling module
//!
//! Provides a unified error type for all API endpoints with structured error variants.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use qrcert_core::{Verdict, VerdictKind, VerifyError};
use thiserror::Error;

/// API error type with structured variants for different error categories
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad request - client provided invalid input
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Unauthorized - missing or invalid enrollment token
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Service unavailable - the server is draining for shutdown
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// The pipeline finished but could not judge the upload
    #[error("{}", .0.kind.description())]
    Inconclusive(Verdict),

    /// QRCert core error - infrastructure failure inside the pipeline
    #[error("Verification error: {0}")]
    Verify(#[from] VerifyError),
}

impl ApiError {
    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Create an unauthorized error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    /// Create a service unavailable error
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable(message.into())
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::Inconclusive(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Verify(ref e) => match e {
                // Upstream or shutdown conditions → 503
                VerifyError::Resolution(_)
                | VerifyError::ModelUnavailable(_)
                | VerifyError::Cancelled { .. } => StatusCode::SERVICE_UNAVAILABLE,

                // Client-provided undecodable image → 400
                VerifyError::Decode(_) => StatusCode::BAD_REQUEST,

                // Server-side state or deployment faults → 500
                VerifyError::Read { .. }
                | VerifyError::SchemaMismatch(_)
                | VerifyError::Inference(_)
                | VerifyError::InvalidDigest(_)
                | VerifyError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Get the error code for programmatic error handling
    fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "INVALID_INPUT",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            Self::Inconclusive(verdict) => match verdict.kind {
                VerdictKind::NoQrFound => "NO_QR_FOUND",
                VerdictKind::ResolutionFailed => "RESOLUTION_FAILED",
                VerdictKind::Unverifiable => "REFERENCE_NOT_ENROLLED",
                _ => "INCONCLUSIVE",
            },
            Self::Verify(ref e) => match e {
                VerifyError::Read { .. } => "READ_ERROR",
                VerifyError::Decode(_) => "DECODE_ERROR",
                VerifyError::Resolution(_) => "UPSTREAM_ERROR",
                VerifyError::ModelUnavailable(_) => "MODEL_UNAVAILABLE",
                VerifyError::SchemaMismatch(_) => "SCHEMA_MISMATCH",
                VerifyError::Inference(_) => "INFERENCE_ERROR",
                VerifyError::InvalidDigest(_) => "INVALID_REFERENCE",
                VerifyError::Store(_) => "REFERENCE_STORE_ERROR",
                VerifyError::Cancelled { .. } => "CANCELLED",
            },
        }
    }

    /// Get sanitized error message for client response
    fn client_message(&self) -> String {
        match self {
            // For core errors, sanitize internal details
            Self::Verify(ref e) => match e {
                VerifyError::Read { .. } => "Failed to read stored data".to_string(),
                VerifyError::Decode(_) => "Image could not be decoded".to_string(),
                VerifyError::Resolution(_) => "Upstream service error".to_string(),
                VerifyError::ModelUnavailable(_) => "Classifier unavailable".to_string(),
                VerifyError::Inference(_) => "Classification failed".to_string(),
                VerifyError::SchemaMismatch(_) => {
                    "Classifier misconfigured".to_string()
                }
                VerifyError::InvalidDigest(_) => "Stored reference digest is invalid".to_string(),
                VerifyError::Store(_) => "Reference store error".to_string(),
                VerifyError::Cancelled { .. } => "Verification was cancelled".to_string(),
            },
            // For other errors, use the Display message
            _ => self.to_string(),
        }
    }

    /// Get the error category for logging
    fn error_category(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::Unauthorized(_) => "unauthorized",
            Self::ServiceUnavailable(_) => "service_unavailable",
            Self::Inconclusive(_) => "inconclusive",
            Self::Verify(_) => "verify",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let category = self.error_category();
        let code = self.error_code();
        let internal_message = self.to_string();
        let client_message = self.client_message();

        // Log based on severity, always including internal details
        match &self {
            Self::BadRequest(_) | Self::Inconclusive(_) => {
                tracing::warn!(
                    status = %status,
                    category = category,
                    code = code,
                    error = %internal_message,
                    "Client error"
                );
            }
            Self::Unauthorized(_) => {
                tracing::warn!(
                    status = %status,
                    category = category,
                    code = code,
                    error = %internal_message,
                    "Authentication error"
                );
            }
            Self::ServiceUnavailable(_) => {
                tracing::warn!(
                    status = %status,
                    category = category,
                    code = code,
                    error = %internal_message,
                    "Service unavailable"
                );
            }
            // For core errors, log full internal details
            Self::Verify(_) => {
                tracing::error!(
                    status = %status,
                    category = category,
                    code = code,
                    error = %internal_message,
                    client_message = %client_message,
                    "Verification error (internal details logged)"
                );
            }
        }

        // All error responses include a `code` field for programmatic error handling
        let mut body = serde_json::json!({
            "error": client_message,
            "code": code,
        });

        // Inconclusive verdicts keep the verdict fields alongside the error
        if let Self::Inconclusive(verdict) = &self {
            if let (Ok(serde_json::Value::Object(fields)), Some(map)) =
                (serde_json::to_value(verdict), body.as_object_mut())
            {
                map.extend(fields);
            }
        }

        (status, Json(body)).into_response()
    }
}
