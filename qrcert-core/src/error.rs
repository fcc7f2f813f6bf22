use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("QR decode error: {0}")]
    Decode(String),

    #[error("URL resolution failed: {0}")]
    Resolution(String),

    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Feature schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Invalid digest: {0}")]
    InvalidDigest(String),

    #[error("Reference store error: {0}")]
    Store(String),

    #[error("Verification cancelled before {stage}")]
    Cancelled { stage: &'static str },

    #[error("Inference failed: {0}")]
    Inference(String),
}

pub type Result<T> = std::result::Result<T, VerifyError>;
