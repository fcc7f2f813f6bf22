//! Exit codes following sysexits.h conventions.
//!
//! These codes provide semantic meaning for different failure modes,
//! enabling scripts and CI systems to handle errors appropriately.

use qrcert_core::{VerdictKind, VerifyError};

use crate::commands::verify::VerdictFailure;

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// General error (catch-all).
pub const GENERAL_ERROR: i32 = 1;

/// Data format error (tampered or fake certificate, no QR code).
/// Maps to EX_DATAERR from sysexits.h.
pub const VERIFICATION_FAILED: i32 = 65;

/// Cannot open input file.
/// Maps to EX_NOINPUT from sysexits.h.
pub const INPUT_ERROR: i32 = 66;

/// Service unavailable (shortened URL could not be resolved).
/// Maps to EX_UNAVAILABLE from sysexits.h.
pub const NETWORK_ERROR: i32 = 69;

/// Configuration error (no reference enrolled, bad model or schema).
/// Maps to EX_CONFIG from sysexits.h.
pub const CONFIG_ERROR: i32 = 78;

/// Represents an exit code with optional error context.
pub struct ExitCode {
    pub code: i32,
    pub message: Option<String>,
}

impl ExitCode {
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");

        // Classify error by inspecting the chain
        let code = if let Some(VerdictFailure(kind)) = err.downcast_ref::<VerdictFailure>() {
            verdict_code(*kind)
        } else if let Some(e) = err.chain().find_map(|c| c.downcast_ref::<VerifyError>()) {
            verify_error_code(e)
        } else if err.chain().any(|c| c.is::<std::io::Error>()) {
            INPUT_ERROR
        } else {
            GENERAL_ERROR
        };

        Self {
            code,
            message: Some(message),
        }
    }
}

fn verdict_code(kind: VerdictKind) -> i32 {
    match kind {
        VerdictKind::Real => SUCCESS,
        VerdictKind::Tampered | VerdictKind::Fake | VerdictKind::NoQrFound => VERIFICATION_FAILED,
        VerdictKind::ResolutionFailed => NETWORK_ERROR,
        VerdictKind::Unverifiable => CONFIG_ERROR,
    }
}

fn verify_error_code(err: &VerifyError) -> i32 {
    match err {
        VerifyError::Read { .. } | VerifyError::Decode(_) => INPUT_ERROR,
        VerifyError::Resolution(_) => NETWORK_ERROR,
        VerifyError::ModelUnavailable(_)
        | VerifyError::SchemaMismatch(_)
        | VerifyError::InvalidDigest(_)
        | VerifyError::Store(_) => CONFIG_ERROR,
        VerifyError::Cancelled { .. } | VerifyError::Inference(_) => GENERAL_ERROR,
    }
}
