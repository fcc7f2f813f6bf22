//! Content digests for tamper detection.
//!
//! The tamper gate compares the SHA-256 of the uploaded bytes with the digest
//! of the enrolled original. This is a cryptographic hash, not a perceptual
//! one: a re-encoded or recompressed image produces a different digest and is
//! reported as tampered.
//!
//! Digests travel as 64-character lowercase hex strings, which is also the
//! format of enrollment side files.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{Result, VerifyError};

/// Digest size in bytes (256 bits).
pub const DIGEST_SIZE: usize = 32;

/// SHA-256 digest of an image file's raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ImageDigest([u8; DIGEST_SIZE]);

impl ImageDigest {
    /// Compute the digest of raw image bytes.
    pub fn of(data: &[u8]) -> Self {
        let result = Sha256::digest(data);

        let mut digest = [0u8; DIGEST_SIZE];
        digest.copy_from_slice(&result);
        Self(digest)
    }

    /// Read a file and compute its digest.
    pub fn of_file(path: &Path) -> Result<Self> {
        let data = std::fs::read(path).map_err(|source| VerifyError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let digest = Self::of(&data);
        debug!(path = %path.display(), digest = %digest, "Hashed image file");
        Ok(digest)
    }

    /// Lowercase hex encoding (64 characters).
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a hex digest. Surrounding whitespace is ignored and either case
    /// is accepted, so side files with a trailing newline load cleanly.
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let trimmed = hex_str.trim();
        hex::decode(trimmed)
            .map_err(|e| VerifyError::InvalidDigest(format!("Invalid hex string: {e}")))?
            .try_into()
            .map(Self)
            .map_err(|v: Vec<u8>| {
                VerifyError::InvalidDigest(format!(
                    "Expected {DIGEST_SIZE} bytes, got {}",
                    v.len()
                ))
            })
    }
}

impl fmt::Display for ImageDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl TryFrom<String> for ImageDigest {
    type Error = VerifyError;

    fn try_from(value: String) -> Result<Self> {
        Self::from_hex(&value)
    }
}

impl From<ImageDigest> for String {
    fn from(digest: ImageDigest) -> Self {
        digest.to_hex()
    }
}

/// Whether a candidate differs from the enrolled reference.
pub fn is_tampered(candidate: &ImageDigest, reference: &ImageDigest) -> bool {
    candidate != reference
}
