//! Subcommand implementations.

pub mod enroll;
pub mod features;
pub mod hash;
pub mod verify;

/// Bundled classifier, relative to the working directory.
pub const DEFAULT_MODEL_PATH: &str = "models/hospital-url-domain-v1.onnx";
