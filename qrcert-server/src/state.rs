//! Application state module
//!
//! Defines shared state accessible across all request handlers.

use std::path::PathBuf;
use std::sync::Arc;

use qrcert_core::{ReferenceStore, VerificationPipeline};
use tokio_util::sync::CancellationToken;

use crate::config::Config;

/// Application state containing shared resources.
#[derive(Clone)]
pub struct AppState {
    /// Verification pipeline, shared by all requests
    pub pipeline: Arc<VerificationPipeline>,
    /// Bearer token guarding POST /enroll (None = open enrollment)
    pub enroll_token: Option<Arc<str>>,
    /// Directory uploads are archived into
    pub upload_dir: Option<PathBuf>,
    /// Maximum accepted image size in bytes
    pub max_file_size: usize,
    /// Cancelled on shutdown; each request verifies under a child token
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Build state around a pipeline using the upload and auth settings from `config`.
    pub fn new(pipeline: VerificationPipeline, config: &Config) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            enroll_token: config.enroll_token.as_deref().map(Arc::from),
            upload_dir: config.upload_dir.clone(),
            max_file_size: config.max_file_size(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Store holding the enrolled reference digest
    pub fn references(&self) -> &Arc<dyn ReferenceStore> {
        self.pipeline.references()
    }

    /// Version of the feature schema the classifier was trained on
    pub fn model_schema(&self) -> &str {
        &self.pipeline.extractor().schema().version
    }
}
