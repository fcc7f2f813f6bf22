//! QRCert Server Library - REST API components for certificate verification
//!
//! This library exposes the server components for use in integration tests.
//! The main binary uses these same components.

pub mod archive;
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod multipart;
pub mod openapi;
pub mod routes;
pub mod state;
pub mod validation;

pub use config::Config;
pub use error::ApiError;
pub use openapi::ApiDoc;
pub use routes::{create_router, create_router_with_config};
pub use state::AppState;

use std::sync::Arc;

use qrcert_core::{
    AllowList, FeatureSchema, FileReferenceStore, HttpResolver, ModelBundle, ShortenerList,
    VerificationPipeline,
};

/// Build the verification pipeline described by `config`.
///
/// Fails if the feature schema or model cannot be loaded, or if the model was
/// trained on a different schema.
pub fn build_pipeline(config: &Config) -> qrcert_core::Result<VerificationPipeline> {
    let schema = FeatureSchema::from_name_or_path(&config.feature_schema)?;
    let model = ModelBundle::load(&config.model_path, &schema)?;
    let references = Arc::new(FileReferenceStore::new(&config.reference_digest_path));
    let resolver = Arc::new(HttpResolver::with_config(config.resolver_config())?);

    VerificationPipeline::builder(references, model.classifier())
        .resolver(resolver)
        .shorteners(ShortenerList::new(&config.shortener_domains))
        .allow_list(AllowList::new(config.known_good_urls.iter().cloned()))
        .build()
}
