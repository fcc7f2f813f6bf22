//! QRCert Core - hospital certificate QR verification
//!
//! This crate decides whether an uploaded certificate image is genuine by
//! running it through a short-circuiting pipeline:
//!
//! - SHA-256 tamper detection against an enrolled reference image
//! - QR payload extraction (`rqrr`)
//! - Exact-match allow-list of known-good certificate URLs
//! - Bounded resolution of shortened URLs
//! - Feature extraction and an ONNX gradient-boosted tree classifier (`ort`)
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use qrcert_core::{
//!     FeatureSchema, FileReferenceStore, ModelBundle, VerificationPipeline,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> qrcert_core::Result<()> {
//! let model = ModelBundle::load(
//!     Path::new("models/hospital-url-domain-v1.onnx"),
//!     &FeatureSchema::domain_v1(),
//! )?;
//! let references = Arc::new(FileReferenceStore::new("original_qr_hash.txt"));
//!
//! let pipeline = VerificationPipeline::builder(references, model.classifier()).build()?;
//!
//! let image = std::fs::read("certificate.png").unwrap_or_default();
//! let verdict = pipeline.verify(&image, &CancellationToken::new()).await?;
//! println!("{}", verdict.kind.description());
//! # Ok(())
//! # }
//! ```

pub mod classifier;
pub mod digest;
pub mod error;
pub mod features;
pub mod pipeline;
pub mod qr;
pub mod reference;
pub mod resolver;

// Re-export main types for convenience
pub use classifier::{Classifier, Label, ModelBundle, OnnxClassifier};
pub use digest::{is_tampered, ImageDigest, DIGEST_SIZE};
pub use error::{Result, VerifyError};
pub use features::{FeatureExtractor, FeatureKind, FeatureSchema, FeatureVector};
pub use pipeline::{AllowList, PipelineBuilder, Stage, Verdict, VerdictKind, VerificationPipeline};
pub use qr::{QrDecoder, RqrrDecoder};
pub use reference::{enroll, FileReferenceStore, MemoryReferenceStore, ReferenceStore};
pub use resolver::{HttpResolver, HttpResolverConfig, ShortenerList, UrlResolver};
