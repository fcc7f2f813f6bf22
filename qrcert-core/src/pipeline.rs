//! The verification decision pipeline.
//!
//! Each uploaded image runs through a fixed sequence of gates, any of which may
//! end the request with a [`Verdict`]:
//!
//! 1. **Tamper check** - SHA-256 of the upload against the enrolled reference.
//! 2. **QR decode** - extract the first payload.
//! 3. **Allow-list** - known-good URLs are accepted without further work.
//! 4. **Resolve** - expand shortened URLs with one bounded network call.
//!
//! Requests that pass every gate are classified from the features of the
//! resolved URL. Nothing is retried; a tampered image never reaches the
//! decoder, resolver or model.
//!
//! Expected outcomes, including failures of the image or the network, are
//! verdicts. `Err` is reserved for infrastructure faults: an unreadable
//! reference store, a feature/model mismatch, or cancellation.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::classifier::{Classifier, Label};
use crate::digest::{is_tampered, ImageDigest};
use crate::error::{Result, VerifyError};
use crate::features::FeatureExtractor;
use crate::qr::{QrDecoder, RqrrDecoder};
use crate::reference::ReferenceStore;
use crate::resolver::{HttpResolver, ShortenerList, UrlResolver};

/// Pipeline stage identifiers, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    TamperCheck,
    DecodeQr,
    AllowList,
    Resolve,
    Classify,
}

impl Stage {
    /// Gates run in this order before classification.
    pub const GATES: [Stage; 4] = [
        Stage::TamperCheck,
        Stage::DecodeQr,
        Stage::AllowList,
        Stage::Resolve,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::TamperCheck => "tamper_check",
            Self::DecodeQr => "decode_qr",
            Self::AllowList => "allow_list",
            Self::Resolve => "resolve",
            Self::Classify => "classify",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Terminal outcome of a verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictKind {
    /// Upload digest differs from the enrolled reference.
    Tampered,
    /// No reference digest has been enrolled.
    Unverifiable,
    /// No readable QR payload in the image.
    NoQrFound,
    /// A shortened URL could not be followed.
    ResolutionFailed,
    /// The URL is allow-listed or classified as genuine.
    Real,
    /// The URL is classified as fraudulent.
    Fake,
}

impl VerdictKind {
    /// Wire name, as serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tampered => "tampered",
            Self::Unverifiable => "unverifiable",
            Self::NoQrFound => "no_qr_found",
            Self::ResolutionFailed => "resolution_failed",
            Self::Real => "real",
            Self::Fake => "fake",
        }
    }

    /// Human-readable explanation.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Tampered => "Fake certificate: QR code image has been tampered with",
            Self::Unverifiable => "Original QR hash not found. Cannot verify tampering.",
            Self::NoQrFound => "No QR code detected or unable to extract URL",
            Self::ResolutionFailed => "Could not resolve shortened URL",
            Self::Real => "Real Hospital URL",
            Self::Fake => "Fake Hospital URL",
        }
    }

    /// Whether the pipeline reached a judgement about the certificate, as
    /// opposed to being unable to process the upload.
    pub fn is_conclusive(&self) -> bool {
        matches!(self, Self::Tampered | Self::Real | Self::Fake)
    }
}

impl fmt::Display for VerdictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Label> for VerdictKind {
    fn from(label: Label) -> Self {
        match label {
            Label::Real => Self::Real,
            Label::Fake => Self::Fake,
        }
    }
}

/// Result of one verification request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    #[serde(rename = "verdict")]
    pub kind: VerdictKind,
    /// Payload decoded from the QR code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// URL after shortener expansion; equal to `url` when not shortened.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_url: Option<String>,
}

impl Verdict {
    fn new(kind: VerdictKind) -> Self {
        Self {
            kind,
            url: None,
            resolved_url: None,
        }
    }

    pub fn tampered() -> Self {
        Self::new(VerdictKind::Tampered)
    }

    pub fn unverifiable() -> Self {
        Self::new(VerdictKind::Unverifiable)
    }

    pub fn no_qr_found() -> Self {
        Self::new(VerdictKind::NoQrFound)
    }
}

/// Exact-match list of known-good certificate URLs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    urls: Vec<String>,
}

impl AllowList {
    pub fn new<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            urls: urls.into_iter().map(Into::into).collect(),
        }
    }

    /// Byte-for-byte comparison; no normalization.
    pub fn contains(&self, url: &str) -> bool {
        self.urls.iter().any(|known| known == url)
    }
}

/// Per-request state threaded through the stages.
struct Request<'a> {
    image: &'a [u8],
    url: Option<String>,
    resolved_url: Option<String>,
}

impl Request<'_> {
    fn verdict(&self, kind: VerdictKind) -> Verdict {
        Verdict {
            kind,
            url: self.url.clone(),
            resolved_url: self.resolved_url.clone(),
        }
    }
}

enum Step {
    Advance,
    Done(Verdict),
}

/// End-to-end certificate verification.
///
/// Cheap to share: every collaborator is behind an `Arc`, and a verification
/// keeps all of its state on the stack.
pub struct VerificationPipeline {
    references: Arc<dyn ReferenceStore>,
    decoder: Arc<dyn QrDecoder>,
    allow_list: AllowList,
    shorteners: ShortenerList,
    resolver: Arc<dyn UrlResolver>,
    classifier: Arc<dyn Classifier>,
    extractor: FeatureExtractor,
}

impl VerificationPipeline {
    pub fn builder(
        references: Arc<dyn ReferenceStore>,
        classifier: Arc<dyn Classifier>,
    ) -> PipelineBuilder {
        PipelineBuilder {
            references,
            classifier,
            decoder: None,
            resolver: None,
            shorteners: ShortenerList::default(),
            allow_list: AllowList::default(),
        }
    }

    pub fn references(&self) -> &Arc<dyn ReferenceStore> {
        &self.references
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    /// Verify an uploaded image.
    ///
    /// `cancel` is checked before every stage; a stage already in flight
    /// (including the network call) runs to completion or its own timeout.
    #[instrument(level = "info", skip_all, fields(bytes = image.len()))]
    pub async fn verify(&self, image: &[u8], cancel: &CancellationToken) -> Result<Verdict> {
        let mut request = Request {
            image,
            url: None,
            resolved_url: None,
        };

        for stage in Stage::GATES {
            check_cancelled(cancel, stage)?;
            let step = match stage {
                Stage::TamperCheck => self.tamper_check(&request).await?,
                Stage::DecodeQr => self.decode_qr(&mut request),
                Stage::AllowList => self.allow_list(&mut request),
                Stage::Resolve => self.resolve(&mut request).await,
                Stage::Classify => break,
            };
            if let Step::Done(verdict) = step {
                info!(verdict = %verdict.kind, stage = %stage, "Verification finished");
                return Ok(verdict);
            }
        }

        check_cancelled(cancel, Stage::Classify)?;
        let verdict = self.classify(&request)?;
        info!(verdict = %verdict.kind, stage = %Stage::Classify, "Verification finished");
        Ok(verdict)
    }

    /// Verify an image on disk. An unreadable file is reported as tampered:
    /// if the bytes cannot be checked, they are not trusted.
    pub async fn verify_path(&self, path: &Path, cancel: &CancellationToken) -> Result<Verdict> {
        match tokio::fs::read(path).await {
            Ok(image) => self.verify(&image, cancel).await,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unreadable image, failing closed");
                Ok(Verdict::tampered())
            }
        }
    }

    async fn tamper_check(&self, request: &Request<'_>) -> Result<Step> {
        let Some(reference) = self.references.load().await? else {
            warn!("No reference digest enrolled");
            return Ok(Step::Done(Verdict::unverifiable()));
        };

        let candidate = ImageDigest::of(request.image);
        if is_tampered(&candidate, &reference) {
            warn!(candidate = %candidate, reference = %reference, "Digest mismatch");
            return Ok(Step::Done(Verdict::tampered()));
        }

        debug!(digest = %candidate, "Digest matches reference");
        Ok(Step::Advance)
    }

    fn decode_qr(&self, request: &mut Request<'_>) -> Step {
        match self.decoder.decode(request.image) {
            Ok(Some(url)) => {
                debug!(url = %url, "QR payload extracted");
                request.url = Some(url);
                Step::Advance
            }
            Ok(None) => {
                debug!("No QR payload found");
                Step::Done(Verdict::no_qr_found())
            }
            Err(e) => {
                warn!(error = %e, "QR decoding failed");
                Step::Done(Verdict::no_qr_found())
            }
        }
    }

    fn allow_list(&self, request: &mut Request<'_>) -> Step {
        match request.url.as_deref() {
            Some(url) if self.allow_list.contains(url) => {
                debug!(url = %url, "URL is allow-listed");
                request.resolved_url = Some(url.to_string());
                Step::Done(request.verdict(VerdictKind::Real))
            }
            _ => Step::Advance,
        }
    }

    async fn resolve(&self, request: &mut Request<'_>) -> Step {
        let Some(url) = request.url.as_deref() else {
            return Step::Done(Verdict::no_qr_found());
        };

        if !self.shorteners.is_shortened(url) {
            request.resolved_url = Some(url.to_string());
            return Step::Advance;
        }

        match self.resolver.resolve(url).await {
            Ok(resolved) => {
                request.resolved_url = Some(resolved);
                Step::Advance
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Shortened URL could not be resolved");
                Step::Done(request.verdict(VerdictKind::ResolutionFailed))
            }
        }
    }

    fn classify(&self, request: &Request<'_>) -> Result<Verdict> {
        let Some(url) = request.resolved_url.as_deref() else {
            return Ok(Verdict::no_qr_found());
        };

        let features = self.extractor.extract(url);
        debug!(url = %url, features = ?features, "Extracted features");

        let label = self.classifier.predict(&features)?;
        Ok(request.verdict(label.into()))
    }
}

fn check_cancelled(cancel: &CancellationToken, stage: Stage) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(VerifyError::Cancelled {
            stage: stage.name(),
        });
    }
    Ok(())
}

/// Builder for [`VerificationPipeline`].
pub struct PipelineBuilder {
    references: Arc<dyn ReferenceStore>,
    classifier: Arc<dyn Classifier>,
    decoder: Option<Arc<dyn QrDecoder>>,
    resolver: Option<Arc<dyn UrlResolver>>,
    shorteners: ShortenerList,
    allow_list: AllowList,
}

impl PipelineBuilder {
    pub fn decoder(mut self, decoder: Arc<dyn QrDecoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    pub fn resolver(mut self, resolver: Arc<dyn UrlResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn shorteners(mut self, shorteners: ShortenerList) -> Self {
        self.shorteners = shorteners;
        self
    }

    pub fn allow_list(mut self, allow_list: AllowList) -> Self {
        self.allow_list = allow_list;
        self
    }

    /// Finish the pipeline. The feature extractor always takes its schema
    /// from the classifier, so the two cannot drift apart.
    pub fn build(self) -> Result<VerificationPipeline> {
        let decoder = match self.decoder {
            Some(decoder) => decoder,
            None => Arc::new(RqrrDecoder::new()),
        };
        let resolver = match self.resolver {
            Some(resolver) => resolver,
            None => Arc::new(HttpResolver::new()?),
        };
        let extractor =
            FeatureExtractor::new(self.classifier.schema().clone(), self.shorteners.clone());

        Ok(VerificationPipeline {
            references: self.references,
            decoder,
            allow_list: self.allow_list,
            shorteners: self.shorteners,
            resolver,
            classifier: self.classifier,
            extractor,
        })
    }
}
