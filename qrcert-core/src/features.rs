//! URL feature extraction.
//!
//! The classifier only understands vectors built exactly the way its training
//! data was built, so the feature layout is data rather than code: a
//! [`FeatureSchema`] names the features, their order and the normalization,
//! and ships as a JSON sidecar next to the model. [`ModelBundle`] refuses to load a
//! model whose schema differs from the configured one.
//!
//! Component splitting mirrors the training pipeline: the *domain* is the
//! authority as written (userinfo, host and port) and the *path* stops at the
//! query or fragment. Neither is re-encoded or percent-decoded.
//!
//! [`ModelBundle`]: crate::classifier::ModelBundle

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VerifyError};
use crate::resolver::ShortenerList;

/// Name of the domain-composition schema.
pub const DOMAIN_V1: &str = "domain-v1";

/// Name of the lexical-statistics schema.
pub const LEXICAL_V1: &str = "lexical-v1";

/// Ordered numeric features fed to the classifier.
pub type FeatureVector = Vec<f32>;

/// A single numeric attribute derived from a URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    /// Characters in the full URL.
    UrlLength,
    /// Characters in the authority component.
    DomainLength,
    /// Characters in the path component.
    PathLength,
    /// `/` occurrences in the full URL.
    SlashCount,
    /// `.` occurrences in the full URL.
    DotCount,
    /// `-` occurrences in the full URL.
    HyphenCount,
    /// `.` occurrences in the authority.
    SubdomainCount,
    /// 1 when the host is a known shortener.
    IsShortened,
    /// 1 when the authority contains "hospital".
    ContainsHospital,
    /// 1 when the authority contains "medical".
    ContainsMedical,
    /// 1 when the authority contains "clinic".
    ContainsClinic,
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::UrlLength => "url_length",
            Self::DomainLength => "domain_length",
            Self::PathLength => "path_length",
            Self::SlashCount => "slash_count",
            Self::DotCount => "dot_count",
            Self::HyphenCount => "hyphen_count",
            Self::SubdomainCount => "subdomain_count",
            Self::IsShortened => "is_shortened",
            Self::ContainsHospital => "contains_hospital",
            Self::ContainsMedical => "contains_medical",
            Self::ContainsClinic => "contains_clinic",
        };
        f.write_str(name)
    }
}

/// Versioned description of a feature vector layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    /// Schema identifier, e.g. `domain-v1`.
    pub version: String,
    /// Features in vector order.
    pub features: Vec<FeatureKind>,
    /// Lowercase the authority before keyword tests.
    #[serde(default)]
    pub case_fold: bool,
}

impl FeatureSchema {
    /// Domain/path composition features.
    pub fn domain_v1() -> Self {
        Self {
            version: DOMAIN_V1.to_string(),
            features: vec![
                FeatureKind::DomainLength,
                FeatureKind::SubdomainCount,
                FeatureKind::ContainsHospital,
                FeatureKind::ContainsMedical,
                FeatureKind::ContainsClinic,
                FeatureKind::PathLength,
            ],
            case_fold: true,
        }
    }

    /// Lexical URL statistics.
    pub fn lexical_v1() -> Self {
        Self {
            version: LEXICAL_V1.to_string(),
            features: vec![
                FeatureKind::UrlLength,
                FeatureKind::DomainLength,
                FeatureKind::SlashCount,
                FeatureKind::DotCount,
                FeatureKind::HyphenCount,
                FeatureKind::IsShortened,
            ],
            case_fold: false,
        }
    }

    /// Look up a built-in schema by name.
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            DOMAIN_V1 => Some(Self::domain_v1()),
            LEXICAL_V1 => Some(Self::lexical_v1()),
            _ => None,
        }
    }

    /// Load a schema from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read(path).map_err(|source| VerifyError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let schema: Self = serde_json::from_slice(&data).map_err(|e| {
            VerifyError::SchemaMismatch(format!("Invalid schema file {}: {e}", path.display()))
        })?;
        schema.validate()?;
        Ok(schema)
    }

    /// Resolve a preset name, falling back to treating it as a file path.
    pub fn from_name_or_path(value: &str) -> Result<Self> {
        match Self::preset(value) {
            Some(schema) => Ok(schema),
            None => Self::load(Path::new(value)),
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Reject empty schemas and duplicated features.
    pub fn validate(&self) -> Result<()> {
        if self.features.is_empty() {
            return Err(VerifyError::SchemaMismatch(format!(
                "Schema '{}' has no features",
                self.version
            )));
        }
        for (i, kind) in self.features.iter().enumerate() {
            if self.features[..i].contains(kind) {
                return Err(VerifyError::SchemaMismatch(format!(
                    "Schema '{}' lists '{kind}' twice",
                    self.version
                )));
            }
        }
        Ok(())
    }

    /// Describe the first difference from another schema, if any.
    pub fn diff(&self, other: &Self) -> Option<String> {
        if self.version != other.version {
            return Some(format!(
                "version '{}' != '{}'",
                self.version, other.version
            ));
        }
        if self.features != other.features {
            let names = |s: &Self| {
                s.features
                    .iter()
                    .map(|f| f.to_string())
                    .collect::<Vec<_>>()
                    .join(",")
            };
            return Some(format!("features [{}] != [{}]", names(self), names(other)));
        }
        if self.case_fold != other.case_fold {
            return Some(format!(
                "case_fold {} != {}",
                self.case_fold, other.case_fold
            ));
        }
        None
    }
}

/// Converts URLs to feature vectors for one schema.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    schema: FeatureSchema,
    shorteners: ShortenerList,
}

impl FeatureExtractor {
    pub fn new(schema: FeatureSchema, shorteners: ShortenerList) -> Self {
        Self { schema, shorteners }
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Build the feature vector for `url`, in schema order.
    pub fn extract(&self, url: &str) -> FeatureVector {
        let parts = UrlParts::split(url);
        let domain = if self.schema.case_fold {
            parts.netloc.to_lowercase()
        } else {
            parts.netloc.to_string()
        };

        self.schema
            .features
            .iter()
            .map(|kind| match kind {
                FeatureKind::UrlLength => char_len(url),
                FeatureKind::DomainLength => char_len(parts.netloc),
                FeatureKind::PathLength => char_len(parts.path),
                FeatureKind::SlashCount => count(url, '/'),
                FeatureKind::DotCount => count(url, '.'),
                FeatureKind::HyphenCount => count(url, '-'),
                FeatureKind::SubdomainCount => count(&domain, '.'),
                FeatureKind::IsShortened => flag(self.shorteners.is_shortened(url)),
                FeatureKind::ContainsHospital => flag(domain.contains("hospital")),
                FeatureKind::ContainsMedical => flag(domain.contains("medical")),
                FeatureKind::ContainsClinic => flag(domain.contains("clinic")),
            })
            .collect()
    }
}

/// Authority and path of a URL, split without normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct UrlParts<'a> {
    netloc: &'a str,
    path: &'a str,
}

impl<'a> UrlParts<'a> {
    fn split(url: &'a str) -> Self {
        let without_fragment = url.split('#').next().unwrap_or_default();
        let without_query = without_fragment.split('?').next().unwrap_or_default();

        // Only an explicit "scheme://" introduces an authority.
        let after_scheme = match url.find("://") {
            Some(i) if is_scheme(&url[..i]) => &without_query[(i + 3).min(without_query.len())..],
            _ => {
                return Self {
                    netloc: "",
                    path: without_query,
                }
            }
        };

        let end = after_scheme.find('/').unwrap_or(after_scheme.len());
        Self {
            netloc: &after_scheme[..end],
            path: &after_scheme[end..],
        }
    }
}

fn is_scheme(candidate: &str) -> bool {
    let mut chars = candidate.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

fn char_len(s: &str) -> f32 {
    s.chars().count() as f32
}

fn count(s: &str, needle: char) -> f32 {
    s.matches(needle).count() as f32
}

fn flag(value: bool) -> f32 {
    if value {
        1.0
    } else {
        0.0
    }
}
