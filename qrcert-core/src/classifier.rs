//! Pre-trained URL authenticity classifier.
//!
//! Models are ONNX graphs (a gradient-boosted tree ensemble exported through
//! `TreeEnsembleClassifier`) executed with `ort`. Each `model.onnx` ships with
//! a `model.schema.json` sidecar holding the [`FeatureSchema`] it was trained
//! with; loading compares it against the configured schema and fails instead
//! of producing predictions from a mismatched layout.
//!
//! The graph takes one `float[N, F]` input and must expose an `int64[N]`
//! output named `label`, where `1` means genuine.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use ndarray::Array2;
use ort::session::Session;
use ort::value::TensorRef;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::{Result, VerifyError};
use crate::features::FeatureSchema;

/// Graph output carrying the predicted class.
pub const LABEL_OUTPUT: &str = "label";

/// Class id the model assigns to genuine hospital URLs.
const REAL_CLASS: i64 = 1;

/// Authenticity label produced by a classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    Real,
    Fake,
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Real => write!(f, "Real Hospital URL"),
            Self::Fake => write!(f, "Fake Hospital URL"),
        }
    }
}

/// Opaque trained model consumed by the pipeline.
///
/// Implementations must be thread-safe (`Send + Sync`); the pipeline shares
/// one handle across all requests.
pub trait Classifier: Send + Sync {
    /// Schema the model was trained on.
    fn schema(&self) -> &FeatureSchema;

    /// Classify a feature vector laid out according to [`Classifier::schema`].
    fn predict(&self, features: &[f32]) -> Result<Label>;
}

/// ONNX Runtime session plus the schema read from its sidecar.
pub struct OnnxClassifier {
    session: Mutex<Session>,
    input_name: String,
    schema: FeatureSchema,
}

impl OnnxClassifier {
    /// Sidecar path for a model: `foo.onnx` -> `foo.schema.json`.
    pub fn schema_path(model_path: &Path) -> PathBuf {
        model_path.with_extension("schema.json")
    }

    /// Load the model and its schema sidecar.
    pub fn load(model_path: &Path) -> Result<Self> {
        let schema_path = Self::schema_path(model_path);
        if !schema_path.exists() {
            return Err(VerifyError::ModelUnavailable(format!(
                "Schema sidecar not found: {}",
                schema_path.display()
            )));
        }
        let schema = FeatureSchema::load(&schema_path)?;

        let failed = |e: String| {
            VerifyError::ModelUnavailable(format!("Failed to load {}: {e}", model_path.display()))
        };
        let session = Session::builder()
            .map_err(|e| failed(e.to_string()))?
            .with_intra_threads(1)
            .map_err(|e| failed(e.to_string()))?
            .commit_from_file(model_path)
            .map_err(|e| failed(e.to_string()))?;

        let input_name = match session.inputs.as_slice() {
            [input] => input.name.clone(),
            inputs => {
                return Err(VerifyError::ModelUnavailable(format!(
                    "expected one model input, found {}",
                    inputs.len()
                )))
            }
        };
        if !session.outputs.iter().any(|o| o.name == LABEL_OUTPUT) {
            return Err(VerifyError::ModelUnavailable(format!(
                "model has no '{LABEL_OUTPUT}' output"
            )));
        }

        debug!(input = %input_name, schema = %schema.version, "ONNX session ready");
        Ok(Self {
            session: Mutex::new(session),
            input_name,
            schema,
        })
    }
}

impl Classifier for OnnxClassifier {
    fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    fn predict(&self, features: &[f32]) -> Result<Label> {
        if features.len() != self.schema.len() {
            return Err(VerifyError::SchemaMismatch(format!(
                "expected {} features for schema '{}', got {}",
                self.schema.len(),
                self.schema.version,
                features.len()
            )));
        }

        let input = Array2::from_shape_vec((1, features.len()), features.to_vec())
            .map_err(|e| VerifyError::Inference(e.to_string()))?;
        let tensor =
            TensorRef::from_array_view(&input).map_err(|e| VerifyError::Inference(e.to_string()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| VerifyError::Inference(format!("lock error: {e}")))?;
        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => tensor])
            .map_err(|e| VerifyError::Inference(e.to_string()))?;
        let class = outputs[LABEL_OUTPUT]
            .try_extract_array::<i64>()
            .map_err(|e| VerifyError::Inference(e.to_string()))?
            .iter()
            .next()
            .copied()
            .ok_or_else(|| VerifyError::Inference("model returned no label".into()))?;

        let label = if class == REAL_CLASS {
            Label::Real
        } else {
            Label::Fake
        };
        debug!(class, label = ?label, "Classified feature vector");
        Ok(label)
    }
}

/// A loaded model paired with the schema the service was configured for.
///
/// Built once at startup; a missing model or a schema disagreement aborts
/// initialization rather than surfacing on every request.
#[derive(Clone)]
pub struct ModelBundle {
    classifier: Arc<dyn Classifier>,
}

impl ModelBundle {
    /// Load an ONNX model with its schema sidecar and check it against `expected`.
    #[instrument(level = "info", skip(expected), fields(schema = %expected.version))]
    pub fn load(model_path: &Path, expected: &FeatureSchema) -> Result<Self> {
        if !model_path.exists() {
            return Err(VerifyError::ModelUnavailable(format!(
                "Model file not found: {}",
                model_path.display()
            )));
        }
        let model = OnnxClassifier::load(model_path)?;
        let bundle = Self::new(Arc::new(model), expected)?;
        info!(
            path = %model_path.display(),
            features = expected.len(),
            "Classifier loaded"
        );
        Ok(bundle)
    }

    /// Pair an already-built classifier with the expected schema.
    pub fn new(classifier: Arc<dyn Classifier>, expected: &FeatureSchema) -> Result<Self> {
        if let Some(diff) = classifier.schema().diff(expected) {
            return Err(VerifyError::SchemaMismatch(format!(
                "model trained on '{}' but service configured for '{}': {diff}",
                classifier.schema().version,
                expected.version
            )));
        }
        Ok(Self { classifier })
    }

    pub fn classifier(&self) -> Arc<dyn Classifier> {
        Arc::clone(&self.classifier)
    }

    pub fn schema(&self) -> &FeatureSchema {
        self.classifier.schema()
    }
}
