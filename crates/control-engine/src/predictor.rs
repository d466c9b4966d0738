//! Prediction invoker
//!
//! Synchronous request/response boundary to the per-device inference
//! programs. The process-backed implementation starts a fresh external
//! process per invocation; swapping in an in-process model or an RPC
//! client only means implementing [`Predictor`].

use crate::error::InvocationError;
use async_trait::async_trait;
use greenhouse_core::{DeviceKind, FeatureVector};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;

/// Produces a raw textual prediction for one device kind
#[async_trait]
pub trait Predictor: Send + Sync {
    /// Run one prediction. Returns the trimmed textual result.
    async fn predict(
        &self,
        kind: DeviceKind,
        features: &FeatureVector,
    ) -> Result<String, InvocationError>;
}

/// Invokes the external inference scripts, one fresh process per call.
///
/// The feature vector is serialized as the sole JSON argument; stdout is
/// the prediction, stderr is kept as diagnostic text. No retry, no
/// caching.
pub struct ProcessPredictor {
    /// Interpreter executable (e.g. `python3`)
    interpreter: PathBuf,
    /// Root directory holding the per-kind model directories
    model_root: PathBuf,
    /// Upper bound on one invocation
    timeout: Duration,
}

impl ProcessPredictor {
    #[must_use]
    pub fn new(interpreter: impl Into<PathBuf>, model_root: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            interpreter: interpreter.into(),
            model_root: model_root.into(),
            timeout,
        }
    }

    /// Path of the inference script for a device kind
    #[must_use]
    pub fn script_path(&self, kind: DeviceKind) -> PathBuf {
        self.model_root
            .join(format!("{kind}_control"))
            .join(format!("infer_{kind}_control.py"))
    }

    async fn run(&self, script: &Path, input_json: &str) -> Result<String, InvocationError> {
        // Scripts resolve their model files relative to their own dir.
        let script_dir = script.parent().unwrap_or(Path::new("."));

        let output = Command::new(&self.interpreter)
            .arg(script)
            .arg(input_json)
            .current_dir(script_dir)
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, output)
            .await
            .map_err(|_| InvocationError::Timeout)??;

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if !output.status.success() {
            return Err(InvocationError::Exit {
                code: output.status.code(),
                stderr,
            });
        }

        let prediction = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if prediction.is_empty() {
            return Err(InvocationError::EmptyOutput { stderr });
        }
        Ok(prediction)
    }
}

#[async_trait]
impl Predictor for ProcessPredictor {
    async fn predict(
        &self,
        kind: DeviceKind,
        features: &FeatureVector,
    ) -> Result<String, InvocationError> {
        let script = self.script_path(kind);
        let input_json = features.to_json();
        tracing::debug!(
            "Invoking {} inference: {} {}",
            kind,
            script.display(),
            input_json
        );
        self.run(&script, &input_json).await
    }
}
