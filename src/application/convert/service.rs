//! The conversion pipeline: validate, stage scratch files, invoke the
//! engine, classify the result.

use std::{path::PathBuf, str, time::Instant};

use metrics::{counter, histogram};
use tracing::{info, warn};

use crate::{
    application::error::ConvertError,
    domain::{Artifact, ConversionRequest},
};

use super::{
    engine::{PdfEngine, RenderOutcome},
    validate::{InvalidPayload, validate_document},
    workspace::ConversionWorkspace,
};

/// Pipeline-level limits, fixed at startup.
#[derive(Debug, Clone)]
pub struct ConvertLimits {
    pub max_payload_bytes: u64,
    pub scratch_dir: PathBuf,
}

/// Orchestrates one conversion per call. Holds no per-request state, so a
/// single instance is shared across all inbound requests behind an `Arc`.
///
/// Each call spawns its own engine process; there is deliberately no
/// global bound on concurrent subprocesses.
#[derive(Debug, Clone)]
pub struct ConvertService {
    engine: PdfEngine,
    limits: ConvertLimits,
}

impl ConvertService {
    pub fn new(engine: PdfEngine, limits: ConvertLimits) -> Self {
        Self { engine, limits }
    }

    pub fn engine(&self) -> &PdfEngine {
        &self.engine
    }

    pub fn max_payload_bytes(&self) -> u64 {
        self.limits.max_payload_bytes
    }

    /// Convert one request into a PDF artifact.
    ///
    /// The sequence is linear: size gate, decode + validate, acquire the
    /// workspace, invoke the engine, read the artifact. The workspace is
    /// released on every path out of the engine invocation; validation
    /// failures return before any resource is allocated.
    pub async fn convert(&self, request: ConversionRequest) -> Result<Artifact, ConvertError> {
        let started = Instant::now();
        counter!("stampa_convert_total").increment(1);

        let result = self.run(&request).await;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        histogram!("stampa_convert_duration_ms").record(elapsed_ms as f64);

        match &result {
            Ok(artifact) => {
                info!(
                    target = "application::convert::service",
                    op = "convert",
                    result = "ok",
                    kind = request.kind().as_str(),
                    payload_bytes = request.len(),
                    artifact_bytes = artifact.size(),
                    elapsed_ms,
                    "Conversion completed"
                );
            }
            Err(err) => {
                counter!("stampa_convert_failure_total", "kind" => err.kind()).increment(1);
                warn!(
                    target = "application::convert::service",
                    op = "convert",
                    result = "error",
                    kind = request.kind().as_str(),
                    error_code = err.kind(),
                    payload_bytes = request.len(),
                    elapsed_ms,
                    error = %err,
                    "Conversion failed"
                );
            }
        }

        result
    }

    async fn run(&self, request: &ConversionRequest) -> Result<Artifact, ConvertError> {
        let limit = self.limits.max_payload_bytes;
        if request.len() as u64 > limit {
            return Err(ConvertError::PayloadTooLarge {
                size: request.len(),
                limit,
            });
        }

        let text =
            str::from_utf8(request.payload()).map_err(|_| InvalidPayload::NotUtf8)?;
        validate_document(text)?;

        let workspace = ConversionWorkspace::acquire(&self.limits.scratch_dir, request.payload())
            .map_err(ConvertError::Workspace)?;

        counter!("stampa_engine_invocations_total").increment(1);
        let outcome = self
            .engine
            .render(workspace.input_path(), workspace.output_path())
            .await;

        let result = match outcome {
            RenderOutcome::Artifact { bytes, .. } => Ok(Artifact::new(bytes)),
            RenderOutcome::Failed(failure) => Err(ConvertError::from(failure)),
        };

        workspace.release();
        result
    }
}
