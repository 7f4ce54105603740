use std::{io, time::Duration};

use thiserror::Error;

use crate::application::convert::{engine::RenderFailure, validate::InvalidPayload};

/// Classified outcome of a failed conversion. Every pipeline failure maps
/// to exactly one variant at the point of detection; nothing is thrown
/// across layers.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("payload of {size} bytes exceeds the configured limit of {limit} bytes")]
    PayloadTooLarge { size: usize, limit: u64 },
    #[error("invalid document: {0}")]
    InvalidInput(#[from] InvalidPayload),
    #[error("failed to prepare scratch files: {0}")]
    Workspace(io::Error),
    #[error("rendering engine could not be started: {0}")]
    Spawn(io::Error),
    #[error("rendering engine failed (exit {exit_code:?}): {stderr}")]
    EngineExit {
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error("rendering engine produced no output")]
    EmptyOutput,
    #[error("conversion exceeded the {}s time limit", limit.as_secs())]
    Timeout { limit: Duration },
}

impl ConvertError {
    /// Stable label used for metrics and structured log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            ConvertError::PayloadTooLarge { .. } => "payload_too_large",
            ConvertError::InvalidInput(_) => "invalid_input",
            ConvertError::Workspace(_) => "workspace",
            ConvertError::Spawn(_) => "spawn",
            ConvertError::EngineExit { .. } => "engine_exit",
            ConvertError::EmptyOutput => "empty_output",
            ConvertError::Timeout { .. } => "timeout",
        }
    }
}

impl From<RenderFailure> for ConvertError {
    fn from(failure: RenderFailure) -> Self {
        match failure {
            RenderFailure::Spawn(err) => ConvertError::Spawn(err),
            RenderFailure::EngineExit { exit_code, stderr } => {
                ConvertError::EngineExit { exit_code, stderr }
            }
            RenderFailure::EmptyOutput => ConvertError::EmptyOutput,
            RenderFailure::Timeout { limit } => ConvertError::Timeout { limit },
            // Wait/read faults around the invocation are scratch-file
            // territory as far as the caller is concerned.
            RenderFailure::Io(err) => ConvertError::Workspace(err),
        }
    }
}
