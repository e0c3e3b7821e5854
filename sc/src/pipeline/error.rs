//! Pipeline error types

use std::path::PathBuf;
use thiserror::Error;

use crate::stage::{Capability, StageError};

/// Errors that end a pipeline run
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Chain configuration is required")]
    ConfigMissing,

    #[error("Pipeline has 0 steps")]
    EmptyPipeline,

    #[error("Cannot chain only 1 item")]
    InsufficientSteps,

    #[error("First item must be a source or transform, got {stage} ({capability})")]
    InvalidFirstStage { stage: &'static str, capability: Capability },

    #[error("Error in the way items are chained together: step {index} ({from}) cannot pipe into step {next} ({to})", next = .index + 1)]
    InvalidChainTopology {
        index: usize,
        from: &'static str,
        to: &'static str,
    },

    #[error("Unknown step kind '{kind}' at step {index}")]
    UnknownStepKind { index: usize, kind: String },

    #[error("Invalid params for {kind} at step {index}: {message}")]
    InvalidStepParams {
        index: usize,
        kind: String,
        message: String,
    },

    #[error("Failed to read pipeline definition {path}: {source}")]
    DefinitionRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse pipeline definition: {0}")]
    DefinitionParse(#[from] serde_yaml::Error),

    #[error(transparent)]
    Stage(#[from] StageError),

    #[error("Stage task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl PipelineError {
    /// Check if the error was detected before any stage started running
    pub fn is_configuration_error(&self) -> bool {
        !matches!(self, PipelineError::Stage(_) | PipelineError::Join(_))
    }
}
