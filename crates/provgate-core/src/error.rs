//! Error types for policy evaluation

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EvalError {
    #[error("failed to create workspace at {path}: {source}")]
    WorkspaceCreate {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to stage {path}: {source}")]
    StageWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write result file {path}: {source}")]
    ResultWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to read result file {path}: {source}")]
    ResultRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to launch evaluator '{command}': {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("evaluator did not finish within {0:?}")]
    Timeout(Duration),
}

/// Result type for policy evaluation operations
pub type Result<T> = std::result::Result<T, EvalError>;
