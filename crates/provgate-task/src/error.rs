//! Error types for task property validation

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TaskError {
    #[error("missing mandatory task properties: {}", keys.join(", "))]
    MissingProperties { keys: Vec<String> },

    #[error("hub name '{0}' is not supported; expected one of Build, Release, Gates")]
    UnsupportedHub(String),

    #[error("property {key} is not a valid GUID: '{value}'")]
    InvalidGuid { key: String, value: String },
}

/// Result type for task property operations
pub type Result<T> = std::result::Result<T, TaskError>;
