use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

use crate::domain::ModelId;

#[derive(Debug, Error, Diagnostic)]
pub enum HarvestError {
    #[error("config file not found: {0}")]
    MissingConfig(Utf8PathBuf),

    #[error("failed to read config file at {0}")]
    ConfigRead(Utf8PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("ModelDB request failed: {0}")]
    Http(String),

    #[error("ModelDB returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("unexpected ModelDB response for {context}: {message}")]
    Decode { context: String, message: String },

    #[error("model {id}: attribute {attribute} has neither `value` nor `values`")]
    MissingAttributeValue { id: ModelId, attribute: String },

    #[error("model {id}: archive attribute has no `file_content`")]
    MissingArchiveContent { id: ModelId },

    #[error("model {id}: archive payload is not valid Base64: {message}")]
    ArchiveDecode { id: ModelId, message: String },

    #[error("model {id}: still failing after {attempts} attempts")]
    #[diagnostic(help("raise or unset `max_retries` in the config to keep waiting"))]
    RetriesExhausted { id: ModelId, attempts: u32 },

    #[error("failed to read checkpoint at {path}: {message}")]
    CheckpointRead { path: Utf8PathBuf, message: String },

    #[error("failed to parse checkpoint at {path}: {message}")]
    #[diagnostic(help("delete the checkpoint file to start a fresh harvest"))]
    CheckpointParse { path: Utf8PathBuf, message: String },

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("failed to install interrupt handler: {0}")]
    SignalHandler(String),
}
