use std::path::PathBuf;

use thiserror::Error;

use crate::config::PictureShape;

// ---------------------------------------------------------------------------
// Domain errors
// ---------------------------------------------------------------------------

pub type InspectResult<T> = Result<T, InspectError>;

/// Errors raised by sampling, checkpoint handling and batch generation.
/// File loaders and the command layer wrap these in `anyhow` with context.
#[derive(Debug, Error)]
pub enum InspectError {
    #[error("requested {requested} samples but the dataset only has {available} rows")]
    SampleTooLarge { requested: usize, available: usize },

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("json parse error at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("image decode error at {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("no checkpoint folders found in {0}")]
    NoCheckpoints(PathBuf),

    #[error("checkpoint '{name}' not found in {root}")]
    UnknownCheckpoint { root: PathBuf, name: String },

    #[error("checkpoint index {index} is out of range (1..={count})")]
    CheckpointIndex { index: usize, count: usize },

    #[error("checkpoint {folder} has no {file}")]
    MissingArtifact { folder: PathBuf, file: &'static str },

    #[error("dataset is missing required column '{0}'")]
    MissingColumn(String),

    #[error("row {row} has no resolved image path")]
    MissingImagePath { row: usize },

    #[error("row {row}: '{token}' is not a valid token id")]
    InvalidToken { row: usize, token: String },

    #[error("picture shape {shape} {reason}")]
    InvalidPictureShape {
        shape: PictureShape,
        reason: &'static str,
    },

    #[error("batch size must be greater than zero")]
    ZeroBatchSize,

    #[error("batch index {index} is out of range ({len} batches)")]
    BatchIndex { index: usize, len: usize },

    #[error("token sequences in a batch differ in length: expected {expected}, found {found}")]
    RaggedBatch { expected: usize, found: usize },
}
