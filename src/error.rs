//! Error types for model loading and classification.

use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

/// Errors raised while loading the model, its configs, or its weights.
#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("model hub request failed: {0}")]
    Hub(#[from] hf_hub::api::sync::ApiError),

    #[error("model file {} not found", .0.display())]
    MissingFile(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid {file}: {source}")]
    Config {
        file: &'static str,
        source: serde_json::Error,
    },

    #[error("invalid model config: {0}")]
    InvalidConfig(String),

    #[error("invalid preprocessor config: {0}")]
    Preprocessor(String),

    #[error("label map has {labels} entries but the model outputs {outputs} classes")]
    LabelMismatch { labels: usize, outputs: usize },

    #[error("failed to build model from weights: {0}")]
    Weights(#[from] candle_core::Error),

    #[error("failed to build http client: {0}")]
    Client(#[source] FetchError),
}

/// Errors raised while downloading an image over HTTP(S).
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request to {url} failed: {source}")]
    Request { url: String, source: reqwest::Error },

    #[error("{url} returned status {status}")]
    Status { url: String, status: StatusCode },

    #[error("{url} returned non-image content type `{content_type}`")]
    NotAnImage { url: String, content_type: String },
}

/// Coarse classification of a [`ClassifyError`], for callers that only
/// need to know which stage failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Fetch,
    Read,
    Decode,
    Inference,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Fetch => "fetch",
            ErrorKind::Read => "read",
            ErrorKind::Decode => "decode",
            ErrorKind::Inference => "inference",
        }
    }
}

/// Errors raised by a single `classify` call.
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("failed to read image {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to decode image from {origin}: {source}")]
    Decode {
        origin: String,
        source: image::ImageError,
    },

    #[error("inference failed: {0}")]
    Inference(#[from] candle_core::Error),

    #[error("model produced {outputs} scores for {labels} labels")]
    OutputShape { labels: usize, outputs: usize },
}

impl ClassifyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClassifyError::Fetch(_) => ErrorKind::Fetch,
            ClassifyError::Read { .. } => ErrorKind::Read,
            ClassifyError::Decode { .. } => ErrorKind::Decode,
            ClassifyError::Inference(_) | ClassifyError::OutputShape { .. } => ErrorKind::Inference,
        }
    }
}
