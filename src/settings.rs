use std::path::PathBuf;
use std::time::Duration;

use crate::loader::ModelSource;

/// Hub repository of the pretrained fake/real checkpoint.
pub const MODEL_REPO: &str = "prithivMLmods/deepfake-detector-model-v1";
pub const MODEL_REVISION: &str = "main";

/// Options for [`Classifier::load`](crate::Classifier::load).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub source: ModelSource,
    /// HTTP timeout for URL inputs; `None` keeps the client default.
    pub fetch_timeout: Option<Duration>,
}

impl Settings {
    /// Loads the model from a directory already holding its files.
    pub fn local(dir: impl Into<PathBuf>) -> Self {
        Self {
            source: ModelSource::Local(dir.into()),
            ..Self::default()
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            source: ModelSource::hub(MODEL_REPO, MODEL_REVISION),
            fetch_timeout: None,
        }
    }
}
