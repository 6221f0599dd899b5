//! Locating model files and building the SigLIP classifier from them.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use candle_core::{DType, Device};
use candle_nn::VarBuilder;
use candle_transformers::models::siglip;
use hf_hub::api::sync::Api;
use hf_hub::{Repo, RepoType};
use serde::Deserialize;

use crate::error::ModelLoadError;
use crate::labels::LabelMap;
use crate::model::{self, SiglipClassifier};
use crate::preprocess::Preprocessor;

pub const CONFIG_FILE: &str = "config.json";
pub const PREPROCESSOR_FILE: &str = "preprocessor_config.json";
pub const WEIGHTS_FILE: &str = "model.safetensors";

/// Transformers' default class count when a config declares none.
const DEFAULT_NUM_LABELS: usize = 2;

/// Where the model's config, preprocessor config and weights come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    /// A Hugging Face hub repository, downloaded into the local hub cache.
    Hub { repo: String, revision: String },
    /// A directory already holding the three model files.
    Local(PathBuf),
}

impl ModelSource {
    pub fn hub(repo: impl Into<String>, revision: impl Into<String>) -> Self {
        ModelSource::Hub {
            repo: repo.into(),
            revision: revision.into(),
        }
    }

    /// Resolves the source to files on disk, downloading them if needed.
    pub fn resolve(&self) -> Result<ModelFiles, ModelLoadError> {
        match self {
            ModelSource::Hub { repo, revision } => {
                let api = Api::new()?;
                let repo = api.repo(Repo::with_revision(
                    repo.clone(),
                    RepoType::Model,
                    revision.clone(),
                ));
                Ok(ModelFiles {
                    config: repo.get(CONFIG_FILE)?,
                    preprocessor: repo.get(PREPROCESSOR_FILE)?,
                    weights: repo.get(WEIGHTS_FILE)?,
                })
            }
            ModelSource::Local(dir) => ModelFiles::in_dir(dir),
        }
    }
}

impl fmt::Display for ModelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelSource::Hub { repo, revision } if revision == "main" => write!(f, "{repo}"),
            ModelSource::Hub { repo, revision } => write!(f, "{repo}@{revision}"),
            ModelSource::Local(dir) => write!(f, "{}", dir.display()),
        }
    }
}

/// Paths of the files a classifier is built from.
#[derive(Debug, Clone)]
pub struct ModelFiles {
    pub config: PathBuf,
    pub preprocessor: PathBuf,
    pub weights: PathBuf,
}

impl ModelFiles {
    pub fn in_dir(dir: &Path) -> Result<Self, ModelLoadError> {
        let existing = |name: &str| {
            let path = dir.join(name);
            if path.is_file() {
                Ok(path)
            } else {
                Err(ModelLoadError::MissingFile(path))
            }
        };
        Ok(Self {
            config: existing(CONFIG_FILE)?,
            preprocessor: existing(PREPROCESSOR_FILE)?,
            weights: existing(WEIGHTS_FILE)?,
        })
    }
}

/// The parts of a `SiglipForImageClassification` `config.json` we use.
#[derive(Debug, Clone, Deserialize)]
struct ClassificationConfig {
    vision_config: Option<siglip::VisionConfig>,
    #[serde(default)]
    id2label: BTreeMap<String, String>,
    num_labels: Option<usize>,
}

impl ClassificationConfig {
    fn from_file(path: &Path) -> Result<Self, ModelLoadError> {
        let json = std::fs::read_to_string(path).map_err(|source| ModelLoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&json).map_err(|source| ModelLoadError::Config {
            file: CONFIG_FILE,
            source,
        })
    }

    /// The encoder config. Transformers omits the block when every field is at its default.
    fn vision(&self) -> Result<siglip::VisionConfig, ModelLoadError> {
        let vision = match &self.vision_config {
            Some(vision) => vision.clone(),
            None => serde_json::from_str("{}").map_err(|source| ModelLoadError::Config {
                file: CONFIG_FILE,
                source,
            })?,
        };
        model::validate(&vision)?;
        Ok(vision)
    }

    fn num_outputs(&self) -> usize {
        self.num_labels
            .or_else(|| (!self.id2label.is_empty()).then_some(self.id2label.len()))
            .unwrap_or(DEFAULT_NUM_LABELS)
    }

    /// Labels declared by the checkpoint, in class-index order, if every index parses.
    fn declared_labels(&self) -> Option<Vec<&str>> {
        let mut indexed: Vec<(usize, &str)> = self
            .id2label
            .iter()
            .map(|(k, v)| k.parse().ok().map(|i| (i, v.as_str())))
            .collect::<Option<_>>()?;
        indexed.sort_by_key(|(i, _)| *i);
        Some(indexed.into_iter().map(|(_, label)| label).collect())
    }
}

/// Builds the classifier and its preprocessor, checking the label map against the model head.
pub fn load(
    files: &ModelFiles,
    labels: &LabelMap,
    device: &Device,
) -> Result<(SiglipClassifier, Preprocessor), ModelLoadError> {
    let config = ClassificationConfig::from_file(&files.config)?;

    let outputs = config.num_outputs();
    if outputs != labels.len() {
        return Err(ModelLoadError::LabelMismatch {
            labels: labels.len(),
            outputs,
        });
    }
    if let Some(declared) = config.declared_labels() {
        if !declared.is_empty() && !declared.iter().copied().eq(labels.iter()) {
            log::warn!(
                "Checkpoint declares labels {:?}, using {:?}",
                declared,
                labels.iter().collect::<Vec<_>>()
            );
        }
    }

    let vision = config.vision()?;
    let preprocessor = Preprocessor::from_file(&files.preprocessor)?;

    log::debug!(
        "Building SigLIP classifier: {} layers, hidden {}, {}px input",
        vision.num_hidden_layers,
        vision.hidden_size,
        vision.image_size
    );
    // SAFETY: the weights file is not modified while it is mapped.
    let vb =
        unsafe { VarBuilder::from_mmaped_safetensors(&[&files.weights], DType::F32, device)? };
    let model = SiglipClassifier::new(&vision, outputs, vb)?;

    Ok((model, preprocessor))
}
