//! Fake/real image classification on a pretrained SigLIP checkpoint.
//!
//! ```no_run
//! use deepfake_detector::{Classifier, Settings, Verdict};
//!
//! # fn main() -> anyhow::Result<()> {
//! let classifier = Classifier::load(&Settings::default())?;
//! let prediction = classifier.classify("https://example.com/portrait.jpg")?;
//! println!("{prediction}");
//! println!("{}", Verdict::from_prediction(&prediction));
//! # Ok(())
//! # }
//! ```

pub mod classifier;
pub mod error;
pub mod input;
pub mod labels;
pub mod loader;
pub mod logging;
pub mod model;
pub mod prediction;
pub mod preprocess;
pub mod settings;

pub use classifier::Classifier;
pub use error::{ClassifyError, ErrorKind, FetchError, ModelLoadError};
pub use input::{ImageFetcher, ImageInput};
pub use labels::LabelMap;
pub use loader::{ModelFiles, ModelSource};
pub use model::{ImageClassifierModel, SiglipClassifier};
pub use prediction::{Prediction, Verdict};
pub use preprocess::Preprocessor;
pub use settings::Settings;
