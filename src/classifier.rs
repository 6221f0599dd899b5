use candle_core::{DType, Device};
use image::RgbImage;

use crate::error::{ClassifyError, ModelLoadError};
use crate::input::{ImageFetcher, ImageInput};
use crate::labels::LabelMap;
use crate::loader;
use crate::model::{ImageClassifierModel, select_device};
use crate::prediction::Prediction;
use crate::preprocess::Preprocessor;
use crate::settings::Settings;

/// Fake/real image classifier.
///
/// The model is loaded once and never mutated, so a single `Classifier` can be
/// shared across threads and called concurrently.
pub struct Classifier {
    model: Box<dyn ImageClassifierModel>,
    preprocessor: Preprocessor,
    labels: LabelMap,
    fetcher: ImageFetcher,
    device: Device,
}

impl Classifier {
    /// Downloads (or opens) the configured model and builds a classifier around it.
    pub fn load(settings: &Settings) -> Result<Self, ModelLoadError> {
        let device = select_device();
        log::info!("Loading model {} on {:?}", settings.source, device);

        let files = settings.source.resolve()?;
        let labels = LabelMap::default();
        let (model, preprocessor) = loader::load(&files, &labels, &device)?;
        let fetcher = ImageFetcher::new(settings.fetch_timeout).map_err(ModelLoadError::Client)?;

        let classifier = Self::from_parts(Box::new(model), preprocessor, labels, fetcher, device)?;
        log::info!("Model loaded successfully");
        Ok(classifier)
    }

    /// Assembles a classifier from already-built parts.
    ///
    /// Fails if the label map does not cover the model's outputs or the
    /// preprocessor does not produce the model's input size.
    pub fn from_parts(
        model: Box<dyn ImageClassifierModel>,
        preprocessor: Preprocessor,
        labels: LabelMap,
        fetcher: ImageFetcher,
        device: Device,
    ) -> Result<Self, ModelLoadError> {
        if model.num_labels() != labels.len() {
            return Err(ModelLoadError::LabelMismatch {
                labels: labels.len(),
                outputs: model.num_labels(),
            });
        }

        let expected = model.image_size();
        match preprocessor.output_size() {
            Some((width, height)) if width as usize == expected && height as usize == expected => {}
            Some((width, height)) => {
                return Err(ModelLoadError::Preprocessor(format!(
                    "produces {width}x{height} images but the model expects {expected}x{expected}"
                )));
            }
            None => {
                return Err(ModelLoadError::Preprocessor(format!(
                    "output size is not fixed but the model expects {expected}x{expected}"
                )));
            }
        }

        Ok(Self {
            model,
            preprocessor,
            labels,
            fetcher,
            device,
        })
    }

    pub fn labels(&self) -> &LabelMap {
        &self.labels
    }

    /// Classifies an image given as a decoded image, a local path, or an HTTP(S) URL.
    pub fn classify(&self, input: impl Into<ImageInput>) -> Result<Prediction, ClassifyError> {
        let input = input.into();
        log::info!("Classifying {}", input);
        let image = input.resolve(&self.fetcher)?;
        self.classify_image(&image)
    }

    /// Classifies an RGB raster.
    pub fn classify_image(&self, image: &RgbImage) -> Result<Prediction, ClassifyError> {
        let pixel_values = self.preprocessor.preprocess(image, &self.device)?;
        log::debug!(
            "Preprocessed {:?} into {:?}",
            image.dimensions(),
            pixel_values.dims()
        );

        let logits = self.model.forward(&pixel_values)?;
        let probs = candle_nn::ops::softmax(&logits, 1)?;
        let probs: Vec<f32> = probs.to_dtype(DType::F32)?.flatten_all()?.to_vec1()?;

        if probs.len() != self.labels.len() {
            return Err(ClassifyError::OutputShape {
                labels: self.labels.len(),
                outputs: probs.len(),
            });
        }

        let prediction = Prediction::from_probabilities(&self.labels, &probs);
        log::debug!("Prediction: {}", prediction);
        Ok(prediction)
    }
}
