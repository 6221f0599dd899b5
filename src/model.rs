//! Classification models the [`Classifier`](crate::Classifier) can drive.

use candle_core::{Device, Module, Tensor};
use candle_nn::{Linear, VarBuilder};
use candle_transformers::models::siglip;

use crate::error::ModelLoadError;

/// A loaded image classifier: pixel tensor in, logits out.
///
/// Implementations are read-only after construction so one handle can serve
/// concurrent callers.
pub trait ImageClassifierModel: Send + Sync {
    /// Number of classes in the output logits.
    fn num_labels(&self) -> usize;

    /// Square input resolution the model was built for.
    fn image_size(&self) -> usize;

    /// Maps `(batch, 3, H, W)` pixel values to `(batch, num_labels)` logits.
    fn forward(&self, pixel_values: &Tensor) -> candle_core::Result<Tensor>;
}

/// SigLIP vision encoder with a linear head over mean-pooled patch embeddings.
///
/// Weight layout follows `SiglipForImageClassification` checkpoints:
/// `vision_model.*` for the encoder and `classifier.*` for the head.
pub struct SiglipClassifier {
    vision: siglip::VisionModel,
    classifier: Linear,
    num_labels: usize,
    image_size: usize,
}

impl SiglipClassifier {
    pub fn new(
        config: &siglip::VisionConfig,
        num_labels: usize,
        vb: VarBuilder,
    ) -> candle_core::Result<Self> {
        // The attention-pooling head is unused by the classification checkpoints.
        let vision = siglip::VisionModel::new(config, false, vb.pp("vision_model"))?;
        let classifier = candle_nn::linear(config.hidden_size, num_labels, vb.pp("classifier"))?;
        Ok(Self {
            vision,
            classifier,
            num_labels,
            image_size: config.image_size,
        })
    }
}

impl ImageClassifierModel for SiglipClassifier {
    fn num_labels(&self) -> usize {
        self.num_labels
    }

    fn image_size(&self) -> usize {
        self.image_size
    }

    fn forward(&self, pixel_values: &Tensor) -> candle_core::Result<Tensor> {
        // (batch, patches, hidden) -> (batch, hidden)
        let hidden = self.vision.forward(pixel_values)?;
        let pooled = hidden.mean(1)?;
        self.classifier.forward(&pooled)
    }
}

/// Rejects SigLIP geometries the encoder cannot be built from.
pub(crate) fn validate(config: &siglip::VisionConfig) -> Result<(), ModelLoadError> {
    if config.num_attention_heads == 0 || config.hidden_size % config.num_attention_heads != 0 {
        return Err(ModelLoadError::InvalidConfig(format!(
            "hidden_size {} is not divisible by {} attention heads",
            config.hidden_size, config.num_attention_heads
        )));
    }
    if config.patch_size == 0 || config.image_size % config.patch_size != 0 {
        return Err(ModelLoadError::InvalidConfig(format!(
            "image_size {} is not a multiple of patch_size {}",
            config.image_size, config.patch_size
        )));
    }
    Ok(())
}

/// Picks the compute device for the enabled backend, falling back to CPU.
pub fn select_device() -> Device {
    #[cfg(feature = "metal")]
    let device = Device::new_metal(0).unwrap_or(Device::Cpu);
    #[cfg(not(feature = "metal"))]
    let device = Device::Cpu;
    device
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use candle_core::DType;
    use candle_nn::Activation;

    /// A SigLIP small enough to build from zeroed weights in a test.
    pub(crate) fn tiny_config() -> siglip::VisionConfig {
        serde_json::from_str(
            r#"{
                "hidden_size": 8,
                "intermediate_size": 16,
                "num_hidden_layers": 1,
                "num_attention_heads": 2,
                "image_size": 32,
                "patch_size": 16
            }"#,
        )
        .expect("parse tiny config")
    }

    #[test]
    fn empty_vision_config_uses_siglip_base_defaults() {
        let config: siglip::VisionConfig = serde_json::from_str("{}").expect("parse defaults");
        validate(&config).expect("defaults are valid");
        assert_eq!(config.hidden_size, 768);
        assert_eq!(config.num_hidden_layers, 12);
        assert_eq!(config.image_size, 224);
        assert_eq!(config.patch_size, 16);
        assert_eq!(config.hidden_act, Activation::GeluPytorchTanh);
    }

    #[test]
    fn transformers_activation_names_parse() {
        let config: siglip::VisionConfig =
            serde_json::from_str(r#"{"hidden_act": "gelu_pytorch_tanh"}"#).expect("tanh gelu");
        assert_eq!(config.hidden_act, Activation::GeluPytorchTanh);

        let config: siglip::VisionConfig =
            serde_json::from_str(r#"{"hidden_act": "gelu_new"}"#).expect("new gelu");
        assert_eq!(config.hidden_act, Activation::NewGelu);

        let unknown = serde_json::from_str::<siglip::VisionConfig>(r#"{"hidden_act": "mish"}"#);
        assert!(unknown.is_err());
    }

    #[test]
    fn rejects_bad_geometry() {
        validate(&tiny_config()).expect("tiny config is valid");

        let mut config = tiny_config();
        config.patch_size = 5;
        assert!(matches!(
            validate(&config),
            Err(ModelLoadError::InvalidConfig(_))
        ));

        let mut config = tiny_config();
        config.num_attention_heads = 3;
        assert!(matches!(
            validate(&config),
            Err(ModelLoadError::InvalidConfig(_))
        ));

        let mut config = tiny_config();
        config.num_attention_heads = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn zeroed_siglip_outputs_zero_logits() {
        let config = tiny_config();
        let vb = VarBuilder::zeros(DType::F32, &Device::Cpu);
        let model = SiglipClassifier::new(&config, 2, vb).expect("build model");
        assert_eq!(model.num_labels(), 2);
        assert_eq!(model.image_size(), 32);

        let pixels = Tensor::ones((1, 3, 32, 32), DType::F32, &Device::Cpu).unwrap();
        let logits = model.forward(&pixels).expect("forward");
        assert_eq!(logits.dims(), &[1, 2]);
        let values: Vec<f32> = logits.flatten_all().unwrap().to_vec1().unwrap();
        assert!(values.iter().all(|v| v.abs() < 1e-6));
    }
}
