//! Image preprocessing driven by the model's `preprocessor_config.json`.
//!
//! The pipeline mirrors what the model saw at training time: resize with the
//! declared resample filter, optional center crop, rescale to `[0, 1]`, then
//! per-channel normalization. Output is a `(1, 3, H, W)` f32 tensor in CHW order.

use std::path::Path;

use candle_core::{Device, Tensor};
use image::RgbImage;
use image::imageops::{self, FilterType};
use serde::Deserialize;

use crate::error::ModelLoadError;

/// SigLIP checkpoints normalize every channel with mean 0.5, std 0.5.
const SIGLIP_MEAN: [f32; 3] = [0.5, 0.5, 0.5];
const SIGLIP_STD: [f32; 3] = [0.5, 0.5, 0.5];
const DEFAULT_RESCALE_FACTOR: f32 = 1.0 / 255.0;
/// PIL's BILINEAR resample code.
const DEFAULT_RESAMPLE: u8 = 2;

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
enum SizeSpec {
    Exact { height: u32, width: u32 },
    ShortestEdge { shortest_edge: u32 },
    Square(u32),
}

#[derive(Debug, Clone, Deserialize)]
struct PreprocessorConfig {
    #[serde(default = "enabled")]
    do_resize: bool,
    size: Option<SizeSpec>,
    #[serde(default = "default_resample")]
    resample: u8,
    #[serde(default)]
    do_center_crop: bool,
    crop_size: Option<SizeSpec>,
    #[serde(default = "enabled")]
    do_rescale: bool,
    #[serde(default = "default_rescale_factor")]
    rescale_factor: f32,
    #[serde(default = "enabled")]
    do_normalize: bool,
    #[serde(default = "default_mean")]
    image_mean: [f32; 3],
    #[serde(default = "default_std")]
    image_std: [f32; 3],
}

fn enabled() -> bool {
    true
}

fn default_resample() -> u8 {
    DEFAULT_RESAMPLE
}

fn default_rescale_factor() -> f32 {
    DEFAULT_RESCALE_FACTOR
}

fn default_mean() -> [f32; 3] {
    SIGLIP_MEAN
}

fn default_std() -> [f32; 3] {
    SIGLIP_STD
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Resize {
    Exact { width: u32, height: u32 },
    ShortestEdge(u32),
}

/// Turns an RGB raster into the fixed-shape tensor the model expects.
#[derive(Debug, Clone)]
pub struct Preprocessor {
    resize: Option<Resize>,
    filter: FilterType,
    crop: Option<(u32, u32)>,
    rescale: Option<f32>,
    normalize: Option<([f32; 3], [f32; 3])>,
}

impl Preprocessor {
    /// The stock SigLIP pipeline: bilinear resize to `size`×`size`, rescale, normalize at 0.5/0.5.
    pub fn siglip(size: u32) -> Self {
        Self {
            resize: Some(Resize::Exact {
                width: size,
                height: size,
            }),
            filter: FilterType::Triangle,
            crop: None,
            rescale: Some(DEFAULT_RESCALE_FACTOR),
            normalize: Some((SIGLIP_MEAN, SIGLIP_STD)),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ModelLoadError> {
        let json = std::fs::read_to_string(path).map_err(|source| ModelLoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self, ModelLoadError> {
        let config: PreprocessorConfig =
            serde_json::from_str(json).map_err(|source| ModelLoadError::Config {
                file: "preprocessor_config.json",
                source,
            })?;

        let resize = match (config.do_resize, config.size) {
            (false, _) => None,
            (true, None) => {
                return Err(ModelLoadError::Preprocessor(
                    "do_resize is set but no size is given".into(),
                ));
            }
            (true, Some(SizeSpec::Exact { height, width })) => {
                Some(Resize::Exact { width, height })
            }
            (true, Some(SizeSpec::Square(size))) => Some(Resize::Exact {
                width: size,
                height: size,
            }),
            (true, Some(SizeSpec::ShortestEdge { shortest_edge })) => {
                Some(Resize::ShortestEdge(shortest_edge))
            }
        };

        let crop = match (config.do_center_crop, config.crop_size) {
            (false, _) => None,
            (true, Some(SizeSpec::Exact { height, width })) => Some((width, height)),
            (true, Some(SizeSpec::Square(size))) => Some((size, size)),
            (true, _) => {
                return Err(ModelLoadError::Preprocessor(
                    "do_center_crop needs a crop_size with height and width".into(),
                ));
            }
        };

        let zero_resize = match resize {
            Some(Resize::Exact { width, height }) => width == 0 || height == 0,
            Some(Resize::ShortestEdge(edge)) => edge == 0,
            None => false,
        };
        if zero_resize || crop.is_some_and(|(w, h)| w == 0 || h == 0) {
            return Err(ModelLoadError::Preprocessor(
                "image size must be non-zero".into(),
            ));
        }

        if config.do_normalize && config.image_std.iter().any(|s| *s == 0.0 || !s.is_finite()) {
            return Err(ModelLoadError::Preprocessor(format!(
                "image_std must be finite and non-zero, got {:?}",
                config.image_std
            )));
        }

        Ok(Self {
            resize,
            filter: resample_filter(config.resample),
            crop,
            rescale: config.do_rescale.then_some(config.rescale_factor),
            normalize: config
                .do_normalize
                .then_some((config.image_mean, config.image_std)),
        })
    }

    /// `(width, height)` of every tensor this pipeline produces, when it is fixed.
    pub fn output_size(&self) -> Option<(u32, u32)> {
        if let Some(crop) = self.crop {
            return Some(crop);
        }
        match self.resize {
            Some(Resize::Exact { width, height }) => Some((width, height)),
            _ => None,
        }
    }

    pub fn preprocess(&self, image: &RgbImage, device: &Device) -> candle_core::Result<Tensor> {
        let resized = match self.resize {
            Some(Resize::Exact { width, height }) => {
                imageops::resize(image, width, height, self.filter)
            }
            Some(Resize::ShortestEdge(edge)) => {
                let (width, height) = shortest_edge_dims(image.width(), image.height(), edge);
                imageops::resize(image, width, height, self.filter)
            }
            None => image.clone(),
        };
        let pixels = match self.crop {
            Some((width, height)) => center_crop(&resized, width, height, self.filter),
            None => resized,
        };

        let (width, height) = (pixels.width() as usize, pixels.height() as usize);
        let plane = width * height;
        let scale = self.rescale.unwrap_or(1.0);
        let (mean, std) = self.normalize.unwrap_or(([0.0; 3], [1.0; 3]));

        let mut data = vec![0f32; 3 * plane];
        for (i, pixel) in pixels.pixels().enumerate() {
            for c in 0..3 {
                let value = pixel[c] as f32 * scale;
                // CHW layout
                data[c * plane + i] = (value - mean[c]) / std[c];
            }
        }

        Tensor::from_vec(data, (1, 3, height, width), device)
    }
}

fn resample_filter(code: u8) -> FilterType {
    // PIL codes: 0 nearest, 1 lanczos, 2 bilinear, 3 bicubic, 4 box, 5 hamming
    match code {
        0 => FilterType::Nearest,
        1 => FilterType::Lanczos3,
        3 => FilterType::CatmullRom,
        _ => FilterType::Triangle,
    }
}

fn shortest_edge_dims(width: u32, height: u32, edge: u32) -> (u32, u32) {
    let scale = |long: u32, short: u32| {
        ((long as f64 * edge as f64 / short.max(1) as f64).round() as u32).max(1)
    };
    if width <= height {
        (edge, scale(height, width))
    } else {
        (scale(width, height), edge)
    }
}

fn center_crop(image: &RgbImage, width: u32, height: u32, filter: FilterType) -> RgbImage {
    if image.width() < width || image.height() < height {
        return imageops::resize(image, width, height, filter);
    }
    let x = (image.width() - width) / 2;
    let y = (image.height() - height) / 2;
    imageops::crop_imm(image, x, y, width, height).to_image()
}
