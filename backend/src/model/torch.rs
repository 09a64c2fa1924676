use std::sync::Mutex;

use image::RgbImage;
use image::imageops::{self, FilterType};
use tch::{CModule, Device, Kind, Tensor};

use super::checkpoint::{self, LoadError};
use super::classifier::{ClassifierOutput, ImageClassifier, InferenceError};
use crate::config::ClassifierConfig;

/// Resize and normalization applied before the forward pass.
#[derive(Debug, Clone)]
pub struct Preprocess {
    width: u32,
    height: u32,
    filter: FilterType,
    mean: [f32; 3],
    std: [f32; 3],
}

impl Preprocess {
    pub fn new(width: u32, height: u32, filter: FilterType, mean: [f32; 3], std: [f32; 3]) -> Self {
        Self {
            width,
            height,
            filter,
            mean,
            std,
        }
    }

    pub fn from_config(config: &ClassifierConfig) -> Result<Self, LoadError> {
        let (width, height) = config.image.dimensions()?;
        let preprocessing = &config.image.preprocessing;
        Ok(Self::new(
            width,
            height,
            preprocessing.resize_method.filter(),
            preprocessing.mean,
            preprocessing.std,
        ))
    }

    /// Resized image as planar CHW floats, rescaled to [0, 1] then normalized.
    pub fn normalize_chw(&self, image: &RgbImage) -> Vec<f32> {
        let resized = if image.dimensions() == (self.width, self.height) {
            image.clone()
        } else {
            imageops::resize(image, self.width, self.height, self.filter)
        };
        let plane = (self.width * self.height) as usize;
        let mut data = vec![0.0f32; 3 * plane];
        for (i, pixel) in resized.pixels().enumerate() {
            for c in 0..3 {
                let value = f32::from(pixel.0[c]) / 255.0;
                data[c * plane + i] = (value - self.mean[c]) / self.std[c];
            }
        }
        data
    }

    pub fn to_tensor(&self, image: &RgbImage) -> Result<Tensor, InferenceError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(InferenceError::PreprocessingError(format!(
                "cannot classify a {}x{} image",
                image.width(),
                image.height()
            )));
        }
        let data = self.normalize_chw(image);
        let tensor = Tensor::f_from_slice(&data)?.f_view([
            1,
            3,
            i64::from(self.height),
            i64::from(self.width),
        ])?;
        Ok(tensor)
    }
}

/// A TorchScript classifier returning one row of raw class scores.
pub struct TorchClassifier {
    name: String,
    // CModule is not Sync
    module: Mutex<CModule>,
    device: Device,
    num_classes: usize,
    preprocess: Preprocess,
}

impl TorchClassifier {
    pub fn load(name: &str, config: &ClassifierConfig, device: Device) -> Result<Self, LoadError> {
        let preprocess = Preprocess::from_config(config)?;
        if !config.module.exists() {
            return Err(LoadError::MissingFile(config.module.clone()));
        }

        log::info!("Loading {} from {}", name, config.module.display());
        let mut module =
            CModule::load_on_device(&config.module, device).map_err(|source| LoadError::Torch {
                path: config.module.clone(),
                source,
            })?;
        module.set_eval();

        if let Some(checkpoint_path) = &config.checkpoint {
            let state = checkpoint::read_checkpoint(checkpoint_path, device)?;
            let parameters = module.named_parameters().map_err(|source| LoadError::Torch {
                path: config.module.clone(),
                source,
            })?;
            let summary = checkpoint::bind_parameters(parameters, state, checkpoint_path)?;
            if !summary.missing.is_empty() {
                log::warn!(
                    "{}: {} module parameters not found in {}: {:?}",
                    name,
                    summary.missing.len(),
                    checkpoint_path.display(),
                    summary.missing
                );
            }
            if !summary.unexpected.is_empty() {
                log::warn!(
                    "{}: ignoring {} unexpected checkpoint keys: {:?}",
                    name,
                    summary.unexpected.len(),
                    summary.unexpected
                );
            }
            log::info!(
                "{}: bound {} parameters from {}",
                name,
                summary.bound,
                checkpoint_path.display()
            );
        }

        Ok(Self {
            name: name.to_string(),
            module: Mutex::new(module),
            device,
            num_classes: config.num_classes,
            preprocess,
        })
    }

    fn forward(&self, input: &Tensor) -> Result<Vec<f32>, InferenceError> {
        let logits = tch::no_grad(|| {
            let module = self.module.lock().map_err(|_| InferenceError::Poisoned)?;
            module
                .forward_ts(&[input])
                .map_err(InferenceError::ModelError)
        })?;
        let probabilities = logits
            .f_softmax(-1, Kind::Float)?
            .f_view([-1])?
            .to_device(Device::Cpu);
        let num_elements = probabilities.size()[0] as usize;
        let mut output_vec = vec![0.0f32; num_elements];
        probabilities.f_copy_data(&mut output_vec, num_elements)?;
        Ok(output_vec)
    }
}

impl ImageClassifier for TorchClassifier {
    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn classify(&self, image: &RgbImage) -> Result<ClassifierOutput, InferenceError> {
        let input = self.preprocess.to_tensor(image)?.to_device(self.device);
        let probabilities = self.forward(&input)?;
        if probabilities.len() != self.num_classes {
            return Err(InferenceError::ClassCountMismatch {
                expected: self.num_classes,
                found: probabilities.len(),
            });
        }
        let output = ClassifierOutput::from_probabilities(probabilities)?;
        log::debug!(
            "{}: class {} with p={:.3}",
            self.name,
            output.predicted_index(),
            output.confidence()
        );
        Ok(output)
    }
}
