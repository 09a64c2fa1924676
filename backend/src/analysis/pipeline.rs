use std::sync::Arc;
use std::thread;

use image::RgbImage;
use shared::{AdditionalInfo, AssessmentResponse, DefectVerdict, QualityLabel};

use super::color::{self, ColorProfile};
use super::input::{self, DecodeError, UNKNOWN_EXTENSION};
use crate::model::{ClassifierOutput, ImageClassifier, InferenceError, ModelRegistry, RegistryError};

#[derive(Debug, thiserror::Error)]
pub enum AssessmentError {
    #[error("Quality grader failed: {0}")]
    Quality(#[source] InferenceError),
    #[error("Defect detector failed: {0}")]
    Defect(#[source] InferenceError),
}

/// Failure of the bytes-in entry point: either the upload is not an image
/// (client error) or the assessment itself failed (server error).
#[derive(Debug, thiserror::Error)]
pub enum AnalyzeError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Assessment(#[from] AssessmentError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageMetadata {
    declared_extension: String,
}

impl ImageMetadata {
    pub fn new(declared_extension: &str) -> Self {
        let extension = declared_extension.trim().trim_start_matches('.').to_lowercase();
        Self {
            declared_extension: if extension.is_empty() {
                UNKNOWN_EXTENSION.to_string()
            } else {
                extension
            },
        }
    }

    pub fn from_filename(filename: &str) -> Self {
        Self {
            declared_extension: input::declared_extension(filename),
        }
    }

    pub fn declared_extension(&self) -> &str {
        &self.declared_extension
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssessmentReport {
    quality: QualityLabel,
    defects: DefectVerdict,
    color: ColorProfile,
    width: u32,
    height: u32,
    file_type: String,
}

impl AssessmentReport {
    pub fn new(
        quality: QualityLabel,
        defects: DefectVerdict,
        color: ColorProfile,
        (width, height): (u32, u32),
        metadata: &ImageMetadata,
    ) -> Self {
        Self {
            quality,
            defects,
            color,
            width,
            height,
            file_type: metadata.declared_extension().to_string(),
        }
    }

    pub fn quality(&self) -> QualityLabel {
        self.quality
    }

    pub fn defects(&self) -> DefectVerdict {
        self.defects
    }

    pub fn color(&self) -> &ColorProfile {
        &self.color
    }

    pub fn size(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    pub fn file_type(&self) -> &str {
        &self.file_type
    }

    pub fn to_response(&self) -> AssessmentResponse {
        AssessmentResponse {
            class_name: self.quality.to_string(),
            defects: self.defects.to_string(),
            file_type: self.file_type.clone(),
            size: self.size(),
            hue: self.color.hue.to_string(),
            color: self.color.color_name(),
            additional_info: AdditionalInfo {
                brightness: round2(self.color.brightness_value),
                brightness_category: self.color.brightness_category().to_string(),
                saturation: self.color.saturation.to_string(),
            },
        }
    }
}

// Halves go to the even neighbour.
fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

fn quality_label(output: &ClassifierOutput) -> Result<QualityLabel, InferenceError> {
    QualityLabel::from_repr(output.predicted_index()).ok_or(InferenceError::UnknownClass {
        index: output.predicted_index(),
        num_classes: output.num_classes(),
    })
}

fn defect_verdict(output: &ClassifierOutput) -> Result<DefectVerdict, InferenceError> {
    DefectVerdict::from_repr(output.predicted_index()).ok_or(InferenceError::UnknownClass {
        index: output.predicted_index(),
        num_classes: output.num_classes(),
    })
}

/// Runs the quality grader, the defect detector and the color analysis over
/// one image and merges them into an [`AssessmentReport`].
#[derive(Clone)]
pub struct AssessmentPipeline {
    quality: Arc<dyn ImageClassifier>,
    defect: Arc<dyn ImageClassifier>,
}

impl AssessmentPipeline {
    pub fn new(quality: Arc<dyn ImageClassifier>, defect: Arc<dyn ImageClassifier>) -> Self {
        Self { quality, defect }
    }

    pub fn from_registry(registry: &ModelRegistry) -> Result<Self, RegistryError> {
        Ok(Self::new(
            registry.quality_classifier()?,
            registry.defect_classifier()?,
        ))
    }

    pub fn assess(
        &self,
        image: &RgbImage,
        metadata: &ImageMetadata,
    ) -> Result<AssessmentReport, AssessmentError> {
        let (quality, defects, color) = thread::scope(|scope| {
            let quality = scope.spawn(|| {
                self.quality
                    .classify(image)
                    .and_then(|output| quality_label(&output))
            });
            let defects = scope.spawn(|| {
                self.defect
                    .classify(image)
                    .and_then(|output| defect_verdict(&output))
            });
            let color = color::analyze(image);
            (
                quality.join().unwrap_or(Err(InferenceError::WorkerPanicked)),
                defects.join().unwrap_or(Err(InferenceError::WorkerPanicked)),
                color,
            )
        });

        let quality = quality.map_err(AssessmentError::Quality)?;
        let defects = defects.map_err(AssessmentError::Defect)?;

        Ok(AssessmentReport::new(
            quality,
            defects,
            color,
            image.dimensions(),
            metadata,
        ))
    }

    /// Decodes `bytes` and assesses the result, taking the file type from
    /// `declared_filename`.
    pub fn assess_bytes(
        &self,
        bytes: &[u8],
        declared_filename: &str,
    ) -> Result<AssessmentReport, AnalyzeError> {
        let image = input::decode_image(bytes)?;
        let metadata = ImageMetadata::from_filename(declared_filename);
        Ok(self.assess(&image, &metadata)?)
    }
}
