#![allow(dead_code)]

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use photograde::model::{
    ClassifierOutput, ClassifierLoader, ClassifierRole, ImageClassifier, InferenceError, LoadError,
};

/// Always answers with the same distribution.
pub struct FixedClassifier {
    probabilities: Vec<f32>,
}

impl FixedClassifier {
    pub fn new(probabilities: &[f32]) -> Arc<dyn ImageClassifier> {
        Arc::new(Self {
            probabilities: probabilities.to_vec(),
        })
    }
}

impl ImageClassifier for FixedClassifier {
    fn num_classes(&self) -> usize {
        self.probabilities.len()
    }

    fn classify(&self, _image: &RgbImage) -> Result<ClassifierOutput, InferenceError> {
        ClassifierOutput::from_probabilities(self.probabilities.clone())
    }
}

pub struct FailingClassifier {
    num_classes: usize,
}

impl FailingClassifier {
    pub fn new(num_classes: usize) -> Arc<dyn ImageClassifier> {
        Arc::new(Self { num_classes })
    }
}

impl ImageClassifier for FailingClassifier {
    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn classify(&self, _image: &RgbImage) -> Result<ClassifierOutput, InferenceError> {
        Err(InferenceError::PreprocessingError("tensor conversion failed".to_string()))
    }
}

/// Hands out fixed classifiers and counts how often each role was built.
pub struct CountingLoader {
    pub calls: Arc<AtomicUsize>,
    pub delay: Duration,
    pub quality_classes: usize,
    pub fail: bool,
}

impl CountingLoader {
    pub fn new(calls: Arc<AtomicUsize>) -> Self {
        Self {
            calls,
            delay: Duration::from_millis(50),
            quality_classes: 5,
            fail: false,
        }
    }
}

impl ClassifierLoader for CountingLoader {
    fn load(&self, role: ClassifierRole) -> Result<Arc<dyn ImageClassifier>, LoadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        thread::sleep(self.delay);
        if self.fail {
            return Err(LoadError::MissingFile("model/quality_vit.pt".into()));
        }
        Ok(match role {
            ClassifierRole::QualityGrader => {
                let mut probabilities = vec![0.0; self.quality_classes];
                probabilities[0] = 1.0;
                FixedClassifier::new(&probabilities)
            }
            ClassifierRole::DefectDetector => FixedClassifier::new(&[0.3, 0.7]),
        })
    }
}

pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb(rgb))
}

pub fn png_bytes(image: &RgbImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(image.clone())
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}
