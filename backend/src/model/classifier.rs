use image::RgbImage;

const PROBABILITY_TOLERANCE: f32 = 1e-4;

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("Preprocessing error: {0}")]
    PreprocessingError(String),
    #[error("Model error: {0}")]
    ModelError(#[from] tch::TchError),
    #[error("Classifier returned no scores")]
    EmptyOutput,
    #[error("Expected {expected} class scores, got {found}")]
    ClassCountMismatch { expected: usize, found: usize },
    #[error("Classifier returned a non-finite score at index {0}")]
    NonFiniteScore(usize),
    #[error("Probabilities sum to {0}, expected 1")]
    NotNormalized(f32),
    #[error("Predicted index {index} is outside the {num_classes} known classes")]
    UnknownClass { index: usize, num_classes: usize },
    #[error("Classifier lock poisoned")]
    Poisoned,
    #[error("Classifier worker panicked")]
    WorkerPanicked,
}

/// Softmax distribution over a classifier's classes together with its argmax.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierOutput {
    predicted_index: usize,
    probabilities: Vec<f32>,
}

impl ClassifierOutput {
    /// Applies a numerically stable softmax to raw scores.
    pub fn from_logits(logits: &[f32]) -> Result<Self, InferenceError> {
        check_scores(logits)?;
        let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let exps: Vec<f64> = logits.iter().map(|&l| f64::from(l - max).exp()).collect();
        let total: f64 = exps.iter().sum();
        let probabilities = exps.iter().map(|e| (e / total) as f32).collect();
        Self::from_probabilities(probabilities)
    }

    pub fn from_probabilities(probabilities: Vec<f32>) -> Result<Self, InferenceError> {
        check_scores(&probabilities)?;
        let sum: f32 = probabilities.iter().sum();
        if (sum - 1.0).abs() > PROBABILITY_TOLERANCE {
            return Err(InferenceError::NotNormalized(sum));
        }
        let predicted_index = argmax(&probabilities);
        Ok(Self {
            predicted_index,
            probabilities,
        })
    }

    pub fn predicted_index(&self) -> usize {
        self.predicted_index
    }

    pub fn probabilities(&self) -> &[f32] {
        &self.probabilities
    }

    pub fn confidence(&self) -> f32 {
        self.probabilities[self.predicted_index]
    }

    pub fn num_classes(&self) -> usize {
        self.probabilities.len()
    }
}

fn check_scores(scores: &[f32]) -> Result<(), InferenceError> {
    if scores.is_empty() {
        return Err(InferenceError::EmptyOutput);
    }
    if let Some(index) = scores.iter().position(|s| !s.is_finite()) {
        return Err(InferenceError::NonFiniteScore(index));
    }
    Ok(())
}

// Ties resolve to the lowest index.
fn argmax(values: &[f32]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = i;
        }
    }
    best
}

/// An opaque image classifier. Implementations must be safe to call from
/// several threads at once and keep no per-call state.
pub trait ImageClassifier: Send + Sync {
    fn num_classes(&self) -> usize;

    fn classify(&self, image: &RgbImage) -> Result<ClassifierOutput, InferenceError>;
}
