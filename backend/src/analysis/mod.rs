pub mod color;
pub mod input;
pub mod pipeline;

pub use color::ColorProfile;
pub use input::DecodeError;
pub use pipeline::{AnalyzeError, AssessmentError, AssessmentPipeline, AssessmentReport, ImageMetadata};
