pub mod checkpoint;
pub mod classifier;
pub mod registry;
pub mod torch;

pub use checkpoint::LoadError;
pub use classifier::{ClassifierOutput, ImageClassifier, InferenceError};
pub use registry::{ClassifierLoader, ClassifierRole, LoadedModels, ModelRegistry, RegistryError, TorchLoader};
