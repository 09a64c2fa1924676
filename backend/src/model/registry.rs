use std::fmt;
use std::sync::Arc;

use tokio::sync::OnceCell;

use super::checkpoint::LoadError;
use super::classifier::ImageClassifier;
use super::torch::TorchClassifier;
use crate::config::ModelConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassifierRole {
    QualityGrader,
    DefectDetector,
}

impl ClassifierRole {
    pub fn num_classes(&self) -> usize {
        match self {
            ClassifierRole::QualityGrader => 5,
            ClassifierRole::DefectDetector => 2,
        }
    }
}

impl fmt::Display for ClassifierRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassifierRole::QualityGrader => write!(f, "quality grader"),
            ClassifierRole::DefectDetector => write!(f, "defect detector"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Failed to load {role}: {source}")]
    Load {
        role: ClassifierRole,
        source: LoadError,
    },
    #[error("{role} produces {found} classes, expected {expected}")]
    ClassCount {
        role: ClassifierRole,
        expected: usize,
        found: usize,
    },
    #[error("Models are not loaded")]
    NotLoaded,
}

/// Builds one classifier per role. Called at most once per role by the registry.
pub trait ClassifierLoader: Send + Sync {
    fn load(&self, role: ClassifierRole) -> Result<Arc<dyn ImageClassifier>, LoadError>;
}

/// Loads TorchScript classifiers as described by a [`ModelConfig`].
pub struct TorchLoader {
    config: ModelConfig,
}

impl TorchLoader {
    pub fn new(config: ModelConfig) -> Self {
        Self { config }
    }
}

impl ClassifierLoader for TorchLoader {
    fn load(&self, role: ClassifierRole) -> Result<Arc<dyn ImageClassifier>, LoadError> {
        let classifier_config = match role {
            ClassifierRole::QualityGrader => &self.config.quality,
            ClassifierRole::DefectDetector => &self.config.defect,
        };
        let device = self.config.device.resolve();
        let classifier = TorchClassifier::load(&role.to_string(), classifier_config, device)?;
        Ok(Arc::new(classifier))
    }
}

#[derive(Clone)]
pub struct LoadedModels {
    pub quality: Arc<dyn ImageClassifier>,
    pub defect: Arc<dyn ImageClassifier>,
}

/// Owns the two classifiers for the lifetime of the process.
///
/// The first `ensure_loaded` call runs the loader; concurrent callers wait on
/// that same attempt. A failed attempt stores nothing, and reads after a
/// successful load take no lock.
pub struct ModelRegistry {
    loader: Arc<dyn ClassifierLoader>,
    models: OnceCell<LoadedModels>,
}

impl ModelRegistry {
    pub fn new(loader: impl ClassifierLoader + 'static) -> Self {
        Self::with_loader(Arc::new(loader))
    }

    pub fn with_loader(loader: Arc<dyn ClassifierLoader>) -> Self {
        Self {
            loader,
            models: OnceCell::new(),
        }
    }

    pub async fn ensure_loaded(&self) -> Result<&LoadedModels, RegistryError> {
        self.models.get_or_try_init(|| async { self.load_all() }).await
    }

    pub fn is_loaded(&self) -> bool {
        self.models.initialized()
    }

    pub fn models(&self) -> Result<&LoadedModels, RegistryError> {
        self.models.get().ok_or(RegistryError::NotLoaded)
    }

    pub fn quality_classifier(&self) -> Result<Arc<dyn ImageClassifier>, RegistryError> {
        Ok(self.models()?.quality.clone())
    }

    pub fn defect_classifier(&self) -> Result<Arc<dyn ImageClassifier>, RegistryError> {
        Ok(self.models()?.defect.clone())
    }

    fn load_all(&self) -> Result<LoadedModels, RegistryError> {
        let quality = self.load_role(ClassifierRole::QualityGrader)?;
        let defect = self.load_role(ClassifierRole::DefectDetector)?;
        log::info!("Quality grader and defect detector loaded");
        Ok(LoadedModels { quality, defect })
    }

    fn load_role(&self, role: ClassifierRole) -> Result<Arc<dyn ImageClassifier>, RegistryError> {
        let classifier = self.loader.load(role).map_err(|source| {
            log::error!("Failed to load {}: {}", role, source);
            RegistryError::Load { role, source }
        })?;
        if classifier.num_classes() != role.num_classes() {
            return Err(RegistryError::ClassCount {
                role,
                expected: role.num_classes(),
                found: classifier.num_classes(),
            });
        }
        Ok(classifier)
    }
}
