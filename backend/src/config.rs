use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use tch::Device;

use crate::locale::Locale;

pub const DEFAULT_CONFIG_PATH: &str = "config/models.yaml";
pub const DEFAULT_PORT: u16 = 8000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_version")]
    pub version: f32,
    #[serde(default)]
    pub device: DeviceConfig,
    pub quality: ClassifierConfig,
    pub defect: ClassifierConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceConfig {
    #[default]
    Auto,
    Cpu,
}

impl DeviceConfig {
    pub fn resolve(&self) -> Device {
        match self {
            DeviceConfig::Auto => Device::cuda_if_available(),
            DeviceConfig::Cpu => Device::Cpu,
        }
    }
}

/// A TorchScript module returning raw class scores, optionally paired with a
/// fine-tuned state dict bound on top of the scripted weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    pub module: PathBuf,
    #[serde(default)]
    pub checkpoint: Option<PathBuf>,
    pub num_classes: usize,
    pub image: ImageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    pub size: Vec<u32>,
    pub preprocessing: PreprocessingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    pub resize_method: ResizeMethod,
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeMethod {
    Nearest,
    Bilinear,
    Bicubic,
    Lanczos,
}

impl ResizeMethod {
    pub fn filter(&self) -> FilterType {
        match self {
            ResizeMethod::Nearest => FilterType::Nearest,
            ResizeMethod::Bilinear => FilterType::Triangle,
            ResizeMethod::Bicubic => FilterType::CatmullRom,
            ResizeMethod::Lanczos => FilterType::Lanczos3,
        }
    }
}

fn default_version() -> f32 {
    1.0
}

impl ImageConfig {
    /// `(width, height)` of the model input.
    pub fn dimensions(&self) -> Result<(u32, u32), ConfigError> {
        match self.size.as_slice() {
            [side] if *side > 0 => Ok((*side, *side)),
            [width, height] if *width > 0 && *height > 0 => Ok((*width, *height)),
            other => Err(ConfigError::Invalid(format!(
                "image size must be [side] or [width, height] with non-zero values, got {:?}",
                other
            ))),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            device: DeviceConfig::Auto,
            quality: ClassifierConfig {
                module: PathBuf::from("model/quality_vit.pt"),
                checkpoint: Some(PathBuf::from("model/best_convnext_large_model-2.pth")),
                num_classes: 5,
                image: ImageConfig {
                    size: vec![224, 224],
                    preprocessing: PreprocessingConfig {
                        resize_method: ResizeMethod::Bilinear,
                        mean: [0.5, 0.5, 0.5],
                        std: [0.5, 0.5, 0.5],
                    },
                },
            },
            defect: ClassifierConfig {
                module: PathBuf::from("model/defect_swin.pt"),
                checkpoint: Some(PathBuf::from("model/best_binary_model-2.pth")),
                num_classes: 2,
                image: ImageConfig {
                    size: vec![224, 224],
                    preprocessing: PreprocessingConfig {
                        resize_method: ResizeMethod::Bicubic,
                        mean: [0.485, 0.456, 0.406],
                        std: [0.229, 0.224, 0.225],
                    },
                },
            },
        }
    }
}

impl ModelConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config_str = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&config_str).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    pub fn from_yaml(config_str: &str) -> Result<Self, ConfigError> {
        let config: ModelConfig =
            serde_yaml::from_str(config_str).map_err(|source| ConfigError::Parse {
                path: PathBuf::from("<inline>"),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` when it exists, otherwise falls back to the built-in defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            log::info!("Loading model config from {}", path.display());
            Self::load(path)
        } else {
            log::warn!(
                "Model config {} not found, using built-in defaults",
                path.display()
            );
            Ok(Self::default())
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (name, classifier) in [("quality", &self.quality), ("defect", &self.defect)] {
            classifier.image.dimensions()?;
            if classifier.image.preprocessing.std.iter().any(|s| *s <= 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "{} classifier std values must be positive",
                    name
                )));
            }
        }
        Ok(())
    }
}

/// Settings read from the process environment (after `.env` is loaded).
#[derive(Debug, Clone, Default)]
pub struct ServiceSettings {
    pub port: Option<u16>,
    pub model_config: Option<PathBuf>,
    pub telegram: Option<TelegramSettings>,
    pub send_to_tg_default: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TelegramSettings {
    pub bot_token: String,
    pub chat_id: String,
    pub api_base: String,
    pub locale: Locale,
    pub debug: bool,
}

pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org/";

impl ServiceSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let flag = |key: &str| {
            lookup(key)
                .map(|v| v.trim().eq_ignore_ascii_case("true"))
                .unwrap_or(false)
        };

        let port = lookup("PORT").and_then(|p| match p.trim().parse::<u16>() {
            Ok(port) => Some(port),
            Err(_) => {
                log::warn!("Ignoring invalid PORT value: {}", p);
                None
            }
        });

        let telegram = match (lookup("TELEGRAM_BOT_TOKEN"), lookup("TELEGRAM_CHAT_ID")) {
            (Some(bot_token), Some(chat_id)) if !bot_token.is_empty() && !chat_id.is_empty() => {
                let locale = lookup("TELEGRAM_LOCALE")
                    .and_then(|l| l.parse::<Locale>().ok())
                    .unwrap_or_default();
                Some(TelegramSettings {
                    bot_token,
                    chat_id,
                    api_base: lookup("TELEGRAM_API_BASE")
                        .unwrap_or_else(|| TELEGRAM_API_BASE.to_string()),
                    locale,
                    debug: flag("SEND_TG_DEBUG"),
                })
            }
            _ => None,
        };

        Self {
            port,
            model_config: lookup("MODEL_CONFIG").map(PathBuf::from),
            telegram,
            send_to_tg_default: flag("SEND_TO_TG_DEFAULT"),
        }
    }
}
