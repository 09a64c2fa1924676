//! Reading state-dict checkpoints and binding them onto a scripted module.
//!
//! Checkpoints saved from a data-parallel wrapper prefix every key with
//! `module.`, and some trainers nest the weights under `state_dict.`. Both
//! prefixes are stripped before keys are matched against the module's own
//! parameter names.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tch::{Device, Tensor};

const WRAPPER_PREFIXES: [&str; 2] = ["state_dict.", "module."];

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Model file not found: {0}")]
    MissingFile(PathBuf),
    #[error("Torch error while loading {path}: {source}")]
    Torch {
        path: PathBuf,
        source: tch::TchError,
    },
    #[error(
        "Cannot read checkpoint {path} as a flat name-to-tensor archive \
         (nested dicts such as {{'state_dict': {{...}}}} must be re-saved flat): {source}"
    )]
    UnreadableCheckpoint {
        path: PathBuf,
        source: tch::TchError,
    },
    #[error("Shape mismatch for {key}: module expects {expected:?}, checkpoint has {found:?}")]
    ShapeMismatch {
        key: String,
        expected: Vec<i64>,
        found: Vec<i64>,
    },
    #[error("Checkpoint {0} matched none of the module parameters")]
    NothingBound(PathBuf),
    #[error("Invalid model configuration: {0}")]
    Config(#[from] crate::config::ConfigError),
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BindSummary {
    pub bound: usize,
    pub missing: Vec<String>,
    pub unexpected: Vec<String>,
}

pub fn normalize_key(key: &str) -> &str {
    let mut key = key;
    for prefix in WRAPPER_PREFIXES {
        if let Some(stripped) = key.strip_prefix(prefix) {
            key = stripped;
        }
    }
    key
}

pub fn normalize_state_dict(state: Vec<(String, Tensor)>) -> HashMap<String, Tensor> {
    state
        .into_iter()
        .map(|(key, tensor)| (normalize_key(&key).to_string(), tensor))
        .collect()
}

/// Reads a flat named-tensor checkpoint. The format follows the file
/// extension: `.safetensors`, `.npz`, `.ot` (tch native), anything else is
/// treated as a `torch.save` zip archive of a flat `{name: tensor}` dict.
/// Keys flattened from a `state_dict` wrapper (`state_dict.<name>`) are
/// accepted; a nested dict is not.
pub fn read_checkpoint(path: &Path, device: Device) -> Result<Vec<(String, Tensor)>, LoadError> {
    if !path.exists() {
        return Err(LoadError::MissingFile(path.to_path_buf()));
    }
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    let result = match extension.as_deref() {
        Some("safetensors") => Tensor::read_safetensors(path),
        Some("npz") => Tensor::read_npz(path),
        Some("ot") => Tensor::load_multi_with_device(path, device),
        _ => Tensor::loadz_multi_with_device(path, device),
    };
    result.map_err(|source| LoadError::UnreadableCheckpoint {
        path: path.to_path_buf(),
        source,
    })
}

/// Copies checkpoint tensors into `parameters` in place. The parameter tensors
/// must share storage with the module (as returned by `named_parameters`).
///
/// A shape mismatch aborts the load. Keys present on only one side are
/// reported in the summary and left untouched.
pub fn bind_parameters(
    parameters: Vec<(String, Tensor)>,
    checkpoint: Vec<(String, Tensor)>,
    checkpoint_path: &Path,
) -> Result<BindSummary, LoadError> {
    let mut state = normalize_state_dict(checkpoint);
    let mut summary = BindSummary::default();

    for (name, mut target) in parameters {
        let Some(value) = state.remove(&name) else {
            summary.missing.push(name);
            continue;
        };
        if value.size() != target.size() {
            return Err(LoadError::ShapeMismatch {
                key: name,
                expected: target.size(),
                found: value.size(),
            });
        }
        tch::no_grad(|| {
            let value = value.to_device(target.device()).to_kind(target.kind());
            target.f_copy_(&value)
        })
        .map_err(|source| LoadError::Torch {
            path: checkpoint_path.to_path_buf(),
            source,
        })?;
        summary.bound += 1;
    }

    if summary.bound == 0 {
        return Err(LoadError::NothingBound(checkpoint_path.to_path_buf()));
    }

    summary.unexpected = state.into_keys().collect();
    summary.unexpected.sort();
    Ok(summary)
}
