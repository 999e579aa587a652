//! Saved model checkpoints.
//!
//! A checkpoint root holds one folder per training run. Each folder keeps
//! its artifacts either in a `model/` subfolder or directly inside it:
//!
//! ```text
//!  checkpoints/
//!    XREP_20240105H1530/
//!      model/
//!        model_parameters.json      hyperparameters used for training
//!        model_configuration.json   captioning model config (optional)
//!        model_weights.h5           opaque weights
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::PictureShape;
use crate::error::{InspectError, InspectResult};

pub const PARAMETERS_FILE: &str = "model_parameters.json";
pub const CONFIGURATION_FILE: &str = "model_configuration.json";
pub const WEIGHTS_FILE: &str = "model_weights.h5";
const ARTIFACTS_DIR: &str = "model";

// ---------------------------------------------------------------------------
// Saved records
// ---------------------------------------------------------------------------

/// Hyperparameters written at training time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParameters {
    pub batch_size: usize,
    pub epochs: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture_shape: Option<PictureShape>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_train_samples: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_test_samples: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learning_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_dims: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kernel_size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_heads: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub augmentation: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Keys this tool does not interpret, kept so nothing is lost on rewrite.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ModelParameters {
    pub fn new(batch_size: usize, epochs: usize) -> Self {
        Self {
            batch_size,
            epochs,
            picture_shape: None,
            num_train_samples: None,
            num_test_samples: None,
            learning_rate: None,
            embedding_dims: None,
            kernel_size: None,
            num_heads: None,
            augmentation: None,
            seed: None,
            extra: BTreeMap::new(),
        }
    }
}

/// Serialized constructor arguments of the captioning model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfiguration {
    pub picture_shape: PictureShape,
    pub sequence_length: usize,
    pub vocab_size: usize,
    pub embedding_dims: usize,
    pub kernel_size: usize,
    pub num_heads: usize,
    pub learning_rate: f64,
    #[serde(rename = "XLA_state", default)]
    pub xla_state: bool,
    pub seed: u64,
}

// ---------------------------------------------------------------------------
// Checkpoint
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    pub name: String,
    pub folder: PathBuf,
    pub parameters: ModelParameters,
    pub configuration: Option<ModelConfiguration>,
    pub weights: PathBuf,
    pub weights_bytes: u64,
}

impl Checkpoint {
    /// Write `model_parameters.json` into `folder`.
    pub fn save_parameters(folder: &Path, parameters: &ModelParameters) -> InspectResult<PathBuf> {
        let path = folder.join(PARAMETERS_FILE);
        let json = serde_json::to_string_pretty(parameters).map_err(|source| {
            InspectError::Json {
                path: path.clone(),
                source,
            }
        })?;
        std::fs::write(&path, json).map_err(|source| InspectError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    /// Picture shape the model was trained with, if recorded anywhere.
    pub fn picture_shape(&self) -> Option<PictureShape> {
        self.configuration
            .as_ref()
            .map(|c| c.picture_shape)
            .or(self.parameters.picture_shape)
    }
}

/// Which checkpoint folder to load.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CheckpointSelector {
    #[default]
    Latest,
    /// 1-based position in the sorted folder list.
    Index(usize),
    Name(String),
}

impl FromStr for CheckpointSelector {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("latest") {
            return Ok(CheckpointSelector::Latest);
        }
        Ok(match s.parse::<usize>() {
            Ok(i) => CheckpointSelector::Index(i),
            Err(_) => CheckpointSelector::Name(s.to_string()),
        })
    }
}

impl fmt::Display for CheckpointSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckpointSelector::Latest => write!(f, "latest"),
            CheckpointSelector::Index(i) => write!(f, "{i}"),
            CheckpointSelector::Name(n) => write!(f, "{n}"),
        }
    }
}

/// Sorted names of the checkpoint folders under `root`.
pub fn list_checkpoints(root: &Path) -> InspectResult<Vec<String>> {
    let io_err = |source: std::io::Error| InspectError::Io {
        path: root.to_path_buf(),
        source,
    };
    let mut names = Vec::new();
    for entry in std::fs::read_dir(root).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        if entry.path().is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

pub fn select_checkpoint(root: &Path, selector: &CheckpointSelector) -> InspectResult<PathBuf> {
    let names = list_checkpoints(root)?;
    if names.is_empty() {
        return Err(InspectError::NoCheckpoints(root.to_path_buf()));
    }

    let name = match selector {
        CheckpointSelector::Latest => {
            if names.len() > 1 {
                log::info!(
                    "{} checkpoints in {}, using the latest",
                    names.len(),
                    root.display()
                );
            }
            names[names.len() - 1].clone()
        }
        CheckpointSelector::Index(i) => {
            if *i == 0 || *i > names.len() {
                return Err(InspectError::CheckpointIndex {
                    index: *i,
                    count: names.len(),
                });
            }
            names[i - 1].clone()
        }
        CheckpointSelector::Name(n) => {
            if !names.contains(n) {
                return Err(InspectError::UnknownCheckpoint {
                    root: root.to_path_buf(),
                    name: n.clone(),
                });
            }
            n.clone()
        }
    };
    Ok(root.join(name))
}

/// Load the parameters, configuration and weights location of one folder.
pub fn load_checkpoint(folder: &Path) -> InspectResult<Checkpoint> {
    let parameters: ModelParameters = read_json(&locate(folder, PARAMETERS_FILE)?)?;
    let configuration = match locate(folder, CONFIGURATION_FILE) {
        Ok(path) => Some(read_json(&path)?),
        Err(_) => None,
    };
    let weights = locate(folder, WEIGHTS_FILE)?;
    let weights_bytes = std::fs::metadata(&weights)
        .map_err(|source| InspectError::Io {
            path: weights.clone(),
            source,
        })?
        .len();

    let name = folder
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    log::info!(
        "Loaded checkpoint {name} (batch size {}, {} epochs, {weights_bytes} weight bytes)",
        parameters.batch_size,
        parameters.epochs
    );

    Ok(Checkpoint {
        name,
        folder: folder.to_path_buf(),
        parameters,
        configuration,
        weights,
        weights_bytes,
    })
}

/// Prefer `<folder>/model/<file>`, fall back to `<folder>/<file>`.
fn locate(folder: &Path, file: &'static str) -> InspectResult<PathBuf> {
    [folder.join(ARTIFACTS_DIR).join(file), folder.join(file)]
        .into_iter()
        .find(|p| p.is_file())
        .ok_or(InspectError::MissingArtifact {
            folder: folder.to_path_buf(),
            file,
        })
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> InspectResult<T> {
    let text = std::fs::read_to_string(path).map_err(|source| InspectError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| InspectError::Json {
        path: path.to_path_buf(),
        source,
    })
}
