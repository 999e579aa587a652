use std::fmt;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::{InspectError, InspectResult};

// ---------------------------------------------------------------------------
// Picture shape
// ---------------------------------------------------------------------------

/// Target image shape as `(height, width, channels)`.
/// Serialized as a 3-element array so saved parameter files stay readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[u32; 3]", into = "[u32; 3]")]
pub struct PictureShape {
    pub height: u32,
    pub width: u32,
    pub channels: u32,
}

impl PictureShape {
    pub const fn new(height: u32, width: u32, channels: u32) -> Self {
        Self {
            height,
            width,
            channels,
        }
    }

    /// Both sides non-zero, 1 (grayscale) or 3 (RGB) channels.
    pub fn validate(&self) -> InspectResult<()> {
        let reason = if self.height == 0 || self.width == 0 {
            "has a zero side"
        } else if self.channels != 1 && self.channels != 3 {
            "must have 1 or 3 channels"
        } else {
            return Ok(());
        };
        Err(InspectError::InvalidPictureShape {
            shape: *self,
            reason,
        })
    }

    /// Number of `f32` values one image occupies in HWC layout.
    pub fn pixel_len(&self) -> usize {
        self.height as usize * self.width as usize * self.channels as usize
    }
}

impl From<[u32; 3]> for PictureShape {
    fn from([height, width, channels]: [u32; 3]) -> Self {
        Self::new(height, width, channels)
    }
}

impl From<PictureShape> for [u32; 3] {
    fn from(shape: PictureShape) -> Self {
        [shape.height, shape.width, shape.channels]
    }
}

impl fmt::Display for PictureShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.height, self.width, self.channels)
    }
}

// ---------------------------------------------------------------------------
// Device selector
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Device {
    Cpu,
    #[default]
    Gpu,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "CPU"),
            Device::Gpu => write!(f, "GPU"),
        }
    }
}

// ---------------------------------------------------------------------------
// Column names
// ---------------------------------------------------------------------------

/// Names of the dataset columns the flows read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    pub text: String,
    pub path: String,
    pub id: String,
    pub tokens: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            text: "text".into(),
            path: "images_path".into(),
            id: "id".into(),
            tokens: "tokenized_text".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline configuration
// ---------------------------------------------------------------------------

/// Every knob of the pipeline. Keys absent from a config file keep the
/// defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct XReportConfig {
    // advanced training settings
    pub use_mixed_precision: bool,
    pub use_tensorboard: bool,
    pub xla_acceleration: bool,
    pub training_device: Device,
    pub num_processors: usize,

    // training routine
    pub epochs: usize,
    pub learning_rate: f64,
    pub batch_size: usize,

    // model
    pub picture_shape: PictureShape,
    pub embedding_dims: usize,
    pub kernel_size: usize,
    pub num_heads: usize,
    pub generate_model_graph: bool,

    // training data
    pub num_train_samples: usize,
    pub num_test_samples: usize,
    pub augmentation: bool,

    // general
    pub seed: u64,
    pub split_seed: u64,

    pub columns: ColumnNames,
}

impl Default for XReportConfig {
    fn default() -> Self {
        Self {
            use_mixed_precision: true,
            use_tensorboard: false,
            xla_acceleration: false,
            training_device: Device::Gpu,
            num_processors: 6,
            epochs: 20,
            learning_rate: 0.001,
            batch_size: 10,
            picture_shape: PictureShape::new(144, 144, 1),
            embedding_dims: 768,
            kernel_size: 2,
            num_heads: 4,
            generate_model_graph: true,
            num_train_samples: 20_000,
            num_test_samples: 2_000,
            augmentation: false,
            seed: 72,
            split_seed: 40,
            columns: ColumnNames::default(),
        }
    }
}

impl XReportConfig {
    /// Read a JSON config file and validate it.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: XReportConfig = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            bail!("batch_size must be greater than zero");
        }
        self.picture_shape.validate()?;
        Ok(())
    }

    /// Rows drawn from the raw dataset for both splits together, saturating
    /// at `usize::MAX`.
    pub fn total_samples(&self) -> usize {
        self.num_train_samples.saturating_add(self.num_test_samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_training_configuration() {
        let cfg = XReportConfig::default();
        assert_eq!(cfg.batch_size, 10);
        assert_eq!(cfg.epochs, 20);
        assert_eq!(cfg.picture_shape, PictureShape::new(144, 144, 1));
        assert_eq!(cfg.seed, 72);
        assert_eq!(cfg.split_seed, 40);
        assert_eq!(cfg.total_samples(), 22_000);
        assert_eq!(cfg.training_device, Device::Gpu);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ "batch_size": 4, "picture_shape": [64, 32, 3], "training_device": "CPU" }"#,
        )
        .unwrap();

        let cfg = XReportConfig::load(&path).unwrap();
        assert_eq!(cfg.batch_size, 4);
        assert_eq!(cfg.picture_shape, PictureShape::new(64, 32, 3));
        assert_eq!(cfg.training_device, Device::Cpu);
        assert_eq!(cfg.epochs, 20);
        assert_eq!(cfg.columns.text, "text");
    }

    #[test]
    fn rejects_zero_batch_and_odd_channels() {
        let mut cfg = XReportConfig::default();
        cfg.batch_size = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = XReportConfig::default();
        cfg.picture_shape = PictureShape::new(32, 32, 2);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn picture_shape_validation() {
        assert!(PictureShape::new(64, 64, 1).validate().is_ok());
        assert!(PictureShape::new(64, 32, 3).validate().is_ok());
        assert!(matches!(
            PictureShape::new(64, 64, 2).validate(),
            Err(InspectError::InvalidPictureShape { .. })
        ));
        assert!(PictureShape::new(0, 64, 1).validate().is_err());
    }

    #[test]
    fn total_samples_saturates() {
        let cfg = XReportConfig {
            num_train_samples: usize::MAX,
            num_test_samples: 1,
            ..XReportConfig::default()
        };
        assert_eq!(cfg.total_samples(), usize::MAX);
    }

    #[test]
    fn picture_shape_serializes_as_array() {
        let json = serde_json::to_string(&PictureShape::new(1, 2, 3)).unwrap();
        assert_eq!(json, "[1,2,3]");
    }
}
