use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::color::SplitColors;
use crate::config::XReportConfig;
use crate::data::sample::Split;
use crate::pipeline::{run_validation, ValidationRequest};
use crate::report::PixelReport;

// ---------------------------------------------------------------------------
// Viewer state
// ---------------------------------------------------------------------------

/// The full histogram viewer state, independent of rendering.
pub struct ViewerState {
    /// Sampling and resize settings used when (re)loading a dataset.
    pub config: XReportConfig,

    /// Dataset the histograms were computed from.
    pub source: Option<PathBuf>,

    /// Per-split histograms (None until a dataset is loaded).
    pub pixels: Option<PixelReport>,

    /// Splits currently drawn.
    pub visible: BTreeSet<Split>,

    /// Plot normalised densities instead of raw counts.
    pub density: bool,

    pub colors: SplitColors,

    /// First resolved image of each split, shown as a thumbnail.
    pub previews: BTreeMap<Split, PathBuf>,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,

    /// Whether a dataset is being processed.
    pub loading: bool,
}

impl ViewerState {
    pub fn new(config: XReportConfig) -> Self {
        Self {
            config,
            source: None,
            pixels: None,
            visible: Split::ALL.into_iter().collect(),
            density: true,
            colors: SplitColors::default(),
            previews: BTreeMap::new(),
            status_message: None,
            loading: false,
        }
    }

    /// Ingest freshly computed histograms and show every split.
    pub fn set_pixels(&mut self, source: PathBuf, pixels: PixelReport) {
        self.source = Some(source);
        self.pixels = Some(pixels);
        self.visible = Split::ALL.into_iter().collect();
        self.status_message = None;
        self.loading = false;
    }

    /// Run the validation flow with histograms on and keep its pixel report.
    /// Failures end up in `status_message`.
    pub fn load(&mut self, dataset: &Path, images_dir: &Path) {
        self.loading = true;
        let request = ValidationRequest {
            dataset: dataset.to_path_buf(),
            images_dir: images_dir.to_path_buf(),
            histograms: true,
            top_tokens: 0,
        };
        match run_validation(&self.config, &request) {
            Ok(outcome) => {
                self.previews = Split::ALL
                    .into_iter()
                    .filter_map(|split| {
                        let path = outcome.split.get(split).image_paths().next()?;
                        Some((split, path.to_path_buf()))
                    })
                    .collect();
                match outcome.report.pixels {
                    Some(pixels) => self.set_pixels(dataset.to_path_buf(), pixels),
                    None => self.loading = false,
                }
            }
            Err(e) => {
                log::error!("Failed to load dataset: {e:#}");
                self.status_message = Some(format!("Error: {e:#}"));
                self.loading = false;
            }
        }
    }

    pub fn is_visible(&self, split: Split) -> bool {
        self.visible.contains(&split)
    }

    pub fn toggle_split(&mut self, split: Split) {
        if !self.visible.remove(&split) {
            self.visible.insert(split);
        }
    }

    /// `[intensity, value]` points of one split's histogram.
    pub fn series(&self, split: Split) -> Option<Vec<[f64; 2]>> {
        let hist = self.pixels.as_ref()?.get(split);
        let values: Vec<f64> = if self.density {
            hist.density()
        } else {
            hist.counts().iter().map(|&c| c as f64).collect()
        };
        Some(
            values
                .into_iter()
                .enumerate()
                .map(|(bin, v)| [bin as f64, v])
                .collect(),
        )
    }
}
