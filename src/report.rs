use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::config::{Device, PictureShape};
use crate::data::generator::OutputSignature;
use crate::data::pixels::{HistogramComparison, IntensityHistogram};
use crate::data::sample::Split;
use crate::data::tokens::TokenStats;

const RULE: &str =
    "-------------------------------------------------------------------------------";

// ---------------------------------------------------------------------------
// Validation report
// ---------------------------------------------------------------------------

/// Per-split intensity histograms and how far apart they are.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PixelReport {
    pub train: IntensityHistogram,
    pub test: IntensityHistogram,
    pub comparison: HistogramComparison,
}

impl PixelReport {
    pub fn new(train: IntensityHistogram, test: IntensityHistogram) -> Self {
        let comparison = HistogramComparison::between(&train, &test);
        Self {
            train,
            test,
            comparison,
        }
    }

    pub fn get(&self, split: Split) -> &IntensityHistogram {
        match split {
            Split::Train => &self.train,
            Split::Test => &self.test,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub dataset: PathBuf,
    pub dataset_rows: usize,
    pub resolved_images: usize,
    pub missing_images: usize,
    pub seed: u64,
    pub split_seed: u64,
    pub train_rows: usize,
    pub test_rows: usize,
    pub train_tokens: TokenStats,
    pub test_tokens: TokenStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pixels: Option<PixelReport>,
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{RULE}")?;
        writeln!(f, "XRAYREP dataset validation")?;
        writeln!(f, "{RULE}")?;
        writeln!(f, "Dataset:                 {}", self.dataset.display())?;
        writeln!(f, "Loaded reports:          {}", self.dataset_rows)?;
        writeln!(
            f,
            "Reports with images:     {} ({} dropped)",
            self.resolved_images, self.missing_images
        )?;
        writeln!(
            f,
            "Sampling seed:           {} (split seed {})",
            self.seed, self.split_seed
        )?;
        writeln!(f, "Number of train samples: {}", self.train_rows)?;
        writeln!(f, "Number of test samples:  {}", self.test_rows)?;
        writeln!(f, "{RULE}")?;

        writeln!(
            f,
            "{:<6} {:>8} {:>9} {:>8} {:>6} {:>6} {:>8}",
            "split", "reports", "words", "unique", "min", "max", "mean"
        )?;
        for (split, stats) in [(Split::Train, &self.train_tokens), (Split::Test, &self.test_tokens)]
        {
            writeln!(
                f,
                "{:<6} {:>8} {:>9} {:>8} {:>6} {:>6} {:>8.2}",
                split.to_string(),
                stats.documents,
                stats.total_tokens,
                stats.unique_tokens,
                stats.min_length,
                stats.max_length,
                stats.mean_length
            )?;
        }
        for (split, stats) in [(Split::Train, &self.train_tokens), (Split::Test, &self.test_tokens)]
        {
            let top: Vec<String> = stats
                .top_tokens
                .iter()
                .map(|(w, c)| format!("{w} ({c})"))
                .collect();
            writeln!(f, "Top words ({split}): {}", top.join(", "))?;
        }
        writeln!(f, "{RULE}")?;

        if let Some(px) = &self.pixels {
            writeln!(
                f,
                "{:<6} {:>8} {:>8} {:>8} {:>8}",
                "split", "images", "skipped", "mean", "std"
            )?;
            for split in Split::ALL {
                let h = px.get(split);
                writeln!(
                    f,
                    "{:<6} {:>8} {:>8} {:>8.2} {:>8.2}",
                    split.to_string(),
                    h.images(),
                    h.skipped(),
                    h.mean(),
                    h.std_dev()
                )?;
            }
            writeln!(
                f,
                "Histogram intersection:  {:.4}",
                px.comparison.intersection
            )?;
            writeln!(f, "Mean intensity delta:    {:.2}", px.comparison.mean_delta)?;
            writeln!(
                f,
                "Max bin delta:           {:.4}",
                px.comparison.max_bin_delta
            )?;
            writeln!(f, "{RULE}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Evaluation summary
// ---------------------------------------------------------------------------

/// Static summary printed after a checkpoint and its data are loaded.
/// Batch size and epochs come from the checkpoint's parameters record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationSummary {
    pub checkpoint: String,
    pub train_samples: usize,
    pub test_samples: usize,
    /// Preprocessed rows dropped because their image file was not found.
    pub train_missing_images: usize,
    pub test_missing_images: usize,
    pub batch_size: usize,
    pub epochs: usize,
    /// `len(word_index) + 1`: every indexed word plus the padding id 0,
    /// counted once. No second `+ 1` is added for display.
    pub vocabulary_size: Option<usize>,
    pub caption_length: usize,
    pub picture_shape: PictureShape,
    pub train_batches: usize,
    pub test_batches: usize,
    pub signature: OutputSignature,
    pub augmentation: bool,
    pub device: Device,
}

impl fmt::Display for EvaluationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let vocab = self
            .vocabulary_size
            .map(|v| v.to_string())
            .unwrap_or_else(|| "n/a".into());

        writeln!(f, "{RULE}")?;
        writeln!(f, "XRAYREP evaluation report")?;
        writeln!(f, "{RULE}")?;
        writeln!(f, "Checkpoint:              {}", self.checkpoint)?;
        writeln!(f, "Number of train samples: {}", self.train_samples)?;
        writeln!(f, "Number of test samples:  {}", self.test_samples)?;
        writeln!(
            f,
            "Dropped (no image):      {} train / {} test",
            self.train_missing_images, self.test_missing_images
        )?;
        writeln!(f, "{RULE}")?;
        writeln!(f, "Batch size:              {}", self.batch_size)?;
        writeln!(f, "Epochs:                  {}", self.epochs)?;
        writeln!(f, "Vocabulary size:         {vocab}")?;
        writeln!(f, "Caption length:          {}", self.caption_length)?;
        writeln!(f, "Picture shape:           {}", self.picture_shape)?;
        writeln!(f, "Train batches:           {}", self.train_batches)?;
        writeln!(f, "Test batches:            {}", self.test_batches)?;
        writeln!(f, "Augmentation:            {}", self.augmentation)?;
        writeln!(f, "Device:                  {}", self.device)?;
        writeln!(f, "{RULE}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> EvaluationSummary {
        EvaluationSummary {
            checkpoint: "XREP_run".into(),
            train_samples: 120,
            test_samples: 30,
            train_missing_images: 2,
            test_missing_images: 0,
            batch_size: 12,
            epochs: 40,
            vocabulary_size: None,
            caption_length: 200,
            picture_shape: PictureShape::new(144, 144, 1),
            train_batches: 10,
            test_batches: 2,
            signature: OutputSignature {
                image: [12, 144, 144, 1],
                tokens: [12, 200],
                caption: [12, 200],
            },
            augmentation: false,
            device: Device::Gpu,
        }
    }

    #[test]
    fn evaluation_banner_lists_training_values() {
        let text = summary().to_string();
        assert!(text.starts_with(RULE));
        assert!(text.contains("Number of train samples: 120\n"));
        assert!(text.contains("Dropped (no image):      2 train / 0 test\n"));
        assert!(text.contains("Batch size:              12\n"));
        assert!(text.contains("Epochs:                  40\n"));
        assert!(text.contains("Vocabulary size:         n/a\n"));
        assert!(text.contains("Picture shape:           (144, 144, 1)\n"));
    }

    #[test]
    fn evaluation_json_carries_signature() {
        let json = serde_json::to_value(summary()).unwrap();
        assert_eq!(json["batch_size"], 12);
        assert_eq!(json["signature"]["caption"][1], 200);
        assert_eq!(json["device"], "GPU");
    }

    #[test]
    fn validation_report_renders_pixels_only_when_present() {
        let stats = TokenStats::from_texts(["normal heart", "clear lungs"], 3);
        let mut report = ValidationReport {
            dataset: PathBuf::from("reports.csv"),
            dataset_rows: 10,
            resolved_images: 9,
            missing_images: 1,
            seed: 72,
            split_seed: 40,
            train_rows: 2,
            test_rows: 2,
            train_tokens: stats.clone(),
            test_tokens: stats,
            pixels: None,
        };
        let text = report.to_string();
        assert!(text.contains("Reports with images:     9 (1 dropped)"));
        assert!(text.contains("Top words (train): clear (1), heart (1), lungs (1)"));
        assert!(!text.contains("Histogram intersection"));

        report.pixels = Some(PixelReport::new(
            IntensityHistogram::default(),
            IntensityHistogram::default(),
        ));
        assert!(report.to_string().contains("Histogram intersection:  0.0000"));
    }
}
