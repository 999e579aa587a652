//! The two end-to-end flows: dataset validation and checkpoint evaluation.
//!
//! ```text
//!  validation:  csv ─► resolve images ─► seeded split ─► token stats ─► [histograms]
//!  evaluation:  checkpoint ─► XREP_train/test.csv ─► generators ─► datasets ─► summary
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::checkpoint::{self, CheckpointSelector};
use crate::config::{PictureShape, XReportConfig};
use crate::data::generator::{DataGenerator, GeneratorSettings, TensorDataset};
use crate::data::loader::{load_file, resolve_image_paths};
use crate::data::pixels::IntensityHistogram;
use crate::data::sample::{train_test_split, TrainTestSplit};
use crate::data::tokens::{TokenStats, WordTokenizer};
use crate::report::{EvaluationSummary, PixelReport, ValidationReport};

pub const TRAIN_FILE: &str = "XREP_train.csv";
pub const TEST_FILE: &str = "XREP_test.csv";
pub const TOKENIZER_FILE: &str = "word_tokenizer.json";

// ---------------------------------------------------------------------------
// Validation flow
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ValidationRequest {
    pub dataset: PathBuf,
    pub images_dir: PathBuf,
    pub histograms: bool,
    pub top_tokens: usize,
}

#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub report: ValidationReport,
    pub split: TrainTestSplit,
}

pub fn run_validation(
    config: &XReportConfig,
    request: &ValidationRequest,
) -> Result<ValidationOutcome> {
    let mut dataset = load_file(&request.dataset, &config.columns)?;
    let loaded = dataset.len();
    let resolved = resolve_image_paths(&mut dataset, &request.images_dir, &config.columns)?;

    let split = train_test_split(
        &dataset,
        config.num_train_samples,
        config.num_test_samples,
        config.seed,
        config.split_seed,
    )
    .context("sampling train/test subsets")?;

    let pixels = request
        .histograms
        .then(|| split_histograms(&split, config.picture_shape));

    let report = ValidationReport {
        dataset: request.dataset.clone(),
        dataset_rows: loaded,
        resolved_images: resolved.resolved,
        missing_images: resolved.missing,
        seed: config.seed,
        split_seed: config.split_seed,
        train_rows: split.train.len(),
        test_rows: split.test.len(),
        train_tokens: TokenStats::from_texts(split.train.texts(), request.top_tokens),
        test_tokens: TokenStats::from_texts(split.test.texts(), request.top_tokens),
        pixels,
    };
    Ok(ValidationOutcome { report, split })
}

/// Intensity histograms of both splits, images resized to `shape`.
pub fn split_histograms(split: &TrainTestSplit, shape: PictureShape) -> PixelReport {
    let train = IntensityHistogram::from_paths(split.train.image_paths(), Some(shape));
    let test = IntensityHistogram::from_paths(split.test.image_paths(), Some(shape));
    log::info!(
        "Histograms from {} train and {} test images",
        train.images(),
        test.images()
    );
    PixelReport::new(train, test)
}

// ---------------------------------------------------------------------------
// Evaluation flow
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct EvaluationRequest {
    pub checkpoints: PathBuf,
    pub selector: CheckpointSelector,
    /// Folder with `XREP_train.csv`, `XREP_test.csv` and optionally the
    /// saved word tokenizer.
    pub preprocessing_dir: PathBuf,
    /// Base for relative image paths; defaults to `preprocessing_dir`.
    pub images_dir: Option<PathBuf>,
}

pub fn run_evaluation(
    config: &XReportConfig,
    request: &EvaluationRequest,
) -> Result<EvaluationSummary> {
    let folder = checkpoint::select_checkpoint(&request.checkpoints, &request.selector)?;
    let ckpt = checkpoint::load_checkpoint(&folder)?;

    let images_dir = request
        .images_dir
        .as_deref()
        .unwrap_or(&request.preprocessing_dir);
    let mut train = load_file(&request.preprocessing_dir.join(TRAIN_FILE), &config.columns)?;
    let mut test = load_file(&request.preprocessing_dir.join(TEST_FILE), &config.columns)?;
    let train_resolved = resolve_image_paths(&mut train, images_dir, &config.columns)?;
    let test_resolved = resolve_image_paths(&mut test, images_dir, &config.columns)?;

    let tokenizer_path = request.preprocessing_dir.join(TOKENIZER_FILE);
    let vocabulary_size = if tokenizer_path.is_file() {
        Some(WordTokenizer::load(&tokenizer_path)?.vocabulary_size())
    } else {
        log::warn!("No {TOKENIZER_FILE} in {}", request.preprocessing_dir.display());
        ckpt.configuration.as_ref().map(|c| c.vocab_size)
    };

    let picture_shape = ckpt.picture_shape().unwrap_or(config.picture_shape);
    picture_shape
        .validate()
        .with_context(|| format!("checkpoint {}", ckpt.name))?;

    let settings = GeneratorSettings {
        batch_size: ckpt.parameters.batch_size,
        picture_shape,
        shuffle: true,
        augmentation: config.augmentation,
        seed: config.seed,
    };
    let train_ds = TensorDataset::from_generator(
        DataGenerator::new(&train, &config.columns, settings.clone())
            .context("building train generator")?,
    )
    .context("reading the first train batch")?;
    // The test split shares the train signature, so it may hold fewer rows
    // than one batch.
    let signature = train_ds.signature();
    let test_ds = TensorDataset::new(
        DataGenerator::new(&test, &config.columns, settings.clone())
            .context("building test generator")?,
        signature,
    );
    if test_ds.num_batches() == 0 {
        log::warn!(
            "Test split has {} rows, fewer than one batch of {}",
            test_ds.num_samples(),
            settings.batch_size
        );
    }

    Ok(EvaluationSummary {
        checkpoint: ckpt.name.clone(),
        train_samples: train_ds.num_samples(),
        test_samples: test_ds.num_samples(),
        train_missing_images: train_resolved.missing,
        test_missing_images: test_resolved.missing,
        batch_size: ckpt.parameters.batch_size,
        epochs: ckpt.parameters.epochs,
        vocabulary_size,
        caption_length: signature.caption_length(),
        picture_shape: settings.picture_shape,
        train_batches: train_ds.num_batches(),
        test_batches: test_ds.num_batches(),
        signature,
        augmentation: settings.augmentation,
        device: config.training_device,
    })
}
