//! On-the-fly batch generation from a preprocessed split.
//!
//! Each sample pairs an image file with a pre-tokenized, padded report
//! (`tokenized_text`, space-separated token ids). Batches are assembled
//! lazily so only one batch of pixels is ever in memory.

use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use super::model::ReportDataset;
use crate::config::{ColumnNames, PictureShape};
use crate::error::{InspectError, InspectResult};

const SHIFT_WIDTH_RANGE: f32 = 0.2;
const SHIFT_HEIGHT_RANGE: f32 = 0.3;

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorSettings {
    pub batch_size: usize,
    pub picture_shape: PictureShape,
    pub shuffle: bool,
    pub augmentation: bool,
    pub seed: u64,
}

/// One assembled batch. Images are `[batch, height, width, channels]`
/// scaled to `[0, 1]`; token inputs and caption targets are
/// `[batch, sequence]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub images: Vec<f32>,
    pub tokens: Vec<f32>,
    pub captions: Vec<f32>,
    pub image_shape: [usize; 4],
    pub sequence_shape: [usize; 2],
}

/// Shapes of a batch, as a dataset wrapper needs to declare them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OutputSignature {
    pub image: [usize; 4],
    pub tokens: [usize; 2],
    pub caption: [usize; 2],
}

impl OutputSignature {
    pub fn caption_length(&self) -> usize {
        self.caption[1]
    }
}

#[derive(Debug, Clone)]
struct Sample {
    image_path: PathBuf,
    tokens: Vec<f32>,
}

// ---------------------------------------------------------------------------
// DataGenerator
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct DataGenerator {
    samples: Vec<Sample>,
    indexes: Vec<usize>,
    settings: GeneratorSettings,
    rng: StdRng,
    batch_index: usize,
}

impl DataGenerator {
    /// Every record needs a resolved image path and a tokenized text
    /// column; token ids are parsed here so bad rows fail early.
    pub fn new(
        dataset: &ReportDataset,
        columns: &ColumnNames,
        settings: GeneratorSettings,
    ) -> InspectResult<Self> {
        if settings.batch_size == 0 {
            return Err(InspectError::ZeroBatchSize);
        }
        settings.picture_shape.validate()?;
        if !dataset.is_empty() && !dataset.column_names.contains(&columns.tokens) {
            return Err(InspectError::MissingColumn(columns.tokens.clone()));
        }

        let samples = dataset
            .records
            .iter()
            .enumerate()
            .map(|(row, record)| -> InspectResult<Sample> {
                let image_path = record
                    .image_path
                    .clone()
                    .ok_or(InspectError::MissingImagePath { row })?;
                let raw = dataset.field_text(row, &columns.tokens).unwrap_or_default();
                Ok(Sample {
                    image_path,
                    tokens: parse_tokens(&raw, row)?,
                })
            })
            .collect::<InspectResult<Vec<_>>>()?;

        let mut generator = DataGenerator {
            indexes: (0..samples.len()).collect(),
            samples,
            rng: StdRng::seed_from_u64(settings.seed),
            settings,
            batch_index: 0,
        };
        generator.on_epoch_end();
        Ok(generator)
    }

    pub fn num_samples(&self) -> usize {
        self.samples.len()
    }

    pub fn settings(&self) -> &GeneratorSettings {
        &self.settings
    }

    /// Complete batches per epoch; a trailing partial batch is dropped.
    pub fn len(&self) -> usize {
        self.samples.len() / self.settings.batch_size
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reshuffle the sample order when shuffling is enabled.
    pub fn on_epoch_end(&mut self) {
        if self.settings.shuffle {
            self.indexes.shuffle(&mut self.rng);
        }
    }

    pub fn batch(&mut self, idx: usize) -> InspectResult<Batch> {
        let len = self.len();
        if idx >= len {
            return Err(InspectError::BatchIndex { index: idx, len });
        }

        let bs = self.settings.batch_size;
        let shape = self.settings.picture_shape;
        let order: Vec<usize> = self.indexes[idx * bs..(idx + 1) * bs].to_vec();

        let mut images = Vec::with_capacity(bs * shape.pixel_len());
        let mut tokens = Vec::new();
        let mut seq_len: Option<usize> = None;

        for i in order {
            let pixels = load_image(&self.samples[i].image_path, shape)?;
            let pixels = if self.settings.augmentation {
                augment(pixels, shape, &mut self.rng)
            } else {
                pixels
            };
            images.extend_from_slice(&pixels);

            let seq = &self.samples[i].tokens;
            match seq_len {
                None => seq_len = Some(seq.len()),
                Some(expected) if expected != seq.len() => {
                    return Err(InspectError::RaggedBatch {
                        expected,
                        found: seq.len(),
                    })
                }
                Some(_) => {}
            }
            tokens.extend_from_slice(seq);
        }

        let seq_len = seq_len.unwrap_or(0);
        Ok(Batch {
            captions: tokens.clone(),
            images,
            tokens,
            image_shape: [
                bs,
                shape.height as usize,
                shape.width as usize,
                shape.channels as usize,
            ],
            sequence_shape: [bs, seq_len],
        })
    }

    /// Advance cyclically and return the following batch.
    pub fn next_batch(&mut self) -> InspectResult<Batch> {
        let len = self.len();
        if len == 0 {
            return Err(InspectError::BatchIndex { index: 0, len });
        }
        self.batch_index = (self.batch_index + 1) % len;
        self.batch(self.batch_index)
    }

    /// Shapes taken from the first batch.
    pub fn output_signature(&mut self) -> InspectResult<OutputSignature> {
        let first = self.batch(0)?;
        Ok(OutputSignature {
            image: first.image_shape,
            tokens: first.sequence_shape,
            caption: first.sequence_shape,
        })
    }
}

fn parse_tokens(raw: &str, row: usize) -> InspectResult<Vec<f32>> {
    raw.split_whitespace()
        .map(|tok| {
            tok.parse::<f32>().map_err(|_| InspectError::InvalidToken {
                row,
                token: tok.to_string(),
            })
        })
        .collect()
}

/// Decode, resize (bilinear) and scale one image to HWC `f32` in `[0, 1]`.
fn load_image(path: &Path, shape: PictureShape) -> InspectResult<Vec<f32>> {
    let img = image::open(path).map_err(|source| InspectError::Image {
        path: path.to_path_buf(),
        source,
    })?;
    let resized = img.resize_exact(shape.width, shape.height, FilterType::Triangle);
    let raw: Vec<u8> = match shape.channels {
        1 => resized.to_luma8().into_raw(),
        _ => resized.to_rgb8().into_raw(),
    };
    Ok(raw.into_iter().map(|v| v as f32 / 255.0).collect())
}

/// Random horizontal flip, then a random shift of up to 20% of the width
/// and 30% of the height.
fn augment(pixels: Vec<f32>, shape: PictureShape, rng: &mut impl Rng) -> Vec<f32> {
    let flip = rng.random_bool(0.5);
    let dx = (rng.random_range(-SHIFT_WIDTH_RANGE..=SHIFT_WIDTH_RANGE) * shape.width as f32)
        .round() as i64;
    let dy = (rng.random_range(-SHIFT_HEIGHT_RANGE..=SHIFT_HEIGHT_RANGE) * shape.height as f32)
        .round() as i64;
    flip_and_shift(&pixels, shape, flip, dx, dy)
}

/// Mirror horizontally (when `flip`), then move the image by `(dx, dy)`
/// pixels. Uncovered pixels repeat the nearest edge.
fn flip_and_shift(
    pixels: &[f32],
    shape: PictureShape,
    flip: bool,
    dx: i64,
    dy: i64,
) -> Vec<f32> {
    let h = shape.height as i64;
    let w = shape.width as i64;
    let c = shape.channels as usize;

    let mut out = vec![0.0; pixels.len()];
    for y in 0..h {
        let sy = (y - dy).clamp(0, h - 1);
        for x in 0..w {
            let mut sx = (x - dx).clamp(0, w - 1);
            if flip {
                sx = w - 1 - sx;
            }
            let dst = ((y * w + x) as usize) * c;
            let src = ((sy * w + sx) as usize) * c;
            out[dst..dst + c].copy_from_slice(&pixels[src..src + c]);
        }
    }
    out
}

// ---------------------------------------------------------------------------
// TensorDataset
// ---------------------------------------------------------------------------

/// One epoch of batches from a generator, with its declared signature.
#[derive(Debug)]
pub struct TensorDataset {
    generator: DataGenerator,
    signature: OutputSignature,
    cursor: usize,
}

impl TensorDataset {
    /// Wrap a generator whose signature is already known, e.g. the test
    /// split sharing the train split's. No batch is read.
    pub fn new(generator: DataGenerator, signature: OutputSignature) -> Self {
        TensorDataset {
            generator,
            signature,
            cursor: 0,
        }
    }

    /// Wrap a generator, reading batch 0 for the signature.
    pub fn from_generator(mut generator: DataGenerator) -> InspectResult<Self> {
        let signature = generator.output_signature()?;
        Ok(TensorDataset::new(generator, signature))
    }

    pub fn signature(&self) -> OutputSignature {
        self.signature
    }

    pub fn num_batches(&self) -> usize {
        self.generator.len()
    }

    pub fn num_samples(&self) -> usize {
        self.generator.num_samples()
    }

    /// Start a new epoch with a fresh sample order.
    pub fn reset(&mut self) {
        self.generator.on_epoch_end();
        self.cursor = 0;
    }
}

impl Iterator for TensorDataset {
    type Item = InspectResult<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.generator.len() {
            return None;
        }
        let batch = self.generator.batch(self.cursor);
        self.cursor += 1;
        Some(batch)
    }
}

#[cfg(test)]
mod tests {
    use image::{GrayImage, Luma};

    use super::*;
    use crate::data::model::{MetadataValue, ReportRecord};

    fn settings(batch_size: usize) -> GeneratorSettings {
        GeneratorSettings {
            batch_size,
            picture_shape: PictureShape::new(4, 6, 1),
            shuffle: false,
            augmentation: false,
            seed: 7,
        }
    }

    /// `n` records whose images are flat gray at `10 * i`, tokens `"i i+1 0"`.
    fn dataset(dir: &Path, n: usize) -> ReportDataset {
        let records = (0..n)
            .map(|i| {
                let path = dir.join(format!("{i}.png"));
                GrayImage::from_pixel(8, 8, Luma([(10 * i) as u8]))
                    .save(&path)
                    .unwrap();
                let mut r = ReportRecord::new(format!("report {i}"));
                r.image_path = Some(path);
                r.metadata.insert(
                    "tokenized_text".into(),
                    MetadataValue::String(format!("{i} {} 0", i + 1)),
                );
                r
            })
            .collect();
        ReportDataset::from_records(records, vec!["tokenized_text".into()])
    }

    #[test]
    fn length_drops_partial_batch() {
        let dir = tempfile::tempdir().unwrap();
        let gen = DataGenerator::new(&dataset(dir.path(), 7), &ColumnNames::default(), settings(3))
            .unwrap();
        assert_eq!(gen.num_samples(), 7);
        assert_eq!(gen.len(), 2);
    }

    #[test]
    fn batch_shapes_and_scaling() {
        let dir = tempfile::tempdir().unwrap();
        let mut gen =
            DataGenerator::new(&dataset(dir.path(), 4), &ColumnNames::default(), settings(2))
                .unwrap();

        let batch = gen.batch(1).unwrap();
        assert_eq!(batch.image_shape, [2, 4, 6, 1]);
        assert_eq!(batch.sequence_shape, [2, 3]);
        assert_eq!(batch.images.len(), 2 * 4 * 6);
        assert_eq!(batch.tokens, vec![2.0, 3.0, 0.0, 3.0, 4.0, 0.0]);
        assert_eq!(batch.captions, batch.tokens);
        assert!((batch.images[0] - 20.0 / 255.0).abs() < 1e-6);

        let sig = gen.output_signature().unwrap();
        assert_eq!(sig.caption_length(), 3);
    }

    #[test]
    fn out_of_range_batch_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut gen =
            DataGenerator::new(&dataset(dir.path(), 2), &ColumnNames::default(), settings(2))
                .unwrap();
        assert!(matches!(
            gen.batch(1),
            Err(InspectError::BatchIndex { index: 1, len: 1 })
        ));
    }

    #[test]
    fn bad_token_fails_construction() {
        let dir = tempfile::tempdir().unwrap();
        let mut ds = dataset(dir.path(), 2);
        ds.records[1].metadata.insert(
            "tokenized_text".into(),
            MetadataValue::String("4 five 0".into()),
        );
        let err = DataGenerator::new(&ds, &ColumnNames::default(), settings(1)).unwrap_err();
        assert!(matches!(err, InspectError::InvalidToken { row: 1, .. }));
    }

    #[test]
    fn missing_token_column_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut ds = dataset(dir.path(), 1);
        ds.column_names.clear();
        let err = DataGenerator::new(&ds, &ColumnNames::default(), settings(1)).unwrap_err();
        assert!(matches!(err, InspectError::MissingColumn(_)));
    }

    #[test]
    fn ragged_sequences_in_a_batch_fail() {
        let dir = tempfile::tempdir().unwrap();
        let mut ds = dataset(dir.path(), 2);
        ds.records[1]
            .metadata
            .insert("tokenized_text".into(), MetadataValue::String("1 2".into()));
        let mut gen = DataGenerator::new(&ds, &ColumnNames::default(), settings(2)).unwrap();
        assert!(matches!(
            gen.batch(0),
            Err(InspectError::RaggedBatch { expected: 3, found: 2 })
        ));
    }

    #[test]
    fn shuffle_is_seeded_and_covers_every_sample() {
        let dir = tempfile::tempdir().unwrap();
        let ds = dataset(dir.path(), 6);
        let mut cfg = settings(1);
        cfg.shuffle = true;

        let first_tokens = |cfg: GeneratorSettings| -> Vec<f32> {
            let mut gen = DataGenerator::new(&ds, &ColumnNames::default(), cfg).unwrap();
            (0..gen.len()).map(|i| gen.batch(i).unwrap().tokens[0]).collect()
        };
        let a = first_tokens(cfg.clone());
        let b = first_tokens(cfg);
        assert_eq!(a, b);

        let mut sorted = a.clone();
        sorted.sort_by(f32::total_cmp);
        assert_eq!(sorted, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn augmentation_keeps_flat_images_flat() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = settings(1);
        cfg.augmentation = true;
        let mut gen =
            DataGenerator::new(&dataset(dir.path(), 3), &ColumnNames::default(), cfg).unwrap();
        let batch = gen.batch(2).unwrap();
        let expected = 20.0 / 255.0;
        assert!(batch.images.iter().all(|v| (v - expected).abs() < 1e-6));
    }

    /// 4x5 grayscale image whose pixel at `(y, x)` holds `10 * y + x`.
    fn gradient() -> (Vec<f32>, PictureShape) {
        let shape = PictureShape::new(4, 5, 1);
        let pixels = (0..4)
            .flat_map(|y| (0..5).map(move |x| (10 * y + x) as f32))
            .collect();
        (pixels, shape)
    }

    fn row(pixels: &[f32], y: usize) -> &[f32] {
        &pixels[y * 5..(y + 1) * 5]
    }

    #[test]
    fn flip_mirrors_rows() {
        let (pixels, shape) = gradient();
        let out = flip_and_shift(&pixels, shape, true, 0, 0);
        assert_eq!(row(&out, 0), [4.0, 3.0, 2.0, 1.0, 0.0]);
        assert_eq!(row(&out, 3), [34.0, 33.0, 32.0, 31.0, 30.0]);
    }

    #[test]
    fn shift_repeats_nearest_edge() {
        let (pixels, shape) = gradient();

        let right = flip_and_shift(&pixels, shape, false, 2, 0);
        assert_eq!(row(&right, 1), [10.0, 10.0, 10.0, 11.0, 12.0]);

        let up = flip_and_shift(&pixels, shape, false, 0, -1);
        assert_eq!(row(&up, 0), row(&pixels, 1));
        assert_eq!(row(&up, 3), row(&pixels, 3));
        assert_eq!(row(&up, 2), row(&pixels, 3));

        let both = flip_and_shift(&pixels, shape, true, -1, 1);
        assert_eq!(row(&both, 0), [3.0, 2.0, 1.0, 0.0, 0.0]);
        assert_eq!(row(&both, 1), [3.0, 2.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn augmentation_flips_and_shifts_within_bounds() {
        let (pixels, shape) = gradient();
        // Largest shifts: round(0.2 * 5) = 1 column, round(0.3 * 4) = 1 row.
        let candidates: Vec<Vec<f32>> = [false, true]
            .into_iter()
            .flat_map(|flip| (-1..=1).flat_map(move |dx| (-1..=1).map(move |dy| (flip, dx, dy))))
            .map(|(flip, dx, dy)| flip_and_shift(&pixels, shape, flip, dx, dy))
            .collect();

        let mut changed = 0;
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let out = augment(pixels.clone(), shape, &mut rng);
            assert_eq!(out.len(), pixels.len());
            assert!(candidates.contains(&out), "seed {seed} left the allowed range");
            if out != pixels {
                changed += 1;
            }
        }
        assert!(changed > 0);
    }

    #[test]
    fn two_channel_shape_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = settings(1);
        cfg.picture_shape = PictureShape::new(4, 4, 2);
        let err = DataGenerator::new(&dataset(dir.path(), 1), &ColumnNames::default(), cfg)
            .unwrap_err();
        assert!(matches!(err, InspectError::InvalidPictureShape { .. }));
    }

    #[test]
    fn wrapping_with_known_signature_reads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let train = DataGenerator::new(&dataset(dir.path(), 4), &ColumnNames::default(), settings(2))
            .unwrap();
        let signature = TensorDataset::from_generator(train).unwrap().signature();

        let short = DataGenerator::new(&dataset(dir.path(), 1), &ColumnNames::default(), settings(2))
            .unwrap();
        let mut ds = TensorDataset::new(short, signature);
        assert_eq!(ds.num_batches(), 0);
        assert_eq!(ds.num_samples(), 1);
        assert_eq!(ds.signature(), signature);
        assert!(ds.next().is_none());
    }

    #[test]
    fn dataset_iterates_one_epoch() {
        let dir = tempfile::tempdir().unwrap();
        let gen = DataGenerator::new(&dataset(dir.path(), 5), &ColumnNames::default(), settings(2))
            .unwrap();
        let mut ds = TensorDataset::from_generator(gen).unwrap();
        assert_eq!(ds.signature().image, [2, 4, 6, 1]);
        assert_eq!(ds.num_batches(), 2);

        let batches: Vec<Batch> = ds.by_ref().collect::<InspectResult<_>>().unwrap();
        assert_eq!(batches.len(), 2);
        assert!(ds.next().is_none());

        ds.reset();
        assert_eq!(ds.count(), 2);
    }

    #[test]
    fn next_batch_wraps_around() {
        let dir = tempfile::tempdir().unwrap();
        let mut gen =
            DataGenerator::new(&dataset(dir.path(), 2), &ColumnNames::default(), settings(1))
                .unwrap();
        assert_eq!(gen.next_batch().unwrap().tokens[0], 1.0);
        assert_eq!(gen.next_batch().unwrap().tokens[0], 0.0);
    }
}
