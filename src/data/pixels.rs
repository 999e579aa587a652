use std::path::Path;

use image::imageops::FilterType;
use image::GrayImage;
use serde::Serialize;

use crate::config::PictureShape;
use crate::error::{InspectError, InspectResult};

pub const INTENSITY_BINS: usize = 256;

// ---------------------------------------------------------------------------
// Pixel intensity histogram
// ---------------------------------------------------------------------------

/// Grayscale intensity distribution of an image corpus.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntensityHistogram {
    counts: Vec<u64>,
    images: usize,
    skipped: usize,
}

impl Default for IntensityHistogram {
    fn default() -> Self {
        Self {
            counts: vec![0; INTENSITY_BINS],
            images: 0,
            skipped: 0,
        }
    }
}

impl IntensityHistogram {
    /// Accumulate every readable image. Images are converted to grayscale
    /// and, when `shape` is given, resized to it first. Unreadable files are
    /// counted as skipped.
    pub fn from_paths<'a>(
        paths: impl IntoIterator<Item = &'a Path>,
        shape: Option<PictureShape>,
    ) -> Self {
        let mut hist = IntensityHistogram::default();
        for path in paths {
            match load_gray(path, shape) {
                Ok(img) => hist.add_image(&img),
                Err(e) => {
                    log::warn!("Skipping image: {e}");
                    hist.skipped += 1;
                }
            }
        }
        hist
    }

    pub fn add_image(&mut self, img: &GrayImage) {
        for px in img.pixels() {
            self.counts[px.0[0] as usize] += 1;
        }
        self.images += 1;
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    pub fn images(&self) -> usize {
        self.images
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn total_pixels(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Counts normalised to sum to 1 (all zeros when empty).
    pub fn density(&self) -> Vec<f64> {
        let total = self.total_pixels();
        if total == 0 {
            return vec![0.0; INTENSITY_BINS];
        }
        self.counts
            .iter()
            .map(|&c| c as f64 / total as f64)
            .collect()
    }

    pub fn mean(&self) -> f64 {
        let total = self.total_pixels();
        if total == 0 {
            return 0.0;
        }
        let sum: f64 = self
            .counts
            .iter()
            .enumerate()
            .map(|(v, &c)| v as f64 * c as f64)
            .sum();
        sum / total as f64
    }

    pub fn std_dev(&self) -> f64 {
        let total = self.total_pixels();
        if total == 0 {
            return 0.0;
        }
        let mean = self.mean();
        let var: f64 = self
            .counts
            .iter()
            .enumerate()
            .map(|(v, &c)| (v as f64 - mean).powi(2) * c as f64)
            .sum::<f64>()
            / total as f64;
        var.sqrt()
    }
}

fn load_gray(path: &Path, shape: Option<PictureShape>) -> InspectResult<GrayImage> {
    let img = image::open(path)
        .map_err(|source| InspectError::Image {
            path: path.to_path_buf(),
            source,
        })?
        .to_luma8();
    Ok(match shape {
        Some(s) if (s.width, s.height) != img.dimensions() => {
            image::imageops::resize(&img, s.width, s.height, FilterType::Triangle)
        }
        _ => img,
    })
}

// ---------------------------------------------------------------------------
// Train vs test comparison
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistogramComparison {
    /// Sum of per-bin minimum densities: 1.0 for identical distributions.
    pub intersection: f64,
    pub mean_delta: f64,
    pub max_bin_delta: f64,
}

impl HistogramComparison {
    pub fn between(train: &IntensityHistogram, test: &IntensityHistogram) -> Self {
        let a = train.density();
        let b = test.density();
        let intersection = a.iter().zip(&b).map(|(x, y)| x.min(*y)).sum();
        let max_bin_delta = a
            .iter()
            .zip(&b)
            .map(|(x, y)| (x - y).abs())
            .fold(0.0, f64::max);
        HistogramComparison {
            intersection,
            mean_delta: (train.mean() - test.mean()).abs(),
            max_bin_delta,
        }
    }
}

#[cfg(test)]
mod tests {
    use image::Luma;

    use super::*;

    fn flat(value: u8) -> GrayImage {
        GrayImage::from_pixel(2, 2, Luma([value]))
    }

    #[test]
    fn counts_and_moments() {
        let mut hist = IntensityHistogram::default();
        hist.add_image(&flat(0));
        hist.add_image(&flat(200));

        assert_eq!(hist.images(), 2);
        assert_eq!(hist.total_pixels(), 8);
        assert_eq!(hist.counts()[200], 4);
        assert!((hist.mean() - 100.0).abs() < 1e-9);
        assert!((hist.std_dev() - 100.0).abs() < 1e-9);
        assert!((hist.density().iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn identical_corpora_fully_intersect() {
        let mut a = IntensityHistogram::default();
        a.add_image(&flat(30));
        let b = a.clone();

        let cmp = HistogramComparison::between(&a, &b);
        assert!((cmp.intersection - 1.0).abs() < 1e-12);
        assert_eq!(cmp.mean_delta, 0.0);
        assert_eq!(cmp.max_bin_delta, 0.0);
    }

    #[test]
    fn disjoint_corpora_do_not_intersect() {
        let mut a = IntensityHistogram::default();
        a.add_image(&flat(10));
        let mut b = IntensityHistogram::default();
        b.add_image(&flat(250));

        let cmp = HistogramComparison::between(&a, &b);
        assert_eq!(cmp.intersection, 0.0);
        assert_eq!(cmp.mean_delta, 240.0);
        assert_eq!(cmp.max_bin_delta, 1.0);
    }

    #[test]
    fn unreadable_images_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.png");
        flat(80).save(&good).unwrap();
        let bad = dir.path().join("bad.png");
        std::fs::write(&bad, "not a png").unwrap();

        let paths = [good.as_path(), bad.as_path()];
        let hist = IntensityHistogram::from_paths(paths, Some(PictureShape::new(3, 3, 1)));
        assert_eq!(hist.images(), 1);
        assert_eq!(hist.skipped(), 1);
        assert_eq!(hist.total_pixels(), 9);
        assert_eq!(hist.counts()[80], 9);
    }
}
