//! Writes a small synthetic XREPORT corpus for trying the inspector:
//!
//! ```text
//!  sample_data/
//!    dataset/XREP_dataset.csv, XREP_dataset.parquet, images/CXR*.png
//!    preprocessing/XREP_train.csv, XREP_test.csv, word_tokenizer.json
//!    checkpoints/XREP_sample/model/{model_parameters,model_configuration}.json, model_weights.h5
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use image::{GrayImage, Luma};
use parquet::arrow::ArrowWriter;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;

use xreport_inspect::checkpoint::{Checkpoint, ModelParameters, CONFIGURATION_FILE, WEIGHTS_FILE};
use xreport_inspect::config::{PictureShape, XReportConfig};

const NUM_REPORTS: usize = 60;
const NUM_TEST: usize = 12;
const IMAGE_SIDE: u32 = 64;

const FINDINGS: [&str; 8] = [
    "the heart is normal in size",
    "the mediastinum is unremarkable",
    "the lungs are clear",
    "no pneumothorax or pleural effusion",
    "mild cardiomegaly is present",
    "there is a small left pleural effusion",
    "degenerative changes of the thoracic spine",
    "no acute cardiopulmonary abnormality",
];

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

/// Dark background, two bright lung-like lobes, sensor noise.
fn synthetic_xray(rng: &mut StdRng, brightness: f64) -> GrayImage {
    let side = IMAGE_SIDE as f64;
    GrayImage::from_fn(IMAGE_SIDE, IMAGE_SIDE, |x, y| {
        let (x, y) = (x as f64, y as f64);
        let lobes = gaussian(x, side * 0.3, side * 0.12, 1.0) + gaussian(x, side * 0.7, side * 0.12, 1.0);
        let vertical = gaussian(y, side * 0.5, side * 0.25, 1.0);
        let v = 30.0 + brightness * lobes * vertical + rng.random_range(-8.0..8.0);
        Luma([v.clamp(0.0, 255.0) as u8])
    })
}

fn write_csv(path: &Path, header: &[&str], rows: &[Vec<String>]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b';')
        .from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(header)?;
    for row in rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_parquet(path: &Path, ids: &[String], texts: &[String]) -> Result<()> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("text", DataType::Utf8, false),
        Field::new("row", DataType::Int64, false),
    ]));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(StringArray::from(ids.to_vec())),
            Arc::new(StringArray::from(texts.to_vec())),
            Arc::new(Int64Array::from_iter_values(0..ids.len() as i64)),
        ],
    )?;
    let file = std::fs::File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

fn main() -> Result<()> {
    let root = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("sample_data"));
    let config = XReportConfig::default();
    let mut rng = StdRng::seed_from_u64(config.seed);

    let dataset_dir = root.join("dataset");
    let images_dir = dataset_dir.join("images");
    let preprocessing_dir = root.join("preprocessing");
    let model_dir = root.join("checkpoints").join("XREP_sample").join("model");
    for dir in [&images_dir, &preprocessing_dir, &model_dir] {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }

    // ---- Raw reports and images ----
    let mut ids = Vec::with_capacity(NUM_REPORTS);
    let mut texts = Vec::with_capacity(NUM_REPORTS);
    for i in 0..NUM_REPORTS {
        let n_sentences = rng.random_range(1..=3);
        let sentences: Vec<&str> = (0..n_sentences)
            .map(|_| FINDINGS[rng.random_range(0..FINDINGS.len())])
            .collect();
        let id = format!("CXR{i}");
        let brightness = rng.random_range(120.0..200.0);
        synthetic_xray(&mut rng, brightness).save(images_dir.join(format!("{id}.png")))?;
        ids.push(id);
        texts.push(sentences.join(" "));
    }

    let raw_rows: Vec<Vec<String>> = ids
        .iter()
        .zip(&texts)
        .map(|(id, text)| vec![id.clone(), text.clone()])
        .collect();
    write_csv(&dataset_dir.join("XREP_dataset.csv"), &["id", "text"], &raw_rows)?;
    write_parquet(&dataset_dir.join("XREP_dataset.parquet"), &ids, &texts)?;

    // ---- Word index and padded token sequences ----
    let mut word_index: BTreeMap<String, usize> = BTreeMap::new();
    for word in texts.iter().flat_map(|t| t.split_whitespace()) {
        let next = word_index.len() + 1;
        word_index.entry(word.to_string()).or_insert(next);
    }
    let sequence_length = texts
        .iter()
        .map(|t| t.split_whitespace().count())
        .max()
        .unwrap_or(0);

    let preprocessed: Vec<Vec<String>> = ids
        .iter()
        .zip(&texts)
        .map(|(id, text)| {
            let mut seq: Vec<String> = text
                .split_whitespace()
                .map(|w| word_index[w].to_string())
                .collect();
            seq.resize(sequence_length, "0".to_string());
            vec![
                id.clone(),
                text.clone(),
                format!("../dataset/images/{id}.png"),
                seq.join(" "),
            ]
        })
        .collect();
    let header = ["id", "text", "images_path", "tokenized_text"];
    let (test_rows, train_rows) = preprocessed.split_at(NUM_TEST);
    write_csv(&preprocessing_dir.join("XREP_train.csv"), &header, train_rows)?;
    write_csv(&preprocessing_dir.join("XREP_test.csv"), &header, test_rows)?;

    let tokenizer = json!({
        "class_name": "Tokenizer",
        "config": {
            "num_words": null,
            "lower": true,
            "split": " ",
            "word_index": serde_json::to_string(&word_index)?,
        }
    });
    std::fs::write(
        preprocessing_dir.join("word_tokenizer.json"),
        serde_json::to_string(&tokenizer)?,
    )?;

    // ---- Checkpoint ----
    let picture_shape = PictureShape::new(IMAGE_SIDE, IMAGE_SIDE, 1);
    let mut params = ModelParameters::new(4, config.epochs);
    params.picture_shape = Some(picture_shape);
    params.num_train_samples = Some(NUM_REPORTS - NUM_TEST);
    params.num_test_samples = Some(NUM_TEST);
    params.learning_rate = Some(config.learning_rate);
    params.embedding_dims = Some(config.embedding_dims);
    params.kernel_size = Some(config.kernel_size);
    params.num_heads = Some(config.num_heads);
    params.augmentation = Some(config.augmentation);
    params.seed = Some(config.seed);
    Checkpoint::save_parameters(&model_dir, &params)?;

    let configuration = json!({
        "picture_shape": picture_shape,
        "sequence_length": sequence_length,
        "vocab_size": word_index.len() + 1,
        "embedding_dims": config.embedding_dims,
        "kernel_size": config.kernel_size,
        "num_heads": config.num_heads,
        "learning_rate": config.learning_rate,
        "XLA_state": config.xla_acceleration,
        "seed": config.seed,
    });
    std::fs::write(
        model_dir.join(CONFIGURATION_FILE),
        serde_json::to_string_pretty(&configuration)?,
    )?;
    let weights: Vec<u8> = (0..4096).map(|_| rng.random()).collect();
    std::fs::write(model_dir.join(WEIGHTS_FILE), weights)?;

    println!(
        "Wrote {NUM_REPORTS} reports ({} train / {NUM_TEST} test) and a checkpoint to {}",
        NUM_REPORTS - NUM_TEST,
        root.display()
    );
    Ok(())
}
