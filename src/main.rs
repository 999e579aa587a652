use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use eframe::egui;
use serde::Serialize;

use xreport_inspect::app::XReportViewer;
use xreport_inspect::checkpoint::{self, CheckpointSelector};
use xreport_inspect::config::XReportConfig;
use xreport_inspect::pipeline::{self, EvaluationRequest, ValidationRequest};
use xreport_inspect::state::ViewerState;

#[derive(Parser)]
#[command(name = "xreport-inspect")]
#[command(about = "Dataset validation and checkpoint evaluation for X-ray report generation")]
#[command(version)]
struct Cli {
    /// JSON configuration file; missing keys keep their defaults
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sample train/test subsets and inspect their reports and images
    Validate {
        /// Report table (.csv, .json or .parquet)
        dataset: PathBuf,

        /// Folder holding the X-ray images
        #[arg(short, long)]
        images: PathBuf,

        /// Also compare pixel intensity histograms of the splits
        #[arg(long)]
        histograms: bool,

        /// Number of most frequent words to list per split
        #[arg(long, default_value = "10")]
        top_tokens: usize,

        #[command(flatten)]
        sampling: SamplingArgs,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Load a checkpoint and the preprocessed splits, print a summary
    Evaluate {
        /// Folder with one sub-folder per saved model
        #[arg(long)]
        checkpoints: PathBuf,

        /// Folder with XREP_train.csv, XREP_test.csv and word_tokenizer.json
        #[arg(long)]
        preprocessing: PathBuf,

        /// Base folder for relative image paths (defaults to --preprocessing)
        #[arg(long)]
        images: Option<PathBuf>,

        /// Checkpoint to load: "latest", a 1-based index or a folder name
        #[arg(short, long, default_value = "latest")]
        model: CheckpointSelector,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// List saved checkpoints
    Checkpoints {
        /// Folder with one sub-folder per saved model
        path: PathBuf,
    },

    /// Plot train/test pixel intensity histograms in a window
    View {
        /// Report table to open right away
        dataset: Option<PathBuf>,

        /// Folder holding the X-ray images
        #[arg(short, long)]
        images: Option<PathBuf>,

        #[command(flatten)]
        sampling: SamplingArgs,
    },
}

/// Overrides for the sampling values of the configuration.
#[derive(Args)]
struct SamplingArgs {
    /// Seed of the subset draw
    #[arg(long)]
    seed: Option<u64>,

    /// Seed of the train/test permutation
    #[arg(long)]
    split_seed: Option<u64>,

    /// Number of train samples
    #[arg(long)]
    train_samples: Option<usize>,

    /// Number of test samples
    #[arg(long)]
    test_samples: Option<usize>,
}

impl SamplingArgs {
    fn apply(&self, config: &mut XReportConfig) {
        if let Some(v) = self.seed {
            config.seed = v;
        }
        if let Some(v) = self.split_seed {
            config.split_seed = v;
        }
        if let Some(v) = self.train_samples {
            config.num_train_samples = v;
        }
        if let Some(v) = self.test_samples {
            config.num_test_samples = v;
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => XReportConfig::load(path)?,
        None => XReportConfig::default(),
    };

    match cli.command {
        Commands::Validate {
            dataset,
            images,
            histograms,
            top_tokens,
            sampling,
            format,
        } => {
            sampling.apply(&mut config);
            let request = ValidationRequest {
                dataset,
                images_dir: images,
                histograms,
                top_tokens,
            };
            let outcome = pipeline::run_validation(&config, &request)?;
            emit(&outcome.report, format)
        }
        Commands::Evaluate {
            checkpoints,
            preprocessing,
            images,
            model,
            format,
        } => {
            let request = EvaluationRequest {
                checkpoints,
                selector: model,
                preprocessing_dir: preprocessing,
                images_dir: images,
            };
            let summary = pipeline::run_evaluation(&config, &request)?;
            emit(&summary, format)
        }
        Commands::Checkpoints { path } => list_command(&path),
        Commands::View {
            dataset,
            images,
            sampling,
        } => {
            sampling.apply(&mut config);
            view_command(config, dataset, images)
        }
    }
}

fn emit<T: Serialize + std::fmt::Display>(report: &T, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => print!("{report}"),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
    }
    Ok(())
}

fn list_command(root: &Path) -> Result<()> {
    let names = checkpoint::list_checkpoints(root)?;
    if names.is_empty() {
        println!("No checkpoints in {}", root.display());
        return Ok(());
    }
    let latest = names.len();
    for (i, name) in names.iter().enumerate() {
        let marker = if i + 1 == latest { "  (latest)" } else { "" };
        println!("{} - {name}{marker}", i + 1);
    }
    Ok(())
}

fn view_command(
    config: XReportConfig,
    dataset: Option<PathBuf>,
    images: Option<PathBuf>,
) -> Result<()> {
    let mut state = ViewerState::new(config);
    if let Some(dataset) = dataset {
        let images = images
            .or_else(|| dataset.parent().map(|p| p.join("images")))
            .unwrap_or_else(|| PathBuf::from("images"));
        state.load(&dataset, &images);
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 700.0])
            .with_min_inner_size([600.0, 400.0]),
        ..Default::default()
    };

    eframe::run_native(
        "XREPORT – Pixel Intensity",
        options,
        Box::new(|cc| {
            // Loaders for the png/jpg split thumbnails.
            egui_extras::install_image_loaders(&cc.egui_ctx);
            Ok(Box::new(XReportViewer::new(state)))
        }),
    )
    .map_err(|e| anyhow!("viewer failed: {e}"))
}
