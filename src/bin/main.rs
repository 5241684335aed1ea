//! glyphsvm command line interface
//!
//! Trains a pairwise-SVM glyph classifier from a labeled corpus directory
//! and optionally classifies query images against the freshly trained
//! model. There is no model persistence; `classify` trains and queries in
//! one invocation.

use clap::{Args, Parser, Subcommand, ValueEnum};
use env_logger::Env;
use glyphsvm::api::{GlyphClassifier, TrainingConfig, TrainingEvent};
use glyphsvm::core::{Complexity, Result};
use glyphsvm::features::FeatureConfig;
use glyphsvm::kernel::KernelConfig;
use glyphsvm::preprocess::CanvasSpec;
use log::{error, info};
use serde::Serialize;
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "glyphsvm")]
#[command(about = "Train and query a pairwise-SVM musical glyph classifier")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Train on a corpus directory and report in-sample accuracy
    Train(TrainArgs),
    /// Train, then classify one or more query images
    Classify(ClassifyArgs),
}

#[derive(Args)]
struct TrainArgs {
    /// Corpus root: one "<index>_<label>" subdirectory per class
    #[arg(long)]
    corpus: PathBuf,

    #[command(flatten)]
    tuning: TuningArgs,
}

#[derive(Args)]
struct ClassifyArgs {
    /// Corpus root: one "<index>_<label>" subdirectory per class
    #[arg(long)]
    corpus: PathBuf,

    /// Query images to classify after training
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// Emit predictions as JSON
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    tuning: TuningArgs,
}

#[derive(Args)]
struct TuningArgs {
    /// Canvas width in pixels
    #[arg(long, default_value = "6")]
    canvas_width: u32,

    /// Canvas height in pixels
    #[arg(long, default_value = "12")]
    canvas_height: u32,

    /// Canvas background fill, 0 (black) to 255 (white)
    #[arg(long, default_value = "255")]
    background: u8,

    /// Feature extraction strategy
    #[arg(long, value_enum, default_value = "raw-pixel")]
    features: CliFeatureStrategy,

    /// Visual-word vocabulary size (bag-of-words only)
    #[arg(long, default_value = "10")]
    vocabulary_size: usize,

    /// Clustering seed (bag-of-words only)
    #[arg(long, default_value = "17")]
    vocabulary_seed: u64,

    /// Polynomial kernel degree
    #[arg(long, default_value = "1")]
    degree: u32,

    /// Kernel dot-product scale
    #[arg(long, default_value = "1.0")]
    gamma: f64,

    /// Kernel independent term
    #[arg(long, default_value = "1.0")]
    coef0: f64,

    /// Regularization bound C; omit to estimate it from the kernel
    #[arg(short = 'C', long)]
    complexity: Option<f64>,

    /// SMO convergence tolerance
    #[arg(short, long, default_value = "0.001")]
    epsilon: f64,

    /// SMO iteration cap per binary machine
    #[arg(short, long, default_value = "10000")]
    max_iterations: usize,

    /// Report zero-one loss as a fraction instead of a count
    #[arg(long)]
    mean_loss: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CliFeatureStrategy {
    /// Flattened canvas intensities
    #[value(name = "raw-pixel")]
    RawPixel,
    /// Histogram over a learned visual-word vocabulary
    #[value(name = "bag-of-words")]
    BagOfWords,
}

impl TuningArgs {
    fn to_config(&self) -> Result<TrainingConfig> {
        let canvas = CanvasSpec::new(self.canvas_width, self.canvas_height, self.background)?;
        let features = match self.features {
            CliFeatureStrategy::RawPixel => FeatureConfig::RawPixel,
            CliFeatureStrategy::BagOfWords => FeatureConfig::BagOfWords {
                vocabulary_size: self.vocabulary_size,
                seed: self.vocabulary_seed,
            },
        };
        let config = TrainingConfig::fast()
            .with_canvas(canvas)
            .with_features(features)
            .with_kernel(KernelConfig {
                degree: self.degree,
                gamma: self.gamma,
                coef0: self.coef0,
            })
            .with_complexity(match self.complexity {
                Some(c) => Complexity::Fixed(c),
                None => Complexity::Auto,
            })
            .with_epsilon(self.epsilon)
            .with_max_iterations(self.max_iterations)
            .with_mean_loss(self.mean_loss);
        config.validate()?;
        Ok(config)
    }
}

#[derive(Serialize)]
struct PredictionRecord {
    path: String,
    class: usize,
    label: String,
    votes: Vec<usize>,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    if let Err(e) = run(cli) {
        error!("{e}");
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Train(args) => cmd_train(args),
        Commands::Classify(args) => cmd_classify(args),
    }
}

fn build_trained(
    corpus: &PathBuf,
    tuning: &TuningArgs,
) -> Result<(GlyphClassifier, std::sync::Arc<glyphsvm::MulticlassModel>)> {
    let classifier = GlyphClassifier::new(tuning.to_config()?)?.on_progress(|event| {
        if let TrainingEvent::MachinesTrained { machines } = event {
            info!("trained {machines} pairwise machines");
        }
    });

    let summary = classifier.load_corpus(corpus)?;
    println!(
        "Loaded {} examples across {} classes",
        summary.examples, summary.classes
    );
    for invalid in &summary.invalid_dirs {
        println!("  ! ignored directory {}: {}", invalid.path.display(), invalid.error);
    }
    for skipped in &summary.skipped {
        println!("  ! skipped {}: {}", skipped.path.display(), skipped.reason);
    }

    let model = classifier.train()?;
    Ok((classifier, model))
}

fn cmd_train(args: TrainArgs) -> Result<()> {
    let (_classifier, model) = build_trained(&args.corpus, &args.tuning)?;

    let support_vectors: usize = model
        .machines()
        .iter()
        .map(|machine| machine.n_support_vectors())
        .sum();

    println!("Classes:          {}", model.n_classes());
    println!("Pairwise machines: {}", model.machines().len());
    println!("Support vectors:  {support_vectors}");
    println!("Complexity C:     {:.6}", model.complexity());
    println!("Converged:        {}", model.converged());
    println!("Trained at:       {}", model.trained_at().to_rfc3339());
    println!("In-sample loss:   {}", model.in_sample_loss());
    Ok(())
}

fn cmd_classify(args: ClassifyArgs) -> Result<()> {
    let (classifier, model) = build_trained(&args.corpus, &args.tuning)?;

    let mut records = Vec::with_capacity(args.images.len());
    for path in &args.images {
        let image = image::open(path)?;
        let prediction = classifier.decide(&image)?;
        let label = model
            .class_name(prediction.class)
            .unwrap_or("unknown")
            .to_string();
        records.push(PredictionRecord {
            path: path.display().to_string(),
            class: prediction.class,
            label,
            votes: prediction.votes,
        });
    }

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&records)
                .map_err(|e| glyphsvm::core::ClassifierError::Data(e.to_string()))?
        );
    } else {
        for record in &records {
            println!(
                "{} -> {} ({}) votes {:?}",
                record.path, record.class, record.label, record.votes
            );
        }
    }
    Ok(())
}
