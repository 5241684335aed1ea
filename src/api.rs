//! High-level classifier facade
//!
//! [`GlyphClassifier`] ties the pipeline together: accumulate a corpus,
//! train a multiclass model as one batch run (synchronously or on a
//! background thread), and classify query images against the latest
//! published snapshot.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use glyphsvm::api::{GlyphClassifier, TrainingConfig};
//!
//! # fn main() -> glyphsvm::core::Result<()> {
//! let classifier = GlyphClassifier::new(TrainingConfig::fast())?;
//! classifier.load_corpus("glyphs/".as_ref())?;
//! let model = classifier.train()?;
//! println!("in-sample loss: {}", model.in_sample_loss());
//! # Ok(())
//! # }
//! ```

use image::DynamicImage;
use log::info;
use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::core::{
    ClassifierError, Complexity, FeatureVector, Prediction, Result, SmoConfig, TrainingSet,
    TrainingState,
};
use crate::data::corpus::{self, Corpus, InvalidDir, SkippedImage};
use crate::features::{FeatureConfig, FittedExtractor};
use crate::kernel::{Kernel, KernelConfig};
use crate::metrics;
use crate::multiclass::{self, MulticlassModel};
use crate::preprocess::{self, CanvasSpec};

/// The full configuration surface of the pipeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub canvas: CanvasSpec,
    pub features: FeatureConfig,
    pub kernel: KernelConfig,
    pub smo: SmoConfig,
    /// Report zero-one loss as a fraction instead of a count.
    pub mean_loss: bool,
}

impl TrainingConfig {
    /// Fast operating point: tiny 6x12 canvas, raw-pixel features, degree-1
    /// kernel.
    pub fn fast() -> Self {
        Self {
            canvas: CanvasSpec::coarse(),
            features: FeatureConfig::RawPixel,
            kernel: KernelConfig::default(),
            smo: SmoConfig::default(),
            mean_loss: false,
        }
    }

    /// Higher-accuracy operating point: 30x30 black-filled canvas,
    /// bag-of-visual-words features, degree-5 kernel, auto complexity.
    pub fn accurate() -> Self {
        Self {
            canvas: CanvasSpec::glyph(),
            features: FeatureConfig::bag_of_words(10),
            kernel: KernelConfig {
                degree: 5,
                gamma: 1.0,
                coef0: 1.0,
            },
            smo: SmoConfig::default(),
            mean_loss: true,
        }
    }

    pub fn with_canvas(mut self, canvas: CanvasSpec) -> Self {
        self.canvas = canvas;
        self
    }

    pub fn with_features(mut self, features: FeatureConfig) -> Self {
        self.features = features;
        self
    }

    pub fn with_kernel(mut self, kernel: KernelConfig) -> Self {
        self.kernel = kernel;
        self
    }

    pub fn with_complexity(mut self, complexity: Complexity) -> Self {
        self.smo.complexity = complexity;
        self
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.smo.epsilon = epsilon;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.smo.max_iterations = max_iterations;
        self
    }

    pub fn with_mean_loss(mut self, mean_loss: bool) -> Self {
        self.mean_loss = mean_loss;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.canvas.width == 0 || self.canvas.height == 0 {
            return Err(ClassifierError::Configuration(
                "canvas dimensions must be positive".to_string(),
            ));
        }
        self.features.validate()?;
        self.kernel.validate()?;
        if self.smo.epsilon <= 0.0 {
            return Err(ClassifierError::Configuration(format!(
                "SMO tolerance must be positive, got {}",
                self.smo.epsilon
            )));
        }
        if self.smo.max_iterations == 0 {
            return Err(ClassifierError::Configuration(
                "SMO iteration cap must be positive".to_string(),
            ));
        }
        if let Complexity::Fixed(c) = self.smo.complexity {
            if c <= 0.0 {
                return Err(ClassifierError::Configuration(format!(
                    "complexity bound must be positive, got {c}"
                )));
            }
        }
        Ok(())
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self::fast()
    }
}

/// Progress milestones emitted during ingestion and training.
///
/// The presentation layer subscribes through [`GlyphClassifier::on_progress`];
/// the core holds no reference to anything UI-shaped.
#[derive(Clone, Debug)]
pub enum TrainingEvent {
    CorpusLoaded {
        examples: usize,
        classes: usize,
        skipped: usize,
    },
    TrainingStarted {
        examples: usize,
        classes: usize,
    },
    FeaturesExtracted {
        examples: usize,
        dimension: usize,
    },
    MachinesTrained {
        machines: usize,
    },
    Completed {
        loss: f64,
    },
}

type ProgressCallback = Box<dyn Fn(&TrainingEvent) + Send + Sync>;

/// Result of one corpus ingestion: what loaded and what did not.
#[derive(Debug)]
pub struct IngestSummary {
    pub examples: usize,
    pub classes: usize,
    pub skipped: Vec<SkippedImage>,
    pub invalid_dirs: Vec<InvalidDir>,
}

/// Multiclass glyph classifier with an immutable published snapshot.
///
/// Training is a batch run over the frozen corpus; on success the new
/// snapshot atomically replaces the previous one. Decide and evaluate read
/// only the latest published snapshot, so they stay safe to call while a
/// background training run is in flight.
pub struct GlyphClassifier {
    config: TrainingConfig,
    corpus: Mutex<Corpus>,
    state: Mutex<TrainingState>,
    model: RwLock<Option<Arc<MulticlassModel>>>,
    progress: Option<ProgressCallback>,
}

impl GlyphClassifier {
    /// Build a classifier after validating the configuration.
    pub fn new(config: TrainingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            corpus: Mutex::new(Corpus::new()),
            state: Mutex::new(TrainingState::Untrained),
            model: RwLock::new(None),
            progress: None,
        })
    }

    /// Subscribe to training progress events.
    pub fn on_progress(
        mut self,
        callback: impl Fn(&TrainingEvent) + Send + Sync + 'static,
    ) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    fn emit(&self, event: TrainingEvent) {
        if let Some(callback) = &self.progress {
            callback(&event);
        }
    }

    /// Normalize one image onto the configured canvas and add it to the
    /// corpus under the given class index.
    pub fn add_training_example(&self, image: &DynamicImage, class: usize) {
        let canvas = preprocess::normalize(image, &self.config.canvas);
        self.corpus.lock().add(canvas, class);
    }

    /// Ingest a labeled corpus directory (see [`crate::data::corpus`] for
    /// the layout contract). Unreadable images and malformed directories
    /// are reported in the summary, not fatal.
    pub fn load_corpus(&self, root: &Path) -> Result<IngestSummary> {
        let report = corpus::load_dir(root, &self.config.canvas)?;
        let summary = IngestSummary {
            examples: report.corpus.len(),
            classes: report.corpus.n_classes(),
            skipped: report.skipped,
            invalid_dirs: report.invalid_dirs,
        };
        self.emit(TrainingEvent::CorpusLoaded {
            examples: summary.examples,
            classes: summary.classes,
            skipped: summary.skipped.len(),
        });
        self.corpus.lock().extend(report.corpus);
        Ok(summary)
    }

    /// Poll-able lifecycle flag: tells callers whether `decide` would see a
    /// stale snapshot, a fresh one, or none at all.
    pub fn training_state(&self) -> TrainingState {
        *self.state.lock()
    }

    /// Latest published snapshot, if any.
    pub fn model(&self) -> Option<Arc<MulticlassModel>> {
        self.model.read().clone()
    }

    /// Run the full training pipeline to completion and publish the
    /// resulting snapshot.
    ///
    /// Failures leave the previous snapshot, if any, untouched. A second
    /// train call while one is in flight is refused.
    pub fn train(&self) -> Result<Arc<MulticlassModel>> {
        {
            let mut state = self.state.lock();
            if *state == TrainingState::Training {
                return Err(ClassifierError::Configuration(
                    "a training run is already in progress".to_string(),
                ));
            }
            *state = TrainingState::Training;
        }

        let result = self.train_inner();

        let mut state = self.state.lock();
        *state = match (&result, self.model.read().is_some()) {
            (Ok(_), _) | (Err(_), true) => TrainingState::Trained,
            (Err(_), false) => TrainingState::Untrained,
        };

        result
    }

    fn train_inner(&self) -> Result<Arc<MulticlassModel>> {
        // Frozen snapshot of the corpus: later additions belong to the next
        // training run.
        let corpus = self.corpus.lock().clone();
        if corpus.is_empty() {
            return Err(ClassifierError::Data("empty training set".to_string()));
        }

        self.emit(TrainingEvent::TrainingStarted {
            examples: corpus.len(),
            classes: corpus.n_classes(),
        });
        info!(
            "training on {} examples across {} classes",
            corpus.len(),
            corpus.n_classes()
        );

        let extractor =
            FittedExtractor::fit(&self.config.features, corpus.canvases(), &self.config.canvas)?;

        let vectors: Vec<FeatureVector> = corpus
            .canvases()
            .par_iter()
            .map(|canvas| extractor.extract(canvas))
            .collect::<Result<Vec<_>>>()?;

        let mut set = TrainingSet::new();
        for (vector, &label) in vectors.into_iter().zip(corpus.labels().iter()) {
            set.push(vector, label)?;
        }
        self.emit(TrainingEvent::FeaturesExtracted {
            examples: set.len(),
            dimension: extractor.dimension(),
        });

        let kernel = Arc::new(self.config.kernel.build()?);
        let c = match self.config.smo.complexity {
            Complexity::Fixed(c) => c,
            Complexity::Auto => kernel.estimate_complexity(set.vectors()),
        };
        info!("complexity bound C = {c:.6}");

        let machines = multiclass::train_pairwise(&set, &kernel, c, &self.config.smo)?;
        self.emit(TrainingEvent::MachinesTrained {
            machines: machines.len(),
        });

        let model = MulticlassModel::new(
            corpus.class_name_table(),
            machines,
            *kernel,
            extractor,
            self.config.canvas,
            c,
        );

        let predictions: Vec<usize> = set
            .vectors()
            .iter()
            .map(|vector| model.decide_vector(vector).map(|p| p.class))
            .collect::<Result<Vec<_>>>()?;
        let loss = metrics::zero_one_loss(&predictions, set.classes(), self.config.mean_loss)?;

        let model = Arc::new(model.with_in_sample_loss(loss));
        info!(
            "training complete: {} machines, in-sample loss {loss}",
            model.machines().len()
        );
        self.emit(TrainingEvent::Completed { loss });

        // Atomic swap: readers either see the old snapshot or this one,
        // never a partially built model.
        *self.model.write() = Some(Arc::clone(&model));
        Ok(model)
    }

    /// Run `train` on a background thread so queries against the previous
    /// snapshot stay responsive.
    pub fn train_in_background(self: &Arc<Self>) -> JoinHandle<Result<Arc<MulticlassModel>>> {
        let this = Arc::clone(self);
        thread::spawn(move || this.train())
    }

    /// Classify a query image against the latest published snapshot.
    pub fn decide(&self, image: &DynamicImage) -> Result<Prediction> {
        let model = self.model().ok_or(ClassifierError::UntrainedModel)?;
        model.decide_image(image)
    }

    /// Zero-one loss of the latest snapshot over the current corpus, in the
    /// configured count-or-mean mode.
    pub fn evaluate(&self) -> Result<f64> {
        let model = self.model().ok_or(ClassifierError::UntrainedModel)?;
        let corpus = self.corpus.lock().clone();

        let predictions: Vec<usize> = corpus
            .canvases()
            .par_iter()
            .map(|canvas| {
                let vector = model.extractor().extract(canvas)?;
                model.decide_vector(&vector).map(|p| p.class)
            })
            .collect::<Result<Vec<_>>>()?;

        metrics::zero_one_loss(&predictions, corpus.labels(), self.config.mean_loss)
    }
}

impl Default for GlyphClassifier {
    fn default() -> Self {
        Self {
            config: TrainingConfig::default(),
            corpus: Mutex::new(Corpus::new()),
            state: Mutex::new(TrainingState::Untrained),
            model: RwLock::new(None),
            progress: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn solid(value: u8) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_pixel(6, 12, Luma([value])))
    }

    fn trained_black_white() -> GlyphClassifier {
        let classifier = GlyphClassifier::new(TrainingConfig::fast()).unwrap();
        for _ in 0..5 {
            classifier.add_training_example(&solid(0), 0);
            classifier.add_training_example(&solid(255), 1);
        }
        classifier.train().unwrap();
        classifier
    }

    #[test]
    fn test_config_builder() {
        let config = TrainingConfig::fast()
            .with_complexity(Complexity::Fixed(2.0))
            .with_epsilon(0.01)
            .with_max_iterations(500)
            .with_mean_loss(true);

        assert_eq!(config.smo.complexity, Complexity::Fixed(2.0));
        assert_eq!(config.smo.epsilon, 0.01);
        assert_eq!(config.smo.max_iterations, 500);
        assert!(config.mean_loss);
    }

    #[test]
    fn test_config_validation() {
        assert!(TrainingConfig::fast().validate().is_ok());
        assert!(TrainingConfig::accurate().validate().is_ok());

        let bad = TrainingConfig::fast().with_complexity(Complexity::Fixed(-1.0));
        assert!(bad.validate().is_err());

        let bad = TrainingConfig::fast().with_epsilon(0.0);
        assert!(bad.validate().is_err());

        let mut bad = TrainingConfig::fast();
        bad.kernel.degree = 0;
        assert!(GlyphClassifier::new(bad).is_err());
    }

    #[test]
    fn test_initial_state_is_untrained() {
        let classifier = GlyphClassifier::default();
        assert_eq!(classifier.training_state(), TrainingState::Untrained);
        assert!(classifier.model().is_none());
    }

    #[test]
    fn test_decide_before_train_fails() {
        let classifier = GlyphClassifier::default();
        let result = classifier.decide(&solid(0));
        assert!(matches!(result, Err(ClassifierError::UntrainedModel)));
    }

    #[test]
    fn test_evaluate_before_train_fails() {
        let classifier = GlyphClassifier::default();
        assert!(matches!(
            classifier.evaluate(),
            Err(ClassifierError::UntrainedModel)
        ));
    }

    #[test]
    fn test_train_empty_corpus_fails_and_stays_untrained() {
        let classifier = GlyphClassifier::default();
        let result = classifier.train();
        assert!(matches!(result, Err(ClassifierError::Data(_))));
        assert_eq!(classifier.training_state(), TrainingState::Untrained);
    }

    #[test]
    fn test_train_separable_corpus() {
        let classifier = trained_black_white();

        assert_eq!(classifier.training_state(), TrainingState::Trained);
        let model = classifier.model().unwrap();
        assert_eq!(model.n_classes(), 2);
        assert_eq!(model.machines().len(), 1);

        assert_eq!(classifier.decide(&solid(0)).unwrap().class, 0);
        assert_eq!(classifier.decide(&solid(255)).unwrap().class, 1);
        assert_eq!(classifier.evaluate().unwrap(), 0.0);
    }

    #[test]
    fn test_retrain_swaps_snapshot() {
        let classifier = trained_black_white();
        let first = classifier.model().unwrap();

        classifier.add_training_example(&solid(16), 0);
        let second = classifier.train().unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        // The old snapshot still answers queries on its own.
        assert_eq!(first.decide_image(&solid(0)).unwrap().class, 0);
    }

    #[test]
    fn test_failed_retrain_keeps_previous_snapshot() {
        let classifier = trained_black_white();
        let before = classifier.model().unwrap();

        // A class-index gap makes the next run fail with a data error.
        classifier.add_training_example(&solid(128), 5);
        let result = classifier.train();
        assert!(matches!(result, Err(ClassifierError::Data(_))));

        assert_eq!(classifier.training_state(), TrainingState::Trained);
        let after = classifier.model().unwrap();
        assert!(Arc::ptr_eq(&before, &after));
    }

    #[test]
    fn test_progress_events_fire() {
        let events = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&events);
        let classifier = GlyphClassifier::new(TrainingConfig::fast())
            .unwrap()
            .on_progress(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            });

        for _ in 0..3 {
            classifier.add_training_example(&solid(0), 0);
            classifier.add_training_example(&solid(255), 1);
        }
        classifier.train().unwrap();

        // TrainingStarted, FeaturesExtracted, MachinesTrained, Completed.
        assert_eq!(events.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_mean_loss_mode() {
        let classifier = GlyphClassifier::new(TrainingConfig::fast().with_mean_loss(true)).unwrap();
        for _ in 0..4 {
            classifier.add_training_example(&solid(0), 0);
            classifier.add_training_example(&solid(255), 1);
        }
        classifier.train().unwrap();

        let loss = classifier.evaluate().unwrap();
        assert!((0.0..=1.0).contains(&loss));
        assert_eq!(loss, 0.0);
    }
}
