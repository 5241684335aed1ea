//! Musical notation glyph classifier
//!
//! Trains one binary SVM per class pair via Sequential Minimal Optimization
//! over image features (raw pixels or bag of visual words) and combines
//! their votes into a multiclass decision.

pub mod api;
pub mod cache;
pub mod core;
pub mod data;
pub mod features;
pub mod kernel;
pub mod metrics;
pub mod multiclass;
pub mod preprocess;
pub mod solver;

// Re-export main types for convenience
pub use crate::api::{GlyphClassifier, IngestSummary, TrainingConfig, TrainingEvent};
pub use crate::cache::KernelCache;
pub use crate::core::error::*;
pub use crate::core::types::*;
pub use crate::data::corpus::{ClassDir, Corpus, CorpusReport};
pub use crate::features::{FeatureConfig, FittedExtractor, Vocabulary};
pub use crate::kernel::{Kernel, KernelConfig, PolynomialKernel};
pub use crate::multiclass::{BinarySvmModel, ClassPair, MulticlassModel};
pub use crate::preprocess::CanvasSpec;
pub use crate::solver::SmoSolver;

// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
