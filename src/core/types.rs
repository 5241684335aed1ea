//! Core type definitions shared across the training and inference pipeline

use serde::{Deserialize, Serialize};

use crate::core::{ClassifierError, Result};

/// Dense feature vector produced by a feature extractor.
///
/// Every vector produced by the same fitted extractor has the same length,
/// so the solver and kernel can rely on positional dot products.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureVector {
    values: Vec<f64>,
}

impl FeatureVector {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// Dot product over the shared positional index space.
    pub fn dot(&self, other: &FeatureVector) -> f64 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| a * b)
            .sum()
    }

    pub fn norm_squared(&self) -> f64 {
        self.values.iter().map(|&v| v * v).sum()
    }

    pub fn norm(&self) -> f64 {
        self.norm_squared().sqrt()
    }
}

impl From<Vec<f64>> for FeatureVector {
    fn from(values: Vec<f64>) -> Self {
        Self::new(values)
    }
}

/// Training sample as seen by the binary solver: features plus a ±1 label.
#[derive(Clone, Debug)]
pub struct Sample {
    pub features: FeatureVector,
    /// Binary label, +1 or -1.
    pub label: f64,
}

impl Sample {
    pub fn new(features: FeatureVector, label: f64) -> Self {
        Self { features, label }
    }
}

/// Training example as seen by the multiclass coordinator.
#[derive(Clone, Debug)]
pub struct LabeledExample {
    pub features: FeatureVector,
    /// Class index in `[0, k)`.
    pub class: usize,
}

impl LabeledExample {
    pub fn new(features: FeatureVector, class: usize) -> Self {
        Self { features, class }
    }
}

/// Correlated pair of feature vectors and class indices.
///
/// The two sequences are only ever grown together, one position at a time,
/// so index `i` of one always corresponds to index `i` of the other.
#[derive(Clone, Debug, Default)]
pub struct TrainingSet {
    vectors: Vec<FeatureVector>,
    classes: Vec<usize>,
}

impl TrainingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one example. Rejects vectors whose length differs from the
    /// vectors already present.
    pub fn push(&mut self, features: FeatureVector, class: usize) -> Result<()> {
        if let Some(first) = self.vectors.first() {
            if first.len() != features.len() {
                return Err(ClassifierError::Data(format!(
                    "feature vector length mismatch: expected {}, got {}",
                    first.len(),
                    features.len()
                )));
            }
        }
        self.vectors.push(features);
        self.classes.push(class);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn vectors(&self) -> &[FeatureVector] {
        &self.vectors
    }

    pub fn classes(&self) -> &[usize] {
        &self.classes
    }

    /// Number of classes, assuming 0-based contiguous indices.
    pub fn n_classes(&self) -> usize {
        self.classes.iter().max().map_or(0, |&m| m + 1)
    }

    /// Examples per class index over `[0, n_classes)`.
    pub fn class_counts(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.n_classes()];
        for &class in &self.classes {
            counts[class] += 1;
        }
        counts
    }

    /// A trainable set is non-empty, spans at least two classes, and has no
    /// empty class among `0..n_classes`.
    pub fn ensure_populated(&self) -> Result<()> {
        if self.is_empty() {
            return Err(ClassifierError::Data("empty training set".to_string()));
        }
        let counts = self.class_counts();
        if counts.len() < 2 {
            return Err(ClassifierError::Data(
                "at least two classes are required".to_string(),
            ));
        }
        for (class, &count) in counts.iter().enumerate() {
            if count == 0 {
                return Err(ClassifierError::Data(format!(
                    "class {class} has no examples"
                )));
            }
        }
        Ok(())
    }
}

/// Multiclass decision: the winning class plus the vote tally behind it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Prediction {
    /// Winning class index.
    pub class: usize,
    /// Votes per class index, one entry per class.
    pub votes: Vec<usize>,
}

impl Prediction {
    pub fn new(class: usize, votes: Vec<usize>) -> Self {
        Self { class, votes }
    }

    /// Votes received by the winning class.
    pub fn winning_votes(&self) -> usize {
        self.votes[self.class]
    }
}

/// Lifecycle of the published model snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrainingState {
    /// No pairwise machines exist yet.
    Untrained,
    /// A training run is building a new snapshot; readers keep seeing the
    /// previous one, if any.
    Training,
    /// An immutable snapshot is published and safe to read.
    Trained,
}

/// Regularization bound C, either fixed or estimated from the kernel.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    /// Derive C from the kernel diagonal over the training set.
    Auto,
    /// Use the given C as-is.
    Fixed(f64),
}

impl Default for Complexity {
    fn default() -> Self {
        Self::Auto
    }
}

/// Configuration for the SMO solver.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SmoConfig {
    /// Regularization bound (upper bound for alpha).
    pub complexity: Complexity,
    /// Tolerance for KKT conditions.
    pub epsilon: f64,
    /// Maximum number of outer-loop iterations per binary machine.
    pub max_iterations: usize,
    /// Kernel cache size in bytes, per binary machine.
    pub cache_size: usize,
}

impl Default for SmoConfig {
    fn default() -> Self {
        Self {
            complexity: Complexity::Auto,
            epsilon: 0.001,
            max_iterations: 10_000,
            cache_size: 16_000_000,
        }
    }
}

/// Result of one binary SMO run.
#[derive(Clone, Debug)]
pub struct SmoOutcome {
    /// Lagrange multipliers, one per sample, each in `[0, C]`.
    pub alpha: Vec<f64>,
    /// Bias term.
    pub bias: f64,
    /// Indices of samples with alpha > 0.
    pub support_vectors: Vec<usize>,
    /// Outer-loop iterations performed.
    pub iterations: usize,
    /// False when the iteration cap was reached before the KKT tolerance.
    pub converged: bool,
}
