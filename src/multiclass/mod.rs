//! One-vs-one multiclass decomposition
//!
//! A k-class problem is decomposed into k(k-1)/2 binary subproblems, one per
//! unordered class pair, each trained independently by the SMO solver. At
//! decision time every machine casts one vote; the class with the most votes
//! wins, ties resolving to the lowest class index.

use chrono::{DateTime, Utc};
use image::DynamicImage;
use log::debug;
use rayon::prelude::*;
use std::sync::Arc;

use crate::core::{
    ClassifierError, FeatureVector, Prediction, Result, Sample, SmoConfig, TrainingSet,
};
use crate::features::FittedExtractor;
use crate::kernel::{Kernel, PolynomialKernel};
use crate::preprocess::{self, CanvasSpec};
use crate::solver::SmoSolver;

/// Unordered class pair with `a < b`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClassPair {
    pub a: usize,
    pub b: usize,
}

/// Binary machine for one class pair.
///
/// Support-vector labels are +1 for class `a` and -1 for class `b`.
/// Immutable once trained.
#[derive(Clone, Debug)]
pub struct BinarySvmModel {
    pair: ClassPair,
    support_vectors: Vec<Sample>,
    alpha: Vec<f64>,
    bias: f64,
    converged: bool,
}

impl BinarySvmModel {
    pub fn pair(&self) -> ClassPair {
        self.pair
    }

    pub fn n_support_vectors(&self) -> usize {
        self.support_vectors.len()
    }

    pub fn bias(&self) -> f64 {
        self.bias
    }

    /// False when SMO hit its iteration cap for this pair.
    pub fn converged(&self) -> bool {
        self.converged
    }

    /// Σ alphaᵢ·yᵢ·K(xᵢ, x) + b over the retained support vectors.
    pub fn decision_function<K: Kernel>(&self, kernel: &K, x: &FeatureVector) -> f64 {
        let mut decision = self.bias;
        for (support_vector, &alpha) in self.support_vectors.iter().zip(self.alpha.iter()) {
            decision += alpha * support_vector.label * kernel.compute(&support_vector.features, x);
        }
        decision
    }

    /// The class this machine votes for on `x`.
    pub fn vote<K: Kernel>(&self, kernel: &K, x: &FeatureVector) -> usize {
        if self.decision_function(kernel, x) >= 0.0 {
            self.pair.a
        } else {
            self.pair.b
        }
    }
}

/// Train one machine per unordered class pair, in parallel.
///
/// Fails with a data error when the set is empty, spans fewer than two
/// classes, or leaves any class index without examples.
pub fn train_pairwise(
    set: &TrainingSet,
    kernel: &Arc<PolynomialKernel>,
    c: f64,
    config: &SmoConfig,
) -> Result<Vec<BinarySvmModel>> {
    set.ensure_populated()?;

    let k = set.n_classes();
    let mut pairs = Vec::with_capacity(k * (k - 1) / 2);
    for a in 0..k {
        for b in a + 1..k {
            pairs.push(ClassPair { a, b });
        }
    }

    pairs
        .par_iter()
        .map(|&pair| train_pair(set, kernel, c, config, pair))
        .collect()
}

fn train_pair(
    set: &TrainingSet,
    kernel: &Arc<PolynomialKernel>,
    c: f64,
    config: &SmoConfig,
    pair: ClassPair,
) -> Result<BinarySvmModel> {
    let samples: Vec<Sample> = set
        .vectors()
        .iter()
        .zip(set.classes().iter())
        .filter_map(|(vector, &class)| {
            if class == pair.a {
                Some(Sample::new(vector.clone(), 1.0))
            } else if class == pair.b {
                Some(Sample::new(vector.clone(), -1.0))
            } else {
                None
            }
        })
        .collect();

    let solver = SmoSolver::new(Arc::clone(kernel), c, config);
    let outcome = solver.solve(&samples)?;

    let mut support_vectors = Vec::with_capacity(outcome.support_vectors.len());
    let mut alpha = Vec::with_capacity(outcome.support_vectors.len());
    for &index in &outcome.support_vectors {
        support_vectors.push(samples[index].clone());
        alpha.push(outcome.alpha[index]);
    }

    debug!(
        "pair {}/{}: {} support vectors over {} samples, {} iterations, converged={}",
        pair.a,
        pair.b,
        support_vectors.len(),
        samples.len(),
        outcome.iterations,
        outcome.converged
    );

    Ok(BinarySvmModel {
        pair,
        support_vectors,
        alpha,
        bias: outcome.bias,
        converged: outcome.converged,
    })
}

/// Most-voted class; ties resolve to the lowest tied index.
pub(crate) fn winning_class(votes: &[usize]) -> usize {
    let mut best = 0;
    for class in 1..votes.len() {
        if votes[class] > votes[best] {
            best = class;
        }
    }
    best
}

/// Immutable multiclass snapshot.
///
/// Created only by a completed training run; a retrain builds a brand-new
/// snapshot that atomically replaces this one, never mutating it in place.
/// The fitted feature extractor travels with the snapshot so query images
/// are always mapped into the exact vector space the machines were trained
/// in.
#[derive(Clone, Debug)]
pub struct MulticlassModel {
    class_names: Vec<String>,
    machines: Vec<BinarySvmModel>,
    kernel: PolynomialKernel,
    extractor: FittedExtractor,
    canvas: CanvasSpec,
    complexity: f64,
    in_sample_loss: f64,
    trained_at: DateTime<Utc>,
}

impl MulticlassModel {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        class_names: Vec<String>,
        machines: Vec<BinarySvmModel>,
        kernel: PolynomialKernel,
        extractor: FittedExtractor,
        canvas: CanvasSpec,
        complexity: f64,
    ) -> Self {
        Self {
            class_names,
            machines,
            kernel,
            extractor,
            canvas,
            complexity,
            in_sample_loss: 0.0,
            trained_at: Utc::now(),
        }
    }

    pub(crate) fn with_in_sample_loss(mut self, loss: f64) -> Self {
        self.in_sample_loss = loss;
        self
    }

    pub fn n_classes(&self) -> usize {
        self.class_names.len()
    }

    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    pub fn class_name(&self, class: usize) -> Option<&str> {
        self.class_names.get(class).map(String::as_str)
    }

    /// All k(k-1)/2 pairwise machines.
    pub fn machines(&self) -> &[BinarySvmModel] {
        &self.machines
    }

    pub fn kernel(&self) -> &PolynomialKernel {
        &self.kernel
    }

    pub fn extractor(&self) -> &FittedExtractor {
        &self.extractor
    }

    pub fn canvas(&self) -> &CanvasSpec {
        &self.canvas
    }

    /// Resolved regularization bound the machines were trained with.
    pub fn complexity(&self) -> f64 {
        self.complexity
    }

    /// Zero-one loss over the training corpus, per the configured mode.
    pub fn in_sample_loss(&self) -> f64 {
        self.in_sample_loss
    }

    pub fn trained_at(&self) -> DateTime<Utc> {
        self.trained_at
    }

    /// True when every pairwise machine converged within its iteration cap.
    pub fn converged(&self) -> bool {
        self.machines.iter().all(BinarySvmModel::converged)
    }

    /// Decide on an already-extracted feature vector.
    pub fn decide_vector(&self, x: &FeatureVector) -> Result<Prediction> {
        let expected = self.extractor.dimension();
        if x.len() != expected {
            return Err(ClassifierError::Data(format!(
                "feature vector length mismatch: expected {expected}, got {}",
                x.len()
            )));
        }

        let mut votes = vec![0usize; self.n_classes()];
        for machine in &self.machines {
            votes[machine.vote(&self.kernel, x)] += 1;
        }

        Ok(Prediction::new(winning_class(&votes), votes))
    }

    /// Normalize, extract, and decide on a query image.
    pub fn decide_image(&self, image: &DynamicImage) -> Result<Prediction> {
        let canvas = preprocess::normalize(image, &self.canvas);
        let vector = self.extractor.extract(&canvas)?;
        self.decide_vector(&vector)
    }
}
