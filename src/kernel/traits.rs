//! Kernel trait definition

use crate::core::FeatureVector;

/// Kernel function trait
///
/// A kernel K(x, y) must satisfy Mercer's condition to be valid for SVM
/// training. Implementations are shared read-only across the parallel
/// pairwise trainings.
pub trait Kernel: Send + Sync {
    /// Compute kernel value K(x, y)
    fn compute(&self, x: &FeatureVector, y: &FeatureVector) -> f64;

    /// Heuristic default for the regularization bound C, derived from the
    /// kernel diagonal over the training set: `n / Σ K(xᵢ, xᵢ)`.
    ///
    /// Used only when the caller does not fix C explicitly.
    fn estimate_complexity(&self, vectors: &[FeatureVector]) -> f64 {
        let diagonal: f64 = vectors.iter().map(|v| self.compute(v, v)).sum();
        if diagonal > 0.0 {
            vectors.len() as f64 / diagonal
        } else {
            1.0
        }
    }
}
