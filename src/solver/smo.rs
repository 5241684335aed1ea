//! Sequential Minimal Optimization (SMO)
//!
//! Optimizes the SVM dual by repeatedly picking a pair of examples that
//! violates the KKT conditions, solving the reduced two-variable quadratic
//! subproblem in closed form, and propagating the change through an error
//! cache. Kernel evaluations are memoized in an LRU cache keyed on sample
//! indices.

use log::warn;
use std::sync::Arc;

use crate::cache::KernelCache;
use crate::core::{ClassifierError, Result, Sample, SmoConfig, SmoOutcome};
use crate::kernel::Kernel;

/// Alphas this close to 0 or C are snapped to the exact bound to prevent
/// numerical drift from accumulating across passes.
const BOUND_EPSILON: f64 = 1e-8;

/// SMO solver for one binary subproblem.
///
/// Each instance owns its alpha and error state for the duration of a
/// `solve` call; instances share nothing, so the multiclass coordinator can
/// run them in parallel against the same kernel.
pub struct SmoSolver<K: Kernel> {
    kernel: Arc<K>,
    c: f64,
    epsilon: f64,
    max_iterations: usize,
    cache_size: usize,
}

impl<K: Kernel> SmoSolver<K> {
    /// Create a solver with an already-resolved complexity bound `c`.
    pub fn new(kernel: Arc<K>, c: f64, config: &SmoConfig) -> Self {
        Self {
            kernel,
            c,
            epsilon: config.epsilon,
            max_iterations: config.max_iterations,
            cache_size: config.cache_size,
        }
    }

    /// Solve the dual problem over binary-labeled samples.
    ///
    /// Non-convergence within the iteration cap is not fatal: the best
    /// state reached so far is returned with `converged = false`.
    pub fn solve(&self, samples: &[Sample]) -> Result<SmoOutcome> {
        if samples.is_empty() {
            return Err(ClassifierError::Data(
                "empty binary subproblem".to_string(),
            ));
        }
        for sample in samples {
            if sample.label != 1.0 && sample.label != -1.0 {
                return Err(ClassifierError::Data(format!(
                    "binary label must be +1 or -1, got {}",
                    sample.label
                )));
            }
        }
        if self.c <= 0.0 {
            return Err(ClassifierError::Configuration(format!(
                "complexity bound must be positive, got {}",
                self.c
            )));
        }

        let n = samples.len();
        let mut cache = KernelCache::with_memory_limit(self.cache_size);
        let mut alpha = vec![0.0; n];

        // E_i = output_i - y_i; with all alphas at 0 the output is 0.
        let mut error_cache: Vec<f64> = samples.iter().map(|s| -s.label).collect();

        let mut iterations = 0;
        let mut num_changed = 0;
        let mut examine_all = true;

        while (num_changed > 0 || examine_all) && iterations < self.max_iterations {
            num_changed = 0;

            if examine_all {
                for i in 0..n {
                    if self.examine(i, samples, &mut alpha, &mut error_cache, &mut cache) {
                        num_changed += 1;
                    }
                }
            } else {
                // Non-bound examples (0 < alpha < C) are the only ones whose
                // KKT status can still move.
                for i in 0..n {
                    if alpha[i] > 0.0
                        && alpha[i] < self.c
                        && self.examine(i, samples, &mut alpha, &mut error_cache, &mut cache)
                    {
                        num_changed += 1;
                    }
                }
            }

            if examine_all {
                examine_all = false;
            } else if num_changed == 0 {
                examine_all = true;
            }

            iterations += 1;
        }

        let converged = num_changed == 0 && !examine_all;
        if !converged {
            warn!(
                "SMO hit the iteration cap ({}) before reaching tolerance {}; returning the best state so far",
                self.max_iterations, self.epsilon
            );
        }

        let bias = self.calculate_bias(&alpha, &error_cache);

        let support_vectors: Vec<usize> = alpha
            .iter()
            .enumerate()
            .filter_map(|(i, &a)| if a > 0.0 { Some(i) } else { None })
            .collect();

        Ok(SmoOutcome {
            alpha,
            bias,
            support_vectors,
            iterations,
            converged,
        })
    }

    fn kernel_cached(
        &self,
        cache: &mut KernelCache,
        samples: &[Sample],
        i: usize,
        j: usize,
    ) -> f64 {
        if let Some(value) = cache.get(i, j) {
            value
        } else {
            let value = self
                .kernel
                .compute(&samples[i].features, &samples[j].features);
            cache.put(i, j, value);
            value
        }
    }

    /// Check KKT conditions for example `i` and try one optimization step.
    fn examine(
        &self,
        i: usize,
        samples: &[Sample],
        alpha: &mut [f64],
        error_cache: &mut [f64],
        cache: &mut KernelCache,
    ) -> bool {
        let y_i = samples[i].label;
        let e_i = error_cache[i];
        let r_i = e_i * y_i;

        // KKT violation: alpha can increase (r < -eps, alpha < C) or
        // decrease (r > eps, alpha > 0).
        if (r_i < -self.epsilon && alpha[i] < self.c)
            || (r_i > self.epsilon && alpha[i] > 0.0)
        {
            if let Some(j) = self.select_second(i, e_i, error_cache) {
                return self.take_step(i, j, samples, alpha, error_cache, cache);
            }
        }

        false
    }

    /// Second-choice heuristic: maximize |E_i - E_j|, the step-size proxy.
    fn select_second(&self, i: usize, e_i: f64, error_cache: &[f64]) -> Option<usize> {
        let mut best = None;
        let mut max_diff = 0.0;

        for (j, &e_j) in error_cache.iter().enumerate() {
            if j == i {
                continue;
            }
            let diff = (e_i - e_j).abs();
            if diff > max_diff {
                max_diff = diff;
                best = Some(j);
            }
        }

        best
    }

    /// Jointly optimize alphas i and j, preserving Σ alpha·y.
    fn take_step(
        &self,
        i: usize,
        j: usize,
        samples: &[Sample],
        alpha: &mut [f64],
        error_cache: &mut [f64],
        cache: &mut KernelCache,
    ) -> bool {
        if i == j {
            return false;
        }

        let y_i = samples[i].label;
        let y_j = samples[j].label;
        let alpha_i_old = alpha[i];
        let alpha_j_old = alpha[j];
        let e_i = error_cache[i];
        let e_j = error_cache[j];
        let s = y_i * y_j;

        // Box constraints implied by the labels and C.
        let (low, high) = if y_i != y_j {
            let diff = alpha_j_old - alpha_i_old;
            (f64::max(0.0, diff), f64::min(self.c, self.c + diff))
        } else {
            let sum = alpha_i_old + alpha_j_old;
            (f64::max(0.0, sum - self.c), f64::min(self.c, sum))
        };

        if low >= high {
            return false;
        }

        let k_ii = self.kernel_cached(cache, samples, i, i);
        let k_ij = self.kernel_cached(cache, samples, i, j);
        let k_jj = self.kernel_cached(cache, samples, j, j);

        let eta = k_ii + k_jj - 2.0 * k_ij;
        if eta <= 0.0 {
            // Non-positive-definite subproblem; skip the pair.
            return false;
        }

        let mut alpha_j_new = alpha_j_old + y_j * (e_i - e_j) / eta;
        alpha_j_new = alpha_j_new.clamp(low, high);
        alpha_j_new = self.snap_to_bounds(alpha_j_new);

        if (alpha_j_new - alpha_j_old).abs()
            < self.epsilon * (alpha_j_new + alpha_j_old + self.epsilon)
        {
            return false;
        }

        let alpha_i_new = self.snap_to_bounds(alpha_i_old + s * (alpha_j_old - alpha_j_new));

        alpha[i] = alpha_i_new;
        alpha[j] = alpha_j_new;

        let delta_i = alpha_i_new - alpha_i_old;
        let delta_j = alpha_j_new - alpha_j_old;

        for k in 0..samples.len() {
            let k_ik = self.kernel_cached(cache, samples, i, k);
            let k_jk = self.kernel_cached(cache, samples, j, k);
            error_cache[k] += y_i * delta_i * k_ik + y_j * delta_j * k_jk;
        }

        true
    }

    fn snap_to_bounds(&self, value: f64) -> f64 {
        if value < BOUND_EPSILON {
            0.0
        } else if value > self.c - BOUND_EPSILON {
            self.c
        } else {
            value
        }
    }

    /// Bias from examples strictly inside the margin (0 < alpha < C);
    /// falls back to all support vectors, then to 0.
    fn calculate_bias(&self, alpha: &[f64], error_cache: &[f64]) -> f64 {
        let in_margin: Vec<f64> = alpha
            .iter()
            .zip(error_cache.iter())
            .filter(|(&a, _)| a > 0.0 && a < self.c)
            .map(|(_, &e)| e)
            .collect();

        if !in_margin.is_empty() {
            return -in_margin.iter().sum::<f64>() / in_margin.len() as f64;
        }

        let at_bound: Vec<f64> = alpha
            .iter()
            .zip(error_cache.iter())
            .filter(|(&a, _)| a > 0.0)
            .map(|(_, &e)| e)
            .collect();

        if at_bound.is_empty() {
            0.0
        } else {
            -at_bound.iter().sum::<f64>() / at_bound.len() as f64
        }
    }
}
