//! In-sample evaluation
//!
//! The only evaluation this crate performs is zero-one loss of predictions
//! against known labels; train/test splitting is left to callers that want
//! generalization estimates.

use crate::core::{ClassifierError, Result};

/// Zero-one loss between predicted and true class indices.
///
/// Returns the mismatch count, or the mismatch fraction when `mean` is set.
/// Both sequences must have equal length; empty sequences yield 0.
pub fn zero_one_loss(predicted: &[usize], actual: &[usize], mean: bool) -> Result<f64> {
    if predicted.len() != actual.len() {
        return Err(ClassifierError::Data(format!(
            "prediction/label length mismatch: {} vs {}",
            predicted.len(),
            actual.len()
        )));
    }
    if predicted.is_empty() {
        return Ok(0.0);
    }

    let mismatches = predicted
        .iter()
        .zip(actual.iter())
        .filter(|(p, a)| p != a)
        .count();

    if mean {
        Ok(mismatches as f64 / predicted.len() as f64)
    } else {
        Ok(mismatches as f64)
    }
}
