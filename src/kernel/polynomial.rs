//! Polynomial kernel
//!
//! K(x, y) = (γ * <x, y> + r)^d with configurable gamma, coef0, and degree.
//! Degree 1 is the fast, effectively linear operating point; degree 5 is the
//! higher-accuracy point usually paired with an auto-estimated complexity
//! bound.

use serde::{Deserialize, Serialize};

use crate::core::{ClassifierError, FeatureVector, Result};
use crate::kernel::traits::Kernel;

/// Polynomial kernel with configurable degree, gamma, and coefficient.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolynomialKernel {
    /// Scaling factor for the dot product.
    pub gamma: f64,
    /// Independent term in the polynomial.
    pub coef0: f64,
    /// Degree of the polynomial.
    pub degree: u32,
}

impl PolynomialKernel {
    pub fn new(degree: u32, gamma: f64, coef0: f64) -> Self {
        debug_assert!(degree > 0, "polynomial degree must be positive");
        debug_assert!(gamma > 0.0, "gamma must be positive");
        Self {
            gamma,
            coef0,
            degree,
        }
    }

    /// Degree-1 operating point: (x·y + 1), effectively a linear kernel.
    pub fn linear() -> Self {
        Self::new(1, 1.0, 1.0)
    }

    /// Degree-5 operating point: (x·y + 1)⁵.
    pub fn quintic() -> Self {
        Self::new(5, 1.0, 1.0)
    }
}

impl Kernel for PolynomialKernel {
    fn compute(&self, x: &FeatureVector, y: &FeatureVector) -> f64 {
        let base = self.gamma * x.dot(y) + self.coef0;

        // Negative bases cannot occur for the non-negative feature spaces
        // this crate produces; clamp anyway so a high degree never amplifies
        // a pathological input.
        if base <= 0.0 {
            0.0
        } else {
            base.powi(self.degree as i32)
        }
    }
}

/// Declarative kernel configuration, validated before a kernel is built.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct KernelConfig {
    pub degree: u32,
    pub gamma: f64,
    pub coef0: f64,
}

impl KernelConfig {
    pub fn validate(&self) -> Result<()> {
        if self.degree == 0 {
            return Err(ClassifierError::Configuration(
                "kernel degree must be positive".to_string(),
            ));
        }
        if self.gamma <= 0.0 {
            return Err(ClassifierError::Configuration(format!(
                "kernel gamma must be positive, got {}",
                self.gamma
            )));
        }
        if self.coef0 < 0.0 {
            return Err(ClassifierError::Configuration(format!(
                "kernel coef0 must be non-negative, got {}",
                self.coef0
            )));
        }
        Ok(())
    }

    pub fn build(&self) -> Result<PolynomialKernel> {
        self.validate()?;
        Ok(PolynomialKernel::new(self.degree, self.gamma, self.coef0))
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            degree: 1,
            gamma: 1.0,
            coef0: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_polynomial_kernel_computation() {
        let kernel = PolynomialKernel::new(2, 1.0, 1.0);

        let x = FeatureVector::new(vec![1.0, 2.0]);
        let y = FeatureVector::new(vec![2.0, 1.0]);

        // Dot product: 1*2 + 2*1 = 4
        // Kernel: (1.0 * 4 + 1.0)² = 25
        assert_relative_eq!(kernel.compute(&x, &y), 25.0, epsilon = 1e-10);
    }

    #[test]
    fn test_linear_operating_point() {
        let kernel = PolynomialKernel::linear();

        let x = FeatureVector::new(vec![3.0, 4.0]);
        // (3² + 4² + 1)¹ = 26
        assert_relative_eq!(kernel.compute(&x, &x), 26.0, epsilon = 1e-10);
    }

    #[test]
    fn test_quintic_operating_point() {
        let kernel = PolynomialKernel::quintic();

        let x = FeatureVector::new(vec![0.5]);
        let y = FeatureVector::new(vec![1.0]);
        // (0.5 + 1)⁵ = 7.59375
        assert_relative_eq!(kernel.compute(&x, &y), 7.59375, epsilon = 1e-10);
    }

    #[test]
    fn test_orthogonal_vectors() {
        let kernel = PolynomialKernel::new(2, 1.0, 1.0);

        let x = FeatureVector::new(vec![1.0, 0.0]);
        let y = FeatureVector::new(vec![0.0, 1.0]);

        // Dot product 0, kernel (0 + 1)² = 1
        assert_relative_eq!(kernel.compute(&x, &y), 1.0, epsilon = 1e-10);
    }

    #[test]
    fn test_negative_base_clamped() {
        let kernel = PolynomialKernel {
            gamma: 1.0,
            coef0: 0.0,
            degree: 2,
        };

        let x = FeatureVector::new(vec![1.0]);
        let y = FeatureVector::new(vec![-1.0]);
        assert_eq!(kernel.compute(&x, &y), 0.0);
    }

    #[test]
    fn test_estimate_complexity() {
        let kernel = PolynomialKernel::linear();
        let vectors = vec![
            FeatureVector::new(vec![1.0, 0.0]),
            FeatureVector::new(vec![0.0, 1.0]),
        ];

        // Diagonal: K(x,x) = 2 each, total 4; C = 2 / 4 = 0.5
        assert_relative_eq!(kernel.estimate_complexity(&vectors), 0.5, epsilon = 1e-10);
    }

    #[test]
    fn test_estimate_complexity_zero_diagonal() {
        let kernel = PolynomialKernel {
            gamma: 1.0,
            coef0: 0.0,
            degree: 1,
        };
        let vectors = vec![FeatureVector::new(vec![0.0])];
        assert_eq!(kernel.estimate_complexity(&vectors), 1.0);
    }

    #[test]
    fn test_kernel_config_validation() {
        assert!(KernelConfig::default().validate().is_ok());

        let bad_degree = KernelConfig {
            degree: 0,
            ..Default::default()
        };
        assert!(bad_degree.validate().is_err());

        let bad_gamma = KernelConfig {
            gamma: -1.0,
            ..Default::default()
        };
        assert!(bad_gamma.validate().is_err());
    }

    #[test]
    fn test_kernel_config_build() {
        let config = KernelConfig {
            degree: 5,
            gamma: 1.0,
            coef0: 1.0,
        };
        let kernel = config.build().unwrap();
        assert_eq!(kernel, PolynomialKernel::quintic());
    }
}
