//! Binary SVM solver
//!
//! Implements Sequential Minimal Optimization for the two-class dual
//! problem; the multiclass coordinator runs one instance per class pair.

pub mod smo;

pub use self::smo::*;
