//! Kernel functions for the pairwise SVMs

pub mod polynomial;
pub mod traits;

pub use self::polynomial::*;
pub use self::traits::*;
