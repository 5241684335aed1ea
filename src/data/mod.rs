//! Corpus loading
//!
//! Training data arrives as a directory tree with one subdirectory per
//! class; this module turns it into an in-memory corpus of normalized
//! canvases with correlated labels.

pub mod corpus;

pub use self::corpus::*;
