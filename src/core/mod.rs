//! Core types and errors for the glyph classifier

pub mod error;
pub mod types;

pub use self::error::*;
pub use self::types::*;
