//! Error types for the glyph classifier

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("invalid training data: {0}")]
    Data(String),

    #[error("no trained model is available")]
    UntrainedModel,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, ClassifierError>;
