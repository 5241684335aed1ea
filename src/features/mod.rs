//! Feature extraction strategies
//!
//! Two interchangeable strategies turn a normalized canvas into a
//! fixed-length vector: raw pixel intensities, or a histogram over a learned
//! vocabulary of visual words. The strategy is chosen by [`FeatureConfig`];
//! fitting produces a [`FittedExtractor`] that is frozen into the model
//! snapshot, so the vector length and semantics can never change under a
//! trained model.

pub mod bovw;
pub mod raw_pixel;

pub use self::bovw::Vocabulary;

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::core::{ClassifierError, FeatureVector, Result};
use crate::preprocess::CanvasSpec;

/// Feature extraction strategy selection.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureConfig {
    /// Flatten canvas intensities; vector length = width * height.
    RawPixel,
    /// Histogram over a k-means vocabulary of local patch descriptors;
    /// vector length = `vocabulary_size`.
    BagOfWords { vocabulary_size: usize, seed: u64 },
}

impl FeatureConfig {
    /// Bag-of-words with the default clustering seed.
    pub fn bag_of_words(vocabulary_size: usize) -> Self {
        Self::BagOfWords {
            vocabulary_size,
            seed: 17,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Self::RawPixel => Ok(()),
            Self::BagOfWords {
                vocabulary_size, ..
            } => {
                if *vocabulary_size == 0 {
                    Err(ClassifierError::Configuration(
                        "vocabulary size must be positive".to_string(),
                    ))
                } else {
                    Ok(())
                }
            }
        }
    }
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self::RawPixel
    }
}

/// A frozen, ready-to-apply extractor.
///
/// Produced once per training run and owned by the model snapshot; it is
/// never refit in place, which keeps every vector the snapshot has ever seen
/// on the same length and semantics.
#[derive(Clone, Debug)]
pub enum FittedExtractor {
    RawPixel { width: u32, height: u32 },
    BagOfWords(Vocabulary),
}

impl FittedExtractor {
    /// Fit the configured strategy over the full training corpus.
    pub fn fit(
        config: &FeatureConfig,
        canvases: &[GrayImage],
        spec: &CanvasSpec,
    ) -> Result<Self> {
        config.validate()?;
        match *config {
            FeatureConfig::RawPixel => Ok(Self::RawPixel {
                width: spec.width,
                height: spec.height,
            }),
            FeatureConfig::BagOfWords {
                vocabulary_size,
                seed,
            } => {
                let vocabulary = Vocabulary::fit(canvases, vocabulary_size, seed)?;
                Ok(Self::BagOfWords(vocabulary))
            }
        }
    }

    /// Extract a feature vector of length [`Self::dimension`].
    pub fn extract(&self, canvas: &GrayImage) -> Result<FeatureVector> {
        match self {
            Self::RawPixel { width, height } => {
                if canvas.dimensions() != (*width, *height) {
                    return Err(ClassifierError::Data(format!(
                        "canvas is {}x{}, extractor expects {width}x{height}",
                        canvas.width(),
                        canvas.height()
                    )));
                }
                Ok(raw_pixel::extract(canvas))
            }
            Self::BagOfWords(vocabulary) => Ok(vocabulary.histogram(canvas)),
        }
    }

    /// Length of every vector this extractor produces.
    pub fn dimension(&self) -> usize {
        match self {
            Self::RawPixel { width, height } => (*width as usize) * (*height as usize),
            Self::BagOfWords(vocabulary) => vocabulary.size(),
        }
    }
}
