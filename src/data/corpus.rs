//! Labeled-directory corpus ingestion
//!
//! Layout contract: the corpus root contains one subdirectory per class,
//! named `"<1-based index>_<label>"` (e.g. `1_Black`); every file inside is
//! one training image for that class. Class index = token - 1.
//!
//! Unreadable images are skipped and reported, not fatal. A malformed
//! directory name is a configuration error recorded for that directory;
//! well-formed siblings still load.

use image::GrayImage;
use log::warn;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::{ClassifierError, Result};
use crate::preprocess::{self, CanvasSpec};

/// Parsed class-directory name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassDir {
    /// 0-based class index.
    pub index: usize,
    /// Human-readable label following the underscore.
    pub name: String,
}

impl ClassDir {
    /// Parse `"<1-based index>_<label>"` into a 0-based class index.
    pub fn parse(dir_name: &str) -> Result<Self> {
        let (token, name) = dir_name.split_once('_').ok_or_else(|| {
            ClassifierError::Configuration(format!(
                "class directory '{dir_name}' does not match '<index>_<label>'"
            ))
        })?;

        let one_based: usize = token.parse().map_err(|_| {
            ClassifierError::Configuration(format!(
                "class directory '{dir_name}' has a non-numeric index token '{token}'"
            ))
        })?;

        if one_based == 0 {
            return Err(ClassifierError::Configuration(format!(
                "class directory '{dir_name}' uses index 0; folder indices are 1-based"
            )));
        }

        Ok(Self {
            index: one_based - 1,
            name: name.to_string(),
        })
    }
}

/// In-memory training corpus: normalized canvases plus correlated labels.
///
/// The two sequences only grow together, so position `i` of one always
/// belongs to position `i` of the other.
#[derive(Clone, Debug, Default)]
pub struct Corpus {
    canvases: Vec<GrayImage>,
    labels: Vec<usize>,
    class_names: BTreeMap<usize, String>,
}

impl Corpus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, canvas: GrayImage, class: usize) {
        self.canvases.push(canvas);
        self.labels.push(class);
    }

    pub fn set_class_name(&mut self, class: usize, name: String) {
        self.class_names.insert(class, name);
    }

    /// Move all examples and class names of `other` into `self`.
    pub fn extend(&mut self, other: Corpus) {
        self.canvases.extend(other.canvases);
        self.labels.extend(other.labels);
        self.class_names.extend(other.class_names);
    }

    pub fn len(&self) -> usize {
        self.canvases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.canvases.is_empty()
    }

    pub fn canvases(&self) -> &[GrayImage] {
        &self.canvases
    }

    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// Number of classes, assuming 0-based contiguous indices.
    pub fn n_classes(&self) -> usize {
        self.labels.iter().max().map_or(0, |&m| m + 1)
    }

    pub fn class_name(&self, class: usize) -> Option<&str> {
        self.class_names.get(&class).map(String::as_str)
    }

    /// Name table over `[0, n_classes)`, with a positional fallback for
    /// classes that never got a name.
    pub fn class_name_table(&self) -> Vec<String> {
        (0..self.n_classes())
            .map(|class| {
                self.class_names
                    .get(&class)
                    .cloned()
                    .unwrap_or_else(|| format!("class {class}"))
            })
            .collect()
    }
}

/// An image that could not be read; recorded, not fatal.
#[derive(Debug)]
pub struct SkippedImage {
    pub path: PathBuf,
    pub reason: String,
}

/// A subdirectory whose name violates the layout contract.
#[derive(Debug)]
pub struct InvalidDir {
    pub path: PathBuf,
    pub error: ClassifierError,
}

/// Outcome of a corpus scan: what loaded, what was skipped, what was
/// malformed.
#[derive(Debug, Default)]
pub struct CorpusReport {
    pub corpus: Corpus,
    pub skipped: Vec<SkippedImage>,
    pub invalid_dirs: Vec<InvalidDir>,
}

/// Scan a corpus root and load every readable image.
///
/// Images within a directory are decoded and normalized in parallel; the
/// resulting canvases keep file order, so labels stay correlated.
pub fn load_dir(root: &Path, spec: &CanvasSpec) -> Result<CorpusReport> {
    let mut class_dirs: Vec<PathBuf> = fs::read_dir(root)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    class_dirs.sort();

    let mut report = CorpusReport::default();

    for dir in class_dirs {
        let dir_name = match dir.file_name().and_then(OsStr::to_str) {
            Some(name) => name.to_string(),
            None => {
                report.invalid_dirs.push(InvalidDir {
                    error: ClassifierError::Configuration(format!(
                        "class directory {} has a non-UTF-8 name",
                        dir.display()
                    )),
                    path: dir,
                });
                continue;
            }
        };

        let class_dir = match ClassDir::parse(&dir_name) {
            Ok(class_dir) => class_dir,
            Err(error) => {
                warn!("skipping malformed class directory {}: {error}", dir.display());
                report.invalid_dirs.push(InvalidDir { path: dir, error });
                continue;
            }
        };

        report
            .corpus
            .set_class_name(class_dir.index, class_dir.name.clone());

        let mut files: Vec<PathBuf> = fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();
        files.sort();

        let loaded: Vec<(PathBuf, Result<GrayImage>)> = files
            .into_par_iter()
            .map(|path| {
                let canvas = image::open(&path)
                    .map(|img| preprocess::normalize(&img, spec))
                    .map_err(ClassifierError::from);
                (path, canvas)
            })
            .collect();

        for (path, result) in loaded {
            match result {
                Ok(canvas) => report.corpus.add(canvas, class_dir.index),
                Err(error) => report.skipped.push(SkippedImage {
                    path,
                    reason: error.to_string(),
                }),
            }
        }
    }

    if !report.skipped.is_empty() {
        warn!(
            "skipped {} unreadable corpus images: {}",
            report.skipped.len(),
            report
                .skipped
                .iter()
                .map(|s| s.path.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    Ok(report)
}
