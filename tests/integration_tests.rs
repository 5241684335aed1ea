//! Integration tests for the glyphsvm pipeline
//!
//! These exercise the end-to-end flow: corpus ingestion, feature
//! extraction, pairwise SMO training, and multiclass decisions.

use glyphsvm::api::{GlyphClassifier, TrainingConfig};
use glyphsvm::core::{ClassifierError, TrainingState};
use glyphsvm::data::corpus;
use glyphsvm::features::FeatureConfig;
use glyphsvm::preprocess::CanvasSpec;
use image::{DynamicImage, GrayImage, Luma};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn solid(width: u32, height: u32, value: u8) -> DynamicImage {
    DynamicImage::ImageLuma8(GrayImage::from_pixel(width, height, Luma([value])))
}

fn textured(seed: u32) -> DynamicImage {
    DynamicImage::ImageLuma8(GrayImage::from_fn(30, 30, |x, y| {
        Luma([((x * 37 + y * 91 + seed * 13) % 256) as u8])
    }))
}

fn write_png(dir: &Path, name: &str, value: u8) {
    GrayImage::from_pixel(12, 12, Luma([value]))
        .save(dir.join(name))
        .expect("save test image");
}

/// Scenario A: black-vs-white corpus with raw-pixel features and a degree-1
/// kernel must classify perfectly in-sample.
#[test]
fn test_black_white_end_to_end() {
    let classifier = GlyphClassifier::new(TrainingConfig::fast()).expect("valid config");
    for _ in 0..5 {
        classifier.add_training_example(&solid(6, 12, 0), 0);
        classifier.add_training_example(&solid(6, 12, 255), 1);
    }

    classifier.train().expect("training should succeed");

    assert_eq!(classifier.decide(&solid(6, 12, 0)).unwrap().class, 0);
    assert_eq!(classifier.decide(&solid(6, 12, 255)).unwrap().class, 1);
    assert_eq!(classifier.evaluate().unwrap(), 0.0);
}

/// Scenario B: deciding before any training run completes fails.
#[test]
fn test_decide_before_train_is_untrained_error() {
    let classifier = GlyphClassifier::default();
    assert!(matches!(
        classifier.decide(&solid(6, 12, 0)),
        Err(ClassifierError::UntrainedModel)
    ));
}

/// Scenario C: a malformed class directory raises a recorded configuration
/// error while its well-formed siblings still load.
#[test]
fn test_malformed_directory_contained() {
    let root = TempDir::new().unwrap();
    for (dir, value) in [("1_Black", 0u8), ("2_White", 255u8)] {
        let path = root.path().join(dir);
        fs::create_dir(&path).unwrap();
        write_png(&path, "a.png", value);
        write_png(&path, "b.png", value);
    }
    let bogus = root.path().join("no-index-here");
    fs::create_dir(&bogus).unwrap();
    write_png(&bogus, "ignored.png", 128);

    let report = corpus::load_dir(root.path(), &CanvasSpec::coarse()).unwrap();
    assert_eq!(report.invalid_dirs.len(), 1);
    assert!(matches!(
        report.invalid_dirs[0].error,
        ClassifierError::Configuration(_)
    ));
    assert_eq!(report.corpus.len(), 4);
    assert_eq!(report.corpus.n_classes(), 2);

    // The loaded siblings train into a working model.
    let classifier = GlyphClassifier::new(TrainingConfig::fast()).unwrap();
    let summary = classifier.load_corpus(root.path()).unwrap();
    assert_eq!(summary.invalid_dirs.len(), 1);
    classifier.train().expect("siblings alone are trainable");
    assert_eq!(classifier.decide(&solid(9, 9, 0)).unwrap().class, 0);
}

#[test]
fn test_three_classes_give_three_machines() {
    let classifier = GlyphClassifier::new(TrainingConfig::fast()).unwrap();
    for _ in 0..4 {
        classifier.add_training_example(&solid(6, 12, 0), 0);
        classifier.add_training_example(&solid(6, 12, 128), 1);
        classifier.add_training_example(&solid(6, 12, 255), 2);
    }

    let model = classifier.train().unwrap();
    assert_eq!(model.n_classes(), 3);
    assert_eq!(model.machines().len(), 3);

    assert_eq!(classifier.decide(&solid(6, 12, 128)).unwrap().class, 1);
    assert_eq!(classifier.evaluate().unwrap(), 0.0);
}

#[test]
fn test_background_training_publishes_snapshot() {
    let classifier = Arc::new(GlyphClassifier::new(TrainingConfig::fast()).unwrap());
    for _ in 0..5 {
        classifier.add_training_example(&solid(6, 12, 0), 0);
        classifier.add_training_example(&solid(6, 12, 255), 1);
    }

    let handle = classifier.train_in_background();
    let model = handle.join().expect("thread completes").expect("training succeeds");

    assert_eq!(classifier.training_state(), TrainingState::Trained);
    assert_eq!(model.decide_image(&solid(6, 12, 255)).unwrap().class, 1);
    assert_eq!(classifier.decide(&solid(6, 12, 0)).unwrap().class, 0);
}

#[test]
fn test_decide_is_idempotent_end_to_end() {
    let classifier = GlyphClassifier::new(TrainingConfig::fast()).unwrap();
    for _ in 0..5 {
        classifier.add_training_example(&solid(6, 12, 0), 0);
        classifier.add_training_example(&solid(6, 12, 255), 1);
    }
    classifier.train().unwrap();

    let probe = solid(20, 10, 30);
    let first = classifier.decide(&probe).unwrap();
    let second = classifier.decide(&probe).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_bag_of_words_pipeline() {
    let config = TrainingConfig::accurate().with_features(FeatureConfig::BagOfWords {
        vocabulary_size: 8,
        seed: 17,
    });
    let classifier = GlyphClassifier::new(config).unwrap();

    for i in 0..4 {
        classifier.add_training_example(&textured(i), 0);
        classifier.add_training_example(&textured(i + 100), 1);
    }

    let model = classifier.train().expect("bag-of-words training succeeds");
    assert_eq!(model.extractor().dimension(), 8);

    let prediction = classifier.decide(&textured(0)).unwrap();
    assert_eq!(prediction.votes.len(), 2);
    assert_eq!(prediction.votes.iter().sum::<usize>(), 1);
}

#[test]
fn test_vote_tally_shape() {
    let classifier = GlyphClassifier::new(TrainingConfig::fast()).unwrap();
    for _ in 0..3 {
        classifier.add_training_example(&solid(6, 12, 0), 0);
        classifier.add_training_example(&solid(6, 12, 100), 1);
        classifier.add_training_example(&solid(6, 12, 200), 2);
    }
    classifier.train().unwrap();

    let prediction = classifier.decide(&solid(6, 12, 0)).unwrap();
    // Three machines cast three votes across three classes.
    assert_eq!(prediction.votes.len(), 3);
    assert_eq!(prediction.votes.iter().sum::<usize>(), 3);
    assert_eq!(prediction.class, 0);
}

#[test]
fn test_unreadable_files_are_skipped_not_fatal() {
    let root = TempDir::new().unwrap();
    let dir = root.path().join("1_Glyphs");
    fs::create_dir(&dir).unwrap();
    write_png(&dir, "ok.png", 0);
    fs::write(dir.join("junk.png"), b"definitely not a png").unwrap();

    let other = root.path().join("2_Other");
    fs::create_dir(&other).unwrap();
    write_png(&other, "ok.png", 255);

    let classifier = GlyphClassifier::new(TrainingConfig::fast()).unwrap();
    let summary = classifier.load_corpus(root.path()).unwrap();

    assert_eq!(summary.examples, 2);
    assert_eq!(summary.skipped.len(), 1);
    classifier.train().expect("remaining corpus is trainable");
}

#[test]
fn test_class_names_travel_with_model() {
    let root = TempDir::new().unwrap();
    for (dir, value) in [("1_Black", 0u8), ("2_White", 255u8)] {
        let path = root.path().join(dir);
        fs::create_dir(&path).unwrap();
        write_png(&path, "a.png", value);
    }

    let classifier = GlyphClassifier::new(TrainingConfig::fast()).unwrap();
    classifier.load_corpus(root.path()).unwrap();
    let model = classifier.train().unwrap();

    assert_eq!(model.class_name(0), Some("Black"));
    assert_eq!(model.class_name(1), Some("White"));
}
