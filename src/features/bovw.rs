//! Bag-of-visual-words features
//!
//! Fit phase: detect FAST-9 keypoints on every training canvas, describe the
//! patch around each keypoint, and cluster all descriptors into a vocabulary
//! of visual words with seeded k-means++. Apply phase: assign each query
//! descriptor to its nearest word and emit the normalized word histogram.
//!
//! A fitted [`Vocabulary`] is immutable; retraining builds a new one.

use image::GrayImage;
use imageproc::corners::corners_fast9;
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::core::{ClassifierError, FeatureVector, Result};

/// Side length of the square patch sampled around each keypoint.
const PATCH_SIZE: u32 = 8;
/// FAST-9 intensity threshold.
const FAST_THRESHOLD: u8 = 20;
/// Below this many corners the detector falls back to a dense grid.
const MIN_KEYPOINTS: usize = 4;
/// Keypoint stride for the dense-grid fallback.
const GRID_STRIDE: u32 = 4;
const MAX_KMEANS_ITERATIONS: usize = 100;

/// A frozen vocabulary of visual words.
#[derive(Clone, Debug)]
pub struct Vocabulary {
    words: Vec<Vec<f64>>,
}

impl Vocabulary {
    /// Cluster descriptors from the full corpus into `size` words.
    ///
    /// Fails with a data error when the corpus yields fewer descriptors than
    /// requested words, since the histogram length could not be honored.
    pub fn fit(canvases: &[GrayImage], size: usize, seed: u64) -> Result<Self> {
        let mut pool: Vec<Vec<f64>> = Vec::new();
        for canvas in canvases {
            pool.extend(descriptors(canvas));
        }

        if pool.len() < size {
            return Err(ClassifierError::Data(format!(
                "corpus yields {} descriptors, fewer than the {} requested visual words",
                pool.len(),
                size
            )));
        }

        debug!(
            "clustering {} descriptors into {} visual words",
            pool.len(),
            size
        );
        let words = kmeans(&pool, size, seed);
        Ok(Self { words })
    }

    /// Number of words, i.e. the histogram length.
    pub fn size(&self) -> usize {
        self.words.len()
    }

    /// Word-frequency histogram of a canvas, normalized to sum 1.
    ///
    /// A canvas without usable descriptors (e.g. a flat image) yields the
    /// zero histogram.
    pub fn histogram(&self, canvas: &GrayImage) -> FeatureVector {
        let mut counts = vec![0usize; self.words.len()];
        let canvas_descriptors = descriptors(canvas);
        for descriptor in &canvas_descriptors {
            counts[nearest_word(&self.words, descriptor)] += 1;
        }

        let total = canvas_descriptors.len();
        let values = if total == 0 {
            vec![0.0; self.words.len()]
        } else {
            counts
                .into_iter()
                .map(|count| count as f64 / total as f64)
                .collect()
        };
        FeatureVector::new(values)
    }
}

/// Patch descriptors around every keypoint of a canvas.
fn descriptors(canvas: &GrayImage) -> Vec<Vec<f64>> {
    let side = patch_side(canvas);
    keypoints(canvas)
        .into_iter()
        .filter_map(|(x, y)| patch_descriptor(canvas, x, y, side))
        .collect()
}

/// Patch side, shrunk for canvases smaller than the default window.
fn patch_side(canvas: &GrayImage) -> u32 {
    PATCH_SIZE.min(canvas.width()).min(canvas.height())
}

/// FAST-9 corners, or a dense grid when the canvas is too plain or too
/// small for the detector to find enough of them.
fn keypoints(canvas: &GrayImage) -> Vec<(u32, u32)> {
    let corners = corners_fast9(canvas, FAST_THRESHOLD);
    if corners.len() >= MIN_KEYPOINTS {
        return corners.into_iter().map(|c| (c.x, c.y)).collect();
    }

    let mut grid = Vec::new();
    let mut y = 0;
    while y < canvas.height() {
        let mut x = 0;
        while x < canvas.width() {
            grid.push((x, y));
            x += GRID_STRIDE;
        }
        y += GRID_STRIDE;
    }
    grid
}

/// Mean-centered, L2-normalized intensity patch centered on `(cx, cy)`.
///
/// Returns `None` for flat patches, which carry no structure to cluster.
fn patch_descriptor(canvas: &GrayImage, cx: u32, cy: u32, side: u32) -> Option<Vec<f64>> {
    let left = cx
        .saturating_sub(side / 2)
        .min(canvas.width() - side);
    let top = cy
        .saturating_sub(side / 2)
        .min(canvas.height() - side);

    let mut values = Vec::with_capacity((side * side) as usize);
    for y in top..top + side {
        for x in left..left + side {
            values.push(canvas.get_pixel(x, y).0[0] as f64 / 255.0);
        }
    }

    let mean = values.iter().sum::<f64>() / values.len() as f64;
    for value in &mut values {
        *value -= mean;
    }

    let norm = values.iter().map(|v| v * v).sum::<f64>().sqrt();
    if norm < 1e-10 {
        return None;
    }
    for value in &mut values {
        *value /= norm;
    }
    Some(values)
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum()
}

fn nearest_word(words: &[Vec<f64>], descriptor: &[f64]) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (index, word) in words.iter().enumerate() {
        let distance = squared_distance(word, descriptor);
        if distance < best_distance {
            best_distance = distance;
            best = index;
        }
    }
    best
}

/// Seeded k-means with k-means++ initialization.
fn kmeans(descriptors: &[Vec<f64>], k: usize, seed: u64) -> Vec<Vec<f64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let dimension = descriptors[0].len();

    // k-means++ seeding: first centroid uniform, the rest weighted by
    // squared distance to the nearest chosen centroid.
    let mut centroids: Vec<Vec<f64>> = Vec::with_capacity(k);
    centroids.push(descriptors[rng.random_range(0..descriptors.len())].clone());

    while centroids.len() < k {
        let weights: Vec<f64> = descriptors
            .iter()
            .map(|d| {
                centroids
                    .iter()
                    .map(|c| squared_distance(c, d))
                    .fold(f64::INFINITY, f64::min)
            })
            .collect();
        let total: f64 = weights.iter().sum();

        if total <= 0.0 {
            // Every descriptor coincides with a centroid already.
            let index = centroids.len() % descriptors.len();
            centroids.push(descriptors[index].clone());
            continue;
        }

        let target = rng.random::<f64>() * total;
        let mut cumulative = 0.0;
        let mut selected = descriptors.len() - 1;
        for (index, &weight) in weights.iter().enumerate() {
            cumulative += weight;
            if cumulative >= target {
                selected = index;
                break;
            }
        }
        centroids.push(descriptors[selected].clone());
    }

    // Lloyd iterations until assignments stabilize.
    let mut assignments = vec![usize::MAX; descriptors.len()];
    for _ in 0..MAX_KMEANS_ITERATIONS {
        let next: Vec<usize> = descriptors
            .iter()
            .map(|d| nearest_word(&centroids, d))
            .collect();
        if next == assignments {
            break;
        }
        assignments = next;

        let mut sums = vec![vec![0.0; dimension]; k];
        let mut counts = vec![0usize; k];
        for (descriptor, &cluster) in descriptors.iter().zip(assignments.iter()) {
            counts[cluster] += 1;
            for (accumulator, &value) in sums[cluster].iter_mut().zip(descriptor.iter()) {
                *accumulator += value;
            }
        }

        for cluster in 0..k {
            if counts[cluster] > 0 {
                for value in &mut sums[cluster] {
                    *value /= counts[cluster] as f64;
                }
                centroids[cluster] = std::mem::take(&mut sums[cluster]);
            } else {
                // Re-seat an empty cluster on the descriptor farthest from
                // its current centroid; deterministic, no RNG involved.
                let mut farthest = 0;
                let mut farthest_distance = -1.0;
                for (index, descriptor) in descriptors.iter().enumerate() {
                    let distance =
                        squared_distance(descriptor, &centroids[assignments[index]]);
                    if distance > farthest_distance {
                        farthest_distance = distance;
                        farthest = index;
                    }
                }
                centroids[cluster] = descriptors[farthest].clone();
            }
        }
    }

    centroids
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use image::Luma;

    fn textured_canvas() -> GrayImage {
        GrayImage::from_fn(30, 30, |x, y| Luma([((x * 37 + y * 91) % 256) as u8]))
    }

    #[test]
    fn test_fit_produces_requested_size() {
        let canvases = vec![textured_canvas(), textured_canvas()];
        let vocabulary = Vocabulary::fit(&canvases, 5, 17).unwrap();
        assert_eq!(vocabulary.size(), 5);
    }

    #[test]
    fn test_fit_is_deterministic_per_seed() {
        let canvases = vec![textured_canvas()];
        let first = Vocabulary::fit(&canvases, 4, 99).unwrap();
        let second = Vocabulary::fit(&canvases, 4, 99).unwrap();
        assert_eq!(first.words, second.words);
    }

    #[test]
    fn test_fit_fails_without_enough_descriptors() {
        // A flat canvas yields no descriptors at all.
        let canvases = vec![GrayImage::from_pixel(30, 30, Luma([0]))];
        let result = Vocabulary::fit(&canvases, 3, 17);
        assert!(matches!(result, Err(ClassifierError::Data(_))));
    }

    #[test]
    fn test_histogram_length_and_normalization() {
        let canvases = vec![textured_canvas()];
        let vocabulary = Vocabulary::fit(&canvases, 6, 17).unwrap();

        let histogram = vocabulary.histogram(&textured_canvas());
        assert_eq!(histogram.len(), 6);

        let sum: f64 = histogram.as_slice().iter().sum();
        assert_relative_eq!(sum, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_flat_canvas_yields_zero_histogram() {
        let canvases = vec![textured_canvas()];
        let vocabulary = Vocabulary::fit(&canvases, 3, 17).unwrap();

        let histogram = vocabulary.histogram(&GrayImage::from_pixel(30, 30, Luma([128])));
        assert!(histogram.as_slice().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_grid_fallback_on_small_canvas() {
        // 6x12 is far too small for FAST-9 to find corners; the grid
        // fallback must still produce keypoints.
        let canvas = GrayImage::from_fn(6, 12, |x, y| Luma([((x + y) % 2 * 255) as u8]));
        assert!(!keypoints(&canvas).is_empty());
        assert!(!descriptors(&canvas).is_empty());
    }

    #[test]
    fn test_patch_descriptor_is_normalized() {
        let canvas = textured_canvas();
        let descriptor = patch_descriptor(&canvas, 15, 15, 8).unwrap();
        assert_eq!(descriptor.len(), 64);

        let norm: f64 = descriptor.iter().map(|v| v * v).sum::<f64>().sqrt();
        assert_relative_eq!(norm, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_flat_patch_is_rejected() {
        let canvas = GrayImage::from_pixel(10, 10, Luma([77]));
        assert!(patch_descriptor(&canvas, 5, 5, 8).is_none());
    }

    #[test]
    fn test_kmeans_centroid_count() {
        let data: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64, (i * 2) as f64]).collect();
        let centroids = kmeans(&data, 3, 1);
        assert_eq!(centroids.len(), 3);
    }
}
