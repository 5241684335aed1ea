//! Raw pixel intensity features
//!
//! Flattens the canvas row-major into one value per sample, scaled to
//! `[0, 1]`. Pure function of the canvas, no fitting state.

use image::GrayImage;

use crate::core::FeatureVector;

/// Vector length = canvas width * height (single grayscale channel).
pub fn extract(canvas: &GrayImage) -> FeatureVector {
    let values = canvas
        .as_raw()
        .iter()
        .map(|&intensity| intensity as f64 / 255.0)
        .collect();
    FeatureVector::new(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_length_is_width_times_height() {
        let canvas = GrayImage::from_pixel(6, 12, Luma([0]));
        assert_eq!(extract(&canvas).len(), 72);
    }

    #[test]
    fn test_values_scaled_to_unit_range() {
        let canvas = GrayImage::from_pixel(2, 2, Luma([255]));
        let vector = extract(&canvas);
        assert!(vector.as_slice().iter().all(|&v| v == 1.0));

        let black = GrayImage::from_pixel(2, 2, Luma([0]));
        assert!(extract(&black).as_slice().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_row_major_order() {
        let mut canvas = GrayImage::from_pixel(3, 2, Luma([0]));
        canvas.put_pixel(2, 0, Luma([255]));
        canvas.put_pixel(0, 1, Luma([51]));

        let vector = extract(&canvas);
        assert_eq!(vector.as_slice()[2], 1.0);
        assert_eq!(vector.as_slice()[3], 0.2);
    }

    #[test]
    fn test_pure_function() {
        let canvas = GrayImage::from_pixel(4, 4, Luma([100]));
        assert_eq!(extract(&canvas), extract(&canvas));
    }
}
