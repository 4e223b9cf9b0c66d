//! Image to tensor conversion for segmentation models

use crate::{
    error::{BgRemovalError, Result},
    models::PreprocessingConfig,
};
use image::{imageops::FilterType, RgbImage};
use ndarray::Array4;

/// Shared image preprocessing utilities
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// Preprocess an RGB image for model inference
    ///
    /// The image is stretched to the model input size without preserving the
    /// aspect ratio, which matches how the U2-Net family was trained. The mask
    /// is later stretched back, so no padding bookkeeping is needed.
    ///
    /// # Errors
    /// - Zero-sized input image or model input size
    pub fn preprocess_for_inference(
        image: &RgbImage,
        preprocessing_config: &PreprocessingConfig,
    ) -> Result<Array4<f32>> {
        let [target_width, target_height] = preprocessing_config.target_size;
        if target_width == 0 || target_height == 0 {
            return Err(BgRemovalError::processing(
                "Model input size must be non-zero",
            ));
        }
        if image.width() == 0 || image.height() == 0 {
            return Err(BgRemovalError::processing_stage_error(
                "preprocessing",
                "image has zero width or height",
                Some(&format!("{}x{}", image.width(), image.height())),
            ));
        }

        let resized = if image.dimensions() == (target_width, target_height) {
            image.clone()
        } else {
            image::imageops::resize(image, target_width, target_height, FilterType::Lanczos3)
        };

        Ok(Self::canvas_to_tensor(&resized, preprocessing_config))
    }

    /// Convert canvas to normalized NCHW tensor
    fn canvas_to_tensor(canvas: &RgbImage, preprocessing_config: &PreprocessingConfig) -> Array4<f32> {
        let (width, height) = canvas.dimensions();
        let mean = preprocessing_config.normalization_mean;
        let std = preprocessing_config.normalization_std;

        let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

        #[allow(clippy::indexing_slicing)]
        // Safe: tensor dimensions pre-allocated to match canvas size
        for (x, y, pixel) in canvas.enumerate_pixels() {
            for channel in 0..3 {
                let value = f32::from(pixel[channel]) / 255.0;
                tensor[[0, channel, y as usize, x as usize]] = (value - mean[channel]) / std[channel];
            }
        }

        tensor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn config(size: u32) -> PreprocessingConfig {
        PreprocessingConfig {
            target_size: [size, size],
            ..PreprocessingConfig::default()
        }
    }

    #[test]
    fn test_preprocess_stretches_to_model_size() {
        let image = RgbImage::from_pixel(100, 40, Rgb([255, 0, 0]));
        let tensor = ImagePreprocessor::preprocess_for_inference(&image, &config(64)).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 64, 64]);
    }

    #[test]
    fn test_preprocess_normalizes_channels() {
        let image = RgbImage::from_pixel(8, 8, Rgb([255, 0, 0]));
        let cfg = config(8);
        let tensor = ImagePreprocessor::preprocess_for_inference(&image, &cfg).unwrap();

        let expected_r = (1.0 - cfg.normalization_mean[0]) / cfg.normalization_std[0];
        let expected_g = (0.0 - cfg.normalization_mean[1]) / cfg.normalization_std[1];
        assert!((tensor[[0, 0, 3, 3]] - expected_r).abs() < 1e-5);
        assert!((tensor[[0, 1, 3, 3]] - expected_g).abs() < 1e-5);
    }

    #[test]
    fn test_preprocess_rejects_empty_image() {
        let image = RgbImage::new(0, 10);
        assert!(ImagePreprocessor::preprocess_for_inference(&image, &config(32)).is_err());
    }
}
