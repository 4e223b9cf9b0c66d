//! Foreground segmentation
//!
//! `SegmentationCapability` is the seam between the compositing pipeline and
//! whatever produces a foreground-with-alpha. `ModelHandle` is the production
//! implementation: it runs an [`InferenceBackend`] behind a mutex and handles
//! tensor pre- and postprocessing.

use crate::{
    error::{BgRemovalError, Result},
    inference::InferenceBackend,
    models::{ModelInfo, PreprocessingConfig},
    utils::ImagePreprocessor,
};
use image::{imageops::FilterType, GrayImage, Luma, Rgba, RgbImage, RgbaImage};
use log::{debug, info};
use ndarray::Array4;
use std::fmt;
use std::sync::Mutex;
use tracing::instrument;

/// Produces an RGBA foreground from an RGB image
///
/// Implementations must return an image with exactly the input dimensions.
/// Handles are shared across request workers, so implementations are
/// `Send + Sync`; `ModelHandle` serializes concurrent calls so that one
/// handle serves one in-flight inference at a time.
pub trait SegmentationCapability: Send + Sync {
    /// Name of the underlying model variant
    fn name(&self) -> &str;

    /// Segment the foreground, returning it with the mask as alpha
    ///
    /// # Errors
    /// - Inference failures
    /// - `ResourceExhausted` when the backend runs out of memory
    fn segment(&self, image: &RgbImage) -> Result<RgbaImage>;
}

/// A loaded model variant with its inference backend
pub struct ModelHandle {
    name: String,
    backend: Mutex<Box<dyn InferenceBackend + Send>>,
    preprocessing: PreprocessingConfig,
    info: ModelInfo,
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHandle")
            .field("name", &self.name)
            .field("preprocessing", &self.preprocessing)
            .finish_non_exhaustive()
    }
}

impl ModelHandle {
    /// Initialize the backend and wrap it in a shareable handle
    ///
    /// # Errors
    /// - Backend initialization failures
    pub fn new<S: Into<String>>(name: S, mut backend: Box<dyn InferenceBackend + Send>) -> Result<Self> {
        let name = name.into();
        let load_time = backend.initialize()?;
        let preprocessing = backend.preprocessing_config()?;
        let info = backend.model_info()?;
        if let Some(load_time) = load_time {
            info!(
                "🧠 Model '{}' ready in {}ms ({} {}, {:.1} MB)",
                name,
                load_time.as_millis(),
                info.name,
                info.precision,
                info.size_bytes as f64 / (1024.0 * 1024.0)
            );
        }

        Ok(Self {
            name,
            backend: Mutex::new(backend),
            preprocessing,
            info,
        })
    }

    /// Metadata reported by the backend once it was initialized
    #[must_use]
    pub fn model_info(&self) -> &ModelInfo {
        &self.info
    }

    #[must_use]
    pub fn preprocessing_config(&self) -> &PreprocessingConfig {
        &self.preprocessing
    }

    fn run_inference(&self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let mut backend = self.backend.lock().map_err(|_| {
            BgRemovalError::internal(format!("Model '{}' lock poisoned", self.name))
        })?;
        backend.infer(input)
    }
}

impl SegmentationCapability for ModelHandle {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self, image), fields(model = %self.name, width = image.width(), height = image.height()))]
    fn segment(&self, image: &RgbImage) -> Result<RgbaImage> {
        let input = ImagePreprocessor::preprocess_for_inference(image, &self.preprocessing)?;
        let output = self.run_inference(&input)?;
        drop(input);

        let mask = tensor_to_mask(&output, image.dimensions())?;
        debug!("🎭 Mask generated for {}x{} input", image.width(), image.height());
        apply_mask(image, &mask)
    }
}

/// Convert the first output channel into a mask at the given size
///
/// Values are min-max normalized. A constant output keeps its clamped raw value
/// so an all-foreground or all-background prediction stays meaningful.
///
/// # Errors
/// - Output tensor not shaped `(1, C, H, W)` with `C >= 1`
/// - Empty tensor or target dimensions
#[allow(clippy::get_first)]
pub fn tensor_to_mask(tensor: &Array4<f32>, dimensions: (u32, u32)) -> Result<GrayImage> {
    let shape = tensor.shape();
    let batch = shape.get(0).copied().unwrap_or(0);
    let channels = shape.get(1).copied().unwrap_or(0);
    let mask_height = shape.get(2).copied().unwrap_or(0);
    let mask_width = shape.get(3).copied().unwrap_or(0);

    if batch != 1 || channels == 0 || mask_height == 0 || mask_width == 0 {
        return Err(BgRemovalError::processing(format!(
            "Invalid output tensor shape {:?}",
            shape
        )));
    }
    let (width, height) = dimensions;
    if width == 0 || height == 0 {
        return Err(BgRemovalError::processing("Mask target size must be non-zero"));
    }

    let channel = tensor.slice(ndarray::s![0, 0, .., ..]);
    let (min, max) = channel
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let range = max - min;

    let to_byte = |value: f32| -> u8 {
        let normalized = if range > f32::EPSILON {
            (value - min) / range
        } else {
            value
        };
        (normalized.clamp(0.0, 1.0) * 255.0).round() as u8
    };

    let raw = GrayImage::from_fn(mask_width as u32, mask_height as u32, |x, y| {
        let value = channel
            .get((y as usize, x as usize))
            .copied()
            .unwrap_or(0.0);
        Luma([to_byte(value)])
    });

    if raw.dimensions() == dimensions {
        return Ok(raw);
    }
    Ok(image::imageops::resize(&raw, width, height, FilterType::Lanczos3))
}

/// Attach a mask as the alpha channel of an RGB image
///
/// # Errors
/// - Mask and image dimensions differ
pub fn apply_mask(image: &RgbImage, mask: &GrayImage) -> Result<RgbaImage> {
    if image.dimensions() != mask.dimensions() {
        return Err(BgRemovalError::processing_stage_error(
            "mask application",
            &format!(
                "mask is {}x{} but image is {}x{}",
                mask.width(),
                mask.height(),
                image.width(),
                image.height()
            ),
            None,
        ));
    }

    Ok(RgbaImage::from_fn(image.width(), image.height(), |x, y| {
        let alpha = mask.get_pixel(x, y)[0];
        if alpha == 0 {
            Rgba([0, 0, 0, 0])
        } else {
            let pixel = image.get_pixel(x, y);
            Rgba([pixel[0], pixel[1], pixel[2], alpha])
        }
    }))
}
