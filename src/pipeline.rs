//! Compositing pipeline orchestration
//!
//! A request moves through `Received → Downscaled → Segmented → Restored →
//! BackgroundApplied → [ShadowApplied] → Encoded`. Options are resolved before
//! any pixel work so malformed colors never reach the segmentation model.

use crate::{
    compose::{flatten_onto, BackgroundSynthesizer, Compositor, ResizeManager, ShadowRenderer},
    config::PipelineConfig,
    error::{BgRemovalError, Result},
    models::ModelRegistry,
    services::OutputEncoder,
    types::{ColorMode, PipelineResult, PipelineStage, ProcessingOptions, ProcessingTimings},
};
use image::{DynamicImage, ImageReader, Limits, Rgb, RgbImage};
use instant::Instant;
use log::{debug, info, warn};
use std::io::Cursor;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{instrument, span, Level};

/// Color RGBA inputs are flattened onto before segmentation
const FLATTEN_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

/// Encoded pipeline output
#[derive(Debug, Clone)]
pub struct EncodedOutput {
    /// `data:image/png;base64,...`
    pub data_uri: String,
    /// Size of the PNG payload in bytes
    pub png_size: usize,
    pub result: PipelineResult,
}

/// Runs segmentation and compositing for individual requests
///
/// The pipeline holds no per-request state and can be shared between workers.
#[derive(Debug, Clone)]
pub struct CompositingPipeline {
    config: PipelineConfig,
    registry: Arc<ModelRegistry>,
    resizer: ResizeManager,
    shadow: ShadowRenderer,
}

impl CompositingPipeline {
    /// # Errors
    /// - Invalid pipeline configuration
    pub fn new(config: PipelineConfig, registry: Arc<ModelRegistry>) -> Result<Self> {
        config.validate()?;
        let resizer = ResizeManager::new(config.max_dimension)?;
        let shadow = ShadowRenderer::new(config.shadow);

        Ok(Self {
            config,
            registry,
            resizer,
            shadow,
        })
    }

    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    /// Decode an encoded image and process it
    ///
    /// The header is inspected first so oversized inputs are rejected before
    /// any pixel buffer is allocated.
    ///
    /// # Errors
    /// - `ResourceExhausted` for inputs above the configured pixel limit
    /// - Unknown or corrupt image data
    /// - Any error from [`CompositingPipeline::process`]
    pub fn process_bytes(&self, bytes: &[u8], options: &ProcessingOptions) -> Result<PipelineResult> {
        if bytes.is_empty() {
            return Err(BgRemovalError::MissingInput);
        }

        let (width, height) = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()?
            .into_dimensions()
            .map_err(BgRemovalError::from_decode)?;
        self.check_pixel_budget(width, height)?;

        let mut reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
        reader.limits(self.decode_limits());
        let image = reader.decode().map_err(BgRemovalError::from_decode)?;

        debug!("📥 Decoded {}x{} {:?} input", width, height, image.color());
        self.process(image, options)
    }

    /// Read an encoded image from an async reader and process it
    ///
    /// # Errors
    /// - Read failures
    /// - Any error from [`CompositingPipeline::process_bytes`]
    pub async fn process_reader<R: AsyncRead + Unpin>(
        &self,
        mut reader: R,
        options: &ProcessingOptions,
    ) -> Result<PipelineResult> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).await?;
        self.process_bytes(&bytes, options)
    }

    /// Run the full pipeline on a decoded image
    ///
    /// # Errors
    /// - `InvalidColorFormat` for malformed colors of the selected background mode
    /// - `ResourceExhausted` for inputs above the pixel limit or out-of-memory inference
    /// - Segmentation failures
    #[instrument(
        skip(self, image, options),
        fields(
            width = image.width(),
            height = image.height(),
            bg_type = %options.background_mode,
            model = %options.model
        )
    )]
    pub fn process(&self, image: DynamicImage, options: &ProcessingOptions) -> Result<PipelineResult> {
        let total_start = Instant::now();
        let mut timings = ProcessingTimings::default();
        let mut stages = vec![PipelineStage::Received];
        let mut fallbacks = Vec::new();

        let (original_width, original_height) = (image.width(), image.height());
        if original_width == 0 || original_height == 0 {
            return Err(BgRemovalError::processing_stage_error(
                "received",
                "image has zero width or height",
                Some(&format!("{}x{}", original_width, original_height)),
            ));
        }
        self.check_pixel_budget(original_width, original_height)?;

        // Resolve everything that can fail on bad input before touching pixels
        let backdrop = options.resolve_backdrop()?;
        let (selection, model_fallback) = self.registry.resolve(&options.model).into_parts();
        if let Some(reason) = model_fallback {
            warn!("⚠️ {}", reason);
            fallbacks.push(reason);
        }

        info!(
            "🎯 Processing {}x{} image (model: {}, background: {})",
            original_width, original_height, selection.name, options.background_mode
        );

        // Received → Downscaled
        let working = {
            let _span = span!(Level::DEBUG, "downscale", max_dimension = self.resizer.max_dimension())
                .entered();
            let start = Instant::now();
            let downscaled = self.resizer.downscale(image);
            let rgb = to_rgb(downscaled.image);
            timings.resize_ms = start.elapsed().as_millis() as u64;
            rgb
        };
        stages.push(PipelineStage::Downscaled);

        // Downscaled → Segmented
        let foreground = {
            let _span = span!(
                Level::INFO,
                "segmentation",
                model = %selection.name,
                width = working.width(),
                height = working.height()
            )
            .entered();
            let start = Instant::now();
            let foreground = selection.handle.segment(&working)?;
            if foreground.dimensions() != working.dimensions() {
                return Err(BgRemovalError::processing_stage_error(
                    "segmentation",
                    &format!(
                        "model '{}' returned {}x{} for a {}x{} input",
                        selection.name,
                        foreground.width(),
                        foreground.height(),
                        working.width(),
                        working.height()
                    ),
                    None,
                ));
            }
            timings.segmentation_ms = start.elapsed().as_millis() as u64;
            foreground
        };
        drop(working);
        stages.push(PipelineStage::Segmented);

        // Segmented → Restored
        let foreground = {
            let _span = span!(Level::DEBUG, "restore").entered();
            let start = Instant::now();
            let restored = self.resizer.restore(
                DynamicImage::ImageRgba8(foreground),
                original_width,
                original_height,
            );
            timings.restore_ms = start.elapsed().as_millis() as u64;
            restored.into_rgba8()
        };
        stages.push(PipelineStage::Restored);

        // Restored → BackgroundApplied
        let start = Instant::now();
        let composited = {
            let _span = span!(Level::DEBUG, "background", mode = %options.background_mode).entered();
            match BackgroundSynthesizer::synthesize(original_width, original_height, &backdrop) {
                Some(backdrop_image) => {
                    let composited = Compositor::composite_over(&backdrop_image, &foreground, (0, 0));
                    drop(backdrop_image);
                    Some(composited)
                },
                None => None,
            }
        };
        timings.background_ms = start.elapsed().as_millis() as u64;
        stages.push(PipelineStage::BackgroundApplied);

        let image = match composited {
            None => DynamicImage::ImageRgba8(foreground),
            Some(composited) if options.wants_shadow() => {
                // BackgroundApplied → ShadowApplied
                let spec = self.shadow.spec();
                let _span = span!(
                    Level::DEBUG,
                    "shadow",
                    blur_radius = spec.blur_radius,
                    dx = spec.offset.0,
                    dy = spec.offset.1
                )
                .entered();
                let start = Instant::now();
                let outcome = self
                    .shadow
                    .render(DynamicImage::ImageRgb8(composited), &DynamicImage::ImageRgba8(foreground));
                timings.shadow_ms = start.elapsed().as_millis() as u64;

                let (image, reason) = outcome.into_parts();
                match reason {
                    Some(reason) => fallbacks.push(reason),
                    None => stages.push(PipelineStage::ShadowApplied),
                }
                image
            },
            Some(composited) => DynamicImage::ImageRgb8(composited),
        };

        timings.total_ms = total_start.elapsed().as_millis() as u64;
        info!(
            "✅ Processed {}x{} image in {}ms (segmentation {}ms)",
            original_width, original_height, timings.total_ms, timings.segmentation_ms
        );

        Ok(PipelineResult {
            image,
            original_width,
            original_height,
            background_mode: options.background_mode,
            has_background: options.background_mode.has_background(),
            model: selection.name,
            fallbacks,
            stages,
            timings,
        })
    }

    /// Encode a finished result as a PNG data URI
    ///
    /// # Errors
    /// - PNG encoder failures
    pub fn encode(&self, mut result: PipelineResult) -> Result<EncodedOutput> {
        let _span = span!(Level::DEBUG, "encode").entered();
        let png = OutputEncoder::encode_png(&result.image, self.config.png_compression)?;
        let png_size = png.len();
        let data_uri = OutputEncoder::to_data_uri(&png, crate::services::PNG_MIME);
        drop(png);

        result.stages.push(PipelineStage::Encoded);
        debug!("📦 Encoded {} byte PNG", png_size);

        Ok(EncodedOutput {
            data_uri,
            png_size,
            result,
        })
    }

    /// Decode, process and encode in one call
    ///
    /// # Errors
    /// - Any error from [`CompositingPipeline::process_bytes`] or [`CompositingPipeline::encode`]
    pub fn process_bytes_to_data_uri(
        &self,
        bytes: &[u8],
        options: &ProcessingOptions,
    ) -> Result<EncodedOutput> {
        let result = self.process_bytes(bytes, options)?;
        self.encode(result)
    }

    fn check_pixel_budget(&self, width: u32, height: u32) -> Result<()> {
        let pixels = u64::from(width) * u64::from(height);
        if pixels > self.config.max_input_pixels {
            return Err(BgRemovalError::resource_exhausted(format!(
                "{}x{} image has {} pixels, limit is {}",
                width, height, pixels, self.config.max_input_pixels
            )));
        }
        Ok(())
    }

    fn decode_limits(&self) -> Limits {
        let mut limits = Limits::default();
        // 16-bit RGBA plus one working copy
        limits.max_alloc = Some(self.config.max_input_pixels.saturating_mul(16));
        limits
    }
}

/// Convert the working image to RGB for segmentation
///
/// RGB input is returned as-is; alpha is flattened onto white.
fn to_rgb(image: DynamicImage) -> RgbImage {
    match ColorMode::of(&image) {
        ColorMode::Rgb => image.into_rgb8(),
        ColorMode::Rgba => flatten_onto(&image.into_rgba8(), FLATTEN_COLOR),
        ColorMode::Other if image.color().has_alpha() => {
            flatten_onto(&image.to_rgba8(), FLATTEN_COLOR)
        },
        ColorMode::Other => image.to_rgb8(),
    }
}
