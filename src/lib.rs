#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]

//! # Background Removal and Compositing
//!
//! Removes the background from a photo with a U2-Net style salient object
//! segmentation model and composites the cut-out foreground onto a
//! transparent, solid color or vertical gradient backdrop, optionally with a
//! soft drop shadow. The result is returned as a PNG data URI.
//!
//! ## Pipeline
//!
//! 1. Resolve the backdrop and the model variant (unknown variants fall back to
//!    the default and are reported, never rejected)
//! 2. Downscale inputs whose longest side exceeds the configured ceiling
//! 3. Segment the foreground into an RGBA cut-out
//! 4. Restore the original resolution
//! 5. Synthesize and composite the backdrop
//! 6. Optionally render a drop shadow behind the foreground
//! 7. Encode to PNG and wrap in a `data:` URI
//!
//! ## Features
//!
//! - **Multiple Variants**: Any number of named ONNX models (`general`, `fast`, ...)
//! - **Pure Rust Inference**: Tract backend, no native runtime needed
//! - **Explicit Fallbacks**: Every degraded stage is reported in the result
//! - **HTTP Service**: Optional `server` feature with CORS allow-listing
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bgremove_compose::{
//!     BackgroundMode, CompositingPipeline, ModelRegistry, ModelVariantConfig,
//!     PipelineConfig, ProcessingOptions,
//! };
//! use std::sync::Arc;
//!
//! # fn example(upload: &[u8]) -> anyhow::Result<()> {
//! let registry = ModelRegistry::builder()
//!     .load_variant(&ModelVariantConfig::new("general", "models/u2net.onnx"))?
//!     .build()?;
//! let pipeline = CompositingPipeline::new(PipelineConfig::default(), Arc::new(registry))?;
//!
//! let options = ProcessingOptions::builder()
//!     .background_mode(BackgroundMode::Gradient)
//!     .shadow(true)
//!     .build();
//! let output = pipeline.process_bytes_to_data_uri(upload, &options)?;
//! println!("{}", &output.data_uri[..40]);
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `tract` (default): Pure Rust ONNX inference
//! - `server` (default): HTTP service and the `bgremove-server` binary
//! - `tracing-json`: JSON log output for the service

pub mod backends;
pub mod compose;
pub mod config;
pub mod error;
pub mod inference;
pub mod models;
pub mod pipeline;
pub mod segmentation;
#[cfg(feature = "server")]
pub mod server;
pub mod services;
#[cfg(feature = "server")]
pub mod tracing_config;
pub mod types;
pub mod utils;

use tokio::io::AsyncRead;

pub use backends::MockBackend;
#[cfg(feature = "tract")]
pub use backends::TractBackend;
pub use compose::{BackgroundSynthesizer, Compositor, ResizeManager, ShadowRenderer};
pub use config::{PipelineConfig, PngCompression};
pub use error::{BgRemovalError, ErrorKind, Result};
pub use inference::InferenceBackend;
pub use models::{ModelRegistry, ModelVariantConfig};
pub use pipeline::{CompositingPipeline, EncodedOutput};
pub use segmentation::{ModelHandle, SegmentationCapability};
pub use services::OutputEncoder;
pub use types::{
    Backdrop, BackgroundMode, Color, FallbackReason, GradientSpec, PipelineResult,
    PipelineStage, ProcessingOptions, ShadowSpec, StageOutcome,
};
pub use utils::ColorParser;

/// Remove the background from an async reader and return a PNG data URI
///
/// Reads the whole stream, then runs decode, segmentation, compositing and
/// encoding on the given pipeline.
///
/// # Examples
///
/// ```rust,no_run
/// use bgremove_compose::{remove_background_from_reader, CompositingPipeline, ProcessingOptions};
/// use tokio::fs::File;
///
/// # async fn example(pipeline: &CompositingPipeline) -> anyhow::Result<()> {
/// let file = File::open("portrait.jpg").await?;
/// let output = remove_background_from_reader(file, pipeline, &ProcessingOptions::default()).await?;
/// assert!(output.data_uri.starts_with("data:image/png;base64,"));
/// # Ok(())
/// # }
/// ```
pub async fn remove_background_from_reader<R: AsyncRead + Unpin>(
    reader: R,
    pipeline: &CompositingPipeline,
    options: &ProcessingOptions,
) -> Result<EncodedOutput> {
    let result = pipeline.process_reader(reader, options).await?;
    pipeline.encode(result)
}

/// Remove the background from encoded image bytes and return a PNG data URI
pub fn remove_background_from_bytes(
    image_bytes: &[u8],
    pipeline: &CompositingPipeline,
    options: &ProcessingOptions,
) -> Result<EncodedOutput> {
    pipeline.process_bytes_to_data_uri(image_bytes, options)
}
