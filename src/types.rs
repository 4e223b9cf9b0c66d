//! Core types for compositing requests and results

use crate::error::{BgRemovalError, Result};
use crate::utils::ColorParser;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An opaque RGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Self = Self::new(0, 0, 0);
    pub const WHITE: Self = Self::new(255, 255, 255);

    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Format as `#RRGGBB`
    #[must_use]
    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    #[must_use]
    pub fn to_rgb(self) -> image::Rgb<u8> {
        image::Rgb([self.r, self.g, self.b])
    }
}

impl FromStr for Color {
    type Err = BgRemovalError;

    fn from_str(s: &str) -> Result<Self> {
        ColorParser::parse_hex(s)
    }
}

/// Vertical gradient, `start` at the top row and `end` towards the bottom
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradientSpec {
    pub start: Color,
    pub end: Color,
}

/// Drop shadow parameters
///
/// The defaults reproduce the service's established look: a black shadow at
/// 80/255 opacity, blurred with a 10px Gaussian and shifted 5px right, 8px down.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowSpec {
    /// Shadow fill color
    pub color: Color,
    /// Fill opacity under a fully opaque mask pixel (0-255)
    pub opacity: u8,
    /// Gaussian blur radius (sigma) in pixels; 0 disables blurring
    pub blur_radius: f32,
    /// Horizontal and vertical shift of the shadow layer in pixels
    pub offset: (i32, i32),
}

impl Default for ShadowSpec {
    fn default() -> Self {
        Self {
            color: Color::BLACK,
            opacity: 80,
            blur_radius: 10.0,
            offset: (5, 8),
        }
    }
}

/// Background mode requested by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundMode {
    /// Keep the RGBA foreground as-is
    #[default]
    Transparent,
    /// Solid color backdrop
    Color,
    /// Vertical linear gradient backdrop
    Gradient,
}

impl BackgroundMode {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transparent => "transparent",
            Self::Color => "color",
            Self::Gradient => "gradient",
        }
    }

    /// Whether this mode produces an opaque backdrop
    #[must_use]
    pub fn has_background(&self) -> bool {
        !matches!(self, Self::Transparent)
    }
}

impl fmt::Display for BackgroundMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackgroundMode {
    type Err = BgRemovalError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "transparent" => Ok(Self::Transparent),
            "color" => Ok(Self::Color),
            "gradient" => Ok(Self::Gradient),
            other => Err(BgRemovalError::invalid_config(format!(
                "Unknown background type '{}'. Supported: transparent, color, gradient",
                other
            ))),
        }
    }
}

/// Fully resolved backdrop, produced from `ProcessingOptions`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backdrop {
    Transparent,
    Solid(Color),
    Gradient(GradientSpec),
}

/// Color mode of a raster image as seen by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    Rgb,
    Rgba,
    /// Any other layout (grayscale, 16-bit, float); converted at pipeline entry
    Other,
}

impl ColorMode {
    #[must_use]
    pub fn of(image: &DynamicImage) -> Self {
        match image {
            DynamicImage::ImageRgb8(_) => Self::Rgb,
            DynamicImage::ImageRgba8(_) => Self::Rgba,
            _ => Self::Other,
        }
    }
}

pub const DEFAULT_MODEL: &str = "general";
pub const DEFAULT_BG_COLOR: &str = "#FFFFFF";
pub const DEFAULT_GRADIENT_START: &str = "#667EEA";
pub const DEFAULT_GRADIENT_END: &str = "#764BA2";

/// Per-request processing options
///
/// Color fields hold the raw strings sent by the caller and are only parsed
/// when the selected background mode needs them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProcessingOptions {
    /// Model variant key; unknown keys fall back to the registry default
    pub model: String,
    #[serde(rename = "bgType")]
    pub background_mode: BackgroundMode,
    pub shadow: bool,
    pub bg_color: String,
    pub gradient_start: String,
    pub gradient_end: String,
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            background_mode: BackgroundMode::Transparent,
            shadow: false,
            bg_color: DEFAULT_BG_COLOR.to_string(),
            gradient_start: DEFAULT_GRADIENT_START.to_string(),
            gradient_end: DEFAULT_GRADIENT_END.to_string(),
        }
    }
}

impl ProcessingOptions {
    #[must_use]
    pub fn builder() -> ProcessingOptionsBuilder {
        ProcessingOptionsBuilder::default()
    }

    /// Parse the color fields relevant to the selected mode
    ///
    /// # Errors
    /// - `InvalidColorFormat` if a relevant color string is malformed
    pub fn resolve_backdrop(&self) -> Result<Backdrop> {
        match self.background_mode {
            BackgroundMode::Transparent => Ok(Backdrop::Transparent),
            BackgroundMode::Color => Ok(Backdrop::Solid(ColorParser::parse_hex(&self.bg_color)?)),
            BackgroundMode::Gradient => Ok(Backdrop::Gradient(GradientSpec {
                start: ColorParser::parse_hex(&self.gradient_start)?,
                end: ColorParser::parse_hex(&self.gradient_end)?,
            })),
        }
    }

    /// Shadow is only meaningful on top of an opaque backdrop
    #[must_use]
    pub fn wants_shadow(&self) -> bool {
        self.shadow && self.background_mode.has_background()
    }
}

/// Builder for `ProcessingOptions`
#[derive(Debug, Default)]
pub struct ProcessingOptionsBuilder {
    options: ProcessingOptions,
}

impl ProcessingOptionsBuilder {
    #[must_use]
    pub fn model<S: Into<String>>(mut self, model: S) -> Self {
        self.options.model = model.into();
        self
    }

    #[must_use]
    pub fn background_mode(mut self, mode: BackgroundMode) -> Self {
        self.options.background_mode = mode;
        self
    }

    #[must_use]
    pub fn shadow(mut self, shadow: bool) -> Self {
        self.options.shadow = shadow;
        self
    }

    /// Select a solid color backdrop
    #[must_use]
    pub fn solid<S: Into<String>>(mut self, color: S) -> Self {
        self.options.background_mode = BackgroundMode::Color;
        self.options.bg_color = color.into();
        self
    }

    /// Select a gradient backdrop
    #[must_use]
    pub fn gradient<S: Into<String>, E: Into<String>>(mut self, start: S, end: E) -> Self {
        self.options.background_mode = BackgroundMode::Gradient;
        self.options.gradient_start = start.into();
        self.options.gradient_end = end.into();
        self
    }

    #[must_use]
    pub fn build(self) -> ProcessingOptions {
        self.options
    }
}

/// Why a stage fell back instead of applying its normal behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FallbackReason {
    /// The requested model key is not registered; the default variant was used
    UnknownModelVariant { requested: String, used: String },
    /// The foreground has no alpha channel, so no shadow can be derived
    ForegroundWithoutAlpha,
    /// Shadow synthesis failed internally; the pre-shadow image was kept
    ShadowSynthesisFailed(String),
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownModelVariant { requested, used } => {
                write!(f, "unknown model variant '{}', using '{}'", requested, used)
            },
            Self::ForegroundWithoutAlpha => write!(f, "foreground has no alpha channel"),
            Self::ShadowSynthesisFailed(msg) => write!(f, "shadow synthesis failed: {}", msg),
        }
    }
}

/// Result of a stage that never fails but may fall back
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome<T> {
    Applied(T),
    Fallback { value: T, reason: FallbackReason },
}

impl<T> StageOutcome<T> {
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }

    #[must_use]
    pub fn fallback_reason(&self) -> Option<&FallbackReason> {
        match self {
            Self::Applied(_) => None,
            Self::Fallback { reason, .. } => Some(reason),
        }
    }

    #[must_use]
    pub fn value(&self) -> &T {
        match self {
            Self::Applied(value) | Self::Fallback { value, .. } => value,
        }
    }

    /// Split into the value and the fallback reason, if any
    pub fn into_parts(self) -> (T, Option<FallbackReason>) {
        match self {
            Self::Applied(value) => (value, None),
            Self::Fallback { value, reason } => (value, Some(reason)),
        }
    }

    pub fn into_inner(self) -> T {
        self.into_parts().0
    }
}

/// Pipeline states, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Received,
    Downscaled,
    Segmented,
    Restored,
    BackgroundApplied,
    ShadowApplied,
    Encoded,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Received => "received",
            Self::Downscaled => "downscaled",
            Self::Segmented => "segmented",
            Self::Restored => "restored",
            Self::BackgroundApplied => "background_applied",
            Self::ShadowApplied => "shadow_applied",
            Self::Encoded => "encoded",
        };
        f.write_str(name)
    }
}

/// Per-stage timings in milliseconds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessingTimings {
    pub resize_ms: u64,
    pub segmentation_ms: u64,
    pub restore_ms: u64,
    pub background_ms: u64,
    pub shadow_ms: u64,
    pub total_ms: u64,
}

/// Output of a completed pipeline run
#[derive(Debug, Clone)]
pub struct PipelineResult {
    /// Final composited image (RGBA for transparent mode, RGB otherwise)
    pub image: DynamicImage,
    pub original_width: u32,
    pub original_height: u32,
    pub background_mode: BackgroundMode,
    pub has_background: bool,
    /// Model variant that actually ran
    pub model: String,
    /// Silent fallbacks taken during the run
    pub fallbacks: Vec<FallbackReason>,
    /// States visited, in order
    pub stages: Vec<PipelineStage>,
    pub timings: ProcessingTimings,
}

impl PipelineResult {
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }

    #[must_use]
    pub fn used_fallback(&self) -> bool {
        !self.fallbacks.is_empty()
    }
}
