//! Configuration for the compositing pipeline

use crate::compose::resize::DEFAULT_MAX_DIMENSION;
use crate::error::{BgRemovalError, Result};
use crate::types::ShadowSpec;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Largest accepted `max_dimension`
pub const MAX_DIMENSION_LIMIT: u32 = 16_384;

/// Default ceiling on decoded input pixels (roughly 8K x 5K)
pub const DEFAULT_MAX_INPUT_PIXELS: u64 = 40_000_000;

/// PNG compression effort for the final encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PngCompression {
    Fast,
    #[default]
    Default,
    Best,
}

impl std::fmt::Display for PngCompression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fast => write!(f, "fast"),
            Self::Default => write!(f, "default"),
            Self::Best => write!(f, "best"),
        }
    }
}

/// Pipeline configuration shared by all requests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Longest side fed to segmentation; larger inputs are downscaled and restored
    pub max_dimension: u32,

    /// Inputs with more pixels than this are rejected as too large
    pub max_input_pixels: u64,

    /// Drop shadow appearance
    pub shadow: ShadowSpec,

    /// PNG compression effort
    pub png_compression: PngCompression,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_dimension: DEFAULT_MAX_DIMENSION,
            max_input_pixels: DEFAULT_MAX_INPUT_PIXELS,
            shadow: ShadowSpec::default(),
            png_compression: PngCompression::Default,
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration builder
    #[must_use]
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Load a configuration from a JSON file; missing fields take their defaults
    ///
    /// # Errors
    /// - File cannot be read
    /// - Invalid JSON or field types
    /// - Values out of range (see [`PipelineConfig::validate`])
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents).map_err(|e| {
            BgRemovalError::invalid_config(format!(
                "Failed to parse pipeline config {}: {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    /// - `max_dimension` outside 1-16384
    /// - `max_input_pixels` of zero
    /// - Negative or non-finite shadow blur radius
    pub fn validate(&self) -> Result<()> {
        if self.max_dimension == 0 || self.max_dimension > MAX_DIMENSION_LIMIT {
            return Err(BgRemovalError::config_value_error(
                "max dimension",
                self.max_dimension,
                "1-16384",
                Some(DEFAULT_MAX_DIMENSION),
            ));
        }

        if self.max_input_pixels == 0 {
            return Err(BgRemovalError::config_value_error(
                "max input pixels",
                self.max_input_pixels,
                "1 or more",
                Some(DEFAULT_MAX_INPUT_PIXELS),
            ));
        }

        let blur = self.shadow.blur_radius;
        if !blur.is_finite() || blur < 0.0 {
            return Err(BgRemovalError::config_value_error(
                "shadow blur radius",
                blur,
                "0.0 or more",
                Some(10.0),
            ));
        }

        Ok(())
    }
}

/// Builder for `PipelineConfig`
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// Set the downscale ceiling
    #[must_use]
    pub fn max_dimension(mut self, max_dimension: u32) -> Self {
        self.config.max_dimension = max_dimension;
        self
    }

    /// Set the input pixel limit
    #[must_use]
    pub fn max_input_pixels(mut self, max_input_pixels: u64) -> Self {
        self.config.max_input_pixels = max_input_pixels;
        self
    }

    /// Set shadow parameters
    #[must_use]
    pub fn shadow(mut self, shadow: ShadowSpec) -> Self {
        self.config.shadow = shadow;
        self
    }

    #[must_use]
    pub fn png_compression(mut self, compression: PngCompression) -> Self {
        self.config.png_compression = compression;
        self
    }

    /// Build the configuration
    ///
    /// # Errors
    /// - Invalid configuration values
    pub fn build(self) -> Result<PipelineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.max_dimension, 1024);
        assert_eq!(config.shadow.opacity, 80);
        assert_eq!(config.png_compression, PngCompression::Default);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_validation() {
        let config = PipelineConfig::builder().max_dimension(2048).build().unwrap();
        assert_eq!(config.max_dimension, 2048);

        assert!(PipelineConfig::builder().max_dimension(0).build().is_err());
        assert!(PipelineConfig::builder().max_dimension(20_000).build().is_err());
        assert!(PipelineConfig::builder().max_input_pixels(0).build().is_err());

        let shadow = ShadowSpec {
            blur_radius: -1.0,
            ..ShadowSpec::default()
        };
        assert!(PipelineConfig::builder().shadow(shadow).build().is_err());
    }

    #[test]
    fn test_from_json_file_with_partial_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"max_dimension": 2048, "shadow": {{"opacity": 120}}, "png_compression": "best"}}"#
        )
        .unwrap();

        let config = PipelineConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.max_dimension, 2048);
        assert_eq!(config.shadow.opacity, 120);
        assert!((config.shadow.blur_radius - 10.0).abs() < f32::EPSILON);
        assert_eq!(config.shadow.offset, (5, 8));
        assert_eq!(config.png_compression, PngCompression::Best);
        assert_eq!(config.max_input_pixels, DEFAULT_MAX_INPUT_PIXELS);
    }

    #[test]
    fn test_from_json_file_rejects_invalid_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"max_dimension": 0}}"#).unwrap();
        assert!(matches!(
            PipelineConfig::from_json_file(file.path()),
            Err(BgRemovalError::InvalidConfig(_))
        ));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(PipelineConfig::from_json_file(file.path()).is_err());
    }
}
