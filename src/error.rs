//! Error types for background removal and compositing operations

use thiserror::Error;

/// Result type alias for background removal operations
pub type Result<T> = std::result::Result<T, BgRemovalError>;

/// Comprehensive error types for background removal operations
#[derive(Error, Debug)]
pub enum BgRemovalError {
    /// No image was supplied with the request
    #[error("No image provided")]
    MissingInput,

    /// Malformed hex color string
    #[error("Invalid color format: {0}")]
    InvalidColorFormat(String),

    /// Inference or allocation failure on oversized input
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image format or processing errors
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Backend inference errors
    #[error("Inference error: {0}")]
    Inference(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Model loading or initialization errors
    #[error("Model error: {0}")]
    Model(String),

    /// Pipeline stage errors
    #[error("Processing error: {0}")]
    Processing(String),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Caller-facing classification of an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request itself is unusable (missing image, malformed options)
    BadRequest,
    /// The input is too large to process; a smaller image or lighter model may work
    ResourceExhausted,
    /// Any other failure during processing
    Processing,
}

impl BgRemovalError {
    /// Create a new invalid color format error
    pub fn invalid_color<S: Into<String>>(input: S) -> Self {
        Self::InvalidColorFormat(input.into())
    }

    /// Create a new resource exhaustion error
    pub fn resource_exhausted<S: Into<String>>(msg: S) -> Self {
        Self::ResourceExhausted(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new model error
    pub fn model<S: Into<String>>(msg: S) -> Self {
        Self::Model(msg.into())
    }

    /// Create a new processing error
    pub fn processing<S: Into<String>>(msg: S) -> Self {
        Self::Processing(msg.into())
    }

    /// Create a new inference error
    pub fn inference<S: Into<String>>(msg: S) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
        recommended: Option<T>,
    ) -> Self {
        let recommendation = match recommended {
            Some(rec) => format!(" Recommended: {}", rec),
            None => String::new(),
        };

        Self::InvalidConfig(format!(
            "Invalid {}: {} (valid range: {}).{}",
            parameter, value, valid_range, recommendation
        ))
    }

    /// Create processing error with stage context
    pub fn processing_stage_error(stage: &str, details: &str, input_info: Option<&str>) -> Self {
        let input_context = match input_info {
            Some(info) => format!(" (input: {})", info),
            None => String::new(),
        };

        Self::Processing(format!(
            "Processing failed at stage '{}'{}: {}",
            stage, input_context, details
        ))
    }

    /// Map a decoder error, turning allocation limit hits into `ResourceExhausted`
    pub fn from_decode(error: image::ImageError) -> Self {
        match error {
            image::ImageError::Limits(limits) => {
                Self::ResourceExhausted(format!("Image exceeds decoding limits: {}", limits))
            },
            other => Self::Image(other),
        }
    }

    /// Classify the error for the caller
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingInput => ErrorKind::BadRequest,
            Self::ResourceExhausted(_) | Self::Image(image::ImageError::Limits(_)) => {
                ErrorKind::ResourceExhausted
            },
            _ => ErrorKind::Processing,
        }
    }
}
