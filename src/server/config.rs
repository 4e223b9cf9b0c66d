//! Command-line and environment configuration for the HTTP service

use super::{cors::DEFAULT_ALLOWED_ORIGINS, routes::DEFAULT_MAX_UPLOAD_BYTES};
use crate::{
    config::PipelineConfig,
    models::{default_variants, ModelVariantConfig},
    tracing_config::TracingFormat,
    types::DEFAULT_MODEL,
};
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

/// Background removal HTTP service
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "bgremove-server")]
pub struct ServerArgs {
    /// Address to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 5000)]
    pub port: u16,

    /// Model variant as name=path[:input_size] (repeatable)
    #[arg(long = "model", value_name = "NAME=PATH[:SIZE]")]
    pub models: Vec<String>,

    /// Directory holding u2net.onnx and u2netp.onnx when no --model is given
    #[arg(long, env = "MODEL_DIR", default_value = "models")]
    pub model_dir: PathBuf,

    /// Variant used when a request names an unknown model
    #[arg(long, default_value = DEFAULT_MODEL)]
    pub default_model: String,

    /// Register mock segmentation backends instead of loading ONNX files
    #[arg(long)]
    pub mock_models: bool,

    /// Allowed CORS origin (repeatable) [default: built-in allow-list]
    #[arg(long = "allowed-origin", value_name = "ORIGIN")]
    pub allowed_origins: Vec<String>,

    /// Concurrent request workers
    #[arg(short, long, default_value_t = 4)]
    pub workers: usize,

    /// Largest accepted request body in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    pub max_upload_bytes: u64,

    /// Pipeline configuration file (JSON)
    #[arg(long, value_name = "FILE")]
    pub pipeline_config: Option<PathBuf>,

    /// Override the segmentation downscale ceiling
    #[arg(long)]
    pub max_dimension: Option<u32>,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log output format (console, compact, json)
    #[arg(long, default_value = "console")]
    pub log_format: TracingFormat,
}

/// Resolved service configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub variants: Vec<ModelVariantConfig>,
    pub default_model: String,
    pub mock_models: bool,
    pub allowed_origins: Vec<String>,
    pub workers: usize,
    pub max_upload_bytes: u64,
    pub pipeline: PipelineConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            variants: default_variants(&PathBuf::from("models")),
            default_model: DEFAULT_MODEL.to_string(),
            mock_models: false,
            allowed_origins: DEFAULT_ALLOWED_ORIGINS.iter().map(ToString::to_string).collect(),
            workers: 4,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            pipeline: PipelineConfig::default(),
        }
    }
}

impl ServerConfig {
    /// `host:port` string for binding
    #[must_use]
    pub fn bind_address(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl ServerArgs {
    /// Convert arguments into a validated [`ServerConfig`]
    ///
    /// # Errors
    /// - Malformed `--model` specifications
    /// - Unreadable or invalid pipeline configuration file
    /// - Zero workers or upload limit
    pub fn into_config(self) -> Result<ServerConfig> {
        let variants = if self.models.is_empty() {
            default_variants(&self.model_dir)
        } else {
            self.models
                .iter()
                .map(|spec| ModelVariantConfig::parse(spec))
                .collect::<crate::error::Result<Vec<_>>>()
                .context("Invalid --model value")?
        };

        let mut pipeline = match &self.pipeline_config {
            Some(path) => PipelineConfig::from_json_file(path).with_context(|| {
                format!("Failed to load pipeline config {}", path.display())
            })?,
            None => PipelineConfig::default(),
        };
        if let Some(max_dimension) = self.max_dimension {
            pipeline.max_dimension = max_dimension;
            pipeline.validate().context("Invalid --max-dimension")?;
        }

        if self.workers == 0 {
            anyhow::bail!("--workers must be at least 1");
        }
        if self.max_upload_bytes == 0 {
            anyhow::bail!("--max-upload-bytes must be at least 1");
        }

        let allowed_origins = if self.allowed_origins.is_empty() {
            DEFAULT_ALLOWED_ORIGINS.iter().map(ToString::to_string).collect()
        } else {
            self.allowed_origins
        };

        Ok(ServerConfig {
            host: self.host,
            port: self.port,
            variants,
            default_model: self.default_model,
            mock_models: self.mock_models,
            allowed_origins,
            workers: self.workers,
            max_upload_bytes: self.max_upload_bytes,
            pipeline,
        })
    }
}
