//! Model variants and the process-wide model registry
//!
//! The registry is built once at startup and is read-only afterwards. It is
//! handed to the pipeline explicitly, which keeps request handling free of
//! global state and lets tests inject their own segmentation capabilities.

use crate::{
    error::{BgRemovalError, Result},
    inference::InferenceBackend,
    segmentation::{ModelHandle, SegmentationCapability},
    types::{FallbackReason, StageOutcome, DEFAULT_MODEL},
};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default U2-Net input resolution
pub const DEFAULT_INPUT_SIZE: u32 = 320;

/// ImageNet normalization used by the U2-Net family
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Model information and metadata
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub name: String,
    pub precision: String,
    pub size_bytes: usize,
    pub input_shape: (usize, usize, usize, usize), // NCHW format
    pub output_shape: (usize, usize, usize, usize),
}

/// Input preprocessing parameters of a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    /// Model input size as `[width, height]`
    pub target_size: [u32; 2],
    pub normalization_mean: [f32; 3],
    pub normalization_std: [f32; 3],
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            target_size: [DEFAULT_INPUT_SIZE, DEFAULT_INPUT_SIZE],
            normalization_mean: IMAGENET_MEAN,
            normalization_std: IMAGENET_STD,
        }
    }
}

/// On-disk description of one named model variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelVariantConfig {
    /// Variant key callers select with the `model` option
    pub name: String,
    /// Path to the ONNX file
    pub path: PathBuf,
    /// Square input resolution expected by the model
    #[serde(default = "default_input_size")]
    pub input_size: u32,
    #[serde(default = "default_mean")]
    pub mean: [f32; 3],
    #[serde(default = "default_std")]
    pub std: [f32; 3],
}

fn default_input_size() -> u32 {
    DEFAULT_INPUT_SIZE
}

fn default_mean() -> [f32; 3] {
    IMAGENET_MEAN
}

fn default_std() -> [f32; 3] {
    IMAGENET_STD
}

impl ModelVariantConfig {
    pub fn new<S: Into<String>, P: Into<PathBuf>>(name: S, path: P) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            input_size: DEFAULT_INPUT_SIZE,
            mean: IMAGENET_MEAN,
            std: IMAGENET_STD,
        }
    }

    /// Parse a `name=path[:size]` specification
    ///
    /// # Examples
    /// ```rust
    /// use bgremove_compose::models::ModelVariantConfig;
    ///
    /// let variant = ModelVariantConfig::parse("fast=/models/u2netp.onnx:320").unwrap();
    /// assert_eq!(variant.name, "fast");
    /// assert_eq!(variant.input_size, 320);
    /// ```
    ///
    /// # Errors
    /// - Missing `=` separator, empty name or empty path
    /// - Zero input size
    pub fn parse(spec: &str) -> Result<Self> {
        let (name, rest) = spec.split_once('=').ok_or_else(|| {
            BgRemovalError::invalid_config(format!(
                "Model variant '{}' must be in name=path[:size] format",
                spec
            ))
        })?;
        let name = name.trim();
        if name.is_empty() {
            return Err(BgRemovalError::invalid_config("Model variant name is empty"));
        }

        // A trailing `:<digits>` is a size suffix; anything else belongs to the path
        let (path, input_size) = match rest.rsplit_once(':') {
            Some((path, size)) if !size.is_empty() && size.bytes().all(|b| b.is_ascii_digit()) => {
                let size: u32 = size.parse().map_err(|_| {
                    BgRemovalError::invalid_config(format!("Invalid input size in '{}'", spec))
                })?;
                (path, size)
            },
            _ => (rest, DEFAULT_INPUT_SIZE),
        };

        if path.is_empty() {
            return Err(BgRemovalError::invalid_config(format!(
                "Model variant '{}' has no path",
                name
            )));
        }
        if input_size == 0 {
            return Err(BgRemovalError::config_value_error(
                "model input size",
                input_size,
                "1-4096",
                Some(DEFAULT_INPUT_SIZE),
            ));
        }

        Ok(Self {
            input_size,
            ..Self::new(name, path)
        })
    }

    #[must_use]
    pub fn preprocessing_config(&self) -> PreprocessingConfig {
        PreprocessingConfig {
            target_size: [self.input_size, self.input_size],
            normalization_mean: self.mean,
            normalization_std: self.std,
        }
    }
}

/// The stock variants: `general` (U2-Net) and `fast` (U2-Net-P) inside `model_dir`
#[must_use]
pub fn default_variants(model_dir: &Path) -> Vec<ModelVariantConfig> {
    vec![
        ModelVariantConfig::new(DEFAULT_MODEL, model_dir.join("u2net.onnx")),
        ModelVariantConfig::new("fast", model_dir.join("u2netp.onnx")),
    ]
}

/// A resolved model selection
#[derive(Clone)]
pub struct ModelSelection {
    /// Registry key of the handle that will run
    pub name: String,
    pub handle: Arc<dyn SegmentationCapability>,
}

impl fmt::Debug for ModelSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSelection")
            .field("name", &self.name)
            .field("handle", &self.handle.name())
            .finish()
    }
}

/// Immutable mapping of variant names to loaded segmentation handles
pub struct ModelRegistry {
    handles: BTreeMap<String, Arc<dyn SegmentationCapability>>,
    default_key: String,
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("variants", &self.variant_names())
            .field("default_key", &self.default_key)
            .finish()
    }
}

impl ModelRegistry {
    #[must_use]
    pub fn builder() -> ModelRegistryBuilder {
        ModelRegistryBuilder::default()
    }

    /// Resolve a variant key, falling back to the default variant for unknown keys
    #[must_use]
    pub fn resolve(&self, key: &str) -> StageOutcome<ModelSelection> {
        if let Some(handle) = self.handles.get(key) {
            return StageOutcome::Applied(ModelSelection {
                name: key.to_string(),
                handle: Arc::clone(handle),
            });
        }

        let selection = ModelSelection {
            name: self.default_key.clone(),
            handle: Arc::clone(self.default_handle()),
        };
        StageOutcome::Fallback {
            value: selection,
            reason: FallbackReason::UnknownModelVariant {
                requested: key.to_string(),
                used: self.default_key.clone(),
            },
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Arc<dyn SegmentationCapability>> {
        self.handles.get(key)
    }

    /// Variant keys in sorted order
    #[must_use]
    pub fn variant_names(&self) -> Vec<&str> {
        self.handles.keys().map(String::as_str).collect()
    }

    #[must_use]
    pub fn default_key(&self) -> &str {
        &self.default_key
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    #[allow(clippy::expect_used)]
    fn default_handle(&self) -> &Arc<dyn SegmentationCapability> {
        // Checked by ModelRegistryBuilder::build
        self.handles
            .get(&self.default_key)
            .expect("registry always contains its default variant")
    }
}

/// Builder for `ModelRegistry`
pub struct ModelRegistryBuilder {
    handles: BTreeMap<String, Arc<dyn SegmentationCapability>>,
    default_key: String,
}

impl Default for ModelRegistryBuilder {
    fn default() -> Self {
        Self {
            handles: BTreeMap::new(),
            default_key: DEFAULT_MODEL.to_string(),
        }
    }
}

impl ModelRegistryBuilder {
    /// Set the variant used for unknown keys
    #[must_use]
    pub fn default_variant<S: Into<String>>(mut self, key: S) -> Self {
        self.default_key = key.into();
        self
    }

    /// Register an already constructed segmentation capability
    #[must_use]
    pub fn register<S: Into<String>>(
        mut self,
        name: S,
        handle: Arc<dyn SegmentationCapability>,
    ) -> Self {
        let name = name.into();
        if self.handles.insert(name.clone(), handle).is_some() {
            warn!("Model variant '{}' registered twice, keeping the last one", name);
        }
        self
    }

    /// Initialize an inference backend and register it behind a `ModelHandle`
    ///
    /// # Errors
    /// - Backend initialization failures
    pub fn register_backend<S: Into<String>>(
        self,
        name: S,
        backend: Box<dyn InferenceBackend + Send>,
    ) -> Result<Self> {
        let name = name.into();
        let handle = ModelHandle::new(name.clone(), backend)?;
        Ok(self.register(name, Arc::new(handle)))
    }

    /// Load an ONNX variant with the Tract backend
    ///
    /// # Errors
    /// - Model file missing or unreadable
    /// - ONNX parsing or optimization failures
    #[cfg(feature = "tract")]
    pub fn load_variant(self, variant: &ModelVariantConfig) -> Result<Self> {
        info!(
            "🤖 Loading model variant '{}' from {}",
            variant.name,
            variant.path.display()
        );
        let backend = crate::backends::TractBackend::from_variant(variant);
        self.register_backend(variant.name.clone(), Box::new(backend))
    }

    /// Build the registry
    ///
    /// # Errors
    /// - No variants registered
    /// - Default variant not among the registered variants
    pub fn build(self) -> Result<ModelRegistry> {
        if self.handles.is_empty() {
            return Err(BgRemovalError::invalid_config(
                "Model registry needs at least one variant",
            ));
        }
        if !self.handles.contains_key(&self.default_key) {
            return Err(BgRemovalError::invalid_config(format!(
                "Default model variant '{}' is not registered (available: {})",
                self.default_key,
                self.handles.keys().cloned().collect::<Vec<_>>().join(", ")
            )));
        }

        info!(
            "✅ Model registry ready: {} (default: {})",
            self.handles.keys().cloned().collect::<Vec<_>>().join(", "),
            self.default_key
        );

        Ok(ModelRegistry {
            handles: self.handles,
            default_key: self.default_key,
        })
    }
}
