//! Tract backend implementation for segmentation models
//!
//! Runs ONNX segmentation models (U2-Net family) with Tract, a pure Rust
//! inference library, so the service ships as a single binary without a
//! native runtime.

use crate::error::{BgRemovalError, Result};
use crate::inference::InferenceBackend;
use crate::models::{ModelInfo, ModelVariantConfig, PreprocessingConfig};
use log;
use ndarray::Array4;
use std::path::PathBuf;
use tract_onnx::prelude::*;

/// Type alias for the complex Tract model type to reduce complexity warnings
type TractModel = RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

// Use instant crate for cross-platform time compatibility
use instant::{Duration, Instant};

/// Tract backend for running segmentation models using pure Rust inference
#[derive(Debug)]
pub struct TractBackend {
    name: String,
    model_path: PathBuf,
    preprocessing: PreprocessingConfig,
    model: Option<TractModel>,
    model_size_bytes: usize,
    initialized: bool,
}

impl TractBackend {
    /// Create an uninitialized backend for a configured model variant
    #[must_use]
    pub fn from_variant(variant: &ModelVariantConfig) -> Self {
        Self {
            name: variant.name.clone(),
            model_path: variant.path.clone(),
            preprocessing: variant.preprocessing_config(),
            model: None,
            model_size_bytes: 0,
            initialized: false,
        }
    }

    fn input_dims(&self) -> (usize, usize) {
        let [width, height] = self.preprocessing.target_size;
        (height as usize, width as usize)
    }

    /// Load and optimize the ONNX model
    fn load_model(&mut self) -> Result<Duration> {
        let model_load_start = Instant::now();

        let model_data = std::fs::read(&self.model_path).map_err(|e| {
            BgRemovalError::model(format!(
                "Failed to read model '{}' from {}: {}",
                self.name,
                self.model_path.display(),
                e
            ))
        })?;
        let (height, width) = self.input_dims();

        log::info!("🚀 Initializing Tract Backend");
        log::info!("🧠 Model: {} ({})", self.name, self.model_path.display());
        #[allow(clippy::cast_precision_loss)] // Precision loss acceptable for logging display
        let size_mb = model_data.len() as f64 / (1024.0 * 1024.0);
        log::info!("📏 Model size: {size_mb:.2} MB");

        let model = onnx()
            .model_for_read(&mut std::io::Cursor::new(&model_data))
            .map_err(|e| BgRemovalError::model(format!("Failed to load ONNX model: {e}")))?
            .with_input_fact(0, f32::fact([1, 3, height, width]).into())
            .map_err(|e| BgRemovalError::model(format!("Failed to set input shape: {e}")))?
            .into_optimized()
            .map_err(|e| BgRemovalError::model(format!("Failed to optimize model: {e}")))?
            .into_runnable()
            .map_err(|e| {
                BgRemovalError::model(format!("Failed to create runnable model: {e}"))
            })?;

        self.model_size_bytes = model_data.len();
        self.model = Some(model);
        self.initialized = true;

        let model_load_time = model_load_start.elapsed();
        log::info!(
            "✅ Tract backend '{}' initialized in {}ms",
            self.name,
            model_load_time.as_millis()
        );

        Ok(model_load_time)
    }
}

/// Tract reports allocation failures as plain errors; surface them distinctly
fn classify_inference_error(error: &TractError) -> BgRemovalError {
    let message = format!("{error:?}");
    let lowered = message.to_lowercase();
    if lowered.contains("out of memory") || lowered.contains("allocation") {
        BgRemovalError::resource_exhausted(format!("Tract inference ran out of memory: {error}"))
    } else {
        BgRemovalError::inference(format!("Tract inference failed: {error}"))
    }
}

impl InferenceBackend for TractBackend {
    fn initialize(&mut self) -> Result<Option<Duration>> {
        if self.initialized {
            return Ok(None);
        }

        let model_load_time = self.load_model()?;
        Ok(Some(model_load_time))
    }

    #[allow(clippy::get_first)]
    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| BgRemovalError::inference("Tract model not initialized"))?;

        log::debug!("🔮 Running Tract inference");
        log::debug!("  - Input tensor: {:?}", input.shape());

        let inference_start = Instant::now();

        let input_tensor = Tensor::from(input.clone());
        let outputs = model
            .run(tvec![input_tensor.into()])
            .map_err(|e| classify_inference_error(&e))?;

        // U2-Net emits several side outputs; the first one is the fused mask
        let output_tensor = outputs
            .into_iter()
            .next()
            .ok_or_else(|| BgRemovalError::inference("No output tensor found"))?
            .into_arc_tensor();

        let output_data = output_tensor.to_array_view::<f32>().map_err(|e| {
            BgRemovalError::inference(format!("Failed to convert output tensor: {e}"))
        })?;

        let output_shape = output_data.shape();
        if output_shape.len() != 4 {
            return Err(BgRemovalError::inference(format!(
                "Expected 4D output tensor, got {}D",
                output_shape.len()
            )));
        }
        let (height, width) = self.input_dims();

        let output_array = Array4::from_shape_vec(
            (
                output_shape.get(0).copied().unwrap_or(1),
                output_shape.get(1).copied().unwrap_or(1),
                output_shape.get(2).copied().unwrap_or(height),
                output_shape.get(3).copied().unwrap_or(width),
            ),
            output_data.to_owned().into_raw_vec_and_offset().0,
        )
        .map_err(|e| BgRemovalError::inference(format!("Failed to reshape output tensor: {e}")))?;

        log::debug!(
            "✅ Tract inference completed in {}ms",
            inference_start.elapsed().as_millis()
        );
        log::debug!("  - Output tensor: {:?}", output_array.shape());

        Ok(output_array)
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn input_shape(&self) -> (usize, usize, usize, usize) {
        let (height, width) = self.input_dims();
        (1, 3, height, width)
    }

    fn preprocessing_config(&self) -> Result<PreprocessingConfig> {
        Ok(self.preprocessing.clone())
    }

    fn model_info(&self) -> Result<ModelInfo> {
        let (height, width) = self.input_dims();
        Ok(ModelInfo {
            name: self.name.clone(),
            precision: "fp32".to_string(),
            size_bytes: self.model_size_bytes,
            input_shape: (1, 3, height, width),
            output_shape: (1, 1, height, width),
        })
    }
}
