//! Mock backend implementation for testing and local development
//!
//! Produces a deterministic soft elliptical mask without any model file, so the
//! full pipeline can run end to end in tests and on machines without models.

use crate::{
    error::{BgRemovalError, Result},
    inference::InferenceBackend,
    models::{ModelInfo, PreprocessingConfig, DEFAULT_INPUT_SIZE},
};
use instant::Duration;
use ndarray::Array4;
use std::sync::{Arc, Mutex};

/// How the mock should misbehave, if at all
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailureMode {
    None,
    Initialization,
    Inference,
    OutOfMemory,
}

/// Mock backend for testing and debugging purposes
#[derive(Debug, Clone)]
pub struct MockBackend {
    input_size: usize,
    initialized: bool,
    failure: FailureMode,
    /// Call history for verification in tests
    call_history: Arc<Mutex<Vec<String>>>,
}

impl MockBackend {
    /// Create a new mock backend with the default U2-Net input size
    #[must_use]
    pub fn new() -> Self {
        Self::with_input_size(DEFAULT_INPUT_SIZE as usize)
    }

    #[must_use]
    pub fn with_input_size(input_size: usize) -> Self {
        Self {
            input_size: input_size.max(1),
            initialized: false,
            failure: FailureMode::None,
            call_history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a mock backend that will fail during initialization
    #[must_use]
    pub fn failing_init() -> Self {
        Self {
            failure: FailureMode::Initialization,
            ..Self::new()
        }
    }

    /// Create a mock backend that will fail during inference
    #[must_use]
    pub fn failing_inference() -> Self {
        Self {
            failure: FailureMode::Inference,
            ..Self::new()
        }
    }

    /// Create a mock backend that reports memory exhaustion during inference
    #[must_use]
    pub fn out_of_memory() -> Self {
        Self {
            failure: FailureMode::OutOfMemory,
            ..Self::new()
        }
    }

    /// Shared handle to the call history, usable after the backend is boxed
    #[must_use]
    pub fn call_history(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.call_history)
    }

    fn record_call(&self, method: &str) {
        if let Ok(mut history) = self.call_history.lock() {
            history.push(method.to_string());
        }
    }

    /// Soft ellipse covering the central part of the frame
    fn generate_mask(height: usize, width: usize) -> Array4<f32> {
        let center_x = width as f32 / 2.0;
        let center_y = height as f32 / 2.0;
        let radius_x = (width as f32 / 3.0).max(1.0);
        let radius_y = (height as f32 / 3.0).max(1.0);

        Array4::from_shape_fn((1, 1, height, width), |(_, _, y, x)| {
            let dx = (x as f32 + 0.5 - center_x) / radius_x;
            let dy = (y as f32 + 0.5 - center_y) / radius_y;
            let distance = (dx * dx + dy * dy).sqrt();
            // Opaque core, linear falloff over the outer fifth
            ((1.0 - distance) * 5.0).clamp(0.0, 1.0)
        })
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceBackend for MockBackend {
    fn initialize(&mut self) -> Result<Option<Duration>> {
        self.record_call("initialize");

        if self.failure == FailureMode::Initialization {
            return Err(BgRemovalError::model("Mock backend initialization failed"));
        }
        if self.initialized {
            return Ok(None);
        }

        self.initialized = true;
        Ok(Some(Duration::from_millis(0)))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        self.record_call("infer");

        if !self.initialized {
            return Err(BgRemovalError::inference("Mock backend not initialized"));
        }

        match self.failure {
            FailureMode::Inference => {
                return Err(BgRemovalError::inference("Mock backend inference failed"));
            },
            FailureMode::OutOfMemory => {
                return Err(BgRemovalError::resource_exhausted(
                    "Mock backend ran out of memory",
                ));
            },
            FailureMode::None | FailureMode::Initialization => {},
        }

        let (batch, channels, height, width) = input.dim();
        if batch != 1 || channels != 3 {
            return Err(BgRemovalError::inference(format!(
                "Expected input of shape (1, 3, H, W), got {:?}",
                input.shape()
            )));
        }

        Ok(Self::generate_mask(height, width))
    }

    fn input_shape(&self) -> (usize, usize, usize, usize) {
        (1, 3, self.input_size, self.input_size)
    }

    fn preprocessing_config(&self) -> Result<PreprocessingConfig> {
        Ok(PreprocessingConfig {
            target_size: [self.input_size as u32, self.input_size as u32],
            ..PreprocessingConfig::default()
        })
    }

    fn model_info(&self) -> Result<ModelInfo> {
        Ok(ModelInfo {
            name: "mock-ellipse".to_string(),
            precision: "fp32".to_string(),
            size_bytes: 0,
            input_shape: self.input_shape(),
            output_shape: (1, 1, self.input_size, self.input_size),
        })
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_is_opaque_at_center_and_clear_at_corners() {
        let mut backend = MockBackend::with_input_size(64);
        backend.initialize().unwrap();
        let output = backend.infer(&Array4::zeros((1, 3, 64, 64))).unwrap();

        assert!((output[[0, 0, 32, 32]] - 1.0).abs() < f32::EPSILON);
        assert!(output[[0, 0, 0, 0]].abs() < f32::EPSILON);
        assert!(output.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_call_history_is_recorded() {
        let mut backend = MockBackend::new();
        let history = backend.call_history();
        backend.initialize().unwrap();
        backend.infer(&Array4::zeros((1, 3, 320, 320))).unwrap();

        assert_eq!(*history.lock().unwrap(), vec!["initialize", "infer"]);
    }

    #[test]
    fn test_failure_modes() {
        assert!(MockBackend::failing_init().initialize().is_err());

        let mut backend = MockBackend::failing_inference();
        backend.initialize().unwrap();
        assert!(matches!(
            backend.infer(&Array4::zeros((1, 3, 8, 8))),
            Err(BgRemovalError::Inference(_))
        ));

        let mut backend = MockBackend::out_of_memory();
        backend.initialize().unwrap();
        assert!(matches!(
            backend.infer(&Array4::zeros((1, 3, 8, 8))),
            Err(BgRemovalError::ResourceExhausted(_))
        ));
    }

    #[test]
    fn test_rejects_wrong_channel_count() {
        let mut backend = MockBackend::new();
        backend.initialize().unwrap();
        assert!(backend.infer(&Array4::zeros((1, 1, 8, 8))).is_err());
    }
}
