//! Inference backend abstraction

use crate::{
    error::Result,
    models::{ModelInfo, PreprocessingConfig},
};
use ndarray::Array4;

// Use instant crate for cross-platform time compatibility
use instant::Duration;

/// Trait for inference backends
///
/// Backends are not assumed to be thread-safe: `infer` takes `&mut self`, and
/// shared use goes through `ModelHandle`, which serializes calls per backend.
pub trait InferenceBackend {
    /// Initialize the backend, loading its model
    ///
    /// Returns the model load time, or `None` if the backend was already initialized.
    ///
    /// # Errors
    /// - Backend initialization failures
    /// - Model loading or validation errors
    fn initialize(&mut self) -> Result<Option<Duration>>;

    /// Run inference on an NCHW input tensor
    ///
    /// # Errors
    /// - Backend not initialized
    /// - Model inference failures
    /// - Invalid input tensor dimensions
    /// - `ResourceExhausted` when the backend runs out of memory
    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>>;

    /// Get the expected input shape for this backend
    fn input_shape(&self) -> (usize, usize, usize, usize);

    /// Get preprocessing configuration for this backend
    ///
    /// # Errors
    /// - Invalid or missing preprocessing configuration
    fn preprocessing_config(&self) -> Result<PreprocessingConfig>;

    /// Get model information for this backend
    ///
    /// # Errors
    /// - Model metadata unavailable or invalid
    fn model_info(&self) -> Result<ModelInfo>;

    /// Check if backend is initialized
    fn is_initialized(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MockBackend;

    #[test]
    fn test_backend_trait_lifecycle() {
        let mut backend: Box<dyn InferenceBackend + Send> = Box::new(MockBackend::new());
        assert!(!backend.is_initialized());

        let load_time = backend.initialize().unwrap();
        assert!(load_time.is_some());
        assert!(backend.is_initialized());

        // Second initialization is a no-op
        assert!(backend.initialize().unwrap().is_none());
    }

    #[test]
    fn test_backend_shapes_are_consistent() {
        let backend = MockBackend::new();
        let input = backend.input_shape();
        let info = backend.model_info().unwrap();
        let preprocessing = backend.preprocessing_config().unwrap();

        assert_eq!(input.0, 1); // Batch size
        assert_eq!(input.1, 3); // RGB channels
        assert_eq!(info.output_shape.1, 1); // Single channel mask
        assert_eq!(preprocessing.target_size[0] as usize, input.3);
        assert_eq!(preprocessing.target_size[1] as usize, input.2);
    }

    #[test]
    fn test_infer_requires_initialization() {
        let mut backend = MockBackend::new();
        let input = Array4::<f32>::zeros((1, 3, 320, 320));
        assert!(backend.infer(&input).is_err());

        backend.initialize().unwrap();
        let output = backend.infer(&input).unwrap();
        assert_eq!(output.shape(), &[1, 1, 320, 320]);
    }
}
