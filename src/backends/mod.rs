//! Backend implementations for different inference engines
//!
//! - Tract backend (pure Rust ONNX inference, feature `tract`)
//! - Mock backend (deterministic mask, no model file required)

pub mod mock;

#[cfg(feature = "tract")]
pub mod tract;

pub use self::mock::MockBackend;

#[cfg(feature = "tract")]
pub use self::tract::TractBackend;
