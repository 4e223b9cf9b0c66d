//! Shared utilities

pub mod color;
pub mod preprocessing;

pub use color::ColorParser;
pub use preprocessing::ImagePreprocessor;
