//! Services layer
//!
//! Output encoding is kept apart from the compositing stages so the pipeline
//! can be exercised without producing bytes.

pub mod encoding;

pub use encoding::{OutputEncoder, PNG_MIME};
