//! Compositing stages
//!
//! Each stage takes its inputs by reference or by value and returns a new
//! buffer; no stage writes into another stage's output.

pub mod background;
pub mod composite;
pub mod resize;
pub mod shadow;

pub use background::BackgroundSynthesizer;
pub use composite::{flatten_onto, Compositor};
pub use resize::{Downscaled, ResizeManager};
pub use shadow::ShadowRenderer;
