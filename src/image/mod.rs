//! Image generation module.

mod gemini;
mod types;

pub use gemini::ImageGenerator;
pub use types::{AspectRatio, GeneratedImage, ImageFormat, ImageMetadata, ImageRequest};
