//! Video generation module.

mod types;
mod veo;

pub use types::{
    GeneratedVideo, ImageInput, VideoMetadata, VideoRequest, VideoSource, DEFAULT_DURATION_SECS,
};
pub use veo::{VeoClient, VeoOperation, VideoRef};
