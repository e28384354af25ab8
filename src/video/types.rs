//! Core types for video generation.

use crate::artifact::{MediaArtifact, MediaKind};
use crate::error::Result;
use crate::image::{AspectRatio, ImageFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default clip length in seconds.
pub const DEFAULT_DURATION_SECS: u32 = 8;

/// Metadata about the video generation process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoMetadata {
    /// Model used for generation.
    pub model: Option<String>,
    /// Operation name assigned by the service.
    pub operation: Option<String>,
    /// Wall time from submission to download, in milliseconds.
    pub duration_ms: Option<u64>,
    /// Requested clip length in seconds.
    pub video_duration_secs: Option<u32>,
    /// Video resolution.
    pub resolution: Option<String>,
}

/// A still image that seeds image-to-video generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInput {
    /// Raw image bytes.
    pub data: Vec<u8>,
    /// MIME type of `data`.
    pub mime_type: String,
}

impl ImageInput {
    /// Wraps image bytes, detecting the MIME type from magic bytes.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        let mime_type = ImageFormat::from_magic_bytes(&data)
            .unwrap_or_default()
            .mime_type()
            .to_string();
        Self { data, mime_type }
    }
}

/// A previously generated video to extend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoSource {
    /// A video the service already holds, by URI.
    Uri(String),
    /// Video bytes uploaded with the request.
    Inline {
        /// Raw video bytes.
        data: Vec<u8>,
        /// MIME type of `data`.
        mime_type: String,
    },
}

impl VideoSource {
    /// References a video by the URI the service returned for it.
    pub fn from_uri(uri: impl Into<String>) -> Self {
        Self::Uri(uri.into())
    }

    /// Uploads MP4 bytes inline.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self::Inline {
            data,
            mime_type: "video/mp4".to_string(),
        }
    }

    /// Prefers the artifact's remote URI, falling back to its bytes.
    pub fn from_artifact(artifact: &MediaArtifact) -> Result<Self> {
        if let Some(uri) = artifact.remote_uri() {
            return Ok(Self::from_uri(uri));
        }
        Ok(Self::Inline {
            data: artifact.bytes()?,
            mime_type: artifact.mime_type.clone(),
        })
    }
}

/// A request to generate or extend a video.
#[derive(Debug, Clone)]
pub struct VideoRequest {
    /// The text prompt describing the desired video.
    pub prompt: String,
    /// Aspect ratio (Veo accepts 16:9 and 9:16).
    pub aspect_ratio: AspectRatio,
    /// Desired clip length in seconds.
    pub duration_secs: u32,
    /// Resolution (e.g., "720p", "1080p").
    pub resolution: Option<String>,
    /// Things to keep out of the clip.
    pub negative_prompt: Option<String>,
    /// First frame for image-to-video.
    pub image: Option<ImageInput>,
    /// Video to continue (extension).
    pub source_video: Option<VideoSource>,
}

impl VideoRequest {
    /// Creates a new 16:9, 8-second request with the given prompt.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            aspect_ratio: AspectRatio::Landscape,
            duration_secs: DEFAULT_DURATION_SECS,
            resolution: None,
            negative_prompt: None,
            image: None,
            source_video: None,
        }
    }

    /// Creates an extension request continuing `source`.
    pub fn extend(source: VideoSource, prompt: impl Into<String>) -> Self {
        Self::new(prompt).with_source_video(source)
    }

    /// Sets the desired video duration in seconds.
    pub fn with_duration(mut self, secs: u32) -> Self {
        self.duration_secs = secs;
        self
    }

    /// Sets the aspect ratio.
    pub fn with_aspect_ratio(mut self, ratio: AspectRatio) -> Self {
        self.aspect_ratio = ratio;
        self
    }

    /// Sets the resolution.
    pub fn with_resolution(mut self, resolution: impl Into<String>) -> Self {
        self.resolution = Some(resolution.into());
        self
    }

    /// Sets a negative prompt.
    pub fn with_negative_prompt(mut self, negative: impl Into<String>) -> Self {
        self.negative_prompt = Some(negative.into());
        self
    }

    /// Seeds generation with a first frame.
    pub fn with_image(mut self, image: ImageInput) -> Self {
        self.image = Some(image);
        self
    }

    /// Continues an existing video.
    pub fn with_source_video(mut self, source: VideoSource) -> Self {
        self.source_video = Some(source);
        self
    }

    /// Whether this request extends an existing video.
    pub fn is_extension(&self) -> bool {
        self.source_video.is_some()
    }
}

/// A downloaded video with its data and metadata.
#[derive(Debug, Clone)]
#[must_use = "generated video should be saved or processed"]
pub struct GeneratedVideo {
    /// Raw video bytes.
    pub data: Vec<u8>,
    /// MIME type (e.g., "video/mp4").
    pub mime_type: String,
    /// URI the service serves the video from; reusable for extension.
    pub uri: Option<String>,
    /// Generation metadata.
    pub metadata: VideoMetadata,
}

impl GeneratedVideo {
    /// Returns the size of the video data in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Saves the video to the specified path.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, &self.data)?;
        Ok(())
    }

    /// Saves to `path` and returns the on-disk artifact, keeping the remote URI.
    pub fn save_artifact(&self, path: impl AsRef<Path>) -> Result<MediaArtifact> {
        let path = path.as_ref();
        self.save(path)?;
        let artifact = MediaArtifact::on_disk(MediaKind::Video, self.mime_type.clone(), path);
        Ok(match &self.uri {
            Some(uri) => artifact.with_remote_uri(uri.clone()),
            None => artifact,
        })
    }
}
