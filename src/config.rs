//! Agent configuration.

use crate::error::{GenReelError, Result};
use crate::poll::PollPolicy;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable consulted when no credential is given explicitly.
pub const API_KEY_ENV: &str = "GOOGLE_API_KEY";

/// Default Gemini Developer API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default model for scripts and planning.
pub const DEFAULT_TEXT_MODEL: &str = "gemini-2.0-flash";
/// Default model for still images.
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.0-flash-exp-image-generation";
/// Default model for speech synthesis.
pub const DEFAULT_AUDIO_MODEL: &str = "gemini-2.5-flash-preview-tts";
/// Default model for video generation and extension.
pub const DEFAULT_VIDEO_MODEL: &str = "veo-3.1-fast-generate-preview";

/// Everything a [`VideoAgent`](crate::VideoAgent) needs, resolved up front.
#[derive(Clone)]
pub struct AgentConfig {
    /// API key sent with every request.
    pub credential: String,
    /// Model used by text generation.
    pub text_model: String,
    /// Model used by image generation.
    pub image_model: String,
    /// Model used by speech synthesis.
    pub audio_model: String,
    /// Model used by video generation and extension.
    pub video_model: String,
    /// API root, without a trailing slash.
    pub base_url: String,
    /// Bounds for waiting on video jobs.
    pub poll: PollPolicy,
    /// Program invoked by the merge step.
    pub ffmpeg: PathBuf,
}

impl std::fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentConfig")
            .field("credential", &"<redacted>")
            .field("text_model", &self.text_model)
            .field("image_model", &self.image_model)
            .field("audio_model", &self.audio_model)
            .field("video_model", &self.video_model)
            .field("base_url", &self.base_url)
            .field("poll", &self.poll)
            .field("ffmpeg", &self.ffmpeg)
            .finish()
    }
}

impl AgentConfig {
    /// Creates a new `AgentConfigBuilder`.
    pub fn builder() -> AgentConfigBuilder {
        AgentConfigBuilder::new()
    }

    /// Builds a default configuration with the key taken from `GOOGLE_API_KEY`.
    pub fn from_env() -> Result<Self> {
        Self::builder().build()
    }
}

/// Builder for [`AgentConfig`].
#[derive(Debug, Clone)]
pub struct AgentConfigBuilder {
    credential: Option<String>,
    text_model: String,
    image_model: String,
    audio_model: String,
    video_model: String,
    base_url: String,
    poll: PollPolicy,
    ffmpeg: PathBuf,
}

impl Default for AgentConfigBuilder {
    fn default() -> Self {
        Self {
            credential: None,
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            audio_model: DEFAULT_AUDIO_MODEL.to_string(),
            video_model: DEFAULT_VIDEO_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            poll: PollPolicy::default(),
            ffmpeg: PathBuf::from("ffmpeg"),
        }
    }
}

impl AgentConfigBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Falls back to `GOOGLE_API_KEY` env var.
    pub fn credential(mut self, key: impl Into<String>) -> Self {
        self.credential = Some(key.into());
        self
    }

    /// Sets the text model.
    pub fn text_model(mut self, model: impl Into<String>) -> Self {
        self.text_model = model.into();
        self
    }

    /// Sets the image model.
    pub fn image_model(mut self, model: impl Into<String>) -> Self {
        self.image_model = model.into();
        self
    }

    /// Sets the speech model.
    pub fn audio_model(mut self, model: impl Into<String>) -> Self {
        self.audio_model = model.into();
        self
    }

    /// Sets the video model.
    pub fn video_model(mut self, model: impl Into<String>) -> Self {
        self.video_model = model.into();
        self
    }

    /// Points the agent at a different API root.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets the full poll policy.
    pub fn poll_policy(mut self, policy: PollPolicy) -> Self {
        self.poll = policy;
        self
    }

    /// Sets the polling interval for video jobs.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll.interval = interval;
        self
    }

    /// Sets the maximum time to wait for a video job.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.poll.timeout = timeout;
        self
    }

    /// Sets the merge program (defaults to `ffmpeg` on `PATH`).
    pub fn ffmpeg(mut self, program: impl Into<PathBuf>) -> Self {
        self.ffmpeg = program.into();
        self
    }

    /// Resolves the credential and validates the settings.
    pub fn build(self) -> Result<AgentConfig> {
        let credential = self
            .credential
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                GenReelError::Auth(format!(
                    "{API_KEY_ENV} not set and no API key provided"
                ))
            })?;

        for (field, value) in [
            ("text_model", &self.text_model),
            ("image_model", &self.image_model),
            ("audio_model", &self.audio_model),
            ("video_model", &self.video_model),
        ] {
            if value.trim().is_empty() {
                return Err(GenReelError::InvalidRequest(format!("{field} must not be empty")));
            }
        }

        if self.poll.interval.is_zero() {
            return Err(GenReelError::InvalidRequest(
                "poll interval must be greater than zero".into(),
            ));
        }

        Ok(AgentConfig {
            credential,
            text_model: self.text_model,
            image_model: self.image_model,
            audio_model: self.audio_model,
            video_model: self.video_model,
            base_url: self.base_url.trim_end_matches('/').to_string(),
            poll: self.poll,
            ffmpeg: self.ffmpeg,
        })
    }
}
