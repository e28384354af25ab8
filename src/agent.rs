//! One entry point for the whole text → image → speech → video → merge flow.

use crate::artifact::MediaArtifact;
use crate::client::GeminiClient;
use crate::config::AgentConfig;
use crate::error::Result;
use crate::image::{AspectRatio, GeneratedImage, ImageGenerator, ImageRequest};
use crate::merge::{MediaMerger, MergeOutcome};
use crate::poll::{Clock, JobPoller};
use crate::speech::{SpeechSynthesizer, DEFAULT_VOICE};
use crate::text::TextGenerator;
use crate::video::{VeoClient, VideoRequest, VideoSource};
use std::path::Path;
use std::sync::Arc;

/// Generates and assembles media with a single credential.
///
/// ```no_run
/// use genreel::{AgentConfig, VideoAgent, VideoRequest};
///
/// #[tokio::main]
/// async fn main() -> genreel::Result<()> {
///     let agent = VideoAgent::new(AgentConfig::from_env()?);
///     let script = agent.generate_text("Two sentences about tide pools", None).await?;
///     let audio = agent.generate_audio(&script, None, "narration.wav").await?;
///     let video = agent
///         .generate_video(&VideoRequest::new("Tide pools at dawn"), "clip.mp4")
///         .await?;
///     let merged = agent
///         .merge_media(video.path().unwrap(), audio.path().unwrap(), "final.mp4")
///         .await;
///     println!("{}", merged.path().display());
///     Ok(())
/// }
/// ```
pub struct VideoAgent {
    config: AgentConfig,
    text: TextGenerator,
    image: ImageGenerator,
    speech: SpeechSynthesizer,
    video: VeoClient,
    poller: JobPoller,
    merger: MediaMerger,
}

impl std::fmt::Debug for VideoAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoAgent")
            .field("config", &self.config)
            .field("poller", &self.poller)
            .field("merger", &self.merger)
            .finish_non_exhaustive()
    }
}

impl VideoAgent {
    /// Wires every generator to one shared HTTP client.
    pub fn new(config: AgentConfig) -> Self {
        let client = GeminiClient::new(reqwest::Client::new(), &config);

        Self {
            text: TextGenerator::new(client.clone(), config.text_model.clone()),
            image: ImageGenerator::new(client.clone(), config.image_model.clone()),
            speech: SpeechSynthesizer::new(client.clone(), config.audio_model.clone()),
            video: VeoClient::new(client, config.video_model.clone()),
            poller: JobPoller::new(config.poll),
            merger: MediaMerger::new(config.ffmpeg.clone()),
            config,
        }
    }

    /// Builds from `GOOGLE_API_KEY` and defaults.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(AgentConfig::from_env()?))
    }

    /// Replaces the clock the video poller sleeps on.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.poller = self.poller.with_clock(clock);
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Text generator.
    pub fn text(&self) -> &TextGenerator {
        &self.text
    }

    /// Image generator.
    pub fn image(&self) -> &ImageGenerator {
        &self.image
    }

    /// Speech synthesizer.
    pub fn speech(&self) -> &SpeechSynthesizer {
        &self.speech
    }

    /// Video client.
    pub fn video(&self) -> &VeoClient {
        &self.video
    }

    /// Answers `prompt`, optionally steered by a system instruction.
    pub async fn generate_text(&self, prompt: &str, system: Option<&str>) -> Result<String> {
        tracing::info!(model = %self.text.model(), "generating text");
        let text = self.text.generate(prompt, system).await?;
        tracing::info!(model = %self.text.model(), bytes = text.len(), "text generated");
        Ok(text)
    }

    /// Generates one image and keeps it in memory.
    pub async fn generate_image(
        &self,
        prompt: &str,
        aspect_ratio: AspectRatio,
    ) -> Result<MediaArtifact> {
        let request = ImageRequest::new(prompt).with_aspect_ratio(aspect_ratio);
        Ok(self.generate_image_with(&request).await?.into_artifact())
    }

    /// Generates one image from a full request.
    pub async fn generate_image_with(&self, request: &ImageRequest) -> Result<GeneratedImage> {
        tracing::info!(
            model = %self.image.model(),
            aspect_ratio = %request.aspect_ratio,
            "generating image"
        );
        let image = self.image.generate(request).await?;
        tracing::info!(
            model = %self.image.model(),
            bytes = image.size(),
            format = image.format.extension(),
            "image generated"
        );
        Ok(image)
    }

    /// Narrates `text` and writes it to `output_path`.
    ///
    /// `voice` defaults to [`DEFAULT_VOICE`]. Raw PCM is saved as WAV.
    pub async fn generate_audio(
        &self,
        text: &str,
        voice: Option<&str>,
        output_path: impl AsRef<Path>,
    ) -> Result<MediaArtifact> {
        let output_path = output_path.as_ref();
        let voice = voice.unwrap_or(DEFAULT_VOICE);
        tracing::info!(model = %self.speech.model(), voice, "generating audio");

        let audio = self.speech.synthesize(text, voice).await?;
        let artifact = audio.save_artifact(output_path)?;

        tracing::info!(
            model = %self.speech.model(),
            output = %output_path.display(),
            "audio saved"
        );
        Ok(artifact)
    }

    /// Generates a video, waits for it, and writes it to `output_path`.
    ///
    /// The returned artifact keeps the service URI so the clip can be
    /// passed to [`extend_video`](Self::extend_video).
    pub async fn generate_video(
        &self,
        request: &VideoRequest,
        output_path: impl AsRef<Path>,
    ) -> Result<MediaArtifact> {
        let output_path = output_path.as_ref();
        tracing::info!(
            model = %self.video.model(),
            aspect_ratio = %request.aspect_ratio,
            duration_secs = request.duration_secs,
            image = request.image.is_some(),
            extension = request.is_extension(),
            "generating video"
        );

        let video = self.video.generate(request, &self.poller).await?;
        let artifact = video.save_artifact(output_path)?;

        tracing::info!(
            model = %self.video.model(),
            output = %output_path.display(),
            bytes = video.size(),
            "video saved"
        );
        Ok(artifact)
    }

    /// Continues `source` with a new prompt.
    pub async fn extend_video(
        &self,
        source: VideoSource,
        prompt: &str,
        output_path: impl AsRef<Path>,
    ) -> Result<MediaArtifact> {
        let request = VideoRequest::extend(source, prompt);
        self.generate_video(&request, output_path).await
    }

    /// Lays `audio` under `video`; never fails, see [`MergeOutcome`].
    pub async fn merge_media(
        &self,
        video: impl AsRef<Path>,
        audio: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> MergeOutcome {
        let (video, audio, output) = (video.as_ref(), audio.as_ref(), output.as_ref());
        tracing::info!(
            program = %self.merger.program().display(),
            output = %output.display(),
            "merging media"
        );

        let outcome = self.merger.merge(video, audio, output).await;
        tracing::info!(
            merged = outcome.is_merged(),
            output = %outcome.path().display(),
            "merge finished"
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poll::PollPolicy;
    use std::time::Duration;

    fn config() -> AgentConfig {
        AgentConfig::builder()
            .credential("test-key")
            .video_model("veo-test")
            .ffmpeg("/opt/ffmpeg/bin/ffmpeg")
            .poll_policy(PollPolicy::default().with_interval(Duration::from_secs(5)))
            .build()
            .unwrap()
    }

    #[test]
    fn test_agent_wires_config() {
        let agent = VideoAgent::new(config());
        assert_eq!(agent.text().model(), crate::config::DEFAULT_TEXT_MODEL);
        assert_eq!(agent.image().model(), crate::config::DEFAULT_IMAGE_MODEL);
        assert_eq!(agent.speech().model(), crate::config::DEFAULT_AUDIO_MODEL);
        assert_eq!(agent.video().model(), "veo-test");
        assert_eq!(agent.merger.program(), Path::new("/opt/ffmpeg/bin/ffmpeg"));
        assert_eq!(agent.poller.policy().interval, Duration::from_secs(5));
    }

    #[test]
    fn test_debug_hides_credential() {
        let agent = VideoAgent::new(config());
        assert!(!format!("{agent:?}").contains("test-key"));
    }

    #[tokio::test]
    async fn test_merge_media_reports_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("clip.mp4");
        std::fs::write(&video, b"video").unwrap();

        let outcome = VideoAgent::new(config())
            .merge_media(&video, dir.path().join("missing.wav"), dir.path().join("final.mp4"))
            .await;

        assert!(!outcome.is_merged());
        assert_eq!(outcome.path(), video.as_path());
    }
}
