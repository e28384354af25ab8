//! Veo (Google) video generation and extension.

use crate::client::{Blob, GeminiClient};
use crate::error::{GenReelError, Result};
use crate::image::AspectRatio;
use crate::poll::{JobPoller, PendingJob};
use crate::video::types::{GeneratedVideo, VideoMetadata, VideoRequest, VideoSource};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Submits Veo jobs and downloads their results.
#[derive(Clone)]
pub struct VeoClient {
    client: GeminiClient,
    model: String,
}

impl VeoClient {
    pub(crate) fn new(client: GeminiClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    /// Model identifier in use.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Submits a generation (or extension) job.
    pub async fn submit(&self, request: &VideoRequest) -> Result<VeoOperation> {
        let body = VeoRequest::from_request(request)?;
        let url = self.client.model_url(&self.model, "predictLongRunning");

        let snapshot: VeoOperationResponse = self.client.post_json(&url, &body).await?;
        tracing::debug!(
            operation = %snapshot.name,
            extension = request.is_extension(),
            "submitted video generation request"
        );

        Ok(VeoOperation {
            veo: self.clone(),
            name: snapshot.name.clone(),
            snapshot,
        })
    }

    /// Downloads a finished video by URI.
    pub async fn download(&self, uri: &str) -> Result<Vec<u8>> {
        self.client.download(uri).await
    }

    /// Submits, waits with `poller`, and downloads.
    pub async fn generate(
        &self,
        request: &VideoRequest,
        poller: &JobPoller,
    ) -> Result<GeneratedVideo> {
        let start = Instant::now();

        let operation = self.submit(request).await?;
        let operation_name = operation.id().to_string();

        let video_ref = poller.wait(operation).await?;
        tracing::debug!(uri = %video_ref.uri, "video generation complete");

        let data = self.download(&video_ref.uri).await?;
        let params = VeoParameters::from_request(request);

        Ok(GeneratedVideo {
            data,
            mime_type: "video/mp4".to_string(),
            uri: Some(video_ref.uri),
            metadata: VideoMetadata {
                model: Some(self.model.clone()),
                operation: Some(operation_name),
                duration_ms: Some(start.elapsed().as_millis() as u64),
                video_duration_secs: Some(params.duration_seconds),
                resolution: params.resolution,
            },
        })
    }
}

/// Reference to a finished video, produced by a completed [`VeoOperation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoRef {
    /// Operation that produced the video.
    pub operation: String,
    /// Download URI of the first generated sample.
    pub uri: String,
}

/// Handle on a running Veo job.
pub struct VeoOperation {
    veo: VeoClient,
    name: String,
    snapshot: VeoOperationResponse,
}

impl std::fmt::Debug for VeoOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VeoOperation")
            .field("name", &self.name)
            .field("done", &self.snapshot.is_terminal())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl PendingJob for VeoOperation {
    type Output = VideoRef;

    fn id(&self) -> &str {
        &self.name
    }

    fn is_done(&self) -> bool {
        self.snapshot.is_terminal()
    }

    async fn refresh(&mut self) -> Result<()> {
        // Terminal snapshots never change.
        if self.snapshot.is_terminal() {
            return Ok(());
        }
        let url = self.veo.client.resource_url(&self.name);
        self.snapshot = self.veo.client.get_json(&url).await?;
        Ok(())
    }

    fn into_outcome(self) -> Result<VideoRef> {
        let uri = self.snapshot.into_video_uri()?;
        Ok(VideoRef {
            operation: self.name,
            uri,
        })
    }
}

// ── Request wire format ─────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VeoRequest {
    instances: Vec<VeoInstance>,
    parameters: VeoParameters,
}

/// Media payload: either uploaded inline or referenced by URI.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
enum VeoMedia {
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: Blob,
    },
    Uri {
        uri: String,
    },
}

impl VeoMedia {
    fn inline(mime_type: &str, data: &[u8]) -> Self {
        use base64::Engine;
        Self::Inline {
            inline_data: Blob {
                mime_type: mime_type.to_string(),
                data: base64::engine::general_purpose::STANDARD.encode(data),
            },
        }
    }
}

impl From<&VideoSource> for VeoMedia {
    fn from(source: &VideoSource) -> Self {
        match source {
            VideoSource::Uri(uri) => Self::Uri { uri: uri.clone() },
            VideoSource::Inline { data, mime_type } => Self::inline(mime_type, data),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VeoInstance {
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<VeoMedia>,
    /// Video input for extension.
    #[serde(skip_serializing_if = "Option::is_none")]
    video: Option<VeoMedia>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VeoParameters {
    aspect_ratio: String,
    duration_seconds: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    resolution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    negative_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    number_of_videos: Option<u32>,
}

impl VeoParameters {
    fn from_request(req: &VideoRequest) -> Self {
        let is_extension = req.is_extension();

        // Frames and extensions only support 8 second clips
        let duration_seconds = if is_extension || req.image.is_some() {
            8
        } else {
            req.duration_secs
        };

        // Extension requires 720p and a single sample
        let resolution = if is_extension {
            Some("720p".to_string())
        } else {
            req.resolution.clone()
        };
        let number_of_videos = is_extension.then_some(1);

        Self {
            aspect_ratio: req.aspect_ratio.as_str().to_string(),
            duration_seconds,
            resolution,
            negative_prompt: req.negative_prompt.clone(),
            number_of_videos,
        }
    }
}

impl VeoRequest {
    fn from_request(req: &VideoRequest) -> Result<Self> {
        if req.prompt.trim().is_empty() && req.image.is_none() {
            return Err(GenReelError::InvalidRequest(
                "video prompt must not be empty".into(),
            ));
        }
        if !matches!(req.aspect_ratio, AspectRatio::Landscape | AspectRatio::Portrait) {
            return Err(GenReelError::InvalidRequest(format!(
                "Veo supports 16:9 and 9:16, not {}",
                req.aspect_ratio
            )));
        }
        if req.duration_secs == 0 {
            return Err(GenReelError::InvalidRequest(
                "video duration must be at least one second".into(),
            ));
        }

        Ok(Self {
            instances: vec![VeoInstance {
                prompt: req.prompt.clone(),
                image: req
                    .image
                    .as_ref()
                    .map(|img| VeoMedia::inline(&img.mime_type, &img.data)),
                video: req.source_video.as_ref().map(VeoMedia::from),
            }],
            parameters: VeoParameters::from_request(req),
        })
    }
}

// ── Operation wire format ───────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct VeoOperationResponse {
    name: String,
    #[serde(default)]
    done: Option<bool>,
    #[serde(default)]
    response: Option<VeoVideoResponse>,
    #[serde(default)]
    error: Option<VeoError>,
}

impl VeoOperationResponse {
    /// An error is terminal even when `done` is missing.
    fn is_terminal(&self) -> bool {
        self.done.unwrap_or(false) || self.error.is_some()
    }

    fn into_video_uri(self) -> Result<String> {
        // Check for error FIRST before checking response
        if let Some(err) = self.error {
            return Err(GenReelError::VideoGeneration(
                err.message.unwrap_or_else(|| "Unknown error".into()),
            ));
        }

        if let Some(gen_resp) = self.response.and_then(|r| r.generate_video_response) {
            let samples = gen_resp.generated_samples.unwrap_or_default();
            if samples.is_empty() && gen_resp.rai_media_filtered_count.unwrap_or(0) > 0 {
                let reason = gen_resp
                    .rai_media_filtered_reasons
                    .and_then(|r| r.into_iter().next())
                    .unwrap_or_else(|| "Video was filtered by Veo safety filters".into());
                return Err(GenReelError::ContentBlocked(reason));
            }

            if let Some(uri) = samples
                .into_iter()
                .next()
                .and_then(|s| s.video)
                .and_then(|v| v.uri)
            {
                return Ok(uri);
            }
        }

        Err(GenReelError::UnexpectedResponse(
            "Video generation completed but no video URL returned".into(),
        ))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VeoVideoResponse {
    #[serde(default)]
    generate_video_response: Option<VeoGenerateVideoResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VeoGenerateVideoResponse {
    #[serde(default)]
    generated_samples: Option<Vec<VeoGeneratedSample>>,
    #[serde(default)]
    rai_media_filtered_count: Option<u32>,
    #[serde(default)]
    rai_media_filtered_reasons: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct VeoGeneratedSample {
    #[serde(default)]
    video: Option<VeoVideo>,
}

#[derive(Debug, Deserialize)]
struct VeoVideo {
    #[serde(default)]
    uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VeoError {
    #[serde(default)]
    message: Option<String>,
}
