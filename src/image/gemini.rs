//! Gemini image generation.

use crate::client::{
    GeminiClient, GenerateContentRequest, GenerationConfig, ImageConfig, RequestPart,
};
use crate::error::{GenReelError, Result};
use crate::image::types::{GeneratedImage, ImageFormat, ImageMetadata, ImageRequest};
use std::time::Instant;

/// Generates still images with the configured image model.
#[derive(Clone)]
pub struct ImageGenerator {
    client: GeminiClient,
    model: String,
}

impl ImageGenerator {
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

    /// Generates an image, returning the decoded bytes.
    pub async fn generate(&self, request: &ImageRequest) -> Result<GeneratedImage> {
        let start = Instant::now();

        let body = build_request(request);
        let response = self.client.generate_content(&self.model, &body).await?;

        let inline_data = response
            .into_first_candidate()?
            .into_inline_data()
            .ok_or_else(|| {
                GenReelError::UnexpectedResponse("No image data in Gemini response".into())
            })?;

        let data = inline_data.decode()?;
        let format = ImageFormat::from_mime_type(&inline_data.mime_type)
            .or_else(|| ImageFormat::from_magic_bytes(&data))
            .unwrap_or_default();

        let duration_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(model = %self.model, bytes = data.len(), duration_ms, "image generated");

        Ok(GeneratedImage::new(
            data,
            format,
            ImageMetadata {
                model: Some(self.model.clone()),
                seed: request.seed,
                duration_ms: Some(duration_ms),
            },
        ))
    }
}

fn build_request(req: &ImageRequest) -> GenerateContentRequest {
    let mut parts = Vec::new();

    // Input image goes first when editing
    if let Some(ref image_data) = req.input_image {
        let mime_type = ImageFormat::from_magic_bytes(image_data)
            .map(|f| f.mime_type())
            .unwrap_or("image/png");
        parts.push(RequestPart::inline(mime_type, image_data));
    }

    parts.push(RequestPart::text(req.prompt.clone()));

    GenerateContentRequest::user(parts).with_config(GenerationConfig {
        response_modalities: Some(vec!["TEXT".to_string(), "IMAGE".to_string()]),
        seed: req.seed,
        image_config: Some(ImageConfig {
            aspect_ratio: req.aspect_ratio.as_str().to_string(),
        }),
        ..Default::default()
    })
}
