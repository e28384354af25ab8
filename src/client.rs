//! Shared transport for the Gemini Developer API.
//!
//! Text, image and speech generation all go through `generateContent`; video
//! uses `predictLongRunning` plus operation polling. Authentication, error
//! translation and the content wire format live here once.

use crate::config::AgentConfig;
use crate::error::{parse_retry_after, sanitize_error_message, GenReelError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Host that serves generated files for the Developer API.
const GEMINI_FILES_HOST: &str = "https://generativelanguage.googleapis.com/";

/// Authenticated handle on the generation service.
#[derive(Clone)]
pub(crate) struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub(crate) fn new(http: reqwest::Client, config: &AgentConfig) -> Self {
        Self {
            http,
            api_key: config.credential.clone(),
            base_url: config.base_url.clone(),
        }
    }

    /// `{base}/models/{model}:{method}`
    pub(crate) fn model_url(&self, model: &str, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, model, method)
    }

    /// `{base}/{name}` for resources such as `models/x/operations/y`.
    pub(crate) fn resource_url(&self, name: &str) -> String {
        format!("{}/{}", self.base_url, name.trim_start_matches('/'))
    }

    pub(crate) async fn generate_content(
        &self,
        model: &str,
        body: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        let url = self.model_url(model, "generateContent");
        self.post_json(&url, body).await
    }

    pub(crate) async fn post_json<B, R>(&self, url: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        tracing::debug!(%url, "POST");
        let response = self
            .http
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;
        Self::decode(response).await
    }

    pub(crate) async fn get_json<R: DeserializeOwned>(&self, url: &str) -> Result<R> {
        tracing::debug!(%url, "GET");
        let response = self
            .http
            .get(url)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await?;
        Self::decode(response).await
    }

    /// Fetches a generated file.
    pub(crate) async fn download(&self, url: &str) -> Result<Vec<u8>> {
        if url.starts_with("gs://") {
            return Err(GenReelError::VideoGeneration(format!(
                "the service returned a Google Cloud Storage URI ({url}) which cannot be \
                 downloaded with an API key; fetch it with `gsutil cp` instead"
            )));
        }

        let mut request = self.http.get(self.download_url(url));
        if self.is_service_url(url) {
            request = request.header("x-goog-api-key", &self.api_key);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            return Err(parse_error(status.as_u16(), &text, &headers));
        }

        Ok(response.bytes().await?.to_vec())
    }

    /// Whether `url` points at the configured service or the Gemini file host.
    fn is_service_url(&self, url: &str) -> bool {
        let under_base = url
            .strip_prefix(self.base_url.as_str())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with(['/', '?']));
        under_base || url.starts_with(GEMINI_FILES_HOST)
    }

    /// File downloads from the service also want the key as a query parameter.
    /// Any other host gets the URL untouched.
    fn download_url(&self, url: &str) -> String {
        if !self.is_service_url(url) {
            url.to_string()
        } else if url.contains('?') {
            format!("{}&key={}", url, self.api_key)
        } else {
            format!("{}?key={}", url, self.api_key)
        }
    }

    async fn decode<R: DeserializeOwned>(response: reqwest::Response) -> Result<R> {
        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            return Err(parse_error(status.as_u16(), &text, &headers));
        }
        // Shape mismatches are Json errors, not transport ones.
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

/// Maps an HTTP failure onto the error taxonomy.
pub(crate) fn parse_error(
    status: u16,
    text: &str,
    headers: &reqwest::header::HeaderMap,
) -> GenReelError {
    let text = sanitize_error_message(text);
    if status == 402 {
        return GenReelError::Api {
            status,
            message: "billing issue: enable billing at https://aistudio.google.com".into(),
        };
    }
    if status == 404 {
        return GenReelError::InvalidRequest(format!(
            "model or resource not found ({text}). Verify the model name; Veo models \
             require a paid-tier API key."
        ));
    }
    if status == 429 {
        let retry_after = parse_retry_after(headers).map(std::time::Duration::from_secs);
        return GenReelError::RateLimited { retry_after };
    }
    if status == 401 || status == 403 {
        return GenReelError::Auth(text);
    }
    let lower = text.to_lowercase();
    if lower.contains("safety")
        || lower.contains("blocked")
        || lower.contains("content_policy")
        || lower.contains("prohibited")
    {
        return GenReelError::ContentBlocked(text);
    }
    GenReelError::Api {
        status,
        message: text,
    }
}

// ── generateContent wire format ─────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

impl GenerateContentRequest {
    /// A single user turn made of `parts`.
    pub(crate) fn user(parts: Vec<RequestPart>) -> Self {
        Self {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts,
            }],
            system_instruction: None,
            generation_config: None,
        }
    }

    pub(crate) fn with_system_instruction(mut self, text: impl Into<String>) -> Self {
        self.system_instruction = Some(Content {
            role: None,
            parts: vec![RequestPart::text(text)],
        });
        self
    }

    pub(crate) fn with_config(mut self, config: GenerationConfig) -> Self {
        self.generation_config = Some(config);
        self
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub parts: Vec<RequestPart>,
}

/// A part in a request - text or inline binary data.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub(crate) enum RequestPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: Blob,
    },
}

impl RequestPart {
    pub(crate) fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub(crate) fn inline(mime_type: impl Into<String>, data: &[u8]) -> Self {
        use base64::Engine;
        Self::InlineData {
            inline_data: Blob {
                mime_type: mime_type.into(),
                data: base64::engine::general_purpose::STANDARD.encode(data),
            },
        }
    }
}

/// Base64 payload with its MIME type (`inlineData`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Blob {
    pub mime_type: String,
    pub data: String,
}

impl Blob {
    pub(crate) fn decode(&self) -> Result<Vec<u8>> {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD
            .decode(&self.data)
            .map_err(|e| GenReelError::Decode(e.to_string()))
    }
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_modalities: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_config: Option<ImageConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speech_config: Option<SpeechConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ImageConfig {
    pub aspect_ratio: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SpeechConfig {
    pub voice_config: VoiceConfig,
}

impl SpeechConfig {
    pub(crate) fn prebuilt(voice_name: impl Into<String>) -> Self {
        Self {
            voice_config: VoiceConfig {
                prebuilt_voice_config: PrebuiltVoiceConfig {
                    voice_name: voice_name.into(),
                },
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VoiceConfig {
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PrebuiltVoiceConfig {
    pub voice_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub prompt_feedback: Option<PromptFeedback>,
}

impl GenerateContentResponse {
    /// Returns the first candidate, turning block signals into errors.
    pub(crate) fn into_first_candidate(self) -> Result<Candidate> {
        // Blocks are reported with HTTP 200
        if let Some(ref feedback) = self.prompt_feedback {
            if let Some(ref reason) = feedback.block_reason {
                let msg = feedback
                    .block_reason_message
                    .clone()
                    .unwrap_or_else(|| format!("Prompt blocked: {reason}"));
                return Err(GenReelError::ContentBlocked(msg));
            }
        }

        let candidate = self.candidates.into_iter().next().ok_or_else(|| {
            GenReelError::UnexpectedResponse("No candidates in Gemini response".into())
        })?;

        if let Some(ref finish_reason) = candidate.finish_reason {
            match finish_reason.as_str() {
                "SAFETY"
                | "IMAGE_SAFETY"
                | "IMAGE_PROHIBITED_CONTENT"
                | "IMAGE_RECITATION"
                | "RECITATION"
                | "PROHIBITED_CONTENT"
                | "BLOCKLIST"
                | "SPII" => {
                    return Err(GenReelError::ContentBlocked(format!(
                        "Content blocked by Gemini safety filter: {finish_reason}"
                    )));
                }
                "IMAGE_OTHER" | "NO_IMAGE" => {
                    return Err(GenReelError::UnexpectedResponse(format!(
                        "Generation failed: {finish_reason}. Try a different prompt."
                    )));
                }
                _ => {} // STOP, MAX_TOKENS, etc. are normal
            }
        }

        Ok(candidate)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Candidate {
    #[serde(default)]
    pub content: Option<ResponseContent>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

impl Candidate {
    /// Concatenated text of all text parts, if any.
    pub(crate) fn text(&self) -> Option<String> {
        let parts = &self.content.as_ref()?.parts;
        let texts: Vec<&str> = parts.iter().filter_map(|p| p.text.as_deref()).collect();
        if texts.is_empty() {
            None
        } else {
            Some(texts.concat())
        }
    }

    /// First inline payload, if any.
    pub(crate) fn into_inline_data(self) -> Option<Blob> {
        self.content?.parts.into_iter().find_map(|p| p.inline_data)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PromptFeedback {
    #[serde(default)]
    pub block_reason: Option<String>,
    #[serde(default)]
    pub block_reason_message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResponseContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ResponsePart {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub inline_data: Option<Blob>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GeminiClient {
        let config = AgentConfig::builder()
            .credential("test-key")
            .base_url("http://localhost:9999/v1beta")
            .build()
            .unwrap();
        GeminiClient::new(reqwest::Client::new(), &config)
    }

    #[test]
    fn test_urls() {
        let client = client();
        assert_eq!(
            client.model_url("gemini-2.0-flash", "generateContent"),
            "http://localhost:9999/v1beta/models/gemini-2.0-flash:generateContent"
        );
        assert_eq!(
            client.resource_url("models/veo/operations/abc"),
            "http://localhost:9999/v1beta/models/veo/operations/abc"
        );
    }

    #[test]
    fn test_parse_error_by_status() {
        let headers = reqwest::header::HeaderMap::new();
        assert!(matches!(parse_error(401, "nope", &headers), GenReelError::Auth(_)));
        assert!(matches!(parse_error(403, "nope", &headers), GenReelError::Auth(_)));
        assert!(matches!(
            parse_error(404, "Not Found", &headers),
            GenReelError::InvalidRequest(_)
        ));
        assert!(matches!(
            parse_error(400, "request blocked by safety settings", &headers),
            GenReelError::ContentBlocked(_)
        ));
        assert!(matches!(
            parse_error(500, "boom", &headers),
            GenReelError::Api { status: 500, .. }
        ));
    }

    #[test]
    fn test_parse_error_rate_limited_reads_retry_after() {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(reqwest::header::RETRY_AFTER, "30".parse().unwrap());
        match parse_error(429, "slow down", &headers) {
            GenReelError::RateLimited { retry_after } => {
                assert_eq!(retry_after, Some(std::time::Duration::from_secs(30)));
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_gs_url_is_refused() {
        let err = client().download("gs://bucket/video.mp4").await.unwrap_err();
        assert!(
            err.to_string().contains("Google Cloud Storage"),
            "Expected GCS error, got: {err}"
        );
    }

    #[test]
    fn test_download_key_only_sent_to_service_hosts() {
        let client = client();
        assert_eq!(
            client.download_url("http://localhost:9999/v1beta/files/v:download?alt=media"),
            "http://localhost:9999/v1beta/files/v:download?alt=media&key=test-key"
        );
        assert_eq!(
            client.download_url(
                "https://generativelanguage.googleapis.com/v1beta/files/v:download"
            ),
            "https://generativelanguage.googleapis.com/v1beta/files/v:download?key=test-key"
        );
        assert_eq!(
            client.download_url("https://cdn.example.com/video.mp4?sig=abc"),
            "https://cdn.example.com/video.mp4?sig=abc"
        );
        assert_eq!(
            client.download_url("http://localhost:9999/v1beta.example.com/video.mp4"),
            "http://localhost:9999/v1beta.example.com/video.mp4"
        );
        assert!(!client.is_service_url("https://generativelanguage.googleapis.com.evil/x"));
    }

    #[test]
    fn test_request_serialization_uses_camel_case() {
        let req = GenerateContentRequest::user(vec![RequestPart::text("hi")])
            .with_system_instruction("be brief")
            .with_config(GenerationConfig {
                response_modalities: Some(vec!["AUDIO".into()]),
                speech_config: Some(SpeechConfig::prebuilt("Puck")),
                ..Default::default()
            });
        let json = serde_json::to_value(&req).unwrap();

        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hi");
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "be brief");
        assert!(json["systemInstruction"].get("role").is_none());
        assert_eq!(json["generationConfig"]["responseModalities"][0], "AUDIO");
        assert_eq!(
            json["generationConfig"]["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]
                ["voiceName"],
            "Puck"
        );
        assert!(json["generationConfig"].get("imageConfig").is_none());
    }

    #[test]
    fn test_inline_part_serialization() {
        let part = RequestPart::inline("image/png", &[1, 2, 3]);
        let json = serde_json::to_value(&part).unwrap();
        assert_eq!(json["inlineData"]["mimeType"], "image/png");
        assert_eq!(json["inlineData"]["data"], "AQID");
    }

    #[test]
    fn test_prompt_feedback_block() {
        let json = r#"{
            "candidates": [],
            "promptFeedback": {
                "blockReason": "SAFETY",
                "blockReasonMessage": "Prompt was blocked due to safety"
            }
        }"#;
        let resp: GenerateContentResponse = serde_json::from_str(json).unwrap();
        match resp.into_first_candidate() {
            Err(GenReelError::ContentBlocked(msg)) => {
                assert_eq!(msg, "Prompt was blocked due to safety");
            }
            other => panic!("expected ContentBlocked, got {other:?}"),
        }
    }

    #[test]
    fn test_safety_finish_reason() {
        let json = r#"{"candidates": [{"finishReason": "IMAGE_SAFETY"}]}"#;
        let resp: GenerateContentResponse = serde_json::from_str(json).unwrap();
        assert!(matches!(
            resp.into_first_candidate(),
            Err(GenReelError::ContentBlocked(_))
        ));
    }

    #[test]
    fn test_no_candidates() {
        let resp: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert!(matches!(
            resp.into_first_candidate(),
            Err(GenReelError::UnexpectedResponse(_))
        ));
    }

    #[test]
    fn test_candidate_text_and_inline_data() {
        let json = r#"{
            "candidates": [{
                "content": {
                    "parts": [
                        {"text": "Here is "},
                        {"text": "your image"},
                        {"inlineData": {"mimeType": "image/png", "data": "AQID"}}
                    ]
                },
                "finishReason": "STOP"
            }]
        }"#;
        let resp: GenerateContentResponse = serde_json::from_str(json).unwrap();
        let candidate = resp.into_first_candidate().unwrap();
        assert_eq!(candidate.text().as_deref(), Some("Here is your image"));

        let blob = candidate.into_inline_data().unwrap();
        assert_eq!(blob.mime_type, "image/png");
        assert_eq!(blob.decode().unwrap(), vec![1, 2, 3]);
    }
}
