//! Speech synthesis (narration).
//!
//! The TTS models answer with raw 16-bit PCM (`audio/L16;codec=pcm;rate=24000`).
//! Raw PCM is neither playable nor accepted by the merge step, so
//! [`GeneratedAudio::save`] wraps it in a WAV container.

use crate::artifact::{MediaArtifact, MediaKind};
use crate::client::{
    GeminiClient, GenerateContentRequest, GenerationConfig, RequestPart, SpeechConfig,
};
use crate::error::{GenReelError, Result};
use std::path::Path;
use std::time::Instant;

/// Prebuilt voice used when the caller does not pick one.
pub const DEFAULT_VOICE: &str = "Puck";

const DEFAULT_SAMPLE_RATE: u32 = 24_000;

/// Synthesizes speech with the configured audio model.
#[derive(Clone)]
pub struct SpeechSynthesizer {
    client: GeminiClient,
    model: String,
}

impl SpeechSynthesizer {
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

    /// Reads `text` aloud with a prebuilt voice.
    pub async fn synthesize(&self, text: &str, voice: &str) -> Result<GeneratedAudio> {
        let start = Instant::now();

        let body = build_request(text, voice);
        let response = self.client.generate_content(&self.model, &body).await?;

        let inline_data = response
            .into_first_candidate()?
            .into_inline_data()
            .ok_or_else(|| {
                GenReelError::UnexpectedResponse("No audio data in Gemini response".into())
            })?;

        let data = inline_data.decode()?;
        let duration_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(
            model = %self.model,
            voice,
            mime_type = %inline_data.mime_type,
            bytes = data.len(),
            duration_ms,
            "speech synthesized"
        );

        Ok(GeneratedAudio {
            data,
            mime_type: inline_data.mime_type,
            metadata: AudioMetadata {
                model: Some(self.model.clone()),
                voice: Some(voice.to_string()),
                duration_ms: Some(duration_ms),
            },
        })
    }
}

fn build_request(text: &str, voice: &str) -> GenerateContentRequest {
    GenerateContentRequest::user(vec![RequestPart::text(text)]).with_config(GenerationConfig {
        response_modalities: Some(vec!["AUDIO".to_string()]),
        speech_config: Some(SpeechConfig::prebuilt(voice)),
        ..Default::default()
    })
}

/// Metadata about a synthesis call.
#[derive(Debug, Clone, Default)]
pub struct AudioMetadata {
    /// Model used for synthesis.
    pub model: Option<String>,
    /// Prebuilt voice name.
    pub voice: Option<String>,
    /// Generation duration in milliseconds.
    pub duration_ms: Option<u64>,
}

/// Synthesized audio as returned by the service.
#[derive(Debug, Clone)]
#[must_use = "generated audio should be saved or processed"]
pub struct GeneratedAudio {
    /// Raw audio bytes.
    pub data: Vec<u8>,
    /// MIME type as reported, including parameters.
    pub mime_type: String,
    /// Synthesis metadata.
    pub metadata: AudioMetadata,
}

impl GeneratedAudio {
    /// Whether the payload is headerless linear PCM.
    pub fn is_pcm(&self) -> bool {
        let base = self
            .mime_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        base == "audio/l16" || base == "audio/pcm"
    }

    /// Sample rate from the `rate=` MIME parameter.
    pub fn sample_rate(&self) -> u32 {
        self.mime_param("rate")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    /// Channel count from the `channels=` MIME parameter.
    pub fn channels(&self) -> u16 {
        self.mime_param("channels")
            .and_then(|v| v.parse().ok())
            .unwrap_or(1)
    }

    /// MIME type of the file [`save`](Self::save) writes.
    pub fn file_mime_type(&self) -> &str {
        if self.is_pcm() {
            "audio/wav"
        } else {
            self.mime_type.split(';').next().unwrap_or_default().trim()
        }
    }

    /// Writes the audio to `path`; PCM is wrapped as 16-bit WAV.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if !self.is_pcm() {
            std::fs::write(path, &self.data)?;
            return Ok(());
        }
        if self.data.len() % 2 != 0 {
            return Err(GenReelError::Decode(format!(
                "16-bit PCM payload has odd length {}",
                self.data.len()
            )));
        }

        let spec = hound::WavSpec {
            channels: self.channels(),
            sample_rate: self.sample_rate(),
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec)?;
        for frame in self.data.chunks_exact(2) {
            writer.write_sample(i16::from_le_bytes([frame[0], frame[1]]))?;
        }
        writer.finalize()?;
        Ok(())
    }

    /// Saves to `path` and returns the on-disk artifact.
    pub fn save_artifact(&self, path: impl AsRef<Path>) -> Result<MediaArtifact> {
        let path = path.as_ref();
        self.save(path)?;
        Ok(MediaArtifact::on_disk(
            MediaKind::Audio,
            self.file_mime_type(),
            path,
        ))
    }

    fn mime_param(&self, name: &str) -> Option<&str> {
        self.mime_type.split(';').skip(1).find_map(|param| {
            let (key, value) = param.split_once('=')?;
            (key.trim().eq_ignore_ascii_case(name)).then(|| value.trim())
        })
    }
}
