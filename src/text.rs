//! Text generation (scripts, plans, narration).

use crate::client::{GeminiClient, GenerateContentRequest, RequestPart};
use crate::error::{GenReelError, Result};

/// Calls `generateContent` on the configured text model.
#[derive(Clone)]
pub struct TextGenerator {
    client: GeminiClient,
    model: String,
}

impl TextGenerator {
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

    /// Generates text for `prompt`, optionally steered by a system instruction.
    pub async fn generate(&self, prompt: &str, system_instruction: Option<&str>) -> Result<String> {
        let body = build_request(prompt, system_instruction);
        let response = self.client.generate_content(&self.model, &body).await?;

        response.into_first_candidate()?.text().ok_or_else(|| {
            GenReelError::UnexpectedResponse("No text in Gemini response".into())
        })
    }
}

fn build_request(prompt: &str, system_instruction: Option<&str>) -> GenerateContentRequest {
    let request = GenerateContentRequest::user(vec![RequestPart::text(prompt)]);
    match system_instruction {
        Some(instruction) => request.with_system_instruction(instruction),
        None => request,
    }
}
