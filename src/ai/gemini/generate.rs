use super::client::GeminiHttpClient;
use super::types::{
    Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, InlineData, Part,
};
use crate::ai::GenerationService;
use crate::models::{ContentPart, ConversationTurn, GenerationRequest};
use crate::Result;
use async_trait::async_trait;
use base64::Engine as _;

/// Gemini implementation of [`GenerationService`].
pub struct GeminiGenerateClient {
    http: GeminiHttpClient,
}

impl GeminiGenerateClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self::new_with_client(api_key, model, reqwest::Client::new())
    }

    pub fn new_with_client(api_key: String, model: String, client: reqwest::Client) -> Self {
        Self {
            http: GeminiHttpClient::new_with_client(api_key, model, client),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.http = self.http.with_base_url(base_url);
        self
    }

    pub fn model(&self) -> &str {
        self.http.model()
    }

    fn to_wire(request: &GenerationRequest) -> GenerateContentRequest {
        GenerateContentRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part::Text {
                    text: request.system_instruction.clone(),
                }],
            },
            contents: request.turns.iter().map(Self::turn_to_content).collect(),
            generation_config: GenerationConfig {
                max_output_tokens: request.params.max_output_tokens,
                temperature: request.params.temperature,
                top_p: request.params.top_p,
            },
        }
    }

    fn turn_to_content(turn: &ConversationTurn) -> Content {
        let parts = turn
            .parts
            .iter()
            .map(|part| match part {
                ContentPart::Text(text) => Part::Text { text: text.clone() },
                ContentPart::Image { bytes, mime_type } => Part::InlineData {
                    inline_data: InlineData {
                        mime_type: mime_type.clone(),
                        data: base64::engine::general_purpose::STANDARD.encode(bytes),
                    },
                },
            })
            .collect();

        Content {
            role: Some(turn.role.as_str().to_string()),
            parts,
        }
    }
}

#[async_trait]
impl GenerationService for GeminiGenerateClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<Option<String>> {
        let wire = Self::to_wire(request);

        tracing::debug!(
            "Sending {} turns to Gemini model {}",
            wire.contents.len(),
            self.model()
        );

        let response: GenerateContentResponse = self.http.generate_content(&wire).await?;

        if let Some(reason) = response.finish_reason() {
            tracing::debug!("Gemini finish reason: {}", reason);
        }

        Ok(response.text())
    }
}
