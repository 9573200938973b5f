//! Builds the provider request from reconstructed history and the current
//! user message.

use crate::ai::mime::{detect_image_mime, recognized_image_mime};
use crate::models::{
    ContentPart, ConversationTurn, GenerationParams, GenerationRequest, NormalizedImage, Role,
    CANONICAL_IMAGE_MIME,
};
use crate::prompts;

/// Everything the client sent for the current turn.
#[derive(Debug, Clone, Default)]
pub struct CurrentMessage {
    pub prompt: Option<String>,
    pub image: Option<NormalizedImage>,
    /// Content type the client declared for the uploaded image.
    pub declared_mime: Option<String>,
}

pub fn assemble(
    history: Vec<ConversationTurn>,
    current: CurrentMessage,
    system_instruction: String,
    params: GenerationParams,
) -> GenerationRequest {
    let prompt = current
        .prompt
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| prompts::DEFAULT_USER.to_string());

    let mut parts = vec![ContentPart::Text(prompt)];
    if let Some(image) = current.image {
        let mime_type = image_mime(&image, current.declared_mime.as_deref());
        parts.push(ContentPart::Image {
            bytes: image.bytes,
            mime_type,
        });
    }

    let mut turns = history;
    turns.push(ConversationTurn {
        role: Role::User,
        parts,
    });

    GenerationRequest {
        system_instruction,
        turns,
        params,
    }
}

/// Normalizer output wins, then the declared content type, then sniffing,
/// then the canonical type.
fn image_mime(image: &NormalizedImage, declared: Option<&str>) -> String {
    image
        .mime_type
        .clone()
        .or_else(|| declared.and_then(recognized_image_mime))
        .or_else(|| detect_image_mime(&image.bytes).map(str::to_string))
        .unwrap_or_else(|| CANONICAL_IMAGE_MIME.to_string())
}
