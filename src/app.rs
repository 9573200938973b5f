//! Request orchestration for image analysis.
//!
//! Each call to [`App::analyze`] walks one request through
//! reconstruct/normalize, assemble, generate and map. Nothing survives the
//! call except the shared provider gateway.

use crate::assembler::{assemble, CurrentMessage};
use crate::gateway::ProviderGateway;
use crate::history;
use crate::image::{ImageNormalizer, ImageService};
use crate::models::{Config, GenerationParams, UploadedImage};
use crate::prompts;
use crate::response::AnalyzeResponse;
use std::sync::Arc;
use tracing::{info, warn};

/// One inbound analyze request.
#[derive(Debug, Clone, Default)]
pub struct AnalyzeInput {
    pub prompt: Option<String>,
    pub image: Option<UploadedImage>,
    pub system_instruction: String,
    pub history: Option<String>,
}

/// Shared, request-independent services.
pub struct App {
    gateway: Arc<ProviderGateway>,
    image: Arc<dyn ImageService>,
    params: GenerationParams,
}

/// Injectable service bundle used to construct [`App`] in tests/harnesses.
pub struct AppServices {
    pub gateway: Arc<ProviderGateway>,
    pub image: Arc<dyn ImageService>,
}

impl App {
    pub fn with_services(services: AppServices, params: GenerationParams) -> Self {
        Self {
            gateway: services.gateway,
            image: services.image,
            params,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::with_services(
            AppServices {
                gateway: Arc::new(ProviderGateway::from_config(config)),
                image: Arc::new(ImageNormalizer::new(config.image)),
            },
            config.generation,
        )
    }

    pub fn gateway(&self) -> &ProviderGateway {
        &self.gateway
    }

    pub async fn analyze(&self, input: AnalyzeInput) -> AnalyzeResponse {
        if !self.gateway.ensure_ready().await {
            warn!("Rejecting request: provider client not initialized");
            return AnalyzeResponse::error(crate::gateway::NOT_INITIALIZED_MESSAGE);
        }

        let history = history::reconstruct(input.history.as_deref());

        let (image, declared_mime) = match input.image {
            Some(upload) => {
                let normalized = self.image.normalize(upload.bytes).await;
                (Some(normalized), upload.content_type)
            }
            None => (None, None),
        };

        info!(
            "System instructions (persona): {}",
            prompts::preview(&input.system_instruction, 50)
        );
        info!(
            "User prompt: {}",
            input.prompt.as_deref().unwrap_or(prompts::DEFAULT_USER)
        );

        let request = assemble(
            history,
            CurrentMessage {
                prompt: input.prompt,
                image,
                declared_mime,
            },
            input.system_instruction,
            self.params,
        );

        info!("Total turns sent to provider: {}", request.turns.len());

        let result = self.gateway.generate(&request).await;
        AnalyzeResponse::from(result)
    }
}
