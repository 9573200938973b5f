//! Generative provider integration
//!
//! Provides the provider-agnostic [`GenerationService`] seam, the Gemini REST
//! implementation, and a scripted mock for tests.

pub mod gemini;
pub mod mime;
pub mod mock;

pub use gemini::GeminiGenerateClient;
pub use mock::MockGenerationClient;

use crate::models::GenerationRequest;
use crate::Result;
use async_trait::async_trait;

#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Issues one call to the provider. `Ok(None)` means the call succeeded
    /// but produced no text.
    async fn generate(&self, request: &GenerationRequest) -> Result<Option<String>>;
}
