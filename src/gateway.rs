//! Process-wide provider handle.
//!
//! The gateway owns the one generation client shared by every request. It is
//! built lazily; a failed attempt (typically a missing credential) leaves it
//! unset so the next request tries again.

use crate::ai::{GeminiGenerateClient, GenerationService};
use crate::error::diagnostic;
use crate::models::{
    Config, FailureKind, GenerationRequest, GenerationResult, ProviderFailure, API_KEY_VAR,
};
use crate::{Error, Result};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{error, info, warn};

pub const NOT_INITIALIZED_MESSAGE: &str = "Gemini client not initialized";

/// Builds the provider client. Called until it first succeeds.
pub type ClientFactory = Box<dyn Fn() -> Result<Arc<dyn GenerationService>> + Send + Sync>;

pub struct ProviderGateway {
    client: OnceCell<Arc<dyn GenerationService>>,
    factory: ClientFactory,
}

impl ProviderGateway {
    pub fn new(factory: ClientFactory) -> Self {
        Self {
            client: OnceCell::new(),
            factory,
        }
    }

    /// A gateway that is ready from the start.
    pub fn with_client(client: Arc<dyn GenerationService>) -> Self {
        let gateway = Self::new(Box::new(|| {
            Err(Error::Invariant(
                "pre-initialized gateway has no factory".to_string(),
            ))
        }));
        // A fresh cell cannot already be set.
        let _ = gateway.client.set(client);
        gateway
    }

    /// Gemini gateway reading the credential from the environment on each
    /// initialization attempt.
    pub fn from_config(config: &Config) -> Self {
        let model = config.gemini_model.clone();
        let base_url = config.gemini_base_url.clone();

        Self::new(Box::new(move || {
            let api_key = Config::api_key_from_env()
                .ok_or_else(|| Error::Config(format!("{} not set", API_KEY_VAR)))?;
            let http = reqwest::Client::builder().build()?;

            info!("Initializing Gemini client (model: {})", model);
            let client = GeminiGenerateClient::new_with_client(api_key, model.clone(), http)
                .with_base_url(base_url.clone());
            Ok(Arc::new(client) as Arc<dyn GenerationService>)
        }))
    }

    pub fn is_ready(&self) -> bool {
        self.client.initialized()
    }

    /// Initializes the client if needed. Concurrent callers share a single
    /// initialization; never panics or errors.
    pub async fn ensure_ready(&self) -> bool {
        let outcome = self
            .client
            .get_or_try_init(|| async { (self.factory)() })
            .await;

        match outcome {
            Ok(_) => true,
            Err(e) => {
                warn!("Provider client unavailable: {}", e);
                false
            }
        }
    }

    /// Issues exactly one provider call. Callers are expected to have checked
    /// [`ensure_ready`](Self::ensure_ready); an unset handle yields a
    /// not-initialized failure without any call.
    pub async fn generate(&self, request: &GenerationRequest) -> GenerationResult {
        let Some(client) = self.client.get() else {
            return GenerationResult::Failure(ProviderFailure {
                kind: FailureKind::NotInitialized,
                message: NOT_INITIALIZED_MESSAGE.to_string(),
                diagnostic: None,
            });
        };

        match client.generate(request).await {
            Ok(text) => {
                info!("Successfully received response from provider");
                GenerationResult::from_text(text)
            }
            Err(e) => {
                let message = e.to_string();
                error!("Provider call failed: {}", message);
                GenerationResult::Failure(ProviderFailure {
                    kind: FailureKind::Provider,
                    message,
                    diagnostic: Some(diagnostic(e)),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockGenerationClient;
    use crate::models::GenerationParams;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn request() -> GenerationRequest {
        GenerationRequest {
            system_instruction: "persona".to_string(),
            turns: vec![],
            params: GenerationParams::default(),
        }
    }

    fn counting_factory(calls: Arc<AtomicUsize>, fail_first: usize) -> ClientFactory {
        Box::new(move || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < fail_first {
                Err(Error::Config(format!("{} not set", API_KEY_VAR)))
            } else {
                Ok(Arc::new(MockGenerationClient::new()) as Arc<dyn GenerationService>)
            }
        })
    }

    #[tokio::test]
    async fn test_missing_credential_leaves_gateway_unready() {
        let calls = Arc::new(AtomicUsize::new(0));
        let gateway = ProviderGateway::new(counting_factory(calls.clone(), usize::MAX));

        assert!(!gateway.ensure_ready().await);
        assert!(!gateway.is_ready());

        let result = gateway.generate(&request()).await;
        assert_eq!(
            result,
            GenerationResult::Failure(ProviderFailure {
                kind: FailureKind::NotInitialized,
                message: "Gemini client not initialized".to_string(),
                diagnostic: None,
            })
        );
    }

    #[tokio::test]
    async fn test_failed_initialization_is_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let gateway = ProviderGateway::new(counting_factory(calls.clone(), 1));

        assert!(!gateway.ensure_ready().await);
        assert!(gateway.ensure_ready().await);
        assert!(gateway.ensure_ready().await);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_first_use_initializes_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let gateway = Arc::new(ProviderGateway::new(counting_factory(calls.clone(), 0)));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let gateway = Arc::clone(&gateway);
                tokio::spawn(async move { gateway.ensure_ready().await })
            })
            .collect();

        for handle in handles {
            assert!(handle.await.unwrap());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_generate_maps_text_and_empty() {
        let mock = Arc::new(
            MockGenerationClient::new()
                .with_text_response("red".to_string())
                .with_text_response("   ".to_string())
                .with_empty_response(),
        );
        let gateway = ProviderGateway::with_client(mock.clone());
        assert!(gateway.ensure_ready().await);

        assert_eq!(
            gateway.generate(&request()).await,
            GenerationResult::Text("red".to_string())
        );
        assert_eq!(gateway.generate(&request()).await, GenerationResult::Empty);
        assert_eq!(gateway.generate(&request()).await, GenerationResult::Empty);
        assert_eq!(mock.get_call_count(), 3);
    }

    #[tokio::test]
    async fn test_generate_converts_errors_into_failures() {
        let mock = Arc::new(MockGenerationClient::new().with_failure("quota exceeded".to_string()));
        let gateway = ProviderGateway::with_client(mock.clone());

        let GenerationResult::Failure(failure) = gateway.generate(&request()).await else {
            panic!("expected a failure");
        };
        assert_eq!(failure.kind, FailureKind::Provider);
        assert!(failure.message.contains("quota exceeded"));
        assert!(failure.diagnostic.unwrap().contains("quota exceeded"));
        assert_eq!(mock.get_call_count(), 1);
    }
}
