use super::GenerationService;
use crate::models::GenerationRequest;
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Scripted [`GenerationService`] for tests and local harnesses.
///
/// Responses are replayed in order and cycle once exhausted. With no
/// scripted responses it answers `"mock analysis"`.
pub struct MockGenerationClient {
    responses: Arc<Mutex<Vec<MockResponse>>>,
    requests: Arc<Mutex<Vec<GenerationRequest>>>,
    call_count: Arc<Mutex<usize>>,
}

#[derive(Debug, Clone)]
enum MockResponse {
    Text(Option<String>),
    Failure(String),
}

impl MockGenerationClient {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
            call_count: Arc::new(Mutex::new(0)),
        }
    }

    pub fn with_text_response(self, response: String) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push(MockResponse::Text(Some(response)));
        self
    }

    /// Scripts a successful call that produced no text.
    pub fn with_empty_response(self) -> Self {
        self.responses.lock().unwrap().push(MockResponse::Text(None));
        self
    }

    pub fn with_failure(self, message: String) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push(MockResponse::Failure(message));
        self
    }

    pub fn get_call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Default for MockGenerationClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationService for MockGenerationClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<Option<String>> {
        let mut count = self.call_count.lock().unwrap();
        *count += 1;
        self.requests.lock().unwrap().push(request.clone());

        let responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Ok(Some("mock analysis".to_string()));
        }

        let index = (*count - 1) % responses.len();
        match &responses[index] {
            MockResponse::Text(text) => Ok(text.clone()),
            MockResponse::Failure(message) => Err(Error::AiProvider(message.clone())),
        }
    }
}
