//! Client-facing result shapes.

use crate::models::GenerationResult;
use crate::prompts;
use serde::{Deserialize, Serialize};

/// JSON body returned by `POST /analyze-image`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnalyzeResponse {
    /// The provider answered with nothing usable.
    Fallback {
        response: String,
        raw_response_available: bool,
    },
    Success {
        response: String,
    },
    Error {
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        traceback: Option<String>,
    },
}

impl AnalyzeResponse {
    pub fn error(message: impl Into<String>) -> Self {
        AnalyzeResponse::Error {
            error: message.into(),
            traceback: None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, AnalyzeResponse::Error { .. })
    }
}

impl From<GenerationResult> for AnalyzeResponse {
    fn from(result: GenerationResult) -> Self {
        match result {
            GenerationResult::Text(text) => AnalyzeResponse::Success { response: text },
            GenerationResult::Empty => AnalyzeResponse::Fallback {
                response: prompts::EMPTY_GENERATION.to_string(),
                raw_response_available: false,
            },
            GenerationResult::Failure(failure) => AnalyzeResponse::Error {
                error: failure.message,
                traceback: failure.diagnostic,
            },
        }
    }
}
