//! Error handling and custom error types
//!
//! Provides unified error handling across the relay using thiserror.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JPEG encoding error: {0}")]
    Jpeg(#[from] jpeg_encoder::EncodingError),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("AI provider error: {0}")]
    AiProvider(String),

    #[error("Invariant violation: {0}")]
    Invariant(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Renders an error the way it is reported to clients as a diagnostic:
/// the message, its `Caused by:` chain, and a backtrace when enabled.
pub fn diagnostic(err: Error) -> String {
    format!("{:?}", anyhow::Error::from(err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_includes_message() {
        let text = diagnostic(Error::AiProvider("quota exceeded".to_string()));
        assert!(text.contains("quota exceeded"));
    }

    #[test]
    fn test_diagnostic_includes_source_chain() {
        let err: Error = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        let text = diagnostic(err);
        assert!(text.starts_with("Serialization error"));
        assert!(text.contains("Caused by"));
    }
}
