//! Data models and structures
//!
//! Defines the request-scoped conversation types shared by the history
//! reconstructor, request assembler, provider gateway and response mapper,
//! plus the process configuration.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Canonical transport format produced by the image normalizer.
pub const CANONICAL_IMAGE_MIME: &str = "image/jpeg";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ContentPart {
    Text(String),
    Image { bytes: Vec<u8>, mime_type: String },
}

/// One message in a conversation. Retained turns always carry at least one part.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationTurn {
    pub role: Role,
    pub parts: Vec<ContentPart>,
}

impl ConversationTurn {
    pub fn new(role: Role, parts: Vec<ContentPart>) -> Option<Self> {
        if parts.is_empty() {
            None
        } else {
            Some(Self { role, parts })
        }
    }
}

/// Output of the image normalizer. `mime_type` is `None` when normalization
/// failed and `bytes` are the caller's original upload.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedImage {
    pub bytes: Vec<u8>,
    pub mime_type: Option<String>,
}

/// An image as received from the client, before normalization.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub max_output_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_output_tokens: 2048,
            temperature: 0.2,
            top_p: 0.95,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageLimits {
    pub max_width: u32,
    pub max_height: u32,
    pub quality: u8,
}

impl Default for ImageLimits {
    fn default() -> Self {
        Self {
            max_width: 800,
            max_height: 800,
            quality: 85,
        }
    }
}

/// Provider-agnostic request. `turns` ends with exactly one user turn
/// holding the current message.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub system_instruction: String,
    pub turns: Vec<ConversationTurn>,
    pub params: GenerationParams,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The provider client could not be constructed (missing credential).
    NotInitialized,
    /// The provider call itself failed.
    Provider,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderFailure {
    pub kind: FailureKind,
    pub message: String,
    pub diagnostic: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GenerationResult {
    Text(String),
    Empty,
    Failure(ProviderFailure),
}

impl GenerationResult {
    /// Classifies provider output: blank text counts as an empty generation.
    pub fn from_text(text: Option<String>) -> Self {
        match text {
            Some(text) if !text.trim().is_empty() => GenerationResult::Text(text),
            _ => GenerationResult::Empty,
        }
    }
}

// Configuration
const DEFAULT_ALLOWED_ORIGINS: &[&str] = &[
    "http://localhost:3001",
    "http://localhost:3008",
    "http://127.0.0.1:3001",
    "http://127.0.0.1:3008",
    "http://localhost:7002",
    "http://127.0.0.1:7002",
];

pub const API_KEY_VAR: &str = "GOOGLE_API_KEY";

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub generation: GenerationParams,
    pub image: ImageLimits,
    pub max_upload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 7001,
            allowed_origins: DEFAULT_ALLOWED_ORIGINS
                .iter()
                .map(|o| o.to_string())
                .collect(),
            gemini_model: "gemini-2.0-flash-exp".to_string(),
            gemini_base_url: "https://generativelanguage.googleapis.com".to_string(),
            generation: GenerationParams::default(),
            image: ImageLimits::default(),
            max_upload_bytes: 20 * 1024 * 1024,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary variable source; unset and blank
    /// values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        let allowed_origins = match get("CORS_ALLOWED_ORIGINS") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect(),
            None => defaults.allowed_origins,
        };

        let quality: u8 = parse_or(
            get("IMAGE_QUALITY"),
            "IMAGE_QUALITY",
            defaults.image.quality,
        )?;
        if !(1..=100).contains(&quality) {
            return Err(Error::Config(format!(
                "IMAGE_QUALITY must be between 1 and 100 (got {})",
                quality
            )));
        }

        Ok(Self {
            host: get("HOST").unwrap_or(defaults.host),
            port: parse_or(get("PORT"), "PORT", defaults.port)?,
            allowed_origins,
            gemini_model: get("GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            gemini_base_url: get("GEMINI_BASE_URL").unwrap_or(defaults.gemini_base_url),
            generation: GenerationParams {
                max_output_tokens: parse_or(
                    get("MAX_OUTPUT_TOKENS"),
                    "MAX_OUTPUT_TOKENS",
                    defaults.generation.max_output_tokens,
                )?,
                temperature: parse_or(
                    get("TEMPERATURE"),
                    "TEMPERATURE",
                    defaults.generation.temperature,
                )?,
                top_p: parse_or(get("TOP_P"), "TOP_P", defaults.generation.top_p)?,
            },
            image: ImageLimits {
                max_width: parse_or(
                    get("IMAGE_MAX_WIDTH"),
                    "IMAGE_MAX_WIDTH",
                    defaults.image.max_width,
                )?,
                max_height: parse_or(
                    get("IMAGE_MAX_HEIGHT"),
                    "IMAGE_MAX_HEIGHT",
                    defaults.image.max_height,
                )?,
                quality,
            },
            max_upload_bytes: parse_or(
                get("MAX_UPLOAD_BYTES"),
                "MAX_UPLOAD_BYTES",
                defaults.max_upload_bytes,
            )?,
        })
    }

    /// Reads the provider credential from the process environment.
    pub fn api_key_from_env() -> Option<String> {
        std::env::var(API_KEY_VAR)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

fn parse_or<T>(value: Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(raw) => raw
            .parse()
            .map_err(|e| Error::Config(format!("Invalid {} '{}': {}", key, raw, e))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&Role::Model).unwrap(), "\"model\"");
        assert_eq!(Role::User.as_str(), "user");
    }

    #[test]
    fn test_turn_without_parts_is_rejected() {
        assert!(ConversationTurn::new(Role::User, vec![]).is_none());
        assert!(ConversationTurn::new(Role::User, vec![ContentPart::Text("hi".into())]).is_some());
    }

    #[test]
    fn test_generation_result_from_text() {
        assert_eq!(
            GenerationResult::from_text(Some("red".to_string())),
            GenerationResult::Text("red".to_string())
        );
        assert_eq!(GenerationResult::from_text(Some("  \n".to_string())), GenerationResult::Empty);
        assert_eq!(GenerationResult::from_text(None), GenerationResult::Empty);
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.port, 7001);
        assert_eq!(config.gemini_model, "gemini-2.0-flash-exp");
        assert_eq!(config.generation, GenerationParams::default());
        assert_eq!(config.image, ImageLimits::default());
        assert_eq!(config.allowed_origins.len(), 6);
    }

    #[test]
    fn test_config_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("PORT", "9000"),
            ("CORS_ALLOWED_ORIGINS", "https://a.example, https://b.example,"),
            ("TEMPERATURE", "0.7"),
            ("IMAGE_MAX_WIDTH", "1024"),
            ("GEMINI_MODEL", " gemini-2.0-flash "),
        ]))
        .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(
            config.allowed_origins,
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
        assert_eq!(config.generation.temperature, 0.7);
        assert_eq!(config.image.max_width, 1024);
        assert_eq!(config.image.max_height, 800);
        assert_eq!(config.gemini_model, "gemini-2.0-flash");
    }

    #[test]
    fn test_config_rejects_malformed_numbers() {
        let err = Config::from_lookup(lookup(&[("PORT", "seventy")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = Config::from_lookup(lookup(&[("IMAGE_QUALITY", "0")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
