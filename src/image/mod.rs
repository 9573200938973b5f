//! Image normalization
//!
//! Downsizes and recompresses uploaded images into a single canonical
//! transport format before they are forwarded to the provider.

pub mod normalizer;

pub use normalizer::ImageNormalizer;

use crate::models::NormalizedImage;
use async_trait::async_trait;

#[async_trait]
pub trait ImageService: Send + Sync {
    /// Never fails: on any decode or encode error the original bytes are
    /// returned with no MIME type.
    async fn normalize(&self, raw: Vec<u8>) -> NormalizedImage;
}
