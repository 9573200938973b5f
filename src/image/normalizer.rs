use super::ImageService;
use crate::models::{ImageLimits, NormalizedImage, CANONICAL_IMAGE_MIME};
use crate::{Error, Result};
use async_trait::async_trait;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, Rgba, RgbImage, RgbaImage};
use jpeg_encoder::{ColorType, Encoder};
use std::sync::Arc;

/// Resizes into [`ImageLimits`] and re-encodes as JPEG, flattening any
/// transparency onto white.
pub struct ImageNormalizer {
    limits: ImageLimits,
}

impl ImageNormalizer {
    pub fn new(limits: ImageLimits) -> Self {
        Self { limits }
    }

    /// Strict normalization: decode, fit, flatten, encode with optimized
    /// Huffman tables.
    pub fn normalize_bytes(raw: &[u8], limits: ImageLimits) -> Result<Vec<u8>> {
        let img = image::load_from_memory(raw)?;
        let (src_w, src_h) = img.dimensions();

        let fitted = Self::fit_within(img, limits);
        let rgb = if fitted.color().has_alpha() {
            Self::flatten_onto_white(&fitted)
        } else {
            fitted.to_rgb8()
        };

        let out = Self::encode_jpeg(&rgb, limits.quality)?;

        tracing::info!(
            "Image compressed from {} bytes to {} bytes ({}x{} -> {}x{})",
            raw.len(),
            out.len(),
            src_w,
            src_h,
            rgb.width(),
            rgb.height()
        );

        Ok(out)
    }

    /// Shrinks to fit the bounds preserving aspect ratio. Never upscales.
    fn fit_within(img: DynamicImage, limits: ImageLimits) -> DynamicImage {
        if img.width() <= limits.max_width && img.height() <= limits.max_height {
            return img;
        }
        img.resize(limits.max_width, limits.max_height, FilterType::Lanczos3)
    }

    fn fallback(original: Arc<Vec<u8>>) -> NormalizedImage {
        NormalizedImage {
            bytes: Arc::try_unwrap(original).unwrap_or_else(|shared| (*shared).clone()),
            mime_type: None,
        }
    }

    fn flatten_onto_white(img: &DynamicImage) -> RgbImage {
        let white = Rgba([255, 255, 255, 255]);
        let mut canvas = RgbaImage::from_pixel(img.width(), img.height(), white);
        imageops::overlay(&mut canvas, &img.to_rgba8(), 0, 0);
        DynamicImage::ImageRgba8(canvas).into_rgb8()
    }

    fn encode_jpeg(rgb: &RgbImage, quality: u8) -> Result<Vec<u8>> {
        let (width, height) = match (u16::try_from(rgb.width()), u16::try_from(rgb.height())) {
            (Ok(w), Ok(h)) => (w, h),
            _ => {
                return Err(Error::Invariant(format!(
                    "{}x{} exceeds JPEG dimension limits",
                    rgb.width(),
                    rgb.height()
                )))
            }
        };

        let mut out = Vec::new();
        let mut encoder = Encoder::new(&mut out, quality);
        encoder.set_optimized_huffman_tables(true);
        encoder.encode(rgb.as_raw(), width, height, ColorType::Rgb)?;
        Ok(out)
    }
}

impl Default for ImageNormalizer {
    fn default() -> Self {
        Self::new(ImageLimits::default())
    }
}

#[async_trait]
impl ImageService for ImageNormalizer {
    async fn normalize(&self, raw: Vec<u8>) -> NormalizedImage {
        let limits = self.limits;
        let original = Arc::new(raw);
        let input = Arc::clone(&original);

        let outcome =
            tokio::task::spawn_blocking(move || Self::normalize_bytes(&input, limits)).await;

        match outcome {
            Ok(Ok(bytes)) => NormalizedImage {
                bytes,
                mime_type: Some(CANONICAL_IMAGE_MIME.to_string()),
            },
            Ok(Err(e)) => {
                tracing::warn!("Error compressing image, using original bytes: {}", e);
                Self::fallback(original)
            }
            Err(e) => {
                tracing::error!("Image normalization task join error: {}", e);
                Self::fallback(original)
            }
        }
    }
}
