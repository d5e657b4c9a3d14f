// src/engine/encoder.rs
//
// Encoder operations: lossy WebP through libwebp, default preset.

use crate::engine::common::{run_with_panic_policy, EngineResult};
use crate::error::IntakeError;
use image::DynamicImage;
use std::borrow::Cow;

/// libwebp's hard limit on either side.
pub const WEBP_MAX_DIMENSION: u32 = 16383;

/// Quality used when nothing else is configured (libwebp's default preset).
pub const DEFAULT_WEBP_QUALITY: u8 = 75;

/// Lossy WebP encoder settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeSettings {
    /// 0-100, passed straight to `WebPConfig::quality`
    pub quality: u8,
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            quality: DEFAULT_WEBP_QUALITY,
        }
    }
}

impl EncodeSettings {
    pub fn with_quality(quality: u8) -> Self {
        Self { quality }
    }
}

/// Encode to lossy WebP.
///
/// Buffers with an alpha channel go in as RGBA8, everything else as RGB8.
/// Only `quality` departs from the default preset.
pub fn encode_lossy_webp(img: &DynamicImage, settings: &EncodeSettings) -> EngineResult<Vec<u8>> {
    let (w, h) = (img.width(), img.height());
    if w == 0 || h == 0 {
        return Err(IntakeError::encode_init_failed(
            w,
            h,
            "width or height is zero",
        ));
    }
    if w > WEBP_MAX_DIMENSION || h > WEBP_MAX_DIMENSION {
        return Err(IntakeError::encode_init_failed(
            w,
            h,
            format!("webp is limited to {WEBP_MAX_DIMENSION}px per side"),
        ));
    }

    let mut config = webp::WebPConfig::new()
        .map_err(|_| IntakeError::encode_init_failed(w, h, "failed to create WebPConfig"))?;
    config.lossless = 0;
    config.quality = settings.quality.min(100) as f32;

    run_with_panic_policy("encode:webp", IntakeError::encode_failed, || {
        let encoded = if img.color().has_alpha() {
            let rgba: Cow<'_, image::RgbaImage> = match img {
                DynamicImage::ImageRgba8(rgba_img) => Cow::Borrowed(rgba_img),
                _ => Cow::Owned(img.to_rgba8()),
            };
            webp::Encoder::from_rgba(&rgba, w, h).encode_advanced(&config)
        } else {
            let rgb: Cow<'_, image::RgbImage> = match img {
                DynamicImage::ImageRgb8(rgb_img) => Cow::Borrowed(rgb_img),
                _ => Cow::Owned(img.to_rgb8()),
            };
            webp::Encoder::from_rgb(&rgb, w, h).encode_advanced(&config)
        };
        let mem = encoded
            .map_err(|e| IntakeError::encode_failed(format!("WebP encode failed: {e:?}")))?;

        let encoded = mem.to_vec();
        tracing::debug!(width = w, height = h, bytes = encoded.len(), "encoded lossy webp");
        Ok(encoded)
    })
}
