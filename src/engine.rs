// src/engine.rs
//
// The core of image-intake. A strictly sequential pipeline that:
// 1. Validates the container against the allow-list (header only)
// 2. Decodes, bakes in EXIF orientation and drops all metadata
// 3. Downsamples oversized images with Lanczos3
// 4. Re-encodes as lossy WebP
//
// This file is a facade over the decomposed modules in engine/

use image::DynamicImage;

// =============================================================================
// SECURITY LIMITS
// =============================================================================

/// Maximum allowed image dimension (width or height).
/// Images larger than 32768x32768 are rejected to prevent decompression bombs.
pub const MAX_DIMENSION: u32 = 32768;

/// Maximum allowed total pixels (width * height).
/// 100 megapixels = 400MB uncompressed RGBA.
pub const MAX_PIXELS: u64 = 100_000_000;

/// Width and height of a pixel buffer or image header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn of(img: &DynamicImage) -> Self {
        Self::new(img.width(), img.height())
    }

    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

// =============================================================================
// MODULE DECOMPOSITION
// =============================================================================

mod common;
mod config;
mod decoder;
mod encoder;
mod format;
mod io;
mod limits;
mod observer;
mod orientation;
mod resize;
mod transcode;

pub use config::TranscodeConfig;
pub use decoder::{
    check_dimensions, decode_bmp, decode_jpeg_mozjpeg, decode_normalized, decode_pixels,
    decode_png_zune, decode_webp_libwebp, detect_format, DecodedImage,
};
pub use encoder::{encode_lossy_webp, EncodeSettings, DEFAULT_WEBP_QUALITY, WEBP_MAX_DIMENSION};
pub use format::{
    format_name, sniff_header, validate_bytes, validate_format, validate_header, FormatTag,
    SniffedHeader, ValidatedHeader,
};
pub use io::read_source;
pub use limits::InputLimits;
pub use observer::{NoopObserver, StageEvent, StageObserver, TracingObserver};
pub use orientation::{apply_orientation, detect_exif_orientation, Orientation};
pub use resize::{
    lanczos_resize, plan_resize, resize_image, ResizePolicy, RESIZE_PIXEL_THRESHOLD,
    RESIZE_TARGET_LONG_SIDE,
};
pub use transcode::{TranscodeMetrics, TranscodeOutput, Transcoder};
