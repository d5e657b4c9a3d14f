// src/engine/decoder.rs
//
// Decoder operations: JPEG (mozjpeg), PNG (zune-png), WebP (libwebp), BMP (image crate).
// Decoding also normalizes orientation; nothing else from the container survives.

use crate::engine::common::{run_with_panic_policy, EngineResult};
use crate::engine::format::{format_name, FormatTag};
use crate::engine::orientation::{apply_orientation, detect_exif_orientation, Orientation};
use crate::engine::{MAX_DIMENSION, MAX_PIXELS};
use crate::error::IntakeError;
use image::{DynamicImage, GrayAlphaImage, GrayImage, ImageFormat, RgbImage, RgbaImage};
use mozjpeg::{ColorSpace as JpegColorSpace, Decompress};
use webp::{BitstreamFeatures, Decoder as WebPDecoder};
use zune_core::bytestream::ZCursor;
use zune_core::colorspace::ColorSpace;
use zune_core::options::DecoderOptions;
use zune_png::PngDecoder;

/// Upright, metadata-free pixels plus what was learned while decoding.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub image: DynamicImage,
    pub format: FormatTag,
    /// EXIF orientation that was applied, if the container carried one.
    pub orientation: Option<Orientation>,
}

/// Decode JPEG using mozjpeg (backed by libjpeg-turbo)
///
/// CMYK and YCCK files are handed to the image crate's decoder and come back
/// as RGB8.
pub fn decode_jpeg_mozjpeg(data: &[u8]) -> EngineResult<DynamicImage> {
    run_with_panic_policy("decode:mozjpeg", IntakeError::decode_failed, || {
        // libjpeg pads truncated scans with grey instead of failing
        if !has_complete_scan(data) {
            return Err(IntakeError::decode_failed(
                "mozjpeg: JPEG ends before the EOI marker",
            ));
        }

        let decompress = Decompress::new_mem(data).map_err(|e| {
            IntakeError::decode_failed(format!("mozjpeg decompress init failed: {e:?}"))
        })?;

        if matches!(
            decompress.color_space(),
            JpegColorSpace::JCS_CMYK | JpegColorSpace::JCS_YCCK
        ) {
            drop(decompress);
            return decode_jpeg_cmyk(data);
        }

        let mut decompress = decompress.rgb().map_err(|e| {
            IntakeError::decode_failed(format!("mozjpeg rgb conversion failed: {e:?}"))
        })?;

        let width = u32::try_from(decompress.width())
            .map_err(|_| IntakeError::dimension_exceeds_limit(u32::MAX, MAX_DIMENSION))?;
        let height = u32::try_from(decompress.height())
            .map_err(|_| IntakeError::dimension_exceeds_limit(u32::MAX, MAX_DIMENSION))?;
        check_dimensions(width, height)?;

        let pixels: Vec<[u8; 3]> = decompress.read_scanlines().map_err(|e| {
            IntakeError::decode_failed(format!("mozjpeg: failed to read scanlines: {e:?}"))
        })?;
        let flat_pixels: Vec<u8> = pixels.into_iter().flatten().collect();

        let rgb_image = RgbImage::from_raw(width, height, flat_pixels).ok_or_else(|| {
            IntakeError::decode_failed("mozjpeg: scanline data shorter than image")
        })?;

        Ok(DynamicImage::ImageRgb8(rgb_image))
    })
}

fn decode_jpeg_cmyk(data: &[u8]) -> EngineResult<DynamicImage> {
    let img = image::load_from_memory_with_format(data, ImageFormat::Jpeg)
        .map_err(|e| IntakeError::decode_failed(format!("jpeg: cmyk decode failed: {e}")))?;
    check_dimensions(img.width(), img.height())?;
    tracing::debug!(
        width = img.width(),
        height = img.height(),
        "decoded cmyk jpeg through image crate"
    );
    Ok(DynamicImage::ImageRgb8(img.to_rgb8()))
}

/// Walk the marker segments and report whether the stream reaches EOI.
///
/// APPn and COM payloads are skipped by their length field, so an `FF D9`
/// inside an EXIF thumbnail or a comment does not count. Inside entropy-coded
/// data `FF 00` (byte stuffing) and `FF D0..D7` (restart markers) are skipped.
pub(crate) fn has_complete_scan(data: &[u8]) -> bool {
    if !data.starts_with(&[0xFF, 0xD8]) {
        return false;
    }
    let mut pos = 2;
    while pos < data.len() {
        if data[pos] != 0xFF {
            return false;
        }
        // fill bytes
        while pos < data.len() && data[pos] == 0xFF {
            pos += 1;
        }
        let Some(&marker) = data.get(pos) else {
            return false;
        };
        pos += 1;
        match marker {
            0xD9 => return true,
            0x01 | 0xD0..=0xD7 => continue,
            _ => {}
        }
        let Some(len_bytes) = data.get(pos..pos + 2) else {
            return false;
        };
        let len = u16::from_be_bytes([len_bytes[0], len_bytes[1]]) as usize;
        if len < 2 || pos + len > data.len() {
            return false;
        }
        pos += len;
        if marker == 0xDA {
            match next_marker_after_scan(data, pos) {
                Some(next) => pos = next,
                None => return false,
            }
        }
    }
    false
}

fn next_marker_after_scan(data: &[u8], mut pos: usize) -> Option<usize> {
    while pos + 1 < data.len() {
        if data[pos] == 0xFF {
            match data[pos + 1] {
                0x00 | 0xD0..=0xD7 => pos += 2,
                0xFF => pos += 1,
                _ => return Some(pos),
            }
        } else {
            pos += 1;
        }
    }
    None
}

/// Decode PNG using zune-png. 16-bit input is stripped to 8-bit.
pub fn decode_png_zune(data: &[u8]) -> EngineResult<DynamicImage> {
    run_with_panic_policy("decode:png", IntakeError::decode_failed, || {
        let options = DecoderOptions::default()
            .png_set_strip_to_8bit(true)
            .set_max_width(MAX_DIMENSION as usize)
            .set_max_height(MAX_DIMENSION as usize);
        let mut decoder = PngDecoder::new_with_options(ZCursor::new(data), options);
        let pixels = decoder
            .decode()
            .map_err(|e| IntakeError::decode_failed(format!("png: decode failed: {e}")))?;

        let info = decoder
            .info()
            .ok_or_else(|| IntakeError::decode_failed("png: missing header info"))?;
        let width = info.width as u32;
        let height = info.height as u32;
        check_dimensions(width, height)?;

        let buf = match pixels {
            zune_core::result::DecodingResult::U8(v) => v,
            _ => return Err(IntakeError::decode_failed("png: unexpected non-U8 pixel buffer")),
        };

        let colorspace = decoder
            .colorspace()
            .ok_or_else(|| IntakeError::decode_failed("png: missing colorspace"))?;

        let img = match colorspace {
            ColorSpace::RGB => RgbImage::from_raw(width, height, buf).map(DynamicImage::ImageRgb8),
            ColorSpace::RGBA => {
                RgbaImage::from_raw(width, height, buf).map(DynamicImage::ImageRgba8)
            }
            ColorSpace::Luma => GrayImage::from_raw(width, height, buf).map(DynamicImage::ImageLuma8),
            ColorSpace::LumaA => {
                GrayAlphaImage::from_raw(width, height, buf).map(DynamicImage::ImageLumaA8)
            }
            other => {
                return Err(IntakeError::decode_failed(format!(
                    "png: unsupported colorspace {other:?}"
                )))
            }
        };

        img.ok_or_else(|| IntakeError::decode_failed("png: pixel data shorter than image"))
    })
}

/// Decode still WebP using libwebp. Animated files are rejected.
pub fn decode_webp_libwebp(data: &[u8]) -> EngineResult<DynamicImage> {
    run_with_panic_policy("decode:webp", IntakeError::decode_failed, || {
        // Parse header first to avoid allocating huge buffers on malformed files
        let features = BitstreamFeatures::new(data)
            .ok_or_else(|| IntakeError::decode_failed("webp: failed to read bitstream features"))?;

        if features.has_animation() {
            return Err(IntakeError::decode_failed(
                "webp: animated images are not supported",
            ));
        }
        check_dimensions(features.width(), features.height())?;

        let decoded = WebPDecoder::new(data)
            .decode()
            .ok_or_else(|| IntakeError::decode_failed("webp: decode failed"))?;
        check_dimensions(decoded.width(), decoded.height())?;

        Ok(decoded.to_image())
    })
}

/// Decode BMP through the image crate.
pub fn decode_bmp(data: &[u8]) -> EngineResult<DynamicImage> {
    run_with_panic_policy("decode:bmp", IntakeError::decode_failed, || {
        image::load_from_memory_with_format(data, ImageFormat::Bmp)
            .map_err(|e| IntakeError::decode_failed(format!("bmp: decode failed: {e}")))
    })
}

/// Detect input format using magic bytes. Returns None if unknown.
pub fn detect_format(bytes: &[u8]) -> Option<ImageFormat> {
    image::guess_format(bytes).ok()
}

/// Decode pixels for an allow-listed container without touching orientation.
pub fn decode_pixels(bytes: &[u8], format: FormatTag) -> EngineResult<DynamicImage> {
    match format {
        FormatTag::Jpeg => decode_jpeg_mozjpeg(bytes),
        FormatTag::Png => decode_png_zune(bytes),
        FormatTag::WebP => decode_webp_libwebp(bytes),
        FormatTag::Bmp => decode_bmp(bytes),
    }
}

/// Unified decode entrypoint:
/// - Detect format once (magic bytes) and route to the matching decoder
/// - Apply the EXIF orientation, if any
/// - Return upright pixels with no metadata attached
pub fn decode_normalized(bytes: &[u8]) -> EngineResult<DecodedImage> {
    let detected = detect_format(bytes).ok_or_else(|| {
        IntakeError::decode_failed("no image container signature found")
    })?;
    let format = FormatTag::from_image_format(detected).ok_or_else(|| {
        IntakeError::decode_failed(format!(
            "{} is not a decodable upload format",
            format_name(detected)
        ))
    })?;

    let img = decode_pixels(bytes, format)?;
    check_dimensions(img.width(), img.height())?;

    let orientation = detect_exif_orientation(bytes);
    let image = match orientation {
        Some(o) => {
            tracing::debug!(format = %format, orientation = o as u16, "applying exif orientation");
            apply_orientation(img, o)
        }
        None => img,
    };

    Ok(DecodedImage {
        image,
        format,
        orientation,
    })
}

/// Check if image dimensions are within safe limits.
/// Returns an error if the image is too large (potential decompression bomb).
pub fn check_dimensions(width: u32, height: u32) -> EngineResult<()> {
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(IntakeError::dimension_exceeds_limit(
            width.max(height),
            MAX_DIMENSION,
        ));
    }
    let pixels = width as u64 * height as u64;
    if pixels > MAX_PIXELS {
        return Err(IntakeError::pixel_count_exceeds_limit(pixels, MAX_PIXELS));
    }
    Ok(())
}
