// src/engine/resize.rs
//
// Bounded downsampling: the resize decision and the Lanczos3 resampler.

use crate::engine::common::{run_with_panic_policy, EngineResult};
use crate::engine::Dimensions;
use crate::error::{IntakeError, Stage};
use fast_image_resize::{self as fir, ImageBufferError, MulDiv, PixelType, ResizeOptions};
use image::{DynamicImage, RgbImage, RgbaImage};

/// Images at or below this many pixels are never resized (1024 x 576).
pub const RESIZE_PIXEL_THRESHOLD: u64 = 1024 * 576;

/// Long-side length oversized images are brought down to.
pub const RESIZE_TARGET_LONG_SIDE: u32 = 1024;

/// When and how far to downsample.
///
/// The two thresholds are tuned independently; see [`plan_resize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizePolicy {
    pub max_pixels: u64,
    pub target_long_side: u32,
}

impl Default for ResizePolicy {
    fn default() -> Self {
        Self {
            max_pixels: RESIZE_PIXEL_THRESHOLD,
            target_long_side: RESIZE_TARGET_LONG_SIDE,
        }
    }
}

/// Decide the output size for a `width` x `height` image. `None` means keep it.
///
/// The pixel-count check runs first and alone. Only images over it get the
/// long-side check: landscape and square images are bounded by width,
/// portrait images by height, and the other side follows the aspect ratio.
pub fn plan_resize(width: u32, height: u32, policy: &ResizePolicy) -> Option<Dimensions> {
    let pixel_count = width as u64 * height as u64;
    if pixel_count <= policy.max_pixels {
        return None;
    }

    let target = policy.target_long_side;
    if width >= height {
        if width <= target {
            return None;
        }
        Some(Dimensions::new(target, scale_side(height, target, width)))
    } else {
        if height <= target {
            return None;
        }
        Some(Dimensions::new(scale_side(width, target, height), target))
    }
}

// side * target / reference, rounded half up, at least 1px
fn scale_side(side: u32, target: u32, reference: u32) -> u32 {
    let scaled = (side as f64 * target as f64 / reference as f64 + 0.5).floor();
    (scaled as u32).max(1)
}

/// Apply the policy. Returns the input untouched when no resize is planned.
pub fn resize_image(img: DynamicImage, policy: &ResizePolicy) -> EngineResult<DynamicImage> {
    let (width, height) = (img.width(), img.height());
    match plan_resize(width, height, policy) {
        None => Ok(img),
        Some(target) => {
            tracing::debug!(
                width,
                height,
                target_width = target.width,
                target_height = target.height,
                "downsampling with lanczos3"
            );
            lanczos_resize(img, target)
        }
    }
}

/// Resize to exactly `target` with a Lanczos3 convolution.
///
/// RGB8/RGBA8 buffers are handed to the resizer without copying; any other
/// layout is converted to RGBA8 first.
pub fn lanczos_resize(img: DynamicImage, target: Dimensions) -> EngineResult<DynamicImage> {
    let src = (img.width(), img.height());
    let dst = (target.width, target.height);
    if src.0 == 0 || src.1 == 0 || dst.0 == 0 || dst.1 == 0 {
        return Err(IntakeError::resize_failed(
            src,
            dst,
            "invalid dimensions for resize",
        ));
    }

    let (pixel_type, pixels) = match img {
        DynamicImage::ImageRgb8(rgb) => (PixelType::U8x3, rgb.into_raw()),
        DynamicImage::ImageRgba8(rgba) => (PixelType::U8x4, rgba.into_raw()),
        other => (PixelType::U8x4, other.to_rgba8().into_raw()),
    };

    run_with_panic_policy(
        "resize:lanczos3",
        |msg| IntakeError::internal_panic(Stage::Resize, msg),
        || {
            resize_pixels(src, pixels, pixel_type, dst)
                .map_err(|reason| IntakeError::resize_failed(src, dst, reason))
        },
    )
}

fn lanczos3() -> ResizeOptions {
    ResizeOptions::new().resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::Lanczos3))
}

fn resize_pixels(
    (src_width, src_height): (u32, u32),
    mut src_pixels: Vec<u8>,
    pixel_type: PixelType,
    (dst_width, dst_height): (u32, u32),
) -> std::result::Result<DynamicImage, String> {
    let required_bytes = (src_width as usize)
        .checked_mul(src_height as usize)
        .and_then(|count| count.checked_mul(pixel_type.size()))
        .ok_or_else(|| "image buffer size overflow during resize".to_string())?;
    if src_pixels.len() < required_bytes {
        return Err(format!(
            "source buffer holds {} bytes, expected {required_bytes}",
            src_pixels.len()
        ));
    }

    let src_image = match fir::images::Image::from_slice_u8(
        src_width,
        src_height,
        src_pixels.as_mut_slice(),
        pixel_type,
    ) {
        Ok(image) => image,
        Err(ImageBufferError::InvalidBufferAlignment) => {
            let mut aligned = fir::images::Image::new(src_width, src_height, pixel_type);
            aligned
                .buffer_mut()
                .copy_from_slice(&src_pixels[..required_bytes]);
            return convolve(aligned, pixel_type, dst_width, dst_height);
        }
        Err(other) => return Err(format!("fir source image error: {other:?}")),
    };
    convolve(src_image, pixel_type, dst_width, dst_height)
}

fn convolve(
    mut src_image: fir::images::Image<'_>,
    pixel_type: PixelType,
    dst_width: u32,
    dst_height: u32,
) -> std::result::Result<DynamicImage, String> {
    let mut dst_image = fir::images::Image::new(dst_width, dst_height, pixel_type);

    // Premultiply so transparent pixels don't bleed their colour into neighbours
    let premultiply = has_translucency(&src_image, pixel_type);
    let mul_div = MulDiv::default();
    if premultiply {
        mul_div
            .multiply_alpha_inplace(&mut src_image)
            .map_err(|e| format!("failed to premultiply alpha: {e}"))?;
    }

    fir::Resizer::new()
        .resize(&src_image, &mut dst_image, &lanczos3())
        .map_err(|e| format!("fir resize error: {e:?}"))?;

    if premultiply {
        mul_div
            .divide_alpha_inplace(&mut dst_image)
            .map_err(|e| format!("failed to unpremultiply alpha: {e}"))?;
    }

    let dst_pixels = dst_image.into_vec();
    match pixel_type {
        PixelType::U8x3 => RgbImage::from_raw(dst_width, dst_height, dst_pixels)
            .map(DynamicImage::ImageRgb8)
            .ok_or_else(|| "failed to create rgb image from resized data".to_string()),
        PixelType::U8x4 => RgbaImage::from_raw(dst_width, dst_height, dst_pixels)
            .map(DynamicImage::ImageRgba8)
            .ok_or_else(|| "failed to create rgba image from resized data".to_string()),
        other => Err(format!("unsupported pixel type after resize: {other:?}")),
    }
}

fn has_translucency(image: &fir::images::Image<'_>, pixel_type: PixelType) -> bool {
    pixel_type == PixelType::U8x4 && image.buffer().iter().skip(3).step_by(4).any(|&a| a != 255)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgb, Rgba};

    fn create_test_image(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        }))
    }

    fn plan(width: u32, height: u32) -> Option<(u32, u32)> {
        plan_resize(width, height, &ResizePolicy::default()).map(|d| (d.width, d.height))
    }

    mod plan_tests {
        use super::*;

        #[test]
        fn test_at_threshold_is_untouched() {
            assert_eq!(plan(1024, 576), None);
            assert_eq!(plan(576, 1024), None);
            assert_eq!(plan(768, 768), None); // exactly 589_824
        }

        #[test]
        fn test_small_pixel_count_short_circuits() {
            assert_eq!(plan(1000, 500), None);
            // long side over the target but total still under the threshold
            assert_eq!(plan(4000, 100), None);
            assert_eq!(plan(100, 5000), None);
        }

        #[test]
        fn test_landscape_downscale() {
            assert_eq!(plan(2000, 1000), Some((1024, 512)));
            assert_eq!(plan(4032, 3024), Some((1024, 768)));
        }

        #[test]
        fn test_portrait_downscale() {
            // 1024 * 800 / 2400 = 341.33
            assert_eq!(plan(800, 2400), Some((341, 1024)));
            assert_eq!(plan(3024, 4032), Some((768, 1024)));
        }

        #[test]
        fn test_square_uses_width_branch() {
            assert_eq!(plan(2048, 2048), Some((1024, 1024)));
        }

        #[test]
        fn test_over_threshold_but_within_long_side() {
            // 1000 x 1000 = 1_000_000 pixels, long side 1000 <= 1024
            assert_eq!(plan(1000, 1000), None);
            assert_eq!(plan(1024, 600), None);
            assert_eq!(plan(600, 1024), None);
        }

        #[test]
        fn test_rounds_half_up() {
            // 1025 * 1024 / 2050 = 512.0; 1537 * 1024 / 2049 = 768.12
            assert_eq!(plan(2050, 1025), Some((1024, 512)));
            assert_eq!(plan(2049, 1537), Some((1024, 768)));
            // 615 * 1024 / 1200 = 524.8
            assert_eq!(plan(1200, 615), Some((1024, 525)));
        }

        #[test]
        fn test_extreme_aspect_never_reaches_zero() {
            assert_eq!(plan(32768, 20), Some((1024, 1)));
            assert_eq!(plan(20, 32768), Some((1, 1024)));
        }

        #[test]
        fn test_thresholds_are_independent() {
            let policy = ResizePolicy {
                max_pixels: 0,
                target_long_side: 64,
            };
            assert_eq!(plan_resize(64, 10, &policy), None);
            assert_eq!(
                plan_resize(128, 10, &policy),
                Some(Dimensions::new(64, 5))
            );

            let policy = ResizePolicy {
                max_pixels: u64::MAX,
                target_long_side: 1,
            };
            assert_eq!(plan_resize(32768, 32768, &policy), None);
        }
    }

    #[test]
    fn test_resize_image_noop_returns_same_buffer() {
        let img = create_test_image(1000, 500);
        let before = img.to_rgb8().into_raw();
        let out = resize_image(img, &ResizePolicy::default()).unwrap();
        assert_eq!(out.dimensions(), (1000, 500));
        assert_eq!(out.to_rgb8().into_raw(), before);
    }

    #[test]
    fn test_resize_image_landscape() {
        let out = resize_image(create_test_image(2000, 1000), &ResizePolicy::default()).unwrap();
        assert_eq!(out.dimensions(), (1024, 512));
        assert!(matches!(out, DynamicImage::ImageRgb8(_)));
    }

    #[test]
    fn test_resize_image_portrait() {
        let out = resize_image(create_test_image(800, 2400), &ResizePolicy::default()).unwrap();
        assert_eq!(out.dimensions(), (341, 1024));
    }

    #[test]
    fn test_lanczos_resize_invalid_target() {
        let err = lanczos_resize(create_test_image(4, 4), Dimensions::new(0, 2)).unwrap_err();
        match err {
            IntakeError::ResizeFailed {
                source_width,
                target_width,
                ..
            } => {
                assert_eq!(source_width, 4);
                assert_eq!(target_width, 0);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_lanczos_resize_solid_colour_stays_solid() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 32, Rgb([90, 160, 30])));
        let out = lanczos_resize(img, Dimensions::new(16, 8)).unwrap();
        for p in out.to_rgb8().pixels() {
            for (got, want) in p.0.iter().zip([90u8, 160, 30]) {
                assert!(got.abs_diff(want) <= 1, "{:?}", p.0);
            }
        }
    }

    #[test]
    fn test_lanczos_resize_rgba_transparent_pixels_do_not_bleed() {
        // left half opaque red, right half fully transparent green
        let img = DynamicImage::ImageRgba8(RgbaImage::from_fn(64, 64, |x, _| {
            if x < 32 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 255, 0, 0])
            }
        }));
        let out = lanczos_resize(img, Dimensions::new(16, 16)).unwrap().to_rgba8();
        let edge = out.get_pixel(7, 8).0;
        assert!(edge[3] > 0);
        assert!(edge[0] > 200, "red lost at the edge: {edge:?}");
        assert!(edge[1] < 10, "green leaked into the edge: {edge:?}");
        assert_eq!(out.get_pixel(2, 8).0, [255, 0, 0, 255]);
    }

    #[test]
    fn test_lanczos_resize_converts_other_layouts() {
        let img = DynamicImage::ImageLuma8(image::GrayImage::from_pixel(40, 20, image::Luma([77])));
        let out = lanczos_resize(img, Dimensions::new(20, 10)).unwrap();
        assert!(matches!(out, DynamicImage::ImageRgba8(_)));
        assert_eq!(out.dimensions(), (20, 10));
    }
}
