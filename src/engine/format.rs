// src/engine/format.rs
//
// Format validation: container sniffing (detection) and the allow-list (policy).
// Only the header is parsed here; pixel data is left for the decoder.

use crate::engine::common::EngineResult;
use crate::engine::Dimensions;
use crate::error::IntakeError;
use image::{ImageFormat, ImageReader};
use std::fmt;
use std::io::{BufRead, Cursor, Seek};

/// Container formats accepted for upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatTag {
    Jpeg,
    Png,
    WebP,
    Bmp,
}

impl FormatTag {
    pub const ALL: [FormatTag; 4] = [FormatTag::Jpeg, FormatTag::Png, FormatTag::WebP, FormatTag::Bmp];

    /// The allow-list. Returns `None` for every format outside it.
    pub fn from_image_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Jpeg => Some(Self::Jpeg),
            ImageFormat::Png => Some(Self::Png),
            ImageFormat::WebP => Some(Self::WebP),
            ImageFormat::Bmp => Some(Self::Bmp),
            _ => None,
        }
    }

    pub fn image_format(&self) -> ImageFormat {
        match self {
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Png => ImageFormat::Png,
            Self::WebP => ImageFormat::WebP,
            Self::Bmp => ImageFormat::Bmp,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::WebP => "webp",
            Self::Bmp => "bmp",
        }
    }
}

impl fmt::Display for FormatTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What header sniffing found, before any policy is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SniffedHeader {
    pub format: ImageFormat,
    pub dimensions: Dimensions,
}

/// A header that passed both detection and the allow-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedHeader {
    pub format: FormatTag,
    pub dimensions: Dimensions,
}

/// Lowercase name for any `ImageFormat` (jpeg, png, gif, tiff, ...).
pub fn format_name(format: ImageFormat) -> String {
    format!("{:?}", format).to_lowercase()
}

/// Detect the container from its magic bytes and parse just enough of the
/// header to read its dimensions.
///
/// Fails with `UnsupportedFormat` when no signature matches or the header is
/// unreadable. Formats whose decoder is not compiled in (gif, tiff, ...) land
/// in the second case. Advances `reader` by however much the header parser read.
pub fn sniff_header<R: BufRead + Seek>(reader: R) -> EngineResult<SniffedHeader> {
    let reader = ImageReader::new(reader).with_guessed_format().map_err(|e| {
        tracing::debug!(error = %e, "failed to read image header");
        IntakeError::unsupported_format("unknown")
    })?;

    let Some(format) = reader.format() else {
        return Err(IntakeError::unsupported_format("unknown"));
    };

    let (width, height) = reader.into_dimensions().map_err(|e| {
        tracing::debug!(format = %format_name(format), error = %e, "failed to decode image header");
        IntakeError::unsupported_format(format_name(format))
    })?;

    if width == 0 || height == 0 {
        return Err(IntakeError::unsupported_format(format_name(format)));
    }

    Ok(SniffedHeader {
        format,
        dimensions: Dimensions::new(width, height),
    })
}

/// Detection followed by the allow-list check.
pub fn validate_header<R: BufRead + Seek>(reader: R) -> EngineResult<ValidatedHeader> {
    let sniffed = sniff_header(reader)?;
    let format = FormatTag::from_image_format(sniffed.format)
        .ok_or_else(|| IntakeError::unsupported_format(format_name(sniffed.format)))?;
    Ok(ValidatedHeader {
        format,
        dimensions: sniffed.dimensions,
    })
}

/// Validate a stream positioned at the start of an image container.
pub fn validate_format<R: BufRead + Seek>(reader: R) -> EngineResult<FormatTag> {
    validate_header(reader).map(|header| header.format)
}

/// Slice convenience for [`validate_format`].
pub fn validate_bytes(bytes: &[u8]) -> EngineResult<FormatTag> {
    validate_format(Cursor::new(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage};
    use std::io::SeekFrom;

    fn encode_with(format: ImageFormat, width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([40, 80, 120]));
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), format)
            .unwrap();
        buf
    }

    fn encode_webp(width: u32, height: u32) -> Vec<u8> {
        let rgb = vec![128u8; (width * height * 3) as usize];
        webp::Encoder::from_rgb(&rgb, width, height)
            .encode(80.0)
            .to_vec()
    }

    #[test]
    fn allow_list_is_exactly_four_formats() {
        assert_eq!(FormatTag::from_image_format(ImageFormat::Jpeg), Some(FormatTag::Jpeg));
        assert_eq!(FormatTag::from_image_format(ImageFormat::Png), Some(FormatTag::Png));
        assert_eq!(FormatTag::from_image_format(ImageFormat::WebP), Some(FormatTag::WebP));
        assert_eq!(FormatTag::from_image_format(ImageFormat::Bmp), Some(FormatTag::Bmp));
        for rejected in [
            ImageFormat::Gif,
            ImageFormat::Tiff,
            ImageFormat::Ico,
            ImageFormat::Avif,
            ImageFormat::Pnm,
            ImageFormat::Tga,
        ] {
            assert_eq!(FormatTag::from_image_format(rejected), None, "{rejected:?}");
        }
    }

    #[test]
    fn tag_round_trips_through_image_format() {
        for tag in FormatTag::ALL {
            assert_eq!(FormatTag::from_image_format(tag.image_format()), Some(tag));
        }
    }

    #[test]
    fn validates_each_allowed_container() {
        assert_eq!(validate_bytes(&encode_with(ImageFormat::Png, 3, 2)).unwrap(), FormatTag::Png);
        assert_eq!(validate_bytes(&encode_with(ImageFormat::Jpeg, 3, 2)).unwrap(), FormatTag::Jpeg);
        assert_eq!(validate_bytes(&encode_with(ImageFormat::Bmp, 3, 2)).unwrap(), FormatTag::Bmp);
        assert_eq!(validate_bytes(&encode_webp(3, 2)).unwrap(), FormatTag::WebP);
    }

    #[test]
    fn header_reports_dimensions() {
        let header = validate_header(Cursor::new(encode_with(ImageFormat::Png, 7, 5))).unwrap();
        assert_eq!(header.format, FormatTag::Png);
        assert_eq!(header.dimensions, Dimensions::new(7, 5));
    }

    #[test]
    fn rejects_unknown_bytes() {
        let err = validate_bytes(b"definitely not an image at all").unwrap_err();
        assert!(matches!(err, IntakeError::UnsupportedFormat { ref format } if format == "unknown"));
        assert!(matches!(validate_bytes(&[]), Err(IntakeError::UnsupportedFormat { .. })));
    }

    #[test]
    fn rejects_known_but_disallowed_containers() {
        let mut gif = b"GIF89a".to_vec();
        gif.extend_from_slice(&[1, 0, 1, 0, 0, 0, 0, 0x3B]);
        let err = validate_bytes(&gif).unwrap_err();
        assert!(matches!(err, IntakeError::UnsupportedFormat { ref format } if format == "gif"));

        let tiff = [0x49, 0x49, 0x2A, 0x00, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00];
        assert!(matches!(
            validate_bytes(&tiff),
            Err(IntakeError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn rejects_signature_with_broken_header() {
        // PNG signature followed by garbage instead of an IHDR chunk
        let mut png = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        png.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
        let err = validate_bytes(&png).unwrap_err();
        assert!(matches!(err, IntakeError::UnsupportedFormat { ref format } if format == "png"));
    }

    #[test]
    fn sniff_does_not_apply_policy() {
        let header = sniff_header(Cursor::new(encode_with(ImageFormat::Bmp, 4, 4))).unwrap();
        assert_eq!(header.format, ImageFormat::Bmp);
    }

    #[test]
    fn validation_advances_the_stream() {
        let bytes = encode_with(ImageFormat::Png, 16, 16);
        let mut cursor = Cursor::new(bytes.as_slice());
        validate_format(&mut cursor).unwrap();
        let pos = cursor.seek(SeekFrom::Current(0)).unwrap();
        assert!(pos > 0);
        assert!(pos <= bytes.len() as u64);
    }
}
