// lib.rs
//
// image-intake: normalizes untrusted image uploads
//
// Every accepted upload comes out the same way:
// - Allow-listed container (jpeg, png, webp, bmp), checked from the header
// - Upright pixels, EXIF orientation applied, all metadata dropped
// - At most 1024px on the long side once over 1024x576 pixels
// - Lossy WebP at quality 75

// Memory allocator optimization - jemalloc for better performance
// Note: jemalloc is not supported on Windows/MSVC, so we exclude it on that platform
#[cfg(all(feature = "jemalloc", not(target_env = "msvc")))]
#[global_allocator]
static ALLOC: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

pub mod engine;
pub mod error;

use std::io::Read;

pub use engine::{
    Dimensions, EncodeSettings, FormatTag, InputLimits, NoopObserver, Orientation, ResizePolicy,
    StageEvent, StageObserver, TracingObserver, TranscodeConfig, TranscodeMetrics,
    TranscodeOutput, Transcoder,
};
pub use error::{ErrorCategory, IntakeError, Result, Stage};

/// Validate, normalize and re-encode one upload with the default policy.
///
/// Reads `reader` to the end and returns lossy WebP bytes.
pub fn process_image<R: Read>(reader: R) -> Result<Vec<u8>> {
    let transcoder = Transcoder::new(TranscodeConfig::default())?;
    transcoder.process_reader(reader).map(|output| output.data)
}
