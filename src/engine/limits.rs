// src/engine/limits.rs
//
// Input limits: byte and pixel caps enforced before any pixel is decoded.

use crate::engine::common::EngineResult;
use crate::error::IntakeError;

const STRICT_MAX_PIXELS: u64 = 40_000_000; // ~8K x 5K
const STRICT_MAX_BYTES: u64 = 32 * 1024 * 1024; // 32MB input cap

/// Caps applied to untrusted uploads. `None` disables a check.
///
/// These sit on top of the hard `MAX_DIMENSION` / `MAX_PIXELS` guards in the
/// decoder, which are always on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InputLimits {
    pub max_bytes: Option<u64>,
    pub max_pixels: Option<u64>,
}

impl InputLimits {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn strict() -> Self {
        Self {
            max_bytes: Some(STRICT_MAX_BYTES),
            max_pixels: Some(STRICT_MAX_PIXELS),
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = Some(max_bytes);
        self
    }

    pub fn with_max_pixels(mut self, max_pixels: u64) -> Self {
        self.max_pixels = Some(max_pixels);
        self
    }

    pub fn enforce_source_len(&self, len: u64) -> EngineResult<()> {
        match self.max_bytes {
            Some(limit) if len > limit => Err(IntakeError::input_too_large(len, limit)),
            _ => Ok(()),
        }
    }

    pub fn enforce_pixels(&self, width: u32, height: u32) -> EngineResult<()> {
        if let Some(limit) = self.max_pixels {
            let pixels = width as u64 * height as u64;
            if pixels > limit {
                tracing::debug!(width, height, pixels, limit, "pixel cap exceeded");
                return Err(IntakeError::pixel_count_exceeds_limit(pixels, limit));
            }
        }
        Ok(())
    }

    pub(crate) fn validate(&self) -> EngineResult<()> {
        if self.max_bytes == Some(0) {
            return Err(IntakeError::invalid_config(
                "limits.max_bytes",
                "0",
                "Byte cap must be at least 1; use None to disable it.",
            ));
        }
        if self.max_pixels == Some(0) {
            return Err(IntakeError::invalid_config(
                "limits.max_pixels",
                "0",
                "Pixel cap must be at least 1; use None to disable it.",
            ));
        }
        Ok(())
    }
}
