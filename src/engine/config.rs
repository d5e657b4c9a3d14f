// src/engine/config.rs
//
// Transcoder configuration. Defaults reproduce the fixed upload policy:
// 1024x576 pixel threshold, 1024px long side, WebP quality 75, no input caps.

use crate::engine::common::EngineResult;
use crate::engine::encoder::EncodeSettings;
use crate::engine::limits::InputLimits;
use crate::engine::resize::ResizePolicy;
use crate::error::IntakeError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TranscodeConfig {
    pub resize: ResizePolicy,
    pub encode: EncodeSettings,
    pub limits: InputLimits,
}

impl TranscodeConfig {
    pub fn with_resize(mut self, resize: ResizePolicy) -> Self {
        self.resize = resize;
        self
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.encode.quality = quality;
        self
    }

    pub fn with_limits(mut self, limits: InputLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Reject settings the pipeline cannot honour.
    pub fn validate(&self) -> EngineResult<()> {
        if self.encode.quality > 100 {
            return Err(IntakeError::invalid_config(
                "encode.quality",
                self.encode.quality.to_string(),
                "Quality must be between 0 and 100.",
            ));
        }
        if self.resize.target_long_side == 0 {
            return Err(IntakeError::invalid_config(
                "resize.target_long_side",
                "0",
                "Target long side must be at least 1 pixel.",
            ));
        }
        self.limits.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_upload_policy() {
        let config = TranscodeConfig::default();
        assert_eq!(config.resize.max_pixels, 589_824);
        assert_eq!(config.resize.target_long_side, 1024);
        assert_eq!(config.encode.quality, 75);
        assert_eq!(config.limits, InputLimits::unbounded());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_quality_over_100() {
        let err = TranscodeConfig::default().with_quality(101).validate().unwrap_err();
        match err {
            IntakeError::InvalidConfig { name, value, .. } => {
                assert_eq!(name, "encode.quality");
                assert_eq!(value, "101");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(TranscodeConfig::default().with_quality(100).validate().is_ok());
        assert!(TranscodeConfig::default().with_quality(0).validate().is_ok());
    }

    #[test]
    fn rejects_zero_target() {
        let config = TranscodeConfig::default().with_resize(ResizePolicy {
            max_pixels: 10,
            target_long_side: 0,
        });
        assert!(matches!(
            config.validate(),
            Err(IntakeError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn zero_pixel_threshold_is_allowed() {
        // resize everything with a long side over the target
        let config = TranscodeConfig::default().with_resize(ResizePolicy {
            max_pixels: 0,
            target_long_side: 512,
        });
        assert!(config.validate().is_ok());
    }

    #[test]
    fn limits_are_validated() {
        let config =
            TranscodeConfig::default().with_limits(InputLimits::unbounded().with_max_bytes(0));
        assert!(config.validate().is_err());
        let config = TranscodeConfig::default().with_limits(InputLimits::strict());
        assert!(config.validate().is_ok());
    }
}
