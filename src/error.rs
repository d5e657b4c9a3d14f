// src/error.rs
//
// Unified error handling for image-intake
// Uses thiserror for simple, type-safe error handling
//
// Error Taxonomy:
// - InvalidInput: the upload itself is bad, reject it
// - ResourceLimit: the host could not supply the bytes or resources
// - ProcessingFault: resize/encode failed on an otherwise valid image
// - Configuration: the Transcoder was built with bad settings

use std::borrow::Cow;
use std::fmt;
use thiserror::Error;

/// Pipeline stage an error (or event) belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Read,
    Validate,
    Decode,
    Resize,
    Encode,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Read => "read",
            Stage::Validate => "validate",
            Stage::Decode => "decode",
            Stage::Resize => "resize",
            Stage::Encode => "encode",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error category used by callers to pick a response.
///
/// `InvalidInput` maps to a generic "rejected upload" answer, everything else
/// to a generic internal failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The uploaded bytes are not an acceptable image
    InvalidInput,
    /// I/O or resource exhaustion outside the image itself
    ResourceLimit,
    /// Resampling or encoding failed
    ProcessingFault,
    /// Invalid Transcoder settings
    Configuration,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::InvalidInput => "InvalidInput",
            ErrorCategory::ResourceLimit => "ResourceLimit",
            ErrorCategory::ProcessingFault => "ProcessingFault",
            ErrorCategory::Configuration => "Configuration",
        }
    }
}

/// image-intake error types
///
/// The `Display` text is detailed and meant for logs. Use
/// [`IntakeError::public_message`] for anything shown to the uploader.
#[derive(Debug, Error)]
pub enum IntakeError {
    // Read Errors
    #[error("Failed to read image stream: {source}")]
    InputReadFailed {
        #[source]
        source: std::io::Error,
    },

    #[error("Input size {len} bytes exceeds limit of {max} bytes")]
    InputTooLarge { len: u64, max: u64 },

    // Validate Errors
    #[error("Unsupported image format: {format}")]
    UnsupportedFormat { format: Cow<'static, str> },

    // Decode Errors
    #[error("Failed to decode image: {message}")]
    DecodeFailed { message: Cow<'static, str> },

    #[error("Image dimension {dimension} exceeds maximum {max}")]
    DimensionExceedsLimit { dimension: u32, max: u32 },

    #[error("Image pixel count {pixels} exceeds maximum {max}")]
    PixelCountExceedsLimit { pixels: u64, max: u64 },

    // Resize Errors
    #[error("Resize failed ({source_width}x{source_height} -> {target_width}x{target_height}): {message}")]
    ResizeFailed {
        source_width: u32,
        source_height: u32,
        target_width: u32,
        target_height: u32,
        message: Cow<'static, str>,
    },

    // Encode Errors
    #[error("Failed to initialize webp encoder for {width}x{height}: {message}")]
    EncodeInitFailed {
        width: u32,
        height: u32,
        message: Cow<'static, str>,
    },

    #[error("Failed to encode image to webp: {message}")]
    EncodeFailed { message: Cow<'static, str> },

    // Configuration Errors
    #[error("Invalid value for {name}: {value}. {reason}")]
    InvalidConfig {
        name: Cow<'static, str>,
        value: Cow<'static, str>,
        reason: Cow<'static, str>,
    },

    // Internal Errors
    #[error("Internal error at {stage} stage: {message}")]
    InternalPanic {
        stage: Stage,
        message: Cow<'static, str>,
    },
}

// Constructor Helpers
impl IntakeError {
    pub fn input_read_failed(source: std::io::Error) -> Self {
        Self::InputReadFailed { source }
    }

    pub fn input_too_large(len: u64, max: u64) -> Self {
        Self::InputTooLarge { len, max }
    }

    pub fn unsupported_format(format: impl Into<Cow<'static, str>>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
        }
    }

    pub fn decode_failed(message: impl Into<Cow<'static, str>>) -> Self {
        Self::DecodeFailed {
            message: message.into(),
        }
    }

    pub fn dimension_exceeds_limit(dimension: u32, max: u32) -> Self {
        Self::DimensionExceedsLimit { dimension, max }
    }

    pub fn pixel_count_exceeds_limit(pixels: u64, max: u64) -> Self {
        Self::PixelCountExceedsLimit { pixels, max }
    }

    pub fn resize_failed(
        source_dims: (u32, u32),
        target_dims: (u32, u32),
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::ResizeFailed {
            source_width: source_dims.0,
            source_height: source_dims.1,
            target_width: target_dims.0,
            target_height: target_dims.1,
            message: message.into(),
        }
    }

    pub fn encode_init_failed(
        width: u32,
        height: u32,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::EncodeInitFailed {
            width,
            height,
            message: message.into(),
        }
    }

    pub fn encode_failed(message: impl Into<Cow<'static, str>>) -> Self {
        Self::EncodeFailed {
            message: message.into(),
        }
    }

    pub fn invalid_config(
        name: impl Into<Cow<'static, str>>,
        value: impl Into<Cow<'static, str>>,
        reason: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::InvalidConfig {
            name: name.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn internal_panic(stage: Stage, message: impl Into<Cow<'static, str>>) -> Self {
        Self::InternalPanic {
            stage,
            message: message.into(),
        }
    }

    /// Stage the error was raised in. Configuration errors happen before any
    /// stage runs and return `None`.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::InputReadFailed { .. } | Self::InputTooLarge { .. } => Some(Stage::Read),
            Self::UnsupportedFormat { .. } => Some(Stage::Validate),
            Self::DecodeFailed { .. }
            | Self::DimensionExceedsLimit { .. }
            | Self::PixelCountExceedsLimit { .. } => Some(Stage::Decode),
            Self::ResizeFailed { .. } => Some(Stage::Resize),
            Self::EncodeInitFailed { .. } | Self::EncodeFailed { .. } => Some(Stage::Encode),
            Self::InternalPanic { stage, .. } => Some(*stage),
            Self::InvalidConfig { .. } => None,
        }
    }

    /// Get the error category for this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            // InvalidInput: the upload is at fault
            Self::InputTooLarge { .. }
            | Self::UnsupportedFormat { .. }
            | Self::DecodeFailed { .. }
            | Self::DimensionExceedsLimit { .. }
            | Self::PixelCountExceedsLimit { .. } => ErrorCategory::InvalidInput,

            Self::InputReadFailed { .. } => ErrorCategory::ResourceLimit,

            Self::ResizeFailed { .. }
            | Self::EncodeInitFailed { .. }
            | Self::EncodeFailed { .. }
            | Self::InternalPanic { .. } => ErrorCategory::ProcessingFault,

            Self::InvalidConfig { .. } => ErrorCategory::Configuration,
        }
    }

    /// True when the upload should be rejected as bad input.
    pub fn is_input_error(&self) -> bool {
        self.category() == ErrorCategory::InvalidInput
    }

    /// Whether retrying the same call may succeed.
    ///
    /// Only failures that can stem from transient resource exhaustion qualify.
    /// Encoder construction failures come from the buffer shape and never do.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::InputReadFailed { .. } | Self::ResizeFailed { .. } | Self::EncodeFailed { .. }
        )
    }

    /// Message that is safe to return to an untrusted client.
    pub fn public_message(&self) -> &'static str {
        match self.category() {
            ErrorCategory::InvalidInput => "the uploaded file is not a supported image",
            ErrorCategory::ResourceLimit
            | ErrorCategory::ProcessingFault
            | ErrorCategory::Configuration => "the image could not be processed",
        }
    }
}

// Result type alias
pub type Result<T> = std::result::Result<T, IntakeError>;
