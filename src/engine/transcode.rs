// src/engine/transcode.rs
//
// The upload pipeline: read -> validate -> decode+normalize -> resize -> encode.
// Every stage boundary is reported to the configured StageObserver and timed
// into TranscodeMetrics.

use crate::engine::common::EngineResult;
use crate::engine::config::TranscodeConfig;
use crate::engine::decoder::{check_dimensions, decode_normalized};
use crate::engine::encoder::encode_lossy_webp;
use crate::engine::format::{validate_header, FormatTag};
use crate::engine::io::read_source;
use crate::engine::observer::{StageEvent, StageObserver, TracingObserver};
use crate::engine::orientation::Orientation;
use crate::engine::resize::resize_image;
use crate::engine::Dimensions;
use crate::error::Stage;
use std::fmt;
use std::io::{Cursor, Read};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Per-call timings and sizes. Durations are wall-clock milliseconds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranscodeMetrics {
    pub validate_ms: f64,
    pub decode_ms: f64,
    pub resize_ms: f64,
    pub encode_ms: f64,
    /// Includes reading the stream when going through `process_reader`
    pub total_ms: f64,
    pub bytes_in: u64,
    pub bytes_out: u64,
    /// bytes_out / bytes_in, 0.0 for empty input
    pub compression_ratio: f64,
    pub resized: bool,
    pub orientation: Option<Orientation>,
}

/// Result of one successful transcode.
#[derive(Debug, Clone)]
pub struct TranscodeOutput {
    /// Lossy WebP bytes
    pub data: Vec<u8>,
    pub source_format: FormatTag,
    /// Dimensions stored in the source header, before orientation
    pub source_dimensions: Dimensions,
    pub output_dimensions: Dimensions,
    pub metrics: TranscodeMetrics,
}

/// Validates, normalizes and re-encodes uploads.
///
/// Holds only immutable configuration, so a single instance can be shared
/// across threads and called concurrently.
#[derive(Clone)]
pub struct Transcoder {
    config: TranscodeConfig,
    observer: Arc<dyn StageObserver>,
}

impl fmt::Debug for Transcoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transcoder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Transcoder {
    pub fn new(config: TranscodeConfig) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            observer: Arc::new(TracingObserver),
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn StageObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &TranscodeConfig {
        &self.config
    }

    /// Read `reader` to the end (bounded by `limits.max_bytes`) and transcode it.
    pub fn process_reader<R: Read>(&self, reader: R) -> EngineResult<TranscodeOutput> {
        let started = Instant::now();
        let max_bytes = self.config.limits.max_bytes;
        let (bytes, _) = self.run_stage(Stage::Read, || read_source(reader, max_bytes), |_| None)?;
        self.run_pipeline(&bytes, started)
    }

    /// Transcode an upload that is already in memory.
    pub fn process(&self, bytes: &[u8]) -> EngineResult<TranscodeOutput> {
        let started = Instant::now();
        let limits = &self.config.limits;
        self.run_stage(
            Stage::Read,
            || limits.enforce_source_len(bytes.len() as u64),
            |_| None,
        )?;
        self.run_pipeline(bytes, started)
    }

    fn run_pipeline(&self, bytes: &[u8], started: Instant) -> EngineResult<TranscodeOutput> {
        let mut metrics = TranscodeMetrics {
            bytes_in: bytes.len() as u64,
            ..TranscodeMetrics::default()
        };

        let (header, elapsed) = self.run_stage(
            Stage::Validate,
            || validate_header(Cursor::new(bytes)),
            |h| Some(h.dimensions),
        )?;
        metrics.validate_ms = as_ms(elapsed);
        tracing::debug!(
            format = %header.format,
            width = header.dimensions.width,
            height = header.dimensions.height,
            "validated upload header"
        );

        let limits = &self.config.limits;
        let (decoded, elapsed) = self.run_stage(
            Stage::Decode,
            || {
                let dims = header.dimensions;
                check_dimensions(dims.width, dims.height)?;
                limits.enforce_pixels(dims.width, dims.height)?;
                decode_normalized(bytes)
            },
            |d| Some(Dimensions::of(&d.image)),
        )?;
        metrics.decode_ms = as_ms(elapsed);
        metrics.orientation = decoded.orientation;

        let decoded_dims = Dimensions::of(&decoded.image);
        let policy = &self.config.resize;
        let (image, elapsed) = self.run_stage(
            Stage::Resize,
            || resize_image(decoded.image, policy),
            |img| Some(Dimensions::of(img)),
        )?;
        metrics.resize_ms = as_ms(elapsed);
        let output_dimensions = Dimensions::of(&image);
        metrics.resized = output_dimensions != decoded_dims;

        let settings = &self.config.encode;
        let (data, elapsed) = self.run_stage(
            Stage::Encode,
            || encode_lossy_webp(&image, settings),
            |_| Some(output_dimensions),
        )?;
        metrics.encode_ms = as_ms(elapsed);

        metrics.bytes_out = data.len() as u64;
        metrics.compression_ratio = if metrics.bytes_in > 0 {
            metrics.bytes_out as f64 / metrics.bytes_in as f64
        } else {
            0.0
        };
        metrics.total_ms = as_ms(started.elapsed());

        Ok(TranscodeOutput {
            data,
            source_format: header.format,
            source_dimensions: header.dimensions,
            output_dimensions,
            metrics,
        })
    }

    fn run_stage<T, F, D>(&self, stage: Stage, f: F, dims: D) -> EngineResult<(T, Duration)>
    where
        F: FnOnce() -> EngineResult<T>,
        D: FnOnce(&T) -> Option<Dimensions>,
    {
        self.observer.on_event(&StageEvent::Started { stage });
        let stage_start = Instant::now();
        match f() {
            Ok(value) => {
                let elapsed = stage_start.elapsed();
                self.observer.on_event(&StageEvent::Completed {
                    stage,
                    elapsed,
                    dimensions: dims(&value),
                });
                Ok((value, elapsed))
            }
            Err(error) => {
                self.observer.on_event(&StageEvent::Failed {
                    stage,
                    error: &error,
                });
                Err(error)
            }
        }
    }
}

fn as_ms(elapsed: Duration) -> f64 {
    elapsed.as_secs_f64() * 1000.0
}
