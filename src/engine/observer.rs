// src/engine/observer.rs
//
// Stage instrumentation hooks. The transcoder reports every stage boundary to a
// StageObserver; the default one forwards to `tracing`.

use crate::engine::Dimensions;
use crate::error::{IntakeError, Stage};
use std::time::Duration;

/// One stage boundary.
#[derive(Debug, Clone, Copy)]
pub enum StageEvent<'a> {
    Started {
        stage: Stage,
    },
    /// `dimensions` is the buffer size after the stage, when it has one
    Completed {
        stage: Stage,
        elapsed: Duration,
        dimensions: Option<Dimensions>,
    },
    Failed {
        stage: Stage,
        error: &'a IntakeError,
    },
}

impl StageEvent<'_> {
    pub fn stage(&self) -> Stage {
        match self {
            StageEvent::Started { stage }
            | StageEvent::Completed { stage, .. }
            | StageEvent::Failed { stage, .. } => *stage,
        }
    }
}

/// Receives stage events. Called synchronously on the processing thread, so
/// implementations should return quickly.
pub trait StageObserver: Send + Sync {
    fn on_event(&self, event: &StageEvent<'_>);
}

/// Emits each event as a `tracing` event under `image_intake::stage`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl StageObserver for TracingObserver {
    fn on_event(&self, event: &StageEvent<'_>) {
        match event {
            StageEvent::Started { stage } => {
                tracing::debug!(target: "image_intake::stage", stage = %stage, "stage started");
            }
            StageEvent::Completed {
                stage,
                elapsed,
                dimensions,
            } => {
                let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
                match dimensions {
                    Some(d) => tracing::debug!(
                        target: "image_intake::stage",
                        stage = %stage,
                        elapsed_ms,
                        width = d.width,
                        height = d.height,
                        "stage completed"
                    ),
                    None => tracing::debug!(
                        target: "image_intake::stage",
                        stage = %stage,
                        elapsed_ms,
                        "stage completed"
                    ),
                }
            }
            StageEvent::Failed { stage, error } => {
                tracing::warn!(
                    target: "image_intake::stage",
                    stage = %stage,
                    category = error.category().as_str(),
                    error = %error,
                    "stage failed"
                );
            }
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl StageObserver for NoopObserver {
    fn on_event(&self, _event: &StageEvent<'_>) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_reports_its_stage() {
        let err = IntakeError::decode_failed("x");
        let events = [
            StageEvent::Started {
                stage: Stage::Validate,
            },
            StageEvent::Completed {
                stage: Stage::Resize,
                elapsed: Duration::from_millis(3),
                dimensions: Some(Dimensions::new(1024, 512)),
            },
            StageEvent::Failed {
                stage: Stage::Decode,
                error: &err,
            },
        ];
        let stages: Vec<Stage> = events.iter().map(StageEvent::stage).collect();
        assert_eq!(stages, [Stage::Validate, Stage::Resize, Stage::Decode]);
    }

    #[test]
    fn builtin_observers_accept_every_event() {
        let err = IntakeError::encode_failed("x");
        let observers: [&dyn StageObserver; 2] = [&TracingObserver, &NoopObserver];
        for observer in observers {
            observer.on_event(&StageEvent::Started { stage: Stage::Read });
            observer.on_event(&StageEvent::Completed {
                stage: Stage::Read,
                elapsed: Duration::ZERO,
                dimensions: None,
            });
            observer.on_event(&StageEvent::Failed {
                stage: Stage::Encode,
                error: &err,
            });
        }
    }
}
