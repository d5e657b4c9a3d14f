// src/engine/common.rs
//
// Common utilities shared across engine modules.
// Provides the codec panic policy and the shared Result alias.

use crate::error::IntakeError;
use std::panic::{catch_unwind, AssertUnwindSafe};

pub(crate) type EngineResult<T> = std::result::Result<T, IntakeError>;

/// Run a codec call, turning a panic into an error instead of unwinding into
/// the caller.
///
/// mozjpeg reports libjpeg errors by panicking, and the C-backed codecs can
/// assert on hostile input. `on_panic` decides which error the panic becomes
/// so a corrupt JPEG still surfaces as a decode failure.
pub(crate) fn run_with_panic_policy<T, F, P>(
    label: &'static str,
    on_panic: P,
    f: F,
) -> EngineResult<T>
where
    F: FnOnce() -> EngineResult<T>,
    P: FnOnce(String) -> IntakeError,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let detail = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic payload".to_string());
            tracing::warn!(target: "image_intake::panic", label, %detail, "codec panicked");
            Err(on_panic(format!("{label}: {detail}")))
        }
    }
}
