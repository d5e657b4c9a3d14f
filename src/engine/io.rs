// src/engine/io.rs
//
// I/O operations: pull the upload off its reader into one owned buffer.

use crate::engine::common::EngineResult;
use crate::error::IntakeError;
use std::io::Read;

const INITIAL_CAPACITY: usize = 64 * 1024;

/// Read the whole stream into memory.
///
/// With `max_bytes` set, at most `max_bytes + 1` bytes are pulled off the
/// reader, which is enough to tell an over-long stream from one that is exactly
/// at the cap without draining the rest of it.
pub fn read_source<R: Read>(reader: R, max_bytes: Option<u64>) -> EngineResult<Vec<u8>> {
    let mut data = Vec::with_capacity(match max_bytes {
        Some(cap) => usize::try_from(cap).unwrap_or(usize::MAX).min(INITIAL_CAPACITY),
        None => INITIAL_CAPACITY,
    });

    match max_bytes {
        Some(cap) => {
            reader
                .take(cap.saturating_add(1))
                .read_to_end(&mut data)
                .map_err(IntakeError::input_read_failed)?;
            let len = data.len() as u64;
            if len > cap {
                return Err(IntakeError::input_too_large(len, cap));
            }
        }
        None => {
            let mut reader = reader;
            reader
                .read_to_end(&mut data)
                .map_err(IntakeError::input_read_failed)?;
        }
    }

    tracing::debug!(bytes = data.len(), "read upload");
    Ok(data)
}
