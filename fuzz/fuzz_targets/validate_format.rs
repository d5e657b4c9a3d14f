#![no_main]

//! Header sniffing and the allow-list must never panic, and must only ever
//! fail with UnsupportedFormat.

use image_intake::engine::validate_bytes;
use image_intake::IntakeError;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    match validate_bytes(data) {
        Ok(_) | Err(IntakeError::UnsupportedFormat { .. }) => {}
        Err(other) => panic!("unexpected validation error: {other:?}"),
    }
});
