#![no_main]

use image_intake::{InputLimits, NoopObserver, TranscodeConfig, Transcoder};
use libfuzzer_sys::fuzz_target;
use std::sync::{Arc, OnceLock};

// Strict caps keep a single iteration from allocating gigabytes
fn transcoder() -> &'static Transcoder {
    static TRANSCODER: OnceLock<Transcoder> = OnceLock::new();
    TRANSCODER.get_or_init(|| {
        Transcoder::new(TranscodeConfig::default().with_limits(InputLimits::strict()))
            .expect("strict config is valid")
            .with_observer(Arc::new(NoopObserver))
    })
}

fuzz_target!(|data: &[u8]| {
    if let Ok(output) = transcoder().process(data) {
        assert_eq!(&output.data[0..4], b"RIFF");
        assert!(output.output_dimensions.width <= 16383);
    }
});
