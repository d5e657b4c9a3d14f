#![no_main]

//! Fuzz target for EXIF parsing. Exercises detect_exif_orientation() on
//! arbitrary data and applies whatever it finds to a small buffer.

use image::DynamicImage;
use image_intake::engine::{apply_orientation, detect_exif_orientation};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Some(orientation) = detect_exif_orientation(data) {
        let out = apply_orientation(DynamicImage::new_rgb8(3, 2), orientation);
        let expected = if orientation.swaps_dimensions() { (2, 3) } else { (3, 2) };
        assert_eq!((out.width(), out.height()), expected);
    }
});
