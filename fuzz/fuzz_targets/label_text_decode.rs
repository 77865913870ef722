//! Fuzz target for YOLO-pose label text decoding.
//!
//! Arbitrary UTF-8 text is decoded against an empty schema, which also
//! exercises schema extension for whatever class ids and payload widths the
//! input contains.

#![no_main]

use libfuzzer_sys::fuzz_target;
use kplabel::ir::io_yolo_pose::fuzz_decode_labels;

fuzz_target!(|data: &[u8]| {
    if data.len() > 1024 * 1024 {
        return;
    }

    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let _ = fuzz_decode_labels(text);
});
