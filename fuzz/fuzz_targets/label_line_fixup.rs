//! Fuzz target for the column and precision fix-up passes.

#![no_main]

use libfuzzer_sys::fuzz_target;
use kplabel::fixup::{fix_columns_text, fix_precision_text};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let (fixed, _) = fix_columns_text(text, 13);
    assert!(fixed.lines().all(|line| line.split_whitespace().count() == 13));
    let _ = fix_precision_text(text);
});
