//! Fuzz target for label map pbtxt parsing.
//!
//! This fuzzer feeds arbitrary byte sequences to the label map parser,
//! checking for panics, crashes, or hangs.

#![no_main]

use libfuzzer_sys::fuzz_target;
use voc2tfrecord::label_map::from_pbtxt_slice;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    let _ = from_pbtxt_slice(data);
});
