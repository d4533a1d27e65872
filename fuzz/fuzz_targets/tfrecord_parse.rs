//! Fuzz target for TFRecord container parsing.
//!
//! This fuzzer feeds arbitrary byte sequences to the TFRecord reader,
//! checking for panics, crashes, or hangs in the framing and protobuf
//! decode paths.

#![no_main]

use libfuzzer_sys::fuzz_target;
use voc2tfrecord::tfrecord::read_tfrecord_slice;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    let _ = read_tfrecord_slice(data);
});
