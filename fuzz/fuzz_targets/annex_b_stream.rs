#![no_main]

use h264_bitstream::{parse_annex_b, ParsingOptions};
use libfuzzer_sys::fuzz_target;

/// Fuzz the full Annex-B entry point: framing, NAL header parsing, and
/// dispatch to SPS/PPS/slice-header parsing all run against arbitrary
/// bytes. The parser must never panic on malformed input.
fuzz_target!(|data: &[u8]| {
    let _ = parse_annex_b(data, &ParsingOptions::default());
});
