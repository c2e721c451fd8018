#![no_main]

use h264_bitstream::BitReader;
use libfuzzer_sys::fuzz_target;

/// Fuzz SPS parsing directly against an RBSP-unescaped payload.
fuzz_target!(|data: &[u8]| {
    let unescaped = h264_bitstream::remove_emulation_prevention_bytes(data);
    let mut reader = BitReader::new(&unescaped);
    let _ = h264_bitstream::sps::parse_sps(&mut reader);
});
