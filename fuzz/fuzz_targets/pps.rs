#![no_main]

use h264_bitstream::BitReader;
use libfuzzer_sys::fuzz_target;

/// Fuzz PPS parsing directly against an RBSP-unescaped payload. The first
/// byte selects a chroma_format_idc in 0..=3 to exercise the 8x8 scaling
/// list count rule without needing a real SPS in scope.
fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }
    let chroma_format_idc = data[0] % 4;
    let unescaped = h264_bitstream::remove_emulation_prevention_bytes(&data[1..]);
    let mut reader = BitReader::new(&unescaped);
    let _ = h264_bitstream::pps::parse_pps(&mut reader, chroma_format_idc);
});
