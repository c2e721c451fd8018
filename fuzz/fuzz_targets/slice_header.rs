#![no_main]

use h264_bitstream::{BitReader, NalUnitType, ParamSetStore};
use libfuzzer_sys::fuzz_target;
use std::sync::OnceLock;

/// A minimal Baseline SPS/PPS pair, parsed once, so the fuzzed bytes
/// exercise slice-header parsing itself rather than immediately bouncing
/// off a missing-parameter-set error.
fn seeded_store() -> &'static ParamSetStore {
    static STORE: OnceLock<ParamSetStore> = OnceLock::new();
    STORE.get_or_init(|| {
        let sps_bytes = [
            0x42, 0xc0, 0x16, 0xa6, 0x11, 0x05, 0x07, 0xe9, 0xb2, 0x00, 0x00,
            0x00, 0x02, 0x00, 0x00, 0x00, 0x64, 0x1e, 0x2c, 0x5c,
        ];
        let mut store = ParamSetStore::new();
        let mut sps_reader = BitReader::new(&sps_bytes);
        let sps = h264_bitstream::sps::parse_sps(&mut sps_reader).unwrap();
        store.insert_sps(0, sps);

        let pps_bytes = [0b1_1_1_0_1_1_1_0, 0b0_1_1_1_1_0_0_0];
        let mut pps_reader = BitReader::new(&pps_bytes);
        let pps = h264_bitstream::pps::parse_pps(&mut pps_reader, 1).unwrap();
        store.insert_pps(0, pps);
        store
    })
}

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }
    let nal_type = if data[0] & 1 == 0 {
        NalUnitType::NonIdrSlice
    } else {
        NalUnitType::IdrSlice
    };
    let unescaped = h264_bitstream::remove_emulation_prevention_bytes(&data[1..]);
    let mut reader = BitReader::new(&unescaped);
    let _ = h264_bitstream::slice::parse_slice_header(&mut reader, seeded_store(), nal_type, 1);
});
