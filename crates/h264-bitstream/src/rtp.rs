//! RTP payload parsing for H.264 (RFC 6184), single NAL unit mode only.
//!
//! Aggregation packets (STAP-A/B, MTAP16/24) and fragmentation units
//! (FU-A/FU-B) are out of scope; a payload whose NAL unit type falls in
//! those reserved ranges (24-29) is reported as unsupported rather than
//! decoded.

use crate::bitreader::{remove_emulation_prevention_bytes, BitReader};
use crate::bitstream::{dispatch_payload, NalUnitPayload};
use crate::error::{AvcError, Result};
use crate::nal::{parse_nal_header, NalUnitHeader};
use crate::param_set_store::ParamSetStore;

/// A single NAL unit carried directly as an RTP payload (RFC 6184 section
/// 5.6), with no start code: the first byte is the NAL unit header.
#[derive(Debug)]
pub struct RtpSingleNalUnit {
    pub header: NalUnitHeader,
    pub payload: NalUnitPayload,
}

/// Parse one RTP payload as a single H.264 NAL unit.
pub fn parse_rtp_single_nal_unit(data: &[u8], store: &mut ParamSetStore) -> Result<RtpSingleNalUnit> {
    if data.is_empty() {
        return Err(AvcError::InvalidStartCode);
    }

    let nal_unit_type_raw = data[0] & 0x1f;
    if (24..=29).contains(&nal_unit_type_raw) {
        return Err(AvcError::Unsupported(
            "RTP aggregation/fragmentation packet types (STAP/MTAP/FU) are not decoded",
        ));
    }

    let escaped = remove_emulation_prevention_bytes(data);
    let mut reader = BitReader::new(&escaped);
    let header = parse_nal_header(&mut reader)?;

    let payload = dispatch_payload(&header, &mut reader, store);

    Ok(RtpSingleNalUnit { header, payload })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rtp_single_nal_sps() {
        let data = [
            0x67, 0x42, 0xc0, 0x16, 0xa6, 0x11, 0x05, 0x07, 0xe9, 0xb2, 0x00,
            0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x64, 0x1e, 0x2c, 0x5c,
        ];
        let mut store = ParamSetStore::new();
        let nal = parse_rtp_single_nal_unit(&data, &mut store).unwrap();
        assert!(matches!(nal.payload, NalUnitPayload::Sps(_)));
    }

    #[test]
    fn test_rtp_fu_a_rejected() {
        // FU-A indicator: nal_unit_type 28
        let data = [0x7c, 0x85, 0x00];
        let mut store = ParamSetStore::new();
        let err = parse_rtp_single_nal_unit(&data, &mut store).unwrap_err();
        assert!(matches!(err, AvcError::Unsupported(_)));
    }

    #[test]
    fn test_rtp_empty_payload() {
        let mut store = ParamSetStore::new();
        assert!(parse_rtp_single_nal_unit(&[], &mut store).is_err());
    }
}
