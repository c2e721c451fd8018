//! NAL unit header parsing and Annex-B / length-prefixed framing.

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// H.264/AVC NAL unit types (Table 7-1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum NalUnitType {
    Unspecified = 0,
    NonIdrSlice = 1,
    SliceDataA = 2,
    SliceDataB = 3,
    SliceDataC = 4,
    IdrSlice = 5,
    Sei = 6,
    Sps = 7,
    Pps = 8,
    Aud = 9,
    EndOfSequence = 10,
    EndOfStream = 11,
    FillerData = 12,
    SpsExtension = 13,
    PrefixNal = 14,
    SubsetSps = 15,
    Reserved16 = 16,
    Reserved17 = 17,
    Reserved18 = 18,
    AuxSlice = 19,
    SliceExtension = 20,
    SliceExtensionDepth = 21,
    Reserved22 = 22,
    Reserved23 = 23,
    Unspecified24 = 24,
}

impl NalUnitType {
    /// Create from the raw 5-bit value.
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => NalUnitType::Unspecified,
            1 => NalUnitType::NonIdrSlice,
            2 => NalUnitType::SliceDataA,
            3 => NalUnitType::SliceDataB,
            4 => NalUnitType::SliceDataC,
            5 => NalUnitType::IdrSlice,
            6 => NalUnitType::Sei,
            7 => NalUnitType::Sps,
            8 => NalUnitType::Pps,
            9 => NalUnitType::Aud,
            10 => NalUnitType::EndOfSequence,
            11 => NalUnitType::EndOfStream,
            12 => NalUnitType::FillerData,
            13 => NalUnitType::SpsExtension,
            14 => NalUnitType::PrefixNal,
            15 => NalUnitType::SubsetSps,
            16 => NalUnitType::Reserved16,
            17 => NalUnitType::Reserved17,
            18 => NalUnitType::Reserved18,
            19 => NalUnitType::AuxSlice,
            20 => NalUnitType::SliceExtension,
            21 => NalUnitType::SliceExtensionDepth,
            22 => NalUnitType::Reserved22,
            23 => NalUnitType::Reserved23,
            _ => NalUnitType::Unspecified24,
        }
    }

    /// Whether this is a Video Coding Layer NAL unit type.
    pub fn is_vcl(&self) -> bool {
        matches!(
            self,
            NalUnitType::NonIdrSlice
                | NalUnitType::SliceDataA
                | NalUnitType::SliceDataB
                | NalUnitType::SliceDataC
                | NalUnitType::IdrSlice
                | NalUnitType::AuxSlice
                | NalUnitType::SliceExtension
                | NalUnitType::SliceExtensionDepth
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            NalUnitType::Unspecified => "Unspecified",
            NalUnitType::NonIdrSlice => "Non-IDR Slice",
            NalUnitType::SliceDataA => "Slice Data A",
            NalUnitType::SliceDataB => "Slice Data B",
            NalUnitType::SliceDataC => "Slice Data C",
            NalUnitType::IdrSlice => "IDR Slice",
            NalUnitType::Sei => "SEI",
            NalUnitType::Sps => "SPS",
            NalUnitType::Pps => "PPS",
            NalUnitType::Aud => "AUD",
            NalUnitType::EndOfSequence => "End of Sequence",
            NalUnitType::EndOfStream => "End of Stream",
            NalUnitType::FillerData => "Filler Data",
            NalUnitType::SpsExtension => "SPS Extension",
            NalUnitType::PrefixNal => "Prefix NAL",
            NalUnitType::SubsetSps => "Subset SPS",
            NalUnitType::Reserved16
            | NalUnitType::Reserved17
            | NalUnitType::Reserved18
            | NalUnitType::Reserved22
            | NalUnitType::Reserved23 => "Reserved",
            NalUnitType::AuxSlice => "Auxiliary Slice",
            NalUnitType::SliceExtension => "Slice Extension",
            NalUnitType::SliceExtensionDepth => "Slice Extension (Depth)",
            NalUnitType::Unspecified24 => "Unspecified",
        }
    }
}

/// Extension header carried by NAL unit types 14 (prefix) and 20 (slice
/// extension) when `svc_extension_flag` is set: the `nal_unit_header_svc_extension`
/// of Annex G. Only the fields useful for inspection are retained.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SvcExtension {
    pub idr_flag: bool,
    pub priority_id: u8,
    pub no_inter_layer_pred_flag: bool,
    pub dependency_id: u8,
    pub quality_id: u8,
    pub temporal_id: u8,
    pub use_ref_base_pic_flag: bool,
    pub discardable_flag: bool,
    pub output_flag: bool,
}

/// Extension header carried by NAL unit type 21 (3D/MVC depth view slice
/// extension) when `avc_3d_extension_flag` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreeDAvcExtension {
    pub view_idx: u8,
    pub depth_flag: bool,
    pub non_idr_flag: bool,
    pub temporal_id: u8,
    pub anchor_pic_flag: bool,
    pub inter_view_flag: bool,
}

/// NAL unit header extension, present only for types 14, 20, and 21.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NalUnitHeaderExtension {
    Svc(SvcExtension),
    ThreeDAvc(ThreeDAvcExtension),
}

/// NAL unit header: `forbidden_zero_bit`, `nal_ref_idc`, `nal_unit_type`, and
/// an optional SVC/3D extension header for types 14/20/21.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NalUnitHeader {
    pub forbidden_zero_bit: bool,
    pub nal_ref_idc: u8,
    pub nal_unit_type: NalUnitType,
    pub extension: Option<NalUnitHeaderExtension>,
}

impl NalUnitHeader {
    pub fn is_reference(&self) -> bool {
        self.nal_ref_idc > 0
    }
}

/// Parse the 1-byte NAL unit header plus, for types 14/20/21, the extension
/// header that immediately follows it.
///
/// `forbidden_zero_bit` is not enforced as a hard error (real-world
/// bitstreams occasionally carry junk there); callers that want strict
/// conformance can check the returned flag themselves.
pub fn parse_nal_header(reader: &mut crate::bitreader::BitReader) -> Result<NalUnitHeader> {
    let forbidden_zero_bit = reader.read_flag()?;
    let nal_ref_idc = reader.read_bits(2)? as u8;
    let nal_unit_type = NalUnitType::from_u8(reader.read_bits(5)? as u8);

    let extension = match nal_unit_type {
        NalUnitType::PrefixNal | NalUnitType::SliceExtension => {
            let svc_extension_flag = reader.read_flag()?;
            if svc_extension_flag {
                Some(NalUnitHeaderExtension::Svc(SvcExtension {
                    idr_flag: reader.read_flag()?,
                    priority_id: reader.read_bits(6)? as u8,
                    no_inter_layer_pred_flag: reader.read_flag()?,
                    dependency_id: reader.read_bits(3)? as u8,
                    quality_id: reader.read_bits(4)? as u8,
                    temporal_id: reader.read_bits(3)? as u8,
                    use_ref_base_pic_flag: reader.read_flag()?,
                    discardable_flag: reader.read_flag()?,
                    output_flag: reader.read_flag()?,
                }))
            } else {
                let _reserved_three_2bits = reader.read_bits(2)?;
                None
            }
        }
        NalUnitType::SliceExtensionDepth => {
            let avc_3d_extension_flag = reader.read_flag()?;
            if avc_3d_extension_flag {
                Some(NalUnitHeaderExtension::ThreeDAvc(ThreeDAvcExtension {
                    view_idx: reader.read_bits(8)? as u8,
                    depth_flag: reader.read_flag()?,
                    non_idr_flag: reader.read_flag()?,
                    temporal_id: reader.read_bits(3)? as u8,
                    anchor_pic_flag: reader.read_flag()?,
                    inter_view_flag: reader.read_flag()?,
                }))
            } else {
                // nal_unit_header_mvc_extension, same bit layout as SVC
                // minus the scalability fields; kept coarse since MVC-only
                // streams are out of scope.
                let _non_idr_flag = reader.read_flag()?;
                let _priority_id = reader.read_bits(6)?;
                let _view_id = reader.read_bits(10)?;
                let _temporal_id = reader.read_bits(3)?;
                let _anchor_pic_flag = reader.read_flag()?;
                let _inter_view_flag = reader.read_flag()?;
                let _reserved_one_bit = reader.read_flag()?;
                None
            }
        }
        _ => None,
    };

    Ok(NalUnitHeader {
        forbidden_zero_bit,
        nal_ref_idc,
        nal_unit_type,
        extension,
    })
}

/// One framed NAL unit location within the caller's input buffer.
///
/// `start_offset` points at the first byte of the start-code sequence (or,
/// for length-prefixed streams, the length field); `payload_start_offset`
/// is the first byte of the NAL unit itself (its header byte);
/// `payload_size` is the number of NAL bytes that follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NaluIndex {
    pub start_offset: usize,
    pub payload_start_offset: usize,
    pub payload_size: usize,
}

/// Find NAL unit boundaries in an Annex-B byte stream (3- and 4-byte start
/// codes `00 00 01` / `00 00 00 01`).
///
/// Boyer-Moore-inspired single pass: most bytes are skipped 3 at a time via
/// the `buf[i+2] > 1` fast path, since a third byte greater than 1 can never
/// be part of a start code tail.
pub fn find_nalu_indices(data: &[u8]) -> Vec<NaluIndex> {
    let mut indices: Vec<NaluIndex> = Vec::new();
    if data.len() < 3 {
        return indices;
    }

    let mut i = 0usize;
    let end = data.len() - 3;

    while i <= end {
        if data[i + 2] > 1 {
            i += 3;
            continue;
        }
        if data[i] == 0 && data[i + 1] == 0 && data[i + 2] == 1 {
            let mut start_offset = i;
            if i > 0 && data[i - 1] == 0x00 {
                start_offset = i - 1;
            }
            let payload_start_offset = i + 3;

            if let Some(prev) = indices.last_mut() {
                prev.payload_size = start_offset - prev.payload_start_offset;
            }

            indices.push(NaluIndex {
                start_offset,
                payload_start_offset,
                payload_size: 0,
            });

            i += 3;
            continue;
        }
        i += 1;
    }

    if let Some(last) = indices.last_mut() {
        last.payload_size = data.len() - last.payload_start_offset;
    }

    indices
}

/// Find NAL unit boundaries in a length-prefixed (ISO-BMFF style) byte
/// stream: each record is `(n-byte big-endian length, NAL bytes)`.
/// `length_size` is typically 4.
pub fn find_nalu_indices_length(data: &[u8], length_size: usize) -> Vec<NaluIndex> {
    let mut indices = Vec::new();
    let mut i = 0usize;

    while i + length_size <= data.len() {
        let mut len: usize = 0;
        for b in &data[i..i + length_size] {
            len = (len << 8) | (*b as usize);
        }

        let payload_start_offset = i + length_size;
        if payload_start_offset > data.len() {
            break;
        }
        let payload_size = len.min(data.len() - payload_start_offset);

        indices.push(NaluIndex {
            start_offset: i,
            payload_start_offset,
            payload_size,
        });

        i = payload_start_offset + payload_size;
        if len > data.len() - payload_start_offset {
            break;
        }
    }

    indices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitreader::BitReader;

    #[test]
    fn test_find_nalu_indices_3byte() {
        let data = [0x00, 0x00, 0x01, 0x67, 0xaa, 0x00, 0x00, 0x01, 0x68, 0xbb];
        let indices = find_nalu_indices(&data);
        assert_eq!(indices.len(), 2);
        assert_eq!(indices[0].payload_start_offset, 3);
        assert_eq!(indices[0].payload_size, 2);
        assert_eq!(indices[1].payload_start_offset, 8);
        assert_eq!(indices[1].payload_size, 2);
    }

    #[test]
    fn test_find_nalu_indices_4byte() {
        let data = [0x00, 0x00, 0x00, 0x01, 0x67, 0xaa, 0xbb];
        let indices = find_nalu_indices(&data);
        assert_eq!(indices.len(), 1);
        assert_eq!(indices[0].start_offset, 0);
        assert_eq!(indices[0].payload_start_offset, 4);
        assert_eq!(indices[0].payload_size, 3);
    }

    #[test]
    fn test_find_nalu_indices_empty() {
        assert!(find_nalu_indices(&[]).is_empty());
        assert!(find_nalu_indices(&[0x00, 0x00]).is_empty());
    }

    #[test]
    fn test_find_nalu_indices_length_prefixed() {
        let data = [0x00, 0x00, 0x00, 0x02, 0x67, 0xaa, 0x00, 0x00, 0x00, 0x01, 0x68];
        let indices = find_nalu_indices_length(&data, 4);
        assert_eq!(indices.len(), 2);
        assert_eq!(indices[0].payload_size, 2);
        assert_eq!(indices[1].payload_size, 1);
    }

    #[test]
    fn test_parse_nal_header_sps() {
        let data = [0x67];
        let mut reader = BitReader::new(&data);
        let header = parse_nal_header(&mut reader).unwrap();
        assert_eq!(header.nal_ref_idc, 3);
        assert_eq!(header.nal_unit_type, NalUnitType::Sps);
        assert!(header.extension.is_none());
    }

    #[test]
    fn test_nal_type_is_vcl() {
        assert!(NalUnitType::NonIdrSlice.is_vcl());
        assert!(NalUnitType::IdrSlice.is_vcl());
        assert!(!NalUnitType::Sps.is_vcl());
    }
}
