//! Top-level bitstream parser: frames NAL units, dispatches each payload to
//! its parser, and accumulates a `BitstreamState` snapshot for inspection.

use crate::bitreader::{remove_emulation_prevention_bytes, BitReader};
use crate::checksum::nalu_checksum;
use crate::error::Result;
use crate::nal::{
    find_nalu_indices, find_nalu_indices_length, parse_nal_header, NalUnitHeader, NalUnitHeaderExtension, NalUnitType,
};
use crate::options::ParsingOptions;
use crate::param_set_store::ParamSetStore;
use crate::pps::{parse_pps, Pps};
use crate::slice::{parse_slice_header, parse_slice_header_in_scalable_extension, SliceHeader, SliceHeaderScalableExtension};
use crate::sps::{parse_sps, parse_sps_extension, parse_subset_sps, Sps, SpsExtension, SubsetSps};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

/// The parsed content of one NAL unit's payload; `None` for types this
/// crate recognizes but does not decode further (e.g. SEI).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NalUnitPayload {
    Sps(Sps),
    Pps(Pps),
    SubsetSps(SubsetSps),
    SpsExtension(SpsExtension),
    SliceHeader(SliceHeader),
    SliceHeaderScalableExtension(SliceHeaderScalableExtension),
    /// Recognized type with no payload decode implemented (SEI, AUD,
    /// filler data, end of sequence/stream, and reserved/unspecified types).
    Unparsed,
    /// The payload parser itself failed; the NAL unit is still reported
    /// with its header and framing info.
    Error(String),
}

/// One NAL unit's worth of bookkeeping plus its decoded payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NalUnitState {
    pub offset: Option<usize>,
    pub length: Option<usize>,
    pub parsed_length: Option<usize>,
    pub checksum: Option<u32>,
    pub header: NalUnitHeaderSnapshot,
    pub payload: NalUnitPayload,
}

/// `NalUnitHeader` is not `Serialize`-agnostic of its extension variants in
/// a way convenient for a flat report, so a small snapshot is kept here
/// instead of re-exporting the parser's own type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NalUnitHeaderSnapshot {
    pub nal_ref_idc: u8,
    pub nal_unit_type: NalUnitType,
}

impl From<&NalUnitHeader> for NalUnitHeaderSnapshot {
    fn from(header: &NalUnitHeader) -> Self {
        Self {
            nal_ref_idc: header.nal_ref_idc,
            nal_unit_type: header.nal_unit_type,
        }
    }
}

/// The full result of parsing a bitstream: every NAL unit encountered, in
/// order, plus the parameter sets accumulated along the way.
#[derive(Debug, Default)]
pub struct BitstreamState {
    pub nal_units: Vec<NalUnitState>,
    pub param_sets: ParamSetStore,
}

pub(crate) fn dispatch_payload(header: &NalUnitHeader, reader: &mut BitReader, store: &mut ParamSetStore) -> NalUnitPayload {
    match header.nal_unit_type {
        NalUnitType::Sps => match parse_sps(reader) {
            Ok(sps) => {
                let id = sps.seq_parameter_set_id;
                store.insert_sps(id, sps.clone());
                NalUnitPayload::Sps(sps)
            }
            Err(e) => NalUnitPayload::Error(e.to_string()),
        },
        NalUnitType::SubsetSps => match parse_subset_sps(reader) {
            Ok(subset) => {
                let id = subset.sps.seq_parameter_set_id;
                store.insert_subset_sps(id, subset.clone());
                NalUnitPayload::SubsetSps(subset)
            }
            Err(e) => NalUnitPayload::Error(e.to_string()),
        },
        NalUnitType::SpsExtension => match parse_sps_extension(reader) {
            Ok(ext) => NalUnitPayload::SpsExtension(ext),
            Err(e) => NalUnitPayload::Error(e.to_string()),
        },
        NalUnitType::Pps => {
            // PPS needs chroma_format_idc from its SPS, but the SPS id it
            // refers to isn't known until the first ue(v) is read; peek it
            // from a forked reader and fall back to 4:2:0 if the referenced
            // SPS isn't in the store yet.
            let chroma_format_idc = peek_pps_chroma_format(reader, store).unwrap_or(1);
            match parse_pps(reader, chroma_format_idc) {
                Ok(pps) => {
                    let id = pps.pic_parameter_set_id;
                    store.insert_pps(id, pps.clone());
                    NalUnitPayload::Pps(pps)
                }
                Err(e) => NalUnitPayload::Error(e.to_string()),
            }
        }
        NalUnitType::NonIdrSlice | NalUnitType::IdrSlice | NalUnitType::AuxSlice => {
            match parse_slice_header(reader, store, header.nal_unit_type, header.nal_ref_idc) {
                Ok(slice_header) => NalUnitPayload::SliceHeader(slice_header),
                Err(e) => NalUnitPayload::Error(e.to_string()),
            }
        }
        NalUnitType::SliceExtension => match &header.extension {
            Some(NalUnitHeaderExtension::Svc(svc)) => {
                match parse_slice_header_in_scalable_extension(reader, store, svc, header.nal_ref_idc) {
                    Ok(slice_header) => NalUnitPayload::SliceHeaderScalableExtension(slice_header),
                    Err(e) => NalUnitPayload::Error(e.to_string()),
                }
            }
            _ => match parse_slice_header(reader, store, header.nal_unit_type, header.nal_ref_idc) {
                Ok(slice_header) => NalUnitPayload::SliceHeader(slice_header),
                Err(e) => NalUnitPayload::Error(e.to_string()),
            },
        },
        NalUnitType::Sei
        | NalUnitType::Aud
        | NalUnitType::EndOfSequence
        | NalUnitType::EndOfStream
        | NalUnitType::FillerData
        | NalUnitType::PrefixNal
        | NalUnitType::SliceExtensionDepth
        | NalUnitType::SliceDataA
        | NalUnitType::SliceDataB
        | NalUnitType::SliceDataC
        | NalUnitType::Reserved16
        | NalUnitType::Reserved17
        | NalUnitType::Reserved18
        | NalUnitType::Reserved22
        | NalUnitType::Reserved23
        | NalUnitType::Unspecified
        | NalUnitType::Unspecified24 => NalUnitPayload::Unparsed,
    }
}

fn peek_pps_chroma_format(reader: &BitReader, store: &ParamSetStore) -> Option<u8> {
    let mut peek = *reader;
    let _pic_parameter_set_id = peek.read_exp_golomb_unsigned().ok()?;
    let seq_parameter_set_id = peek.read_exp_golomb_unsigned().ok()? as u8;
    store.get_sps(seq_parameter_set_id).ok().map(|sps| sps.chroma_format_idc as u8)
}

fn parse_one_nal_unit(raw: &[u8], options: &ParsingOptions, offset: Option<usize>, store: &mut ParamSetStore) -> NalUnitState {
    let escaped = remove_emulation_prevention_bytes(raw);
    let mut reader = BitReader::new(&escaped);

    let header = match parse_nal_header(&mut reader) {
        Ok(h) => h,
        Err(e) => {
            warn!(error = %e, "failed to parse NAL unit header");
            return NalUnitState {
                offset: options.add_offset.then_some(offset.unwrap_or(0)),
                length: options.add_length.then_some(raw.len()),
                parsed_length: None,
                checksum: options.add_checksum.then(|| nalu_checksum(raw)),
                header: NalUnitHeaderSnapshot {
                    nal_ref_idc: 0,
                    nal_unit_type: NalUnitType::Unspecified,
                },
                payload: NalUnitPayload::Error(e.to_string()),
            };
        }
    };

    trace!(nal_type = ?header.nal_unit_type, "dispatching NAL unit payload");

    let payload = dispatch_payload(&header, &mut reader, store);
    let parsed_length = reader.get_offset().div_ceil(8);

    NalUnitState {
        offset: options.add_offset.then_some(offset.unwrap_or(0)),
        length: options.add_length.then_some(raw.len()),
        parsed_length: options.add_parsed_length.then_some(parsed_length),
        checksum: options.add_checksum.then(|| nalu_checksum(raw)),
        header: NalUnitHeaderSnapshot::from(&header),
        payload,
    }
}

/// Parse an Annex-B byte stream (start-code delimited).
pub fn parse_annex_b(data: &[u8], options: &ParsingOptions) -> Result<BitstreamState> {
    let indices = find_nalu_indices(data);
    debug!(count = indices.len(), "framed Annex-B NAL units");

    let mut store = ParamSetStore::new();
    let mut nal_units = Vec::with_capacity(indices.len());

    for index in indices {
        let raw = &data[index.payload_start_offset..index.payload_start_offset + index.payload_size];
        nal_units.push(parse_one_nal_unit(raw, options, Some(index.start_offset), &mut store));
    }

    Ok(BitstreamState { nal_units, param_sets: store })
}

/// Parse a length-prefixed (ISO-BMFF / AVCC) byte stream.
pub fn parse_length_prefixed(data: &[u8], length_size: usize, options: &ParsingOptions) -> Result<BitstreamState> {
    let indices = find_nalu_indices_length(data, length_size);
    debug!(count = indices.len(), "framed length-prefixed NAL units");

    let mut store = ParamSetStore::new();
    let mut nal_units = Vec::with_capacity(indices.len());

    for index in indices {
        let raw = &data[index.payload_start_offset..index.payload_start_offset + index.payload_size];
        nal_units.push(parse_one_nal_unit(raw, options, Some(index.start_offset), &mut store));
    }

    Ok(BitstreamState { nal_units, param_sets: store })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_annex_b_sps_pps() {
        let data: Vec<u8> = vec![
            0x00, 0x00, 0x00, 0x01, 0x67, 0x42, 0xc0, 0x16, 0xa6, 0x11, 0x05,
            0x07, 0xe9, 0xb2, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x64,
            0x1e, 0x2c, 0x5c,
        ];
        let options = ParsingOptions::default();
        let state = parse_annex_b(&data, &options).unwrap();
        assert_eq!(state.nal_units.len(), 1);
        assert_eq!(state.nal_units[0].header.nal_unit_type, NalUnitType::Sps);
        assert!(matches!(state.nal_units[0].payload, NalUnitPayload::Sps(_)));
        assert_eq!(state.param_sets.sps_count(), 1);
    }

    #[test]
    fn test_missing_pps_reference_reports_error() {
        // A VCL NAL unit referencing a PPS id that was never parsed.
        let data: Vec<u8> = vec![0x00, 0x00, 0x01, 0x65, 0x88, 0x84, 0x00];
        let options = ParsingOptions::default();
        let state = parse_annex_b(&data, &options).unwrap();
        assert_eq!(state.nal_units.len(), 1);
        assert!(matches!(state.nal_units[0].payload, NalUnitPayload::Error(_)));
    }

    #[test]
    fn test_checksum_recorded_per_nal() {
        let data: Vec<u8> = vec![0x00, 0x00, 0x01, 0x09, 0xf0];
        let options = ParsingOptions::default();
        let state = parse_annex_b(&data, &options).unwrap();
        assert!(state.nal_units[0].checksum.is_some());
        assert_eq!(state.nal_units[0].header.nal_unit_type, NalUnitType::Aud);
    }
}
