//! H.264/AVC bitstream inspection library.
//!
//! Parses NAL units, parameter sets, and slice headers out of Annex-B or
//! length-prefixed H.264/AVC streams for analysis and diagnostics. This is
//! a read-only inspector, not a decoder: no pixels are ever reconstructed.
//!
//! # Example
//!
//! ```ignore
//! use h264_bitstream::{parse_annex_b, ParsingOptions};
//!
//! let data: &[u8] = &[/* Annex-B H.264 bytes */];
//! let state = parse_annex_b(data, &ParsingOptions::default())?;
//!
//! for nal in &state.nal_units {
//!     println!("NAL type: {:?}", nal.header.nal_unit_type);
//! }
//! ```

pub mod bitreader;
pub mod bitstream;
pub mod checksum;
pub mod error;
pub mod nal;
pub mod options;
pub mod param_set_store;
pub mod pps;
pub mod rtp;
pub mod slice;
pub mod sps;

pub use bitreader::{remove_emulation_prevention_bytes, BitReader};
pub use bitstream::{parse_annex_b, parse_length_prefixed, BitstreamState, NalUnitPayload, NalUnitState};
pub use checksum::nalu_checksum;
pub use error::{AvcError, ParamSetKind, Result};
pub use nal::{find_nalu_indices, find_nalu_indices_length, parse_nal_header, NalUnitHeader, NalUnitType, NaluIndex};
pub use options::ParsingOptions;
pub use param_set_store::ParamSetStore;
pub use pps::Pps;
pub use rtp::{parse_rtp_single_nal_unit, RtpSingleNalUnit};
pub use slice::{SliceHeader, SliceHeaderScalableExtension, SliceType};
pub use sps::{ChromaFormat, ProfileIdc, ProfileType, Sps, SubsetSps};

/// Picture Order Count derivation (section 8.2.1), kept as a small
/// orchestration helper on top of the otherwise stateless parsers: POC
/// depends on the previous slice's decoded values, which this crate's
/// per-NAL-unit parsers don't track on their own.
pub mod poc {
    use crate::slice::SliceHeader;
    use crate::sps::Sps;

    /// Running state threaded across calls to [`derive`], one instance per
    /// independently-decoded view/layer.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct PocState {
        prev_poc_msb: i32,
        prev_poc_lsb: i32,
        prev_frame_num: u32,
        prev_frame_num_offset: i32,
    }

    /// Derive the Picture Order Count for one slice, updating `state` in
    /// place. Supports `pic_order_cnt_type` 0, 1, and 2 (section 8.2.1.1-3);
    /// any other value yields 0.
    pub fn derive(sps: &Sps, header: &SliceHeader, is_idr: bool, state: &mut PocState) -> i32 {
        match sps.pic_order_cnt_type {
            0 => {
                if is_idr {
                    state.prev_poc_msb = 0;
                    state.prev_poc_lsb = 0;
                    return 0;
                }

                let max_poc_lsb = 1i32 << (sps.log2_max_pic_order_cnt_lsb_minus4 + 4);
                let poc_lsb = header.pic_order_cnt_lsb as i32;

                let poc_msb = if poc_lsb < state.prev_poc_lsb
                    && (state.prev_poc_lsb - poc_lsb) >= (max_poc_lsb / 2)
                {
                    state.prev_poc_msb + max_poc_lsb
                } else if poc_lsb > state.prev_poc_lsb
                    && (poc_lsb - state.prev_poc_lsb) > (max_poc_lsb / 2)
                {
                    state.prev_poc_msb - max_poc_lsb
                } else {
                    state.prev_poc_msb
                };

                state.prev_poc_msb = poc_msb;
                state.prev_poc_lsb = poc_lsb;

                poc_msb + poc_lsb
            }
            1 => {
                let max_frame_num = 1u32 << (sps.log2_max_frame_num_minus4 + 4);

                let frame_num_offset = if is_idr {
                    0
                } else if state.prev_frame_num > header.frame_num {
                    state.prev_frame_num_offset + max_frame_num as i32
                } else {
                    state.prev_frame_num_offset
                };

                state.prev_frame_num = header.frame_num;
                state.prev_frame_num_offset = frame_num_offset;

                (frame_num_offset + header.frame_num as i32) * 2 + header.delta_pic_order_cnt[0]
            }
            2 => {
                let max_frame_num = 1u32 << (sps.log2_max_frame_num_minus4 + 4);

                let frame_num_offset = if is_idr {
                    0
                } else if state.prev_frame_num > header.frame_num {
                    state.prev_frame_num_offset + max_frame_num as i32
                } else {
                    state.prev_frame_num_offset
                };

                state.prev_frame_num = header.frame_num;
                state.prev_frame_num_offset = frame_num_offset;

                if is_idr {
                    0
                } else {
                    (frame_num_offset + header.frame_num as i32) * 2
                }
            }
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_stream() {
        let state = parse_annex_b(&[], &ParsingOptions::default()).unwrap();
        assert_eq!(state.nal_units.len(), 0);
    }

    #[test]
    fn test_poc_type_0_idr_resets_to_zero() {
        let data = [
            0x42, 0xc0, 0x16, 0xa6, 0x11, 0x05, 0x07, 0xe9, 0xb2, 0x00, 0x00,
            0x00, 0x02, 0x00, 0x00, 0x00, 0x64, 0x1e, 0x2c, 0x5c,
        ];
        let mut reader = BitReader::new(&data);
        let sps = sps::parse_sps(&mut reader).unwrap();

        let header_json = r#"{
            "first_mb_in_slice":0,"slice_type_raw":2,"slice_type":"I","pic_parameter_set_id":0,
            "colour_plane_id":0,"frame_num":0,"field_pic_flag":false,"bottom_field_flag":false,
            "idr_pic_id":0,"pic_order_cnt_lsb":0,"delta_pic_order_cnt_bottom":0,
            "delta_pic_order_cnt":[0,0],"redundant_pic_cnt":0,"direct_spatial_mv_pred_flag":false,
            "num_ref_idx_active_override_flag":false,"num_ref_idx_l0_active_minus1":0,
            "num_ref_idx_l1_active_minus1":0,"ref_pic_list_modification_flag_l0":false,
            "ref_pic_list_modification_flag_l1":false,
            "ref_pic_list_modification_l0":{"modifications":[]},
            "ref_pic_list_modification_l1":{"modifications":[]},
            "pred_weight_table":null,
            "dec_ref_pic_marking":{"no_output_of_prior_pics_flag":false,"long_term_reference_flag":false,"adaptive_ref_pic_marking_mode_flag":false,"mmco_operations":[]},
            "cabac_init_idc":0,"slice_qp_delta":0,"sp_for_switch_flag":false,"slice_qs_delta":0,
            "disable_deblocking_filter_idc":0,"slice_alpha_c0_offset_div2":0,
            "slice_beta_offset_div2":0,"slice_group_change_cycle":0
        }"#;
        let header: SliceHeader = serde_json::from_str(header_json).unwrap();

        let mut state = poc::PocState::default();
        let result = poc::derive(&sps, &header, true, &mut state);
        assert_eq!(result, 0);
    }
}
