//! H.264/AVC Picture Parameter Set (PPS) parsing.

use crate::bitreader::BitReader;
use crate::error::{AvcError, Result};
use crate::sps::{parse_scaling_list, ScalingList};
use serde::{Deserialize, Serialize};

/// `slice_group_map_type`-specific fields (section 7.3.2.2.2), stored
/// verbatim rather than discarded so downstream inspection can reconstruct
/// the map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SliceGroupMap {
    Interleaved { run_length_minus1: Vec<u32> },
    Dispersed,
    ForegroundWithLeftOver {
        top_left: Vec<u32>,
        bottom_right: Vec<u32>,
    },
    Changing {
        change_direction_flag: bool,
        change_rate_minus1: u32,
    },
    Explicit { slice_group_id: Vec<u32> },
}

fn ceil_log2(value: u32) -> u32 {
    if value <= 1 {
        return 0;
    }
    32 - (value - 1).leading_zeros()
}

/// Picture Parameter Set (section 7.3.2.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pps {
    pub pic_parameter_set_id: u8,
    pub seq_parameter_set_id: u8,
    pub entropy_coding_mode_flag: bool,
    pub bottom_field_pic_order_in_frame_present_flag: bool,
    pub num_slice_groups_minus1: u32,
    pub slice_group_map_type: Option<u32>,
    pub slice_group_map: Option<SliceGroupMap>,
    pub num_ref_idx_l0_default_active_minus1: u32,
    pub num_ref_idx_l1_default_active_minus1: u32,
    pub weighted_pred_flag: bool,
    pub weighted_bipred_idc: u8,
    pub pic_init_qp_minus26: i32,
    pub pic_init_qs_minus26: i32,
    pub chroma_qp_index_offset: i32,
    pub deblocking_filter_control_present_flag: bool,
    pub constrained_intra_pred_flag: bool,
    pub redundant_pic_cnt_present_flag: bool,
    pub transform_8x8_mode_flag: bool,
    pub pic_scaling_matrix_present_flag: bool,
    pub scaling_lists_4x4: Vec<Option<ScalingList>>,
    pub scaling_lists_8x8: Vec<Option<ScalingList>>,
    pub second_chroma_qp_index_offset: i32,
}

impl Pps {
    pub fn is_cabac(&self) -> bool {
        self.entropy_coding_mode_flag
    }

    pub fn initial_qp(&self) -> i32 {
        26 + self.pic_init_qp_minus26
    }
}

fn range_check(field: &'static str, value: u32, max: u32) -> Result<u32> {
    if value > max {
        Err(AvcError::OutOfRange {
            field,
            value: value as i64,
            min: 0,
            max: max as i64,
        })
    } else {
        Ok(value)
    }
}

/// Parse a PPS. `chroma_format_idc` must come from the SPS the PPS refers
/// to (via `seq_parameter_set_id`); it governs the 8x8 scaling list count.
pub fn parse_pps(reader: &mut BitReader, chroma_format_idc: u8) -> Result<Pps> {
    let pic_parameter_set_id = range_check("pic_parameter_set_id", reader.read_exp_golomb_unsigned()?, 255)? as u8;
    let seq_parameter_set_id = range_check("seq_parameter_set_id", reader.read_exp_golomb_unsigned()?, 31)? as u8;
    let entropy_coding_mode_flag = reader.read_flag()?;
    let bottom_field_pic_order_in_frame_present_flag = reader.read_flag()?;
    let num_slice_groups_minus1 = range_check("num_slice_groups_minus1", reader.read_exp_golomb_unsigned()?, 7)?;

    let mut slice_group_map_type = None;
    let mut slice_group_map = None;

    if num_slice_groups_minus1 > 0 {
        let map_type = range_check("slice_group_map_type", reader.read_exp_golomb_unsigned()?, 6)?;
        slice_group_map_type = Some(map_type);

        slice_group_map = Some(match map_type {
            0 => {
                let mut run_length_minus1 = Vec::new();
                for _ in 0..=num_slice_groups_minus1 {
                    run_length_minus1.push(reader.read_exp_golomb_unsigned()?);
                }
                SliceGroupMap::Interleaved { run_length_minus1 }
            }
            2 => {
                let mut top_left = Vec::new();
                let mut bottom_right = Vec::new();
                for _ in 0..num_slice_groups_minus1 {
                    top_left.push(reader.read_exp_golomb_unsigned()?);
                    bottom_right.push(reader.read_exp_golomb_unsigned()?);
                }
                SliceGroupMap::ForegroundWithLeftOver { top_left, bottom_right }
            }
            3 | 4 | 5 => {
                let change_direction_flag = reader.read_flag()?;
                let change_rate_minus1 = reader.read_exp_golomb_unsigned()?;
                SliceGroupMap::Changing {
                    change_direction_flag,
                    change_rate_minus1,
                }
            }
            6 => {
                let pic_size_in_map_units_minus1 = reader.read_exp_golomb_unsigned()?;
                let bits = ceil_log2(num_slice_groups_minus1 + 1).max(1) as u8;
                let mut slice_group_id = Vec::new();
                for _ in 0..=pic_size_in_map_units_minus1 {
                    slice_group_id.push(reader.read_bits(bits)?);
                }
                SliceGroupMap::Explicit { slice_group_id }
            }
            _ => SliceGroupMap::Dispersed,
        });
    }

    let num_ref_idx_l0_default_active_minus1 =
        range_check("num_ref_idx_l0_default_active_minus1", reader.read_exp_golomb_unsigned()?, 31)?;
    let num_ref_idx_l1_default_active_minus1 =
        range_check("num_ref_idx_l1_default_active_minus1", reader.read_exp_golomb_unsigned()?, 31)?;
    let weighted_pred_flag = reader.read_flag()?;
    let weighted_bipred_idc = reader.read_bits(2)? as u8;
    let pic_init_qp_minus26 = reader.read_exp_golomb_signed()?;
    let pic_init_qs_minus26 = reader.read_exp_golomb_signed()?;
    let chroma_qp_index_offset = reader.read_exp_golomb_signed()?;
    let deblocking_filter_control_present_flag = reader.read_flag()?;
    let constrained_intra_pred_flag = reader.read_flag()?;
    let redundant_pic_cnt_present_flag = reader.read_flag()?;

    let mut transform_8x8_mode_flag = false;
    let mut pic_scaling_matrix_present_flag = false;
    let mut scaling_lists_4x4: Vec<Option<ScalingList>> = Vec::new();
    let mut scaling_lists_8x8: Vec<Option<ScalingList>> = Vec::new();
    let mut second_chroma_qp_index_offset = chroma_qp_index_offset;

    if reader.more_rbsp_data() {
        transform_8x8_mode_flag = reader.read_flag()?;
        pic_scaling_matrix_present_flag = reader.read_flag()?;

        if pic_scaling_matrix_present_flag {
            let num_8x8 = if transform_8x8_mode_flag {
                if chroma_format_idc == 3 { 6 } else { 2 }
            } else {
                0
            };

            for _ in 0..6 {
                if reader.read_flag()? {
                    scaling_lists_4x4.push(Some(parse_scaling_list(reader, 16)?));
                } else {
                    scaling_lists_4x4.push(None);
                }
            }
            for _ in 0..num_8x8 {
                if reader.read_flag()? {
                    scaling_lists_8x8.push(Some(parse_scaling_list(reader, 64)?));
                } else {
                    scaling_lists_8x8.push(None);
                }
            }
        }

        second_chroma_qp_index_offset = reader.read_exp_golomb_signed()?;
    }

    let _ = reader.rbsp_trailing_bits();

    Ok(Pps {
        pic_parameter_set_id,
        seq_parameter_set_id,
        entropy_coding_mode_flag,
        bottom_field_pic_order_in_frame_present_flag,
        num_slice_groups_minus1,
        slice_group_map_type,
        slice_group_map,
        num_ref_idx_l0_default_active_minus1,
        num_ref_idx_l1_default_active_minus1,
        weighted_pred_flag,
        weighted_bipred_idc,
        pic_init_qp_minus26,
        pic_init_qs_minus26,
        chroma_qp_index_offset,
        deblocking_filter_control_present_flag,
        constrained_intra_pred_flag,
        redundant_pic_cnt_present_flag,
        transform_8x8_mode_flag,
        pic_scaling_matrix_present_flag,
        scaling_lists_4x4,
        scaling_lists_8x8,
        second_chroma_qp_index_offset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pps_initial_qp() {
        // pic_parameter_set_id=ue(0)='1', seq_parameter_set_id=ue(0)='1',
        // entropy_coding_mode=1, bottom_field_present=0, num_slice_groups_minus1=ue(0)='1',
        // ref idx l0/l1 defaults ue(0)/ue(0), weighted_pred=0, weighted_bipred_idc=00,
        // pic_init_qp_minus26=se(0)='1', pic_init_qs_minus26=se(0)='1', chroma_qp_index_offset=se(0)='1',
        // deblocking_filter_control_present=1, constrained_intra_pred=0, redundant_pic_cnt_present=0
        let data = [0b1_1_1_0_1_1_1_0, 0b0_1_1_1_1_0_0_0];
        let mut reader = BitReader::new(&data);
        let pps = parse_pps(&mut reader, 1).unwrap();
        assert_eq!(pps.pic_parameter_set_id, 0);
        assert_eq!(pps.seq_parameter_set_id, 0);
        assert!(pps.is_cabac());
        assert_eq!(pps.initial_qp(), 26);
    }

    #[test]
    fn test_8x8_scaling_list_count_rule() {
        let count = |chroma_format_idc: u8| if chroma_format_idc == 3 { 6 } else { 2 };
        assert_eq!(count(3), 6);
        assert_eq!(count(1), 2);
    }
}
