//! H.264/AVC Slice header parsing.

use crate::bitreader::BitReader;
use crate::error::Result;
use crate::nal::{NalUnitType, SvcExtension};
use crate::param_set_store::ParamSetStore;
use crate::pps::Pps;
use crate::sps::Sps;
use serde::{Deserialize, Serialize};

/// Raw `slice_type` value (0-9, section 7.4.3 Table 7-6): values 5-9 are the
/// same semantic types as 0-4 but signal that every slice in the picture
/// shares that type. Stored alongside the folded type so callers can tell
/// the two apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SliceType {
    P = 0,
    B = 1,
    I = 2,
    Sp = 3,
    Si = 4,
}

impl SliceType {
    pub fn from_u32(value: u32) -> Self {
        match value % 5 {
            0 => SliceType::P,
            1 => SliceType::B,
            2 => SliceType::I,
            3 => SliceType::Sp,
            4 => SliceType::Si,
            _ => unreachable!(),
        }
    }

    pub fn is_intra(&self) -> bool {
        matches!(self, SliceType::I | SliceType::Si)
    }

    pub fn is_b(&self) -> bool {
        matches!(self, SliceType::B)
    }

    pub fn is_p(&self) -> bool {
        matches!(self, SliceType::P | SliceType::Sp)
    }

    pub fn name(&self) -> &'static str {
        match self {
            SliceType::P => "P",
            SliceType::B => "B",
            SliceType::I => "I",
            SliceType::Sp => "SP",
            SliceType::Si => "SI",
        }
    }
}

/// Reference picture list modification (section 7.3.3.1).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefPicListModification {
    /// `(modification_of_pic_nums_idc, value)` pairs, terminated implicitly
    /// by idc == 3 in the bitstream (not stored as an entry).
    pub modifications: Vec<(u32, u32)>,
}

/// Decoded reference picture marking (section 7.3.3.3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecRefPicMarking {
    pub no_output_of_prior_pics_flag: bool,
    pub long_term_reference_flag: bool,
    pub adaptive_ref_pic_marking_mode_flag: bool,
    /// `(memory_management_control_operation, difference_of_pic_nums_minus1_or_long_term_pic_num, long_term_frame_idx)`
    pub mmco_operations: Vec<(u32, u32, u32)>,
}

/// One entry of the prediction weight table (section 7.3.3.2), per
/// reference index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeightEntry {
    pub luma_weight: i32,
    pub luma_offset: i32,
    pub chroma_weight: [i32; 2],
    pub chroma_offset: [i32; 2],
}

/// Prediction weight table (section 7.3.3.2), stored rather than discarded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredWeightTable {
    pub luma_log2_weight_denom: u32,
    pub chroma_log2_weight_denom: u32,
    pub weights_l0: Vec<WeightEntry>,
    pub weights_l1: Vec<WeightEntry>,
}

/// Slice header (section 7.3.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SliceHeader {
    pub first_mb_in_slice: u32,
    pub slice_type_raw: u32,
    pub slice_type: SliceType,
    pub pic_parameter_set_id: u8,
    pub colour_plane_id: u8,
    pub frame_num: u32,
    pub field_pic_flag: bool,
    pub bottom_field_flag: bool,
    pub idr_pic_id: u32,
    pub pic_order_cnt_lsb: u32,
    pub delta_pic_order_cnt_bottom: i32,
    pub delta_pic_order_cnt: [i32; 2],
    pub redundant_pic_cnt: u32,
    pub direct_spatial_mv_pred_flag: bool,
    pub num_ref_idx_active_override_flag: bool,
    pub num_ref_idx_l0_active_minus1: u32,
    pub num_ref_idx_l1_active_minus1: u32,
    pub ref_pic_list_modification_flag_l0: bool,
    pub ref_pic_list_modification_flag_l1: bool,
    pub ref_pic_list_modification_l0: RefPicListModification,
    pub ref_pic_list_modification_l1: RefPicListModification,
    pub pred_weight_table: Option<PredWeightTable>,
    pub dec_ref_pic_marking: DecRefPicMarking,
    pub cabac_init_idc: u32,
    pub slice_qp_delta: i32,
    pub sp_for_switch_flag: bool,
    pub slice_qs_delta: i32,
    pub disable_deblocking_filter_idc: u32,
    pub slice_alpha_c0_offset_div2: i32,
    pub slice_beta_offset_div2: i32,
    pub slice_group_change_cycle: u32,
}

impl SliceHeader {
    pub fn qp(&self, pps: &Pps) -> i32 {
        26 + pps.pic_init_qp_minus26 + self.slice_qp_delta
    }

    pub fn is_first_slice(&self) -> bool {
        self.first_mb_in_slice == 0
    }
}

fn ceil_log2(value: u32) -> u32 {
    if value <= 1 {
        return 0;
    }
    32 - (value - 1).leading_zeros()
}

/// Parse a slice header. `store` resolves the PPS/SPS the header refers to
/// via `pic_parameter_set_id` / `seq_parameter_set_id`.
pub fn parse_slice_header(
    reader: &mut BitReader,
    store: &ParamSetStore,
    nal_type: NalUnitType,
    nal_ref_idc: u8,
) -> Result<SliceHeader> {
    let first_mb_in_slice = reader.read_exp_golomb_unsigned()?;
    let slice_type_raw = reader.read_exp_golomb_unsigned()?;
    let slice_type = SliceType::from_u32(slice_type_raw);
    let pic_parameter_set_id = reader.read_exp_golomb_unsigned()? as u8;

    let (pps, sps) = store.sps_for_pps(pic_parameter_set_id)?;

    let mut colour_plane_id = 0;
    if sps.separate_colour_plane_flag {
        colour_plane_id = reader.read_bits(2)? as u8;
    }

    let frame_num_bits = sps.log2_max_frame_num_minus4 + 4;
    let frame_num = reader.read_bits(frame_num_bits)?;

    let mut field_pic_flag = false;
    let mut bottom_field_flag = false;

    if !sps.frame_mbs_only_flag {
        field_pic_flag = reader.read_flag()?;
        if field_pic_flag {
            bottom_field_flag = reader.read_flag()?;
        }
    }

    let mut idr_pic_id = 0;
    if nal_type == NalUnitType::IdrSlice {
        idr_pic_id = reader.read_exp_golomb_unsigned()?;
    }

    let mut pic_order_cnt_lsb = 0;
    let mut delta_pic_order_cnt_bottom = 0;
    let mut delta_pic_order_cnt = [0i32; 2];

    match sps.pic_order_cnt_type {
        0 => {
            let poc_lsb_bits = sps.log2_max_pic_order_cnt_lsb_minus4 + 4;
            pic_order_cnt_lsb = reader.read_bits(poc_lsb_bits)?;

            if pps.bottom_field_pic_order_in_frame_present_flag && !field_pic_flag {
                delta_pic_order_cnt_bottom = reader.read_exp_golomb_signed()?;
            }
        }
        1 if !sps.delta_pic_order_always_zero_flag => {
            delta_pic_order_cnt[0] = reader.read_exp_golomb_signed()?;

            if pps.bottom_field_pic_order_in_frame_present_flag && !field_pic_flag {
                delta_pic_order_cnt[1] = reader.read_exp_golomb_signed()?;
            }
        }
        _ => {}
    }

    let mut redundant_pic_cnt = 0;
    if pps.redundant_pic_cnt_present_flag {
        redundant_pic_cnt = reader.read_exp_golomb_unsigned()?;
    }

    let mut direct_spatial_mv_pred_flag = false;
    if slice_type.is_b() {
        direct_spatial_mv_pred_flag = reader.read_flag()?;
    }

    let mut num_ref_idx_active_override_flag = false;
    let mut num_ref_idx_l0_active_minus1 = pps.num_ref_idx_l0_default_active_minus1;
    let mut num_ref_idx_l1_active_minus1 = pps.num_ref_idx_l1_default_active_minus1;

    if slice_type.is_p() || slice_type.is_b() {
        num_ref_idx_active_override_flag = reader.read_flag()?;
        if num_ref_idx_active_override_flag {
            num_ref_idx_l0_active_minus1 = reader.read_exp_golomb_unsigned()?;
            if slice_type.is_b() {
                num_ref_idx_l1_active_minus1 = reader.read_exp_golomb_unsigned()?;
            }
        }
    }

    let mut ref_pic_list_modification_flag_l0 = false;
    let mut ref_pic_list_modification_flag_l1 = false;
    let mut ref_pic_list_modification_l0 = RefPicListModification::default();
    let mut ref_pic_list_modification_l1 = RefPicListModification::default();

    if !slice_type.is_intra() {
        ref_pic_list_modification_flag_l0 = reader.read_flag()?;
        if ref_pic_list_modification_flag_l0 {
            ref_pic_list_modification_l0 = parse_ref_pic_list_modification(reader)?;
        }
    }

    if slice_type.is_b() {
        ref_pic_list_modification_flag_l1 = reader.read_flag()?;
        if ref_pic_list_modification_flag_l1 {
            ref_pic_list_modification_l1 = parse_ref_pic_list_modification(reader)?;
        }
    }

    let mut pred_weight_table = None;
    if (pps.weighted_pred_flag && (slice_type.is_p() || matches!(slice_type, SliceType::Sp)))
        || (pps.weighted_bipred_idc == 1 && slice_type.is_b())
    {
        pred_weight_table = Some(parse_pred_weight_table(
            reader,
            slice_type,
            num_ref_idx_l0_active_minus1,
            num_ref_idx_l1_active_minus1,
            &sps,
        )?);
    }

    let mut dec_ref_pic_marking = DecRefPicMarking::default();
    if nal_ref_idc != 0 {
        dec_ref_pic_marking = parse_dec_ref_pic_marking(reader, nal_type)?;
    }

    let mut cabac_init_idc = 0;
    if pps.entropy_coding_mode_flag && !slice_type.is_intra() {
        cabac_init_idc = reader.read_exp_golomb_unsigned()?;
    }

    let slice_qp_delta = reader.read_exp_golomb_signed()?;

    let mut sp_for_switch_flag = false;
    let mut slice_qs_delta = 0;
    if matches!(slice_type, SliceType::Sp | SliceType::Si) {
        if matches!(slice_type, SliceType::Sp) {
            sp_for_switch_flag = reader.read_flag()?;
        }
        slice_qs_delta = reader.read_exp_golomb_signed()?;
    }

    let mut disable_deblocking_filter_idc = 0;
    let mut slice_alpha_c0_offset_div2 = 0;
    let mut slice_beta_offset_div2 = 0;

    if pps.deblocking_filter_control_present_flag {
        disable_deblocking_filter_idc = reader.read_exp_golomb_unsigned()?;
        if disable_deblocking_filter_idc != 1 {
            slice_alpha_c0_offset_div2 = reader.read_exp_golomb_signed()?;
            slice_beta_offset_div2 = reader.read_exp_golomb_signed()?;
        }
    }

    let mut slice_group_change_cycle = 0;
    if let Some(map_type) = pps.slice_group_map_type {
        if pps.num_slice_groups_minus1 > 0 && (3..=5).contains(&map_type) {
            let pic_size_in_map_units =
                (sps.pic_width_in_mbs_minus1 + 1) * (sps.pic_height_in_map_units_minus1 + 1);
            let change_rate = match &pps.slice_group_map {
                Some(crate::pps::SliceGroupMap::Changing { change_rate_minus1, .. }) => {
                    change_rate_minus1 + 1
                }
                _ => 1,
            };
            let max_value = pic_size_in_map_units.div_ceil(change_rate) + 1;
            let bits = ceil_log2(max_value).max(1) as u8;
            slice_group_change_cycle = reader.read_bits(bits)?;
        }
    }

    Ok(SliceHeader {
        first_mb_in_slice,
        slice_type_raw,
        slice_type,
        pic_parameter_set_id,
        colour_plane_id,
        frame_num,
        field_pic_flag,
        bottom_field_flag,
        idr_pic_id,
        pic_order_cnt_lsb,
        delta_pic_order_cnt_bottom,
        delta_pic_order_cnt,
        redundant_pic_cnt,
        direct_spatial_mv_pred_flag,
        num_ref_idx_active_override_flag,
        num_ref_idx_l0_active_minus1,
        num_ref_idx_l1_active_minus1,
        ref_pic_list_modification_flag_l0,
        ref_pic_list_modification_flag_l1,
        ref_pic_list_modification_l0,
        ref_pic_list_modification_l1,
        pred_weight_table,
        dec_ref_pic_marking,
        cabac_init_idc,
        slice_qp_delta,
        sp_for_switch_flag,
        slice_qs_delta,
        disable_deblocking_filter_idc,
        slice_alpha_c0_offset_div2,
        slice_beta_offset_div2,
        slice_group_change_cycle,
    })
}

fn parse_ref_pic_list_modification(reader: &mut BitReader) -> Result<RefPicListModification> {
    let mut modifications = Vec::new();

    loop {
        let modification_of_pic_nums_idc = reader.read_exp_golomb_unsigned()?;
        if modification_of_pic_nums_idc == 3 {
            break;
        }

        let value = reader.read_exp_golomb_unsigned()?;
        modifications.push((modification_of_pic_nums_idc, value));

        if modifications.len() > 256 {
            break;
        }
    }

    Ok(RefPicListModification { modifications })
}

/// The `memory_management_control_operation` loop shared by
/// `dec_ref_pic_marking()` and `dec_ref_pic_marking_base()` (Annex G.7.3.3.5).
fn parse_mmco_loop(reader: &mut BitReader) -> Result<Vec<(u32, u32, u32)>> {
    let mut ops = Vec::new();

    loop {
        let memory_management_control_operation = reader.read_exp_golomb_unsigned()?;
        if memory_management_control_operation == 0 {
            break;
        }

        let mut diff_of_pic_nums = 0;
        let mut long_term_idx = 0;

        match memory_management_control_operation {
            1 | 3 => diff_of_pic_nums = reader.read_exp_golomb_unsigned()?,
            2 => long_term_idx = reader.read_exp_golomb_unsigned()?,
            4 => {
                let _max_long_term_frame_idx_plus1 = reader.read_exp_golomb_unsigned()?;
            }
            6 => long_term_idx = reader.read_exp_golomb_unsigned()?,
            _ => {}
        }

        if memory_management_control_operation == 3 {
            long_term_idx = reader.read_exp_golomb_unsigned()?;
        }

        ops.push((memory_management_control_operation, diff_of_pic_nums, long_term_idx));

        if ops.len() > 256 {
            break;
        }
    }

    Ok(ops)
}

fn parse_dec_ref_pic_marking_with_idr(reader: &mut BitReader, is_idr: bool) -> Result<DecRefPicMarking> {
    let mut marking = DecRefPicMarking::default();

    if is_idr {
        marking.no_output_of_prior_pics_flag = reader.read_flag()?;
        marking.long_term_reference_flag = reader.read_flag()?;
    } else {
        marking.adaptive_ref_pic_marking_mode_flag = reader.read_flag()?;
        if marking.adaptive_ref_pic_marking_mode_flag {
            marking.mmco_operations = parse_mmco_loop(reader)?;
        }
    }

    Ok(marking)
}

fn parse_dec_ref_pic_marking(reader: &mut BitReader, nal_type: NalUnitType) -> Result<DecRefPicMarking> {
    parse_dec_ref_pic_marking_with_idr(reader, nal_type == NalUnitType::IdrSlice)
}

fn parse_pred_weight_table(
    reader: &mut BitReader,
    slice_type: SliceType,
    num_ref_idx_l0_active_minus1: u32,
    num_ref_idx_l1_active_minus1: u32,
    sps: &Sps,
) -> Result<PredWeightTable> {
    let luma_log2_weight_denom = reader.read_exp_golomb_unsigned()?;

    let mut chroma_log2_weight_denom = 0;
    let has_chroma = sps.chroma_array_type() != 0;
    if has_chroma {
        chroma_log2_weight_denom = reader.read_exp_golomb_unsigned()?;
    }

    let parse_entries = |reader: &mut BitReader, count: u32| -> Result<Vec<WeightEntry>> {
        let mut entries = Vec::new();
        for _ in 0..=count {
            let mut entry = WeightEntry::default();

            if reader.read_flag()? {
                entry.luma_weight = reader.read_exp_golomb_signed()?;
                entry.luma_offset = reader.read_exp_golomb_signed()?;
            } else {
                entry.luma_weight = 1 << luma_log2_weight_denom;
            }

            if has_chroma {
                if reader.read_flag()? {
                    for c in 0..2 {
                        entry.chroma_weight[c] = reader.read_exp_golomb_signed()?;
                        entry.chroma_offset[c] = reader.read_exp_golomb_signed()?;
                    }
                } else {
                    entry.chroma_weight = [1 << chroma_log2_weight_denom; 2];
                }
            }

            entries.push(entry);
        }
        Ok(entries)
    };

    let weights_l0 = parse_entries(reader, num_ref_idx_l0_active_minus1)?;
    let weights_l1 = if slice_type.is_b() {
        parse_entries(reader, num_ref_idx_l1_active_minus1)?
    } else {
        Vec::new()
    };

    Ok(PredWeightTable {
        luma_log2_weight_denom,
        chroma_log2_weight_denom,
        weights_l0,
        weights_l1,
    })
}

/// Slice header parsed via `slice_header_in_scalable_extension()` (Annex
/// G.7.3.3.4), used for NAL unit type 20 when `svc_extension_flag` is set.
/// Scoped to the fields useful for inspection: the spatial-scalability
/// resampling, residual prediction, and macroblock-skip-run fields that only
/// matter for actually decoding an enhancement layer are not retained here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SliceHeaderScalableExtension {
    pub first_mb_in_slice: u32,
    pub slice_type_raw: u32,
    pub slice_type: SliceType,
    pub pic_parameter_set_id: u8,
    pub colour_plane_id: u8,
    pub frame_num: u32,
    pub field_pic_flag: bool,
    pub bottom_field_flag: bool,
    pub idr_pic_id: u32,
    pub pic_order_cnt_lsb: u32,
    pub delta_pic_order_cnt_bottom: i32,
    pub delta_pic_order_cnt: [i32; 2],
    pub redundant_pic_cnt: u32,
    pub direct_spatial_mv_pred_flag: bool,
    pub num_ref_idx_active_override_flag: bool,
    pub num_ref_idx_l0_active_minus1: u32,
    pub num_ref_idx_l1_active_minus1: u32,
    pub ref_pic_list_modification_flag_l0: bool,
    pub ref_pic_list_modification_flag_l1: bool,
    pub ref_pic_list_modification_l0: RefPicListModification,
    pub ref_pic_list_modification_l1: RefPicListModification,
    pub base_pred_weight_table_flag: bool,
    pub pred_weight_table: Option<PredWeightTable>,
    pub dec_ref_pic_marking: DecRefPicMarking,
    pub store_ref_base_pic_flag: bool,
    pub cabac_init_idc: u32,
    pub slice_qp_delta: i32,
    pub sp_for_switch_flag: bool,
    pub slice_qs_delta: i32,
    pub disable_deblocking_filter_idc: u32,
    pub slice_alpha_c0_offset_div2: i32,
    pub slice_beta_offset_div2: i32,
    pub slice_group_change_cycle: u32,
    pub ref_layer_dq_id: Option<u32>,
}

/// Parse `slice_header_in_scalable_extension()` (Annex G.7.3.3.4) for a
/// type-20 NAL unit whose header carries `svc_extension_flag == 1`. Shares
/// most of its syntax with `parse_slice_header`, but several conditions are
/// gated on the SVC extension header's flags rather than `nal_unit_type`.
pub fn parse_slice_header_in_scalable_extension(
    reader: &mut BitReader,
    store: &ParamSetStore,
    svc: &SvcExtension,
    nal_ref_idc: u8,
) -> Result<SliceHeaderScalableExtension> {
    let first_mb_in_slice = reader.read_exp_golomb_unsigned()?;
    let slice_type_raw = reader.read_exp_golomb_unsigned()?;
    let slice_type = SliceType::from_u32(slice_type_raw);
    let pic_parameter_set_id = reader.read_exp_golomb_unsigned()? as u8;

    let (pps, sps) = store.sps_for_pps(pic_parameter_set_id)?;

    let mut colour_plane_id = 0;
    if sps.separate_colour_plane_flag {
        colour_plane_id = reader.read_bits(2)? as u8;
    }

    let frame_num_bits = sps.log2_max_frame_num_minus4 + 4;
    let frame_num = reader.read_bits(frame_num_bits)?;

    let mut field_pic_flag = false;
    let mut bottom_field_flag = false;

    if !sps.frame_mbs_only_flag {
        field_pic_flag = reader.read_flag()?;
        if field_pic_flag {
            bottom_field_flag = reader.read_flag()?;
        }
    }

    let mut idr_pic_id = 0;
    if svc.idr_flag {
        idr_pic_id = reader.read_exp_golomb_unsigned()?;
    }

    let mut pic_order_cnt_lsb = 0;
    let mut delta_pic_order_cnt_bottom = 0;
    let mut delta_pic_order_cnt = [0i32; 2];

    match sps.pic_order_cnt_type {
        0 => {
            let poc_lsb_bits = sps.log2_max_pic_order_cnt_lsb_minus4 + 4;
            pic_order_cnt_lsb = reader.read_bits(poc_lsb_bits)?;

            if pps.bottom_field_pic_order_in_frame_present_flag && !field_pic_flag {
                delta_pic_order_cnt_bottom = reader.read_exp_golomb_signed()?;
            }
        }
        1 if !sps.delta_pic_order_always_zero_flag => {
            delta_pic_order_cnt[0] = reader.read_exp_golomb_signed()?;

            if pps.bottom_field_pic_order_in_frame_present_flag && !field_pic_flag {
                delta_pic_order_cnt[1] = reader.read_exp_golomb_signed()?;
            }
        }
        _ => {}
    }

    let mut redundant_pic_cnt = 0;
    if pps.redundant_pic_cnt_present_flag {
        redundant_pic_cnt = reader.read_exp_golomb_unsigned()?;
    }

    let mut direct_spatial_mv_pred_flag = false;
    if slice_type.is_b() {
        direct_spatial_mv_pred_flag = reader.read_flag()?;
    }

    let mut num_ref_idx_active_override_flag = false;
    let mut num_ref_idx_l0_active_minus1 = pps.num_ref_idx_l0_default_active_minus1;
    let mut num_ref_idx_l1_active_minus1 = pps.num_ref_idx_l1_default_active_minus1;

    if slice_type.is_p() || slice_type.is_b() {
        num_ref_idx_active_override_flag = reader.read_flag()?;
        if num_ref_idx_active_override_flag {
            num_ref_idx_l0_active_minus1 = reader.read_exp_golomb_unsigned()?;
            if slice_type.is_b() {
                num_ref_idx_l1_active_minus1 = reader.read_exp_golomb_unsigned()?;
            }
        }
    }

    // ref_pic_list_mvc_modification() has the same idc/value-pair shape as
    // ref_pic_list_modification(); the MVC-only idc values 4/5 round-trip
    // through the same generic reader without changing the idc==3 terminator.
    let mut ref_pic_list_modification_flag_l0 = false;
    let mut ref_pic_list_modification_flag_l1 = false;
    let mut ref_pic_list_modification_l0 = RefPicListModification::default();
    let mut ref_pic_list_modification_l1 = RefPicListModification::default();

    if !slice_type.is_intra() {
        ref_pic_list_modification_flag_l0 = reader.read_flag()?;
        if ref_pic_list_modification_flag_l0 {
            ref_pic_list_modification_l0 = parse_ref_pic_list_modification(reader)?;
        }
    }

    if slice_type.is_b() {
        ref_pic_list_modification_flag_l1 = reader.read_flag()?;
        if ref_pic_list_modification_flag_l1 {
            ref_pic_list_modification_l1 = parse_ref_pic_list_modification(reader)?;
        }
    }

    let wants_weight_table = (pps.weighted_pred_flag && (slice_type.is_p() || matches!(slice_type, SliceType::Sp)))
        || (pps.weighted_bipred_idc == 1 && slice_type.is_b());

    let mut base_pred_weight_table_flag = false;
    let mut pred_weight_table = None;

    if wants_weight_table {
        if svc.no_inter_layer_pred_flag {
            pred_weight_table = Some(parse_pred_weight_table(
                reader,
                slice_type,
                num_ref_idx_l0_active_minus1,
                num_ref_idx_l1_active_minus1,
                &sps,
            )?);
        } else {
            base_pred_weight_table_flag = reader.read_flag()?;
            if !base_pred_weight_table_flag {
                pred_weight_table = Some(parse_pred_weight_table(
                    reader,
                    slice_type,
                    num_ref_idx_l0_active_minus1,
                    num_ref_idx_l1_active_minus1,
                    &sps,
                )?);
            }
        }
    }

    let mut dec_ref_pic_marking = DecRefPicMarking::default();
    let mut store_ref_base_pic_flag = false;

    if nal_ref_idc != 0 {
        dec_ref_pic_marking = parse_dec_ref_pic_marking_with_idr(reader, svc.idr_flag)?;

        if svc.quality_id == 0 {
            store_ref_base_pic_flag = reader.read_flag()?;
            if (svc.use_ref_base_pic_flag || store_ref_base_pic_flag) && !svc.idr_flag {
                // dec_ref_pic_marking_base(): same MMCO-loop shape as the
                // non-IDR marking path, targeting the base-layer reference
                // picture set this inspector does not separately track.
                let _ = parse_mmco_loop(reader)?;
            }
        }
    }

    let mut cabac_init_idc = 0;
    if pps.entropy_coding_mode_flag && !slice_type.is_intra() {
        cabac_init_idc = reader.read_exp_golomb_unsigned()?;
    }

    let slice_qp_delta = reader.read_exp_golomb_signed()?;

    let mut sp_for_switch_flag = false;
    let mut slice_qs_delta = 0;
    if matches!(slice_type, SliceType::Sp | SliceType::Si) {
        if matches!(slice_type, SliceType::Sp) {
            sp_for_switch_flag = reader.read_flag()?;
        }
        slice_qs_delta = reader.read_exp_golomb_signed()?;
    }

    let mut disable_deblocking_filter_idc = 0;
    let mut slice_alpha_c0_offset_div2 = 0;
    let mut slice_beta_offset_div2 = 0;

    if pps.deblocking_filter_control_present_flag {
        disable_deblocking_filter_idc = reader.read_exp_golomb_unsigned()?;
        if disable_deblocking_filter_idc != 1 {
            slice_alpha_c0_offset_div2 = reader.read_exp_golomb_signed()?;
            slice_beta_offset_div2 = reader.read_exp_golomb_signed()?;
        }
    }

    let mut slice_group_change_cycle = 0;
    if let Some(map_type) = pps.slice_group_map_type {
        if pps.num_slice_groups_minus1 > 0 && (3..=5).contains(&map_type) {
            let pic_size_in_map_units =
                (sps.pic_width_in_mbs_minus1 + 1) * (sps.pic_height_in_map_units_minus1 + 1);
            let change_rate = match &pps.slice_group_map {
                Some(crate::pps::SliceGroupMap::Changing { change_rate_minus1, .. }) => {
                    change_rate_minus1 + 1
                }
                _ => 1,
            };
            let max_value = pic_size_in_map_units.div_ceil(change_rate) + 1;
            let bits = ceil_log2(max_value).max(1) as u8;
            slice_group_change_cycle = reader.read_bits(bits)?;
        }
    }

    let ref_layer_dq_id = if !svc.no_inter_layer_pred_flag && svc.quality_id == 0 {
        Some(reader.read_exp_golomb_unsigned()?)
    } else {
        None
    };

    Ok(SliceHeaderScalableExtension {
        first_mb_in_slice,
        slice_type_raw,
        slice_type,
        pic_parameter_set_id,
        colour_plane_id,
        frame_num,
        field_pic_flag,
        bottom_field_flag,
        idr_pic_id,
        pic_order_cnt_lsb,
        delta_pic_order_cnt_bottom,
        delta_pic_order_cnt,
        redundant_pic_cnt,
        direct_spatial_mv_pred_flag,
        num_ref_idx_active_override_flag,
        num_ref_idx_l0_active_minus1,
        num_ref_idx_l1_active_minus1,
        ref_pic_list_modification_flag_l0,
        ref_pic_list_modification_flag_l1,
        ref_pic_list_modification_l0,
        ref_pic_list_modification_l1,
        base_pred_weight_table_flag,
        pred_weight_table,
        dec_ref_pic_marking,
        store_ref_base_pic_flag,
        cabac_init_idc,
        slice_qp_delta,
        sp_for_switch_flag,
        slice_qs_delta,
        disable_deblocking_filter_idc,
        slice_alpha_c0_offset_div2,
        slice_beta_offset_div2,
        slice_group_change_cycle,
        ref_layer_dq_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_type_folding() {
        assert_eq!(SliceType::from_u32(0), SliceType::P);
        assert_eq!(SliceType::from_u32(1), SliceType::B);
        assert_eq!(SliceType::from_u32(2), SliceType::I);
        assert_eq!(SliceType::from_u32(5), SliceType::P);
        assert_eq!(SliceType::from_u32(7), SliceType::I);

        assert!(SliceType::I.is_intra());
        assert!(SliceType::B.is_b());
        assert!(SliceType::P.is_p());
    }

    #[test]
    fn test_slice_group_change_cycle_divides_by_rate() {
        // PicSizeInMapUnits=99, SliceGroupChangeRate=10 -> ceil(99/10)+1 = 11 -> 4 bits
        let pic_size = 99u32;
        let rate = 10u32;
        let max_value = pic_size.div_ceil(rate) + 1;
        assert_eq!(ceil_log2(max_value), 4);
    }
}
