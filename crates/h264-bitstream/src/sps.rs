//! H.264/AVC Sequence Parameter Set (SPS), VUI, HRD, and SPS-extension parsing.

use crate::bitreader::BitReader;
use crate::error::{AvcError, Result};
use crate::options::limits;
use serde::{Deserialize, Serialize};
use std::fmt;

/// H.264/AVC `profile_idc` values (Annex A).
///
/// Not `#[repr(u8)]`: unlike the teacher's `ProfileIdc`, `Unknown` carries the
/// raw value through rather than collapsing it to a single sentinel, so this
/// enum isn't a plain fieldless discriminant list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProfileIdc {
    CavlcIntra444 = 44,
    Baseline = 66,
    Main = 77,
    ScalableBaseline = 83,
    ScalableHigh = 86,
    Extended = 88,
    High = 100,
    High10 = 110,
    MultiviewHigh = 118,
    High422 = 122,
    StereoHigh = 128,
    MfcHigh = 134,
    MfcDepthHigh = 135,
    MultiviewDepthHigh = 138,
    EnhancedMultiviewDepthHigh = 139,
    High444Predictive = 244,
    Unknown(u8),
}

impl ProfileIdc {
    pub fn from_u8(value: u8) -> Self {
        match value {
            44 => ProfileIdc::CavlcIntra444,
            66 => ProfileIdc::Baseline,
            77 => ProfileIdc::Main,
            83 => ProfileIdc::ScalableBaseline,
            86 => ProfileIdc::ScalableHigh,
            88 => ProfileIdc::Extended,
            100 => ProfileIdc::High,
            110 => ProfileIdc::High10,
            118 => ProfileIdc::MultiviewHigh,
            122 => ProfileIdc::High422,
            128 => ProfileIdc::StereoHigh,
            134 => ProfileIdc::MfcHigh,
            135 => ProfileIdc::MfcDepthHigh,
            138 => ProfileIdc::MultiviewDepthHigh,
            139 => ProfileIdc::EnhancedMultiviewDepthHigh,
            244 => ProfileIdc::High444Predictive,
            other => ProfileIdc::Unknown(other),
        }
    }

    pub fn raw(&self) -> u8 {
        match self {
            ProfileIdc::CavlcIntra444 => 44,
            ProfileIdc::Baseline => 66,
            ProfileIdc::Main => 77,
            ProfileIdc::ScalableBaseline => 83,
            ProfileIdc::ScalableHigh => 86,
            ProfileIdc::Extended => 88,
            ProfileIdc::High => 100,
            ProfileIdc::High10 => 110,
            ProfileIdc::MultiviewHigh => 118,
            ProfileIdc::High422 => 122,
            ProfileIdc::StereoHigh => 128,
            ProfileIdc::MfcHigh => 134,
            ProfileIdc::MfcDepthHigh => 135,
            ProfileIdc::MultiviewDepthHigh => 138,
            ProfileIdc::EnhancedMultiviewDepthHigh => 139,
            ProfileIdc::High444Predictive => 244,
            ProfileIdc::Unknown(v) => *v,
        }
    }

    /// True for profiles whose SPS carries the chroma-format / bit-depth /
    /// scaling-matrix fields (section 7.3.2.1.1's `if` condition). For every
    /// other profile (including Baseline/Main/Extended) those fields are
    /// absent and `chroma_format_idc` must default to 1 (4:2:0).
    pub fn has_chroma_format_fields(&self) -> bool {
        matches!(
            self.raw(),
            44 | 83 | 86 | 100 | 110 | 118 | 122 | 128 | 134 | 135 | 138 | 139 | 244
        )
    }
}

impl fmt::Display for ProfileIdc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileIdc::CavlcIntra444 => write!(f, "CAVLC 4:4:4 Intra"),
            ProfileIdc::Baseline => write!(f, "Baseline"),
            ProfileIdc::Main => write!(f, "Main"),
            ProfileIdc::ScalableBaseline => write!(f, "Scalable Baseline"),
            ProfileIdc::ScalableHigh => write!(f, "Scalable High"),
            ProfileIdc::Extended => write!(f, "Extended"),
            ProfileIdc::High => write!(f, "High"),
            ProfileIdc::High10 => write!(f, "High 10"),
            ProfileIdc::MultiviewHigh => write!(f, "Multiview High"),
            ProfileIdc::High422 => write!(f, "High 4:2:2"),
            ProfileIdc::StereoHigh => write!(f, "Stereo High"),
            ProfileIdc::MfcHigh => write!(f, "MFC High"),
            ProfileIdc::MfcDepthHigh => write!(f, "MFC Depth High"),
            ProfileIdc::MultiviewDepthHigh => write!(f, "Multiview Depth High"),
            ProfileIdc::EnhancedMultiviewDepthHigh => write!(f, "Enhanced Multiview Depth High"),
            ProfileIdc::High444Predictive => write!(f, "High 4:4:4 Predictive"),
            ProfileIdc::Unknown(v) => write!(f, "Unknown({})", v),
        }
    }
}

/// Display-string profile classification per Annex A.2, taking the
/// constraint-set flags into account. When multiple tags would otherwise
/// apply because the constraint flags that disambiguate them are both
/// unset, the plain (unconstrained) tag is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProfileType {
    ConstrainedBaseline,
    Baseline,
    Main,
    Extended,
    High,
    ProgressiveHigh,
    ConstrainedHigh,
    High10,
    High10Intra,
    High422,
    High422Intra,
    High444Predictive,
    High444Intra,
    CavlcIntra444,
    ScalableBaseline,
    ScalableHigh,
    MultiviewHigh,
    StereoHigh,
    Other(u8),
}

/// Derive the profile classification from `profile_idc` and constraint
/// flags 0-5, per Annex A.2.
pub fn derive_profile_type(profile_idc: &ProfileIdc, constraint_flags: [bool; 6]) -> ProfileType {
    let [_cs0, cs1, _cs2, cs3, cs4, cs5] = constraint_flags;
    match profile_idc.raw() {
        66 if cs1 => ProfileType::ConstrainedBaseline,
        66 => ProfileType::Baseline,
        77 => ProfileType::Main,
        88 => ProfileType::Extended,
        100 if cs4 && cs5 => ProfileType::ConstrainedHigh,
        100 if cs4 => ProfileType::ProgressiveHigh,
        100 => ProfileType::High,
        110 if cs3 => ProfileType::High10Intra,
        110 => ProfileType::High10,
        122 if cs3 => ProfileType::High422Intra,
        122 => ProfileType::High422,
        244 if cs3 => ProfileType::High444Intra,
        244 => ProfileType::High444Predictive,
        44 => ProfileType::CavlcIntra444,
        83 => ProfileType::ScalableBaseline,
        86 => ProfileType::ScalableHigh,
        118 => ProfileType::MultiviewHigh,
        128 => ProfileType::StereoHigh,
        other => ProfileType::Other(other),
    }
}

/// Chroma sampling format (`chroma_format_idc`, Table 6-1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChromaFormat {
    Monochrome = 0,
    #[default]
    Yuv420 = 1,
    Yuv422 = 2,
    Yuv444 = 3,
}

impl ChromaFormat {
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(ChromaFormat::Monochrome),
            1 => Ok(ChromaFormat::Yuv420),
            2 => Ok(ChromaFormat::Yuv422),
            3 => Ok(ChromaFormat::Yuv444),
            v => Err(AvcError::OutOfRange {
                field: "chroma_format_idc",
                value: v as i64,
                min: 0,
                max: 3,
            }),
        }
    }

    /// `SubWidthC` (Table 6-1); undefined (0) for monochrome.
    pub fn sub_width_c(&self) -> u32 {
        match self {
            ChromaFormat::Monochrome => 0,
            ChromaFormat::Yuv420 | ChromaFormat::Yuv422 => 2,
            ChromaFormat::Yuv444 => 1,
        }
    }

    /// `SubHeightC` (Table 6-1); undefined (0) for monochrome.
    pub fn sub_height_c(&self) -> u32 {
        match self {
            ChromaFormat::Monochrome => 0,
            ChromaFormat::Yuv420 => 2,
            ChromaFormat::Yuv422 | ChromaFormat::Yuv444 => 1,
        }
    }
}

/// A parsed 4x4 or 8x8 scaling list, plus whether it fell back to the
/// default matrix (`useDefaultScalingMatrixFlag`), per section 7.3.2.1.1.1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalingList {
    pub values: Vec<i32>,
    pub use_default_matrix: bool,
}

pub(crate) fn parse_scaling_list(reader: &mut BitReader, size: usize) -> Result<ScalingList> {
    let mut values = Vec::with_capacity(size);
    let mut last_scale = 8i32;
    let mut next_scale = 8i32;
    let mut use_default_matrix = false;

    for j in 0..size {
        if next_scale != 0 {
            let delta_scale = reader.read_exp_golomb_signed()?;
            if !(-128..=127).contains(&delta_scale) {
                return Err(AvcError::OutOfRange {
                    field: "delta_scale",
                    value: delta_scale as i64,
                    min: -128,
                    max: 127,
                });
            }
            next_scale = (last_scale + delta_scale + 256) % 256;
            use_default_matrix = j == 0 && next_scale == 0;
        }
        let scale = if next_scale == 0 { last_scale } else { next_scale };
        values.push(scale);
        last_scale = scale;
    }

    Ok(ScalingList {
        values,
        use_default_matrix,
    })
}

/// HRD (Hypothetical Reference Decoder) parameters, Annex E.1.2.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HrdParameters {
    pub cpb_cnt_minus1: u32,
    pub bit_rate_scale: u8,
    pub cpb_size_scale: u8,
    pub bit_rate_value_minus1: Vec<u32>,
    pub cpb_size_value_minus1: Vec<u32>,
    pub cbr_flag: Vec<bool>,
    pub initial_cpb_removal_delay_length_minus1: u8,
    pub cpb_removal_delay_length_minus1: u8,
    pub dpb_output_delay_length_minus1: u8,
    pub time_offset_length: u8,
}

fn parse_hrd_parameters(reader: &mut BitReader) -> Result<HrdParameters> {
    let cpb_cnt_minus1 = reader.read_exp_golomb_unsigned()?;
    if cpb_cnt_minus1 > 31 {
        return Err(AvcError::OutOfRange {
            field: "cpb_cnt_minus1",
            value: cpb_cnt_minus1 as i64,
            min: 0,
            max: 31,
        });
    }

    let bit_rate_scale = reader.read_bits(4)? as u8;
    let cpb_size_scale = reader.read_bits(4)? as u8;

    let mut bit_rate_value_minus1 = Vec::new();
    let mut cpb_size_value_minus1 = Vec::new();
    let mut cbr_flag = Vec::new();

    for _ in 0..=cpb_cnt_minus1 {
        bit_rate_value_minus1.push(reader.read_exp_golomb_unsigned()?);
        cpb_size_value_minus1.push(reader.read_exp_golomb_unsigned()?);
        cbr_flag.push(reader.read_flag()?);
    }

    Ok(HrdParameters {
        cpb_cnt_minus1,
        bit_rate_scale,
        cpb_size_scale,
        bit_rate_value_minus1,
        cpb_size_value_minus1,
        cbr_flag,
        initial_cpb_removal_delay_length_minus1: reader.read_bits(5)? as u8,
        cpb_removal_delay_length_minus1: reader.read_bits(5)? as u8,
        dpb_output_delay_length_minus1: reader.read_bits(5)? as u8,
        time_offset_length: reader.read_bits(5)? as u8,
    })
}

/// VUI (Video Usability Information) parameters, Annex E.1.1.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VuiParameters {
    pub aspect_ratio_info_present_flag: bool,
    pub aspect_ratio_idc: u8,
    pub sar_width: u16,
    pub sar_height: u16,
    pub overscan_info_present_flag: bool,
    pub overscan_appropriate_flag: bool,
    pub video_signal_type_present_flag: bool,
    pub video_format: u8,
    pub video_full_range_flag: bool,
    pub colour_description_present_flag: bool,
    pub colour_primaries: u8,
    pub transfer_characteristics: u8,
    pub matrix_coefficients: u8,
    pub chroma_loc_info_present_flag: bool,
    pub chroma_sample_loc_type_top_field: u32,
    pub chroma_sample_loc_type_bottom_field: u32,
    pub timing_info_present_flag: bool,
    pub num_units_in_tick: u32,
    pub time_scale: u32,
    pub fixed_frame_rate_flag: bool,
    pub nal_hrd_parameters_present_flag: bool,
    pub nal_hrd_parameters: Option<HrdParameters>,
    pub vcl_hrd_parameters_present_flag: bool,
    pub vcl_hrd_parameters: Option<HrdParameters>,
    pub low_delay_hrd_flag: bool,
    pub pic_struct_present_flag: bool,
    pub bitstream_restriction_flag: bool,
    pub motion_vectors_over_pic_boundaries_flag: bool,
    pub max_bytes_per_pic_denom: u32,
    pub max_bits_per_mb_denom: u32,
    pub log2_max_mv_length_horizontal: u32,
    pub log2_max_mv_length_vertical: u32,
    pub max_num_reorder_frames: u32,
    pub max_dec_frame_buffering: u32,
}

fn parse_vui(reader: &mut BitReader) -> Result<VuiParameters> {
    let mut vui = VuiParameters::default();

    vui.aspect_ratio_info_present_flag = reader.read_flag()?;
    if vui.aspect_ratio_info_present_flag {
        vui.aspect_ratio_idc = reader.read_bits(8)? as u8;
        if vui.aspect_ratio_idc == 255 {
            vui.sar_width = reader.read_bits(16)? as u16;
            vui.sar_height = reader.read_bits(16)? as u16;
        }
    }

    vui.overscan_info_present_flag = reader.read_flag()?;
    if vui.overscan_info_present_flag {
        vui.overscan_appropriate_flag = reader.read_flag()?;
    }

    vui.video_signal_type_present_flag = reader.read_flag()?;
    if vui.video_signal_type_present_flag {
        vui.video_format = reader.read_bits(3)? as u8;
        vui.video_full_range_flag = reader.read_flag()?;
        vui.colour_description_present_flag = reader.read_flag()?;
        if vui.colour_description_present_flag {
            vui.colour_primaries = reader.read_bits(8)? as u8;
            vui.transfer_characteristics = reader.read_bits(8)? as u8;
            vui.matrix_coefficients = reader.read_bits(8)? as u8;
        }
    }

    vui.chroma_loc_info_present_flag = reader.read_flag()?;
    if vui.chroma_loc_info_present_flag {
        vui.chroma_sample_loc_type_top_field = reader.read_exp_golomb_unsigned()?;
        vui.chroma_sample_loc_type_bottom_field = reader.read_exp_golomb_unsigned()?;
    }

    vui.timing_info_present_flag = reader.read_flag()?;
    if vui.timing_info_present_flag {
        vui.num_units_in_tick = reader.read_u32()?;
        vui.time_scale = reader.read_u32()?;
        vui.fixed_frame_rate_flag = reader.read_flag()?;
    }

    vui.nal_hrd_parameters_present_flag = reader.read_flag()?;
    if vui.nal_hrd_parameters_present_flag {
        vui.nal_hrd_parameters = Some(parse_hrd_parameters(reader)?);
    }

    vui.vcl_hrd_parameters_present_flag = reader.read_flag()?;
    if vui.vcl_hrd_parameters_present_flag {
        vui.vcl_hrd_parameters = Some(parse_hrd_parameters(reader)?);
    }

    if vui.nal_hrd_parameters_present_flag || vui.vcl_hrd_parameters_present_flag {
        vui.low_delay_hrd_flag = reader.read_flag()?;
    }

    vui.pic_struct_present_flag = reader.read_flag()?;
    vui.bitstream_restriction_flag = reader.read_flag()?;

    if vui.bitstream_restriction_flag {
        vui.motion_vectors_over_pic_boundaries_flag = reader.read_flag()?;
        vui.max_bytes_per_pic_denom = reader.read_exp_golomb_unsigned()?;
        vui.max_bits_per_mb_denom = reader.read_exp_golomb_unsigned()?;
        vui.log2_max_mv_length_horizontal = reader.read_exp_golomb_unsigned()?;
        vui.log2_max_mv_length_vertical = reader.read_exp_golomb_unsigned()?;
        vui.max_num_reorder_frames = reader.read_exp_golomb_unsigned()?;
        vui.max_dec_frame_buffering = reader.read_exp_golomb_unsigned()?;
    }

    Ok(vui)
}

/// Sequence Parameter Set (section 7.3.2.1.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sps {
    pub profile_idc: ProfileIdc,
    pub constraint_set0_flag: bool,
    pub constraint_set1_flag: bool,
    pub constraint_set2_flag: bool,
    pub constraint_set3_flag: bool,
    pub constraint_set4_flag: bool,
    pub constraint_set5_flag: bool,
    pub level_idc: u8,
    pub seq_parameter_set_id: u8,
    /// Always populated; defaults to `Yuv420` when the bitstream omits it
    /// (Baseline/Main/Extended profiles never signal this field).
    pub chroma_format_idc: ChromaFormat,
    pub separate_colour_plane_flag: bool,
    pub bit_depth_luma_minus8: u8,
    pub bit_depth_chroma_minus8: u8,
    pub qpprime_y_zero_transform_bypass_flag: bool,
    pub seq_scaling_matrix_present_flag: bool,
    pub scaling_lists_4x4: Vec<Option<ScalingList>>,
    pub scaling_lists_8x8: Vec<Option<ScalingList>>,
    pub log2_max_frame_num_minus4: u8,
    pub pic_order_cnt_type: u8,
    pub log2_max_pic_order_cnt_lsb_minus4: u8,
    pub delta_pic_order_always_zero_flag: bool,
    pub offset_for_non_ref_pic: i32,
    pub offset_for_top_to_bottom_field: i32,
    pub num_ref_frames_in_pic_order_cnt_cycle: u8,
    pub offset_for_ref_frame: Vec<i32>,
    pub max_num_ref_frames: u32,
    pub gaps_in_frame_num_value_allowed_flag: bool,
    pub pic_width_in_mbs_minus1: u32,
    pub pic_height_in_map_units_minus1: u32,
    pub frame_mbs_only_flag: bool,
    pub mb_adaptive_frame_field_flag: bool,
    pub direct_8x8_inference_flag: bool,
    pub frame_cropping_flag: bool,
    pub frame_crop_left_offset: u32,
    pub frame_crop_right_offset: u32,
    pub frame_crop_top_offset: u32,
    pub frame_crop_bottom_offset: u32,
    pub vui_parameters_present_flag: bool,
    pub vui_parameters: Option<VuiParameters>,
}

impl Sps {
    /// `ChromaArrayType` (section 7.4.2.1.1).
    pub fn chroma_array_type(&self) -> u8 {
        if self.separate_colour_plane_flag {
            0
        } else {
            self.chroma_format_idc as u8
        }
    }

    fn crop_unit_x(&self) -> u32 {
        if self.chroma_array_type() == 0 {
            1
        } else {
            self.chroma_format_idc.sub_width_c()
        }
    }

    fn crop_unit_y(&self) -> u32 {
        let base = if self.chroma_array_type() == 0 {
            1
        } else {
            self.chroma_format_idc.sub_height_c()
        };
        base * (2 - self.frame_mbs_only_flag as u32)
    }

    /// Picture width in luma samples before cropping.
    pub fn pic_width(&self) -> u32 {
        16 * (self.pic_width_in_mbs_minus1 + 1)
    }

    /// Picture height in luma samples before cropping.
    pub fn pic_height(&self) -> u32 {
        let frame_height_in_mbs =
            (2 - self.frame_mbs_only_flag as u32) * (self.pic_height_in_map_units_minus1 + 1);
        frame_height_in_mbs * 16
    }

    /// Display width after cropping, per equations 7-19/7-20.
    pub fn display_width(&self) -> u32 {
        let width = self.pic_width();
        if self.frame_cropping_flag {
            width.saturating_sub(
                self.crop_unit_x() * (self.frame_crop_left_offset + self.frame_crop_right_offset),
            )
        } else {
            width
        }
    }

    /// Display height after cropping, per equations 7-21/7-22.
    pub fn display_height(&self) -> u32 {
        let height = self.pic_height();
        if self.frame_cropping_flag {
            height.saturating_sub(
                self.crop_unit_y() * (self.frame_crop_top_offset + self.frame_crop_bottom_offset),
            )
        } else {
            height
        }
    }

    pub fn bit_depth_luma(&self) -> u8 {
        self.bit_depth_luma_minus8 + 8
    }

    pub fn bit_depth_chroma(&self) -> u8 {
        self.bit_depth_chroma_minus8 + 8
    }

    pub fn profile_type(&self) -> ProfileType {
        derive_profile_type(
            &self.profile_idc,
            [
                self.constraint_set0_flag,
                self.constraint_set1_flag,
                self.constraint_set2_flag,
                self.constraint_set3_flag,
                self.constraint_set4_flag,
                self.constraint_set5_flag,
            ],
        )
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

/// Parse SPS from a NAL unit's RBSP-unescaped payload (after the NAL header
/// has already been consumed from `reader`).
pub fn parse_sps(reader: &mut BitReader) -> Result<Sps> {
    let profile_idc = ProfileIdc::from_u8(reader.read_bits(8)? as u8);
    let constraint_set0_flag = reader.read_flag()?;
    let constraint_set1_flag = reader.read_flag()?;
    let constraint_set2_flag = reader.read_flag()?;
    let constraint_set3_flag = reader.read_flag()?;
    let constraint_set4_flag = reader.read_flag()?;
    let constraint_set5_flag = reader.read_flag()?;
    let _reserved_zero_2bits = reader.read_bits(2)?;
    let level_idc = reader.read_bits(8)? as u8;
    let seq_parameter_set_id = range_check("seq_parameter_set_id", reader.read_exp_golomb_unsigned()?, 31)? as u8;

    let mut chroma_format_idc = ChromaFormat::Yuv420;
    let mut separate_colour_plane_flag = false;
    let mut bit_depth_luma_minus8 = 0u8;
    let mut bit_depth_chroma_minus8 = 0u8;
    let mut qpprime_y_zero_transform_bypass_flag = false;
    let mut seq_scaling_matrix_present_flag = false;
    let mut scaling_lists_4x4: Vec<Option<ScalingList>> = Vec::new();
    let mut scaling_lists_8x8: Vec<Option<ScalingList>> = Vec::new();

    if profile_idc.has_chroma_format_fields() {
        chroma_format_idc = ChromaFormat::from_u8(reader.read_exp_golomb_unsigned()? as u8)?;

        if chroma_format_idc == ChromaFormat::Yuv444 {
            separate_colour_plane_flag = reader.read_flag()?;
        }

        bit_depth_luma_minus8 = range_check("bit_depth_luma_minus8", reader.read_exp_golomb_unsigned()?, 6)? as u8;
        bit_depth_chroma_minus8 = range_check("bit_depth_chroma_minus8", reader.read_exp_golomb_unsigned()?, 6)? as u8;

        qpprime_y_zero_transform_bypass_flag = reader.read_flag()?;
        seq_scaling_matrix_present_flag = reader.read_flag()?;

        if seq_scaling_matrix_present_flag {
            let num_4x4 = 6;
            let num_8x8 = if chroma_format_idc == ChromaFormat::Yuv444 { 6 } else { 2 };

            for _ in 0..num_4x4 {
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
    }

    let log2_max_frame_num_minus4 = range_check("log2_max_frame_num_minus4", reader.read_exp_golomb_unsigned()?, 12)? as u8;
    let pic_order_cnt_type = range_check("pic_order_cnt_type", reader.read_exp_golomb_unsigned()?, 2)? as u8;

    let mut log2_max_pic_order_cnt_lsb_minus4 = 0u8;
    let mut delta_pic_order_always_zero_flag = false;
    let mut offset_for_non_ref_pic = 0i32;
    let mut offset_for_top_to_bottom_field = 0i32;
    let mut num_ref_frames_in_pic_order_cnt_cycle = 0u8;
    let mut offset_for_ref_frame = Vec::new();

    match pic_order_cnt_type {
        0 => {
            log2_max_pic_order_cnt_lsb_minus4 =
                range_check("log2_max_pic_order_cnt_lsb_minus4", reader.read_exp_golomb_unsigned()?, 12)? as u8;
        }
        1 => {
            delta_pic_order_always_zero_flag = reader.read_flag()?;
            offset_for_non_ref_pic = reader.read_exp_golomb_signed()?;
            offset_for_top_to_bottom_field = reader.read_exp_golomb_signed()?;

            num_ref_frames_in_pic_order_cnt_cycle =
                range_check("num_ref_frames_in_pic_order_cnt_cycle", reader.read_exp_golomb_unsigned()?, 255)? as u8;

            for _ in 0..num_ref_frames_in_pic_order_cnt_cycle {
                offset_for_ref_frame.push(reader.read_exp_golomb_signed()?);
            }
        }
        _ => {}
    }

    let max_num_ref_frames = range_check(
        "max_num_ref_frames",
        reader.read_exp_golomb_unsigned()?,
        limits::MAX_NUM_REF_FRAMES,
    )?;

    let gaps_in_frame_num_value_allowed_flag = reader.read_flag()?;

    let pic_width_in_mbs_minus1 = range_check(
        "pic_width_in_mbs_minus1",
        reader.read_exp_golomb_unsigned()?,
        limits::MAX_MB_WIDTH - 1,
    )?;
    let pic_height_in_map_units_minus1 = range_check(
        "pic_height_in_map_units_minus1",
        reader.read_exp_golomb_unsigned()?,
        limits::MAX_MB_HEIGHT - 1,
    )?;

    let frame_mbs_only_flag = reader.read_flag()?;

    let mut mb_adaptive_frame_field_flag = false;
    if !frame_mbs_only_flag {
        mb_adaptive_frame_field_flag = reader.read_flag()?;
    }

    let direct_8x8_inference_flag = reader.read_flag()?;
    let frame_cropping_flag = reader.read_flag()?;

    let mut frame_crop_left_offset = 0;
    let mut frame_crop_right_offset = 0;
    let mut frame_crop_top_offset = 0;
    let mut frame_crop_bottom_offset = 0;

    if frame_cropping_flag {
        frame_crop_left_offset = range_check("frame_crop_left_offset", reader.read_exp_golomb_unsigned()?, limits::MAX_WIDTH)?;
        frame_crop_right_offset = range_check("frame_crop_right_offset", reader.read_exp_golomb_unsigned()?, limits::MAX_WIDTH)?;
        frame_crop_top_offset = range_check("frame_crop_top_offset", reader.read_exp_golomb_unsigned()?, limits::MAX_HEIGHT)?;
        frame_crop_bottom_offset = range_check("frame_crop_bottom_offset", reader.read_exp_golomb_unsigned()?, limits::MAX_HEIGHT)?;
    }

    let vui_parameters_present_flag = reader.read_flag()?;
    let vui_parameters = if vui_parameters_present_flag {
        Some(parse_vui(reader)?)
    } else {
        None
    };

    let _ = reader.rbsp_trailing_bits();

    Ok(Sps {
        profile_idc,
        constraint_set0_flag,
        constraint_set1_flag,
        constraint_set2_flag,
        constraint_set3_flag,
        constraint_set4_flag,
        constraint_set5_flag,
        level_idc,
        seq_parameter_set_id,
        chroma_format_idc,
        separate_colour_plane_flag,
        bit_depth_luma_minus8,
        bit_depth_chroma_minus8,
        qpprime_y_zero_transform_bypass_flag,
        seq_scaling_matrix_present_flag,
        scaling_lists_4x4,
        scaling_lists_8x8,
        log2_max_frame_num_minus4,
        pic_order_cnt_type,
        log2_max_pic_order_cnt_lsb_minus4,
        delta_pic_order_always_zero_flag,
        offset_for_non_ref_pic,
        offset_for_top_to_bottom_field,
        num_ref_frames_in_pic_order_cnt_cycle,
        offset_for_ref_frame,
        max_num_ref_frames,
        gaps_in_frame_num_value_allowed_flag,
        pic_width_in_mbs_minus1,
        pic_height_in_map_units_minus1,
        frame_mbs_only_flag,
        mb_adaptive_frame_field_flag,
        direct_8x8_inference_flag,
        frame_cropping_flag,
        frame_crop_left_offset,
        frame_crop_right_offset,
        frame_crop_top_offset,
        frame_crop_bottom_offset,
        vui_parameters_present_flag,
        vui_parameters,
    })
}

/// SPS extension (`seq_parameter_set_extension_rbsp`, section 7.3.2.1.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpsExtension {
    pub seq_parameter_set_id: u8,
    pub aux_format_idc: u32,
    pub bit_depth_aux_minus8: u32,
    pub alpha_incr_flag: bool,
    pub alpha_opaque_value: u32,
    pub alpha_transparent_value: u32,
    pub additional_extension_flag: bool,
}

pub fn parse_sps_extension(reader: &mut BitReader) -> Result<SpsExtension> {
    let seq_parameter_set_id = range_check("seq_parameter_set_id", reader.read_exp_golomb_unsigned()?, 31)? as u8;
    let aux_format_idc = range_check("aux_format_idc", reader.read_exp_golomb_unsigned()?, 3)?;

    let mut bit_depth_aux_minus8 = 0;
    let mut alpha_incr_flag = false;
    let mut alpha_opaque_value = 0;
    let mut alpha_transparent_value = 0;

    if aux_format_idc != 0 {
        bit_depth_aux_minus8 = range_check("bit_depth_aux_minus8", reader.read_exp_golomb_unsigned()?, 4)?;
        alpha_incr_flag = reader.read_flag()?;
        let width = bit_depth_aux_minus8 as u8 + 9;
        alpha_opaque_value = reader.read_bits(width)?;
        alpha_transparent_value = reader.read_bits(width)?;
    }

    let additional_extension_flag = reader.read_flag()?;
    let _ = reader.rbsp_trailing_bits();

    Ok(SpsExtension {
        seq_parameter_set_id,
        aux_format_idc,
        bit_depth_aux_minus8,
        alpha_incr_flag,
        alpha_opaque_value,
        alpha_transparent_value,
        additional_extension_flag,
    })
}

/// SVC extension fields of a Subset SPS (Annex G, `seq_parameter_set_svc_extension`).
/// Only the header-level fields useful for inspection are retained; the
/// scalability-specific `svc_vui_parameters_present_flag` sub-tree is not
/// decoded further.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpsSvcExtension {
    pub inter_layer_deblocking_filter_control_present_flag: bool,
    pub extended_spatial_scalability_idc: u8,
    pub chroma_phase_x_plus1_flag: Option<bool>,
    pub chroma_phase_y_plus1: Option<u8>,
    pub seq_ref_layer_chroma_phase_x_plus1_flag: Option<bool>,
    pub seq_ref_layer_chroma_phase_y_plus1: Option<u8>,
    pub seq_scaled_ref_layer_left_offset: i32,
    pub seq_scaled_ref_layer_top_offset: i32,
    pub seq_scaled_ref_layer_right_offset: i32,
    pub seq_scaled_ref_layer_bottom_offset: i32,
    pub seq_tcoeff_level_prediction_flag: bool,
    pub adaptive_tcoeff_level_prediction_flag: Option<bool>,
    pub slice_header_restriction_flag: bool,
}

/// Parse the SVC extension of a Subset SPS. `chroma_array_type` is the base
/// SPS's value, needed to decide whether the chroma-phase fields are present.
pub fn parse_sps_svc_extension(reader: &mut BitReader, chroma_array_type: u8) -> Result<SpsSvcExtension> {
    let inter_layer_deblocking_filter_control_present_flag = reader.read_flag()?;
    let extended_spatial_scalability_idc = reader.read_bits(2)? as u8;

    let mut chroma_phase_x_plus1_flag = None;
    let mut chroma_phase_y_plus1 = None;
    if chroma_array_type == 1 && extended_spatial_scalability_idc == 1 {
        chroma_phase_x_plus1_flag = Some(reader.read_flag()?);
        chroma_phase_y_plus1 = Some(reader.read_bits(2)? as u8);
    }

    let mut seq_ref_layer_chroma_phase_x_plus1_flag = None;
    let mut seq_ref_layer_chroma_phase_y_plus1 = None;
    let mut seq_scaled_ref_layer_left_offset = 0;
    let mut seq_scaled_ref_layer_top_offset = 0;
    let mut seq_scaled_ref_layer_right_offset = 0;
    let mut seq_scaled_ref_layer_bottom_offset = 0;

    if extended_spatial_scalability_idc == 1 {
        if chroma_array_type > 0 {
            seq_ref_layer_chroma_phase_x_plus1_flag = Some(reader.read_flag()?);
            seq_ref_layer_chroma_phase_y_plus1 = Some(reader.read_bits(2)? as u8);
        }
        seq_scaled_ref_layer_left_offset = reader.read_exp_golomb_signed()?;
        seq_scaled_ref_layer_top_offset = reader.read_exp_golomb_signed()?;
        seq_scaled_ref_layer_right_offset = reader.read_exp_golomb_signed()?;
        seq_scaled_ref_layer_bottom_offset = reader.read_exp_golomb_signed()?;
    }

    let seq_tcoeff_level_prediction_flag = reader.read_flag()?;
    let mut adaptive_tcoeff_level_prediction_flag = None;
    if seq_tcoeff_level_prediction_flag {
        adaptive_tcoeff_level_prediction_flag = Some(reader.read_flag()?);
    }

    let slice_header_restriction_flag = reader.read_flag()?;

    Ok(SpsSvcExtension {
        inter_layer_deblocking_filter_control_present_flag,
        extended_spatial_scalability_idc,
        chroma_phase_x_plus1_flag,
        chroma_phase_y_plus1,
        seq_ref_layer_chroma_phase_x_plus1_flag,
        seq_ref_layer_chroma_phase_y_plus1,
        seq_scaled_ref_layer_left_offset,
        seq_scaled_ref_layer_top_offset,
        seq_scaled_ref_layer_right_offset,
        seq_scaled_ref_layer_bottom_offset,
        seq_tcoeff_level_prediction_flag,
        adaptive_tcoeff_level_prediction_flag,
        slice_header_restriction_flag,
    })
}

/// Subset SPS (NAL unit type 15): a base SPS plus an SVC extension when the
/// profile carries one. Stored in a table separate from the base SPS table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubsetSps {
    pub sps: Sps,
    pub svc_extension: Option<SpsSvcExtension>,
    pub additional_extension2_flag: bool,
}

pub fn parse_subset_sps(reader: &mut BitReader) -> Result<SubsetSps> {
    let sps = parse_sps(reader)?;

    let is_svc_profile = matches!(
        sps.profile_idc.raw(),
        83 | 86 // ScalableBaseline, ScalableHigh
    );

    let svc_extension = if is_svc_profile {
        Some(parse_sps_svc_extension(reader, sps.chroma_array_type())?)
    } else {
        None
    };

    let additional_extension2_flag = reader.read_flag()?;
    let _ = reader.rbsp_trailing_bits();

    Ok(SubsetSps {
        sps,
        svc_extension,
        additional_extension2_flag,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_idc_mfc() {
        assert_eq!(ProfileIdc::from_u8(134).raw(), 134);
        assert!(ProfileIdc::from_u8(134).has_chroma_format_fields());
        assert!(!ProfileIdc::from_u8(66).has_chroma_format_fields());
    }

    #[test]
    fn test_chroma_format() {
        assert_eq!(ChromaFormat::from_u8(0).unwrap(), ChromaFormat::Monochrome);
        assert_eq!(ChromaFormat::from_u8(1).unwrap(), ChromaFormat::Yuv420);
        assert_eq!(ChromaFormat::Yuv420.sub_width_c(), 2);
        assert_eq!(ChromaFormat::Yuv420.sub_height_c(), 2);
        assert!(ChromaFormat::from_u8(4).is_err());
    }

    // Scenario A/B fixtures from the byte-exact specification used to build
    // this crate: a Baseline SPS ("601.264") and a cropped Baseline SPS.
    fn sps_bytes_601() -> Vec<u8> {
        vec![
            0x42, 0xc0, 0x16, 0xa6, 0x11, 0x05, 0x07, 0xe9, 0xb2, 0x00, 0x00,
            0x00, 0x02, 0x00, 0x00, 0x00, 0x64, 0x1e, 0x2c, 0x5c,
        ]
    }

    #[test]
    fn test_parse_sps_baseline_601() {
        let data = sps_bytes_601();
        let mut reader = BitReader::new(&data);
        let sps = parse_sps(&mut reader).unwrap();
        assert_eq!(sps.profile_idc.raw(), 66);
        assert_eq!(sps.level_idc, 22);
        assert_eq!(sps.seq_parameter_set_id, 0);
        assert_eq!(sps.chroma_format_idc, ChromaFormat::Yuv420);
        assert_eq!(sps.pic_width_in_mbs_minus1, 19);
        assert_eq!(sps.pic_height_in_map_units_minus1, 14);
        assert!(!sps.frame_cropping_flag);
    }

    #[test]
    fn test_baseline_defaults_chroma_420() {
        // Baseline (66) never signals chroma_format_idc; must default to 1.
        let data = sps_bytes_601();
        let mut reader = BitReader::new(&data);
        let sps = parse_sps(&mut reader).unwrap();
        assert_eq!(sps.chroma_format_idc, ChromaFormat::Yuv420);
        assert_eq!(sps.chroma_array_type(), 1);
    }

    #[test]
    fn test_cropped_baseline_resolution() {
        let data: [u8; 22] = [
            0x42, 0xc0, 0x0d, 0xd9, 0x01, 0x41, 0xff, 0x96, 0x6c, 0x80, 0x00,
            0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x19, 0x07, 0x8a, 0x15, 0x24,
        ];
        let mut reader = BitReader::new(&data);
        let sps = parse_sps(&mut reader).unwrap();
        assert_eq!(sps.profile_idc.raw(), 66);
        assert!(sps.frame_cropping_flag);
        assert_eq!(sps.display_width(), 320);
        assert_eq!(sps.display_height(), 232);
    }

    #[test]
    fn test_sps_extension_scenario_c() {
        let data = [0xa2, 0x3c, 0x3c, 0x3c, 0x00];
        let mut reader = BitReader::new(&data);
        let ext = parse_sps_extension(&mut reader).unwrap();
        assert_eq!(ext.seq_parameter_set_id, 0);
        assert_eq!(ext.aux_format_idc, 1);
        assert_eq!(ext.bit_depth_aux_minus8, 3);
        assert!(!ext.alpha_incr_flag);
    }
}
