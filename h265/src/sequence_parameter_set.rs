use super::{decode, syntax_elements::*, Bitstream, Decode, ProfileTierLevel};
use std::io;

/// The leading fields of a sequence parameter set, up to and including the bit depths. That is as
/// far as a decoder configuration record needs to go.
// ITU-T H.265, 11/2019, 7.3.2.2.1
#[derive(Clone, Debug, Default)]
pub struct SequenceParameterSet {
    pub sps_video_parameter_set_id: U4,
    pub sps_max_sub_layers_minus1: U3,
    pub sps_temporal_id_nesting_flag: U1,
    pub profile_tier_level: ProfileTierLevel,
    pub sps_seq_parameter_set_id: UE,
    pub chroma_format_idc: UE,

    // if( chroma_format_idc = = 3 )
    pub separate_colour_plane_flag: U1,

    pub pic_width_in_luma_samples: UE,
    pub pic_height_in_luma_samples: UE,
    pub conformance_window_flag: U1,

    // if( conformance_window_flag ) {
    pub conf_win_left_offset: UE,
    pub conf_win_right_offset: UE,
    pub conf_win_top_offset: UE,
    pub conf_win_bottom_offset: UE,
    // }
    pub bit_depth_luma_minus8: UE,
    pub bit_depth_chroma_minus8: UE,
}

impl SequenceParameterSet {
    /// Width and height after applying the conformance window.
    pub fn cropped_dimensions(&self) -> (u64, u64) {
        let (sub_width_c, sub_height_c) = match (self.chroma_format_idc.0, self.separate_colour_plane_flag.0) {
            (1, 0) => (2, 2),
            (2, 0) => (2, 1),
            _ => (1, 1),
        };
        let width = self.pic_width_in_luma_samples.0;
        let height = self.pic_height_in_luma_samples.0;
        (
            width.saturating_sub(sub_width_c * (self.conf_win_left_offset.0 + self.conf_win_right_offset.0)),
            height.saturating_sub(sub_height_c * (self.conf_win_top_offset.0 + self.conf_win_bottom_offset.0)),
        )
    }
}

impl Decode for SequenceParameterSet {
    fn decode<T: AsRef<[u8]>>(bs: &mut Bitstream<T>) -> io::Result<Self> {
        let mut ret = Self::default();

        decode!(
            bs,
            &mut ret.sps_video_parameter_set_id,
            &mut ret.sps_max_sub_layers_minus1,
            &mut ret.sps_temporal_id_nesting_flag
        )?;

        ret.profile_tier_level = ProfileTierLevel::decode(bs, true, ret.sps_max_sub_layers_minus1.0)?;

        decode!(bs, &mut ret.sps_seq_parameter_set_id, &mut ret.chroma_format_idc)?;

        if ret.chroma_format_idc.0 == 3 {
            decode!(bs, &mut ret.separate_colour_plane_flag)?;
        }

        decode!(
            bs,
            &mut ret.pic_width_in_luma_samples,
            &mut ret.pic_height_in_luma_samples,
            &mut ret.conformance_window_flag
        )?;

        if ret.conformance_window_flag.0 != 0 {
            decode!(
                bs,
                &mut ret.conf_win_left_offset,
                &mut ret.conf_win_right_offset,
                &mut ret.conf_win_top_offset,
                &mut ret.conf_win_bottom_offset
            )?;
        }

        decode!(bs, &mut ret.bit_depth_luma_minus8, &mut ret.bit_depth_chroma_minus8)?;

        Ok(ret)
    }
}

#[cfg(test)]
mod test {
    use super::{super::NALUnit, *};

    #[test]
    fn test_sequence_parameter_set() {
        let data = vec![
            0x42, 0x01, 0x01, 0x01, 0x60, 0x00, 0x00, 0x03, 0x00, 0xb0, 0x00, 0x00, 0x03, 0x00, 0x00, 0x03, 0x00, 0x99, 0xa0, 0x03, 0xc0, 0x80,
            0x11, 0x07, 0xcb, 0x88, 0x17, 0xb9, 0x16, 0x45, 0x2f, 0xfc, 0xb9, 0xfc, 0x4f, 0xe8, 0x80,
        ];

        let nalu = NALUnit::decode(&mut Bitstream::new(&data)).unwrap();
        let sps = SequenceParameterSet::decode(&mut Bitstream::new(&nalu.rbsp_byte)).unwrap();

        assert_eq!(sps.sps_max_sub_layers_minus1.0, 0);
        assert_eq!(sps.sps_temporal_id_nesting_flag.0, 1);
        assert_eq!(sps.profile_tier_level.general_profile_space.0, 0);
        assert_eq!(sps.profile_tier_level.general_tier_flag.0, 0);
        assert_eq!(sps.profile_tier_level.general_profile_idc.0, 1);
        assert_eq!(sps.profile_tier_level.general_profile_compatibility_flags.0, 0x60000000);
        assert_eq!(sps.profile_tier_level.general_constraint_flags.0, 0xb00000000000);
        assert_eq!(sps.profile_tier_level.general_level_idc.0, 153);
        assert_eq!(sps.chroma_format_idc.0, 1);
        assert_eq!(sps.pic_width_in_luma_samples.0, 1920);
        assert_eq!(sps.pic_height_in_luma_samples.0, 1088);
        assert_eq!(sps.conf_win_bottom_offset.0, 4);
        assert_eq!(sps.cropped_dimensions(), (1920, 1080));
        assert_eq!(sps.bit_depth_luma_minus8.0, 0);
        assert_eq!(sps.bit_depth_chroma_minus8.0, 0);
    }
}
