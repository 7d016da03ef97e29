use super::{decode, syntax_elements::*, Bitstream};
use std::io;

// ITU-T H.265, 11/2019, 7.3.3
#[derive(Clone, Debug, Default)]
pub struct ProfileTierLevel {
    // if( profilePresentFlag ) {
    pub general_profile_space: U2,
    pub general_tier_flag: U1,
    pub general_profile_idc: U5,
    pub general_profile_compatibility_flags: U32,
    pub general_constraint_flags: U48,
    // }
    pub general_level_idc: U8,

    /// One entry per sub-layer, `None` where `sub_layer_level_present_flag` is zero. Sub-layer
    /// profile information is skipped.
    pub sub_layer_level_idc: Vec<Option<u8>>,
}

impl ProfileTierLevel {
    pub fn decode<T: AsRef<[u8]>>(bs: &mut Bitstream<T>, profile_present_flag: bool, max_num_sub_layers_minus1: u8) -> io::Result<Self> {
        let mut ret = Self::default();

        if profile_present_flag {
            decode!(
                bs,
                &mut ret.general_profile_space,
                &mut ret.general_tier_flag,
                &mut ret.general_profile_idc,
                &mut ret.general_profile_compatibility_flags,
                &mut ret.general_constraint_flags
            )?;
        }

        decode!(bs, &mut ret.general_level_idc)?;

        let mut present = Vec::with_capacity(max_num_sub_layers_minus1 as usize);
        for _ in 0..max_num_sub_layers_minus1 {
            let profile_present = bs.read_bits(1)? != 0;
            let level_present = bs.read_bits(1)? != 0;
            present.push((profile_present, level_present));
        }

        if max_num_sub_layers_minus1 > 0 {
            // reserved_zero_2bits
            bs.skip_bits(2 * (8 - max_num_sub_layers_minus1 as usize))?;
        }

        for (profile_present, level_present) in present {
            if profile_present {
                bs.skip_bits(88)?;
            }
            ret.sub_layer_level_idc.push(match level_present {
                true => Some(bs.read_bits(8)? as u8),
                false => None,
            });
        }

        Ok(ret)
    }
}
