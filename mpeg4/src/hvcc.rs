use std::io::{self, Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use h265::{Bitstream, Decode, NALUnit, SequenceParameterSet};

use super::error::{Error, Result};

// ISO/IEC 14496-15, 8.3.3.1
#[derive(Clone, Debug, PartialEq)]
pub struct HVCDecoderConfigurationRecord {
    pub configuration_version: u8,
    pub general_profile_space: u8,
    pub general_tier_flag: bool,
    pub general_profile_idc: u8,
    pub general_profile_compatibility_flags: u32,
    pub general_constraint_indicator_flags: u64,
    pub general_level_idc: u8,
    pub min_spatial_segmentation_idc: u16,
    pub parallelism_type: u8,
    pub chroma_format: u8,
    pub bit_depth_luma_minus_eight: u8,
    pub bit_depth_chroma_minus_eight: u8,
    pub average_frame_rate: u16,
    pub constant_frame_rate: u8,
    pub num_temporal_layers: u8,
    pub temporal_id_nested: u8,
    pub length_size_minus_one: u8,
    /// Set when every parameter set is in the record and none appear in-band. `hev1` streams
    /// repeat their parameter sets in-band and leave this clear.
    pub array_completeness: bool,
    pub nal_units: Vec<Vec<u8>>,
}

impl HVCDecoderConfigurationRecord {
    /// Builds a record from the stream's parameter sets, taking the profile, tier, level, and
    /// format information from the first SPS. NAL lengths are written with four bytes.
    pub fn from_parameter_sets(nal_units: Vec<Vec<u8>>) -> Result<Self> {
        let sps_nalu = nal_units
            .iter()
            .find(|nalu| h265::nal_unit_type(nalu) == Some(h265::NAL_UNIT_TYPE_SEQUENCE_PARAMETER_SET))
            .ok_or_else(|| Error::InvalidParameterSets("missing sequence parameter set".to_string()))?;

        let sps = NALUnit::decode(&mut Bitstream::new(sps_nalu))
            .and_then(|nalu| SequenceParameterSet::decode(&mut Bitstream::new(&nalu.rbsp_byte)))
            .map_err(|e| Error::InvalidParameterSets(format!("unable to decode sequence parameter set: {}", e)))?;

        let ptl = &sps.profile_tier_level;
        Ok(Self {
            configuration_version: 1,
            general_profile_space: ptl.general_profile_space.0,
            general_tier_flag: ptl.general_tier_flag.0 != 0,
            general_profile_idc: ptl.general_profile_idc.0,
            general_profile_compatibility_flags: ptl.general_profile_compatibility_flags.0,
            general_constraint_indicator_flags: ptl.general_constraint_flags.0,
            general_level_idc: ptl.general_level_idc.0,
            min_spatial_segmentation_idc: 0,
            parallelism_type: 0,
            chroma_format: sps.chroma_format_idc.0 as u8 & 3,
            bit_depth_luma_minus_eight: sps.bit_depth_luma_minus8.0 as u8 & 7,
            bit_depth_chroma_minus_eight: sps.bit_depth_chroma_minus8.0 as u8 & 7,
            average_frame_rate: 0,
            constant_frame_rate: 0,
            num_temporal_layers: sps.sps_max_sub_layers_minus1.0 + 1,
            temporal_id_nested: sps.sps_temporal_id_nesting_flag.0,
            length_size_minus_one: 3,
            array_completeness: false,
            nal_units,
        })
    }

    pub fn decode<R: Read>(mut r: R) -> io::Result<Self> {
        let configuration_version = match r.read_u8()? {
            1 => 1,
            v => return Err(io::Error::new(io::ErrorKind::InvalidData, format!("unexpected configuration version: {}", v))),
        };
        let b = r.read_u8()?;
        let general_profile_space = b >> 6;
        let general_tier_flag = ((b >> 5) & 1) == 1;
        let general_profile_idc = b & 0x1f;
        let general_profile_compatibility_flags = r.read_u32::<BigEndian>()?;
        let general_constraint_indicator_flags = r.read_u48::<BigEndian>()?;
        let general_level_idc = r.read_u8()?;
        let min_spatial_segmentation_idc = r.read_u16::<BigEndian>()? & 0xfff;
        let parallelism_type = r.read_u8()? & 3;
        let chroma_format = r.read_u8()? & 3;
        let bit_depth_luma_minus_eight = r.read_u8()? & 7;
        let bit_depth_chroma_minus_eight = r.read_u8()? & 7;
        let average_frame_rate = r.read_u16::<BigEndian>()?;
        let b = r.read_u8()?;

        let array_count = r.read_u8()?;
        let mut array_completeness = array_count > 0;
        let mut nal_units = vec![];
        for _ in 0..array_count {
            array_completeness &= r.read_u8()? & 0x80 != 0;
            let nalu_count = r.read_u16::<BigEndian>()?;
            for _ in 0..nalu_count {
                let len = r.read_u16::<BigEndian>()? as usize;
                let mut data = vec![0; len];
                r.read_exact(&mut data)?;
                nal_units.push(data);
            }
        }

        Ok(Self {
            configuration_version,
            general_profile_space,
            general_tier_flag,
            general_profile_idc,
            general_profile_compatibility_flags,
            general_constraint_indicator_flags,
            general_level_idc,
            min_spatial_segmentation_idc,
            parallelism_type,
            chroma_format,
            bit_depth_luma_minus_eight,
            bit_depth_chroma_minus_eight,
            average_frame_rate,
            constant_frame_rate: b >> 6,
            num_temporal_layers: (b >> 3) & 7,
            temporal_id_nested: (b >> 2) & 1,
            length_size_minus_one: b & 3,
            array_completeness,
            nal_units,
        })
    }

    pub fn encode<W: Write>(&self, mut w: W) -> io::Result<()> {
        w.write_u8(self.configuration_version)?;
        w.write_u8(self.general_profile_space << 6 | (self.general_tier_flag as u8) << 5 | (self.general_profile_idc & 0x1f))?;
        w.write_u32::<BigEndian>(self.general_profile_compatibility_flags)?;
        w.write_u48::<BigEndian>(self.general_constraint_indicator_flags)?;
        w.write_u8(self.general_level_idc)?;
        w.write_u16::<BigEndian>(0xf000 | self.min_spatial_segmentation_idc)?;
        w.write_u8(0xfc | self.parallelism_type)?;
        w.write_u8(0xfc | self.chroma_format)?;
        w.write_u8(0xf8 | self.bit_depth_luma_minus_eight)?;
        w.write_u8(0xf8 | self.bit_depth_chroma_minus_eight)?;
        w.write_u16::<BigEndian>(self.average_frame_rate)?;
        w.write_u8(self.constant_frame_rate << 6 | (self.num_temporal_layers & 7) << 3 | (self.temporal_id_nested & 1) << 2 | (self.length_size_minus_one & 3))?;

        // one array per NAL unit type, in order of first appearance
        let mut arrays: Vec<(u8, Vec<&[u8]>)> = vec![];
        for nalu in &self.nal_units {
            let typ = h265::nal_unit_type(nalu).ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty nal unit"))?;
            match arrays.iter_mut().find(|(t, _)| *t == typ) {
                Some((_, nalus)) => nalus.push(nalu.as_slice()),
                None => arrays.push((typ, vec![nalu.as_slice()])),
            }
        }

        w.write_u8(arrays.len() as u8)?;
        for (typ, nalus) in arrays {
            w.write_u8((self.array_completeness as u8) << 7 | typ)?;
            w.write_u16::<BigEndian>(nalus.len() as u16)?;
            for nalu in nalus {
                let len = u16::try_from(nalu.len()).map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "nal unit too large for hvcC"))?;
                w.write_u16::<BigEndian>(len)?;
                w.write_all(nalu)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const VPS: &[u8] = &[
        0x40, 0x01, 0x0c, 0x01, 0xff, 0xff, 0x01, 0x60, 0x00, 0x00, 0x03, 0x00, 0xb0, 0x00, 0x00, 0x03, 0x00, 0x00, 0x03, 0x00, 0x99, 0x17, 0x02, 0x40,
    ];
    const SPS: &[u8] = &[
        0x42, 0x01, 0x01, 0x01, 0x60, 0x00, 0x00, 0x03, 0x00, 0xb0, 0x00, 0x00, 0x03, 0x00, 0x00, 0x03, 0x00, 0x99, 0xa0, 0x03, 0xc0, 0x80, 0x11, 0x07,
        0xcb, 0x88, 0x17, 0xb9, 0x16, 0x45, 0x2f, 0xfc, 0xb9, 0xfc, 0x4f, 0xe8, 0x80,
    ];
    const PPS: &[u8] = &[0x44, 0x01, 0xc0, 0x72, 0xf0, 0x53, 0x24];

    const RECORD: &[u8] = &[
        0x01, 0x01, 0x60, 0x00, 0x00, 0x00, 0xB0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x99, 0xF0, 0x00, 0xFC, 0xFD, 0xF8, 0xF8, 0x00, 0x00, 0x0F, 0x03, 0xA0,
        0x00, 0x01, 0x00, 0x18, 0x40, 0x01, 0x0C, 0x01, 0xFF, 0xFF, 0x01, 0x60, 0x00, 0x00, 0x03, 0x00, 0xB0, 0x00, 0x00, 0x03, 0x00, 0x00, 0x03, 0x00,
        0x99, 0x17, 0x02, 0x40, 0xA1, 0x00, 0x01, 0x00, 0x25, 0x42, 0x01, 0x01, 0x01, 0x60, 0x00, 0x00, 0x03, 0x00, 0xB0, 0x00, 0x00, 0x03, 0x00, 0x00,
        0x03, 0x00, 0x99, 0xA0, 0x03, 0xC0, 0x80, 0x11, 0x07, 0xCB, 0x88, 0x17, 0xB9, 0x16, 0x45, 0x2F, 0xFC, 0xB9, 0xFC, 0x4F, 0xE8, 0x80, 0xA2, 0x00,
        0x01, 0x00, 0x07, 0x44, 0x01, 0xC0, 0x72, 0xF0, 0x53, 0x24,
    ];

    #[test]
    fn test_hvc_decoder_configuration_decode() {
        let record = HVCDecoderConfigurationRecord::decode(RECORD).unwrap();

        assert_eq!(1, record.configuration_version);
        assert_eq!(1, record.general_profile_idc);
        assert_eq!(153, record.general_level_idc);
        assert_eq!(1, record.chroma_format);
        assert_eq!(1, record.num_temporal_layers);
        assert_eq!(3, record.length_size_minus_one);
        assert!(record.array_completeness);
        assert_eq!(vec![VPS.to_vec(), SPS.to_vec(), PPS.to_vec()], record.nal_units);
    }

    #[test]
    fn test_hvc_decoder_configuration_from_parameter_sets() {
        let mut record = HVCDecoderConfigurationRecord::from_parameter_sets(vec![VPS.to_vec(), SPS.to_vec(), PPS.to_vec()]).unwrap();
        assert!(!record.array_completeness);
        assert_eq!(0x60000000, record.general_profile_compatibility_flags);
        assert_eq!(0xb00000000000, record.general_constraint_indicator_flags);

        record.array_completeness = true;
        let mut buf = vec![];
        record.encode(&mut buf).unwrap();
        assert_eq!(RECORD, buf.as_slice());
        assert_eq!(record, HVCDecoderConfigurationRecord::decode(buf.as_slice()).unwrap());
    }

    #[test]
    fn test_hvc_decoder_configuration_missing_sps() {
        match HVCDecoderConfigurationRecord::from_parameter_sets(vec![VPS.to_vec(), PPS.to_vec()]) {
            Err(Error::InvalidParameterSets(_)) => {}
            r => panic!("unexpected result: {:?}", r),
        }
    }
}
