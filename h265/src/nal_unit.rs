use super::{decode, syntax_elements::*, Bitstream, Decode};
use std::io;

pub const NAL_UNIT_TYPE_TRAIL_N: u8 = 0;
pub const NAL_UNIT_TYPE_TRAIL_R: u8 = 1;
pub const NAL_UNIT_TYPE_BLA_W_LP: u8 = 16;
pub const NAL_UNIT_TYPE_IDR_W_RADL: u8 = 19;
pub const NAL_UNIT_TYPE_IDR_N_LP: u8 = 20;
pub const NAL_UNIT_TYPE_CRA_NUT: u8 = 21;
pub const NAL_UNIT_TYPE_VIDEO_PARAMETER_SET: u8 = 32;
pub const NAL_UNIT_TYPE_SEQUENCE_PARAMETER_SET: u8 = 33;
pub const NAL_UNIT_TYPE_PICTURE_PARAMETER_SET: u8 = 34;
pub const NAL_UNIT_TYPE_ACCESS_UNIT_DELIMITER: u8 = 35;
pub const NAL_UNIT_TYPE_PREFIX_SEI: u8 = 39;

/// Returns the type of a NAL unit without decoding it. The NAL unit must not include a start code
/// or length prefix.
pub fn nal_unit_type(nalu: &[u8]) -> Option<u8> {
    nalu.first().map(|b| (b >> 1) & 0x3f)
}

/// Intra random access point pictures: BLA, IDR, and CRA. A decoder can start at any of these.
pub fn is_irap(nal_unit_type: u8) -> bool {
    (NAL_UNIT_TYPE_BLA_W_LP..=NAL_UNIT_TYPE_CRA_NUT).contains(&nal_unit_type)
}

pub fn is_parameter_set(nal_unit_type: u8) -> bool {
    (NAL_UNIT_TYPE_VIDEO_PARAMETER_SET..=NAL_UNIT_TYPE_PICTURE_PARAMETER_SET).contains(&nal_unit_type)
}

// ITU-T H.265, 11/2019, 7.3.1.2
#[derive(Clone, Copy, Debug, Default)]
pub struct NALUnitHeader {
    pub forbidden_zero_bit: F1,
    pub nal_unit_type: U6,
    pub nuh_layer_id: U6,
    pub nuh_temporal_id_plus1: U3,
}

impl Decode for NALUnitHeader {
    fn decode<T: AsRef<[u8]>>(bs: &mut Bitstream<T>) -> io::Result<Self> {
        let mut ret = Self::default();

        decode!(
            bs,
            &mut ret.forbidden_zero_bit,
            &mut ret.nal_unit_type,
            &mut ret.nuh_layer_id,
            &mut ret.nuh_temporal_id_plus1
        )?;

        if ret.forbidden_zero_bit.0 != 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "non-zero forbidden_zero_bit"));
        }
        if ret.nuh_temporal_id_plus1.0 == 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "zero nuh_temporal_id_plus1"));
        }

        Ok(ret)
    }
}

/// Strips emulation prevention bytes (the `03` in `00 00 03`) from the remainder of the bitstream.
pub fn decode_rbsp<T: AsRef<[u8]>>(bs: &mut Bitstream<T>) -> io::Result<Vec<u8>> {
    let mut rbsp = Vec::with_capacity(bs.bits_remaining() / 8);
    while bs.bits_remaining() >= 8 {
        if bs.next_bits(24) == Some(0x000003) {
            rbsp.extend_from_slice(&[0, 0]);
            bs.skip_bits(24)?;
        } else {
            rbsp.push(bs.read_bits(8)? as u8);
        }
    }
    Ok(rbsp)
}

// ITU-T H.265, 11/2019, 7.3.1.1
#[derive(Clone, Debug, Default)]
pub struct NALUnit {
    pub nal_unit_header: NALUnitHeader,
    pub rbsp_byte: Vec<u8>,
}

impl NALUnit {
    pub fn nal_unit_type(&self) -> u8 {
        self.nal_unit_header.nal_unit_type.0
    }
}

impl Decode for NALUnit {
    fn decode<T: AsRef<[u8]>>(bs: &mut Bitstream<T>) -> io::Result<Self> {
        let nal_unit_header = NALUnitHeader::decode(bs)?;
        Ok(Self {
            nal_unit_header,
            rbsp_byte: decode_rbsp(bs)?,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_nal_unit_type() {
        assert_eq!(nal_unit_type(&[0x40, 0x01]), Some(NAL_UNIT_TYPE_VIDEO_PARAMETER_SET));
        assert_eq!(nal_unit_type(&[0x42, 0x01]), Some(NAL_UNIT_TYPE_SEQUENCE_PARAMETER_SET));
        assert_eq!(nal_unit_type(&[0x44, 0x01]), Some(NAL_UNIT_TYPE_PICTURE_PARAMETER_SET));
        assert_eq!(nal_unit_type(&[0x26, 0x01]), Some(NAL_UNIT_TYPE_IDR_W_RADL));
        assert_eq!(nal_unit_type(&[0x02, 0x01]), Some(NAL_UNIT_TYPE_TRAIL_R));
        assert_eq!(nal_unit_type(&[]), None);
    }

    #[test]
    fn test_is_irap() {
        for t in 0..64 {
            assert_eq!(is_irap(t), (16..=21).contains(&t), "type {}", t);
        }
        assert!(is_parameter_set(NAL_UNIT_TYPE_SEQUENCE_PARAMETER_SET));
        assert!(!is_parameter_set(NAL_UNIT_TYPE_PREFIX_SEI));
    }

    #[test]
    fn test_nal_unit_header() {
        let header = NALUnitHeader::decode(&mut Bitstream::new(&[0x26, 0x01])).unwrap();
        assert_eq!(header.nal_unit_type.0, NAL_UNIT_TYPE_IDR_W_RADL);
        assert_eq!(header.nuh_layer_id.0, 0);
        assert_eq!(header.nuh_temporal_id_plus1.0, 1);

        assert!(NALUnitHeader::decode(&mut Bitstream::new(&[0xa6, 0x01])).is_err());
        assert!(NALUnitHeader::decode(&mut Bitstream::new(&[0x26, 0x00])).is_err());
        assert!(NALUnitHeader::decode(&mut Bitstream::new(&[0x26])).is_err());
    }

    #[test]
    fn test_decode_rbsp() {
        let nalu = NALUnit::decode(&mut Bitstream::new(&[0x42, 0x01, 0x00, 0x00, 0x03, 0x01, 0x00, 0x00, 0x03])).unwrap();
        assert_eq!(nalu.nal_unit_type(), NAL_UNIT_TYPE_SEQUENCE_PARAMETER_SET);
        assert_eq!(nalu.rbsp_byte, vec![0x00, 0x00, 0x01, 0x00, 0x00]);
    }
}
